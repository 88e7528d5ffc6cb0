use crate::provider::ProviderKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const DEFAULT_PER_PAGE: u64 = 10;

/// Base content query, kept as a loose JSON object because its keys belong to the
/// content catalog rather than to this crate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryArgs(Map<String, Value>);

impl QueryArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-object values yield empty args.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Requested page, 1 when absent or unparsable.
    pub fn paged(&self) -> u64 {
        self.u64_arg("paged").filter(|p| *p > 0).unwrap_or(1)
    }

    /// Copy with `paged` forced, so pagination never fragments caches or facet counts.
    pub fn with_paged(&self, page: u64) -> Self {
        let mut out = self.clone();
        out.0.insert("paged".to_string(), Value::from(page));
        out
    }

    pub fn per_page(&self) -> u64 {
        self.u64_arg("posts_per_page")
            .filter(|p| *p > 0)
            .unwrap_or(DEFAULT_PER_PAGE)
    }

    /// Full-text search term, if any.
    pub fn search_term(&self) -> Option<&str> {
        self.0
            .get("s")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn is_search(&self) -> bool {
        self.search_term().is_some()
    }

    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn flag(&self, key: &str) -> bool {
        match self.0.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_u64().is_some_and(|n| n != 0),
            Some(Value::String(s)) => !s.is_empty() && s != "0" && s != "false",
            _ => false,
        }
    }

    fn u64_arg(&self, key: &str) -> Option<u64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Facts about the caller that steer caching, none of which are part of the query itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(default)]
    pub is_preview: bool,
    #[serde(default)]
    pub is_authenticated: bool,
    /// The primary routing context never serves cached facets.
    #[serde(default)]
    pub is_primary_context: bool,
}

/// Everything the resolution service needs for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetRequest {
    #[serde(default)]
    pub query: QueryArgs,
    /// Decoded URL query-string parameters.
    #[serde(default)]
    pub url_params: BTreeMap<String, String>,
    /// Route path of the page, e.g. `/reports/page/2/`. `None` when it could not be determined.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default)]
    pub context: RequestContext,
}

impl FacetRequest {
    pub fn new(query: QueryArgs, provider: ProviderKind) -> Self {
        Self {
            query,
            url_params: BTreeMap::new(),
            path: None,
            provider,
            context: RequestContext::default(),
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.url_params.insert(key.into(), value.into());
        self
    }

    pub fn context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }
}
