//! Backend adapters.
//!
//! Both backends sit behind [`FacetProvider`]: build a provider-native query from the
//! normalized request, send it, and translate the raw answer back into
//! [`ResolvedFacet`]s. Which provider runs is an explicit [`ProviderKind`] carried by the
//! request; [`ProviderKind::from_template_slug`] is the only place that still looks at a
//! template name.

pub mod aggregation;
pub mod indexer;

use crate::error::Result;
use crate::query::QueryArgs;
use crate::registry::ProviderRegistry;
use async_trait::async_trait;
use facets_protocol::{FacetDefinition, Pagination, ResolvedFacet, Selection};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub use aggregation::AggregationAdapter;
pub use indexer::IndexerAdapter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Self-hosted indexer reached through its REST fetch endpoint.
    #[default]
    Indexer,
    /// Remote search engine queried with bucket aggregations.
    Aggregation,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Indexer => "indexer",
            Self::Aggregation => "aggregation",
        }
    }

    /// URL key prefix that namespaces this provider's selections.
    pub fn default_url_prefix(self) -> &'static str {
        match self {
            Self::Indexer => "",
            Self::Aggregation => "ep_filter_",
        }
    }

    /// Site-editor template slugs mentioning "search" use the aggregation provider.
    pub fn from_template_slug(slug: &str) -> Self {
        if slug.contains("search") {
            Self::Aggregation
        } else {
            Self::Indexer
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully built backend call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderQuery {
    pub provider: ProviderKind,
    /// Path or URL suffix the transport appends to its base address.
    pub endpoint: String,
    pub body: Value,
}

/// Aggregation results the backend reports outside its normal facet channel.
///
/// Returned with each response instead of living in process-wide state, so concurrent
/// requests never observe each other's buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedAggregations {
    /// Year -> document count, newest first when iterated in reverse.
    pub years: BTreeMap<String, u64>,
}

impl CapturedAggregations {
    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderResponse {
    pub facets: BTreeMap<String, ResolvedFacet>,
    pub pagination: Pagination,
    pub captured: CapturedAggregations,
}

/// Inputs shared by every `parse_response` call.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    pub registry: &'a ProviderRegistry,
    pub selection: &'a Selection,
    pub query: &'a QueryArgs,
}

impl ParseContext<'_> {
    pub fn selected_for(&self, facet: &str) -> Vec<String> {
        self.selection.get(facet).cloned().unwrap_or_default()
    }
}

/// Sends a built query to a backend and returns its raw JSON answer.
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    async fn send(&self, query: &ProviderQuery) -> Result<Value>;
}

#[async_trait]
pub trait FacetProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn build_query(
        &self,
        args: &QueryArgs,
        facets: &[FacetDefinition],
        selection: &Selection,
    ) -> Result<ProviderQuery>;

    async fn fetch(&self, query: &ProviderQuery) -> Result<Value>;

    fn parse_response(&self, raw: Value, ctx: &ParseContext<'_>) -> Result<ProviderResponse>;
}

/// Raw bucket/choice count, tolerant of numbers encoded as strings.
pub(crate) fn count_of(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Scalar JSON value rendered as a plain string (`"2021"`, `2021` -> `2021`).
pub(crate) fn scalar_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
