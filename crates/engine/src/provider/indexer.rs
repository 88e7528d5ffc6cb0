use super::{
    count_of, scalar_string, FacetProvider, ParseContext, ProviderKind, ProviderQuery,
    ProviderResponse, ProviderTransport,
};
use crate::error::{FacetError, Result};
use crate::label::format_label;
use crate::query::QueryArgs;
use async_trait::async_trait;
use facets_protocol::{
    Choice, DisplayType, FacetDefinition, FacetSettings, Pagination, ResolvedFacet, Selection,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

pub const DEFAULT_FETCH_ENDPOINT: &str = "facetwp/v1/fetch";

/// Adapter for the self-hosted indexer's REST fetch endpoint.
///
/// The request carries `{facets, query_args, settings}` JSON-encoded under `data`; the
/// answer is `{facets, pager}` where each facet lists its choices with counts.
pub struct IndexerAdapter {
    transport: Arc<dyn ProviderTransport>,
    endpoint: String,
}

impl IndexerAdapter {
    pub fn new(transport: Arc<dyn ProviderTransport>) -> Self {
        Self {
            transport,
            endpoint: DEFAULT_FETCH_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn parse_facet(&self, slug: &str, data: &Value, ctx: &ParseContext<'_>) -> ResolvedFacet {
        let display_type = ctx.registry.get_display_type(slug);
        let selected = ctx.selected_for(slug);
        let taxonomy = ctx.registry.is_taxonomy(slug);
        let mut facet = ResolvedFacet::new(slug, display_type, selected);

        let Some(choices) = data.get("choices").and_then(Value::as_array) else {
            return facet;
        };
        for raw in choices {
            let parsed = if taxonomy {
                taxonomy_choice(slug, raw, display_type, &facet.selected)
            } else {
                generic_choice(slug, raw, display_type, &facet.selected)
            };
            if let Some(choice) = parsed {
                facet.choices.push(choice);
            }
        }
        facet
    }
}

#[async_trait]
impl FacetProvider for IndexerAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Indexer
    }

    fn build_query(
        &self,
        args: &QueryArgs,
        facets: &[FacetDefinition],
        selection: &Selection,
    ) -> Result<ProviderQuery> {
        let mut requested = Map::new();
        for facet in facets {
            let current = selection
                .get(&facet.name)
                .map_or(Value::Null, |values| json!(values));
            requested.insert(facet.name.clone(), current);
        }

        let payload = json!({
            "facets": requested,
            "query_args": args.with_paged(1),
            "settings": FacetSettings::default(),
        });
        log::debug!("Indexer fetch payload: {payload}");

        Ok(ProviderQuery {
            provider: ProviderKind::Indexer,
            endpoint: self.endpoint.clone(),
            body: json!({ "data": serde_json::to_string(&payload)? }),
        })
    }

    async fn fetch(&self, query: &ProviderQuery) -> Result<Value> {
        self.transport.send(query).await
    }

    fn parse_response(&self, raw: Value, ctx: &ParseContext<'_>) -> Result<ProviderResponse> {
        let mut response = ProviderResponse::default();

        match raw.get("facets") {
            Some(Value::Object(entries)) => {
                for (slug, data) in entries {
                    let facet = self.parse_facet(slug, data, ctx);
                    response.facets.insert(slug.clone(), facet);
                }
            }
            Some(Value::Array(entries)) => {
                for data in entries {
                    let Some(slug) = data.get("name").and_then(Value::as_str) else {
                        continue;
                    };
                    let facet = self.parse_facet(slug, data, ctx);
                    response.facets.insert(slug.to_string(), facet);
                }
            }
            Some(Value::Null) | None => {
                return Err(FacetError::malformed("indexer response has no facets"));
            }
            Some(other) => {
                return Err(FacetError::malformed(format!(
                    "indexer facets must be an object, got {other}"
                )));
            }
        }

        if let Some(pager) = raw.get("pager").filter(|p| p.is_object()) {
            response.pagination = parse_pager(pager);
        }
        Ok(response)
    }
}

fn parse_pager(pager: &Value) -> Pagination {
    let field = |key: &str| pager.get(key).map(|v| count_of(Some(v)));
    Pagination {
        page: field("page"),
        per_page: field("per_page"),
        total_rows: field("total_rows"),
        total_pages: field("total_pages"),
    }
}

fn base_choice(
    facet_slug: &str,
    raw: &Value,
    display_type: DisplayType,
    selected: &[String],
) -> Option<Choice> {
    let value = scalar_string(raw.get("value"))?;
    let label = raw
        .get("label")
        .and_then(Value::as_str)
        .map_or_else(|| format_label(&value), format_label);
    Some(Choice {
        slug: value.clone(),
        label,
        count: count_of(raw.get("count")),
        is_selected: selected.iter().any(|s| *s == value),
        facet_slug: facet_slug.to_string(),
        term_id: None,
        is_required: false,
        display_type,
        value,
    })
}

/// Taxonomy choices must reference a term; anything without `term_id` is skipped.
fn taxonomy_choice(
    facet_slug: &str,
    raw: &Value,
    display_type: DisplayType,
    selected: &[String],
) -> Option<Choice> {
    let term_id = match raw.get("term_id")? {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    let mut choice = base_choice(facet_slug, raw, display_type, selected)?;
    choice.term_id = Some(term_id);
    Some(choice)
}

fn generic_choice(
    facet_slug: &str,
    raw: &Value,
    display_type: DisplayType,
    selected: &[String],
) -> Option<Choice> {
    base_choice(facet_slug, raw, display_type, selected)
}
