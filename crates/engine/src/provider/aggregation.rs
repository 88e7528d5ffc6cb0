use super::{
    count_of, scalar_string, CapturedAggregations, FacetProvider, ParseContext, ProviderKind,
    ProviderQuery, ProviderResponse, ProviderTransport,
};
use crate::error::{FacetError, Result};
use crate::label::{format_label, humanize};
use crate::query::QueryArgs;
use async_trait::async_trait;
use facets_protocol::{
    Choice, DisplayType, FacetDefinition, Pagination, ResolvedFacet, Selection, SourceKind,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

pub const SEARCH_ENDPOINT: &str = "_search";
/// Buckets requested per taxonomy aggregation; the highest counts come first.
pub const TAXONOMY_AGG_SIZE: u32 = 100;
pub const YEAR_FIELD: &str = "date_terms.year";
const YEAR_TAXONOMY_KEY: &str = "terms.years.slug";
const YEAR_AGG: &str = "date_histogram";
const TAXONOMY_AGG: &str = "terms";
const SEARCH_FIELDS: &[&str] = &[
    "post_title^3",
    "post_excerpt^2",
    "post_content",
    "terms.category.name",
    "terms.bylines.name",
];

/// Adapter for the remote search engine's bucket aggregations.
pub struct AggregationAdapter {
    transport: Arc<dyn ProviderTransport>,
}

impl AggregationAdapter {
    pub fn new(transport: Arc<dyn ProviderTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl FacetProvider for AggregationAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Aggregation
    }

    fn build_query(
        &self,
        args: &QueryArgs,
        facets: &[FacetDefinition],
        selection: &Selection,
    ) -> Result<ProviderQuery> {
        let per_page = args.per_page();
        let from = args.paged().saturating_sub(1).saturating_mul(per_page);

        let query = match args.search_term() {
            Some(term) => json!({
                "bool": {
                    "must": [{
                        "multi_match": {
                            "query": term,
                            "fields": SEARCH_FIELDS,
                            "type": "best_fields",
                        }
                    }]
                }
            }),
            None => json!({ "match_all": {} }),
        };

        let post_filter = regroup_post_filter(&flat_post_filter(facets, selection));
        log::debug!("Aggregation post_filter: {post_filter}");

        let mut body = json!({
            "from": from,
            "size": per_page,
            "query": query,
            "post_filter": post_filter,
            "aggs": {
                TAXONOMY_AGG: {
                    "filter": post_filter,
                    "aggs": taxonomy_aggs(facets),
                }
            },
        });
        if args.flag("ep_sort__by_date") {
            let order = args
                .str_arg("order")
                .map(str::to_ascii_lowercase)
                .filter(|o| o == "asc" || o == "desc")
                .unwrap_or_else(|| "desc".to_string());
            body["sort"] = json!([{ "post_date": { "order": order } }]);
        }
        add_year_histogram(&mut body);

        Ok(ProviderQuery {
            provider: ProviderKind::Aggregation,
            endpoint: SEARCH_ENDPOINT.to_string(),
            body,
        })
    }

    async fn fetch(&self, query: &ProviderQuery) -> Result<Value> {
        self.transport.send(query).await
    }

    fn parse_response(&self, raw: Value, ctx: &ParseContext<'_>) -> Result<ProviderResponse> {
        if let Some(error) = raw.get("error") {
            return Err(FacetError::malformed(format!("search engine error: {error}")));
        }
        let aggregations = raw.get("aggregations").filter(|a| a.is_object());
        let hits = raw.get("hits").filter(|h| h.is_object());
        if aggregations.is_none() && hits.is_none() {
            return Err(FacetError::malformed(
                "search response has neither aggregations nor hits",
            ));
        }

        let captured = capture_year_buckets(&raw);
        let mut response = ProviderResponse::default();

        for def in ctx.registry.list_facet_definitions() {
            let display_type = ctx.registry.get_display_type(&def.name);
            let mut facet = ResolvedFacet::new(&def.name, display_type, ctx.selected_for(&def.name));
            match &def.source {
                SourceKind::Taxonomy(_) => {
                    let buckets = aggregations
                        .and_then(|a| a.get(TAXONOMY_AGG))
                        .and_then(|t| t.get(&def.name))
                        .and_then(|agg| agg.get("buckets"))
                        .and_then(Value::as_array);
                    for bucket in buckets.into_iter().flatten() {
                        if let Some(choice) = bucket_choice(&facet, bucket, display_type) {
                            facet.choices.push(choice);
                        }
                    }
                }
                SourceKind::DateDerived(_) => {
                    for (year, count) in captured.years.iter().rev() {
                        let is_selected = facet.is_value_selected(year);
                        facet.choices.push(Choice {
                            value: year.clone(),
                            slug: year.clone(),
                            label: format_label(year),
                            count: *count,
                            is_selected,
                            facet_slug: def.name.clone(),
                            term_id: None,
                            is_required: false,
                            display_type,
                        });
                    }
                }
                SourceKind::Custom(_) => {}
            }
            response.facets.insert(def.name.clone(), facet);
        }

        if let Some(total) = hits.and_then(|h| h.get("total")).map(total_hits) {
            response.pagination = Pagination::new(ctx.query.paged(), ctx.query.per_page(), total);
        }
        response.captured = captured;
        Ok(response)
    }
}

/// The filter shape the search integration produces on its own: one flat OR group holding
/// a clause per selected term, regardless of which facet the term belongs to.
pub fn flat_post_filter(facets: &[FacetDefinition], selection: &Selection) -> Value {
    let mut should = Vec::new();
    for def in facets {
        let Some(values) = selection.get(&def.name) else {
            continue;
        };
        let field = match &def.source {
            SourceKind::Taxonomy(taxonomy) => format!("terms.{taxonomy}.slug"),
            SourceKind::DateDerived(_) => YEAR_FIELD.to_string(),
            SourceKind::Custom(_) => continue,
        };
        for value in values {
            should.push(json!({ "terms": { field.clone(): [value] } }));
        }
    }
    if should.is_empty() {
        return json!({ "match_all": {} });
    }
    json!({ "bool": { "must": [{ "bool": { "should": should } }] } })
}

/// Regroup `bool.must[0].bool.should` into one OR group per facet, ANDed together.
///
/// Clauses are grouped by the field they filter on, in first-seen order. A
/// `terms.years.slug` clause is rewritten onto the year field. With zero or one clause,
/// or when the should list is not at that path, the filter is returned unchanged.
pub fn regroup_post_filter(post_filter: &Value) -> Value {
    let Some(should) = post_filter
        .pointer("/bool/must/0/bool/should")
        .and_then(Value::as_array)
    else {
        return post_filter.clone();
    };
    if should.len() <= 1 {
        return post_filter.clone();
    }

    let mut groups: Vec<(String, Vec<Value>)> = Vec::new();
    for clause in should {
        let Some((field, rewritten)) = clause_field(clause) else {
            log::debug!("Dropping post_filter clause without a terms key: {clause}");
            continue;
        };
        match groups.iter_mut().find(|(f, _)| *f == field) {
            Some((_, clauses)) => clauses.push(rewritten),
            None => groups.push((field, vec![rewritten])),
        }
    }

    let must: Vec<Value> = groups
        .into_iter()
        .map(|(_, clauses)| json!({ "bool": { "should": clauses } }))
        .collect();

    let mut out = post_filter.clone();
    if let Some(Value::Object(inner)) = out.pointer_mut("/bool/must/0/bool") {
        inner.remove("should");
        inner.insert("must".to_string(), Value::Array(must));
    }
    out
}

/// Attach the synthetic year histogram, scoped to the same post filter.
pub fn add_year_histogram(body: &mut Value) {
    let filter = body
        .get("post_filter")
        .cloned()
        .unwrap_or_else(|| json!({ "match_all": {} }));
    let histogram = json!({
        "filter": filter,
        "aggs": {
            "years": {
                "terms": {
                    "field": YEAR_FIELD,
                    "size": TAXONOMY_AGG_SIZE,
                    "order": { "_key": "desc" },
                }
            }
        }
    });
    if let Some(root) = body.as_object_mut() {
        let aggs = root
            .entry("aggs")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(aggs) = aggs.as_object_mut() {
            aggs.insert(YEAR_AGG.to_string(), histogram);
        }
    }
}

/// Year buckets from the synthetic histogram, which the normal facet channel never
/// surfaces.
pub fn capture_year_buckets(raw: &Value) -> CapturedAggregations {
    let mut captured = CapturedAggregations::default();
    let buckets = raw
        .pointer("/aggregations/date_histogram/years/buckets")
        .and_then(Value::as_array);
    for bucket in buckets.into_iter().flatten() {
        let key = scalar_string(bucket.get("key_as_string"))
            .or_else(|| scalar_string(bucket.get("key")));
        if let Some(key) = key {
            captured.years.insert(key, count_of(bucket.get("doc_count")));
        }
    }
    captured
}

fn taxonomy_aggs(facets: &[FacetDefinition]) -> Value {
    let mut aggs = Map::new();
    for def in facets {
        if let SourceKind::Taxonomy(taxonomy) = &def.source {
            aggs.insert(
                def.name.clone(),
                json!({
                    "terms": {
                        "field": format!("terms.{taxonomy}.slug"),
                        "size": TAXONOMY_AGG_SIZE,
                    }
                }),
            );
        }
    }
    Value::Object(aggs)
}

fn clause_field(clause: &Value) -> Option<(String, Value)> {
    let (kind, body) = ["terms", "term"]
        .iter()
        .find_map(|kind| clause.get(*kind).and_then(Value::as_object).map(|b| (*kind, b)))?;
    let (field, values) = body.iter().next()?;
    if field == YEAR_TAXONOMY_KEY {
        return Some((
            YEAR_FIELD.to_string(),
            json!({ kind: { YEAR_FIELD: values } }),
        ));
    }
    Some((field.clone(), clause.clone()))
}

fn total_hits(total: &Value) -> u64 {
    match total {
        Value::Object(obj) => count_of(obj.get("value")),
        other => count_of(Some(other)),
    }
}

fn bucket_choice(facet: &ResolvedFacet, bucket: &Value, display_type: DisplayType) -> Option<Choice> {
    let value = scalar_string(bucket.get("key"))?;
    let label = bucket
        .get("label")
        .and_then(Value::as_str)
        .map_or_else(|| format_label(&humanize(&value)), format_label);
    Some(Choice {
        slug: value.clone(),
        label,
        count: count_of(bucket.get("doc_count")),
        is_selected: facet.is_value_selected(&value),
        facet_slug: facet.facet_slug.clone(),
        term_id: None,
        is_required: false,
        display_type,
        value,
    })
}
