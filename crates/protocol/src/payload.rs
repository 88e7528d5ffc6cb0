use crate::definition::DisplayType;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Facet name -> raw selected values, as reconstructed from the request URL.
pub type Selection = BTreeMap<String, Vec<String>>;

/// One selectable value within a facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub value: String,
    pub slug: String,
    pub label: String,
    /// Result count if this choice were additionally selected.
    pub count: u64,
    pub is_selected: bool,
    pub facet_slug: String,
    #[serde(rename = "term_id", default, skip_serializing_if = "Option::is_none")]
    pub term_id: Option<u64>,
    #[serde(default)]
    pub is_required: bool,
    #[serde(rename = "type")]
    pub display_type: DisplayType,
}

/// A facet as resolved for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedFacet {
    pub facet_slug: String,
    #[serde(rename = "type")]
    pub display_type: DisplayType,
    pub choices: Vec<Choice>,
    /// Always empty on the wire; the presentation layer computes overflow lists.
    #[serde(default)]
    pub expanded_choices: Vec<Choice>,
    pub selected: Vec<String>,
}

impl ResolvedFacet {
    pub fn new(facet_slug: impl Into<String>, display_type: DisplayType, selected: Vec<String>) -> Self {
        Self {
            facet_slug: facet_slug.into(),
            display_type,
            choices: Vec::new(),
            expanded_choices: Vec::new(),
            selected,
        }
    }

    pub fn is_value_selected(&self, value: &str) -> bool {
        self.selected.iter().any(|v| v == value)
    }
}

/// Result-set pagination. Every field is optional so the fail-safe payload serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Pagination {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_rows: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u64>,
}

impl Pagination {
    pub fn new(page: u64, per_page: u64, total_rows: u64) -> Self {
        let total_pages = if per_page == 0 {
            0
        } else {
            total_rows.div_ceil(per_page)
        };
        Self {
            page: Some(page),
            per_page: Some(per_page),
            total_rows: Some(total_rows),
            total_pages: Some(total_pages),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FacetSettings {
    pub first_load: bool,
}

impl Default for FacetSettings {
    fn default() -> Self {
        Self { first_load: true }
    }
}

/// What the resolution service caches and hands to the rendering layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FacetsPayload {
    #[serde(default)]
    pub facets: BTreeMap<String, ResolvedFacet>,
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(default)]
    pub settings: FacetSettings,
}

impl FacetsPayload {
    /// `{facets: {}, pagination: {}, settings: {first_load: true}}`
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.facets.is_empty()
    }
}
