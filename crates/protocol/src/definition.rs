use serde::{Deserialize, Serialize};
use std::fmt;

/// UI control a facet renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DisplayType {
    Checkbox,
    Radio,
    Dropdown,
    Range,
    Search,
}

impl DisplayType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Checkbox => "checkbox",
            Self::Radio => "radio",
            Self::Dropdown => "dropdown",
            Self::Range => "range",
            Self::Search => "search",
        }
    }

    /// Single-valued controls replace the selection instead of appending to it.
    pub fn is_single_valued(self) -> bool {
        matches!(self, Self::Radio | Self::Dropdown)
    }
}

impl Default for DisplayType {
    fn default() -> Self {
        Self::Checkbox
    }
}

impl fmt::Display for DisplayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a facet's values come from.
///
/// Serialized in the compact backend notation: `tax/<taxonomy>` for taxonomies,
/// `post_date` (or any `*date*` field) for date-derived facets, anything else verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceKind {
    Taxonomy(String),
    DateDerived(String),
    Custom(String),
}

impl SourceKind {
    pub fn taxonomy(&self) -> Option<&str> {
        match self {
            Self::Taxonomy(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_date_derived(&self) -> bool {
        matches!(self, Self::DateDerived(_))
    }
}

impl From<String> for SourceKind {
    fn from(raw: String) -> Self {
        let trimmed = raw.trim();
        if let Some(taxonomy) = trimmed.strip_prefix("tax/") {
            return Self::Taxonomy(taxonomy.to_string());
        }
        if trimmed.contains("date") {
            return Self::DateDerived(trimmed.to_string());
        }
        Self::Custom(trimmed.to_string())
    }
}

impl From<SourceKind> for String {
    fn from(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Taxonomy(name) => format!("tax/{name}"),
            SourceKind::DateDerived(field) | SourceKind::Custom(field) => field,
        }
    }
}

impl Default for SourceKind {
    fn default() -> Self {
        Self::Custom(String::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingPolicy {
    Count,
    DisplayValue,
    RawValue,
    TermOrder,
}

impl Default for OrderingPolicy {
    fn default() -> Self {
        Self::Count
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetOperator {
    And,
    Or,
}

/// Relative date choice offered by "time since" facets, e.g. `Past Month | -30 days`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatePreset {
    pub label: String,
    pub offset: String,
}

/// Declarative description of one facet dimension.
///
/// Owned by the registry and never mutated once the registry is built. `display_type` is
/// serialized as `facet_type` and is always resolved by the registry's name table, so a
/// configuration file never needs to carry it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetDefinition {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub source: SourceKind,
    /// Provider-native facet type (`checkboxes`, `yearly`, `time_since`, ...).
    #[serde(rename = "type", default)]
    pub backend_type: String,
    #[serde(rename = "facet_type", default)]
    pub display_type: DisplayType,
    #[serde(default)]
    pub orderby: OrderingPolicy,
    /// Maximum number of choices the backend returns; `None` means unlimited.
    #[serde(rename = "count", default, skip_serializing_if = "Option::is_none")]
    pub count_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_any: Option<String>,
    #[serde(default)]
    pub hierarchical: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<FacetOperator>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub presets: Vec<DatePreset>,
}

impl FacetDefinition {
    pub fn new(name: impl Into<String>, label: impl Into<String>, source: &str) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            source: SourceKind::from(source.to_string()),
            backend_type: String::new(),
            display_type: DisplayType::default(),
            orderby: OrderingPolicy::Count,
            count_limit: None,
            soft_limit: None,
            label_any: None,
            hierarchical: false,
            operator: None,
            presets: Vec::new(),
        }
    }

    pub fn backend_type(mut self, backend_type: impl Into<String>) -> Self {
        self.backend_type = backend_type.into();
        self
    }

    pub fn count_limit(mut self, limit: u32) -> Self {
        self.count_limit = Some(limit);
        self
    }

    pub fn soft_limit(mut self, limit: u32) -> Self {
        self.soft_limit = Some(limit);
        self
    }

    pub fn label_any(mut self, label: impl Into<String>) -> Self {
        self.label_any = Some(label.into());
        self
    }

    pub fn hierarchical(mut self, hierarchical: bool) -> Self {
        self.hierarchical = hierarchical;
        self
    }

    pub fn operator(mut self, operator: FacetOperator) -> Self {
        self.operator = Some(operator);
        self
    }

    pub fn preset(mut self, label: impl Into<String>, offset: impl Into<String>) -> Self {
        self.presets.push(DatePreset {
            label: label.into(),
            offset: offset.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn source_kind_parses_backend_notation() {
        assert_eq!(
            SourceKind::from("tax/research-teams".to_string()),
            SourceKind::Taxonomy("research-teams".to_string())
        );
        assert_eq!(
            SourceKind::from("post_date".to_string()),
            SourceKind::DateDerived("post_date".to_string())
        );
        assert_eq!(
            SourceKind::from("cf/report_id".to_string()),
            SourceKind::Custom("cf/report_id".to_string())
        );
        assert_eq!(String::from(SourceKind::Taxonomy("category".into())), "tax/category");
    }

    #[test]
    fn definition_serializes_display_type_as_facet_type() {
        let mut def = FacetDefinition::new("formats", "Formats", "tax/formats")
            .backend_type("checkboxes")
            .soft_limit(5);
        def.display_type = DisplayType::Checkbox;

        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["facet_type"], "checkbox");
        assert_eq!(json["type"], "checkboxes");
        assert_eq!(json["source"], "tax/formats");
        assert!(json.get("count").is_none());
    }
}
