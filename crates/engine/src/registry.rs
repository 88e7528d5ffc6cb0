//! Declarative facet catalog, one section per provider.
//!
//! The registry is built once from a [`RegistryConfig`] and is read-only afterwards.
//! A configuration that is missing or unreadable yields an empty catalog rather than
//! an error, so resolution degrades to "no facets".

use crate::error::{FacetError, Result};
use crate::provider::ProviderKind;
use facets_protocol::{DisplayType, FacetDefinition, FacetOperator};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

const BUILTIN_TAXONOMIES: &[&str] = &[
    "category",
    "formats",
    "bylines",
    "research-teams",
    "regions-countries",
];

/// Per-provider section of the registry configuration. Absent tables fall back to the
/// built-in tables of that provider; absent facets mean "no facets".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderRegistryConfig {
    #[serde(default)]
    pub facets: Vec<FacetDefinition>,
    #[serde(default)]
    pub display_types: Option<BTreeMap<String, DisplayType>>,
    #[serde(default)]
    pub default_display_type: Option<DisplayType>,
    #[serde(default)]
    pub url_prefix: Option<String>,
    #[serde(default)]
    pub taxonomies: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub indexer: ProviderRegistryConfig,
    #[serde(default)]
    pub aggregation: ProviderRegistryConfig,
}

impl RegistryConfig {
    /// The catalog the facets panel ships with.
    pub fn builtin() -> Self {
        Self {
            indexer: ProviderRegistryConfig {
                facets: builtin_indexer_facets(),
                ..Default::default()
            },
            aggregation: ProviderRegistryConfig {
                facets: builtin_aggregation_facets(),
                ..Default::default()
            },
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| FacetError::invalid_config(e.to_string()))
    }
}

/// Resolved, read-only catalog for one provider.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    kind: ProviderKind,
    facets: Vec<FacetDefinition>,
    display_types: BTreeMap<String, DisplayType>,
    default_display_type: DisplayType,
    url_prefix: String,
    taxonomies: BTreeSet<String>,
}

impl ProviderRegistry {
    fn from_config(kind: ProviderKind, config: ProviderRegistryConfig) -> Self {
        let display_types = config
            .display_types
            .unwrap_or_else(|| builtin_display_types(kind));
        let default_display_type = config
            .default_display_type
            .unwrap_or_else(|| builtin_default_display_type(kind));
        let url_prefix = config
            .url_prefix
            .unwrap_or_else(|| kind.default_url_prefix().to_string());
        let taxonomies = config
            .taxonomies
            .unwrap_or_else(|| BUILTIN_TAXONOMIES.iter().map(|t| t.to_string()).collect())
            .into_iter()
            .collect();

        let mut registry = Self {
            kind,
            facets: Vec::with_capacity(config.facets.len()),
            display_types,
            default_display_type,
            url_prefix,
            taxonomies,
        };

        let mut seen = HashSet::new();
        for mut facet in config.facets {
            let name = facet.name.trim().to_string();
            if name.is_empty() {
                log::warn!("Skipping {kind} facet without a name");
                continue;
            }
            if !seen.insert(name.clone()) {
                log::warn!("Duplicate {kind} facet '{name}' ignored");
                continue;
            }
            facet.display_type = registry.get_display_type(&name);
            facet.name = name;
            registry.facets.push(facet);
        }
        registry
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn list_facet_definitions(&self) -> &[FacetDefinition] {
        &self.facets
    }

    pub fn definition(&self, name: &str) -> Option<&FacetDefinition> {
        self.facets.iter().find(|f| f.name == name)
    }

    /// Named facets map to their designated control; unknown names get the provider default.
    pub fn get_display_type(&self, name: &str) -> DisplayType {
        self.display_types
            .get(name)
            .copied()
            .unwrap_or(self.default_display_type)
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    pub fn is_taxonomy(&self, name: &str) -> bool {
        self.taxonomies.contains(name)
    }
}

#[derive(Debug, Clone)]
pub struct FacetRegistry {
    indexer: ProviderRegistry,
    aggregation: ProviderRegistry,
}

impl FacetRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            indexer: ProviderRegistry::from_config(ProviderKind::Indexer, config.indexer),
            aggregation: ProviderRegistry::from_config(ProviderKind::Aggregation, config.aggregation),
        }
    }

    pub fn builtin() -> Self {
        Self::new(RegistryConfig::builtin())
    }

    pub fn empty() -> Self {
        Self::new(RegistryConfig::default())
    }

    /// Load from a TOML file; any failure is logged and produces an empty registry.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                log::warn!("Facet registry {} unreadable: {err}", path.display());
                return Self::empty();
            }
        };
        match RegistryConfig::from_toml_str(&raw) {
            Ok(config) => {
                let registry = Self::new(config);
                log::info!(
                    "Loaded facet registry from {}: {} indexer facets, {} aggregation facets",
                    path.display(),
                    registry.indexer.facets.len(),
                    registry.aggregation.facets.len()
                );
                registry
            }
            Err(err) => {
                log::warn!("Facet registry {} corrupt: {err}", path.display());
                Self::empty()
            }
        }
    }

    pub fn provider(&self, kind: ProviderKind) -> &ProviderRegistry {
        match kind {
            ProviderKind::Indexer => &self.indexer,
            ProviderKind::Aggregation => &self.aggregation,
        }
    }

    pub fn list_facet_definitions(&self, kind: ProviderKind) -> &[FacetDefinition] {
        self.provider(kind).list_facet_definitions()
    }

    pub fn get_display_type(&self, kind: ProviderKind, name: &str) -> DisplayType {
        self.provider(kind).get_display_type(name)
    }
}

impl Default for FacetRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_display_types(kind: ProviderKind) -> BTreeMap<String, DisplayType> {
    let pairs: &[(&str, DisplayType)] = match kind {
        ProviderKind::Indexer => &[
            ("categories", DisplayType::Checkbox),
            ("formats", DisplayType::Checkbox),
            ("authors", DisplayType::Dropdown),
            ("research_teams", DisplayType::Dropdown),
            ("years", DisplayType::Dropdown),
            ("regions_countries", DisplayType::Radio),
            ("time_since", DisplayType::Radio),
            ("date_range", DisplayType::Range),
        ],
        ProviderKind::Aggregation => &[
            ("category", DisplayType::Checkbox),
            ("formats", DisplayType::Checkbox),
            ("bylines", DisplayType::Dropdown),
            ("research-teams", DisplayType::Dropdown),
            ("years", DisplayType::Dropdown),
            ("regions-countries", DisplayType::Radio),
        ],
    };
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

// Unknown names fall back differently per provider. Kept distinct on purpose until
// product confirms which default is intended.
fn builtin_default_display_type(kind: ProviderKind) -> DisplayType {
    match kind {
        ProviderKind::Indexer => DisplayType::Checkbox,
        ProviderKind::Aggregation => DisplayType::Radio,
    }
}

fn builtin_indexer_facets() -> Vec<FacetDefinition> {
    vec![
        FacetDefinition::new("categories", "Topics", "tax/category")
            .backend_type("checkboxes")
            .hierarchical(true)
            .operator(FacetOperator::Or)
            .count_limit(50)
            .soft_limit(5),
        FacetDefinition::new("research_teams", "Research Teams", "tax/research-teams")
            .backend_type("dropdown")
            .label_any("Any")
            .count_limit(25),
        FacetDefinition::new("formats", "Formats", "tax/formats")
            .backend_type("checkboxes")
            .operator(FacetOperator::Or)
            .soft_limit(5),
        FacetDefinition::new("authors", "Authors", "tax/bylines")
            .backend_type("dropdown")
            .label_any("Any"),
        FacetDefinition::new("time_since", "Time Since", "post_date")
            .backend_type("time_since")
            .label_any("By Date Range")
            .preset("Past Month", "-30 days")
            .preset("Past 6 Months", "-180 days")
            .preset("Past 12 Months", "-365 days")
            .preset("Past 2 Years", "-730 days"),
        FacetDefinition::new("date_range", "Date Range", "post_date").backend_type("date_range"),
        FacetDefinition::new("years", "Years", "post_date")
            .backend_type("yearly")
            .label_any("Any")
            .count_limit(75),
        FacetDefinition::new("regions_countries", "Regions & Countries", "tax/regions-countries")
            .backend_type("radio")
            .label_any("Any"),
    ]
}

fn builtin_aggregation_facets() -> Vec<FacetDefinition> {
    let taxonomy = |name: &str, label: &str| {
        FacetDefinition::new(name, label, &format!("tax/{name}"))
            .backend_type("taxonomy")
            .count_limit(crate::provider::aggregation::TAXONOMY_AGG_SIZE)
    };
    vec![
        taxonomy("category", "Topics"),
        taxonomy("formats", "Formats"),
        taxonomy("bylines", "Authors"),
        taxonomy("research-teams", "Research Teams"),
        taxonomy("regions-countries", "Regions & Countries"),
        FacetDefinition::new("years", "Years", "post_date").backend_type("date_histogram"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builtin_registry_lists_facets_in_order() {
        let registry = FacetRegistry::builtin();
        let names: Vec<&str> = registry
            .list_facet_definitions(ProviderKind::Indexer)
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "categories",
                "research_teams",
                "formats",
                "authors",
                "time_since",
                "date_range",
                "years",
                "regions_countries"
            ]
        );
        assert_eq!(registry.list_facet_definitions(ProviderKind::Aggregation).len(), 6);
    }

    #[test]
    fn display_types_follow_name_table() {
        let registry = FacetRegistry::builtin();
        assert_eq!(
            registry.get_display_type(ProviderKind::Indexer, "categories"),
            DisplayType::Checkbox
        );
        assert_eq!(
            registry.get_display_type(ProviderKind::Indexer, "authors"),
            DisplayType::Dropdown
        );
        assert_eq!(
            registry.get_display_type(ProviderKind::Aggregation, "regions-countries"),
            DisplayType::Radio
        );
        assert_eq!(
            registry.get_display_type(ProviderKind::Aggregation, "years"),
            DisplayType::Dropdown
        );
    }

    #[test]
    fn unknown_names_use_asymmetric_defaults() {
        let registry = FacetRegistry::builtin();
        assert_eq!(
            registry.get_display_type(ProviderKind::Indexer, "mystery"),
            DisplayType::Checkbox
        );
        assert_eq!(
            registry.get_display_type(ProviderKind::Aggregation, "mystery"),
            DisplayType::Radio
        );
    }

    #[test]
    fn definitions_carry_resolved_display_type() {
        let registry = FacetRegistry::builtin();
        let years = registry
            .provider(ProviderKind::Indexer)
            .definition("years")
            .unwrap();
        assert_eq!(years.display_type, DisplayType::Dropdown);
        assert!(years.source.is_date_derived());
    }

    #[test]
    fn toml_config_overrides_tables_and_dedupes() {
        let raw = r#"
[indexer]
url_prefix = "_"
default_display_type = "radio"

[[indexer.facets]]
name = "formats"
label = "Formats"
source = "tax/formats"
type = "checkboxes"

[[indexer.facets]]
name = "formats"
label = "Duplicate"

[[indexer.facets]]
name = "programs"
label = "Programs"
source = "tax/programs"
"#;
        let registry = FacetRegistry::new(RegistryConfig::from_toml_str(raw).unwrap());
        let indexer = registry.provider(ProviderKind::Indexer);
        assert_eq!(indexer.list_facet_definitions().len(), 2);
        assert_eq!(indexer.url_prefix(), "_");
        assert_eq!(indexer.get_display_type("programs"), DisplayType::Radio);
        assert_eq!(indexer.get_display_type("formats"), DisplayType::Checkbox);
        assert!(registry.list_facet_definitions(ProviderKind::Aggregation).is_empty());
        assert_eq!(registry.provider(ProviderKind::Aggregation).url_prefix(), "ep_filter_");
    }

    #[test]
    fn unreadable_or_corrupt_config_yields_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let missing = FacetRegistry::load(&dir.path().join("missing.toml"));
        assert!(missing.list_facet_definitions(ProviderKind::Indexer).is_empty());

        let corrupt_path = dir.path().join("corrupt.toml");
        std::fs::write(&corrupt_path, "[[indexer.facets]\nname = ").unwrap();
        let corrupt = FacetRegistry::load(&corrupt_path);
        assert!(corrupt.list_facet_definitions(ProviderKind::Indexer).is_empty());
        assert!(corrupt.list_facet_definitions(ProviderKind::Aggregation).is_empty());
    }
}
