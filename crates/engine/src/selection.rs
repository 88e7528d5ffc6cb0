//! URL encoding of facet selections and the mutations the facet panel applies to them.

use crate::label::{humanize, sanitize_slug};
use facets_protocol::{DisplayType, FacetDefinition, Selection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Read `<prefix><facet>` for every registered facet and split comma-joined values.
/// Facets without a value are left out; parameters for unregistered facets are ignored.
pub fn extract_selection(
    params: &BTreeMap<String, String>,
    prefix: &str,
    facets: &[FacetDefinition],
) -> Selection {
    let mut selection = Selection::new();
    for facet in facets {
        let key = format!("{prefix}{}", facet.name);
        let Some(raw) = params.get(&key) else {
            continue;
        };
        let values = split_values(raw);
        if !values.is_empty() {
            selection.insert(facet.name.clone(), values);
        }
    }
    selection
}

/// Inverse of [`extract_selection`]: `(key, comma-joined values)` pairs in facet order.
pub fn encode_selection(selection: &Selection, prefix: &str) -> Vec<(String, String)> {
    selection
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(facet, values)| (format!("{prefix}{facet}"), values.join(",")))
        .collect()
}

/// Apply a click on `value`: a selected value is removed, radio and dropdown facets
/// replace their selection, checkboxes append.
pub fn toggle_choice(selection: &mut Selection, facet: &str, value: &str, display_type: DisplayType) {
    let current = selection.entry(facet.to_string()).or_default();
    if let Some(pos) = current.iter().position(|v| v == value) {
        current.remove(pos);
    } else if display_type.is_single_valued() {
        *current = vec![value.to_string()];
    } else {
        current.push(value.to_string());
    }
    if current.is_empty() {
        selection.remove(facet);
    }
}

pub fn clear_facet(selection: &mut Selection, facet: &str) {
    selection.remove(facet);
}

/// One removable "active filter" pill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedToken {
    /// The facet this value belongs to.
    pub value: String,
    pub slug: String,
    pub label: String,
}

pub fn selection_tokens(selection: &Selection) -> Vec<SelectedToken> {
    selection
        .iter()
        .flat_map(|(facet, values)| {
            values.iter().map(move |value| SelectedToken {
                value: facet.clone(),
                slug: sanitize_slug(value),
                label: humanize(value),
            })
        })
        .collect()
}

fn split_values(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn facets(names: &[&str]) -> Vec<FacetDefinition> {
        names
            .iter()
            .map(|n| FacetDefinition::new(*n, *n, "tax/category"))
            .collect()
    }

    #[test]
    fn extract_reads_prefixed_comma_joined_values() {
        let params: BTreeMap<String, String> = [
            ("ep_filter_category", "economy, religion,,"),
            ("ep_filter_bylines", ""),
            ("ep_filter_unknown", "x"),
            ("category", "ignored-without-prefix"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let sel = extract_selection(&params, "ep_filter_", &facets(&["category", "bylines"]));
        assert_eq!(sel.len(), 1);
        assert_eq!(sel["category"], vec!["economy", "religion"]);
    }

    #[test]
    fn encode_is_inverse_of_extract() {
        let mut sel = Selection::new();
        sel.insert("formats".into(), vec!["report".into(), "short-read".into()]);
        sel.insert("years".into(), vec!["2021".into()]);
        let pairs = encode_selection(&sel, "");
        assert_eq!(
            pairs,
            vec![
                ("formats".to_string(), "report,short-read".to_string()),
                ("years".to_string(), "2021".to_string())
            ]
        );
        let params: BTreeMap<String, String> = pairs.into_iter().collect();
        assert_eq!(extract_selection(&params, "", &facets(&["formats", "years"])), sel);
    }

    #[test]
    fn toggle_follows_control_semantics() {
        let mut sel = Selection::new();
        toggle_choice(&mut sel, "formats", "report", DisplayType::Checkbox);
        toggle_choice(&mut sel, "formats", "feature", DisplayType::Checkbox);
        assert_eq!(sel["formats"], vec!["report", "feature"]);

        toggle_choice(&mut sel, "formats", "report", DisplayType::Checkbox);
        assert_eq!(sel["formats"], vec!["feature"]);

        toggle_choice(&mut sel, "regions", "asia", DisplayType::Radio);
        toggle_choice(&mut sel, "regions", "europe", DisplayType::Radio);
        assert_eq!(sel["regions"], vec!["europe"]);

        toggle_choice(&mut sel, "regions", "europe", DisplayType::Radio);
        assert!(!sel.contains_key("regions"));

        clear_facet(&mut sel, "formats");
        assert!(sel.is_empty());
    }

    #[test]
    fn tokens_humanize_values() {
        let mut sel = Selection::new();
        sel.insert("authors".into(), vec!["jane-doe".into()]);
        sel.insert("formats".into(), vec!["short_read".into(), "report".into()]);
        let tokens = selection_tokens(&sel);
        assert_eq!(tokens.len(), 3);
        assert_eq!(
            tokens[0],
            SelectedToken {
                value: "authors".into(),
                slug: "jane-doe".into(),
                label: "Jane Doe".into()
            }
        );
        assert_eq!(tokens[1].label, "Short Read");
        assert_eq!(tokens[1].slug, "short_read");
    }
}
