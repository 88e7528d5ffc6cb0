//! Ordering of a resolved facet's choices into what the panel shows up front and what it
//! tucks behind "+ More".
//!
//! Dropdowns list everything: text labels reverse alphabetically, then numbers largest
//! first. Checkbox and radio facets show the selected choices first, then the biggest
//! counts, capped at the facet's limit; the rest (minus anything selected) becomes the
//! expanded list. Ties are broken by label and then
//! value so the output is reproducible.

use crate::label::{humanize, option_label};
use crate::registry::ProviderRegistry;
use facets_protocol::{Choice, DisplayType, FacetsPayload, ResolvedFacet};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

/// Visible choices when neither the caller nor the definition sets a limit.
pub const DEFAULT_CHOICE_LIMIT: usize = 10;
pub const EXPAND_LABEL: &str = "+ More";
pub const COLLAPSE_LABEL: &str = "- Less";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceLists {
    pub visible: Vec<Choice>,
    pub expanded: Vec<Choice>,
}

impl ChoiceLists {
    pub fn has_expanded_choices(&self) -> bool {
        !self.expanded.is_empty()
    }
}

pub fn present(facet: &ResolvedFacet, limit: usize) -> ChoiceLists {
    if facet.display_type == DisplayType::Dropdown {
        let mut visible = facet.choices.clone();
        visible.sort_by(dropdown_order);
        return ChoiceLists {
            visible,
            expanded: Vec::new(),
        };
    }

    let selected: HashSet<&str> = facet.selected.iter().map(String::as_str).collect();
    let is_selected = |c: &Choice| selected.contains(c.value.as_str());

    let mut order: Vec<usize> = (0..facet.choices.len()).collect();
    order.sort_by(|&a, &b| {
        let (a, b) = (&facet.choices[a], &facet.choices[b]);
        is_selected(b)
            .cmp(&is_selected(a))
            .then_with(|| by_count_desc(a, b))
    });

    let shown: HashSet<usize> = order.iter().copied().take(limit).collect();
    let visible = order
        .iter()
        .take(limit)
        .map(|&i| facet.choices[i].clone())
        .collect();

    let mut expanded: Vec<Choice> = order
        .iter()
        .filter(|i| !shown.contains(i))
        .map(|&i| &facet.choices[i])
        .filter(|c| !is_selected(c))
        .cloned()
        .collect();
    expanded.sort_by(by_count_desc);

    ChoiceLists { visible, expanded }
}

/// Present every facet of a payload, using each definition's soft limit when it has one.
pub fn present_payload(
    payload: &FacetsPayload,
    registry: &ProviderRegistry,
) -> BTreeMap<String, ChoiceLists> {
    payload
        .facets
        .iter()
        .map(|(slug, facet)| {
            let limit = registry
                .definition(slug)
                .and_then(|d| d.soft_limit)
                .map_or(DEFAULT_CHOICE_LIMIT, |l| l as usize);
            (slug.clone(), present(facet, limit))
        })
        .collect()
}

/// Zero-count choices cannot narrow the result set and render disabled.
pub fn is_disabled(choice: &Choice) -> bool {
    choice.count == 0
}

pub fn input_id(choice: &Choice) -> String {
    match choice.term_id {
        Some(term_id) => format!("facet_{}_{term_id}", choice.slug),
        None => format!("facet_{}", choice.slug),
    }
}

pub fn expand_label(expanded: bool) -> &'static str {
    if expanded {
        COLLAPSE_LABEL
    } else {
        EXPAND_LABEL
    }
}

/// Dropdowns show the current pick in place of the prompt.
pub fn placeholder(facet: &ResolvedFacet, label: &str) -> String {
    match facet.selected.first() {
        Some(first) if facet.display_type == DisplayType::Dropdown => humanize(first),
        _ => format!("Select {label}"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub value: String,
    pub label: String,
}

/// Dropdown type-ahead: choices whose label contains `term`, or all choices when nothing
/// matches.
pub fn filter_options(facet: &ResolvedFacet, term: Option<&str>) -> Vec<ChoiceOption> {
    let needle = term.map(str::trim).unwrap_or_default().to_lowercase();
    let matching: Vec<&Choice> = if needle.is_empty() {
        facet.choices.iter().collect()
    } else {
        let hits: Vec<&Choice> = facet
            .choices
            .iter()
            .filter(|c| c.label.to_lowercase().contains(&needle))
            .collect();
        if hits.is_empty() {
            facet.choices.iter().collect()
        } else {
            hits
        }
    };
    matching
        .into_iter()
        .map(|c| ChoiceOption {
            value: c.value.clone(),
            label: option_label(&c.label, c.count),
        })
        .collect()
}

fn by_count_desc(a: &Choice, b: &Choice) -> Ordering {
    b.count
        .cmp(&a.count)
        .then_with(|| a.label.cmp(&b.label))
        .then_with(|| a.value.cmp(&b.value))
}

fn numeric_label(label: &str) -> Option<f64> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Text labels in case-insensitive reverse alphabetical order, then numeric labels descending.
fn dropdown_order(a: &Choice, b: &Choice) -> Ordering {
    let primary = match (numeric_label(&a.label), numeric_label(&b.label)) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => b
            .label
            .to_lowercase()
            .cmp(&a.label.to_lowercase())
            .then_with(|| b.label.cmp(&a.label)),
    };
    primary.then_with(|| a.value.cmp(&b.value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn choice(value: &str, label: &str, count: u64, display_type: DisplayType) -> Choice {
        Choice {
            value: value.to_string(),
            slug: value.to_string(),
            label: label.to_string(),
            count,
            is_selected: false,
            facet_slug: "f".to_string(),
            term_id: None,
            is_required: false,
            display_type,
        }
    }

    fn facet(display_type: DisplayType, choices: &[(&str, u64)], selected: &[&str]) -> ResolvedFacet {
        let mut facet = ResolvedFacet::new(
            "f",
            display_type,
            selected.iter().map(|s| s.to_string()).collect(),
        );
        facet.choices = choices
            .iter()
            .map(|(v, c)| choice(v, v, *c, display_type))
            .collect();
        facet
    }

    fn values(choices: &[Choice]) -> Vec<&str> {
        choices.iter().map(|c| c.value.as_str()).collect()
    }

    #[test]
    fn checkbox_puts_selected_first_then_count() {
        let f = facet(
            DisplayType::Checkbox,
            &[("a", 5), ("b", 50), ("c", 1), ("d", 20), ("e", 20)],
            &["c"],
        );
        let lists = present(&f, 3);
        assert_eq!(values(&lists.visible), vec!["c", "b", "d"]);
        assert_eq!(values(&lists.expanded), vec!["e", "a"]);
        assert!(lists.has_expanded_choices());
    }

    #[test]
    fn expanded_excludes_selected_beyond_limit() {
        let f = facet(
            DisplayType::Radio,
            &[("a", 9), ("b", 8), ("c", 7), ("d", 6)],
            &["a", "b", "c"],
        );
        let lists = present(&f, 2);
        assert_eq!(values(&lists.visible), vec!["a", "b"]);
        assert_eq!(values(&lists.expanded), vec!["d"]);
    }

    #[test]
    fn dropdown_sorts_text_reverse_alpha_then_numbers_without_split() {
        let mut f = facet(DisplayType::Dropdown, &[], &[]);
        f.choices = vec![
            choice("2019", "2019", 3, DisplayType::Dropdown),
            choice("alice", "Alice Smith", 40, DisplayType::Dropdown),
            choice("2023", "2023", 1, DisplayType::Dropdown),
            choice("zed", "Zed Brown", 2, DisplayType::Dropdown),
            choice("bob", "bob jones", 2, DisplayType::Dropdown),
        ];
        let lists = present(&f, 1);
        assert_eq!(values(&lists.visible), vec!["zed", "bob", "alice", "2023", "2019"]);
        assert!(lists.expanded.is_empty());
    }

    #[test]
    fn dropdown_text_labels_precede_years() {
        let mut f = facet(DisplayType::Dropdown, &[], &[]);
        f.choices = ["2023", "Zed", "2019", "Alice"]
            .iter()
            .map(|label| choice(label, label, 1, DisplayType::Dropdown))
            .collect();
        let lists = present(&f, 10);
        let labels: Vec<&str> = lists.visible.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Zed", "Alice", "2023", "2019"]);
    }

    #[test]
    fn dropdown_digit_leading_text_stays_with_text() {
        let mut f = facet(DisplayType::Dropdown, &[], &[]);
        f.choices = ["10 Downing", "2020", "Abbey", "7"]
            .iter()
            .map(|label| choice(label, label, 1, DisplayType::Dropdown))
            .collect();
        let lists = present(&f, 10);
        let labels: Vec<&str> = lists.visible.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Abbey", "10 Downing", "2020", "7"]);
    }

    #[test]
    fn helpers_render_ui_strings() {
        let mut f = facet(DisplayType::Dropdown, &[("jane-doe", 300), ("sam", 0)], &[]);
        assert_eq!(placeholder(&f, "Authors"), "Select Authors");
        f.selected = vec!["jane-doe".to_string()];
        assert_eq!(placeholder(&f, "Authors"), "Jane Doe");

        assert!(is_disabled(&f.choices[1]));
        assert_eq!(input_id(&f.choices[0]), "facet_jane-doe");
        assert_eq!(expand_label(false), "+ More");
        assert_eq!(expand_label(true), "- Less");

        let options = filter_options(&f, Some("JANE"));
        assert_eq!(
            options,
            vec![ChoiceOption {
                value: "jane-doe".into(),
                label: "jane-doe (250+)".into()
            }]
        );
        assert_eq!(filter_options(&f, Some("nobody")).len(), 2);
        assert_eq!(filter_options(&f, None).len(), 2);
    }

    fn arb_facet(display_type: DisplayType) -> impl Strategy<Value = ResolvedFacet> {
        prop::collection::btree_map("[a-z]{1,6}", 0u64..100, 0..20).prop_flat_map(move |map| {
            let keys: Vec<String> = map.keys().cloned().collect();
            let n = keys.len();
            (Just(map), prop::collection::vec(any::<bool>(), n)).prop_map(move |(map, picks)| {
                let mut facet = ResolvedFacet::new("f", display_type, Vec::new());
                for ((value, count), pick) in map.into_iter().zip(picks) {
                    if pick {
                        facet.selected.push(value.clone());
                    }
                    facet.choices.push(choice(&value, &value, count, display_type));
                }
                facet
            })
        })
    }

    proptest! {
        #[test]
        fn visible_selected_count_is_bounded(f in arb_facet(DisplayType::Checkbox), limit in 0usize..25) {
            let lists = present(&f, limit);
            let selected_present = f.choices.iter().filter(|c| f.is_value_selected(&c.value)).count();
            let visible_selected = lists.visible.iter().filter(|c| f.is_value_selected(&c.value)).count();
            prop_assert_eq!(visible_selected, selected_present.min(limit));

            let first_unselected = lists.visible.iter().position(|c| !f.is_value_selected(&c.value));
            if let Some(pos) = first_unselected {
                prop_assert!(lists.visible[pos..].iter().all(|c| !f.is_value_selected(&c.value)));
            }
            prop_assert!(lists.expanded.iter().all(|c| !f.is_value_selected(&c.value)));
            prop_assert_eq!(present(&f, limit), lists);
        }

        #[test]
        fn dropdown_is_a_permutation(f in arb_facet(DisplayType::Dropdown)) {
            let lists = present(&f, 3);
            prop_assert_eq!(lists.visible.len(), f.choices.len());
            let mut a = values(&lists.visible);
            let mut b = values(&f.choices);
            a.sort();
            b.sort();
            prop_assert_eq!(a, b);
        }
    }
}
