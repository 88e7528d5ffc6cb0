use crate::query::QueryArgs;
use facets_protocol::Selection;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::sync::OnceLock;

/// Baked into every cache key. Changing it orphans all previously cached entries.
pub const CACHE_INVALIDATION_MARKER: &str = "06/12/2025";

/// Fingerprint of a query + selection pair. Pagination never fragments the key.
pub fn construct_cache_key(query: &QueryArgs, selected: &Selection) -> String {
    let material = json!({
        "query": query.with_paged(1),
        "selected": selected,
        "invalidate": CACHE_INVALIDATION_MARKER,
    });
    let mut hasher = blake3::Hasher::new();
    hasher.update(canonical_json(&material).as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Cache partition derived from the route path with `/page/<n>` segments removed.
///
/// Returns `None` when the path is unknown or unusable; callers treat that as
/// "cache group unavailable".
pub fn construct_cache_group(path: Option<&str>) -> Option<String> {
    let raw = path?.trim();
    let raw = raw.split(['?', '#']).next().unwrap_or_default();
    if raw.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return None;
    }
    let raw = match raw.find("://") {
        Some(scheme_end) => {
            let rest = &raw[scheme_end + 3..];
            rest.find('/').map_or("", |idx| &rest[idx..])
        }
        None => raw,
    };

    let trimmed = raw.trim_matches('/');
    let mut group = if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    };

    let re = page_segment_regex();
    loop {
        let next = re.replace_all(&group, "/").into_owned();
        if next == group {
            break;
        }
        group = next;
    }
    Some(group)
}

fn page_segment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/page/[0-9]+/").expect("valid page segment regex"))
}

/// JSON with object keys sorted at every depth.
fn canonical_json(value: &Value) -> String {
    fn sort(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                let mut out = Map::new();
                for key in keys {
                    out.insert(key.clone(), sort(&map[key]));
                }
                Value::Object(out)
            }
            Value::Array(items) => Value::Array(items.iter().map(sort).collect()),
            other => other.clone(),
        }
    }
    sort(value).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn selection(pairs: &[(&str, &[&str])]) -> Selection {
        pairs
            .iter()
            .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
            .collect()
    }

    #[test]
    fn key_ignores_page_number() {
        let sel = selection(&[("categories", &["economy"])]);
        let q = QueryArgs::new().with("post_type", "post");
        assert_eq!(
            construct_cache_key(&q.with_paged(1), &sel),
            construct_cache_key(&q.with_paged(7), &sel)
        );
        assert_eq!(construct_cache_key(&q, &sel), construct_cache_key(&q.with_paged(3), &sel));
    }

    #[test]
    fn key_changes_with_selection() {
        let q = QueryArgs::new();
        let a = construct_cache_key(&q, &selection(&[("formats", &["report"])]));
        let b = construct_cache_key(&q, &selection(&[("formats", &["short-read"])]));
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn group_strips_pagination() {
        assert_eq!(
            construct_cache_group(Some("/reports/page/3/")),
            construct_cache_group(Some("/reports/"))
        );
        assert_eq!(construct_cache_group(Some("reports/page/12")), Some("/reports/".into()));
        assert_eq!(
            construct_cache_group(Some("/topics/economy/page/2/?_formats=report")),
            Some("/topics/economy/".into())
        );
        assert_eq!(
            construct_cache_group(Some("https://example.org/page/4/page/5/")),
            Some("/".into())
        );
    }

    #[test]
    fn group_keeps_lookalike_segments() {
        assert_eq!(
            construct_cache_group(Some("/page/about/")),
            Some("/page/about/".into())
        );
        assert_eq!(
            construct_cache_group(Some("/pages/3/")),
            Some("/pages/3/".into())
        );
    }

    #[test]
    fn group_unavailable_without_usable_path() {
        assert_eq!(construct_cache_group(None), None);
        assert_eq!(construct_cache_group(Some("/bad path/")), None);
    }

    proptest! {
        #[test]
        fn key_invariant_under_paged(page in 1u64..10_000, term in "[a-z]{1,12}") {
            let sel = selection(&[("categories", &[term.as_str()])]);
            let q = QueryArgs::new().with("post_type", "post").with("s", term.clone());
            prop_assert_eq!(
                construct_cache_key(&q.with_paged(1), &sel),
                construct_cache_key(&q.with_paged(page), &sel)
            );
        }

        #[test]
        fn group_invariant_under_page_segment(slug in "[a-z][a-z0-9-]{0,15}", page in 1u32..500) {
            let plain = format!("/{slug}/");
            let paged = format!("/{slug}/page/{page}/");
            prop_assert_eq!(
                construct_cache_group(Some(&plain)),
                construct_cache_group(Some(&paged))
            );
        }
    }
}
