use assert_cmd::prelude::*;
use serde_json::Value;
use std::process::Command;

fn settings(args: &[&str]) -> Value {
    let output = Command::new(assert_cmd::cargo::cargo_bin!("facets"))
        .arg("settings")
        .args(args)
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}

fn names(settings: &Value) -> Vec<String> {
    settings["facets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn archive_template_lists_indexer_facets() {
    let out = settings(&[]);
    assert_eq!(out["provider"], "indexer");
    assert_eq!(out["url_prefix"], "");
    assert_eq!(names(&out)[0], "categories");
    assert_eq!(out["facets"][3]["name"], "authors");
    assert_eq!(out["facets"][3]["facet_type"], "dropdown");
}

#[test]
fn search_template_lists_aggregation_facets() {
    let out = settings(&["--template-slug", "search-results"]);
    assert_eq!(out["provider"], "aggregation");
    assert_eq!(out["url_prefix"], "ep_filter_");
    assert!(names(&out).contains(&"bylines".to_string()));
}

#[test]
fn registry_file_overrides_catalog_and_bad_file_empties_it() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("facets.toml");
    std::fs::write(
        &good,
        r#"
[[indexer.facets]]
name = "programs"
label = "Programs"
source = "tax/programs"
"#,
    )
    .unwrap();
    let out = settings(&["--config", good.to_str().unwrap()]);
    assert_eq!(names(&out), vec!["programs".to_string()]);
    assert_eq!(out["facets"][0]["facet_type"], "checkbox");

    let bad = dir.path().join("broken.toml");
    std::fs::write(&bad, "[[indexer.facets]\n").unwrap();
    let out = settings(&["--config", bad.to_str().unwrap()]);
    assert!(names(&out).is_empty());
}
