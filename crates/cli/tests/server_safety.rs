use assert_cmd::prelude::*;
use std::process::Command;

#[test]
fn serve_http_refuses_non_loopback_without_public() {
    Command::new(assert_cmd::cargo::cargo_bin!("facets"))
        .args(["serve-http", "--bind", "0.0.0.0:0"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("reaches beyond loopback"));
}

#[test]
fn unknown_cache_backend_is_rejected() {
    Command::new(assert_cmd::cargo::cargo_bin!("facets"))
        .args(["--cache-backend", "redis", "settings"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("Unsupported cache backend: redis"));
}
