use axum::{
    body::Body,
    http::{Response as HttpResponse, StatusCode},
    response::Response,
};
use facets_protocol::{serialize_json, ErrorEnvelope};
use serde::Serialize;

pub(crate) fn error_response(code: &str, message: String) -> ErrorEnvelope {
    let hint = match code {
        "invalid_request" => {
            "Send a JSON FacetRequest: {\"query\": {...}, \"url_params\": {...}, \"path\": \"/reports/\", \"provider\": \"indexer\"}."
        }
        "not_found" => "Available routes: GET /facets/get-settings, POST /facets/resolve, GET /health.",
        _ => "Check the server log for details.",
    };
    ErrorEnvelope::new(code, message).with_hint(hint)
}

pub(crate) fn build_response<T: Serialize>(
    status: StatusCode,
    body: &T,
) -> Result<Response, StatusCode> {
    let bytes = serialize_json(body)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .into_bytes();

    HttpResponse::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(bytes))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_carries_code_and_hint() {
        let envelope = error_response("invalid_request", "bad json".to_string());
        assert_eq!(envelope.code, "invalid_request");
        assert_eq!(envelope.message, "bad json");
        assert!(envelope.hint.unwrap().contains("FacetRequest"));
    }

    #[test]
    fn responses_are_json() {
        let response = build_response(StatusCode::OK, &serde_json::json!({"ok": true})).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );
    }
}
