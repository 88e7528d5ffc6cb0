use async_trait::async_trait;
use facets_engine::{FacetError, ProviderQuery, ProviderTransport, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// POSTs provider queries as JSON to `<base_url>/<endpoint>`.
pub struct HttpTransport {
    http: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FacetError::invalid_config(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }
}

#[async_trait]
impl ProviderTransport for HttpTransport {
    async fn send(&self, query: &ProviderQuery) -> Result<Value> {
        let url = self.url_for(&query.endpoint);
        log::debug!("POST {url} ({})", query.provider);
        let response = self
            .http
            .post(&url)
            .json(&query.body)
            .send()
            .await
            .map_err(|e| FacetError::transport(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FacetError::transport(format!("{url} answered {status}")));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| FacetError::malformed(format!("{url}: {e}")))
    }
}
