//! HTTP delivery to the indexing service's content REST endpoint.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use tracing::{debug, trace};

use crate::config::DeliveryConfig;
use crate::deliver::DeliverySink;
use crate::error::{IndexerError, Result};

/// Where documents are posted, and the credentials to post them with.
#[derive(Debug, Clone)]
pub struct ServiceEndpoint {
    /// Scheme, host and port, e.g. `https://search.example.org`.
    pub host: String,
    /// REST path prefix, e.g. `/v2/rest/content`.
    pub path: String,
    /// Content type the documents are stored under.
    pub content_type: String,
    pub username: String,
    pub password: String,
}

impl ServiceEndpoint {
    /// `{host}{path}/{content_type}/{id}` with every added segment percent-encoded.
    pub fn document_url(&self, id: &str) -> Result<Url> {
        let base = format!(
            "{}/{}",
            self.host.trim_end_matches('/'),
            self.path.trim_matches('/')
        );
        let mut url = Url::parse(&base)
            .map_err(|e| IndexerError::InvalidConfig(format!("service URL '{base}': {e}")))?;
        url.path_segments_mut()
            .map_err(|()| IndexerError::InvalidConfig(format!("'{base}' cannot be a base URL")))?
            .pop_if_empty()
            .push(&self.content_type)
            .push(id);
        Ok(url)
    }
}

/// Posts documents with a blocking `reqwest` client.
///
/// The connection pool is sized for `concurrency + 1` because the thread that
/// submits work also delivers when the worker queue is full.
pub struct HttpSink {
    client: Client,
    endpoint: ServiceEndpoint,
}

impl HttpSink {
    /// Build the client for `concurrency` workers.
    pub fn new(endpoint: ServiceEndpoint, config: &DeliveryConfig, concurrency: usize) -> Result<Self> {
        // Fail at startup on a malformed host or path
        endpoint.document_url("check")?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_max_idle_per_host(concurrency + 1)
            .user_agent(concat!("mboxdelta/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IndexerError::InvalidConfig(format!("HTTP client: {e}")))?;

        debug!(
            host = %endpoint.host,
            path = %endpoint.path,
            content_type = %endpoint.content_type,
            max_connections = concurrency + 1,
            "HTTP sink ready"
        );
        Ok(Self { client, endpoint })
    }
}

impl DeliverySink for HttpSink {
    fn post(&self, json: &str, id: &str) -> Result<String> {
        let url = self.endpoint.document_url(id)?;
        trace!(url = %url, "Posting document");

        let delivery_error = |reason: String| IndexerError::Delivery {
            id: id.to_string(),
            reason,
        };

        let response = self
            .client
            .post(url)
            .basic_auth(&self.endpoint.username, Some(&self.endpoint.password))
            .header(CONTENT_TYPE, "application/json")
            .body(json.to_string())
            .send()
            .map_err(|e| delivery_error(e.to_string()))?;

        let status = response.status();
        let body = response.text().unwrap_or_default();
        if status.is_success() {
            Ok(body)
        } else {
            Err(delivery_error(format!("service returned status {status}: {body}")))
        }
    }
}
