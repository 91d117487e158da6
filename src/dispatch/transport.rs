//! HTTP transport: one POST per packed message.
//!
//! The client is built without a request timeout: a send waits as long as
//! the endpoint keeps the connection open.

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, error};

use super::{Transport, TransportError, TransportResponse};

/// Shares one connection pool across sends; cheap to clone.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder().build().map_err(|e| TransportError {
            endpoint: String::new(),
            reason: format!("failed to build HTTP client: {e}"),
        })?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn post(
        &self,
        endpoint: &str,
        media_type: &str,
        blob: String,
    ) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, media_type)
            .body(blob)
            .send()
            .await
            .map_err(|e| {
                error!(endpoint, error = %e, "HTTP request failed (transport)");
                TransportError { endpoint: endpoint.to_string(), reason: e.to_string() }
            })?;

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!(endpoint, status, error = %e, "could not read response body");
                String::new()
            }
        };
        Ok(TransportResponse { status, body })
    }
}
