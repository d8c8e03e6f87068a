/// Raw request proxy
///
/// Passthrough fetch of an arbitrary upstream URL with a bounded
/// timeout. Replicates the panel-proxy behavior as-is: there is no host
/// allowlist, any URL the caller hands over is fetched (recorded in
/// DESIGN.md as a deliberate external-interface risk to revisit).
use url::Url;

use crate::logger::{self, LogTag};
use crate::upstream::client::HttpClient;

/// Response passed back to the caller unchanged
#[derive(Debug)]
pub struct ProxyResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Upstream passthrough client with its own (longer) timeout
pub struct ProxyClient {
    http: HttpClient,
}

impl ProxyClient {
    pub fn new(timeout_secs: u64) -> Result<Self, String> {
        Ok(Self {
            http: HttpClient::new(timeout_secs)?,
        })
    }

    /// Fetch the given URL and return status, content type and body
    /// verbatim. Non-2xx statuses are passed through, not treated as
    /// errors; only transport failures surface as `Err`.
    pub async fn fetch(&self, raw_url: &str) -> Result<ProxyResponse, String> {
        let url = Url::parse(raw_url).map_err(|e| format!("Invalid URL '{}': {}", raw_url, e))?;

        logger::debug(LogTag::Proxy, &format!("Proxying request to {}", url));

        let response = self
            .http
            .client()
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Upstream request failed: {}", e))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let body = response
            .bytes()
            .await
            .map_err(|e| format!("Upstream body read failed: {}", e))?
            .to_vec();

        Ok(ProxyResponse {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_invalid_url() {
        let proxy = ProxyClient::new(5).unwrap();
        let result = proxy.fetch("not a url").await;
        assert!(result.is_err());
    }
}
