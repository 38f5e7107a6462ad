/// One-shot authenticated HTTP calls to the hub
///
/// Independent of the persistent socket; used for request/response data
/// such as calendar windows.
use crate::logger::{self, LogTag};
use serde_json::Value;

use super::connector::UpstreamConnector;
use super::UpstreamError;

impl UpstreamConnector {
    fn api_url(&self, endpoint: &str) -> String {
        format!(
            "{}/api/{}",
            self.hub_config().url.trim_end_matches('/'),
            endpoint
        )
    }

    /// GET an endpoint under the hub's /api/ prefix
    pub async fn http_get(&self, endpoint: &str) -> Result<Value, UpstreamError> {
        let url = self.api_url(endpoint);
        logger::debug(LogTag::Http, &format!("GET {}", url));

        let mut request = self.http_client().get(&url);
        if let Some(token) = &self.hub_config().access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(UpstreamError::Status(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }

    /// POST a JSON body to an endpoint under the hub's /api/ prefix
    pub async fn http_post(&self, endpoint: &str, body: Value) -> Result<Value, UpstreamError> {
        let url = self.api_url(endpoint);
        logger::debug(LogTag::Http, &format!("POST {}", url));

        let mut request = self.http_client().post(&url).json(&body);
        if let Some(token) = &self.hub_config().access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(UpstreamError::Status(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }
}
