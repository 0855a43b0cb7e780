//! `reqwest`-backed implementation of [`DeviceApi`].

use super::api::{DeviceApi, ReadEndpoint, WriteCommand};
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use log::{debug, trace};
use serde_json::Value;
use std::time::Duration;

/// HTTP client for one device at `http://<address>`.
pub struct HttpDeviceClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpDeviceClient {
    /// Build a client for the device at `address` (host, host:port or full URL).
    pub fn new(address: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, address, token))
    }

    /// Build a client around an existing `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, address: &str, token: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url(address),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn check_status(endpoint: &str, response: &reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(BridgeError::HttpStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            })
        }
    }
}

fn base_url(address: &str) -> String {
    let address = address.trim().trim_end_matches('/');
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{address}")
    }
}

#[async_trait]
impl DeviceApi for HttpDeviceClient {
    async fn read(&self, endpoint: ReadEndpoint) -> Result<Value> {
        let url = format!("{}{}", self.base_url, endpoint.path());
        trace!("GET {}", url);

        let response = self.authorize(self.http.get(&url)).send().await?;
        Self::check_status(endpoint.path(), &response)?;

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn write(&self, command: WriteCommand) -> Result<()> {
        let path = command.path();
        let url = format!("{}{}", self.base_url, path);
        let form = command.form();
        debug!("POST {} {:?}", url, form);

        let mut request = self.http.post(&url);
        if !form.is_empty() {
            request = request.form(&form);
        }
        let response = self.authorize(request).send().await?;
        Self::check_status(&path, &response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalisation() {
        assert_eq!(base_url("192.168.1.50"), "http://192.168.1.50");
        assert_eq!(base_url("dingz.local:8080/"), "http://dingz.local:8080");
        assert_eq!(base_url("https://dingz.example"), "https://dingz.example");
    }

    #[test]
    fn test_empty_token_is_dropped() {
        let client = HttpDeviceClient::with_client(reqwest::Client::new(), "host", Some(String::new()));
        assert!(client.token.is_none());
    }
}
