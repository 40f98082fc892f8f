use crate::config::Config;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Path of the IP address listing that the export template is attached to
pub const EXPORT_PATH: &str = "api/ipam/ip-addresses/";

/// Source of the rendered reservation export.
#[async_trait]
pub trait InventorySource: Send + Sync {
    /// Fetch the full export text.
    async fn fetch(&self) -> Result<String>;
}

/// Inventory reached over HTTP with a token header.
pub struct HttpInventory {
    client: reqwest::Client,
    export_url: Url,
    api_token: String,
}

impl HttpInventory {
    /// Build a client for the inventory described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the export URL cannot be built or the HTTP client
    /// cannot be constructed
    pub fn from_config(config: &Config) -> Result<Self> {
        let export_url = export_url(&config.inventory_url, &config.export_template)?;
        Self::new(export_url, config.api_token.clone(), config.request_timeout())
    }

    /// Build a client for an explicit export URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed
    pub fn new(export_url: Url, api_token: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            export_url,
            api_token,
        })
    }

    #[must_use]
    pub fn export_url(&self) -> &Url {
        &self.export_url
    }
}

#[async_trait]
impl InventorySource for HttpInventory {
    async fn fetch(&self) -> Result<String> {
        debug!(url = %self.export_url, "Requesting inventory export");

        let response = self
            .client
            .get(self.export_url.clone())
            .header(AUTHORIZATION, format!("Token {}", self.api_token))
            .header(ACCEPT, "text/plain")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::HttpStatus(status));
        }

        let ctype = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !ctype.contains("text/plain") {
            return Err(SyncError::UnexpectedContentType(ctype));
        }

        let body = response.bytes().await?;
        let text = String::from_utf8(body.to_vec())
            .map_err(|e| SyncError::InvalidBody(format!("not UTF-8: {e}")))?;

        debug!(bytes = text.len(), "Inventory API call succeeded");
        Ok(text)
    }
}

/// Build the export URL for `template` below the inventory base URL.
///
/// # Errors
///
/// Returns an error if `base` is not a valid URL
pub fn export_url(base: &str, template: &str) -> Result<Url> {
    let mut base = Url::parse(base)
        .map_err(|e| SyncError::ConfigInvalid(format!("Invalid inventory URL {base}: {e}")))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    let mut url = base
        .join(EXPORT_PATH)
        .map_err(|e| SyncError::ConfigInvalid(format!("Invalid export URL: {e}")))?;
    url.query_pairs_mut().append_pair("export", template);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_url_from_bare_host() {
        let url = export_url("https://netbox.example.com", "dhcp_v1").unwrap();
        assert_eq!(
            url.as_str(),
            "https://netbox.example.com/api/ipam/ip-addresses/?export=dhcp_v1"
        );
    }

    #[test]
    fn test_export_url_keeps_base_path() {
        let url = export_url("https://example.com/netbox", "dhcp_v2").unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/netbox/api/ipam/ip-addresses/?export=dhcp_v2"
        );

        let url = export_url("https://example.com/netbox/", "dhcp_v1").unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/netbox/api/ipam/ip-addresses/?export=dhcp_v1"
        );
    }

    #[test]
    fn test_export_url_rejects_garbage() {
        assert!(matches!(
            export_url("not a url", "dhcp_v1"),
            Err(SyncError::ConfigInvalid(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host_is_fetch_error() {
        let url = Url::parse("http://127.0.0.1:9/api/ipam/ip-addresses/?export=dhcp_v1").unwrap();
        let inventory =
            HttpInventory::new(url, "token".to_string(), Duration::from_millis(500)).unwrap();

        let err = inventory.fetch().await.unwrap_err();
        assert!(err.is_fetch_error());
    }
}
