//! HTTP plumbing shared by the repository adapters
//!
//! This module handles:
//! - Building the HTTP client with the crawler's user agent string
//! - Resolving links against a source's base URL
//! - GET and JSON POST requests
//! - Mapping transport failures and statuses onto `AdapterError`

use crate::config::UserAgentConfig;
use crate::sources::AdapterError;
use crate::ConfigError;
use reqwest::header::{HeaderMap, ACCEPT};
use reqwest::{redirect::Policy, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// The cookie store stays on for the life of the client; some repositories
/// set a session cookie on the first response and bounce requests without it.
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Total time allowed for one request
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(20))
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// A client bound to one repository's base URL
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base_url: Url,
}

impl HttpFetcher {
    /// Binds a client to a base URL such as `https://dl.acm.org`
    pub fn new(client: Client, base_url: &str) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("'{}': {}", base_url, e)))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds an absolute URL for a path on this source
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Resolves a link found in a page against the base URL
    ///
    /// Returns None for empty hrefs and non-http(s) schemes.
    pub fn resolve(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }

        let url = self.base_url.join(href).ok()?;
        matches!(url.scheme(), "http" | "https").then(|| url.to_string())
    }

    /// Sends a GET request and returns the body text
    pub async fn get_text<Q: Serialize + ?Sized>(
        &self,
        url: &str,
        query: &Q,
    ) -> Result<String, AdapterError> {
        tracing::debug!("GET {}", url);
        let request = self.client.get(url).query(query);
        let response = send(request, url).await?;

        response.text().await.map_err(|e| classify(e, url))
    }

    /// Sends a JSON POST request and decodes the JSON response
    ///
    /// A body that is not the expected JSON is a malformed response.
    pub async fn post_json<B, T>(
        &self,
        url: &str,
        body: &B,
        headers: HeaderMap,
    ) -> Result<T, AdapterError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        tracing::debug!("POST {}", url);
        let request = self
            .client
            .post(url)
            .header(ACCEPT, "application/json, text/plain, */*")
            .headers(headers)
            .json(body);
        let response = send(request, url).await?;

        let text = response.text().await.map_err(|e| classify(e, url))?;
        serde_json::from_str(&text).map_err(|e| AdapterError::Malformed {
            url: url.to_string(),
            reason: format!("unexpected JSON: {}", e),
        })
    }
}

async fn send(request: RequestBuilder, url: &str) -> Result<reqwest::Response, AdapterError> {
    let response = request.send().await.map_err(|e| classify(e, url))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AdapterError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    Ok(response)
}

/// Maps a reqwest failure onto the adapter error taxonomy
fn classify(error: reqwest::Error, url: &str) -> AdapterError {
    if error.is_timeout() {
        AdapterError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_decode() || error.is_builder() {
        // A request that cannot be built fails the same way on every attempt
        AdapterError::Malformed {
            url: url.to_string(),
            reason: error.to_string(),
        }
    } else {
        AdapterError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
