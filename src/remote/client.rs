//! Blocking HTTP client shared by the paste service adapters.

use crate::error::{Result, StoreError};
use reqwest::blocking::{Client, RequestBuilder, Response};
use std::time::Duration;
use url::Url;

/// Transport settings for remote backends.
#[derive(Clone, Debug)]
pub struct HttpSettings {
    pub user_agent: String,
    /// Applies to every request.
    pub request_timeout: Duration,
    /// Applies to the reachability probe only.
    pub probe_timeout: Duration,
    /// Honor `HTTP_PROXY` and friends from the environment.
    pub use_system_proxy: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: concat!("pastedb/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            use_system_proxy: true,
        }
    }
}

/// HTTP client bound to one service base URL.
#[derive(Clone, Debug)]
pub struct HttpClient {
    base_url: String,
    client: Client,
    probe_timeout: Duration,
}

impl HttpClient {
    pub fn new(base_url: &str, settings: &HttpSettings) -> Result<Self> {
        Url::parse(base_url)?;

        let mut builder = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.request_timeout);
        if !settings.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            probe_timeout: settings.probe_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for `path`, which must start with `/`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path))
    }

    /// Send a request and turn non-success statuses into errors.
    pub fn send(&self, request: RequestBuilder) -> Result<Response> {
        Ok(request.send()?.error_for_status()?)
    }

    /// `GET path` and return the body as text.
    pub fn get_text(&self, path: &str) -> Result<String> {
        Ok(self.send(self.get(path))?.text()?)
    }

    /// `HEAD` the base URL. Anything short of a server error counts as reachable.
    pub fn probe(&self) -> Result<()> {
        let response = self
            .client
            .head(&self.base_url)
            .timeout(self.probe_timeout)
            .send()?;

        let status = response.status();
        if status.is_server_error() {
            return Err(StoreError::UnexpectedResponse {
                url: self.base_url.clone(),
                reason: format!("server error {}", status),
            });
        }
        Ok(())
    }
}
