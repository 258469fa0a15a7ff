//! Mailosaur async client implementation.

use crate::models::{MessageListResult, latest};
use crate::poll::poll_until;
use crate::{Error, Message, MessageSummary, Result, SearchCriteria, SearchOptions};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Async client for the Mailosaur email testing API.
///
/// Use [`Client::new`] for defaults or [`Client::builder`] for custom settings
/// like a different endpoint, proxies, or a custom user agent.
///
/// The client only holds immutable configuration and a connection pool, so it
/// is cheap to clone and safe to share between concurrent searches.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    proxy: Option<String>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("proxy", &self.proxy)
            .finish()
    }
}

impl Client {
    /// Create a builder for configuring the client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client for the default endpoint.
    ///
    /// # Examples
    /// ```no_run
    /// # use mailosaur_client::Client;
    /// # fn main() -> Result<(), mailosaur_client::Error> {
    /// let client = Client::new("YOUR-API-KEY")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        ClientBuilder::new().api_key(api_key).build()
    }

    /// Create a client from `MAILOSAUR_API_KEY` and, if set,
    /// `MAILOSAUR_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| Error::Config(format!("{API_KEY_ENV} is not set")))?;
        let mut builder = ClientBuilder::new().api_key(api_key);
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            builder = builder.base_url(base_url);
        }
        builder.build()
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the proxy URL if one was configured.
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    /// Wait for a message matching `criteria` to arrive on `server`.
    ///
    /// Polls the search endpoint until a match appears or
    /// [`SearchOptions::timeout`] elapses. When several messages match, the
    /// most recently received one is returned.
    ///
    /// # Errors
    /// - [`Error::Validation`] for an empty server id or empty criteria,
    ///   before any request is made.
    /// - [`Error::Authentication`] as soon as the API key is refused.
    /// - [`Error::SearchTimeout`] when nothing matched in time.
    /// - [`Error::Cancelled`] when the cancel channel fires.
    ///
    /// # Examples
    /// ```no_run
    /// # use mailosaur_client::{Client, SearchCriteria, SearchOptions};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), mailosaur_client::Error> {
    /// let client = Client::new("YOUR-API-KEY")?;
    /// let criteria = SearchCriteria::new().with_sent_to("anything@abc123.mailosaur.net");
    /// let message = client
    ///     .search("abc123", &criteria, &SearchOptions::default())
    ///     .await?;
    /// println!("{}", message.subject);
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all, fields(server = %server))]
    pub async fn search(
        &self,
        server: &str,
        criteria: &SearchCriteria,
        options: &SearchOptions,
    ) -> Result<Message> {
        validate_server(server)?;
        criteria.validate()?;

        let message = poll_until(options, move |attempt| async move {
            let items = self.query(server, criteria, 0).await?;
            debug!(attempt, matches = items.len(), "search attempt");
            let Some(summary) = latest(items) else {
                return Ok(None);
            };
            match self.get_message(&summary.id).await {
                Ok(message) => Ok(Some(message)),
                // deleted between search and fetch
                Err(Error::Status {
                    status: StatusCode::NOT_FOUND,
                    ..
                }) => Ok(None),
                Err(err) => Err(err),
            }
        })
        .await?;

        info!(id = %message.id, "message found");
        Ok(message)
    }

    /// Run a single search request without waiting.
    ///
    /// Returns the matching summaries of the given page in service order.
    pub async fn query(
        &self,
        server: &str,
        criteria: &SearchCriteria,
        page: u32,
    ) -> Result<Vec<MessageSummary>> {
        validate_server(server)?;
        criteria.validate()?;

        let mut params = page_params(server, page);
        params.extend(criteria.time_params());

        let request = self
            .http
            .post(self.url("/api/messages/search"))
            .query(&params)
            .json(criteria);
        let result: MessageListResult = self.send_json(request).await?;
        Ok(result.items)
    }

    /// List the messages of a server, newest first as ordered by the service.
    pub async fn list_messages(&self, server: &str, page: u32) -> Result<Vec<MessageSummary>> {
        validate_server(server)?;
        let request = self
            .http
            .get(self.url("/api/messages"))
            .query(&page_params(server, page));
        let result: MessageListResult = self.send_json(request).await?;
        Ok(result.items)
    }

    /// Fetch the full content of a message.
    pub async fn get_message(&self, id: &str) -> Result<Message> {
        validate_id(id)?;
        let request = self.http.get(self.message_url(id)?);
        self.send_json(request).await
    }

    /// Delete a single message.
    pub async fn delete_message(&self, id: &str) -> Result<()> {
        validate_id(id)?;
        let request = self.http.delete(self.message_url(id)?);
        self.send(request).await?;
        Ok(())
    }

    /// Delete every message of a server.
    pub async fn delete_all(&self, server: &str) -> Result<()> {
        validate_server(server)?;
        let request = self
            .http
            .delete(self.url("/api/messages"))
            .query(&[("server", server)]);
        self.send(request).await?;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `/api/messages/{id}` with the id percent-encoded as one path segment.
    fn message_url(&self, id: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.url("/api/messages"))
            .map_err(|e| Error::Config(format!("invalid base URL {:?}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("base URL {:?} cannot take a path", self.base_url)))?
            .push(id);
        Ok(url)
    }

    /// Authenticate, send, and map non-success statuses to errors.
    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request.basic_auth(&self.api_key, Some("")).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                debug!(%status, error = %err, "failed to read error response body");
                String::new()
            }
        };
        Err(Error::from_status(status, body))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let body = self.send(request).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

fn page_params(server: &str, page: u32) -> Vec<(&'static str, String)> {
    vec![
        ("server", server.to_string()),
        ("page", page.to_string()),
        ("itemsPerPage", ITEMS_PER_PAGE.to_string()),
    ]
}

fn validate_server(server: &str) -> Result<()> {
    if server.trim().is_empty() {
        return Err(Error::Validation("server id must not be empty".into()));
    }
    Ok(())
}

fn validate_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::Validation("message id must not be empty".into()));
    }
    Ok(())
}

const DEFAULT_BASE_URL: &str = "https://mailosaur.com";
const USER_AGENT_VALUE: &str = concat!("mailosaur-client-rs/", env!("CARGO_PKG_VERSION"));
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const ITEMS_PER_PAGE: u32 = 50;
const API_KEY_ENV: &str = "MAILOSAUR_API_KEY";
const BASE_URL_ENV: &str = "MAILOSAUR_BASE_URL";

/// Builder for configuring a Mailosaur client.
///
/// Start with [`Client::builder`] to override defaults.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    api_key: Option<String>,
    base_url: String,
    proxy: Option<String>,
    danger_accept_invalid_certs: bool,
    user_agent: String,
    request_timeout: Duration,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    /// Create a new builder with default settings.
    ///
    /// Defaults:
    /// - No API key (required before [`build`](Self::build))
    /// - `https://mailosaur.com` as base URL
    /// - No proxy
    /// - `danger_accept_invalid_certs = false`
    /// - 30s per-request timeout
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            proxy: None,
            danger_accept_invalid_certs: false,
            user_agent: USER_AGENT_VALUE.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Set the API key, found in the API tab of a server.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Override the service endpoint.
    ///
    /// Useful for testing or for non-default environments.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set a proxy URL (e.g., "socks5://127.0.0.1:1080").
    ///
    /// This uses reqwest's proxy support for all requests.
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Control whether to accept invalid TLS certificates (default: false).
    pub fn danger_accept_invalid_certs(mut self, value: bool) -> Self {
        self.danger_accept_invalid_certs = value;
        self
    }

    /// Override the default user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Timeout of a single HTTP request. Distinct from the search timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Validate the settings and build the client.
    ///
    /// No request is made.
    ///
    /// # Examples
    /// ```
    /// # use mailosaur_client::Client;
    /// # fn main() -> Result<(), mailosaur_client::Error> {
    /// let client = Client::builder()
    ///     .api_key("YOUR-API-KEY")
    ///     .base_url("http://localhost:8080/")
    ///     .user_agent("my-app/1.0")
    ///     .build()?;
    /// assert_eq!(client.base_url(), "http://localhost:8080");
    /// # Ok(())
    /// # }
    /// ```
    pub fn build(self) -> Result<Client> {
        let api_key = self
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::Config("an API key is required".into()))?;

        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("invalid base URL {:?}: {e}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "unsupported base URL scheme {:?}",
                url.scheme()
            )));
        }

        let mut builder = reqwest::Client::builder()
            .danger_accept_invalid_certs(self.danger_accept_invalid_certs)
            .timeout(self.request_timeout)
            .user_agent(self.user_agent)
            .default_headers(default_headers());

        if let Some(proxy_url) = &self.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| Error::Config(format!("invalid proxy {proxy_url:?}: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let http = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Client {
            http,
            api_key,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            proxy: self.proxy,
        })
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers
}
