use anyhow::{Context, Result};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, Request, RequestBuilder, Response, StatusCode, Url};
use std::time::Duration;

use crate::auth::TokenManager;
use crate::error::FetchError;

/// HTTP client for the platform API.
/// Attaches the session's bearer token and recovers once from a 401.
pub struct AuthenticatedClient {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// Session token manager
    tokens: TokenManager,

    /// API base URL that request paths are joined onto
    base_url: String,
}

impl AuthenticatedClient {
    /// Create a new HTTP client
    pub fn new(
        tokens: TokenManager,
        api_base_url: &str,
        max_connections: usize,
        connect_timeout: u64,
        request_timeout: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(max_connections)
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::with_client(client, tokens, api_base_url))
    }

    /// Wrap an existing reqwest client
    pub fn with_client(client: Client, tokens: TokenManager, api_base_url: &str) -> Self {
        Self {
            client,
            tokens,
            base_url: api_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resolve `path` against the API base URL.
    /// Absolute URLs pass through unchanged.
    pub fn url(&self, path: &str) -> Result<Url, FetchError> {
        let raw = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        };

        Url::parse(&raw).map_err(|e| FetchError::InvalidUrl(format!("{raw}: {e}")))
    }

    /// Start building a request to `path`; send it with `authenticated_fetch`
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, FetchError> {
        Ok(self.client.request(method, self.url(path)?))
    }

    /// Authenticated GET of `path`
    pub async fn get(&self, path: &str) -> Result<Response, FetchError> {
        let request = self.request(Method::GET, path)?.build()?;
        self.authenticated_fetch(request).await
    }

    /// Send `request` with the session's bearer token.
    ///
    /// On a 401 to a request that carried a token, the token is force-refreshed
    /// and the request replayed exactly once. If the refresh fails the original
    /// 401 response is returned. Non-401 responses are returned as they are.
    pub async fn authenticated_fetch(&self, request: Request) -> Result<Response, FetchError> {
        let method = request.method().clone();
        let url = request.url().clone();

        let token = self.tokens.get_valid_access_token().await;
        let replay = request.try_clone();

        tracing::debug!(
            method = %method,
            url = %url,
            authenticated = token.is_some(),
            "Sending HTTP request"
        );

        let request = with_bearer(request, token.as_deref())?;
        let response = self.client.execute(request).await?;

        if response.status() != StatusCode::UNAUTHORIZED || token.is_none() {
            tracing::debug!(status = %response.status(), "Received HTTP response");
            return Ok(response);
        }

        tracing::warn!(url = %url, "Received 401, refreshing token and retrying once");

        let Some(replay) = replay else {
            tracing::warn!(url = %url, "Request body is not cloneable, not retrying");
            return Ok(response);
        };

        let Some(new_token) = self.tokens.refresh().await else {
            tracing::warn!(url = %url, "Token refresh failed, returning 401 to caller");
            return Ok(response);
        };

        let retry = with_bearer(replay, Some(&new_token))?;
        let response = self.client.execute(retry).await?;

        tracing::debug!(status = %response.status(), "Received HTTP response on retry");
        Ok(response)
    }

    /// Get the session token manager
    pub fn token_manager(&self) -> &TokenManager {
        &self.tokens
    }

    /// Get the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Attach `Authorization: Bearer <token>` when a token is available
fn with_bearer(mut request: Request, token: Option<&str>) -> Result<Request, FetchError> {
    if let Some(token) = token {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| FetchError::InvalidHeader)?;
        value.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, value);
    }
    Ok(request)
}
