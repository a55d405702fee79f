// Token refresh logic

use reqwest::Client;

use super::types::{RefreshRequest, RefreshResponse, TokenData};
use crate::error::RefreshError;

/// Get the renewal endpoint for an API base URL
pub fn refresh_url(api_base_url: &str) -> String {
    format!("{}/auth/refresh", api_base_url.trim_end_matches('/'))
}

/// Exchange a refresh token for a new access token.
/// Performs exactly one request and never retries.
pub async fn request_refresh(
    client: &Client,
    url: &str,
    refresh_token: &str,
) -> Result<TokenData, RefreshError> {
    tracing::info!("Refreshing access token...");

    let response = client
        .post(url)
        .json(&RefreshRequest { refresh_token })
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RefreshError::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    let data: RefreshResponse = response
        .json()
        .await
        .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;

    let access_token = data
        .access_token
        .filter(|token| !token.is_empty())
        .ok_or(RefreshError::MissingAccessToken)?;

    tracing::info!(
        rotated = data.refresh_token.is_some(),
        "Access token refreshed"
    );

    Ok(TokenData {
        access_token,
        refresh_token: data.refresh_token.filter(|token| !token.is_empty()),
        token_type: data.token_type.filter(|token_type| !token_type.is_empty()),
    })
}
