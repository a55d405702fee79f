// Authentication types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Credential pair handed over by an external login
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: Option<String>,
}

/// Token data from a successful refresh response
#[derive(Debug, Clone, PartialEq)]
pub struct TokenData {
    pub access_token: String,
    /// Absent when the auth service does not rotate refresh tokens
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
}

/// Refresh request body
#[derive(Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Refresh response body
#[derive(Deserialize)]
pub struct RefreshResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Snapshot of the stored session, for diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub has_access_token: bool,
    pub has_refresh_token: bool,
    pub token_type: Option<String>,
    /// Decoded access token expiry; `None` if absent or undecodable
    pub access_token_expires_at: Option<DateTime<Utc>>,
}
