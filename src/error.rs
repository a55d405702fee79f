// Error handling module
// Defines error types for token decoding, storage, renewal and requests

use thiserror::Error;

/// Failure to decode the claims segment of an access token.
/// Callers treat every variant as "expired".
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Token has no second dot-separated segment
    #[error("token has no payload segment")]
    MissingPayload,

    /// Payload segment is not valid base64url
    #[error("payload is not valid base64url: {0}")]
    Base64(String),

    /// Payload is not a JSON object with a numeric `exp`
    #[error("payload is not valid claims JSON: {0}")]
    Json(String),
}

/// Errors raised by a token store
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite failure
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem failure (e.g. creating the database directory)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a token renewal did not produce a new access token
#[derive(Error, Debug)]
pub enum RefreshError {
    /// No refresh token is stored
    #[error("no refresh token stored")]
    NoRefreshToken,

    /// Renewal request never produced a response
    #[error("refresh request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Renewal endpoint answered with a non-2xx status
    #[error("refresh rejected: {status} - {body}")]
    Rejected { status: u16, body: String },

    /// Response body could not be parsed
    #[error("invalid refresh response: {0}")]
    InvalidResponse(String),

    /// Response parsed but carried no access token
    #[error("refresh response does not contain access_token")]
    MissingAccessToken,

    /// Credential store could not be read or written
    #[error("credential store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from the authenticated request wrapper.
/// HTTP error statuses are not errors: they come back as responses.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Request could not be sent or no response arrived
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Token contains characters not allowed in a header value
    #[error("invalid Authorization header value")]
    InvalidHeader,

    /// Path could not be joined onto the API base URL
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_messages() {
        assert_eq!(
            DecodeError::MissingPayload.to_string(),
            "token has no payload segment"
        );
        assert_eq!(
            DecodeError::Json("missing field `exp`".to_string()).to_string(),
            "payload is not valid claims JSON: missing field `exp`"
        );
    }

    #[test]
    fn test_refresh_error_messages() {
        let err = RefreshError::Rejected {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "refresh rejected: 500 - boom");

        assert_eq!(
            RefreshError::NoRefreshToken.to_string(),
            "no refresh token stored"
        );
        assert_eq!(
            RefreshError::MissingAccessToken.to_string(),
            "refresh response does not contain access_token"
        );
    }

    #[test]
    fn test_store_error_wraps_io() {
        let err: StoreError = std::io::Error::new(std::io::ErrorKind::Other, "disk full").into();
        assert_eq!(err.to_string(), "I/O error: disk full");

        let err: RefreshError = err.into();
        assert_eq!(err.to_string(), "credential store error: I/O error: disk full");
    }

    #[test]
    fn test_fetch_error_messages() {
        assert_eq!(
            FetchError::InvalidHeader.to_string(),
            "invalid Authorization header value"
        );
        assert_eq!(
            FetchError::InvalidUrl("relative URL without a base".to_string()).to_string(),
            "invalid request URL: relative URL without a base"
        );
    }
}
