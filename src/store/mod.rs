// Credential storage
// Persistent key-value storage for the session's credential pair

mod memory;
mod sqlite;

pub use memory::MemoryTokenStore;
pub use sqlite::SqliteTokenStore;

use crate::error::StoreError;

/// Key of the short-lived access token
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Key of the long-lived refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Key of the token type returned by the auth service (usually "bearer")
pub const TOKEN_TYPE_KEY: &str = "token_type";

/// All keys owned by the session, in write order
pub const CREDENTIAL_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, TOKEN_TYPE_KEY];

/// Client-persistent key-value storage.
///
/// A missing key is a valid "logged out" state and reads back as `None`.
/// `set_many` must apply either all entries or none of them.
///
/// Calls are synchronous and are made from async code on runtime worker
/// threads. Implementations must stay cheap (a handful of small rows); a
/// slower backend belongs behind `tokio::task::spawn_blocking`.
pub trait TokenStore: Send + Sync {
    /// Read a single entry
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write several entries as one batch
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StoreError>;

    /// Delete several entries; absent keys are ignored
    fn remove_many(&self, keys: &[&str]) -> Result<(), StoreError>;
}
