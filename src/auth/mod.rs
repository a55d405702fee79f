// Authentication module
// Manages the session token lifecycle: decoding, storage and renewal

mod claims;
mod manager;
mod refresh;
mod types;

pub use claims::{decode_claims, is_expired, is_expiring_soon, Claims};
pub use manager::{
    TokenManager, DEFAULT_REFRESH_THRESHOLD_MINUTES, MAX_REFRESH_THRESHOLD_MINUTES,
};
pub use types::{CredentialPair, SessionStatus};
