//! Utility functions for the lobby session client

use crate::types::LobbyId;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique lobby ID
pub fn generate_lobby_id() -> LobbyId {
    Uuid::new_v4().to_string()
}

/// Generate a short human-shareable join code
///
/// Codes are uppercase alphanumerics derived from fresh uuid material; the
/// directory re-draws on the rare collision.
pub fn generate_join_code(length: usize) -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .to_uppercase()
        .chars()
        .take(length)
        .collect()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}
