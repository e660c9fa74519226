//! Common types used throughout the lobby session client

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for players, issued by the identity provider
pub type PlayerId = String;

/// Opaque lobby identifier, assigned by the remote directory on creation
pub type LobbyId = String;

/// Who may read a metadata entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    /// Readable by anyone querying the directory
    Public,
    /// Readable only by members of the lobby
    Member,
}

/// A single metadata entry: value plus its visibility
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataValue {
    pub value: String,
    pub visibility: Visibility,
}

impl MetadataValue {
    pub fn public(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            visibility: Visibility::Public,
        }
    }

    pub fn member(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            visibility: Visibility::Member,
        }
    }
}

/// String-keyed metadata attached to lobbies and players
pub type MetadataMap = HashMap<String, MetadataValue>;

/// A member of a lobby as recorded by the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub metadata: MetadataMap,
}

impl PlayerRecord {
    pub fn new(id: impl Into<PlayerId>, metadata: MetadataMap) -> Self {
        Self {
            id: id.into(),
            metadata,
        }
    }
}

/// Immutable view of a remote lobby at a point in time
///
/// Snapshots are always replaced wholesale, never patched field by field.
/// `version` increases monotonically with every remote mutation and is used
/// only to detect staleness, never to merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbySnapshot {
    pub id: LobbyId,
    /// Short human-shareable join token, stable for the lobby's life
    pub code: String,
    pub name: String,
    pub max_players: usize,
    pub is_private: bool,
    pub host_player_id: PlayerId,
    pub metadata: MetadataMap,
    /// Members in join order
    pub players: Vec<PlayerRecord>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl LobbySnapshot {
    pub fn available_slots(&self) -> usize {
        self.max_players.saturating_sub(self.players.len())
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }

    pub fn has_player(&self, player_id: &str) -> bool {
        self.players.iter().any(|p| p.id == player_id)
    }

    pub fn is_host(&self, player_id: &str) -> bool {
        self.host_player_id == player_id
    }

    /// The directory guarantees the host is always a member; a snapshot that
    /// violates this is a stale read and must not be installed locally.
    pub fn host_is_member(&self) -> bool {
        self.has_player(&self.host_player_id)
    }
}
