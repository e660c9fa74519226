//! Directory client contract
//!
//! Every call is a single request/response round trip against the remote
//! lobby directory. Failures are reported as a typed [`DirectoryError`]
//! carrying a kind and a human-readable message; the coordinator surfaces
//! them unchanged and never retries.
//!
//! The wire transport authenticates the caller out of band; the trait makes
//! the caller's player id explicit instead, since this crate does not model
//! authentication.

use crate::error::Result;
use crate::query::{QueryFilter, QueryOptions};
use crate::types::{LobbyId, LobbySnapshot, MetadataMap, PlayerId, PlayerRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Options for creating a lobby
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLobbyOptions {
    pub name: String,
    pub max_players: usize,
    pub is_private: bool,
    /// Initial lobby metadata
    pub metadata: MetadataMap,
    /// Metadata attached to the creator's player record
    pub host_metadata: MetadataMap,
}

/// Partial update applied to a lobby record
///
/// Present metadata keys are overwritten on the remote record; absent keys
/// are left untouched. Sending the full map would silently delete unlisted
/// keys on a replace-semantics backend, so callers send changed keys only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateLobbyOptions {
    pub metadata: MetadataMap,
    /// Reassign the lobby host; must name a current member
    pub host_player_id: Option<PlayerId>,
}

/// Partial update applied to a player record within a lobby
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePlayerOptions {
    pub metadata: MetadataMap,
}

/// Trait for the remote lobby directory
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Create a lobby with the caller as initial player and host
    async fn create(
        &self,
        host_player_id: &PlayerId,
        options: CreateLobbyOptions,
    ) -> Result<LobbySnapshot>;

    /// Query public lobbies. Returns an empty sequence when nothing matches.
    async fn query(&self, options: QueryOptions) -> Result<Vec<LobbySnapshot>>;

    /// Join a lobby by its shareable code
    async fn join_by_code(&self, code: &str, player: PlayerRecord) -> Result<LobbySnapshot>;

    /// Let the directory pick an open lobby matching the filters
    async fn quick_join(
        &self,
        filters: Vec<QueryFilter>,
        player: PlayerRecord,
    ) -> Result<LobbySnapshot>;

    /// Fetch the current snapshot of a lobby the requester is a member of
    async fn get(&self, id: &LobbyId, requester: &PlayerId) -> Result<LobbySnapshot>;

    /// Keep-alive ping preventing the directory from expiring the record
    async fn send_heartbeat(&self, id: &LobbyId, requester: &PlayerId) -> Result<()>;

    /// Merge a partial update into the lobby record (host only)
    async fn update_lobby(
        &self,
        id: &LobbyId,
        requester: &PlayerId,
        options: UpdateLobbyOptions,
    ) -> Result<LobbySnapshot>;

    /// Merge a partial update into a member's player record
    async fn update_player(
        &self,
        id: &LobbyId,
        requester: &PlayerId,
        player_id: &PlayerId,
        options: UpdatePlayerOptions,
    ) -> Result<LobbySnapshot>;

    /// Remove a member: players remove themselves, the host may remove anyone
    async fn remove_player(
        &self,
        id: &LobbyId,
        requester: &PlayerId,
        player_id: &PlayerId,
    ) -> Result<LobbySnapshot>;

    /// Delete the lobby entirely (host only)
    async fn delete(&self, id: &LobbyId, requester: &PlayerId) -> Result<()>;
}
