//! In-memory reference implementation of the lobby directory
//!
//! Stands in for the remote directory service in tests and the demo binary.
//! It enforces the same contract the coordinator expects from the real
//! service: capacity limits, host-only mutations, merge-on-update metadata
//! semantics, and monotonically increasing snapshot versions.

use crate::directory::client::{
    CreateLobbyOptions, DirectoryClient, UpdateLobbyOptions, UpdatePlayerOptions,
};
use crate::error::{DirectoryError, Result};
use crate::query::{sort_lobbies, QueryFilter, QueryOptions};
use crate::types::{LobbyId, LobbySnapshot, PlayerId, PlayerRecord};
use crate::utils::{current_timestamp, generate_join_code, generate_lobby_id};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tracing::{debug, info};

const DEFAULT_JOIN_CODE_LENGTH: usize = 6;

/// Master copy of one lobby plus its keep-alive bookkeeping
#[derive(Debug, Clone)]
struct LobbyRecord {
    snapshot: LobbySnapshot,
    heartbeat_count: u64,
    last_heartbeat: DateTime<Utc>,
}

impl LobbyRecord {
    fn touch(&mut self) {
        self.snapshot.version += 1;
        self.snapshot.last_updated_at = current_timestamp();
    }
}

#[derive(Debug, Default)]
struct DirectoryTable {
    lobbies: HashMap<LobbyId, LobbyRecord>,
    codes: HashMap<String, LobbyId>,
}

/// In-memory lobby directory
#[derive(Debug)]
pub struct InMemoryDirectory {
    table: RwLock<DirectoryTable>,
    total_heartbeats: AtomicU64,
    join_code_length: usize,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::with_code_length(DEFAULT_JOIN_CODE_LENGTH)
    }

    pub fn with_code_length(join_code_length: usize) -> Self {
        Self {
            table: RwLock::new(DirectoryTable::default()),
            total_heartbeats: AtomicU64::new(0),
            join_code_length,
        }
    }

    /// Heartbeats recorded for one lobby (0 for unknown ids)
    pub fn heartbeat_count(&self, id: &str) -> u64 {
        self.table
            .read()
            .map(|table| {
                table
                    .lobbies
                    .get(id)
                    .map(|record| record.heartbeat_count)
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    /// Heartbeats recorded across all lobbies, surviving lobby deletion
    pub fn total_heartbeats(&self) -> u64 {
        self.total_heartbeats.load(Ordering::Relaxed)
    }

    /// Number of lobbies currently in the directory
    pub fn lobby_count(&self) -> usize {
        self.table.read().map(|table| table.lobbies.len()).unwrap_or(0)
    }

    /// Expiry backstop: drop lobbies whose last heartbeat is older than
    /// `max_age`, the way the remote service reclaims abandoned records.
    pub fn purge_expired(&self, max_age: Duration) -> usize {
        let Ok(mut table) = self.table.write() else {
            return 0;
        };
        let cutoff = current_timestamp() - max_age;
        let expired: Vec<LobbyId> = table
            .lobbies
            .iter()
            .filter(|(_, record)| record.last_heartbeat < cutoff)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            if let Some(record) = table.lobbies.remove(id) {
                table.codes.remove(&record.snapshot.code);
                info!("Expired lobby {} ({})", record.snapshot.name, id);
            }
        }
        expired.len()
    }

    fn write_table(&self) -> Result<std::sync::RwLockWriteGuard<'_, DirectoryTable>> {
        self.table
            .write()
            .map_err(|_| {
                DirectoryError::Unknown {
                    message: "directory table lock poisoned".to_string(),
                }
                .into()
            })
    }

    fn read_table(&self) -> Result<std::sync::RwLockReadGuard<'_, DirectoryTable>> {
        self.table
            .read()
            .map_err(|_| {
                DirectoryError::Unknown {
                    message: "directory table lock poisoned".to_string(),
                }
                .into()
            })
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

fn lobby_not_found(id: &str) -> anyhow::Error {
    DirectoryError::NotFound {
        message: format!("lobby {id} does not exist"),
    }
    .into()
}

#[async_trait]
impl DirectoryClient for InMemoryDirectory {
    async fn create(
        &self,
        host_player_id: &PlayerId,
        options: CreateLobbyOptions,
    ) -> Result<LobbySnapshot> {
        if options.name.trim().is_empty() {
            return Err(DirectoryError::Unknown {
                message: "lobby name must not be empty".to_string(),
            }
            .into());
        }
        if options.max_players == 0 {
            return Err(DirectoryError::Unknown {
                message: "lobby capacity must be at least 1".to_string(),
            }
            .into());
        }

        let mut table = self.write_table()?;

        let mut code = generate_join_code(self.join_code_length);
        while table.codes.contains_key(&code) {
            code = generate_join_code(self.join_code_length);
        }

        let now = current_timestamp();
        let snapshot = LobbySnapshot {
            id: generate_lobby_id(),
            code: code.clone(),
            name: options.name,
            max_players: options.max_players,
            is_private: options.is_private,
            host_player_id: host_player_id.clone(),
            metadata: options.metadata,
            players: vec![PlayerRecord::new(
                host_player_id.clone(),
                options.host_metadata,
            )],
            version: 1,
            created_at: now,
            last_updated_at: now,
        };

        table.codes.insert(code, snapshot.id.clone());
        table.lobbies.insert(
            snapshot.id.clone(),
            LobbyRecord {
                snapshot: snapshot.clone(),
                heartbeat_count: 0,
                last_heartbeat: now,
            },
        );

        info!(
            "Created lobby '{}' ({}) with code {}",
            snapshot.name, snapshot.id, snapshot.code
        );
        Ok(snapshot)
    }

    async fn query(&self, options: QueryOptions) -> Result<Vec<LobbySnapshot>> {
        let table = self.read_table()?;

        let mut results: Vec<LobbySnapshot> = table
            .lobbies
            .values()
            .map(|record| &record.snapshot)
            .filter(|snapshot| !snapshot.is_private && options.matches(snapshot))
            .cloned()
            .collect();

        sort_lobbies(&mut results, options.sort.as_ref());
        results.truncate(options.limit);

        debug!("Query returned {} lobbies", results.len());
        Ok(results)
    }

    async fn join_by_code(&self, code: &str, player: PlayerRecord) -> Result<LobbySnapshot> {
        let mut table = self.write_table()?;

        let code = code.trim().to_uppercase();
        let Some(id) = table.codes.get(&code).cloned() else {
            return Err(DirectoryError::NotFound {
                message: format!("no lobby with code {code}"),
            }
            .into());
        };

        let record = table
            .lobbies
            .get_mut(&id)
            .ok_or_else(|| lobby_not_found(&id))?;

        if record.snapshot.is_full() {
            return Err(DirectoryError::Full {
                message: format!("lobby {} is at capacity", record.snapshot.name),
            }
            .into());
        }
        if record.snapshot.has_player(&player.id) {
            return Err(DirectoryError::Unknown {
                message: format!("player {} is already a member", player.id),
            }
            .into());
        }

        record.snapshot.players.push(player);
        record.touch();
        Ok(record.snapshot.clone())
    }

    async fn quick_join(
        &self,
        filters: Vec<QueryFilter>,
        player: PlayerRecord,
    ) -> Result<LobbySnapshot> {
        let mut table = self.write_table()?;

        let candidate = table.lobbies.values_mut().find(|record| {
            let snapshot = &record.snapshot;
            !snapshot.is_private
                && !snapshot.is_full()
                && !snapshot.has_player(&player.id)
                && filters.iter().all(|f| f.matches(snapshot))
        });

        let Some(record) = candidate else {
            return Err(DirectoryError::NoAvailableLobby {
                message: "no open lobby matches the given filters".to_string(),
            }
            .into());
        };

        record.snapshot.players.push(player);
        record.touch();
        Ok(record.snapshot.clone())
    }

    async fn get(&self, id: &LobbyId, requester: &PlayerId) -> Result<LobbySnapshot> {
        let table = self.read_table()?;

        let record = table.lobbies.get(id).ok_or_else(|| lobby_not_found(id))?;
        if !record.snapshot.has_player(requester) {
            return Err(DirectoryError::PermissionDenied {
                message: format!("player {requester} is not a member of lobby {id}"),
            }
            .into());
        }
        Ok(record.snapshot.clone())
    }

    async fn send_heartbeat(&self, id: &LobbyId, requester: &PlayerId) -> Result<()> {
        let mut table = self.write_table()?;

        let record = table
            .lobbies
            .get_mut(id)
            .ok_or_else(|| lobby_not_found(id))?;
        if !record.snapshot.is_host(requester) {
            return Err(DirectoryError::PermissionDenied {
                message: format!("player {requester} is not the host of lobby {id}"),
            }
            .into());
        }

        record.heartbeat_count += 1;
        record.last_heartbeat = current_timestamp();
        self.total_heartbeats.fetch_add(1, Ordering::Relaxed);
        debug!("Heartbeat {} for lobby {}", record.heartbeat_count, id);
        Ok(())
    }

    async fn update_lobby(
        &self,
        id: &LobbyId,
        requester: &PlayerId,
        options: UpdateLobbyOptions,
    ) -> Result<LobbySnapshot> {
        let mut table = self.write_table()?;

        let record = table
            .lobbies
            .get_mut(id)
            .ok_or_else(|| lobby_not_found(id))?;
        if !record.snapshot.is_host(requester) {
            return Err(DirectoryError::PermissionDenied {
                message: format!("player {requester} is not the host of lobby {id}"),
            }
            .into());
        }

        if let Some(new_host) = options.host_player_id {
            if !record.snapshot.has_player(&new_host) {
                return Err(DirectoryError::NotFound {
                    message: format!("player {new_host} is not a member of lobby {id}"),
                }
                .into());
            }
            record.snapshot.host_player_id = new_host;
        }

        // merge semantics: present keys overwrite, absent keys survive
        record.snapshot.metadata.extend(options.metadata);
        record.touch();
        Ok(record.snapshot.clone())
    }

    async fn update_player(
        &self,
        id: &LobbyId,
        requester: &PlayerId,
        player_id: &PlayerId,
        options: UpdatePlayerOptions,
    ) -> Result<LobbySnapshot> {
        let mut table = self.write_table()?;

        let record = table
            .lobbies
            .get_mut(id)
            .ok_or_else(|| lobby_not_found(id))?;
        if requester != player_id && !record.snapshot.is_host(requester) {
            return Err(DirectoryError::PermissionDenied {
                message: format!(
                    "player {requester} may not update player {player_id} in lobby {id}"
                ),
            }
            .into());
        }

        let Some(player) = record
            .snapshot
            .players
            .iter_mut()
            .find(|p| &p.id == player_id)
        else {
            return Err(DirectoryError::NotFound {
                message: format!("player {player_id} is not a member of lobby {id}"),
            }
            .into());
        };

        player.metadata.extend(options.metadata);
        record.touch();
        Ok(record.snapshot.clone())
    }

    async fn remove_player(
        &self,
        id: &LobbyId,
        requester: &PlayerId,
        player_id: &PlayerId,
    ) -> Result<LobbySnapshot> {
        let mut table = self.write_table()?;

        let record = table
            .lobbies
            .get_mut(id)
            .ok_or_else(|| lobby_not_found(id))?;
        if requester != player_id && !record.snapshot.is_host(requester) {
            return Err(DirectoryError::PermissionDenied {
                message: format!(
                    "player {requester} may not remove player {player_id} from lobby {id}"
                ),
            }
            .into());
        }
        if !record.snapshot.has_player(player_id) {
            return Err(DirectoryError::NotFound {
                message: format!("player {player_id} is not a member of lobby {id}"),
            }
            .into());
        }

        record.snapshot.players.retain(|p| &p.id != player_id);

        if record.snapshot.players.is_empty() {
            record.touch();
            let snapshot = record.snapshot.clone();
            let code = snapshot.code.clone();
            table.lobbies.remove(id);
            table.codes.remove(&code);
            info!("Removed last player from lobby {id}, lobby deleted");
            return Ok(snapshot);
        }

        // the host must always be a member: promote the oldest remaining
        // player when the host leaves
        if &record.snapshot.host_player_id == player_id {
            record.snapshot.host_player_id = record.snapshot.players[0].id.clone();
            info!(
                "Host left lobby {id}, promoted {}",
                record.snapshot.host_player_id
            );
        }

        record.touch();
        Ok(record.snapshot.clone())
    }

    async fn delete(&self, id: &LobbyId, requester: &PlayerId) -> Result<()> {
        let mut table = self.write_table()?;

        let record = table.lobbies.get(id).ok_or_else(|| lobby_not_found(id))?;
        if !record.snapshot.is_host(requester) {
            return Err(DirectoryError::PermissionDenied {
                message: format!("player {requester} is not the host of lobby {id}"),
            }
            .into());
        }

        let code = record.snapshot.code.clone();
        table.lobbies.remove(id);
        table.codes.remove(&code);
        info!("Deleted lobby {id}");
        Ok(())
    }
}
