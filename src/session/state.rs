//! Local mirror of remote lobby state
//!
//! Two nullable slots: the lobby the local identity currently hosts and the
//! lobby it is currently joined to. Snapshots are replaced wholesale under a
//! single lock, never patched field by field, and a replacement carrying an
//! older version than the held snapshot for the same lobby is dropped.

use crate::error::{Result, SessionError};
use crate::types::{LobbyId, LobbySnapshot, PlayerId};
use std::sync::{Arc, RwLock};

/// Where the session currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No lobby is tracked
    Unjoined,
    /// Member of a lobby someone else hosts
    Joined,
    /// Hosting the tracked lobby
    Hosting,
}

#[derive(Debug, Default)]
struct Slots {
    hosted: Option<LobbySnapshot>,
    joined: Option<LobbySnapshot>,
}

/// Shared handle to the session's two snapshot slots
#[derive(Debug, Clone, Default)]
pub struct LobbyState {
    slots: Arc<RwLock<Slots>>,
}

impl LobbyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the hosted lobby, if any
    pub fn hosted(&self) -> Option<LobbySnapshot> {
        self.slots.read().ok().and_then(|s| s.hosted.clone())
    }

    /// Snapshot of the joined lobby, if any
    pub fn joined(&self) -> Option<LobbySnapshot> {
        self.slots.read().ok().and_then(|s| s.joined.clone())
    }

    pub fn hosted_id(&self) -> Option<LobbyId> {
        self.slots
            .read()
            .ok()
            .and_then(|s| s.hosted.as_ref().map(|l| l.id.clone()))
    }

    pub fn joined_id(&self) -> Option<LobbyId> {
        self.slots
            .read()
            .ok()
            .and_then(|s| s.joined.as_ref().map(|l| l.id.clone()))
    }

    pub fn status(&self) -> SessionStatus {
        self.slots
            .read()
            .ok()
            .map(|s| {
                if s.hosted.is_some() {
                    SessionStatus::Hosting
                } else if s.joined.is_some() {
                    SessionStatus::Joined
                } else {
                    SessionStatus::Unjoined
                }
            })
            .unwrap_or(SessionStatus::Unjoined)
    }

    /// Install a freshly created lobby: the creator hosts and is joined
    pub fn set_hosted_and_joined(&self, snapshot: &LobbySnapshot) -> Result<()> {
        let mut slots = self.write()?;
        slots.hosted = Some(snapshot.clone());
        slots.joined = Some(snapshot.clone());
        Ok(())
    }

    /// Install a lobby joined as a regular member
    pub fn set_joined(&self, snapshot: &LobbySnapshot) -> Result<()> {
        let mut slots = self.write()?;
        slots.joined = Some(snapshot.clone());
        Ok(())
    }

    /// Install a fresher snapshot for a lobby the session already tracks.
    ///
    /// The joined slot is refreshed when the ids match. The hosted slot
    /// follows hostship: it is set when `local_player` is the snapshot's
    /// host and cleared when a tracked lobby migrated its host elsewhere.
    /// Returns false when the snapshot was for an untracked lobby or was
    /// staler than the held version.
    pub fn apply(&self, snapshot: &LobbySnapshot, local_player: &PlayerId) -> Result<bool> {
        let mut slots = self.write()?;

        let joined_match = slots
            .joined
            .as_ref()
            .is_some_and(|held| held.id == snapshot.id);
        let hosted_match = slots
            .hosted
            .as_ref()
            .is_some_and(|held| held.id == snapshot.id);
        if !joined_match && !hosted_match {
            return Ok(false);
        }

        let held_version = [
            slots.joined.as_ref().filter(|_| joined_match),
            slots.hosted.as_ref().filter(|_| hosted_match),
        ]
        .into_iter()
        .flatten()
        .map(|held| held.version)
        .max()
        .unwrap_or(0);
        if snapshot.version < held_version {
            return Ok(false);
        }

        if joined_match {
            slots.joined = Some(snapshot.clone());
        }
        if snapshot.is_host(local_player) {
            slots.hosted = Some(snapshot.clone());
        } else if hosted_match {
            slots.hosted = None;
        }
        Ok(true)
    }

    /// Drop whatever slots hold the given lobby
    pub fn clear(&self, id: &LobbyId) -> Result<()> {
        let mut slots = self.write()?;
        if slots.hosted.as_ref().is_some_and(|held| &held.id == id) {
            slots.hosted = None;
        }
        if slots.joined.as_ref().is_some_and(|held| &held.id == id) {
            slots.joined = None;
        }
        Ok(())
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Slots>> {
        self.slots
            .write()
            .map_err(|_| SessionError::StatePoisoned.into())
    }
}
