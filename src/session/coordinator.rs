//! Lobby session coordinator
//!
//! Orchestrates the directory client, the local state mirror, and the two
//! session timers. Every public operation is a single transaction against
//! the remote directory: on success the affected snapshot slots are replaced
//! atomically, on failure local state is left exactly as it was and the
//! typed directory error is surfaced to the caller unchanged. Nothing is
//! retried here; a caller that wants resilience re-issues the operation.

use crate::config::SessionSettings;
use crate::directory::client::{
    CreateLobbyOptions, DirectoryClient, UpdateLobbyOptions, UpdatePlayerOptions,
};
use crate::error::{DirectoryError, Result, SessionError};
use crate::identity::IdentityProvider;
use crate::query::{QueryFilter, QueryOptions};
use crate::session::scheduler::TickScheduler;
use crate::session::state::{LobbyState, SessionStatus};
use crate::types::{LobbySnapshot, MetadataMap, PlayerId, PlayerRecord};
use std::sync::Arc;
use tracing::{info, warn};

/// The client-side lobby session coordinator
#[derive(Clone)]
pub struct LobbyCoordinator {
    directory: Arc<dyn DirectoryClient>,
    identity: Arc<dyn IdentityProvider>,
    state: LobbyState,
    settings: SessionSettings,
}

impl LobbyCoordinator {
    pub fn new(
        directory: Arc<dyn DirectoryClient>,
        identity: Arc<dyn IdentityProvider>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            directory,
            identity,
            state: LobbyState::new(),
            settings,
        }
    }

    /// The local state mirror
    pub fn state(&self) -> &LobbyState {
        &self.state
    }

    pub fn status(&self) -> SessionStatus {
        self.state.status()
    }

    pub fn hosted_lobby(&self) -> Option<LobbySnapshot> {
        self.state.hosted()
    }

    pub fn joined_lobby(&self) -> Option<LobbySnapshot> {
        self.state.joined()
    }

    fn player_id(&self) -> PlayerId {
        self.identity.current_player_id()
    }

    /// Create a lobby with the local identity as host and initial player
    pub async fn create_lobby(&self, options: CreateLobbyOptions) -> Result<LobbySnapshot> {
        self.identity.wait_signed_in().await;
        let player_id = self.player_id();

        let snapshot = self.directory.create(&player_id, options).await?;
        self.state.set_hosted_and_joined(&snapshot)?;
        info!(
            "Created lobby '{}' ({}) with code {}",
            snapshot.name, snapshot.id, snapshot.code
        );
        Ok(snapshot)
    }

    /// Query public lobbies; stateless, never touches the session slots
    pub async fn query_lobbies(&self, options: QueryOptions) -> Result<Vec<LobbySnapshot>> {
        self.identity.wait_signed_in().await;
        self.directory.query(options).await
    }

    /// Join a lobby by its shareable code
    pub async fn join_by_code(
        &self,
        code: &str,
        metadata: MetadataMap,
    ) -> Result<LobbySnapshot> {
        self.identity.wait_signed_in().await;
        let player = PlayerRecord::new(self.player_id(), metadata);

        let snapshot = self.directory.join_by_code(code, player).await?;
        self.state.set_joined(&snapshot)?;
        info!("Joined lobby '{}' ({})", snapshot.name, snapshot.id);
        Ok(snapshot)
    }

    /// Let the directory pick an open lobby matching the filters
    pub async fn quick_join(
        &self,
        filters: Vec<QueryFilter>,
        metadata: MetadataMap,
    ) -> Result<LobbySnapshot> {
        self.identity.wait_signed_in().await;
        let player = PlayerRecord::new(self.player_id(), metadata);

        let snapshot = self.directory.quick_join(filters, player).await?;
        self.state.set_joined(&snapshot)?;
        info!("Quick-joined lobby '{}' ({})", snapshot.name, snapshot.id);
        Ok(snapshot)
    }

    /// Merge the given keys into the hosted lobby's metadata. Only the
    /// listed keys are sent; the directory leaves absent keys untouched.
    pub async fn update_lobby_metadata(&self, metadata: MetadataMap) -> Result<LobbySnapshot> {
        self.identity.wait_signed_in().await;
        let hosted = self.state.hosted().ok_or(SessionError::NotHosting)?;
        let player_id = self.player_id();

        let options = UpdateLobbyOptions {
            metadata,
            host_player_id: None,
        };
        let snapshot = self
            .directory
            .update_lobby(&hosted.id, &player_id, options)
            .await?;
        self.state.apply(&snapshot, &player_id)?;
        Ok(snapshot)
    }

    /// Merge the given keys into a member's player metadata. Members update
    /// themselves; the host may update anyone.
    pub async fn update_player_metadata(
        &self,
        target_player_id: &PlayerId,
        metadata: MetadataMap,
    ) -> Result<()> {
        self.identity.wait_signed_in().await;
        let joined = self.state.joined().ok_or(SessionError::NotJoined)?;
        let player_id = self.player_id();

        let options = UpdatePlayerOptions { metadata };
        let snapshot = self
            .directory
            .update_player(&joined.id, &player_id, target_player_id, options)
            .await?;
        self.state.apply(&snapshot, &player_id)?;
        Ok(())
    }

    /// Remove the local identity from the joined lobby. Leaving a lobby you
    /// host is permitted and relinquishes hosting.
    pub async fn leave_lobby(&self) -> Result<()> {
        self.identity.wait_signed_in().await;
        let joined = self.state.joined().ok_or(SessionError::NotJoined)?;
        let player_id = self.player_id();

        self.directory
            .remove_player(&joined.id, &player_id, &player_id)
            .await?;
        self.state.clear(&joined.id)?;
        info!("Left lobby '{}' ({})", joined.name, joined.id);
        Ok(())
    }

    /// Remove a member from the joined lobby. Host-only, enforced remotely.
    pub async fn kick_player(&self, target_player_id: &PlayerId) -> Result<()> {
        self.identity.wait_signed_in().await;
        let joined = self.state.joined().ok_or(SessionError::NotJoined)?;
        let player_id = self.player_id();

        let snapshot = self
            .directory
            .remove_player(&joined.id, &player_id, target_player_id)
            .await?;
        self.state.apply(&snapshot, &player_id)?;
        info!("Kicked {target_player_id} from lobby {}", joined.id);
        Ok(())
    }

    /// Reassign the hosted lobby's host to another member. Migrating away
    /// relinquishes the hosted slot; the session stays joined.
    pub async fn migrate_host(&self, new_host_player_id: &PlayerId) -> Result<LobbySnapshot> {
        self.identity.wait_signed_in().await;
        let hosted = self.state.hosted().ok_or(SessionError::NotHosting)?;
        let player_id = self.player_id();

        let options = UpdateLobbyOptions {
            metadata: MetadataMap::new(),
            host_player_id: Some(new_host_player_id.clone()),
        };
        let snapshot = self
            .directory
            .update_lobby(&hosted.id, &player_id, options)
            .await?;
        self.state.apply(&snapshot, &player_id)?;
        info!(
            "Migrated host of lobby {} to {new_host_player_id}",
            hosted.id
        );
        Ok(snapshot)
    }

    /// Remove the hosted lobby from the directory entirely
    pub async fn delete_lobby(&self) -> Result<()> {
        self.identity.wait_signed_in().await;
        let hosted = self.state.hosted().ok_or(SessionError::NotHosting)?;
        let player_id = self.player_id();

        self.directory.delete(&hosted.id, &player_id).await?;
        self.state.clear(&hosted.id)?;
        info!("Deleted lobby '{}' ({})", hosted.name, hosted.id);
        Ok(())
    }

    /// Spawn the heartbeat timer: pings the directory for the hosted lobby
    /// every heartbeat interval. Failures are logged and swallowed; the
    /// directory's own expiry policy is the backstop when pings are
    /// consistently rejected.
    pub fn start_heartbeat(&self) -> TickScheduler {
        let state = self.state.clone();
        let directory = Arc::clone(&self.directory);
        let identity = Arc::clone(&self.identity);

        TickScheduler::spawn(
            "heartbeat",
            self.settings.heartbeat_interval(),
            move || state.hosted_id(),
            move |lobby_id| {
                let directory = Arc::clone(&directory);
                let player_id = identity.current_player_id();
                async move {
                    if let Err(err) = directory.send_heartbeat(&lobby_id, &player_id).await {
                        warn!("Heartbeat for lobby {lobby_id} rejected: {err}");
                    }
                }
            },
        )
    }

    /// Spawn the poll timer: refreshes the joined snapshot every poll
    /// interval. This is the only path by which the client discovers
    /// metadata changes, membership changes, or host migrations made by
    /// other participants. A fetch telling us the lobby is gone or we are
    /// no longer a member evicts the local copy.
    pub fn start_poll(&self) -> TickScheduler {
        let gate_state = self.state.clone();
        let state = self.state.clone();
        let directory = Arc::clone(&self.directory);
        let identity = Arc::clone(&self.identity);

        TickScheduler::spawn(
            "poll",
            self.settings.poll_interval(),
            move || gate_state.joined_id(),
            move |lobby_id| {
                let directory = Arc::clone(&directory);
                let state = state.clone();
                let player_id = identity.current_player_id();
                async move {
                    match directory.get(&lobby_id, &player_id).await {
                        Ok(snapshot) => {
                            if !snapshot.host_is_member() {
                                // stale read; the next poll re-fetches
                                warn!(
                                    "Snapshot for lobby {lobby_id} names a host that is \
                                     not a member, skipping"
                                );
                                return;
                            }
                            if let Err(err) = state.apply(&snapshot, &player_id) {
                                warn!("Failed to install poll result for {lobby_id}: {err}");
                            }
                        }
                        Err(err) => match err.downcast_ref::<DirectoryError>() {
                            Some(
                                DirectoryError::NotFound { .. }
                                | DirectoryError::PermissionDenied { .. },
                            ) => {
                                warn!(
                                    "Lobby {lobby_id} no longer reachable, dropping local \
                                     copy: {err}"
                                );
                                if let Err(err) = state.clear(&lobby_id) {
                                    warn!("Failed to clear lobby {lobby_id}: {err}");
                                }
                            }
                            _ => warn!("Poll for lobby {lobby_id} failed: {err}"),
                        },
                    }
                }
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionSettings;
    use crate::directory::client::MockDirectoryClient;
    use crate::directory::memory::InMemoryDirectory;
    use crate::identity::SessionIdentity;
    use crate::query::{QueryField, QueryFilter};
    use crate::types::MetadataValue;
    use std::time::Duration;
    use tokio::time::sleep;

    fn test_settings() -> SessionSettings {
        SessionSettings::default()
    }

    fn create_options(name: &str, max_players: usize) -> CreateLobbyOptions {
        CreateLobbyOptions {
            name: name.to_string(),
            max_players,
            is_private: false,
            metadata: MetadataMap::new(),
            host_metadata: MetadataMap::new(),
        }
    }

    fn coordinator_on(
        directory: &Arc<InMemoryDirectory>,
        player_id: &str,
    ) -> LobbyCoordinator {
        let identity = Arc::new(SessionIdentity::signed_in(player_id));
        LobbyCoordinator::new(directory.clone(), identity, test_settings())
    }

    #[tokio::test]
    async fn test_create_sets_hosted_and_joined() {
        let directory = Arc::new(InMemoryDirectory::new());
        let host = coordinator_on(&directory, "host");

        let snapshot = host.create_lobby(create_options("Arena", 4)).await.unwrap();

        assert_eq!(snapshot.players.len(), 1);
        assert_eq!(snapshot.players[0].id, "host");
        assert_eq!(snapshot.host_player_id, "host");
        assert_eq!(host.status(), SessionStatus::Hosting);
        assert_eq!(host.hosted_lobby().unwrap().id, snapshot.id);
        assert_eq!(host.joined_lobby().unwrap().id, snapshot.id);
    }

    #[tokio::test]
    async fn test_create_failure_leaves_state_untouched() {
        let directory = Arc::new(InMemoryDirectory::new());
        let host = coordinator_on(&directory, "host");

        assert!(host.create_lobby(create_options("", 4)).await.is_err());
        assert_eq!(host.status(), SessionStatus::Unjoined);
    }

    #[tokio::test]
    async fn test_join_by_code_sets_joined_only() {
        let directory = Arc::new(InMemoryDirectory::new());
        let host = coordinator_on(&directory, "host");
        let guest = coordinator_on(&directory, "guest");

        let created = host.create_lobby(create_options("Arena", 4)).await.unwrap();
        let joined = guest
            .join_by_code(&created.code, MetadataMap::new())
            .await
            .unwrap();

        assert_eq!(joined.players.len(), 2);
        assert_eq!(guest.status(), SessionStatus::Joined);
        assert!(guest.hosted_lobby().is_none());
    }

    #[tokio::test]
    async fn test_quick_join_filters() {
        let directory = Arc::new(InMemoryDirectory::new());
        let host = coordinator_on(&directory, "host");
        let guest = coordinator_on(&directory, "guest");

        host.create_lobby(create_options("Arena", 4)).await.unwrap();

        let err = guest
            .quick_join(
                vec![QueryFilter::greater_than(QueryField::MaxPlayers, 8.0)],
                MetadataMap::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DirectoryError>(),
            Some(DirectoryError::NoAvailableLobby { .. })
        ));
        assert_eq!(guest.status(), SessionStatus::Unjoined);

        let joined = guest
            .quick_join(vec![QueryFilter::has_open_slot()], MetadataMap::new())
            .await
            .unwrap();
        assert_eq!(joined.name, "Arena");
        assert_eq!(guest.status(), SessionStatus::Joined);
    }

    #[tokio::test]
    async fn test_update_lobby_metadata_merges_and_refreshes_both_slots() {
        let directory = Arc::new(InMemoryDirectory::new());
        let host = coordinator_on(&directory, "host");

        let mut initial = MetadataMap::new();
        initial.insert("mode".to_string(), MetadataValue::public("ranked"));
        initial.insert("map".to_string(), MetadataValue::public("canyon"));
        host.create_lobby(CreateLobbyOptions {
            metadata: initial,
            ..create_options("Arena", 4)
        })
        .await
        .unwrap();

        let mut update = MetadataMap::new();
        update.insert("map".to_string(), MetadataValue::public("glacier"));
        let updated = host.update_lobby_metadata(update).await.unwrap();

        assert_eq!(updated.metadata["map"].value, "glacier");
        assert_eq!(updated.metadata["mode"].value, "ranked");
        assert_eq!(host.hosted_lobby().unwrap().metadata["map"].value, "glacier");
        assert_eq!(host.joined_lobby().unwrap().metadata["map"].value, "glacier");
    }

    #[tokio::test]
    async fn test_update_lobby_metadata_requires_hosted() {
        let directory = Arc::new(InMemoryDirectory::new());
        let guest = coordinator_on(&directory, "guest");

        let err = guest
            .update_lobby_metadata(MetadataMap::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SessionError>(),
            Some(SessionError::NotHosting)
        ));
    }

    #[tokio::test]
    async fn test_update_player_metadata_refreshes_joined() {
        let directory = Arc::new(InMemoryDirectory::new());
        let host = coordinator_on(&directory, "host");
        host.create_lobby(create_options("Arena", 4)).await.unwrap();

        let mut update = MetadataMap::new();
        update.insert("display_name".to_string(), MetadataValue::public("Ada"));
        host.update_player_metadata(&"host".to_string(), update)
            .await
            .unwrap();

        let roster = host.joined_lobby().unwrap().players;
        assert_eq!(roster[0].metadata["display_name"].value, "Ada");
    }

    #[tokio::test]
    async fn test_leave_as_host_clears_both_slots_and_roster() {
        let directory = Arc::new(InMemoryDirectory::new());
        let host = coordinator_on(&directory, "host");
        let guest = coordinator_on(&directory, "guest");

        let created = host.create_lobby(create_options("Arena", 4)).await.unwrap();
        guest
            .join_by_code(&created.code, MetadataMap::new())
            .await
            .unwrap();

        host.leave_lobby().await.unwrap();
        assert_eq!(host.status(), SessionStatus::Unjoined);
        assert!(host.hosted_lobby().is_none());
        assert!(host.joined_lobby().is_none());

        // the lobby still exists and no longer lists the old host
        let remote = directory
            .get(&created.id, &"guest".to_string())
            .await
            .unwrap();
        assert!(!remote.has_player("host"));
        assert_eq!(remote.host_player_id, "guest");
    }

    #[tokio::test]
    async fn test_leave_requires_joined() {
        let directory = Arc::new(InMemoryDirectory::new());
        let guest = coordinator_on(&directory, "guest");

        let err = guest.leave_lobby().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SessionError>(),
            Some(SessionError::NotJoined)
        ));
    }

    #[tokio::test]
    async fn test_kick_by_non_host_fails_and_leaves_state_unchanged() {
        let directory = Arc::new(InMemoryDirectory::new());
        let host = coordinator_on(&directory, "host");
        let guest = coordinator_on(&directory, "guest");

        let created = host.create_lobby(create_options("Arena", 4)).await.unwrap();
        guest
            .join_by_code(&created.code, MetadataMap::new())
            .await
            .unwrap();
        let before = guest.joined_lobby().unwrap();

        let err = guest.kick_player(&"host".to_string()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DirectoryError>(),
            Some(DirectoryError::PermissionDenied { .. })
        ));
        assert_eq!(guest.joined_lobby().unwrap(), before);
    }

    #[tokio::test]
    async fn test_kick_by_host_updates_roster() {
        let directory = Arc::new(InMemoryDirectory::new());
        let host = coordinator_on(&directory, "host");
        let guest = coordinator_on(&directory, "guest");

        let created = host.create_lobby(create_options("Arena", 4)).await.unwrap();
        guest
            .join_by_code(&created.code, MetadataMap::new())
            .await
            .unwrap();

        host.kick_player(&"guest".to_string()).await.unwrap();
        assert!(!host.joined_lobby().unwrap().has_player("guest"));
        assert_eq!(host.status(), SessionStatus::Hosting);
    }

    #[tokio::test]
    async fn test_migrate_host_relinquishes_hosted_slot() {
        let directory = Arc::new(InMemoryDirectory::new());
        let host = coordinator_on(&directory, "host");
        let guest = coordinator_on(&directory, "guest");

        let created = host.create_lobby(create_options("Arena", 4)).await.unwrap();
        guest
            .join_by_code(&created.code, MetadataMap::new())
            .await
            .unwrap();

        let migrated = host.migrate_host(&"guest".to_string()).await.unwrap();
        assert_eq!(migrated.host_player_id, "guest");
        assert_eq!(host.status(), SessionStatus::Joined);
        assert!(host.hosted_lobby().is_none());
        assert_eq!(host.joined_lobby().unwrap().host_player_id, "guest");
    }

    #[tokio::test]
    async fn test_delete_lobby_clears_both_slots() {
        let directory = Arc::new(InMemoryDirectory::new());
        let host = coordinator_on(&directory, "host");

        host.create_lobby(create_options("Arena", 4)).await.unwrap();
        host.delete_lobby().await.unwrap();

        assert_eq!(host.status(), SessionStatus::Unjoined);
        assert_eq!(directory.lobby_count(), 0);
    }

    #[tokio::test]
    async fn test_directory_failure_leaves_state_untouched() {
        let mut mock = MockDirectoryClient::new();
        mock.expect_create().returning(|host_player_id, options| {
            let now = crate::utils::current_timestamp();
            Ok(LobbySnapshot {
                id: "l1".to_string(),
                code: "ABC123".to_string(),
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
            })
        });
        mock.expect_update_lobby().returning(|_, _, _| {
            Err(DirectoryError::Transport {
                message: "connection reset".to_string(),
            }
            .into())
        });

        let identity = Arc::new(SessionIdentity::signed_in("host"));
        let coordinator = LobbyCoordinator::new(Arc::new(mock), identity, test_settings());

        let created = coordinator
            .create_lobby(create_options("Arena", 4))
            .await
            .unwrap();

        let mut update = MetadataMap::new();
        update.insert("map".to_string(), MetadataValue::public("glacier"));
        let err = coordinator.update_lobby_metadata(update).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DirectoryError>(),
            Some(DirectoryError::Transport { .. })
        ));

        // the failed update must not have touched either slot
        assert_eq!(coordinator.hosted_lobby().unwrap(), created);
        assert_eq!(coordinator.joined_lobby().unwrap(), created);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_fires_only_while_hosting() {
        let directory = Arc::new(InMemoryDirectory::new());
        let host = coordinator_on(&directory, "host");
        let _heartbeat = host.start_heartbeat();

        // nothing hosted yet
        sleep(Duration::from_secs(40)).await;
        assert_eq!(directory.total_heartbeats(), 0);

        let created = host.create_lobby(create_options("Arena", 4)).await.unwrap();
        sleep(Duration::from_secs(31)).await;
        let after_hosting = directory.heartbeat_count(&created.id);
        assert!(after_hosting >= 1, "heartbeats: {after_hosting}");

        host.delete_lobby().await.unwrap();
        let total = directory.total_heartbeats();
        sleep(Duration::from_secs(40)).await;
        assert_eq!(directory.total_heartbeats(), total);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_refreshes_joined_roster() {
        let directory = Arc::new(InMemoryDirectory::new());
        let host = coordinator_on(&directory, "host");
        let guest = coordinator_on(&directory, "guest");

        let created = host.create_lobby(create_options("Arena", 4)).await.unwrap();
        let _poll = host.start_poll();
        assert_eq!(host.joined_lobby().unwrap().players.len(), 1);

        guest
            .join_by_code(&created.code, MetadataMap::new())
            .await
            .unwrap();

        sleep(Duration::from_millis(1200)).await;
        assert_eq!(host.joined_lobby().unwrap().players.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_evicts_deleted_lobby() {
        let directory = Arc::new(InMemoryDirectory::new());
        let host = coordinator_on(&directory, "host");
        let guest = coordinator_on(&directory, "guest");

        let created = host.create_lobby(create_options("Arena", 4)).await.unwrap();
        guest
            .join_by_code(&created.code, MetadataMap::new())
            .await
            .unwrap();
        let _poll = guest.start_poll();

        host.delete_lobby().await.unwrap();

        sleep(Duration::from_millis(1200)).await;
        assert_eq!(guest.status(), SessionStatus::Unjoined);
        assert!(guest.joined_lobby().is_none());
    }
}
