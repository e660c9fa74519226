//! Test fixtures shared by the integration tests

use lobby_session::config::SessionSettings;
use lobby_session::directory::{CreateLobbyOptions, InMemoryDirectory};
use lobby_session::identity::SessionIdentity;
use lobby_session::session::LobbyCoordinator;
use lobby_session::types::{MetadataMap, MetadataValue};
use std::sync::Arc;

/// A coordinator bound to a signed-in identity on the shared directory
pub fn client(directory: &Arc<InMemoryDirectory>, player_id: &str) -> LobbyCoordinator {
    let identity = Arc::new(SessionIdentity::signed_in(player_id));
    LobbyCoordinator::new(directory.clone(), identity, SessionSettings::default())
}

/// Creation options for the canonical test lobby
pub fn arena(max_players: usize) -> CreateLobbyOptions {
    let mut metadata = MetadataMap::new();
    metadata.insert("mode".to_string(), MetadataValue::public("ranked"));
    metadata.insert("map".to_string(), MetadataValue::public("canyon"));

    CreateLobbyOptions {
        name: "Arena".to_string(),
        max_players,
        is_private: false,
        metadata,
        host_metadata: display_name("Ada"),
    }
}

/// Player metadata carrying just a display name
pub fn display_name(name: &str) -> MetadataMap {
    let mut metadata = MetadataMap::new();
    metadata.insert("display_name".to_string(), MetadataValue::public(name));
    metadata
}
