//! Player identity for the session
//!
//! The coordinator never talks to an authentication backend directly; it
//! only needs a stable player id and a one-shot signed-in notification it
//! can wait on before issuing its first directory call.

use crate::types::PlayerId;
use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

/// Trait for supplying the local player's identity
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Stable player identifier for the current process session
    fn current_player_id(&self) -> PlayerId;

    /// Resolves once sign-in has completed. Resolves immediately if the
    /// session is already signed in.
    async fn wait_signed_in(&self);
}

/// Process-session identity with anonymous sign-in
///
/// Issues a fresh player id at construction and flips to signed-in when
/// [`SessionIdentity::sign_in`] is called.
#[derive(Debug)]
pub struct SessionIdentity {
    player_id: PlayerId,
    signed_in_tx: watch::Sender<bool>,
    signed_in_rx: watch::Receiver<bool>,
}

impl SessionIdentity {
    /// Create a signed-out identity with a generated player id
    pub fn new() -> Self {
        Self::with_player_id(format!("player-{}", Uuid::new_v4().simple()))
    }

    /// Create a signed-out identity with a specific player id
    pub fn with_player_id(player_id: impl Into<PlayerId>) -> Self {
        let (signed_in_tx, signed_in_rx) = watch::channel(false);
        Self {
            player_id: player_id.into(),
            signed_in_tx,
            signed_in_rx,
        }
    }

    /// Create an identity that is already signed in
    pub fn signed_in(player_id: impl Into<PlayerId>) -> Self {
        let identity = Self::with_player_id(player_id);
        identity.sign_in();
        identity
    }

    /// Complete sign-in and release anyone waiting on the notification
    pub fn sign_in(&self) {
        if self.signed_in_tx.send(true).is_ok() {
            debug!("Signed in as {}", self.player_id);
        }
    }

    pub fn is_signed_in(&self) -> bool {
        *self.signed_in_rx.borrow()
    }
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for SessionIdentity {
    fn current_player_id(&self) -> PlayerId {
        self.player_id.clone()
    }

    async fn wait_signed_in(&self) {
        let mut rx = self.signed_in_rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}
