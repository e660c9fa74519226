//! Repeating timers for session upkeep
//!
//! A [`TickScheduler`] drives one periodic duty (heartbeat or poll) on a
//! spawned task. Each due tick consults a gate for the lobby it should act
//! on; an empty gate means the timer is disarmed and the tick is skipped.
//! The unit of work is awaited inline, so a new tick is never issued while
//! a previous one for the same timer is still outstanding.

use crate::types::LobbyId;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

/// Observable state of a scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// Gate is empty; ticks pass without firing
    Idle,
    /// Gate is occupied; waiting for the next interval
    Armed,
    /// A unit of work is in flight
    Firing,
}

/// Handle to a spawned repeating timer
#[derive(Debug)]
pub struct TickScheduler {
    name: &'static str,
    phase: watch::Receiver<SchedulerPhase>,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl TickScheduler {
    /// Spawn a timer that fires every `period` while `gate` yields a lobby.
    ///
    /// The first fire happens one full period after spawning, and the work
    /// future produced by `tick` runs to completion before the next tick is
    /// considered.
    pub fn spawn<G, F, Fut>(name: &'static str, period: Duration, gate: G, mut tick: F) -> Self
    where
        G: Fn() -> Option<LobbyId> + Send + 'static,
        F: FnMut(LobbyId) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (phase_tx, phase_rx) = watch::channel(SchedulerPhase::Idle);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first interval tick completes immediately; consume it so
            // the first fire lands one full period in
            timer.tick().await;

            loop {
                tokio::select! {
                    _ = timer.tick() => match gate() {
                        Some(lobby_id) => {
                            let _ = phase_tx.send(SchedulerPhase::Firing);
                            tick(lobby_id).await;
                            let _ = phase_tx.send(SchedulerPhase::Armed);
                        }
                        None => {
                            let _ = phase_tx.send(SchedulerPhase::Idle);
                        }
                    },
                    _ = shutdown_rx.changed() => break,
                }
            }
            debug!("{name} scheduler stopped");
        });

        Self {
            name,
            phase: phase_rx,
            shutdown: shutdown_tx,
            handle,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Phase as of the most recent tick
    pub fn phase(&self) -> SchedulerPhase {
        *self.phase.borrow()
    }

    /// Stop the timer. In-flight work is left to finish on its own; no new
    /// ticks are issued.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
