//! Start/stop state machine around the poll loop.
//!
//! The host calls [`PollerLifecycle::on_ready`] once its connection is up and
//! [`PollerLifecycle::on_shutdown`] when it is going away. `Stopped` is
//! terminal: a poller is never restarted with stale collaborators.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::cache::SnapshotCache;
use crate::poller::Poller;

enum LifecycleState {
    Idle(Box<Poller>),
    Running {
        stop: watch::Sender<bool>,
        handle: JoinHandle<SnapshotCache>,
    },
    Stopped,
}

pub struct PollerLifecycle {
    state: LifecycleState,
}

impl PollerLifecycle {
    pub fn new(poller: Poller) -> Self {
        Self {
            state: LifecycleState::Idle(Box::new(poller)),
        }
    }

    pub fn phase(&self) -> &'static str {
        phase_of(&self.state)
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, LifecycleState::Running { .. })
    }

    /// Spawn the poll loop. Returns `false` if it was already started.
    pub fn on_ready(&mut self) -> bool {
        match std::mem::replace(&mut self.state, LifecycleState::Stopped) {
            LifecycleState::Idle(poller) => {
                let (stop, stop_rx) = watch::channel(false);
                let handle = tokio::spawn(poller.run(stop_rx));
                self.state = LifecycleState::Running { stop, handle };
                info!("Poll loop started");
                true
            }
            other => {
                warn!("on_ready ignored: poll loop is {}", phase_of(&other));
                self.state = other;
                false
            }
        }
    }

    /// Ask the loop to stop at its next idle point and wait for it.
    ///
    /// Returns the final cache if a loop was running.
    pub async fn on_shutdown(&mut self) -> Option<SnapshotCache> {
        match std::mem::replace(&mut self.state, LifecycleState::Stopped) {
            LifecycleState::Running { stop, handle } => {
                stop.send_replace(true);
                match handle.await {
                    Ok(cache) => Some(cache),
                    Err(e) => {
                        error!("Poll task ended abnormally: {}", e);
                        None
                    }
                }
            }
            LifecycleState::Idle(_) => {
                info!("Shutdown before the poll loop started");
                None
            }
            LifecycleState::Stopped => None,
        }
    }

    /// Wait for the running loop to exit on its own (it only does so on panic).
    pub async fn join(&mut self) -> Option<SnapshotCache> {
        if let LifecycleState::Running { handle, .. } = &mut self.state {
            let result = handle.await;
            self.state = LifecycleState::Stopped;
            return match result {
                Ok(cache) => Some(cache),
                Err(e) => {
                    error!("Poll task ended abnormally: {}", e);
                    None
                }
            };
        }
        None
    }
}

fn phase_of(state: &LifecycleState) -> &'static str {
    match state {
        LifecycleState::Idle(_) => "idle",
        LifecycleState::Running { .. } => "running",
        LifecycleState::Stopped => "stopped",
    }
}
