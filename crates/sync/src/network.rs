//! Network status monitor.
//!
//! Holds a single process-wide online/offline flag. Connectivity events come
//! from whatever owns the monitor; in the server that is [`spawn_probe`],
//! which pings the backend on a fixed interval. Only actual changes of the
//! flag are published as [`NetworkTransition`]s, so subscribers never see a
//! duplicated transition.
//!
//! There is no debouncing: a single failed probe flips the flag.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::remote::RemoteStore;

/// Buffered transitions per subscriber before it starts lagging.
const TRANSITION_BUFFER: usize = 16;

/// A platform-level connectivity event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Reachable,
    Unreachable,
}

/// A change of the online flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetworkTransition {
    pub online: bool,
    pub at: DateTime<Utc>,
}

/// Tracks whether the backend is reachable.
#[derive(Clone)]
pub struct NetworkMonitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    state: watch::Sender<bool>,
    transitions: broadcast::Sender<NetworkTransition>,
}

impl NetworkMonitor {
    /// Create a monitor with the current connectivity state.
    #[must_use]
    pub fn new(initially_online: bool) -> Self {
        let (state, _) = watch::channel(initially_online);
        let (transitions, _) = broadcast::channel(TRANSITION_BUFFER);
        Self {
            inner: Arc::new(MonitorInner { state, transitions }),
        }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.inner.state.borrow()
    }

    /// Apply a connectivity event. Returns `true` if the flag changed.
    ///
    /// The flag update and the transition broadcast happen under the same
    /// lock, so concurrent events are published in the order they applied.
    pub fn handle_event(&self, event: ConnectivityEvent) -> bool {
        let online = event == ConnectivityEvent::Reachable;
        let transitions = &self.inner.transitions;

        let changed = self.inner.state.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            // No subscribers is fine
            let _ = transitions.send(NetworkTransition {
                online,
                at: Utc::now(),
            });
            true
        });

        if changed {
            if online {
                info!("Backend reachable again");
            } else {
                warn!("Backend unreachable, switching to offline mode");
            }
        }
        changed
    }

    /// Receive every future transition.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<NetworkTransition> {
        self.inner.transitions.subscribe()
    }

    /// Watch the current flag.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.inner.state.subscribe()
    }
}

/// Feed the monitor from periodic backend health checks until `cancel` fires,
/// abandoning a check still in flight.
///
/// A rejected health check still proves the backend answered, so only
/// unreachable errors count as offline.
pub fn spawn_probe(
    monitor: NetworkMonitor,
    remote: Arc<dyn RemoteStore>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let result = tokio::select! {
                        () = cancel.cancelled() => break,
                        result = remote.health() => result,
                    };
                    let event = match result {
                        Err(e) if e.is_unreachable() => {
                            debug!(error = %e, "Health probe failed");
                            ConnectivityEvent::Unreachable
                        }
                        _ => ConnectivityEvent::Reachable,
                    };
                    monitor.handle_event(event);
                }
            }
        }
        debug!("Network probe stopped");
    })
}
