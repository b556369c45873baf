//! Session Registry
//!
//! Process-wide map from call id to the latest published snapshot of that
//! call's session.
//!
//! # Architecture
//!
//! The registry uses DashMap so lookups from the HTTP control surface never
//! contend with registration of new calls. Entries hold a `watch::Receiver`,
//! which makes every read a lock-free borrow of the newest snapshot.
//!
//! Ended sessions stay visible for a retention window and are then evicted
//! by a scheduled task tied to the process shutdown token.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use super::{CallSnapshot, Session};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The id belongs to a session that is active or awaiting eviction
    #[error("Call {0} is already tracked")]
    AlreadyTracked(String),
}

#[derive(Debug)]
struct TrackedSession {
    instance_id: Uuid,
    snapshot: watch::Receiver<CallSnapshot>,
}

/// Concurrent registry of tracked calls.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, TrackedSession>>,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl SessionRegistry {
    /// Create a registry whose eviction tasks stop when `shutdown` is cancelled
    /// and are tracked by `tasks`.
    pub fn new(shutdown: CancellationToken, tasks: TaskTracker) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            shutdown,
            tasks,
        }
    }

    /// Track a new session. Rejected while the id is still tracked.
    pub fn try_register(&self, session: &Session) -> Result<(), RegistryError> {
        match self.sessions.entry(session.call_id().to_string()) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyTracked(
                session.call_id().to_string(),
            )),
            Entry::Vacant(slot) => {
                slot.insert(TrackedSession {
                    instance_id: session.instance_id(),
                    snapshot: session.subscribe(),
                });
                Ok(())
            }
        }
    }

    pub fn get(&self, call_id: &str) -> Option<CallSnapshot> {
        self.sessions
            .get(call_id)
            .map(|tracked| tracked.snapshot.borrow().clone())
    }

    pub fn contains(&self, call_id: &str) -> bool {
        self.sessions.contains_key(call_id)
    }

    /// All tracked calls, oldest first.
    pub fn list(&self) -> Vec<CallSnapshot> {
        let mut calls: Vec<CallSnapshot> = self
            .sessions
            .iter()
            .map(|tracked| tracked.snapshot.borrow().clone())
            .collect();
        calls.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        calls
    }

    /// Number of tracked calls that have not ended.
    pub fn active_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|tracked| tracked.snapshot.borrow().is_active())
            .count()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Remove `call_id` after `retention`, but only if it still belongs to the
    /// given session instance. Cancelled by process shutdown.
    pub fn schedule_eviction(&self, call_id: String, instance_id: Uuid, retention: Duration) {
        let sessions = Arc::clone(&self.sessions);
        let cancel = self.shutdown.child_token();

        self.tasks.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(call_id = %call_id, "Eviction cancelled by shutdown");
                }
                _ = tokio::time::sleep(retention) => {
                    let removed = sessions
                        .remove_if(&call_id, |_, tracked| tracked.instance_id == instance_id)
                        .is_some();
                    if removed {
                        tracing::info!(call_id = %call_id, "Session evicted");
                    }
                }
            }
        });
    }
}
