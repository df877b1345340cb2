//! Connection registry
//!
//! Process-wide map from identity to its currently active session handle.
//! At most one live session per identity: registering a new handle returns
//! the previous one, which the caller must preempt.
//!
//! Entries live in a sharded `DashMap`, so sessions of different identities
//! never contend on a single lock.

use dashmap::DashMap;
use emotrack_common::IdentityId;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Reference to a running session, held by the registry
///
/// Cloning shares the same underlying tokens.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    session_id: Uuid,
    identity_id: IdentityId,
    preempt: CancellationToken,
    stopped: CancellationToken,
}

impl SessionHandle {
    pub fn new(identity_id: IdentityId) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            identity_id,
            preempt: CancellationToken::new(),
            stopped: CancellationToken::new(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn identity_id(&self) -> IdentityId {
        self.identity_id
    }

    /// Ask the session to stop with the "preempted" close reason
    pub fn preempt(&self) {
        self.preempt.cancel();
    }

    pub fn is_preempted(&self) -> bool {
        self.preempt.is_cancelled()
    }

    /// Resolves once `preempt` has been called
    pub async fn preempted(&self) {
        self.preempt.cancelled().await
    }

    /// Called by the owning session once its connection is closed
    pub fn mark_stopped(&self) {
        self.stopped.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.is_cancelled()
    }

    /// Wait until the session has closed its connection
    ///
    /// Returns `false` if `limit` elapsed first.
    pub async fn wait_stopped(&self, limit: Duration) -> bool {
        tokio::time::timeout(limit, self.stopped.cancelled())
            .await
            .is_ok()
    }

    /// Same session, not merely the same identity
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        self.session_id == other.session_id
    }
}

/// Identity → active session map
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: DashMap<IdentityId, SessionHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically install `handle` and return the handle it replaced, if any
    pub fn register(&self, handle: SessionHandle) -> Option<SessionHandle> {
        let identity_id = handle.identity_id;
        let session_id = handle.session_id;
        let previous = self.entries.insert(identity_id, handle);

        debug!(
            identity_id,
            %session_id,
            replaced = previous.is_some(),
            "Registered session"
        );
        previous
    }

    /// Remove the entry for `identity_id` only if it still points at `session_id`
    ///
    /// A session that was already superseded must not remove its successor's
    /// entry. Returns whether an entry was removed.
    pub fn unregister(&self, identity_id: IdentityId, session_id: Uuid) -> bool {
        let removed = self
            .entries
            .remove_if(&identity_id, |_, current| current.session_id == session_id)
            .is_some();

        debug!(identity_id, %session_id, removed, "Unregister session");
        removed
    }

    /// Currently registered handle for an identity
    pub fn get(&self, identity_id: IdentityId) -> Option<SessionHandle> {
        self.entries.get(&identity_id).map(|entry| entry.value().clone())
    }

    pub fn active_count(&self) -> usize {
        self.entries.len()
    }
}

/// Removes a session's registry entry when dropped
///
/// Ties registry cleanup to the session's lifetime, so the entry is removed
/// exactly once whichever way the session ends, including task abort.
#[derive(Debug)]
pub struct RegistrationGuard {
    registry: Arc<ConnectionRegistry>,
    handle: Option<SessionHandle>,
}

impl RegistrationGuard {
    pub fn new(registry: Arc<ConnectionRegistry>, handle: SessionHandle) -> Self {
        Self {
            registry,
            handle: Some(handle),
        }
    }

    /// Unregister now; later calls and the drop become no-ops
    ///
    /// Also marks the session stopped, so a successor waiting on it is
    /// released even when the session never reached its own close step.
    pub fn release(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.mark_stopped();
                self.registry
                    .unregister(handle.identity_id, handle.session_id)
            }
            None => false,
        }
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.release();
    }
}
