//! Session Registry
//!
//! Storage for live sessions plus a user → sessions index. Each session sits
//! behind its own async mutex; the maps themselves are never held across an
//! `.await`.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::session::Session;
use crate::types::SessionId;
use skyrelay_registrar_core::UserId;

/// Shared handle to one session
pub type SessionHandle = Arc<Mutex<Session>>;

/// Counters exposed on the health endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackerStats {
    pub active_sessions: usize,
    pub total_started: u64,
    pub total_ended: u64,
}

#[derive(Debug, Default)]
struct Counters {
    started: AtomicU64,
    ended: AtomicU64,
}

#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<SessionId, SessionHandle>>,
    by_user: Arc<DashMap<UserId, HashSet<SessionId>>>,
    counters: Arc<Counters>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new session and index it under every member
    pub fn insert(&self, session: Session) -> SessionHandle {
        let session_id = session.id.clone();
        let members = session.everyone();
        let handle = Arc::new(Mutex::new(session));

        self.sessions.insert(session_id.clone(), Arc::clone(&handle));
        for user in members {
            self.index(&user, &session_id);
        }
        self.counters.started.fetch_add(1, Ordering::Relaxed);

        tracing::debug!("Registered session {}", session_id);
        handle
    }

    pub fn get(&self, session_id: &SessionId) -> Option<SessionHandle> {
        self.sessions.get(session_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Drop a session and every index entry pointing at it
    pub fn remove(&self, session_id: &SessionId, users: &[UserId]) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        for user in users {
            self.unindex(user, session_id);
        }
        if removed {
            self.counters.ended.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Released session {}", session_id);
        }
        removed
    }

    pub fn index(&self, user: &UserId, session_id: &SessionId) {
        self.by_user.entry(user.clone()).or_default().insert(session_id.clone());
    }

    pub fn unindex(&self, user: &UserId, session_id: &SessionId) {
        // remove_if keeps the check and the removal under one shard lock
        if let Some(mut ids) = self.by_user.get_mut(user) {
            ids.remove(session_id);
        }
        self.by_user.remove_if(user, |_, ids| ids.is_empty());
    }

    /// Sessions `user` is indexed under
    pub fn sessions_for(&self, user: &UserId) -> Vec<SessionId> {
        self.by_user
            .get(user)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn stats(&self) -> TrackerStats {
        TrackerStats {
            active_sessions: self.sessions.len(),
            total_started: self.counters.started.load(Ordering::Relaxed),
            total_ended: self.counters.ended.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionDescription;

    #[tokio::test]
    async fn test_insert_indexes_all_members() {
        let registry = SessionRegistry::new();
        let session = Session::new_direct(
            UserId::from("a"),
            UserId::from("b"),
            String::new(),
            SessionDescription::default(),
        );
        let id = session.id.clone();
        registry.insert(session);

        assert_eq!(registry.sessions_for(&UserId::from("a")), vec![id.clone()]);
        assert_eq!(registry.sessions_for(&UserId::from("b")), vec![id.clone()]);
        assert_eq!(registry.get(&id).unwrap().lock().await.caller, UserId::from("a"));
    }

    #[tokio::test]
    async fn test_remove_clears_index_and_counts() {
        let registry = SessionRegistry::new();
        let session = Session::new_direct(
            UserId::from("a"),
            UserId::from("b"),
            String::new(),
            SessionDescription::default(),
        );
        let id = session.id.clone();
        let users = session.everyone();
        registry.insert(session);

        assert!(registry.remove(&id, &users));
        assert!(!registry.remove(&id, &users));
        assert!(registry.sessions_for(&UserId::from("a")).is_empty());
        assert!(registry.is_empty());
        assert_eq!(
            registry.stats(),
            TrackerStats { active_sessions: 0, total_started: 1, total_ended: 1 }
        );
    }
}
