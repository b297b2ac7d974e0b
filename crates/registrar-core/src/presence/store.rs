//! In-memory presence directory

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::mpsc;
use tracing::debug;

use super::handle::DeliveryHandle;
use super::queue::EventQueue;
use crate::error::{RegistrarError, Result};
use crate::types::{ConnectionId, DeliveryMode, EndpointInfo, UserId};

#[derive(Debug)]
struct Endpoint<E> {
    handle: DeliveryHandle<E>,
    registered_at: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

impl<E> Endpoint<E> {
    fn new(handle: DeliveryHandle<E>) -> Self {
        let now = Utc::now();
        Self {
            handle,
            registered_at: now,
            last_seen: now,
        }
    }
}

/// Concurrent map of user id to delivery handle.
///
/// Registration is last-writer-wins. Lookups of users that are not
/// registered return `None`; callers treat that as "recipient offline".
/// Cloning is cheap and every clone shares the same map.
#[derive(Debug)]
pub struct PresenceDirectory<E> {
    endpoints: Arc<DashMap<UserId, Endpoint<E>>>,
    queue_capacity: Option<usize>,
}

impl<E> Clone for PresenceDirectory<E> {
    fn clone(&self) -> Self {
        Self {
            endpoints: Arc::clone(&self.endpoints),
            queue_capacity: self.queue_capacity,
        }
    }
}

impl<E> PresenceDirectory<E> {
    /// Create a directory. `queue_capacity` caps every poll queue it creates.
    pub fn new(queue_capacity: Option<usize>) -> Self {
        Self {
            endpoints: Arc::new(DashMap::new()),
            queue_capacity,
        }
    }

    /// Register `handle` for `user_id`, replacing and returning any previous one.
    ///
    /// A replaced poll queue is closed and its backlog handed to `handle`
    /// while the entry is still locked. Lookups therefore see the new handle
    /// only once the backlog is in it, and a router still holding the old
    /// queue gets its event back instead of losing it.
    pub fn register(&self, user_id: UserId, handle: DeliveryHandle<E>) -> Option<DeliveryHandle<E>> {
        let mode = handle.mode();
        let previous = match self.endpoints.entry(user_id.clone()) {
            Entry::Occupied(mut entry) => {
                let previous = entry.insert(Endpoint::new(handle.clone())).handle;
                if let DeliveryHandle::Poll(queue) = &previous {
                    if !previous.same_channel(&handle) {
                        hand_over(&user_id, queue, &handle);
                    }
                }
                Some(previous)
            }
            Entry::Vacant(entry) => {
                entry.insert(Endpoint::new(handle));
                None
            }
        };

        debug!(
            "Registered {} as {:?}{}",
            user_id,
            mode,
            if previous.is_some() { " (replaced previous endpoint)" } else { "" }
        );
        previous
    }

    /// Register a live push connection and return its connection id
    pub fn register_push(&self, user_id: UserId, sender: mpsc::UnboundedSender<E>) -> ConnectionId {
        let handle = DeliveryHandle::push(sender);
        let connection_id = handle.connection_id().unwrap_or_default();
        self.register(user_id, handle);
        connection_id
    }

    /// Current delivery handle for `user_id`, if reachable
    pub fn lookup(&self, user_id: &UserId) -> Option<DeliveryHandle<E>> {
        self.endpoints.get(user_id).map(|entry| entry.handle.clone())
    }

    /// Remove the endpoint for `user_id`
    pub fn unregister(&self, user_id: &UserId) -> Option<DeliveryHandle<E>> {
        let removed = self.endpoints.remove(user_id).map(|(_, endpoint)| endpoint.handle);
        if removed.is_some() {
            debug!("Unregistered {}", user_id);
        }
        removed
    }

    /// Remove the endpoint only if it is still the push connection
    /// `connection_id`. Returns whether anything was removed.
    pub fn unregister_connection(&self, user_id: &UserId, connection_id: ConnectionId) -> bool {
        let removed = self
            .endpoints
            .remove_if(user_id, |_, endpoint| endpoint.handle.connection_id() == Some(connection_id))
            .is_some();
        if removed {
            debug!("Unregistered {} (connection {})", user_id, connection_id);
        } else {
            debug!("Connection {} for {} is no longer current; keeping registration", connection_id, user_id);
        }
        removed
    }

    /// Poll queue for `user_id`, creating a poll endpoint if the user has none.
    /// Either way the endpoint's `last_seen` is refreshed.
    ///
    /// Never replaces a push endpoint: if the user is push-connected this
    /// returns [`RegistrarError::PushConnected`].
    pub fn ensure_poll(&self, user_id: &UserId) -> Result<Arc<EventQueue<E>>> {
        if user_id.is_empty() {
            return Err(RegistrarError::InvalidUserId(user_id.to_string()));
        }

        let capacity = self.queue_capacity;
        let mut entry = self
            .endpoints
            .entry(user_id.clone())
            .or_insert_with(|| Endpoint::new(DeliveryHandle::poll(capacity)));
        entry.last_seen = Utc::now();

        match &entry.handle {
            DeliveryHandle::Poll(queue) => Ok(Arc::clone(queue)),
            DeliveryHandle::Push { .. } => Err(RegistrarError::PushConnected(user_id.to_string())),
        }
    }

    /// Drain the poll queue for `user_id`, registering it on first use.
    ///
    /// The drain is atomic: the caller receives exactly the events present
    /// at the time of the call, oldest first.
    pub fn poll(&self, user_id: &UserId) -> Result<Vec<E>> {
        if user_id.is_empty() {
            return Err(RegistrarError::InvalidUserId(user_id.to_string()));
        }

        let capacity = self.queue_capacity;
        let mut entry = self
            .endpoints
            .entry(user_id.clone())
            .or_insert_with(|| Endpoint::new(DeliveryHandle::poll(capacity)));
        entry.last_seen = Utc::now();

        match &entry.handle {
            DeliveryHandle::Poll(queue) => Ok(queue.drain()),
            DeliveryHandle::Push { .. } => Err(RegistrarError::PushConnected(user_id.to_string())),
        }
    }

    /// Refresh `last_seen`. Returns false if the user is not registered.
    pub fn touch(&self, user_id: &UserId) -> bool {
        match self.endpoints.get_mut(user_id) {
            Some(mut entry) => {
                entry.last_seen = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Remove poll endpoints that have not been seen for `max_idle`.
    ///
    /// Push endpoints are never expired here; their socket's close does that.
    pub fn expire_idle(&self, max_idle: Duration) -> Vec<UserId> {
        let Ok(max_idle) = chrono::Duration::from_std(max_idle) else {
            return Vec::new();
        };
        let Some(cutoff) = Utc::now().checked_sub_signed(max_idle) else {
            return Vec::new();
        };

        let mut expired = Vec::new();
        self.endpoints.retain(|user_id, endpoint| {
            let stale = endpoint.handle.mode() == DeliveryMode::Poll && endpoint.last_seen < cutoff;
            if stale {
                expired.push(user_id.clone());
            }
            !stale
        });

        if !expired.is_empty() {
            debug!("Expired {} idle poll endpoint(s)", expired.len());
        }
        expired
    }

    pub fn info(&self, user_id: &UserId) -> Option<EndpointInfo> {
        self.endpoints.get(user_id).map(|entry| EndpointInfo {
            user_id: user_id.clone(),
            mode: entry.handle.mode(),
            queued: match &entry.handle {
                DeliveryHandle::Poll(queue) => queue.len(),
                DeliveryHandle::Push { .. } => 0,
            },
            registered_at: entry.registered_at,
            last_seen: entry.last_seen,
        })
    }

    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.endpoints.contains_key(user_id)
    }

    /// All registered user ids, sorted
    pub fn online_users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.endpoints.iter().map(|entry| entry.key().clone()).collect();
        users.sort();
        users
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// Close `queue` and move what it still holds to `handle`, oldest first
fn hand_over<E>(user_id: &UserId, queue: &EventQueue<E>, handle: &DeliveryHandle<E>) {
    let backlog = queue.close();
    if backlog.is_empty() {
        return;
    }
    debug!("Handing {} buffered event(s) for {} to the new endpoint", backlog.len(), user_id);
    for event in backlog {
        let delivered = match handle {
            DeliveryHandle::Push { sender, .. } => sender.send(event).is_ok(),
            DeliveryHandle::Poll(next) => next.push(event).is_ok(),
        };
        if !delivered {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn alice() -> UserId {
        UserId::from("1")
    }

    #[test]
    fn test_lookup_absent_user() {
        let directory: PresenceDirectory<u32> = PresenceDirectory::new(None);
        assert!(directory.lookup(&alice()).is_none());
        assert!(!directory.is_online(&alice()));
    }

    #[test]
    fn test_last_writer_wins() {
        let directory: PresenceDirectory<u32> = PresenceDirectory::new(None);
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        let first = directory.register_push(alice(), tx1);
        let second = directory.register_push(alice(), tx2);
        assert_ne!(first, second);

        let current = directory.lookup(&alice()).unwrap();
        assert_eq!(current.connection_id(), Some(second));
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_stale_connection_cannot_unregister() {
        let directory: PresenceDirectory<u32> = PresenceDirectory::new(None);
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        let stale = directory.register_push(alice(), tx1);
        let current = directory.register_push(alice(), tx2);

        assert!(!directory.unregister_connection(&alice(), stale));
        assert!(directory.is_online(&alice()));
        assert!(directory.unregister_connection(&alice(), current));
        assert!(!directory.is_online(&alice()));
    }

    #[test]
    fn test_poll_registers_and_drains() {
        let directory: PresenceDirectory<u32> = PresenceDirectory::new(None);
        assert!(directory.poll(&alice()).unwrap().is_empty());
        assert_eq!(directory.info(&alice()).unwrap().mode, DeliveryMode::Poll);

        let queue = directory.ensure_poll(&alice()).unwrap();
        queue.push(1).unwrap();
        queue.push(2).unwrap();
        assert_eq!(directory.info(&alice()).unwrap().queued, 2);

        assert_eq!(directory.poll(&alice()).unwrap(), vec![1, 2]);
        assert!(directory.poll(&alice()).unwrap().is_empty());
    }

    #[test]
    fn test_ensure_poll_refreshes_last_seen() {
        let directory: PresenceDirectory<u32> = PresenceDirectory::new(None);
        directory.ensure_poll(&alice()).unwrap();
        let first = directory.info(&alice()).unwrap();

        std::thread::sleep(Duration::from_millis(20));
        directory.ensure_poll(&alice()).unwrap();
        let second = directory.info(&alice()).unwrap();

        assert_eq!(second.registered_at, first.registered_at);
        assert!(second.last_seen > first.last_seen);
        assert!(directory.expire_idle(Duration::from_millis(15)).is_empty());
    }

    #[test]
    fn test_push_takes_over_poll_backlog() {
        let directory: PresenceDirectory<u32> = PresenceDirectory::new(None);
        let queue = directory.ensure_poll(&alice()).unwrap();
        queue.push(1).unwrap();
        queue.push(2).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection_id = directory.register_push(alice(), tx);

        assert_eq!(rx.try_recv().unwrap(), 1);
        assert_eq!(rx.try_recv().unwrap(), 2);
        assert_eq!(directory.lookup(&alice()).unwrap().connection_id(), Some(connection_id));

        // A writer still holding the replaced queue gets its event back
        assert!(queue.is_closed());
        assert_eq!(queue.push(3), Err(3));
    }

    #[test]
    fn test_poll_never_replaces_push() {
        let directory: PresenceDirectory<u32> = PresenceDirectory::new(None);
        let (tx, _rx) = mpsc::unbounded_channel();
        directory.register_push(alice(), tx);

        assert!(matches!(directory.poll(&alice()), Err(RegistrarError::PushConnected(_))));
        assert!(matches!(directory.ensure_poll(&alice()), Err(RegistrarError::PushConnected(_))));
        assert_eq!(directory.info(&alice()).unwrap().mode, DeliveryMode::Push);
    }

    #[test]
    fn test_empty_user_id_rejected() {
        let directory: PresenceDirectory<u32> = PresenceDirectory::new(None);
        assert!(matches!(directory.poll(&UserId::from("")), Err(RegistrarError::InvalidUserId(_))));
        assert!(directory.is_empty());
    }

    #[test]
    fn test_queue_capacity_applies_to_new_endpoints() {
        let directory: PresenceDirectory<u32> = PresenceDirectory::new(Some(1));
        let queue = directory.ensure_poll(&alice()).unwrap();
        queue.push(1).unwrap();
        queue.push(2).unwrap();
        assert_eq!(directory.poll(&alice()).unwrap(), vec![2]);
    }

    #[test]
    fn test_expire_idle_only_touches_poll_endpoints() {
        let directory: PresenceDirectory<u32> = PresenceDirectory::new(None);
        let (tx, _rx) = mpsc::unbounded_channel();
        directory.register_push(UserId::from("push"), tx);
        directory.ensure_poll(&UserId::from("poll")).unwrap();

        std::thread::sleep(Duration::from_millis(20));
        let expired = directory.expire_idle(Duration::from_millis(5));

        assert_eq!(expired, vec![UserId::from("poll")]);
        assert_eq!(directory.online_users(), vec![UserId::from("push")]);
    }

    #[test]
    fn test_recent_poll_survives_expiry() {
        let directory: PresenceDirectory<u32> = PresenceDirectory::new(None);
        directory.poll(&alice()).unwrap();
        assert!(directory.expire_idle(Duration::from_secs(60)).is_empty());
        assert!(directory.is_online(&alice()));
    }
}
