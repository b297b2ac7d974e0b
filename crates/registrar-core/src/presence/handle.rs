//! Delivery handles stored in the directory

use std::sync::Arc;

use tokio::sync::mpsc;

use super::queue::EventQueue;
use crate::types::{ConnectionId, DeliveryMode};

/// How to reach a registered user
#[derive(Debug)]
pub enum DeliveryHandle<E> {
    /// Live connection; `sender` feeds the socket's writer task
    Push {
        connection_id: ConnectionId,
        sender: mpsc::UnboundedSender<E>,
    },
    /// Buffered delivery, drained by polls
    Poll(Arc<EventQueue<E>>),
}

impl<E> DeliveryHandle<E> {
    pub fn push(sender: mpsc::UnboundedSender<E>) -> Self {
        DeliveryHandle::Push {
            connection_id: ConnectionId::new(),
            sender,
        }
    }

    pub fn poll(capacity: Option<usize>) -> Self {
        DeliveryHandle::Poll(Arc::new(EventQueue::new(capacity)))
    }

    pub fn mode(&self) -> DeliveryMode {
        match self {
            DeliveryHandle::Push { .. } => DeliveryMode::Push,
            DeliveryHandle::Poll(_) => DeliveryMode::Poll,
        }
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        match self {
            DeliveryHandle::Push { connection_id, .. } => Some(*connection_id),
            DeliveryHandle::Poll(_) => None,
        }
    }

    /// Whether two handles refer to the same socket or the same queue
    pub fn same_channel(&self, other: &Self) -> bool {
        match (self, other) {
            (DeliveryHandle::Push { connection_id: a, .. }, DeliveryHandle::Push { connection_id: b, .. }) => a == b,
            (DeliveryHandle::Poll(a), DeliveryHandle::Poll(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// Manual impl: cloning a handle never requires cloning events.
impl<E> Clone for DeliveryHandle<E> {
    fn clone(&self) -> Self {
        match self {
            DeliveryHandle::Push { connection_id, sender } => DeliveryHandle::Push {
                connection_id: *connection_id,
                sender: sender.clone(),
            },
            DeliveryHandle::Poll(queue) => DeliveryHandle::Poll(queue.clone()),
        }
    }
}
