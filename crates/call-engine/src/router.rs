//! Signalling router
//!
//! Delivers [`SignallingEvent`]s to users through whatever channel the
//! presence directory holds for them. Routing never waits on the recipient:
//! push delivery is an unbounded channel send, poll delivery an append to
//! the user's queue.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use skyrelay_registrar_core::{DeliveryHandle, EventQueue, PresenceDirectory, RegistrarError, UserId};
use skyrelay_session_core::{DispatchOutcome, EventDispatcher, SignallingEvent};

/// What happens to an event whose recipient has no endpoint at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfflinePolicy {
    /// Create a poll endpoint for the recipient and queue the event, so a
    /// user who shows up later still receives it
    #[default]
    Buffer,
    /// Drop the event
    Drop,
}

#[derive(Debug, Clone)]
pub struct SignallingRouter {
    directory: PresenceDirectory<SignallingEvent>,
    policy: OfflinePolicy,
}

impl SignallingRouter {
    pub fn new(directory: PresenceDirectory<SignallingEvent>, policy: OfflinePolicy) -> Self {
        Self { directory, policy }
    }

    pub fn directory(&self) -> &PresenceDirectory<SignallingEvent> {
        &self.directory
    }

    pub fn policy(&self) -> OfflinePolicy {
        self.policy
    }

    /// Deliver `event` to `to`, best effort
    pub fn route(&self, to: &UserId, event: SignallingEvent) -> DispatchOutcome {
        let name = event.name();

        if let Some(handle) = self.directory.lookup(to) {
            return self.deliver(to, handle, event);
        }

        match self.policy {
            OfflinePolicy::Buffer => match self.directory.ensure_poll(to) {
                Ok(queue) => {
                    debug!("Buffering {} for offline user {}", name, to);
                    self.enqueue(to, &queue, event)
                }
                // a socket registered between lookup and ensure_poll
                Err(RegistrarError::PushConnected(_)) => match self.directory.lookup(to) {
                    Some(handle) => self.deliver(to, handle, event),
                    None => DispatchOutcome::Dropped,
                },
                Err(e) => {
                    warn!("Cannot buffer {} for {}: {}", name, to, e);
                    DispatchOutcome::Dropped
                }
            },
            OfflinePolicy::Drop => {
                debug!("Dropped {} for {}: recipient offline", name, to);
                DispatchOutcome::Dropped
            }
        }
    }

    /// Deliver `event` to `to` only if `to` already has an endpoint.
    ///
    /// Used for traffic that must not bring a user back online, whatever the
    /// offline policy says.
    pub fn route_registered(&self, to: &UserId, event: SignallingEvent) -> DispatchOutcome {
        match self.directory.lookup(to) {
            Some(handle) => self.deliver(to, handle, event),
            None => {
                debug!("Dropped {} for {}: not registered", event.name(), to);
                DispatchOutcome::Dropped
            }
        }
    }

    /// Hand `event` to `handle`. A closed push channel drops the event and
    /// removes the dead registration.
    fn deliver(
        &self,
        to: &UserId,
        handle: DeliveryHandle<SignallingEvent>,
        event: SignallingEvent,
    ) -> DispatchOutcome {
        let name = event.name();
        match handle {
            DeliveryHandle::Push { connection_id, sender } => match sender.send(event) {
                Ok(()) => {
                    debug!("Pushed {} to {}", name, to);
                    DispatchOutcome::Pushed
                }
                Err(_) => {
                    warn!("Socket for {} is gone; dropped {} and its registration", to, name);
                    self.directory.unregister_connection(to, connection_id);
                    DispatchOutcome::Dropped
                }
            },
            DeliveryHandle::Poll(queue) => {
                debug!("Queueing {} for {}", name, to);
                self.enqueue(to, &queue, event)
            }
        }
    }

    /// Append to a poll queue. A queue closed by a socket taking over the
    /// endpoint refuses the event, which then follows the new registration.
    fn enqueue(&self, to: &UserId, queue: &EventQueue<SignallingEvent>, event: SignallingEvent) -> DispatchOutcome {
        match queue.push(event) {
            Ok(evicted) => {
                if evicted.is_some() {
                    warn!("Poll queue for {} is full; evicted oldest event", to);
                }
                DispatchOutcome::Buffered
            }
            Err(event) => match self.directory.lookup(to) {
                Some(handle) => self.deliver(to, handle, event),
                None => {
                    debug!("Dropped {} for {}: endpoint replaced and gone", event.name(), to);
                    DispatchOutcome::Dropped
                }
            },
        }
    }
}

impl EventDispatcher for SignallingRouter {
    fn dispatch(&self, to: &UserId, event: SignallingEvent) -> DispatchOutcome {
        self.route(to, event)
    }
}
