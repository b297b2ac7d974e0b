//! Call Session Tracker
//!
//! Owns every live [`Session`] and turns call-control requests into state
//! transitions plus outbound events. Transitions on one session are
//! serialised by that session's lock; different sessions never contend.
//!
//! Every operation on an unknown or already ended session returns
//! [`SessionError::SessionNotFound`]; operations that arrive out of order
//! return [`SessionError::InvalidTransition`]. Neither is fatal.

pub mod registry;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::errors::{Result, SessionError};
use crate::events::{CallAccepted, CallEnded, DispatchOutcome, EventDispatcher, IceCandidate, IncomingCall, SignallingEvent};
use crate::session::{Departure, Session};
use crate::types::{CallKind, CallState, Candidate, EndReason, GroupEndPolicy, SessionDescription, SessionId};
use skyrelay_registrar_core::UserId;

pub use registry::{SessionHandle, SessionRegistry, TrackerStats};

/// Outcome of starting a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Started {
    pub session_id: SessionId,
    /// How the `incomingCall` reached each invitee
    pub deliveries: Vec<(UserId, DispatchOutcome)>,
}

impl Started {
    /// True when no invitee could be reached at all
    pub fn all_dropped(&self) -> bool {
        self.deliveries.iter().all(|(_, outcome)| !outcome.is_delivered())
    }
}

#[derive(Clone)]
pub struct CallSessionTracker {
    registry: SessionRegistry,
    dispatcher: Arc<dyn EventDispatcher>,
    group_policy: GroupEndPolicy,
}

impl std::fmt::Debug for CallSessionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSessionTracker")
            .field("sessions", &self.registry.len())
            .field("group_policy", &self.group_policy)
            .finish()
    }
}

impl CallSessionTracker {
    pub fn new(dispatcher: Arc<dyn EventDispatcher>) -> Self {
        Self {
            registry: SessionRegistry::new(),
            dispatcher,
            group_policy: GroupEndPolicy::default(),
        }
    }

    pub fn with_group_policy(mut self, policy: GroupEndPolicy) -> Self {
        self.group_policy = policy;
        self
    }

    pub fn group_policy(&self) -> GroupEndPolicy {
        self.group_policy
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Start a one-to-one call. The session is `offered` on return and the
    /// callee has been sent `incomingCall`.
    ///
    /// An earlier unanswered offer from the same caller to the same callee is
    /// ended as [`EndReason::Superseded`] without notifying anyone: the new
    /// `incomingCall` replaces it on the callee's side.
    pub async fn start(
        &self,
        caller: UserId,
        callee: UserId,
        offer: SessionDescription,
        caller_name: String,
    ) -> Result<Started> {
        if caller.is_empty() || callee.is_empty() {
            return Err(SessionError::invalid_request("caller and callee ids are required"));
        }
        if caller == callee {
            return Err(SessionError::invalid_request("cannot call yourself"));
        }

        self.supersede_offers(&caller, &callee).await;

        let mut session = Session::new_direct(caller.clone(), callee.clone(), caller_name.clone(), offer.clone());
        session.transition(CallState::Offered)?;
        let session_id = session.id.clone();

        let handle = self.registry.insert(session);
        let _session = handle.lock().await;

        let event = SignallingEvent::IncomingCall(IncomingCall {
            from_user_id: caller.clone(),
            offer_sdp: offer,
            name: caller_name,
            session_id: session_id.clone(),
            room_name: None,
            participants: Vec::new(),
        });
        let outcome = self.dispatcher.dispatch(&callee, event);

        info!("Call {} started: {} -> {} ({:?})", session_id, caller, callee, outcome);
        Ok(Started {
            session_id,
            deliveries: vec![(callee, outcome)],
        })
    }

    async fn supersede_offers(&self, caller: &UserId, callee: &UserId) {
        for session_id in self.registry.sessions_for(callee) {
            let Some(handle) = self.registry.get(&session_id) else {
                continue;
            };
            let mut session = handle.lock().await;
            let repeated = session.kind == CallKind::Direct
                && session.state == CallState::Offered
                && session.caller == *caller
                && session.callee() == Some(callee);
            if repeated && session.terminate(EndReason::Superseded).is_ok() {
                self.registry.remove(&session_id, &session.everyone());
                debug!("Call {} superseded by a new offer from {} to {}", session_id, caller, callee);
            }
        }
    }

    /// Start a group call hosted by `host`. Every invitee gets `incomingCall`.
    pub async fn start_group(
        &self,
        host: UserId,
        invitees: Vec<UserId>,
        room_name: Option<String>,
        offer: SessionDescription,
        host_name: String,
    ) -> Result<Started> {
        if host.is_empty() {
            return Err(SessionError::invalid_request("host id is required"));
        }

        let mut seen = BTreeSet::new();
        let invitees: Vec<UserId> = invitees
            .into_iter()
            .filter(|u| !u.is_empty() && *u != host && seen.insert(u.clone()))
            .collect();
        if invitees.is_empty() {
            return Err(SessionError::invalid_request("group call needs at least one invitee"));
        }

        let mut session = Session::new_group(
            host.clone(),
            invitees.clone(),
            room_name.clone(),
            host_name.clone(),
            offer.clone(),
        );
        session.transition(CallState::Offered)?;
        let session_id = session.id.clone();

        let handle = self.registry.insert(session);
        let _session = handle.lock().await;

        let deliveries: Vec<(UserId, DispatchOutcome)> = invitees
            .iter()
            .map(|invitee| {
                let event = SignallingEvent::IncomingCall(IncomingCall {
                    from_user_id: host.clone(),
                    offer_sdp: offer.clone(),
                    name: host_name.clone(),
                    session_id: session_id.clone(),
                    room_name: room_name.clone(),
                    participants: invitees.clone(),
                });
                (invitee.clone(), self.dispatcher.dispatch(invitee, event))
            })
            .collect();

        info!(
            "Group call {} started by {} with {} invitee(s)",
            session_id,
            host,
            invitees.len()
        );
        Ok(Started { session_id, deliveries })
    }

    /// `by` answers the call; the caller receives `callAccepted`
    pub async fn accept(&self, session_id: &SessionId, by: &UserId, answer: SessionDescription) -> Result<()> {
        let handle = self.handle(session_id)?;
        let mut session = handle.lock().await;
        if session.state.is_terminal() {
            return Err(SessionError::session_not_found(session_id));
        }

        session.accept(by)?;

        if session.caller_present {
            let event = SignallingEvent::CallAccepted(CallAccepted {
                from_user_id: by.clone(),
                answer_sdp: answer,
                session_id: session_id.clone(),
            });
            self.dispatcher.dispatch(&session.caller, event);
        }

        info!("Call {} accepted by {}", session_id, by);
        Ok(())
    }

    /// Relay a candidate from `from` to the other side of the call.
    /// Returns how many users it was sent to.
    pub async fn candidate(&self, session_id: &SessionId, from: &UserId, candidate: Candidate) -> Result<usize> {
        self.relay_candidate(session_id, from, None, candidate).await
    }

    /// Relay a candidate from `from` to one peer only. In a group call the
    /// host runs one peer connection per participant, so its candidates are
    /// addressed.
    pub async fn candidate_to(
        &self,
        session_id: &SessionId,
        from: &UserId,
        to: &UserId,
        candidate: Candidate,
    ) -> Result<usize> {
        self.relay_candidate(session_id, from, Some(to), candidate).await
    }

    async fn relay_candidate(
        &self,
        session_id: &SessionId,
        from: &UserId,
        to: Option<&UserId>,
        candidate: Candidate,
    ) -> Result<usize> {
        let handle = self.handle(session_id)?;
        let session = handle.lock().await;
        if session.state.is_terminal() {
            return Err(SessionError::session_not_found(session_id));
        }

        let mut targets = session.candidate_targets(from)?;
        if let Some(to) = to {
            if !targets.contains(to) {
                return Err(SessionError::not_participant(session_id, to));
            }
            targets = vec![to.clone()];
        }

        for target in &targets {
            let event = SignallingEvent::IceCandidate(IceCandidate {
                from_user_id: from.clone(),
                candidate: candidate.clone(),
                session_id: Some(session_id.clone()),
            });
            self.dispatcher.dispatch(target, event);
        }

        debug!("Relayed candidate in {} from {} to {} peer(s)", session_id, from, targets.len());
        Ok(targets.len())
    }

    /// `by` leaves the call; remaining members receive `callEnded`. The
    /// session is released once it has ended.
    pub async fn end(&self, session_id: &SessionId, by: &UserId, reason: EndReason) -> Result<Departure> {
        let handle = self.handle(session_id)?;
        let mut session = handle.lock().await;

        let departure = session.leave(by, self.group_policy, reason)?;
        for user in &departure.notify {
            let event = SignallingEvent::CallEnded(CallEnded {
                from_user_id: by.clone(),
                session_id: session_id.clone(),
                reason,
            });
            self.dispatcher.dispatch(user, event);
        }

        if departure.ended {
            self.registry.remove(session_id, &session.everyone());
            info!("Call {} ended by {} ({})", session_id, by, reason);
        } else {
            self.registry.unindex(by, session_id);
            info!("{} left group call {} ({})", by, session_id, reason);
        }
        Ok(departure)
    }

    /// End a session for everyone, regardless of who is in it
    pub async fn terminate(&self, session_id: &SessionId, reason: EndReason) -> Result<Vec<UserId>> {
        let handle = self.handle(session_id)?;
        let mut session = handle.lock().await;
        self.terminate_locked(&mut session, reason)
    }

    fn terminate_locked(&self, session: &mut Session, reason: EndReason) -> Result<Vec<UserId>> {
        let notify = session.terminate(reason)?;
        let session_id = session.id.clone();

        for user in &notify {
            // Each side hears about the call from the other side
            let from = if *user == session.caller {
                session.callee().cloned().unwrap_or_else(|| session.caller.clone())
            } else {
                session.caller.clone()
            };
            let event = SignallingEvent::CallEnded(CallEnded {
                from_user_id: from,
                session_id: session_id.clone(),
                reason,
            });
            self.dispatcher.dispatch(user, event);
        }

        self.registry.remove(&session_id, &session.everyone());
        info!("Call {} terminated ({})", session_id, reason);
        Ok(notify)
    }

    /// Treat `user` as having left every call they are in.
    /// Returns the sessions they were removed from.
    pub async fn end_all_for(&self, user: &UserId, reason: EndReason) -> Vec<SessionId> {
        let mut affected = Vec::new();
        for session_id in self.registry.sessions_for(user) {
            match self.end(&session_id, user, reason).await {
                Ok(_) => affected.push(session_id),
                Err(e) => debug!("Skipping session {} while removing {}: {}", session_id, user, e),
            }
        }
        affected
    }

    /// End every call still `offered` after `max_ring`
    pub async fn expire_unanswered(&self, max_ring: Duration) -> Vec<SessionId> {
        let Ok(max_ring) = chrono::Duration::from_std(max_ring) else {
            return Vec::new();
        };

        let mut expired = Vec::new();
        for session_id in self.registry.session_ids() {
            let Some(handle) = self.registry.get(&session_id) else {
                continue;
            };
            let mut session = handle.lock().await;
            if session.state == CallState::Offered
                && session.age() >= max_ring
                && self.terminate_locked(&mut session, EndReason::Timeout).is_ok()
            {
                expired.push(session_id);
            }
        }
        expired
    }

    /// Record that media is flowing (`answered -> active`)
    pub async fn mark_active(&self, session_id: &SessionId) -> Result<()> {
        let handle = self.handle(session_id)?;
        let mut session = handle.lock().await;
        if session.state.is_terminal() {
            return Err(SessionError::session_not_found(session_id));
        }
        session.transition(CallState::Active)
    }

    /// Snapshot of a live session
    pub async fn get(&self, session_id: &SessionId) -> Option<Session> {
        let handle = self.registry.get(session_id)?;
        let session = handle.lock().await;
        (!session.state.is_terminal()).then(|| session.clone())
    }

    /// Newest live session in which both users are members
    pub async fn find_between(&self, a: &UserId, b: &UserId) -> Option<SessionId> {
        let theirs = self.registry.sessions_for(b);
        let mut best: Option<(chrono::DateTime<chrono::Utc>, SessionId)> = None;

        for session_id in self.registry.sessions_for(a).into_iter().filter(|id| theirs.contains(id)) {
            let Some(handle) = self.registry.get(&session_id) else {
                continue;
            };
            let session = handle.lock().await;
            if session.state.is_terminal() || !session.is_member(a) || !session.is_member(b) {
                continue;
            }
            if best.as_ref().is_none_or(|(created, _)| session.created_at > *created) {
                best = Some((session.created_at, session_id));
            }
        }
        best.map(|(_, id)| id)
    }

    /// Newest live session started by `host` that `member` is still in,
    /// whether or not the host is
    pub async fn find_hosted(&self, member: &UserId, host: &UserId) -> Option<SessionId> {
        let mut best: Option<(chrono::DateTime<chrono::Utc>, SessionId)> = None;

        for session_id in self.registry.sessions_for(member) {
            let Some(handle) = self.registry.get(&session_id) else {
                continue;
            };
            let session = handle.lock().await;
            if session.state.is_terminal() || session.caller != *host || !session.is_member(member) {
                continue;
            }
            if best.as_ref().is_none_or(|(created, _)| session.created_at > *created) {
                best = Some((session.created_at, session_id));
            }
        }
        best.map(|(_, id)| id)
    }

    /// Newest live session from `caller` in which `callee` has not answered yet
    pub async fn find_offered(&self, caller: &UserId, callee: &UserId) -> Option<SessionId> {
        let mut best: Option<(chrono::DateTime<chrono::Utc>, SessionId)> = None;

        for session_id in self.registry.sessions_for(callee) {
            let Some(handle) = self.registry.get(&session_id) else {
                continue;
            };
            let session = handle.lock().await;
            let pending = match session.kind {
                CallKind::Direct => session.state == CallState::Offered,
                CallKind::Group { .. } => !session.state.is_terminal(),
            };
            if !pending || session.caller != *caller || !session.is_invited(callee) {
                continue;
            }
            if best.as_ref().is_none_or(|(created, _)| session.created_at > *created) {
                best = Some((session.created_at, session_id));
            }
        }
        best.map(|(_, id)| id)
    }

    pub fn sessions_for(&self, user: &UserId) -> Vec<SessionId> {
        self.registry.sessions_for(user)
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn stats(&self) -> TrackerStats {
        self.registry.stats()
    }

    fn handle(&self, session_id: &SessionId) -> Result<SessionHandle> {
        self.registry
            .get(session_id)
            .ok_or_else(|| SessionError::session_not_found(session_id))
    }
}
