//! Signalling coordinator
//!
//! The one entry point both transports share. REST handlers and the
//! WebSocket reader loop translate their wire messages into calls on
//! [`SignallingCoordinator`]; nothing transport-specific happens below this
//! line.
//!
//! Clients address peers by user id, not by session, so the coordinator
//! resolves user-addressed call-control to the session it belongs to. A
//! request may also name the session directly (every event the relay sends
//! carries its `sessionId`), which is how group participants are told apart.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, Level, debug, info, warn};

use skyrelay_infra_common::LogContext;
use skyrelay_registrar_core::{ConnectionId, DeliveryMode, PresenceDirectory, RegistrarError, UserId};
use skyrelay_session_core::{
    CallFailed, CallSessionTracker, Candidate, EndReason, IceCandidate, SessionDescription, SessionId,
    SignallingEvent, TrackerStats,
};

use crate::config::SignallingConfig;
use crate::error::{CallEngineError, Result};
use crate::router::{OfflinePolicy, SignallingRouter};

/// Reason sent in `callFailed` when the callee cannot be reached
pub const USER_OFFLINE: &str = "user offline";

/// What one maintenance pass cleaned up
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub expired_endpoints: Vec<UserId>,
    pub expired_calls: Vec<SessionId>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired_endpoints.is_empty() && self.expired_calls.is_empty()
    }
}

/// Point-in-time counters for the health endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    pub online_users: usize,
    pub sessions: TrackerStats,
}

#[derive(Debug, Clone)]
pub struct SignallingCoordinator {
    directory: PresenceDirectory<SignallingEvent>,
    router: Arc<SignallingRouter>,
    tracker: CallSessionTracker,
    config: SignallingConfig,
}

impl SignallingCoordinator {
    pub fn new(config: SignallingConfig) -> Self {
        let directory = PresenceDirectory::new(config.max_queued_events);
        let router = Arc::new(SignallingRouter::new(directory.clone(), config.offline_policy));
        let tracker = CallSessionTracker::new(router.clone()).with_group_policy(config.group_end_policy);

        Self {
            directory,
            router,
            tracker,
            config,
        }
    }

    pub fn directory(&self) -> &PresenceDirectory<SignallingEvent> {
        &self.directory
    }

    pub fn router(&self) -> &SignallingRouter {
        &self.router
    }

    pub fn tracker(&self) -> &CallSessionTracker {
        &self.tracker
    }

    pub fn config(&self) -> &SignallingConfig {
        &self.config
    }

    // ---- presence ----

    /// Attach a live socket for `user`. Events buffered while the user was
    /// polling are flushed to the socket.
    pub fn register_push(&self, user: UserId, sender: mpsc::UnboundedSender<SignallingEvent>) -> ConnectionId {
        let connection_id = self.directory.register_push(user.clone(), sender);
        info!("{} connected (connection {})", user, connection_id);
        connection_id
    }

    /// Make sure `user` has an endpoint and mark them as seen. A user with a
    /// live socket keeps it.
    pub fn register_poll(&self, user: &UserId) -> Result<()> {
        match self.directory.ensure_poll(user) {
            Ok(_) | Err(RegistrarError::PushConnected(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Drain `user`'s buffered events, registering a poll endpoint on first
    /// use. Push-connected users get nothing: their events go to the socket.
    pub fn poll(&self, user: &UserId) -> Result<Vec<SignallingEvent>> {
        match self.directory.poll(user) {
            Ok(events) => Ok(events),
            Err(RegistrarError::PushConnected(_)) => {
                self.directory.touch(user);
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Socket `connection_id` for `user` closed.
    ///
    /// The user's calls end unless a newer socket has taken over the
    /// registration. Returns the sessions the user was removed from.
    pub async fn disconnect(&self, user: &UserId, connection_id: ConnectionId) -> Vec<SessionId> {
        let removed = self.directory.unregister_connection(user, connection_id);
        // The router may already have dropped a dead socket's registration
        let superseded = self
            .directory
            .lookup(user)
            .is_some_and(|handle| handle.mode() == DeliveryMode::Push);

        if !removed && superseded {
            debug!("{} reconnected elsewhere; keeping calls", user);
            return Vec::new();
        }

        let ended = self.tracker.end_all_for(user, EndReason::Disconnected).await;
        info!("{} disconnected; left {} call(s)", user, ended.len());
        ended
    }

    /// Drop `user`'s endpoint, whatever kind it is, and leave their calls
    pub async fn logout(&self, user: &UserId) -> Vec<SessionId> {
        self.directory.unregister(user);
        let ended = self.tracker.end_all_for(user, EndReason::Hangup).await;
        info!("{} logged out; left {} call(s)", user, ended.len());
        ended
    }

    // ---- call control ----

    /// Offer a call from `from` to `to`.
    ///
    /// Returns `None` when the callee is offline and the relay does not
    /// buffer; the caller has been sent `callFailed` instead.
    pub async fn call_user(
        &self,
        from: UserId,
        to: UserId,
        offer: SessionDescription,
        name: String,
    ) -> Result<Option<SessionId>> {
        if self.router.policy() == OfflinePolicy::Drop && !to.is_empty() && from != to && !self.directory.is_online(&to) {
            self.fail_call(&from, &to);
            return Ok(None);
        }

        let started = self.tracker.start(from.clone(), to.clone(), offer, name).await?;

        if started.all_dropped() {
            // The callee vanished between the presence check and the offer
            if let Err(e) = self.tracker.end(&started.session_id, &to, EndReason::Unreachable).await {
                debug!("Unreachable call {} already gone: {}", started.session_id, e);
            }
            return Ok(None);
        }

        Ok(Some(started.session_id))
    }

    /// `me` answers the call `caller` offered them
    pub async fn accept_call(
        &self,
        me: UserId,
        caller: UserId,
        answer: SessionDescription,
        session_id: Option<SessionId>,
    ) -> Result<SessionId> {
        let session_id = match session_id {
            Some(id) => id,
            None => self
                .tracker
                .find_offered(&caller, &me)
                .await
                .ok_or_else(|| CallEngineError::NoSession { from: me.clone(), to: caller.clone() })?,
        };

        self.tracker.accept(&session_id, &me, answer).await?;
        Ok(session_id)
    }

    /// Relay a candidate from `from` to `to`.
    ///
    /// Without a live session between them the candidate is forwarded by
    /// user id alone, since REST clients post candidates before the offer
    /// request has finished. Such a candidate only reaches an endpoint that
    /// already exists; it never registers `to`.
    pub async fn ice_candidate(
        &self,
        from: UserId,
        to: UserId,
        candidate: Candidate,
        session_id: Option<SessionId>,
    ) -> Result<()> {
        let session_id = match session_id {
            Some(id) => Some(id),
            None => self.tracker.find_between(&from, &to).await,
        };

        match session_id {
            Some(id) => {
                self.tracker.candidate_to(&id, &from, &to, candidate).await?;
            }
            None => {
                if to.is_empty() {
                    return Err(CallEngineError::bad_request("toUserId is required"));
                }
                debug!("No session between {} and {}; relaying candidate directly", from, to);
                let event = SignallingEvent::IceCandidate(IceCandidate {
                    from_user_id: from,
                    candidate,
                    session_id: None,
                });
                self.router.route_registered(&to, event);
            }
        }
        Ok(())
    }

    /// `from` hangs up on `to`.
    ///
    /// A group participant only knows the host, so hanging up on a host who
    /// already left still resolves to the group the host started.
    pub async fn end_call(&self, from: UserId, to: UserId, session_id: Option<SessionId>) -> Result<SessionId> {
        let session_id = match session_id {
            Some(id) => id,
            None => match self.tracker.find_between(&from, &to).await {
                Some(id) => id,
                None => self
                    .tracker
                    .find_hosted(&from, &to)
                    .await
                    .ok_or_else(|| CallEngineError::NoSession { from: from.clone(), to: to.clone() })?,
            },
        };

        self.tracker.end(&session_id, &from, EndReason::Hangup).await?;
        Ok(session_id)
    }

    /// Start a group call hosted by `host`
    pub async fn create_group_call(
        &self,
        host: UserId,
        room_name: Option<String>,
        invitees: Vec<UserId>,
        offer: SessionDescription,
        name: String,
    ) -> Result<SessionId> {
        let started = self.tracker.start_group(host, invitees, room_name, offer, name).await?;
        Ok(started.session_id)
    }

    fn fail_call(&self, caller: &UserId, callee: &UserId) {
        info!("Call from {} to {} failed: {}", caller, callee, USER_OFFLINE);
        let event = SignallingEvent::CallFailed(CallFailed {
            to_user_id: callee.clone(),
            reason: USER_OFFLINE.to_string(),
        });
        self.router.route(caller, event);
    }

    // ---- maintenance ----

    /// Expire idle poll endpoints (as disconnects) and unanswered calls
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        for user in self.directory.expire_idle(self.config.poll_idle_timeout) {
            let ended = self.tracker.end_all_for(&user, EndReason::Disconnected).await;
            debug!("Poll endpoint for {} idle; left {} call(s)", user, ended.len());
            report.expired_endpoints.push(user);
        }

        if let Some(ring_timeout) = self.config.ring_timeout() {
            report.expired_calls = self.tracker.expire_unanswered(ring_timeout).await;
        }

        if !report.is_empty() {
            info!(
                "Sweep expired {} endpoint(s) and {} unanswered call(s)",
                report.expired_endpoints.len(),
                report.expired_calls.len()
            );
        }
        report
    }

    /// Run [`sweep`](Self::sweep) every `sweep_interval` until the task is aborted
    pub fn spawn_maintenance(&self) -> JoinHandle<()> {
        let coordinator = self.clone();
        let period = self.config.sweep_interval.max(Duration::from_millis(10));
        let span = LogContext::with_operation("coordinator", "maintenance")
            .with_field("interval", format!("{:?}", period))
            .span(Level::DEBUG);

        tokio::spawn(
            async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    coordinator.sweep().await;
                }
            }
            .instrument(span),
        )
    }

    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            online_users: self.directory.len(),
            sessions: self.tracker.stats(),
        }
    }
}

impl Default for SignallingCoordinator {
    fn default() -> Self {
        Self::new(SignallingConfig::default())
    }
}

/// Log a call-control failure the way both transports report it: stale
/// messages at debug, anything else at warn
pub fn log_outcome<T>(operation: &str, user: &UserId, result: &Result<T>) {
    if let Err(e) = result {
        if e.is_stale() {
            debug!("Ignoring stale {} from {}: {}", operation, user, e);
        } else {
            warn!("{} from {} failed: {}", operation, user, e);
        }
    }
}
