//! Session Implementation
//!
//! Pure state for one call: who is in it, where it is in its lifecycle, and
//! who must be told when somebody accepts, sends a candidate or leaves. No
//! I/O happens here; the tracker serialises access and dispatches events.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::{Result, SessionError};
use crate::types::{CallKind, CallState, EndReason, GroupEndPolicy, ParticipantStatus, SessionDescription, SessionId};
use skyrelay_registrar_core::UserId;

/// One call (direct or group)
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: SessionId,
    pub kind: CallKind,
    /// Caller of a direct call, host of a group call
    pub caller: UserId,
    pub caller_name: String,
    /// False once the host has left a group call that outlives them
    pub caller_present: bool,
    pub participants: BTreeMap<UserId, ParticipantStatus>,
    pub state: CallState,
    #[serde(skip)]
    pub offer: SessionDescription,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub end_reason: Option<EndReason>,
}

/// Result of somebody leaving a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    /// Users that must receive `callEnded`
    pub notify: Vec<UserId>,
    /// Whether the whole session is over
    pub ended: bool,
}

impl Session {
    fn new(
        kind: CallKind,
        caller: UserId,
        caller_name: String,
        callees: impl IntoIterator<Item = UserId>,
        offer: SessionDescription,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            kind,
            caller,
            caller_name,
            caller_present: true,
            participants: callees.into_iter().map(|u| (u, ParticipantStatus::Invited)).collect(),
            state: CallState::Initiating,
            offer,
            created_at: now,
            updated_at: now,
            ended_at: None,
            end_reason: None,
        }
    }

    /// One-to-one call from `caller` to `callee`, in `initiating`
    pub fn new_direct(caller: UserId, callee: UserId, caller_name: String, offer: SessionDescription) -> Self {
        Self::new(CallKind::Direct, caller, caller_name, [callee], offer)
    }

    /// Group call hosted by `host`, in `initiating`
    pub fn new_group(
        host: UserId,
        callees: Vec<UserId>,
        room_name: Option<String>,
        host_name: String,
        offer: SessionDescription,
    ) -> Self {
        Self::new(CallKind::Group { room_name }, host, host_name, callees, offer)
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    /// Move forward to `next`
    pub fn transition(&mut self, next: CallState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(SessionError::invalid_transition(&self.id, self.state, next));
        }
        tracing::debug!("Session {} state: {} -> {}", self.id, self.state, next);
        self.state = next;
        self.updated_at = Utc::now();
        if next == CallState::Ended {
            self.ended_at = Some(self.updated_at);
        }
        Ok(())
    }

    /// Whether `user` is currently part of the call
    pub fn is_member(&self, user: &UserId) -> bool {
        if *user == self.caller {
            return self.caller_present;
        }
        self.participants.get(user).is_some_and(|s| s.is_present())
    }

    /// Current members, caller first
    pub fn members(&self) -> Vec<UserId> {
        let mut members = Vec::with_capacity(self.participants.len() + 1);
        if self.caller_present {
            members.push(self.caller.clone());
        }
        members.extend(self.present_participants());
        members
    }

    fn present_participants(&self) -> impl Iterator<Item = UserId> + '_ {
        self.participants
            .iter()
            .filter(|(_, status)| status.is_present())
            .map(|(user, _)| user.clone())
    }

    /// Every user who was ever part of the call
    pub fn everyone(&self) -> Vec<UserId> {
        let mut all = vec![self.caller.clone()];
        all.extend(self.participants.keys().cloned());
        all
    }

    /// The single callee of a direct call
    pub fn callee(&self) -> Option<&UserId> {
        match self.kind {
            CallKind::Direct => self.participants.keys().next(),
            CallKind::Group { .. } => None,
        }
    }

    /// Whether `user` was invited and has not answered yet
    pub fn is_invited(&self, user: &UserId) -> bool {
        self.participants.get(user) == Some(&ParticipantStatus::Invited)
    }

    /// Record `by`'s answer.
    ///
    /// Direct calls accept only from `offered`. Group calls also accept from
    /// `answered`/`active`, once per invited participant.
    pub fn accept(&mut self, by: &UserId) -> Result<()> {
        let status = match self.participants.get(by) {
            Some(status) => *status,
            None => return Err(SessionError::not_participant(&self.id, by)),
        };

        let state_allows = match self.state {
            CallState::Offered => true,
            CallState::Answered | CallState::Active => {
                self.kind.is_group() && status == ParticipantStatus::Invited
            }
            _ => false,
        };
        if !state_allows {
            return Err(SessionError::invalid_transition(&self.id, self.state, CallState::Answered));
        }
        if status != ParticipantStatus::Invited {
            return Err(SessionError::not_participant(&self.id, by));
        }

        if self.state == CallState::Offered {
            self.transition(CallState::Answered)?;
        }
        self.participants.insert(by.clone(), ParticipantStatus::Joined);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Who receives a candidate sent by `from`.
    ///
    /// The caller's candidates fan out to every present participant; a
    /// participant's candidates go to the caller. State is never changed.
    pub fn candidate_targets(&self, from: &UserId) -> Result<Vec<UserId>> {
        if !self.state.accepts_candidates() {
            return Err(SessionError::invalid_transition(&self.id, self.state, CallState::Offered));
        }
        if !self.is_member(from) {
            return Err(SessionError::not_participant(&self.id, from));
        }

        if *from == self.caller {
            Ok(self.present_participants().collect())
        } else if self.caller_present {
            Ok(vec![self.caller.clone()])
        } else {
            Ok(self.present_participants().filter(|u| u != from).collect())
        }
    }

    /// `by` leaves the call
    pub fn leave(&mut self, by: &UserId, policy: GroupEndPolicy, reason: EndReason) -> Result<Departure> {
        if self.state.is_terminal() {
            return Err(SessionError::session_not_found(&self.id));
        }
        if !self.is_member(by) {
            return Err(SessionError::not_participant(&self.id, by));
        }

        let departure = match self.kind {
            CallKind::Direct => Departure {
                notify: self.members().into_iter().filter(|u| u != by).collect(),
                ended: true,
            },
            CallKind::Group { .. } => self.leave_group(by, policy),
        };

        if departure.ended {
            self.end_reason = Some(reason);
            self.transition(CallState::Ended)?;
        } else {
            self.updated_at = Utc::now();
        }
        Ok(departure)
    }

    fn leave_group(&mut self, by: &UserId, policy: GroupEndPolicy) -> Departure {
        let is_host = *by == self.caller;

        if is_host && policy == GroupEndPolicy::HostEndsAll {
            return Departure {
                notify: self.present_participants().collect(),
                ended: true,
            };
        }

        let mut notify: Vec<UserId> = if is_host {
            self.caller_present = false;
            self.present_participants().collect()
        } else {
            self.participants.insert(by.clone(), ParticipantStatus::Left);
            if self.caller_present {
                vec![self.caller.clone()]
            } else {
                self.present_participants().collect()
            }
        };

        let remaining = self.members();
        let ended = remaining.len() < 2;
        if ended {
            for user in remaining {
                if !notify.contains(&user) {
                    notify.push(user);
                }
            }
        }

        Departure { notify, ended }
    }

    /// End the session for everyone, returning the members to notify
    pub fn terminate(&mut self, reason: EndReason) -> Result<Vec<UserId>> {
        if self.state.is_terminal() {
            return Err(SessionError::session_not_found(&self.id));
        }
        let members = self.members();
        self.end_reason = Some(reason);
        self.transition(CallState::Ended)?;
        Ok(members)
    }

    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }
}
