//! Shared helpers for tracker tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use skyrelay_session_core::{
    CallSessionTracker, DispatchOutcome, EventDispatcher, SessionDescription, SignallingEvent, UserId,
};

/// Dispatcher that records every event instead of delivering it
#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<(UserId, SignallingEvent)>>,
    offline: Mutex<HashSet<UserId>>,
}

impl RecordingDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_offline(&self, user: &str) {
        self.offline.lock().insert(UserId::from(user));
    }

    /// Remove and return everything sent to `user`
    pub fn take_for(&self, user: &str) -> Vec<SignallingEvent> {
        let user = UserId::from(user);
        let mut sent = self.sent.lock();
        let (mine, rest): (Vec<_>, Vec<_>) = sent.drain(..).partition(|(to, _)| *to == user);
        *sent = rest;
        mine.into_iter().map(|(_, event)| event).collect()
    }

    pub fn names_for(&self, user: &str) -> Vec<&'static str> {
        self.take_for(user).iter().map(|e| e.name()).collect()
    }

    pub fn total(&self) -> usize {
        self.sent.lock().len()
    }
}

impl EventDispatcher for RecordingDispatcher {
    fn dispatch(&self, to: &UserId, event: SignallingEvent) -> DispatchOutcome {
        if self.offline.lock().contains(to) {
            return DispatchOutcome::Dropped;
        }
        self.sent.lock().push((to.clone(), event));
        DispatchOutcome::Pushed
    }
}

pub fn tracker() -> (CallSessionTracker, Arc<RecordingDispatcher>) {
    let dispatcher = RecordingDispatcher::new();
    (CallSessionTracker::new(dispatcher.clone()), dispatcher)
}

pub fn user(id: &str) -> UserId {
    UserId::from(id)
}

pub fn offer() -> SessionDescription {
    SessionDescription(json!({"type": "offer", "sdp": "v=0\r\n"}))
}

pub fn answer() -> SessionDescription {
    SessionDescription(json!({"type": "answer", "sdp": "v=0\r\n"}))
}
