//! Property tests: random call-control sequences never move a session
//! backwards and never revive an ended one.

mod common;

use common::*;
use proptest::prelude::*;
use skyrelay_session_core::{CallState, Candidate, EndReason, SessionError, UserId};

/// The caller when `true`, the callee otherwise
fn party(caller: bool) -> UserId {
    if caller { user("a") } else { user("b") }
}

#[derive(Debug, Clone)]
enum Op {
    Accept(bool),
    Candidate(bool),
    Activate,
    End(bool),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<bool>().prop_map(Op::Accept),
        any::<bool>().prop_map(Op::Candidate),
        Just(Op::Activate),
        any::<bool>().prop_map(Op::End),
    ]
}

proptest! {
    #[test]
    fn state_only_moves_forward(ops in prop::collection::vec(op(), 1..20)) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let (tracker, _sent) = tracker();
            let id = tracker.start(user("a"), user("b"), offer(), String::new()).await.unwrap().session_id;
            let mut last = CallState::Offered;

            for op in ops {
                let result = match op {
                    Op::Accept(by_callee) => tracker.accept(&id, &party(!by_callee), answer()).await,
                    Op::Candidate(from_caller) => tracker
                        .candidate(&id, &party(from_caller), Candidate::default())
                        .await
                        .map(|_| ()),
                    Op::Activate => tracker.mark_active(&id).await,
                    Op::End(by_caller) => tracker
                        .end(&id, &party(by_caller), EndReason::Hangup)
                        .await
                        .map(|_| ()),
                };

                let now = tracker.get(&id).await.map(|s| s.state).unwrap_or(CallState::Ended);
                assert!(now >= last, "went from {} back to {}", last, now);
                if last == CallState::Ended {
                    assert!(matches!(result, Err(SessionError::SessionNotFound(_))));
                }
                last = now;
            }
        });
    }
}
