//! Property-based tests for client concurrency control
//!
//! Drives a controller with random interleavings of local edits, remote
//! edits and acknowledgements, checking its bookkeeping after every step.

use crate::common::fixtures::remote_event;
use proptest::prelude::*;
use xfcollab::ot::{ClientConcurrencyControl, DiscreteOperation, Operation};
use xfcollab::path;

#[derive(Debug, Clone)]
enum Step {
    Local(usize, String),
    Remote(usize, String),
    Ack,
    Drain,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => (0usize..10, "[a-c]{1,2}").prop_map(|(i, v)| Step::Local(i, v)),
        3 => (0usize..10, "[x-z]{1,2}").prop_map(|(i, v)| Step::Remote(i, v)),
        2 => Just(Step::Ack),
        1 => Just(Step::Drain),
    ]
}

fn insert(index: usize, value: &str) -> Operation {
    DiscreteOperation::string_insert(path!["text"], index, value).into()
}

proptest! {
    #[test]
    fn test_versions_and_queues_stay_consistent(steps in proptest::collection::vec(step(), 1..40)) {
        let mut ccc = ClientConcurrencyControl::new("local", 0);
        let mut sent = 0u64;
        let mut acked = 0u64;
        let mut remotes = 0u64;
        let mut drained = Vec::new();

        for step in steps {
            let before = ccc.context_version();
            match step {
                Step::Local(index, value) => {
                    let event = ccc.process_outgoing_operation(insert(index, &value)).unwrap().unwrap();
                    prop_assert_eq!(event.seq_no, sent);
                    prop_assert_eq!(event.context_version, before);
                    sent += 1;
                }
                Step::Remote(index, value) => {
                    let event = remote_event("remote", remotes, before, insert(index, &value));
                    ccc.process_remote_operation(event).unwrap();
                    remotes += 1;
                    prop_assert_eq!(ccc.context_version(), before + 1);
                }
                Step::Ack => {
                    let front = ccc.inflight().next().map(|entry| entry.seq_no);
                    match front {
                        Some(seq_no) => {
                            prop_assert_eq!(seq_no, acked);
                            ccc.process_acknowledgement_operation(seq_no, before).unwrap();
                            acked += 1;
                            prop_assert_eq!(ccc.context_version(), before + 1);
                        }
                        None => prop_assert!(ccc.process_acknowledgement_operation(acked, before).is_err()),
                    }
                }
                Step::Drain => {
                    while let Some(event) = ccc.get_next_incoming_operation() {
                        drained.push(event);
                    }
                }
            }

            prop_assert!(ccc.context_version() >= before);
            prop_assert_eq!(ccc.inflight_len() as u64, sent - acked);
            prop_assert_eq!(ccc.is_synced(), sent == acked);
        }

        while let Some(event) = ccc.get_next_incoming_operation() {
            drained.push(event);
        }
        prop_assert_eq!(ccc.context_version(), acked + remotes);

        // every remote operation comes out once, in arrival order, with the
        // version it was queued at
        let seq_nos: Vec<u64> = drained.iter().map(|event| event.seq_no).collect();
        prop_assert_eq!(seq_nos, (0..remotes).collect::<Vec<_>>());
        prop_assert!(drained.windows(2).all(|pair| pair[0].context_version < pair[1].context_version));
    }

    #[test]
    fn test_remote_operations_ahead_are_rejected(ahead in 1u64..10, start in 0u64..100) {
        let mut ccc = ClientConcurrencyControl::new("local", start);
        let event = remote_event("remote", 0, start + ahead, insert(0, "x"));
        prop_assert!(ccc.process_remote_operation(event).is_err());
        prop_assert_eq!(ccc.context_version(), start);
        prop_assert!(!ccc.has_next_incoming_operation());
    }
}
