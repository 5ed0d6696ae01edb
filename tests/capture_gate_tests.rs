//! Integration tests for the capture gate
//!
//! The gate is open exactly while the observer count is positive, including
//! under concurrent joins and leaves and through the hub's subscribe/close
//! paths.

mod utils;

use http_observe::capture_gate::CaptureGate;
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;
use utils::test_hub;

#[test]
fn test_concurrent_join_leave_balances() {
    let gate = Arc::new(CaptureGate::new());
    let mut handles = vec![];

    for _ in 0..8 {
        let gate = Arc::clone(&gate);
        handles.push(thread::spawn(move || {
            for _ in 0..1000 {
                gate.observer_joined();
                assert!(gate.is_active());
                gate.observer_left();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(gate.observer_count(), 0);
    assert!(!gate.is_active());
}

#[test]
fn test_leave_without_join_does_not_underflow() {
    let gate = CaptureGate::new();
    assert!(!gate.observer_left());
    assert_eq!(gate.observer_count(), 0);

    assert!(gate.observer_joined());
    assert!(gate.is_active());
}

#[tokio::test]
async fn test_gate_follows_hub_observers() {
    let hub = test_hub(10, 1024);
    assert!(!hub.capture_active());

    let first = hub.subscribe();
    let second = hub.subscribe();
    assert_eq!(hub.observer_count(), 2);

    drop(first);
    assert!(hub.capture_active());
    drop(second);
    assert!(!hub.capture_active());
}

#[tokio::test]
async fn test_gate_closes_on_shutdown() {
    let hub = test_hub(10, 1024);
    let _a = hub.subscribe();
    let _b = hub.subscribe();

    assert_eq!(hub.shutdown(), 2);
    assert!(!hub.capture_active());
    assert_eq!(hub.status().observer_count, 0);
}

proptest! {
    /// Active iff joins outnumber leaves, for any join/leave sequence
    #[test]
    fn prop_active_iff_count_positive(ops in prop::collection::vec(any::<bool>(), 0..200)) {
        let gate = CaptureGate::new();
        let mut expected: usize = 0;
        for join in ops {
            if join {
                gate.observer_joined();
                expected += 1;
            } else {
                gate.observer_left();
                expected = expected.saturating_sub(1);
            }
            prop_assert_eq!(gate.observer_count(), expected);
            prop_assert_eq!(gate.is_active(), expected > 0);
        }
    }
}
