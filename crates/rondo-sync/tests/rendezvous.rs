//! Threaded rendezvous scenarios

mod common;

use common::{init_tracing, wait_until};
use rondo_core::SyncError;
use rondo_sync::Rendezvous;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_two_parties_exchange_values() {
    init_tracing();

    let rendezvous = Arc::new(Rendezvous::new(2).unwrap());
    let peer = Arc::clone(&rendezvous);
    let handle = thread::spawn(move || peer.rendezvous(10, None).unwrap());

    // With the rotator and two parties, each side takes the other's value.
    assert_eq!(rendezvous.rendezvous(20, None).unwrap(), 10);
    assert_eq!(handle.join().unwrap(), 20);
    assert!(!rendezvous.broken());
}

#[test]
fn test_rotation_passes_values_along() {
    init_tracing();

    let rendezvous = Arc::new(Rendezvous::new(3).unwrap());
    let mut handles = Vec::new();
    for contribution in [1, 2, 3] {
        let rendezvous = Arc::clone(&rendezvous);
        handles.push(thread::spawn(move || {
            let received = rendezvous.rendezvous(contribution, None).unwrap();
            (contribution, received)
        }));
    }

    let outcomes: Vec<(i32, i32)> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    // Every contribution went home with exactly one party, and rotation
    // never hands a party its own value when three meet.
    let received: HashSet<i32> = outcomes.iter().map(|(_, r)| *r).collect();
    assert_eq!(received, HashSet::from([1, 2, 3]));
    for (contributed, received) in outcomes {
        assert_ne!(contributed, received);
    }
}

#[test]
fn test_custom_exchange_function() {
    init_tracing();

    let rendezvous = Arc::new(
        Rendezvous::with_function(2, |slots: &mut Vec<i32>| {
            let sum: i32 = slots.iter().sum();
            for slot in slots.iter_mut() {
                *slot = sum;
            }
        })
        .unwrap(),
    );

    let peer = Arc::clone(&rendezvous);
    let handle = thread::spawn(move || peer.rendezvous(10, None).unwrap());

    assert_eq!(rendezvous.rendezvous(20, None).unwrap(), 30);
    assert_eq!(handle.join().unwrap(), 30);
}

#[test]
fn test_exchange_panic_breaks_cycle() {
    init_tracing();

    let rendezvous = Arc::new(
        Rendezvous::with_function(2, |_: &mut Vec<i32>| panic!("exchange failed")).unwrap(),
    );

    let mut handles = Vec::new();
    for value in [1, 2] {
        let rendezvous = Arc::clone(&rendezvous);
        handles.push(thread::spawn(move || rendezvous.rendezvous(value, None)));
    }

    let mut panicked = 0;
    let mut broken = 0;
    for handle in handles {
        match handle.join() {
            Err(_) => panicked += 1,
            Ok(Err(SyncError::BrokenBarrier)) => broken += 1,
            Ok(other) => panic!("unexpected outcome: {other:?}"),
        }
    }

    assert_eq!(panicked, 1);
    assert_eq!(broken, 1);
    // The broken cycle drained; the rendezvous is usable again.
    assert!(!rendezvous.broken());
}

#[test]
fn test_wait_reset_forces_drain() {
    init_tracing();

    let rendezvous = Arc::new(Rendezvous::new(2).unwrap());
    let stuck = {
        let rendezvous = Arc::clone(&rendezvous);
        thread::spawn(move || rendezvous.rendezvous(1, None))
    };
    wait_until(|| rendezvous.waiters() == 1);

    assert_eq!(
        rendezvous.wait_reset_for(Duration::from_millis(100)),
        Err(SyncError::Timeout)
    );
    assert_eq!(stuck.join().unwrap(), Err(SyncError::BrokenBarrier));
    assert!(!rendezvous.broken());
}

#[test]
fn test_interrupt_releases_party_then_recovers() {
    init_tracing();

    let rendezvous = Arc::new(Rendezvous::new(2).unwrap());
    let stuck = {
        let rendezvous = Arc::clone(&rendezvous);
        thread::spawn(move || rendezvous.rendezvous(5, None))
    };
    wait_until(|| rendezvous.waiters() == 1);

    rendezvous.interrupt();
    assert_eq!(stuck.join().unwrap(), Err(SyncError::Interrupted));
    assert!(!rendezvous.interrupted());

    // A fresh pair exchanges normally afterwards.
    let peer = Arc::clone(&rendezvous);
    let handle = thread::spawn(move || peer.rendezvous(1, None).unwrap());
    assert_eq!(rendezvous.rendezvous(2, None).unwrap(), 1);
    assert_eq!(handle.join().unwrap(), 2);
}

#[test]
fn test_repeated_exchanges_leave_no_residue() {
    init_tracing();

    const CYCLES: i32 = 25;

    let rendezvous = Arc::new(Rendezvous::new(2).unwrap());
    let mut handles = Vec::new();
    for base in [0, 1000] {
        let rendezvous = Arc::clone(&rendezvous);
        handles.push(thread::spawn(move || {
            for round in 0..CYCLES {
                let received = rendezvous.rendezvous(base + round, None).unwrap();
                // The peer contributes the same round number offset by the
                // other base.
                assert_eq!(received % 1000, round);
                assert_ne!(received, base + round);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(!rendezvous.broken());
    assert_eq!(rendezvous.waiters(), 0);
}
