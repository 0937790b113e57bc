//! Race tests for the connection wait gate

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use emmy_protocol::gate::{AttemptOutcome, ConnectionWaitGate};
use emmy_protocol::ConnectionState;

const TRIALS: usize = 10_000;

fn coin(state: &RandomState, trial: usize) -> bool
{
    let mut hasher = state.build_hasher();
    hasher.write_usize(trial);
    hasher.finish() & 1 == 1
}

#[test]
fn test_connect_completion_never_lost()
{
    let seed = RandomState::new();
    // One gate for every trial, as a transporter reconnecting over and over.
    let gate = Arc::new(ConnectionWaitGate::new());

    for trial in 0..TRIALS {
        let attempt = gate.begin_attempt().unwrap();

        let io_gate = Arc::clone(&gate);
        let completion = move || assert!(io_gate.complete(attempt, Ok(())));

        let outcome = if coin(&seed, trial) {
            let io = thread::spawn(completion);
            let outcome = gate.wait_outcome(attempt, Duration::from_secs(10));
            io.join().unwrap();
            outcome
        } else {
            completion();
            gate.wait_outcome(attempt, Duration::from_secs(10))
        };

        assert_eq!(outcome, AttemptOutcome::Connected, "trial {trial}");
        assert!(gate.mark_disconnected(attempt));
    }
    assert_eq!(gate.state(), ConnectionState::Disconnected);
}

#[test]
fn test_failure_completion_wakes_every_waiter()
{
    let gate = Arc::new(ConnectionWaitGate::new());
    let attempt = gate.begin_attempt().unwrap();

    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.wait_outcome(attempt, Duration::from_secs(10)))
        })
        .collect();

    thread::sleep(Duration::from_millis(20));
    assert!(gate.complete(attempt, Err("connection refused".to_string())));

    for waiter in waiters {
        assert_eq!(
            waiter.join().unwrap(),
            AttemptOutcome::Failed("connection refused".to_string())
        );
    }
}
