mod common;

use common::{cycle, ids, numbered, run_bounded, run_bounded_with, FlakySink};
use turnstile::{
    FaultPlan, ParticipantStatus, Rendezvous, RendezvousConfig, RendezvousError, SyncError, SyncOp,
    TurnError,
};

#[test]
fn two_party_alternates_starting_with_main() {
    let outcome = run_bounded(RendezvousConfig::two_party(10));
    let report = outcome.result.unwrap();

    assert!(report.is_success());
    assert_eq!(report.lines_emitted(), 20);
    assert_eq!(outcome.lines.len(), 20);
    for (turn, line) in outcome.lines.iter().enumerate() {
        let expected = if turn % 2 == 0 { "main" } else { "routine" };
        assert_eq!(line, expected, "turn {turn}");
    }
}

#[test]
fn four_participants_three_rounds() {
    let config = RendezvousConfig::new(4, 3).with_labels(numbered(4));
    let outcome = run_bounded(config);

    assert!(outcome.result.unwrap().is_success());
    assert_eq!(ids(&outcome.lines), vec![0, 1, 2, 3, 0, 1, 2, 3, 0, 1, 2, 3]);
}

#[test]
fn lone_participant_never_waits() {
    let outcome = run_bounded(RendezvousConfig::new(1, 5));
    let report = outcome.result.unwrap();

    assert_eq!(outcome.lines, vec!["main"; 5]);
    let initiator = report.participant(0).unwrap();
    assert_eq!(initiator.rounds_completed, 5);
    assert_eq!(initiator.waits, 0);
}

#[test]
fn zero_rounds_emit_nothing() {
    for participants in [1, 2, 5] {
        let outcome = run_bounded(RendezvousConfig::new(participants, 0));
        let report = outcome.result.unwrap();

        assert!(report.is_success());
        assert!(outcome.lines.is_empty());
        assert_eq!(report.participants().len(), participants);
    }
}

#[test]
fn no_participant_acts_twice_in_a_row() {
    let config = RendezvousConfig::new(3, 50).with_labels(numbered(3));
    let outcome = run_bounded(config);
    let order = ids(&outcome.lines);

    assert_eq!(order.len(), 150);
    assert!(order.windows(2).all(|pair| pair[0] != pair[1]));
}

#[test]
fn every_participant_completes_every_round() {
    let outcome = run_bounded(RendezvousConfig::new(5, 7));
    let report = outcome.result.unwrap();

    assert_eq!(report.participants().len(), 5);
    for (id, participant) in report.participants().iter().enumerate() {
        assert_eq!(participant.id, id);
        assert_eq!(participant.rounds_completed, 7);
        assert!(participant.status.is_success());
    }
    assert_eq!(report.lines_emitted(), 35);
}

#[test]
fn terminates_across_group_sizes() {
    for participants in 1..=6 {
        for rounds in [0, 1, 7] {
            let config = RendezvousConfig::new(participants, rounds).with_labels(numbered(participants));
            let outcome = run_bounded(config);

            assert!(outcome.result.unwrap().is_success());
            assert_eq!(ids(&outcome.lines), cycle(participants, participants * rounds));
        }
    }
}

#[test]
fn rerun_starts_again_with_the_initiator() {
    let config = RendezvousConfig::new(3, 1).with_labels(numbered(3));
    let mut group = Rendezvous::new(config, Vec::new()).unwrap();

    assert!(group.run().unwrap().is_success());
    assert!(group.run().unwrap().is_success());
    assert_eq!(group.into_sink(), b"p0\np1\np2\np0\np1\np2\n");
}

#[test]
fn invalid_configuration_is_rejected_up_front() {
    let err = Rendezvous::new(RendezvousConfig::new(0, 3), Vec::new()).unwrap_err();
    assert_eq!(err, turnstile::ConfigError::NoParticipants);

    let err = Rendezvous::new(RendezvousConfig::new(3, 3).with_labels(["x"]), Vec::new()).unwrap_err();
    assert!(matches!(err, turnstile::ConfigError::LabelCount { expected: 3, found: 1 }));
}

#[test]
fn spawned_participant_failure_is_contained() {
    let config = RendezvousConfig::new(3, 4)
        .with_labels(numbered(3))
        .with_fault(FaultPlan::new(1, 2));
    let outcome = run_bounded(config);
    let report = outcome.result.expect("spawned failures do not fail the run");

    assert!(!report.is_success());
    let root = report.root_failure().unwrap();
    assert_eq!(root.id, 1);
    assert_eq!(root.rounds_completed, 3);
    assert!(matches!(
        root.status,
        ParticipantStatus::Failed(TurnError::Sync(SyncError::Injected { op: SyncOp::Notify }))
    ));

    // Everyone else either finished or stopped because of participant 1.
    for other in report.participants().iter().filter(|p| p.id != 1) {
        match &other.status {
            ParticipantStatus::Succeeded => {}
            ParticipantStatus::Failed(err) => {
                assert!(matches!(err, TurnError::Sync(SyncError::Aborted { by: 1 })), "{err}");
            }
            ParticipantStatus::Panicked => panic!("participant {} panicked", other.id),
        }
    }

    // Output is still a prefix of the round-robin order.
    let order = ids(&outcome.lines);
    assert!((8..=10).contains(&order.len()), "{order:?}");
    assert_eq!(order, cycle(3, order.len()));
}

#[test]
fn wait_fault_on_spawned_participant() {
    let config = RendezvousConfig::two_party(3).with_fault(FaultPlan::new(1, 1).on(SyncOp::Wait));
    let outcome = run_bounded(config);
    let report = outcome.result.unwrap();

    let root = report.root_failure().unwrap();
    assert_eq!(root.id, 1);
    assert_eq!(root.rounds_completed, 1);
    assert!(matches!(
        root.status,
        ParticipantStatus::Failed(TurnError::Sync(SyncError::Injected { op: SyncOp::Wait }))
    ));
    // The initiator may squeeze in one more turn before the abort lands.
    assert!(outcome.lines.starts_with(&["main".to_owned(), "routine".to_owned()]));
    assert!(outcome.lines.len() <= 3, "{:?}", outcome.lines);
}

#[test]
fn initiator_failure_is_fatal() {
    let config = RendezvousConfig::new(3, 5)
        .with_labels(numbered(3))
        .with_fault(FaultPlan::new(0, 1));
    let outcome = run_bounded(config);

    match outcome.result {
        Err(RendezvousError::Initiator(TurnError::Sync(SyncError::Injected { op }))) => {
            assert_eq!(op, SyncOp::Notify);
        }
        other => panic!("expected initiator failure, got {other:?}"),
    }

    let order = ids(&outcome.lines);
    assert!((4..=6).contains(&order.len()), "{order:?}");
    assert_eq!(order, cycle(3, order.len()));
}

#[test]
fn initiator_lock_failure_emits_nothing() {
    let config = RendezvousConfig::new(2, 3).with_fault(FaultPlan::new(0, 0).on(SyncOp::Lock));
    let outcome = run_bounded(config);

    assert!(matches!(
        outcome.result,
        Err(RendezvousError::Initiator(TurnError::Sync(SyncError::Injected { op: SyncOp::Lock })))
    ));
    assert!(outcome.lines.is_empty());
}

#[test]
fn initiator_lock_fault_after_wait_is_fatal() {
    let config = RendezvousConfig::two_party(3).with_fault(FaultPlan::new(0, 1).on(SyncOp::Lock));
    let outcome = run_bounded(config);

    assert!(matches!(
        outcome.result,
        Err(RendezvousError::Initiator(TurnError::Sync(SyncError::Injected { op: SyncOp::Lock })))
    ));
    assert_eq!(outcome.lines, vec!["main", "routine"]);
}

#[test]
fn spawned_lock_fault_after_wait_is_contained() {
    let config = RendezvousConfig::new(3, 3)
        .with_labels(numbered(3))
        .with_fault(FaultPlan::new(1, 1).on(SyncOp::Lock));
    let outcome = run_bounded(config);
    let report = outcome.result.unwrap();

    let root = report.root_failure().unwrap();
    assert_eq!(root.id, 1);
    assert_eq!(root.rounds_completed, 1);
    assert!(matches!(
        root.status,
        ParticipantStatus::Failed(TurnError::Sync(SyncError::Injected { op: SyncOp::Lock }))
    ));

    // Participant 1 re-locks as soon as participant 2 hands off; the
    // initiator may or may not get its second turn in first.
    let order = ids(&outcome.lines);
    assert!((3..=4).contains(&order.len()), "{order:?}");
    assert_eq!(order, cycle(3, order.len()));
}

#[test]
fn faults_that_cannot_fire_are_rejected() {
    for plan in [FaultPlan::new(0, 0).on(SyncOp::Wait), FaultPlan::new(1, 0).on(SyncOp::Wait)] {
        let err = Rendezvous::new(RendezvousConfig::two_party(3).with_fault(plan), Vec::new()).unwrap_err();
        assert!(matches!(err, turnstile::ConfigError::FaultNeverFires { op: SyncOp::Wait, .. }));
    }

    let lone = RendezvousConfig::new(1, 3).with_fault(FaultPlan::new(0, 1).on(SyncOp::Wait));
    assert!(Rendezvous::new(lone, Vec::new()).is_err());
}

#[test]
fn every_accepted_fault_fires() {
    for participants in 1..=4 {
        for round in 0..3 {
            for id in 0..participants {
                for op in [SyncOp::Lock, SyncOp::Wait, SyncOp::Notify] {
                    let plan = FaultPlan::new(id, round).on(op);
                    let config = RendezvousConfig::new(participants, 3).with_fault(plan);
                    if config.validate().is_err() {
                        continue;
                    }

                    let outcome = run_bounded(config);
                    let failed = match outcome.result {
                        Err(RendezvousError::Initiator(_)) => id == 0,
                        Ok(report) => report.root_failure().is_some_and(|root| root.id == id),
                        Err(other) => panic!("{plan:?}: {other}"),
                    };
                    assert!(failed, "{plan:?} in a group of {participants} did not fire");
                }
            }
        }
    }
}

#[test]
fn sink_error_in_spawned_participant_is_contained() {
    let config = RendezvousConfig::two_party(3);
    let outcome = run_bounded_with(config, FlakySink::failing_at(1));
    let report = outcome.result.unwrap();

    let root = report.root_failure().unwrap();
    assert_eq!(root.id, 1);
    assert!(matches!(root.status, ParticipantStatus::Failed(TurnError::Emit(_))));
    assert!(matches!(
        report.participant(0).unwrap().status,
        ParticipantStatus::Failed(TurnError::Sync(SyncError::Aborted { by: 1 }))
    ));
    assert_eq!(outcome.lines, vec!["main"]);
}

#[test]
fn panicking_participant_poisons_the_initiator_path() {
    let config = RendezvousConfig::new(3, 3).with_labels(numbered(3));
    let outcome = run_bounded_with(config, FlakySink::panicking_at(4));

    assert!(matches!(
        outcome.result,
        Err(RendezvousError::Initiator(TurnError::Sync(SyncError::Poisoned { .. })))
    ));
    assert_eq!(ids(&outcome.lines), vec![0, 1, 2, 0]);
}
