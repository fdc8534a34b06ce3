//! The rendezvous coordinator.
//!
//! A [`Rendezvous`] owns everything its participants share: the
//! [`TurnToken`] and the output sink behind one [`TurnMutex`], and the
//! [`TurnCondvar`] paired with it. Participants borrow that state from scoped
//! threads, so it cannot be dropped while any of them is still running.
//!
//! ## Ordering
//!
//! - **Startup**: the initiator (participant 0) takes the lock *before*
//!   spawning anyone, so the first turn is always its own.
//! - **Rounds**: each participant repeats "act, pass the token to
//!   `(id + 1) mod P`, signal, wait until the token is mine again" `R` times.
//! - **Shutdown**: the initiator's last hand-off releases its successor; it
//!   then drops the lock, signals once more and joins every participant
//!   before the shared state goes away.
//!
//! ## Failures
//!
//! A spawned participant that fails aborts the group and ends with a
//! failed [`ParticipantStatus`]; the others, the initiator included, see the
//! abort in their wait loop and stop. [`Rendezvous::run`] still returns a
//! [`RunReport`]. A failure that originates on the initiator (including a
//! lock poisoned by a panicking participant, which the initiator observes
//! as its own lock failing) is returned as [`RendezvousError::Initiator`]
//! after the same abort-and-join sequence.

mod config;
mod participant;
mod report;

pub use config::{
    FaultPlan, RendezvousConfig, DEFAULT_PARTICIPANTS, DEFAULT_ROUNDS, MAX_PARTICIPANTS,
};
pub use participant::{Participant, ParticipantState};
pub use report::{ParticipantReport, ParticipantStatus, RunReport};

use std::fmt;
use std::io::Write;
use std::num::NonZeroUsize;
use std::sync::PoisonError;
use std::thread::{self, ScopedJoinHandle};

use tracing::{debug, error, info, warn};

use crate::concurrency::sync::{TurnCondvar, TurnMutex, TurnMutexGuard};
use crate::error::{ConfigError, RendezvousError, SyncError, SyncOp};
use crate::token::TurnToken;
use participant::AbortOnUnwind;

/// Id of the participant that runs on the caller's thread.
pub const INITIATOR: usize = 0;

/// State guarded by the group lock.
pub(crate) struct TurnState<W> {
    pub(crate) token: TurnToken,
    pub(crate) sink: W,
    /// Set once, by the first participant to fail.
    pub(crate) aborted_by: Option<usize>,
}

pub(crate) type StateGuard<'a, W> = TurnMutexGuard<'a, TurnState<W>>;

/// A group of participants taking turns in strict round-robin order.
///
/// # Example
///
/// ```
/// use turnstile::rendezvous::{Rendezvous, RendezvousConfig};
///
/// let config = RendezvousConfig::new(3, 2).with_labels(["a", "b", "c"]);
/// let mut group = Rendezvous::new(config, Vec::new()).unwrap();
/// let report = group.run().unwrap();
///
/// assert!(report.is_success());
/// assert_eq!(group.into_sink(), b"a\nb\nc\na\nb\nc\n");
/// ```
pub struct Rendezvous<W> {
    config: RendezvousConfig,
    labels: Vec<String>,
    state: TurnMutex<TurnState<W>>,
    pub(crate) turn_changed: TurnCondvar,
}

impl<W: Write + Send> Rendezvous<W> {
    /// Creates the shared state for a group writing its lines to `sink`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `config` does not validate; nothing is
    /// allocated or locked in that case.
    pub fn new(config: RendezvousConfig, sink: W) -> Result<Self, ConfigError> {
        config.validate()?;
        let participants =
            NonZeroUsize::new(config.participants).ok_or(ConfigError::NoParticipants)?;
        let labels = (0..config.participants)
            .map(|id| config.label(id).into_owned())
            .collect();

        Ok(Self {
            config,
            labels,
            state: TurnMutex::new(TurnState {
                token: TurnToken::new(participants),
                sink,
                aborted_by: None,
            }),
            turn_changed: TurnCondvar::new(),
        })
    }

    /// The group's configuration.
    pub fn config(&self) -> &RendezvousConfig {
        &self.config
    }

    /// Number of participants, the initiator included.
    pub fn participants(&self) -> usize {
        self.config.participants
    }

    /// The line participant `id` emits.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a member of the group.
    pub fn label(&self, id: usize) -> &str {
        &self.labels[id]
    }

    /// Mutable access to the sink between runs.
    pub fn sink_mut(&mut self) -> &mut W {
        &mut self.state.get_mut().unwrap_or_else(PoisonError::into_inner).sink
    }

    /// Tears the group down and returns its sink.
    pub fn into_sink(self) -> W {
        self.state.into_inner().unwrap_or_else(PoisonError::into_inner).sink
    }

    /// Runs every participant through all of its rounds.
    ///
    /// The calling thread acts as the initiator; the other `P - 1`
    /// participants run on scoped threads that are all joined before this
    /// returns. The group can be run again afterwards; each run starts with
    /// the initiator holding the turn.
    ///
    /// # Errors
    ///
    /// [`RendezvousError::Initiator`] if the initiator's own synchronization
    /// or output failed, [`RendezvousError::Spawn`] if a participant thread
    /// could not be started. Failures of spawned participants are reported
    /// in the returned [`RunReport`] instead.
    pub fn run(&mut self) -> Result<RunReport, RendezvousError> {
        self.reset();
        let group: &Self = self;
        let participants = group.participants();
        info!(participants, rounds = group.config.rounds, "rendezvous starting");

        let mut initiator = Participant::member(group, INITIATOR);
        // Taken before any other participant exists, so the first turn
        // cannot be overtaken.
        let guard = initiator.lock_group().map_err(|err| {
            error!(error = %err, "initiator could not take the group lock");
            RendezvousError::Initiator(err.into())
        })?;

        let (outcome, mut reports) = thread::scope(|scope| {
            let _unwind = AbortOnUnwind::new(group, INITIATOR);
            let mut guard = guard;
            let mut handles = Vec::with_capacity(participants - 1);

            for id in 1..participants {
                let participant = Participant::member(group, id);
                let spawned = thread::Builder::new()
                    .name(format!("turnstile-{id}"))
                    .spawn_scoped(scope, move || participant.run());
                match spawned {
                    Ok(handle) => handles.push((id, handle)),
                    Err(source) => {
                        error!(participant = id, error = %source, "failed to spawn participant");
                        guard.aborted_by = Some(INITIATOR);
                        group.turn_changed.notify_all();
                        drop(guard);
                        return (Err(RendezvousError::Spawn { id, source }), join_all(handles));
                    }
                }
            }
            debug!(spawned = handles.len(), "participants spawned");

            let result = initiator.play(guard);
            let report = initiator.finish(result);
            // Final signal: anyone still parked gets to observe the end state.
            group.turn_changed.notify_all();
            (Ok(report), join_all(handles))
        });

        let initiator_report = outcome?;
        let initiator_report = match initiator_report.status {
            ParticipantStatus::Failed(err) if !err.is_abort() => {
                error!(error = %err, "initiator failed; group aborted");
                return Err(RendezvousError::Initiator(err));
            }
            status => ParticipantReport {
                status,
                ..initiator_report
            },
        };
        reports.push(initiator_report);

        let report = RunReport::new(reports);
        if report.is_success() {
            info!(lines = report.lines_emitted(), "rendezvous finished");
        } else {
            warn!(
                lines = report.lines_emitted(),
                failed = report.failures().count(),
                "rendezvous finished with failed participants"
            );
        }
        Ok(report)
    }

    pub(crate) fn lock_state(&self) -> Result<StateGuard<'_, W>, SyncError> {
        self.state
            .lock()
            .map_err(|_| SyncError::Poisoned { op: SyncOp::Lock })
    }

    /// Wakes whoever the token was just passed to.
    pub(crate) fn signal_handoff(&self) {
        // With at most two members the only parked thread is the new holder.
        // Beyond that a single wake may land on the wrong participant.
        if self.config.participants <= 2 {
            self.turn_changed.notify_one();
        } else {
            self.turn_changed.notify_all();
        }
    }

    /// Marks the group aborted by `by` and wakes every waiter.
    ///
    /// Works on a poisoned lock too; only the first abort is recorded.
    pub(crate) fn abort(&self, by: usize) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.aborted_by.is_none() {
            state.aborted_by = Some(by);
        }
        self.turn_changed.notify_all();
    }

    fn reset(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        state.token.reset();
        state.aborted_by = None;
        self.state.clear_poison();
    }
}

impl<W> fmt::Debug for Rendezvous<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rendezvous")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn join_all(handles: Vec<(usize, ScopedJoinHandle<'_, ParticipantReport>)>) -> Vec<ParticipantReport> {
    handles
        .into_iter()
        .map(|(id, handle)| {
            handle.join().unwrap_or_else(|_| {
                error!(participant = id, "participant panicked");
                ParticipantReport::panicked(id)
            })
        })
        .collect()
}
