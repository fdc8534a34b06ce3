//! One member of the round-robin and its per-round loop.

use std::fmt;
use std::io::Write;
use std::thread;

use tracing::{debug, trace, warn};

use super::config::FaultPlan;
use super::report::{ParticipantReport, ParticipantStatus};
use super::{Rendezvous, StateGuard};
use crate::error::{ConfigError, SyncError, SyncOp, TurnError};

/// Where a participant is in its lifecycle.
///
/// `Created → Running → AwaitingTurn → Running → … → Finished`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantState {
    /// Constructed, has not touched the shared lock yet.
    Created,
    /// Holds the lock (and, while acting, the turn).
    Running,
    /// Parked on the condition variable with the lock released.
    AwaitingTurn,
    /// Done, successfully or not; the lock is released.
    Finished,
}

/// A member of a [`Rendezvous`] group.
///
/// Owns nothing mutable beyond its own round counter; the token it competes
/// for lives behind the group's lock.
pub struct Participant<'g, W> {
    group: &'g Rendezvous<W>,
    id: usize,
    rounds: usize,
    completed: usize,
    waits: usize,
    state: ParticipantState,
    fault: Option<FaultPlan>,
}

impl<'g, W: Write + Send> Participant<'g, W> {
    /// Creates participant `id` of `group`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ParticipantOutOfRange`] if `id` is not a member.
    pub fn new(group: &'g Rendezvous<W>, id: usize) -> Result<Self, ConfigError> {
        let participants = group.participants();
        if id >= participants {
            return Err(ConfigError::ParticipantOutOfRange { id, participants });
        }
        Ok(Self::member(group, id))
    }

    pub(crate) fn member(group: &'g Rendezvous<W>, id: usize) -> Self {
        let config = group.config();
        Self {
            group,
            id,
            rounds: config.rounds,
            completed: 0,
            waits: 0,
            state: ParticipantState::Created,
            fault: config.fault.filter(|fault| fault.participant == id),
        }
    }

    /// This participant's id.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ParticipantState {
        self.state
    }

    /// Turns taken so far.
    pub fn rounds_completed(&self) -> usize {
        self.completed
    }

    /// Times this participant has parked on the condition variable.
    pub fn waits(&self) -> usize {
        self.waits
    }

    /// Body of a spawned participant thread.
    pub(crate) fn run(mut self) -> ParticipantReport {
        let _unwind = AbortOnUnwind::new(self.group, self.id);
        debug!(participant = self.id, "participant started");
        let result = self.lock_group().map_err(TurnError::from).and_then(|guard| self.play(guard));
        self.finish(result)
    }

    /// Acquires the shared lock for the first time.
    pub(crate) fn lock_group(&mut self) -> Result<StateGuard<'g, W>, SyncError> {
        self.inject(SyncOp::Lock, 0)?;
        self.group.lock_state()
    }

    /// Plays every round, entered with the shared lock held.
    ///
    /// The lock is released when this returns, on success or failure.
    pub(crate) fn play(&mut self, guard: StateGuard<'g, W>) -> Result<(), TurnError> {
        self.state = ParticipantState::Running;
        if self.rounds == 0 {
            return Ok(());
        }

        let mut guard = self.await_turn(guard)?;
        while self.completed < self.rounds {
            guard = self.take_turn(guard)?;
        }
        Ok(())
    }

    /// Takes this participant's turn, then waits for the next one.
    ///
    /// Must be entered with the lock held and the token naming this
    /// participant. Emits the line, advances the token to the successor and
    /// signals. Unless that was the final round, blocks until the token comes
    /// back or the group is aborted; the returned guard then holds the turn.
    pub(crate) fn take_turn(
        &mut self,
        mut guard: StateGuard<'g, W>,
    ) -> Result<StateGuard<'g, W>, TurnError> {
        debug_assert!(guard.token.is_held_by(self.id));
        let round = self.completed;
        let label = self.group.label(self.id);

        let state = &mut *guard;
        writeln!(state.sink, "{label}")
            .and_then(|()| state.sink.flush())
            .map_err(TurnError::Emit)?;
        let next = state.token.advance();
        self.completed += 1;

        self.inject(SyncOp::Notify, round)?;
        self.group.signal_handoff();
        trace!(participant = self.id, round, next, "turn handed off");

        if self.completed == self.rounds {
            return Ok(guard);
        }
        Ok(self.await_turn(guard)?)
    }

    /// Blocks until the token names this participant or the group aborts.
    ///
    /// The wait may return for a hand-off meant for someone else, or for no
    /// reason at all, so the token is re-checked after every wake.
    fn await_turn(&mut self, mut guard: StateGuard<'g, W>) -> Result<StateGuard<'g, W>, SyncError> {
        loop {
            if let Some(by) = guard.aborted_by {
                return Err(SyncError::Aborted { by });
            }
            if guard.token.is_held_by(self.id) {
                self.state = ParticipantState::Running;
                return Ok(guard);
            }

            self.state = ParticipantState::AwaitingTurn;
            self.inject(SyncOp::Wait, self.completed)?;
            guard = self
                .group
                .turn_changed
                .wait(guard)
                .map_err(|_| SyncError::Poisoned { op: SyncOp::Wait })?;
            self.waits += 1;
            self.inject(SyncOp::Lock, self.completed)?;
        }
    }

    /// Marks the participant finished and reports how it ended.
    ///
    /// A participant that failed on its own account aborts the group so that
    /// nobody keeps waiting for a turn it will never pass on.
    pub(crate) fn finish(&mut self, result: Result<(), TurnError>) -> ParticipantReport {
        self.state = ParticipantState::Finished;
        let status = match result {
            Ok(()) => {
                debug!(
                    participant = self.id,
                    rounds = self.completed,
                    waits = self.waits,
                    "participant finished"
                );
                ParticipantStatus::Succeeded
            }
            Err(err) if err.is_abort() => {
                debug!(participant = self.id, error = %err, "participant stopped by group abort");
                ParticipantStatus::Failed(err)
            }
            Err(err) => {
                warn!(participant = self.id, round = self.completed, error = %err, "participant failed");
                self.group.abort(self.id);
                ParticipantStatus::Failed(err)
            }
        };

        ParticipantReport {
            id: self.id,
            rounds_completed: self.completed,
            waits: self.waits,
            status,
        }
    }

    fn inject(&mut self, op: SyncOp, round: usize) -> Result<(), SyncError> {
        match self.fault {
            Some(plan) if plan.op == op && plan.round == round => {
                self.fault = None;
                Err(SyncError::Injected { op })
            }
            _ => Ok(()),
        }
    }
}

impl<W> fmt::Debug for Participant<'_, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("completed", &self.completed)
            .field("rounds", &self.rounds)
            .finish_non_exhaustive()
    }
}

/// Aborts the group if the owning thread unwinds, so a panicking
/// participant cannot leave the others parked forever.
pub(crate) struct AbortOnUnwind<'g, W: Write + Send> {
    group: &'g Rendezvous<W>,
    id: usize,
}

impl<'g, W: Write + Send> AbortOnUnwind<'g, W> {
    pub(crate) fn new(group: &'g Rendezvous<W>, id: usize) -> Self {
        Self { group, id }
    }
}

impl<W: Write + Send> Drop for AbortOnUnwind<'_, W> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.group.abort(self.id);
        }
    }
}
