//! What each participant did, collected at join time.

use std::fmt;

use crate::error::TurnError;

/// How a participant ended.
#[derive(Debug)]
pub enum ParticipantStatus {
    /// Completed all of its rounds.
    Succeeded,
    /// Stopped early; carries the reason.
    Failed(TurnError),
    /// The participant's thread panicked.
    Panicked,
}

impl ParticipantStatus {
    /// Whether the participant completed cleanly.
    pub const fn is_success(&self) -> bool {
        matches!(self, ParticipantStatus::Succeeded)
    }
}

impl fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticipantStatus::Succeeded => f.write_str("succeeded"),
            ParticipantStatus::Failed(err) => write!(f, "{err}"),
            ParticipantStatus::Panicked => f.write_str("panicked"),
        }
    }
}

/// The outcome of one participant.
#[derive(Debug)]
pub struct ParticipantReport {
    /// Participant id.
    pub id: usize,
    /// Turns taken, i.e. lines emitted by this participant.
    pub rounds_completed: usize,
    /// Times the participant actually parked on the condition variable.
    pub waits: usize,
    /// How the participant ended.
    pub status: ParticipantStatus,
}

impl ParticipantReport {
    pub(crate) fn panicked(id: usize) -> Self {
        Self {
            id,
            rounds_completed: 0,
            waits: 0,
            status: ParticipantStatus::Panicked,
        }
    }
}

/// The joined outcome of every participant in a run, ordered by id.
#[derive(Debug, Default)]
pub struct RunReport {
    participants: Vec<ParticipantReport>,
}

impl RunReport {
    pub(crate) fn new(mut participants: Vec<ParticipantReport>) -> Self {
        participants.sort_by_key(|p| p.id);
        Self { participants }
    }

    /// True when every participant completed its rounds.
    pub fn is_success(&self) -> bool {
        self.participants.iter().all(|p| p.status.is_success())
    }

    /// Lines emitted across the whole group.
    pub fn lines_emitted(&self) -> usize {
        self.participants.iter().map(|p| p.rounds_completed).sum()
    }

    /// Per-participant reports, ordered by id.
    pub fn participants(&self) -> &[ParticipantReport] {
        &self.participants
    }

    /// The report for participant `id`.
    pub fn participant(&self, id: usize) -> Option<&ParticipantReport> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// Participants that did not complete cleanly.
    pub fn failures(&self) -> impl Iterator<Item = &ParticipantReport> {
        self.participants.iter().filter(|p| !p.status.is_success())
    }

    /// The participant whose own failure brought the group down, if any.
    ///
    /// Participants that merely observed the abort are not counted.
    pub fn root_failure(&self) -> Option<&ParticipantReport> {
        self.failures().find(|p| match &p.status {
            ParticipantStatus::Failed(err) => !err.is_abort(),
            ParticipantStatus::Panicked => true,
            ParticipantStatus::Succeeded => false,
        })
    }
}
