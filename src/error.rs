//! Error types for the rendezvous and its synchronization primitives.

use std::fmt;
use std::io;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A synchronization operation a participant performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOp {
    /// Acquiring the shared lock (initially, or again after a wait).
    Lock,
    /// Parking on the condition variable.
    Wait,
    /// Signalling the condition variable after a hand-off.
    Notify,
}

impl SyncOp {
    /// Lower-case operation name, as used in diagnostics and on the command line.
    pub const fn as_str(self) -> &'static str {
        match self {
            SyncOp::Lock => "lock",
            SyncOp::Wait => "wait",
            SyncOp::Notify => "notify",
        }
    }
}

impl fmt::Display for SyncOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncOp {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lock" => Ok(SyncOp::Lock),
            "wait" => Ok(SyncOp::Wait),
            "notify" => Ok(SyncOp::Notify),
            other => Err(ConfigError::InvalidFault(format!("unknown operation `{other}`"))),
        }
    }
}

/// A failed lock or condition-variable operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// A participant panicked while holding the shared lock.
    #[error("{op} : mutex poisoned by a panicking participant")]
    Poisoned {
        /// The operation that observed the poison.
        op: SyncOp,
    },

    /// A fault configured through a [`FaultPlan`](crate::rendezvous::FaultPlan).
    #[error("{op} : injected fault")]
    Injected {
        /// The operation that was made to fail.
        op: SyncOp,
    },

    /// Another participant failed and the group was torn down.
    #[error("wait : group aborted by participant {by}")]
    Aborted {
        /// Id of the participant whose failure aborted the group.
        by: usize,
    },
}

impl SyncError {
    /// The operation that failed, if the failure was local to this participant.
    pub const fn op(&self) -> Option<SyncOp> {
        match self {
            SyncError::Poisoned { op } | SyncError::Injected { op } => Some(*op),
            SyncError::Aborted { .. } => None,
        }
    }
}

/// Why a participant stopped before completing its rounds.
#[derive(Debug, Error)]
pub enum TurnError {
    /// A synchronization operation failed.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Writing the participant's line to the output failed.
    #[error("write : {0}")]
    Emit(#[source] io::Error),
}

impl TurnError {
    /// True when this participant stopped only because another one failed first.
    pub fn is_abort(&self) -> bool {
        matches!(self, TurnError::Sync(SyncError::Aborted { .. }))
    }
}

/// An invalid group configuration, rejected before any lock is taken.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A group needs at least its initiator.
    #[error("participant count must be at least 1")]
    NoParticipants,

    /// Labels were supplied, but not one per participant.
    #[error("expected {expected} labels (one per participant), found {found}")]
    LabelCount {
        /// The participant count.
        expected: usize,
        /// Number of labels supplied.
        found: usize,
    },

    /// A participant id outside `[0, participants)`.
    #[error("participant {id} is out of range for a group of {participants}")]
    ParticipantOutOfRange {
        /// The offending id.
        id: usize,
        /// The participant count.
        participants: usize,
    },

    /// A fault scheduled for a round that never happens.
    #[error("fault round {round} is out of range for {rounds} rounds")]
    FaultRoundOutOfRange {
        /// The scheduled round.
        round: usize,
        /// Rounds per participant.
        rounds: usize,
    },

    /// More participants than the group will start threads for.
    #[error("{participants} participants exceeds the limit of {max}")]
    TooManyParticipants {
        /// The requested participant count.
        participants: usize,
        /// The largest accepted participant count.
        max: usize,
    },

    /// A fault whose operation is never performed at the scheduled point.
    #[error("{op} fault for participant {participant} in round {round} can never fire")]
    FaultNeverFires {
        /// The operation that was to fail.
        op: SyncOp,
        /// Participant the fault targets.
        participant: usize,
        /// The scheduled round.
        round: usize,
    },

    /// `participants * rounds` does not fit in `usize`.
    #[error("{participants} participants x {rounds} rounds overflows the turn count")]
    TooManyTurns {
        /// The participant count.
        participants: usize,
        /// Rounds per participant.
        rounds: usize,
    },

    /// A fault specification that could not be parsed.
    #[error("invalid fault specification: {0}")]
    InvalidFault(String),
}

/// Errors returned by [`Rendezvous`](crate::rendezvous::Rendezvous).
#[derive(Debug, Error)]
pub enum RendezvousError {
    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The initiating participant failed. The group has been aborted and every
    /// spawned participant joined before this is returned.
    #[error("initiator failed: {0}")]
    Initiator(#[source] TurnError),

    /// The operating system refused to start a participant thread.
    #[error("failed to spawn participant {id}: {source}")]
    Spawn {
        /// Id of the participant that could not be started.
        id: usize,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },
}
