//! Group configuration: participant count, rounds, per-participant text.

use std::borrow::Cow;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SyncOp};

/// Rounds per participant when nothing else is configured.
pub const DEFAULT_ROUNDS: usize = 10;

/// Participant count when nothing else is configured: the two-party hand-off.
pub const DEFAULT_PARTICIPANTS: usize = 2;

/// Largest group accepted; every participant but the initiator is a thread.
pub const MAX_PARTICIPANTS: usize = 4096;

/// Configuration of one rendezvous group.
///
/// Deserializes from JSON with every field optional:
///
/// ```
/// use turnstile::rendezvous::RendezvousConfig;
///
/// let config: RendezvousConfig =
///     serde_json::from_str(r#"{ "participants": 3, "rounds": 4 }"#).unwrap();
/// assert_eq!(config.participants, 3);
/// assert!(config.labels.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RendezvousConfig {
    /// Number of participants `P`, the initiator included.
    pub participants: usize,
    /// Turns each participant takes, `R`.
    pub rounds: usize,
    /// Line emitted by each participant per turn. Empty means defaults.
    pub labels: Vec<String>,
    /// Optional injected synchronization failure.
    pub fault: Option<FaultPlan>,
}

impl Default for RendezvousConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PARTICIPANTS, DEFAULT_ROUNDS)
    }
}

impl RendezvousConfig {
    /// A group of `participants` taking `rounds` turns each, with default labels.
    pub fn new(participants: usize, rounds: usize) -> Self {
        Self {
            participants,
            rounds,
            labels: Vec::new(),
            fault: None,
        }
    }

    /// The two-party hand-off: `main` and `routine` alternating.
    pub fn two_party(rounds: usize) -> Self {
        Self::new(2, rounds)
    }

    /// Replaces the per-participant labels.
    #[must_use]
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Schedules an injected failure.
    #[must_use]
    pub fn with_fault(mut self, fault: FaultPlan) -> Self {
        self.fault = Some(fault);
        self
    }

    /// Checks the configuration without touching any shared state.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.participants == 0 {
            return Err(ConfigError::NoParticipants);
        }
        if self.participants > MAX_PARTICIPANTS {
            return Err(ConfigError::TooManyParticipants {
                participants: self.participants,
                max: MAX_PARTICIPANTS,
            });
        }
        if !self.labels.is_empty() && self.labels.len() != self.participants {
            return Err(ConfigError::LabelCount {
                expected: self.participants,
                found: self.labels.len(),
            });
        }
        if self.participants.checked_mul(self.rounds).is_none() {
            return Err(ConfigError::TooManyTurns {
                participants: self.participants,
                rounds: self.rounds,
            });
        }
        if let Some(fault) = &self.fault {
            if fault.participant >= self.participants {
                return Err(ConfigError::ParticipantOutOfRange {
                    id: fault.participant,
                    participants: self.participants,
                });
            }
            if fault.round >= self.rounds {
                return Err(ConfigError::FaultRoundOutOfRange {
                    round: fault.round,
                    rounds: self.rounds,
                });
            }
            if !fault.fires_in(self.participants) {
                return Err(ConfigError::FaultNeverFires {
                    op: fault.op,
                    participant: fault.participant,
                    round: fault.round,
                });
            }
        }
        Ok(())
    }

    /// Total lines a clean run emits, `P x R`.
    pub fn total_turns(&self) -> usize {
        self.participants.saturating_mul(self.rounds)
    }

    /// The line participant `id` emits.
    ///
    /// Without configured labels the initiator says `main`; in a two-party
    /// group the other side says `routine`, otherwise `routine <id>`.
    pub fn label(&self, id: usize) -> Cow<'_, str> {
        if let Some(label) = self.labels.get(id) {
            return Cow::Borrowed(label);
        }
        match (id, self.participants) {
            (0, _) => Cow::Borrowed("main"),
            (_, 2) => Cow::Borrowed("routine"),
            _ => Cow::Owned(format!("routine {id}")),
        }
    }
}

/// A synchronization failure to inject, for exercising failure paths.
///
/// `participant`'s `op` fails the first time it is performed while that
/// participant is working toward round `round` (0-based):
///
/// - `lock`: round 0 is the first acquisition; later rounds are the
///   re-acquisition after parking, after the previous turn.
/// - `wait`: parking after the previous turn, so round 0 has none.
/// - `notify`: the hand-off signal after the round's line.
///
/// A lone participant never parks, so it only accepts `lock` in round 0 and
/// `notify`. [`RendezvousConfig::validate`] rejects plans that cannot fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultPlan {
    /// Participant whose operation fails.
    pub participant: usize,
    /// Round in which it fails.
    pub round: usize,
    /// Operation that fails.
    #[serde(default = "FaultPlan::default_op")]
    pub op: SyncOp,
}

impl FaultPlan {
    /// A fault in `participant`'s hand-off signal during `round`.
    pub const fn new(participant: usize, round: usize) -> Self {
        Self {
            participant,
            round,
            op: SyncOp::Notify,
        }
    }

    /// Changes the failing operation.
    #[must_use]
    pub const fn on(mut self, op: SyncOp) -> Self {
        self.op = op;
        self
    }

    /// Whether the scheduled operation is performed in a group of
    /// `participants`, assuming the round itself exists.
    pub const fn fires_in(&self, participants: usize) -> bool {
        match self.op {
            SyncOp::Notify => true,
            SyncOp::Lock => self.round == 0 || participants > 1,
            SyncOp::Wait => self.round > 0 && participants > 1,
        }
    }

    const fn default_op() -> SyncOp {
        SyncOp::Notify
    }
}

impl FromStr for FaultPlan {
    type Err = ConfigError;

    /// Parses `ID:ROUND` or `ID:ROUND:OP`, e.g. `1:3:wait`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let number = |part: Option<&str>, what: &str| -> Result<usize, ConfigError> {
            part.ok_or_else(|| ConfigError::InvalidFault(format!("missing {what} in `{s}`")))?
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidFault(format!("bad {what} in `{s}`")))
        };

        let participant = number(parts.next(), "participant id")?;
        let round = number(parts.next(), "round")?;
        let op = match parts.next() {
            Some(op) => op.trim().parse()?,
            None => SyncOp::Notify,
        };
        if parts.next().is_some() {
            return Err(ConfigError::InvalidFault(format!("trailing fields in `{s}`")));
        }

        Ok(FaultPlan::new(participant, round).on(op))
    }
}
