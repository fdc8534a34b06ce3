//! `TurnToken` - which participant may act next.
//!
//! The token is a plain holder id in `[0, P)`. On its own it proves nothing:
//! it lives behind the group's shared lock, and a participant only believes it
//! holds the turn after reading the token under that lock.
//!
//! ## Core invariant (single holder)
//!
//! `TurnToken` is intentionally **not** `Copy`/`Clone`. There is exactly one
//! per group and it only moves by [`pass_to`](TurnToken::pass_to) or
//! [`advance`](TurnToken::advance), called by the current holder right after
//! acting.

use core::num::NonZeroUsize;

/// The shared turn marker of a round-robin group.
#[derive(Debug, PartialEq, Eq)]
pub struct TurnToken {
    holder: usize,
    participants: NonZeroUsize,
}

impl TurnToken {
    /// Creates a token held by participant 0, the initiator.
    pub const fn new(participants: NonZeroUsize) -> Self {
        Self {
            holder: 0,
            participants,
        }
    }

    /// The participant currently allowed to act.
    #[inline]
    pub const fn holder(&self) -> usize {
        self.holder
    }

    /// Number of participants the token rotates over.
    #[inline]
    pub const fn participants(&self) -> usize {
        self.participants.get()
    }

    /// Whether `id` holds the turn.
    #[inline]
    pub const fn is_held_by(&self, id: usize) -> bool {
        self.holder == id
    }

    /// The participant that follows `id` in the rotation.
    #[inline]
    pub const fn successor_of(&self, id: usize) -> usize {
        (id + 1) % self.participants.get()
    }

    /// Hands the turn to `next`.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if `next` is not a member of the group.
    #[inline]
    pub fn pass_to(&mut self, next: usize) {
        debug_assert!(
            next < self.participants.get(),
            "participant {next} is outside a group of {}",
            self.participants
        );
        self.holder = next;
    }

    /// Hands the turn to the holder's successor and returns the new holder.
    #[inline]
    pub fn advance(&mut self) -> usize {
        self.holder = self.successor_of(self.holder);
        self.holder
    }

    /// Returns the turn to the initiator.
    #[inline]
    pub fn reset(&mut self) {
        self.holder = 0;
    }
}
