//! # `turnstile` - Round-Robin Turn Taking
//!
//! Lets `P` cooperating threads take turns performing an action (emitting a
//! line) in strict round-robin order, `R` times each, using one shared lock
//! and one condition variable rather than busy-waiting.
//!
//! ## Architecture
//!
//! 1. **Blocking primitives** ([`concurrency::sync`]):
//!    - `TurnMutex<T>`: futex-backed, poisoning-aware mutex
//!    - `TurnCondvar`: sequence-counter condition variable paired with it
//!
//! 2. **Turn token** ([`token::TurnToken`]):
//!    - The id of the participant allowed to act next
//!    - Read and written only under the group lock
//!
//! 3. **Rendezvous coordinator** ([`rendezvous::Rendezvous`]):
//!    - Spawns participants on scoped threads, runs their rounds, joins them
//!    - Contains failures of spawned participants, surfaces initiator failures
//!
//! ## Guarantees
//!
//! - **Total order**: turns run `0, 1, …, P-1, 0, 1, …` for `R` full cycles,
//!   starting with the initiator.
//! - **Spurious-wake safety**: every wait re-checks "is it my turn?" under the
//!   lock before acting.
//! - **No leaked participants**: shared state outlives every participant, and
//!   a failing participant aborts the group instead of stranding the others.
//!
//! ## Example
//!
//! ```rust
//! use turnstile::{Rendezvous, RendezvousConfig};
//!
//! let mut group = Rendezvous::new(RendezvousConfig::two_party(2), Vec::new()).unwrap();
//! let report = group.run().unwrap();
//!
//! assert_eq!(report.lines_emitted(), 4);
//! assert_eq!(group.into_sink(), b"main\nroutine\nmain\nroutine\n");
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod concurrency;
pub mod error;
pub mod rendezvous;
pub mod token;

pub use error::{ConfigError, RendezvousError, SyncError, SyncOp, TurnError};
pub use rendezvous::{
    FaultPlan, Participant, ParticipantReport, ParticipantState, ParticipantStatus, Rendezvous,
    RendezvousConfig, RunReport,
};
pub use token::TurnToken;

// Compile-time checks that the shared state can cross thread boundaries.
const _: () = {
    const fn assert_sync<T: Sync>() {}
    const fn assert_send<T: Send>() {}

    assert_sync::<concurrency::TurnMutex<TurnToken>>();
    assert_send::<concurrency::TurnMutex<TurnToken>>();
    assert_sync::<concurrency::TurnCondvar>();
    assert_sync::<Rendezvous<std::io::Stdout>>();
};

