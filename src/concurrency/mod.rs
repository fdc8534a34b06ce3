//! Concurrency primitives behind the turn hand-off.
//!
//! Only blocking primitives live here. The round-robin protocol built on
//! them is in [`crate::rendezvous`].

pub mod sync;

pub use sync::{TurnCondvar, TurnMutex, TurnMutexGuard};
