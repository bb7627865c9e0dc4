//! Durable set of record identities that have already been handled.
//!
//! The set is loaded once per process, mutated by exactly one owner and
//! written back whole after every state-changing event.

mod errors;
mod set;
mod store;

pub use errors::StateError;
pub use set::{MergeReport, ProcessedSet};
pub use store::{decode_state, encode_state, FileStateStore, InMemoryStateStore, StateStore};
