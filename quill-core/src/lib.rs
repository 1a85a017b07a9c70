//! This crate contains the building blocks of the Quill name registry: the
//! script codec for name operations, the persistent per-name history index,
//! the in-memory pending-operation index, and the registration validator
//! that ties them to a ledger.
//!
//! The surrounding ledger (block validation, fork choice, networking) is an
//! external collaborator, reached through the [`ledger::LedgerView`] trait.

mod executive;

pub mod hashes;
pub mod ledger;
pub mod name_op;
pub mod pending;
pub mod policy;
pub mod script;
pub mod store;
pub mod types;

pub use executive::{check_transaction, Mode, PendingNameOp, Registry, Verdict};

/// A Quill-specific target for diagnostic log messages.
pub(crate) const LOG_TARGET: &str = "quill-core";
