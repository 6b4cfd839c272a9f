//! Shared domain types for the genstudio platform.
//!
//! Holds the generation-task model and its status state machine, the
//! per-kind generation configuration structs, and the core error enum.
//! Everything here is plain data -- no I/O, no async.

pub mod error;
pub mod generation;
pub mod task;
pub mod types;
