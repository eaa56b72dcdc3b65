//! CLI command implementations.

pub mod dump_log;
pub mod recover;
pub mod verify;
