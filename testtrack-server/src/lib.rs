//! The local HTTP stand-in for a real TestTrack deployment: serves the
//! merged split registry and a fixed sentinel visitor's overrides,
//! accepts override writes, and nothing else. See `testtrack-core` for
//! the migration engine and schema store this reads.

pub mod cors;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;
pub mod wire;
