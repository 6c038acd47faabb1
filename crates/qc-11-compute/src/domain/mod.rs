//! # Domain Layer (Inner Hexagon)
//!
//! Pure types and functions for contract invocation.
//! NO I/O, NO external collaborators.
//!
//! - `value_objects`: addresses, hashes, binaries, coins
//! - `entities`: persisted records and per-call snapshots
//! - `messages`: the current response schema
//! - `legacy`: the legacy response schema and its version adapter

pub mod entities;
pub mod invariants;
pub mod legacy;
pub mod messages;
pub mod services;
pub mod value_objects;

pub use entities::*;
pub use invariants::*;
pub use legacy::*;
pub use messages::*;
pub use services::*;
pub use value_objects::*;
