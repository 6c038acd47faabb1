//! # Adapters Layer (Outer Hexagon)
//!
//! In-memory implementations of the driven ports. They back the test suite
//! and let the engine be embedded without a chain:
//!
//! - [`InMemoryStore`]: ledger store with nested snapshot transactions
//! - [`InMemoryBank`]: balances and accounts kept in the ledger store
//! - [`EnvelopeIntrospector`]: signer material from a bincode envelope
//! - [`JournalingRouter`]: bank transfers plus a journal of other messages
//! - [`ScriptedEngine`]: contracts as registered Rust closures

pub mod bank;
pub mod memory_store;
pub mod router;
pub mod scripted_engine;
pub mod tx_introspection;

pub use bank::InMemoryBank;
pub use memory_store::InMemoryStore;
pub use router::{JournalingRouter, RoutedMessage};
pub use scripted_engine::{program, Program, ProgramCall, ProgramOutput, ScriptedEngine};
pub use tx_introspection::{EnvelopeIntrospector, EnvelopeSigner, TxEnvelope};
