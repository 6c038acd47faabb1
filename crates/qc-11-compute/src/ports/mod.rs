//! # Ports Layer (Middle Hexagon)
//!
//! Trait definitions between the invocation engine and the outside world.
//!
//! - **Driving Ports (Inbound)**: `ComputeApi`
//! - **Driven Ports (Outbound)**: `LedgerStore`, `ExecutionEngine`, `Bank`,
//!   `TxIntrospector`, `MessageRouter`, `ContractStorage`, `Querier`
//! - No concrete implementations in this module

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
