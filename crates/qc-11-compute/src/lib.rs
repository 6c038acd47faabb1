//! # QC-11 Compute - Contract Invocation & Submessage Dispatch
//!
//! **Subsystem ID:** 11
//!
//! ## Purpose
//!
//! Drives contracts hosted by a secure execution engine: uploads code,
//! instantiates and executes contracts, runs smart queries, and dispatches
//! the submessages a contract emits, delivering replies back to it. Gas is
//! bridged between the host meter and the engine's units; each submessage
//! runs in its own store transaction and event scope.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Call depth limit | `context.rs` - `CallStack::enter()` |
//! | Query depth limit | `keeper/invoke.rs` - `query_smart_at()` |
//! | Failed submessage leaves no state or events | `keeper/dispatch.rs` - `run_submessage()` |
//! | Reply payload carries a 64-byte prefix | `keeper/dispatch.rs` - `reply()` |
//! | Engine budget never exceeds the ceiling | `gas.rs` - `GasBridge::budget_for_call()` |
//! | Labels are unique | `keeper/invoke.rs` - `instantiate()` |
//!
//! ## Outbound Dependencies
//!
//! | Collaborator | Trait | Purpose |
//! |--------------|-------|---------|
//! | Ledger storage | `LedgerStore` | Records, contract state, nested transactions |
//! | Execution engine | `ExecutionEngine` | Compile and run contract code |
//! | Accounts/funds | `Bank` | Deposits, transfers, account creation |
//! | Transaction decoding | `TxIntrospector` | Signer material for verification |
//! | Other modules | `MessageRouter` | Bank, staking, gov, custom and IBC messages |
//!
//! ## Components
//!
//! | Component | Location | Purpose |
//! |-----------|----------|---------|
//! | Gas bridge | `gas.rs` | Host/engine gas conversion |
//! | Resolver | `keeper/resolver.rs` | Records, storage views, sequences |
//! | Verification | `keeper/verification.rs` | Signing context of a call |
//! | Legacy adapter | `domain/legacy.rs` | Legacy response normalization |
//! | Response handler | `keeper/response.rs` | Events and submessage hand-off |
//! | Dispatcher | `keeper/dispatch.rs` | Submessages and replies |
//! | Façade | `keeper/invoke.rs` | Create, instantiate, execute, query |
//! | Genesis | `keeper/genesis.rs` | State import/export |
//!
//! ## Usage Example
//!
//! ```ignore
//! use qc_11_compute::prelude::*;
//!
//! let stack = create_test_service(ComputeConfig::default());
//! let outcome = stack.service.execute(&tx, ExecuteRequest { .. })?;
//! println!("Gas used: {}", outcome.gas_used);
//! ```

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]

// =============================================================================
// MODULES
// =============================================================================

pub mod adapters;
pub mod config;
pub mod context;
pub mod domain;
pub mod errors;
pub mod events;
pub mod gas;
pub mod keeper;
pub mod metrics;
pub mod ports;
pub mod service;

// =============================================================================
// PRELUDE
// =============================================================================

/// Convenient re-exports for common usage.
pub mod prelude {
    // Domain entities
    pub use crate::domain::entities::{
        AbsoluteTxPosition, BlockInfo, CallKind, CodeCapabilities, CodeRecord, ContractRecord,
        Environment, MessageInfo, SignMode, SignerMaterial, VerificationContext,
    };

    // Value objects
    pub use crate::domain::value_objects::{Address, Binary, CodeHash, CodeId, Coin, Coins, U256};

    // Messages
    pub use crate::domain::legacy::{EngineResponse, LegacyCosmosMsg, LegacyResponse};
    pub use crate::domain::messages::{
        Attribute, BankMsg, ContractResponse, CosmosMsg, Event, GovMsg, IbcMsg,
        InstantiateReplyData, Reply, ReplyOn, StakingMsg, SubMsg, SubMsgResponse, SubMsgResult,
        VoteOption, WasmMsg,
    };

    // Domain services
    pub use crate::domain::services::{derive_contract_address, ibc_port_id};

    // Invariants
    pub use crate::domain::invariants::limits;

    // Ports
    pub use crate::ports::inbound::{
        ComputeApi, ExecuteRequest, InstantiateRequest, Instantiated, QueryRequest,
        StoreCodeRequest, TxContext, TxOutcome,
    };
    pub use crate::ports::outbound::{
        Bank, ContractStorage, ExecutionEngine, LedgerStore, MessageRouter, Querier,
        TxIntrospector,
    };

    // Errors
    pub use crate::errors::{ComputeError, ErrorKind, FatalError};

    // Core
    pub use crate::config::ComputeConfig;
    pub use crate::context::{CallContext, CallStack};
    pub use crate::events::EventManager;
    pub use crate::gas::{GasBridge, GasMeter};
    pub use crate::keeper::{GenesisState, Keeper};

    // Adapters
    pub use crate::adapters::{
        program, EnvelopeIntrospector, InMemoryBank, InMemoryStore, JournalingRouter, Program,
        ProgramCall, ProgramOutput, ScriptedEngine, TxEnvelope,
    };

    // Service
    pub use crate::service::{create_test_service, ComputeService, ServiceStats, TestStack};
}

// =============================================================================
// CRATE INFO
// =============================================================================

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Subsystem ID.
pub const SUBSYSTEM_ID: u8 = 11;

/// Subsystem name.
pub const SUBSYSTEM_NAME: &str = "Compute";

// =============================================================================
// TESTS
// =============================================================================
