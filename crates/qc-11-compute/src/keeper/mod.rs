//! # Keeper
//!
//! Orchestrates contract invocation over the outbound ports:
//!
//! - `invoke`: Invocation Façade (create / instantiate / execute / query)
//! - `resolver`: Contract Instance Resolver, record accessors, sequences
//! - `verification`: Verification Context Builder
//! - `response`: Response Handler
//! - `dispatch`: Submessage Dispatcher & Reply Engine
//! - `genesis`: state import/export
//!
//! Control flow of a call:
//!
//! ```text
//! façade -> verification -> resolver -> engine -> version adapter
//!        -> response handler -> dispatcher (may recurse into the façade)
//! ```

pub mod dispatch;
pub mod genesis;
pub mod invoke;
pub mod keys;
pub mod resolver;
pub mod response;
pub mod verification;

pub use genesis::{GenesisCode, GenesisContract, GenesisSequence, GenesisState, Model};
pub use invoke::KeeperQuerier;
pub use resolver::{ContractInstance, PrefixStore};

use crate::config::ComputeConfig;
use crate::errors::{ComputeError, StoreError};
use crate::gas::GasBridge;
use crate::ports::outbound::{Bank, ExecutionEngine, LedgerStore, MessageRouter, TxIntrospector};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// The contract invocation engine.
pub struct Keeper {
    store: Arc<dyn LedgerStore>,
    engine: Arc<dyn ExecutionEngine>,
    bank: Arc<dyn Bank>,
    introspector: Arc<dyn TxIntrospector>,
    router: Arc<dyn MessageRouter>,
    config: ComputeConfig,
    bridge: GasBridge,
}

impl Keeper {
    /// Creates a keeper over the given collaborators.
    pub fn new(
        store: Arc<dyn LedgerStore>,
        engine: Arc<dyn ExecutionEngine>,
        bank: Arc<dyn Bank>,
        introspector: Arc<dyn TxIntrospector>,
        router: Arc<dyn MessageRouter>,
        config: ComputeConfig,
    ) -> Self {
        let bridge = GasBridge::from_config(&config);
        Self {
            store,
            engine,
            bank,
            introspector,
            router,
            config,
            bridge,
        }
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &ComputeConfig {
        &self.config
    }

    /// Gas bridge.
    #[must_use]
    pub fn gas_bridge(&self) -> GasBridge {
        self.bridge
    }

    /// Ledger store.
    #[must_use]
    pub fn store(&self) -> &dyn LedgerStore {
        &*self.store
    }

    /// Reads and decodes a record.
    fn read<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>, ComputeError> {
        self.store
            .get(key)?
            .map(|bytes| {
                bincode::deserialize(&bytes)
                    .map_err(|_| ComputeError::from(StoreError::Corrupted(hex::encode(key))))
            })
            .transpose()
    }

    /// Encodes and writes a record.
    fn write<T: Serialize>(&self, key: &[u8], value: &T) -> Result<(), ComputeError> {
        let bytes = bincode::serialize(value)?;
        self.store.set(key, &bytes)?;
        Ok(())
    }
}

impl std::fmt::Debug for Keeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keeper")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
