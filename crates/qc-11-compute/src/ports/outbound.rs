//! # Driven Ports (SPI - Outbound)
//!
//! Collaborators the invocation engine depends on:
//! - Ledger storage (ordered byte store with nested transactions)
//! - The secure execution engine
//! - Account/funds module
//! - Transaction introspection
//! - Routing of non-contract messages to their modules
//!
//! All ports are synchronous: a call chain runs single-threaded from start
//! to finish. Adapters use interior mutability.

use crate::domain::entities::{
    CallKind, CodeCapabilities, Environment, SignerMaterial, VerificationContext,
};
use crate::domain::legacy::EngineResponse;
use crate::domain::messages::{CosmosMsg, SubMsgResponse};
use crate::domain::value_objects::{Address, CodeHash, Coins, U256};
use crate::errors::{BankError, ComputeError, EngineError, RouterError, StoreError, TxDecodeError};
use crate::gas::MultipliedGasMeter;

// =============================================================================
// LEDGER STORAGE
// =============================================================================

/// Key/value pairs returned by prefix iteration, in ascending key order.
pub type KvPairs = Vec<(Vec<u8>, Vec<u8>)>;

/// Ordered byte store shared by all contracts.
///
/// `begin` opens a nested transaction; `commit` folds it into its parent
/// and `rollback` discards it. Transactions nest arbitrarily deep.
pub trait LedgerStore: Send + Sync {
    /// Reads a value.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Writes a value.
    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Deletes a value. Deleting a missing key is not an error.
    fn delete(&self, key: &[u8]) -> Result<(), StoreError>;

    /// All pairs whose key starts with `prefix`, ascending.
    fn iter_prefix(&self, prefix: &[u8]) -> Result<KvPairs, StoreError>;

    /// Returns true if `key` is set.
    fn has(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }

    /// Opens a nested transaction.
    fn begin(&self);

    /// Keeps the writes of the innermost transaction.
    fn commit(&self) -> Result<(), StoreError>;

    /// Discards the writes of the innermost transaction.
    fn rollback(&self) -> Result<(), StoreError>;
}

/// A contract's private key space.
pub trait ContractStorage {
    /// Reads a value.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Writes a value.
    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Deletes a value.
    fn remove(&self, key: &[u8]) -> Result<(), StoreError>;

    /// All pairs of the contract, keys relative to the contract space.
    fn iter(&self) -> Result<KvPairs, StoreError>;
}

// =============================================================================
// EXECUTION ENGINE
// =============================================================================

/// Queries a contract may issue while running.
pub trait Querier {
    /// Smart query of another contract, one level deeper.
    fn query_smart(&self, contract: &Address, msg: &[u8]) -> Result<Vec<u8>, ComputeError>;

    /// Raw read of another contract's storage.
    fn query_raw(&self, contract: &Address, key: &[u8]) -> Result<Option<Vec<u8>>, ComputeError>;
}

/// Everything the engine needs for one call.
pub struct EngineCall<'a> {
    /// Code to run.
    pub code_hash: &'a CodeHash,
    /// Call environment.
    pub env: &'a Environment,
    /// Encrypted message.
    pub msg: &'a [u8],
    /// Contract storage.
    pub store: &'a dyn ContractStorage,
    /// Nested query access.
    pub querier: &'a dyn Querier,
    /// Host meter, read in engine units.
    pub gas_meter: MultipliedGasMeter<'a>,
    /// Engine gas budget.
    pub gas_limit: u64,
    /// Signing context used to decrypt and authenticate `msg`.
    pub verification: &'a VerificationContext,
}

/// Result of an engine call with the engine gas it used.
///
/// Gas is reported on failure too and is always charged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutcome<T> {
    /// Call result.
    pub result: Result<T, EngineError>,
    /// Engine gas used.
    pub gas_used: u64,
}

impl<T> EngineOutcome<T> {
    /// Successful outcome.
    pub fn ok(value: T, gas_used: u64) -> Self {
        Self {
            result: Ok(value),
            gas_used,
        }
    }

    /// Failed outcome.
    pub fn err(error: impl Into<String>, gas_used: u64) -> Self {
        Self {
            result: Err(EngineError::new(error)),
            gas_used,
        }
    }
}

/// Response of an instantiation plus the secret key of the new contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstantiateOutput {
    /// Contract response.
    pub response: EngineResponse,
    /// Engine secret of the new contract.
    pub contract_key: Vec<u8>,
}

/// The secure execution engine.
pub trait ExecutionEngine: Send + Sync {
    /// Compiles and stores code, returning its hash.
    fn create(&self, code: &[u8]) -> Result<CodeHash, EngineError>;

    /// Capabilities of stored code.
    fn analyze(&self, code_hash: &CodeHash) -> Result<CodeCapabilities, EngineError>;

    /// Original bytes of stored code.
    fn get_code(&self, code_hash: &CodeHash) -> Result<Vec<u8>, EngineError>;

    /// Runs the instantiate entry point.
    fn instantiate(&self, call: EngineCall<'_>) -> EngineOutcome<InstantiateOutput>;

    /// Runs the execute or reply entry point.
    fn execute(&self, call: EngineCall<'_>, kind: CallKind) -> EngineOutcome<EngineResponse>;

    /// Runs the query entry point.
    fn query(&self, call: EngineCall<'_>) -> EngineOutcome<Vec<u8>>;
}

// =============================================================================
// ACCOUNTS & FUNDS
// =============================================================================

/// Account/funds module.
pub trait Bank: Send + Sync {
    /// Moves `amount` from `from` to `to`.
    fn send_funds(&self, from: &Address, to: &Address, amount: &Coins) -> Result<(), BankError>;

    /// Returns true if `address` may not send funds.
    fn is_blocked(&self, address: &Address) -> bool;

    /// Returns true if an account exists at `address`.
    fn account_exists(&self, address: &Address) -> Result<bool, BankError>;

    /// Creates an empty account.
    fn create_account(&self, address: &Address) -> Result<(), BankError>;

    /// Balance of one denomination.
    fn balance(&self, address: &Address, denom: &str) -> Result<U256, BankError>;
}

// =============================================================================
// TRANSACTION INTROSPECTION
// =============================================================================

/// One signer of a decoded transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxSigner {
    /// Signer account.
    pub address: Address,
    /// Signing material for the signer.
    pub material: SignerMaterial,
}

/// Signers of a decoded transaction, in signature order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedTx {
    /// Signers.
    pub signers: Vec<TxSigner>,
}

/// Extracts signing material from raw transaction bytes.
pub trait TxIntrospector: Send + Sync {
    /// Decodes the signers of `tx_bytes`.
    fn decode(&self, tx_bytes: &[u8]) -> Result<DecodedTx, TxDecodeError>;
}

// =============================================================================
// MESSAGE ROUTING
// =============================================================================

/// Delivers non-contract messages (bank, staking, gov, custom, ibc) to their
/// modules.
pub trait MessageRouter: Send + Sync {
    /// Routes `msg` emitted by `sender`, whose IBC port is `ibc_port`.
    fn route(
        &self,
        sender: &Address,
        ibc_port: Option<&str>,
        msg: &CosmosMsg,
    ) -> Result<SubMsgResponse, RouterError>;
}
