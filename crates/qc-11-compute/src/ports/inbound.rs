//! # Driving Ports (API - Inbound)
//!
//! Entry points for callers outside the engine: transaction processing and
//! read-only queries.

use crate::domain::entities::{BlockInfo, CodeRecord, ContractRecord};
use crate::domain::messages::Event;
use crate::domain::value_objects::{Address, Binary, CodeId, Coins};
use crate::errors::ComputeError;

/// Transaction-level inputs shared by every call of one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxContext {
    /// Block the transaction is executed in.
    pub block: BlockInfo,
    /// Raw transaction bytes, for signature introspection.
    pub tx_bytes: Vec<u8>,
    /// Host gas limit of the transaction.
    pub gas_limit: u64,
}

/// Result of a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome<T> {
    /// Call result.
    pub value: T,
    /// Host gas consumed.
    pub gas_used: u64,
    /// Events emitted, in order.
    pub events: Vec<Event>,
}

/// Code upload request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCodeRequest {
    /// Uploader.
    pub creator: Address,
    /// Code, optionally gzip-compressed.
    pub code: Vec<u8>,
    /// Source reference.
    pub source: String,
    /// Builder reference.
    pub builder: String,
}

/// Instantiation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstantiateRequest {
    /// Code to instantiate.
    pub code_id: CodeId,
    /// Instantiating account; must sign the transaction.
    pub creator: Address,
    /// Encrypted init message.
    pub init_msg: Vec<u8>,
    /// Globally unique label.
    pub label: String,
    /// Initial deposit.
    pub deposit: Coins,
}

/// Result of an instantiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instantiated {
    /// Address of the new contract.
    pub address: Address,
    /// Data returned by the contract (or overridden by a reply).
    pub data: Option<Binary>,
}

/// Execution request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteRequest {
    /// Target contract.
    pub contract: Address,
    /// Calling account; must sign the transaction.
    pub sender: Address,
    /// Encrypted message.
    pub msg: Vec<u8>,
    /// Funds sent along.
    pub funds: Coins,
}

/// Smart query request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    /// Target contract.
    pub contract: Address,
    /// Encrypted query.
    pub msg: Vec<u8>,
}

/// Primary API of the compute subsystem.
pub trait ComputeApi {
    /// Uploads code and returns its id.
    fn store_code(
        &self,
        tx: &TxContext,
        req: StoreCodeRequest,
    ) -> Result<TxOutcome<CodeId>, ComputeError>;

    /// Instantiates a contract.
    fn instantiate(
        &self,
        tx: &TxContext,
        req: InstantiateRequest,
    ) -> Result<TxOutcome<Instantiated>, ComputeError>;

    /// Executes a contract.
    fn execute(
        &self,
        tx: &TxContext,
        req: ExecuteRequest,
    ) -> Result<TxOutcome<Option<Binary>>, ComputeError>;

    /// Runs a smart query under the default capped gas meter.
    fn query(&self, block: &BlockInfo, req: QueryRequest) -> Result<Vec<u8>, ComputeError>;

    /// Code metadata.
    fn code_info(&self, code_id: CodeId) -> Result<Option<CodeRecord>, ComputeError>;

    /// Contract metadata.
    fn contract_info(&self, address: &Address) -> Result<Option<ContractRecord>, ComputeError>;

    /// Address registered under `label`.
    fn contract_address(&self, label: &str) -> Result<Option<Address>, ComputeError>;
}
