//! # Core Domain Entities
//!
//! Persisted records and per-call snapshots for contract invocation.

use crate::domain::value_objects::{Address, CodeHash, CodeId, Coins};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// =============================================================================
// CODE RECORD
// =============================================================================

/// Metadata of uploaded code. Written once on upload and never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRecord {
    /// Content hash reported by the execution engine.
    pub code_hash: CodeHash,
    /// Account that uploaded the code.
    pub creator: Address,
    /// Source reference (e.g. repository URL).
    pub source: String,
    /// Builder reference (e.g. optimizer image).
    pub builder: String,
}

impl CodeRecord {
    /// Creates a code record.
    #[must_use]
    pub fn new(
        code_hash: CodeHash,
        creator: Address,
        source: impl Into<String>,
        builder: impl Into<String>,
    ) -> Self {
        Self {
            code_hash,
            creator,
            source: source.into(),
            builder: builder.into(),
        }
    }
}

// =============================================================================
// CONTRACT RECORD
// =============================================================================

/// Block height plus in-block sequence at which a contract was created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AbsoluteTxPosition {
    /// Block height.
    pub block_height: u64,
    /// Position of the transaction inside the block.
    pub tx_index: u32,
}

impl AbsoluteTxPosition {
    /// Position of the transaction described by `block`.
    #[must_use]
    pub fn from_block(block: &BlockInfo) -> Self {
        Self {
            block_height: block.height,
            tx_index: block.tx_index,
        }
    }
}

impl PartialOrd for AbsoluteTxPosition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AbsoluteTxPosition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.block_height
            .cmp(&other.block_height)
            .then(self.tx_index.cmp(&other.tx_index))
    }
}

/// Metadata of an instantiated contract.
///
/// `ibc_port_id` is the only field set after creation, and at most once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRecord {
    /// Code the contract was instantiated from.
    pub code_id: CodeId,
    /// Account that instantiated the contract.
    pub creator: Address,
    /// Globally unique label.
    pub label: String,
    /// Creation position.
    pub created: AbsoluteTxPosition,
    /// Bound IBC port, when the code declares IBC entry points.
    pub ibc_port_id: Option<String>,
}

impl ContractRecord {
    /// Creates a contract record without an IBC port.
    #[must_use]
    pub fn new(
        code_id: CodeId,
        creator: Address,
        label: impl Into<String>,
        created: AbsoluteTxPosition,
    ) -> Self {
        Self {
            code_id,
            creator,
            label: label.into(),
            created,
            ibc_port_id: None,
        }
    }
}

/// Engine-managed secret correlated 1:1 with a contract record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSecret {
    /// Opaque key produced by the engine at instantiation.
    pub enclave_key: Vec<u8>,
    /// Label of the owning contract.
    pub label: String,
}

/// Capabilities reported by the engine for a code hash.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeCapabilities {
    /// Code exports IBC entry points and needs a message port.
    pub has_ibc_entry_points: bool,
    /// Host features the code requires.
    pub required_features: Vec<String>,
}

// =============================================================================
// BLOCK & ENVIRONMENT
// =============================================================================

/// Block information for the enclosing transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    /// Block height.
    pub height: u64,
    /// Block time (unix nanoseconds).
    pub time_nanos: u64,
    /// Chain identifier.
    pub chain_id: String,
    /// Position of the current transaction inside the block.
    pub tx_index: u32,
}

impl Default for BlockInfo {
    fn default() -> Self {
        Self {
            height: 1,
            time_nanos: 0,
            chain_id: "quantum-chain".to_string(),
            tx_index: 0,
        }
    }
}

/// Kind of engine entry point being invoked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    /// Contract instantiation.
    Instantiate,
    /// Regular execution.
    Execute,
    /// Reply delivering a submessage outcome.
    Reply,
    /// Read-only query.
    Query,
}

impl CallKind {
    /// Short lowercase name, used for logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Instantiate => "instantiate",
            Self::Execute => "execute",
            Self::Reply => "reply",
            Self::Query => "query",
        }
    }
}

/// Caller information for a call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageInfo {
    /// Calling account; `None` for queries.
    pub sender: Option<Address>,
    /// Funds attached to the call.
    pub sent_funds: Coins,
}

/// Per-call immutable snapshot handed to the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Block information.
    pub block: BlockInfo,
    /// Caller information.
    pub message: MessageInfo,
    /// Address of the contract being invoked.
    pub contract_address: Address,
    /// Engine secret of the contract; `None` during instantiation.
    pub contract_key: Option<Vec<u8>>,
    /// Randomness seed for the current height.
    pub random: Option<Vec<u8>>,
    /// Nesting depth of query-from-query calls.
    pub query_depth: u32,
}

// =============================================================================
// VERIFICATION CONTEXT
// =============================================================================

/// Signing mode of the signer that authorized a transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignMode {
    /// No signing material (internal calls).
    #[default]
    Unspecified,
    /// Protobuf direct signing.
    Direct,
    /// Textual signing.
    Textual,
    /// Legacy amino JSON signing (also used for multisig signers).
    LegacyAminoJson,
    /// EIP-191 personal message signing.
    Eip191,
}

/// Signing material of one transaction signer, as extracted by introspection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerMaterial {
    /// Canonical sign bytes of the transaction for this signer.
    pub sign_bytes: Vec<u8>,
    /// Sign mode of the signer.
    pub sign_mode: SignMode,
    /// Encoded mode info, opaque to this crate.
    pub mode_info_bytes: Vec<u8>,
    /// Encoded public key, opaque to this crate.
    pub pub_key_bytes: Vec<u8>,
    /// Raw signature bytes.
    pub signature: Vec<u8>,
}

/// Cryptographic context the engine needs to authenticate a call payload.
///
/// Either the transaction signer fields or `callback_signature` are
/// populated, never both.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationContext {
    /// Canonical sign bytes.
    pub sign_bytes: Vec<u8>,
    /// Signer sign mode.
    pub sign_mode: SignMode,
    /// Encoded mode info.
    pub mode_info_bytes: Vec<u8>,
    /// Encoded public key.
    pub pub_key_bytes: Vec<u8>,
    /// Signature of the transaction signer.
    pub signer_signature: Vec<u8>,
    /// Signature supplied by a calling contract frame.
    pub callback_signature: Option<Vec<u8>>,
}

impl VerificationContext {
    /// Context for an externally triggered call.
    #[must_use]
    pub fn from_signer(material: SignerMaterial) -> Self {
        Self {
            sign_bytes: material.sign_bytes,
            sign_mode: material.sign_mode,
            mode_info_bytes: material.mode_info_bytes,
            pub_key_bytes: material.pub_key_bytes,
            signer_signature: material.signature,
            callback_signature: None,
        }
    }

    /// Context for a contract-to-contract call.
    #[must_use]
    pub fn from_callback(callback_signature: Vec<u8>) -> Self {
        Self {
            callback_signature: Some(callback_signature),
            ..Self::default()
        }
    }

    /// Returns true if this context came from a calling contract frame.
    #[must_use]
    pub fn is_callback(&self) -> bool {
        self.callback_signature.is_some()
    }
}

// =============================================================================
// TESTS
// =============================================================================
