//! # Error Types
//!
//! All error types for contract invocation.
//!
//! Every failure surfaces as a [`ComputeError`] carrying one of the
//! categories in [`ErrorKind`]. Context added while unwinding is recorded
//! with [`ComputeError::wrap`], which keeps the inner category intact.
//! Gas exhaustion is the distinguished [`ComputeError::Fatal`] variant: it is
//! never wrapped and never turned into a reply.

use thiserror::Error;

// =============================================================================
// FATAL ERRORS
// =============================================================================

/// Errors that abort the whole enclosing transaction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FatalError {
    /// The host gas meter reached its limit.
    #[error("out of gas in location: {descriptor}; gasLimit: {limit}, gasUsed: {consumed}")]
    OutOfGas {
        /// What was being charged.
        descriptor: String,
        /// Meter limit.
        limit: u64,
        /// Consumption after the failed charge.
        consumed: u64,
    },
}

// =============================================================================
// COMPUTE ERRORS
// =============================================================================

/// Error category, independent of any wrapping context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Code upload failed.
    CreateFailed,
    /// Instantiation failed.
    InstantiateFailed,
    /// Execution failed.
    ExecuteFailed,
    /// Query failed.
    QueryFailed,
    /// Reply failed.
    ReplyFailed,
    /// Signing material unavailable.
    SigFailed,
    /// Record not found.
    NotFound,
    /// Record already exists.
    Duplicate,
    /// Account already exists.
    AccountExists,
    /// Malformed input.
    Invalid,
    /// Address may not be used.
    InvalidAddress,
    /// Funds movement failed.
    Funds,
    /// Module rejected a routed message.
    Router,
    /// Call stack limit reached.
    CallDepthExceeded,
    /// Query recursion limit reached.
    QueryDepthExceeded,
    /// Storage failure.
    Store,
    /// Encoding or decoding failure.
    Codec,
    /// Transaction aborted.
    Fatal,
}

/// Errors produced by the invocation engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComputeError {
    /// Code upload failed.
    #[error("create wasm contract failed: {0}")]
    CreateFailed(String),

    /// Instantiation failed.
    #[error("instantiate wasm contract failed: {0}")]
    InstantiateFailed(String),

    /// Execution failed.
    #[error("execute wasm contract failed: {0}")]
    ExecuteFailed(String),

    /// Query failed.
    #[error("query wasm contract failed: {0}")]
    QueryFailed(String),

    /// Reply failed.
    #[error("reply to wasm contract failed: {0}")]
    ReplyFailed(String),

    /// Signing material unavailable.
    #[error("parse signature failed: {0}")]
    SigFailed(String),

    /// Record not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Record already exists.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// Account already exists.
    #[error("account exists: {0}")]
    AccountExists(String),

    /// Malformed input.
    #[error("invalid: {0}")]
    Invalid(String),

    /// Address may not be used.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Funds movement failed.
    #[error("funds: {0}")]
    Funds(#[from] BankError),

    /// Module rejected a routed message.
    #[error("dispatch: {0}")]
    Router(#[from] RouterError),

    /// Call stack limit reached.
    #[error("call depth exceeded: {depth} > {max}")]
    CallDepthExceeded {
        /// Attempted depth.
        depth: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Query recursion limit reached.
    #[error("query depth exceeded: {depth} > {max}")]
    QueryDepthExceeded {
        /// Attempted depth.
        depth: u32,
        /// Configured maximum.
        max: u32,
    },

    /// Storage failure.
    #[error("store: {0}")]
    Store(#[from] StoreError),

    /// Encoding or decoding failure.
    #[error("codec: {0}")]
    Codec(String),

    /// An inner error with context added while unwinding.
    #[error("{context}: {source}")]
    Wrapped {
        /// Context.
        context: String,
        /// Inner error.
        #[source]
        source: Box<ComputeError>,
    },

    /// Transaction aborted.
    #[error(transparent)]
    Fatal(#[from] FatalError),
}

impl ComputeError {
    /// Adds context. Fatal errors are returned unchanged.
    #[must_use]
    pub fn wrap(self, context: impl Into<String>) -> Self {
        if self.is_fatal() {
            return self;
        }
        Self::Wrapped {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns true if this error aborts the enclosing transaction.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Fatal(_) => true,
            Self::Wrapped { source, .. } => source.is_fatal(),
            _ => false,
        }
    }

    /// Innermost error, below all wrapping context.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Wrapped { source, .. } => source.root(),
            other => other,
        }
    }

    /// Category of the innermost error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            Self::CreateFailed(_) => ErrorKind::CreateFailed,
            Self::InstantiateFailed(_) => ErrorKind::InstantiateFailed,
            Self::ExecuteFailed(_) => ErrorKind::ExecuteFailed,
            Self::QueryFailed(_) => ErrorKind::QueryFailed,
            Self::ReplyFailed(_) => ErrorKind::ReplyFailed,
            Self::SigFailed(_) => ErrorKind::SigFailed,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Duplicate(_) => ErrorKind::Duplicate,
            Self::AccountExists(_) => ErrorKind::AccountExists,
            Self::Invalid(_) => ErrorKind::Invalid,
            Self::InvalidAddress(_) => ErrorKind::InvalidAddress,
            Self::Funds(_) => ErrorKind::Funds,
            Self::Router(_) => ErrorKind::Router,
            Self::CallDepthExceeded { .. } => ErrorKind::CallDepthExceeded,
            Self::QueryDepthExceeded { .. } => ErrorKind::QueryDepthExceeded,
            Self::Store(_) => ErrorKind::Store,
            Self::Codec(_) => ErrorKind::Codec,
            Self::Fatal(_) | Self::Wrapped { .. } => ErrorKind::Fatal,
        }
    }
}

impl From<bincode::Error> for ComputeError {
    fn from(err: bincode::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<serde_json::Error> for ComputeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

// =============================================================================
// COLLABORATOR ERRORS
// =============================================================================

/// Errors from the ledger store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Commit or rollback without an open transaction.
    #[error("no open store transaction")]
    NoTransaction,

    /// Stored bytes could not be decoded.
    #[error("corrupted value under key {0}")]
    Corrupted(String),

    /// Backend failure.
    #[error("store backend: {0}")]
    Backend(String),
}

/// Errors from the account/funds module.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BankError {
    /// Sender balance too low.
    #[error("insufficient funds: {address} has {available}{denom}, needs {required}{denom}")]
    InsufficientFunds {
        /// Sender.
        address: String,
        /// Denomination.
        denom: String,
        /// Required amount.
        required: String,
        /// Available amount.
        available: String,
    },

    /// Account already exists.
    #[error("account already exists: {0}")]
    AccountExists(String),

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Record decoding failure.
    #[error("codec: {0}")]
    Codec(String),
}

/// Error message returned by the execution engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    /// Creates an engine error.
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Errors from routing a non-contract message to its module.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// No module handles this message.
    #[error("unsupported message: {0}")]
    Unsupported(String),

    /// IBC message emitted by a contract without a port.
    #[error("contract {0} has no ibc port")]
    NoIbcPort(String),

    /// The module rejected the message.
    #[error("message rejected: {0}")]
    Rejected(String),

    /// Funds movement failed.
    #[error(transparent)]
    Bank(#[from] BankError),
}

/// Raw transaction bytes could not be decoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("failed to decode transaction: {0}")]
pub struct TxDecodeError(pub String);

/// Errors loading configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read {path}: {error}")]
    Io {
        /// Path of the file that failed to load.
        path: String,
        /// Error message from the I/O operation.
        error: String,
    },

    /// TOML parsing error.
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// A value is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Field name.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

// =============================================================================
// TESTS
// =============================================================================
