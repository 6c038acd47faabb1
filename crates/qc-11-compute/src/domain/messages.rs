//! # Contract Response Schema
//!
//! The current response schema returned by contracts: submessages with reply
//! policies, the message payloads they carry, and the `Reply` delivered back
//! to the emitting contract.
//!
//! All types serialize to snake_case externally tagged JSON, which is the
//! wire format shared with the execution engine.

use crate::domain::value_objects::{Address, Binary, CodeId, Coin, Coins};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// EVENTS
// =============================================================================

/// A key/value pair attached to an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute key.
    pub key: String,
    /// Attribute value.
    pub value: String,
}

impl Attribute {
    /// Creates an attribute.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A structured event with a type and ordered attributes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event type.
    #[serde(rename = "type")]
    pub ty: String,
    /// Ordered attributes.
    pub attributes: Vec<Attribute>,
}

impl Event {
    /// Creates an event without attributes.
    pub fn new(ty: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            attributes: Vec::new(),
        }
    }

    /// Appends an attribute.
    #[must_use]
    pub fn add_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute::new(key, value));
        self
    }

    /// Returns the value of the first attribute named `key`.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }
}

// =============================================================================
// SUBMESSAGES
// =============================================================================

/// When the emitting contract wants to be called back with the outcome.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyOn {
    /// No reply; a failure aborts the emitting call.
    #[default]
    Never,
    /// Reply on success only; a failure aborts the emitting call.
    Success,
    /// Reply on failure only.
    Error,
    /// Reply on success and failure.
    Always,
}

impl ReplyOn {
    /// Returns true if a successful outcome is replied.
    #[must_use]
    pub const fn on_success(self) -> bool {
        matches!(self, Self::Success | Self::Always)
    }

    /// Returns true if a failed outcome is replied instead of aborting.
    #[must_use]
    pub const fn on_error(self) -> bool {
        matches!(self, Self::Error | Self::Always)
    }
}

impl fmt::Display for ReplyOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Never => "never",
            Self::Success => "success",
            Self::Error => "error",
            Self::Always => "always",
        };
        f.write_str(name)
    }
}

/// A message emitted by a contract, dispatched after the contract returns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubMsg {
    /// Identifier echoed back in the reply.
    pub id: u64,
    /// Payload.
    pub msg: CosmosMsg,
    /// Host gas limit for this message; `None` is unlimited.
    pub gas_limit: Option<u64>,
    /// Reply policy.
    pub reply_on: ReplyOn,
}

impl SubMsg {
    /// Fire-and-forget submessage (id 0, no gas limit, `ReplyOn::Never`).
    pub fn new(msg: impl Into<CosmosMsg>) -> Self {
        Self {
            id: 0,
            msg: msg.into(),
            gas_limit: None,
            reply_on: ReplyOn::Never,
        }
    }

    /// Submessage replied on success.
    pub fn reply_on_success(msg: impl Into<CosmosMsg>, id: u64) -> Self {
        Self::reply(msg, id, ReplyOn::Success)
    }

    /// Submessage replied on error.
    pub fn reply_on_error(msg: impl Into<CosmosMsg>, id: u64) -> Self {
        Self::reply(msg, id, ReplyOn::Error)
    }

    /// Submessage always replied.
    pub fn reply_always(msg: impl Into<CosmosMsg>, id: u64) -> Self {
        Self::reply(msg, id, ReplyOn::Always)
    }

    fn reply(msg: impl Into<CosmosMsg>, id: u64, reply_on: ReplyOn) -> Self {
        Self {
            id,
            msg: msg.into(),
            gas_limit: None,
            reply_on,
        }
    }

    /// Sets a host gas limit.
    #[must_use]
    pub fn with_gas_limit(mut self, limit: u64) -> Self {
        self.gas_limit = Some(limit);
        self
    }
}

// =============================================================================
// MESSAGE PAYLOADS
// =============================================================================

/// Payload of a submessage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CosmosMsg {
    /// Funds transfer.
    Bank(BankMsg),
    /// Chain-specific opaque message.
    Custom(Binary),
    /// Staking operation.
    Staking(StakingMsg),
    /// Nested contract invocation.
    Wasm(WasmMsg),
    /// Governance vote.
    Gov(GovMsg),
    /// IBC packet operation; requires the emitting contract to own a port.
    Ibc(IbcMsg),
}

impl CosmosMsg {
    /// Short name of the payload category, used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Bank(_) => "bank",
            Self::Custom(_) => "custom",
            Self::Staking(_) => "staking",
            Self::Wasm(_) => "wasm",
            Self::Gov(_) => "gov",
            Self::Ibc(_) => "ibc",
        }
    }
}

/// Funds transfer from the emitting contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankMsg {
    /// Send `amount` to `to_address`.
    Send {
        /// Recipient.
        to_address: Address,
        /// Amount.
        amount: Coins,
    },
}

/// Staking operation on behalf of the emitting contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakingMsg {
    /// Delegate to a validator.
    Delegate {
        /// Validator operator address.
        validator: String,
        /// Amount.
        amount: Coin,
    },
    /// Undelegate from a validator.
    Undelegate {
        /// Validator operator address.
        validator: String,
        /// Amount.
        amount: Coin,
    },
    /// Move a delegation.
    Redelegate {
        /// Source validator.
        src_validator: String,
        /// Destination validator.
        dst_validator: String,
        /// Amount.
        amount: Coin,
    },
    /// Withdraw accumulated rewards.
    Withdraw {
        /// Validator operator address.
        validator: String,
        /// Reward recipient; defaults to the contract.
        recipient: Option<Address>,
    },
}

/// Nested contract invocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WasmMsg {
    /// Execute an existing contract.
    Execute {
        /// Target contract.
        contract_addr: Address,
        /// Expected code hash of the target (hex).
        code_hash: String,
        /// Encrypted message.
        msg: Binary,
        /// Funds sent along.
        funds: Coins,
        /// Signature authorizing the nested call.
        callback_signature: Option<Binary>,
    },
    /// Instantiate a new contract.
    Instantiate {
        /// Code to instantiate.
        code_id: CodeId,
        /// Expected code hash (hex).
        code_hash: String,
        /// Encrypted init message.
        msg: Binary,
        /// Initial deposit.
        funds: Coins,
        /// Label of the new contract.
        label: String,
        /// Signature authorizing the nested call.
        callback_signature: Option<Binary>,
    },
}

/// Governance vote option.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteOption {
    /// Yes.
    Yes,
    /// No.
    No,
    /// Abstain.
    Abstain,
    /// No with veto.
    NoWithVeto,
}

/// Governance operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GovMsg {
    /// Vote on a proposal.
    Vote {
        /// Proposal id.
        proposal_id: u64,
        /// Vote option.
        vote: VoteOption,
    },
}

/// IBC operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IbcMsg {
    /// Send a packet on a channel bound to the contract's port.
    SendPacket {
        /// Channel id.
        channel_id: String,
        /// Packet data.
        data: Binary,
        /// Timeout (unix nanoseconds).
        timeout_timestamp: u64,
    },
    /// Close a channel.
    CloseChannel {
        /// Channel id.
        channel_id: String,
    },
}

impl From<BankMsg> for CosmosMsg {
    fn from(msg: BankMsg) -> Self {
        Self::Bank(msg)
    }
}

impl From<StakingMsg> for CosmosMsg {
    fn from(msg: StakingMsg) -> Self {
        Self::Staking(msg)
    }
}

impl From<WasmMsg> for CosmosMsg {
    fn from(msg: WasmMsg) -> Self {
        Self::Wasm(msg)
    }
}

impl From<GovMsg> for CosmosMsg {
    fn from(msg: GovMsg) -> Self {
        Self::Gov(msg)
    }
}

impl From<IbcMsg> for CosmosMsg {
    fn from(msg: IbcMsg) -> Self {
        Self::Ibc(msg)
    }
}

// =============================================================================
// RESPONSES & REPLIES
// =============================================================================

/// Current-schema response of an instantiate/execute/reply call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractResponse {
    /// Submessages to dispatch, in order.
    pub messages: Vec<SubMsg>,
    /// Attributes emitted under the `wasm` event.
    pub attributes: Vec<Attribute>,
    /// Custom events emitted as `wasm-<type>`.
    pub events: Vec<Event>,
    /// Returned data.
    pub data: Option<Binary>,
}

impl ContractResponse {
    /// Empty response.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a submessage.
    #[must_use]
    pub fn add_submessage(mut self, msg: SubMsg) -> Self {
        self.messages.push(msg);
        self
    }

    /// Appends a fire-and-forget message.
    #[must_use]
    pub fn add_message(self, msg: impl Into<CosmosMsg>) -> Self {
        self.add_submessage(SubMsg::new(msg))
    }

    /// Appends an attribute.
    #[must_use]
    pub fn add_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute::new(key, value));
        self
    }

    /// Appends a custom event.
    #[must_use]
    pub fn add_event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    /// Sets the returned data.
    #[must_use]
    pub fn set_data(mut self, data: impl Into<Binary>) -> Self {
        self.data = Some(data.into());
        self
    }
}

/// Events and data of a successful submessage.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubMsgResponse {
    /// Events emitted while dispatching the submessage.
    pub events: Vec<Event>,
    /// Data returned by the submessage.
    pub data: Option<Binary>,
}

/// Outcome of a submessage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubMsgResult {
    /// The submessage succeeded.
    Ok(SubMsgResponse),
    /// The submessage failed with this message.
    Err(String),
}

impl SubMsgResult {
    /// Returns true for `Ok`.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

/// Callback delivered to a contract after one of its submessages finished.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    /// Id of the originating submessage.
    pub id: u64,
    /// Outcome.
    pub result: SubMsgResult,
}

/// Data returned to the emitter of a `WasmMsg::Instantiate` submessage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantiateReplyData {
    /// Address of the new contract.
    pub address: Address,
    /// Data returned by the new contract.
    pub data: Option<Binary>,
}

// =============================================================================
// TESTS
// =============================================================================
