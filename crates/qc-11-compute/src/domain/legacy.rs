//! # Legacy Response Schema & Version Adapter
//!
//! Contracts built against the legacy interface return messages as a struct
//! of optional variants instead of a tagged union. The adapter normalizes
//! every legacy message into a current-schema [`SubMsg`] with id 0, no gas
//! limit and [`ReplyOn::Never`], so the dispatcher only ever handles one
//! schema.

use crate::domain::messages::{
    Attribute, BankMsg, ContractResponse, CosmosMsg, GovMsg, ReplyOn, StakingMsg, SubMsg,
    VoteOption, WasmMsg,
};
use crate::domain::value_objects::{Address, Binary, CodeId, Coin, Coins};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// LEGACY SCHEMA
// =============================================================================

/// Legacy message: exactly one field must be populated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyCosmosMsg {
    /// Funds transfer.
    pub bank: Option<LegacyBankMsg>,
    /// Opaque chain-specific message.
    pub custom: Option<Binary>,
    /// Staking operation.
    pub staking: Option<LegacyStakingMsg>,
    /// Nested contract invocation.
    pub wasm: Option<LegacyWasmMsg>,
    /// Governance vote.
    pub gov: Option<LegacyGovMsg>,
}

impl LegacyCosmosMsg {
    fn populated(&self) -> usize {
        usize::from(self.bank.is_some())
            + usize::from(self.custom.is_some())
            + usize::from(self.staking.is_some())
            + usize::from(self.wasm.is_some())
            + usize::from(self.gov.is_some())
    }
}

/// Legacy bank message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyBankMsg {
    /// Transfer.
    pub send: LegacySendMsg,
}

/// Legacy transfer; the sender is declared explicitly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacySendMsg {
    /// Declared sender, must be the emitting contract.
    pub from_address: String,
    /// Recipient.
    pub to_address: Address,
    /// Amount.
    pub amount: Coins,
}

/// Legacy staking message: exactly one field must be populated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyStakingMsg {
    /// Delegate.
    pub delegate: Option<LegacyDelegation>,
    /// Undelegate.
    pub undelegate: Option<LegacyDelegation>,
    /// Redelegate.
    pub redelegate: Option<LegacyRedelegation>,
    /// Withdraw rewards.
    pub withdraw: Option<LegacyWithdraw>,
}

/// Legacy delegate/undelegate payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyDelegation {
    /// Validator operator address.
    pub validator: String,
    /// Amount.
    pub amount: Coin,
}

/// Legacy redelegate payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyRedelegation {
    /// Source validator.
    pub src_validator: String,
    /// Destination validator.
    pub dst_validator: String,
    /// Amount.
    pub amount: Coin,
}

/// Legacy withdraw payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyWithdraw {
    /// Validator operator address.
    pub validator: String,
    /// Reward recipient.
    pub recipient: Option<Address>,
}

/// Legacy contract invocation: exactly one field must be populated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyWasmMsg {
    /// Execute an existing contract.
    pub execute: Option<LegacyExecuteMsg>,
    /// Instantiate a new contract.
    pub instantiate: Option<LegacyInstantiateMsg>,
}

/// Legacy execute payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyExecuteMsg {
    /// Target contract.
    pub contract_addr: Address,
    /// Expected code hash (hex).
    pub callback_code_hash: String,
    /// Encrypted message.
    pub msg: Binary,
    /// Funds sent along.
    pub send: Coins,
    /// Signature authorizing the nested call.
    pub callback_sig: Option<Binary>,
}

/// Legacy instantiate payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyInstantiateMsg {
    /// Code to instantiate.
    pub code_id: CodeId,
    /// Expected code hash (hex).
    pub callback_code_hash: String,
    /// Encrypted init message.
    pub msg: Binary,
    /// Initial deposit.
    pub send: Coins,
    /// Label of the new contract.
    pub label: String,
    /// Signature authorizing the nested call.
    pub callback_sig: Option<Binary>,
}

/// Legacy governance message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyGovMsg {
    /// Vote.
    pub vote: LegacyVote,
}

/// Legacy vote; the option is a free-form string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyVote {
    /// Proposal id.
    pub proposal: u64,
    /// One of `Yes`, `No`, `Abstain`, `NoWithVeto`.
    pub vote_option: String,
}

/// Legacy response of an instantiate/execute call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyResponse {
    /// Messages to dispatch, in order.
    pub messages: Vec<LegacyCosmosMsg>,
    /// Log attributes.
    pub log: Vec<Attribute>,
    /// Returned data.
    pub data: Option<Binary>,
}

/// A response as returned by the execution engine, in either schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineResponse {
    /// Legacy schema.
    Legacy(LegacyResponse),
    /// Current schema.
    Current(ContractResponse),
}

// =============================================================================
// VERSION ADAPTER
// =============================================================================

/// Reasons a legacy message cannot be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LegacyConversionError {
    /// Zero or several variants populated.
    #[error("exactly one message type is supported, found {found}")]
    Ambiguous {
        /// Number of populated variants.
        found: usize,
    },

    /// A transfer declares a sender other than the emitting contract.
    #[error("contract {contract} doesn't have permission to send funds from {declared}")]
    ForeignSender {
        /// Emitting contract.
        contract: String,
        /// Declared sender.
        declared: String,
    },

    /// The vote option string is not recognized.
    #[error("unknown vote option: {0}")]
    UnknownVoteOption(String),
}

fn vote_option(text: &str) -> Result<VoteOption, LegacyConversionError> {
    match text {
        "Yes" => Ok(VoteOption::Yes),
        "No" => Ok(VoteOption::No),
        "Abstain" => Ok(VoteOption::Abstain),
        "NoWithVeto" => Ok(VoteOption::NoWithVeto),
        other => Err(LegacyConversionError::UnknownVoteOption(other.to_string())),
    }
}

fn staking(msg: LegacyStakingMsg) -> Result<StakingMsg, LegacyConversionError> {
    match msg {
        LegacyStakingMsg {
            delegate: Some(d),
            undelegate: None,
            redelegate: None,
            withdraw: None,
        } => Ok(StakingMsg::Delegate {
            validator: d.validator,
            amount: d.amount,
        }),
        LegacyStakingMsg {
            delegate: None,
            undelegate: Some(u),
            redelegate: None,
            withdraw: None,
        } => Ok(StakingMsg::Undelegate {
            validator: u.validator,
            amount: u.amount,
        }),
        LegacyStakingMsg {
            delegate: None,
            undelegate: None,
            redelegate: Some(r),
            withdraw: None,
        } => Ok(StakingMsg::Redelegate {
            src_validator: r.src_validator,
            dst_validator: r.dst_validator,
            amount: r.amount,
        }),
        LegacyStakingMsg {
            delegate: None,
            undelegate: None,
            redelegate: None,
            withdraw: Some(w),
        } => Ok(StakingMsg::Withdraw {
            validator: w.validator,
            recipient: w.recipient,
        }),
        other => Err(LegacyConversionError::Ambiguous {
            found: usize::from(other.delegate.is_some())
                + usize::from(other.undelegate.is_some())
                + usize::from(other.redelegate.is_some())
                + usize::from(other.withdraw.is_some()),
        }),
    }
}

fn wasm(msg: LegacyWasmMsg) -> Result<WasmMsg, LegacyConversionError> {
    match (msg.execute, msg.instantiate) {
        (Some(e), None) => Ok(WasmMsg::Execute {
            contract_addr: e.contract_addr,
            code_hash: e.callback_code_hash,
            msg: e.msg,
            funds: e.send,
            callback_signature: e.callback_sig,
        }),
        (None, Some(i)) => Ok(WasmMsg::Instantiate {
            code_id: i.code_id,
            code_hash: i.callback_code_hash,
            msg: i.msg,
            funds: i.send,
            label: i.label,
            callback_signature: i.callback_sig,
        }),
        (e, i) => Err(LegacyConversionError::Ambiguous {
            found: usize::from(e.is_some()) + usize::from(i.is_some()),
        }),
    }
}

/// Converts one legacy message emitted by `contract`.
///
/// # Errors
///
/// Fails if the message is ambiguous, or if a transfer declares a sender
/// other than `contract`.
pub fn legacy_to_submsg(
    contract: &Address,
    msg: LegacyCosmosMsg,
) -> Result<SubMsg, LegacyConversionError> {
    let found = msg.populated();
    if found != 1 {
        return Err(LegacyConversionError::Ambiguous { found });
    }

    let converted = if let Some(bank) = msg.bank {
        let contract_text = contract.to_string();
        if bank.send.from_address != contract_text {
            return Err(LegacyConversionError::ForeignSender {
                contract: contract_text,
                declared: bank.send.from_address,
            });
        }
        CosmosMsg::Bank(BankMsg::Send {
            to_address: bank.send.to_address,
            amount: bank.send.amount,
        })
    } else if let Some(custom) = msg.custom {
        CosmosMsg::Custom(custom)
    } else if let Some(s) = msg.staking {
        CosmosMsg::Staking(staking(s)?)
    } else if let Some(w) = msg.wasm {
        CosmosMsg::Wasm(wasm(w)?)
    } else if let Some(gov) = msg.gov {
        CosmosMsg::Gov(GovMsg::Vote {
            proposal_id: gov.vote.proposal,
            vote: vote_option(&gov.vote.vote_option)?,
        })
    } else {
        return Err(LegacyConversionError::Ambiguous { found: 0 });
    };

    Ok(SubMsg {
        id: 0,
        msg: converted,
        gas_limit: None,
        reply_on: ReplyOn::Never,
    })
}

/// Converts all legacy messages, stopping at the first failure.
///
/// # Errors
///
/// Returns the first conversion error.
pub fn legacy_to_submsgs(
    contract: &Address,
    msgs: Vec<LegacyCosmosMsg>,
) -> Result<Vec<SubMsg>, LegacyConversionError> {
    msgs.into_iter()
        .map(|msg| legacy_to_submsg(contract, msg))
        .collect()
}

impl LegacyResponse {
    /// Normalizes the whole response into the current schema.
    ///
    /// Log attributes become response attributes; there are no custom events.
    ///
    /// # Errors
    ///
    /// Returns the first message conversion error.
    pub fn into_current(
        self,
        contract: &Address,
    ) -> Result<ContractResponse, LegacyConversionError> {
        Ok(ContractResponse {
            messages: legacy_to_submsgs(contract, self.messages)?,
            attributes: self.log,
            events: Vec::new(),
            data: self.data,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn contract() -> Address {
        Address::new([7u8; 20])
    }

    fn send_from(from: String) -> LegacyCosmosMsg {
        LegacyCosmosMsg {
            bank: Some(LegacyBankMsg {
                send: LegacySendMsg {
                    from_address: from,
                    to_address: Address::new([1u8; 20]),
                    amount: Coins::from(vec![Coin::new(10, "uqc")]),
                },
            }),
            ..LegacyCosmosMsg::default()
        }
    }

    #[test]
    fn test_transfer_becomes_never_reply_submsg() {
        let sub = legacy_to_submsg(&contract(), send_from(contract().to_string())).unwrap();
        assert_eq!(sub.id, 0);
        assert_eq!(sub.gas_limit, None);
        assert_eq!(sub.reply_on, ReplyOn::Never);
        assert!(matches!(sub.msg, CosmosMsg::Bank(BankMsg::Send { .. })));
    }

    #[test]
    fn test_foreign_sender_rejected() {
        let err = legacy_to_submsg(&contract(), send_from(Address::ZERO.to_string())).unwrap_err();
        assert!(matches!(err, LegacyConversionError::ForeignSender { .. }));
    }

    #[test]
    fn test_two_variants_rejected() {
        let mut msg = send_from(contract().to_string());
        msg.custom = Some(Binary::from(vec![1]));
        assert_eq!(
            legacy_to_submsg(&contract(), msg),
            Err(LegacyConversionError::Ambiguous { found: 2 })
        );
    }

    #[test]
    fn test_empty_message_rejected() {
        assert_eq!(
            legacy_to_submsg(&contract(), LegacyCosmosMsg::default()),
            Err(LegacyConversionError::Ambiguous { found: 0 })
        );
    }

    #[test]
    fn test_ambiguous_staking_rejected() {
        let delegation = LegacyDelegation {
            validator: "val".into(),
            amount: Coin::new(1, "uqc"),
        };
        let msg = LegacyCosmosMsg {
            staking: Some(LegacyStakingMsg {
                delegate: Some(delegation.clone()),
                undelegate: Some(delegation),
                ..LegacyStakingMsg::default()
            }),
            ..LegacyCosmosMsg::default()
        };
        assert!(legacy_to_submsg(&contract(), msg).is_err());
    }

    #[test]
    fn test_vote_options() {
        let vote = |option: &str| LegacyCosmosMsg {
            gov: Some(LegacyGovMsg {
                vote: LegacyVote {
                    proposal: 4,
                    vote_option: option.into(),
                },
            }),
            ..LegacyCosmosMsg::default()
        };
        let sub = legacy_to_submsg(&contract(), vote("NoWithVeto")).unwrap();
        assert_eq!(
            sub.msg,
            CosmosMsg::Gov(GovMsg::Vote {
                proposal_id: 4,
                vote: VoteOption::NoWithVeto
            })
        );
        assert!(legacy_to_submsg(&contract(), vote("Maybe")).is_err());
    }

    #[test]
    fn test_response_conversion_keeps_log_and_data() {
        let response = LegacyResponse {
            messages: vec![send_from(contract().to_string())],
            log: vec![Attribute::new("action", "pay")],
            data: Some(Binary::from(vec![9])),
        };
        let current = response.into_current(&contract()).unwrap();
        assert_eq!(current.messages.len(), 1);
        assert_eq!(current.attributes[0].key, "action");
        assert!(current.events.is_empty());
        assert_eq!(current.data, Some(Binary::from(vec![9])));
    }
}
