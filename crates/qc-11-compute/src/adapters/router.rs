//! # Journaling Message Router
//!
//! Routes non-contract messages emitted by contracts. Bank transfers move
//! funds through the [`Bank`] port; other messages are accepted and written
//! to a journal in the ledger store, so a rolled-back submessage also drops
//! its journal entry.

use crate::domain::messages::{BankMsg, CosmosMsg, Event, SubMsgResponse};
use crate::domain::value_objects::Address;
use crate::errors::{RouterError, StoreError};
use crate::events::{attribute_keys, event_types};
use crate::ports::outbound::{Bank, LedgerStore, MessageRouter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Journal records: `0x22 ++ index (u64 BE)`.
pub const JOURNAL_PREFIX: u8 = 0x22;

/// A message accepted by the router.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutedMessage {
    /// Emitting contract.
    pub sender: Address,
    /// Port of the emitting contract, for IBC messages.
    pub ibc_port: Option<String>,
    /// Message.
    pub msg: CosmosMsg,
}

/// Router delivering bank transfers and journaling everything else.
pub struct JournalingRouter {
    store: Arc<dyn LedgerStore>,
    bank: Arc<dyn Bank>,
}

impl JournalingRouter {
    /// Router over `store` and `bank`.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, bank: Arc<dyn Bank>) -> Self {
        Self { store, bank }
    }

    /// Accepted non-bank messages, oldest first.
    pub fn journal(&self) -> Result<Vec<RoutedMessage>, StoreError> {
        self.store
            .iter_prefix(&[JOURNAL_PREFIX])?
            .into_iter()
            .map(|(key, value)| {
                bincode::deserialize(&value).map_err(|_| StoreError::Corrupted(hex::encode(key)))
            })
            .collect()
    }

    fn record(&self, entry: &RoutedMessage) -> Result<(), RouterError> {
        let index = self.store.iter_prefix(&[JOURNAL_PREFIX]).map_err(store_err)?.len() as u64;
        let mut key = vec![JOURNAL_PREFIX];
        key.extend_from_slice(&index.to_be_bytes());
        let bytes = bincode::serialize(entry).map_err(|e| RouterError::Rejected(e.to_string()))?;
        self.store.set(&key, &bytes).map_err(store_err)
    }
}

fn store_err(err: StoreError) -> RouterError {
    RouterError::Rejected(err.to_string())
}

impl MessageRouter for JournalingRouter {
    fn route(
        &self,
        sender: &Address,
        ibc_port: Option<&str>,
        msg: &CosmosMsg,
    ) -> Result<SubMsgResponse, RouterError> {
        match msg {
            CosmosMsg::Bank(BankMsg::Send { to_address, amount }) => {
                self.bank.send_funds(sender, to_address, amount)?;
                let event = Event::new(event_types::TRANSFER)
                    .add_attribute(attribute_keys::RECIPIENT, to_address.to_string())
                    .add_attribute(attribute_keys::SENDER, sender.to_string())
                    .add_attribute(attribute_keys::AMOUNT, amount.to_string());
                return Ok(SubMsgResponse {
                    events: vec![event],
                    data: None,
                });
            }
            CosmosMsg::Wasm(_) => {
                return Err(RouterError::Unsupported(
                    "contract messages are dispatched by the keeper".to_string(),
                ))
            }
            CosmosMsg::Ibc(_) if ibc_port.is_none() => {
                return Err(RouterError::NoIbcPort(sender.to_string()))
            }
            CosmosMsg::Custom(_) | CosmosMsg::Staking(_) | CosmosMsg::Gov(_) | CosmosMsg::Ibc(_) => {}
        }

        self.record(&RoutedMessage {
            sender: *sender,
            ibc_port: ibc_port.map(str::to_string),
            msg: msg.clone(),
        })?;
        debug!(%sender, kind = msg.kind(), "Journaled routed message");
        Ok(SubMsgResponse::default())
    }
}

impl std::fmt::Debug for JournalingRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalingRouter").finish_non_exhaustive()
    }
}
