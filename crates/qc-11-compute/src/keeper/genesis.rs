//! # Genesis Import & Export
//!
//! Moves the full compute state (code, contracts with their storage, and
//! the id sequences) in and out of a serializable snapshot.

use super::keys;
use super::{Keeper, PrefixStore};
use crate::domain::entities::{CodeRecord, ContractRecord};
use crate::domain::invariants::limits;
use crate::domain::services::uncompress;
use crate::domain::value_objects::{Address, Binary, CodeId};
use crate::errors::ComputeError;
use crate::ports::outbound::ContractStorage;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One storage entry of a contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    /// Key relative to the contract's storage.
    pub key: Binary,
    /// Value.
    pub value: Binary,
}

/// Stored code with its bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisCode {
    /// Code id.
    pub code_id: CodeId,
    /// Code metadata.
    pub record: CodeRecord,
    /// Code bytes, optionally gzip-compressed.
    pub code: Binary,
}

/// A contract with its secret and storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisContract {
    /// Contract address.
    pub address: Address,
    /// Contract metadata.
    pub record: ContractRecord,
    /// Engine secret of the contract.
    pub contract_key: Binary,
    /// Storage entries.
    pub state: Vec<Model>,
}

/// Value of a named id sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisSequence {
    /// Sequence name.
    pub name: String,
    /// Next id.
    pub value: u64,
}

/// Complete compute state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    /// Stored code.
    pub codes: Vec<GenesisCode>,
    /// Contracts.
    pub contracts: Vec<GenesisContract>,
    /// Id sequences.
    pub sequences: Vec<GenesisSequence>,
}

impl Keeper {
    /// Imports `state` into an empty store.
    ///
    /// # Errors
    ///
    /// Any import error, or `Invalid` if a sequence would hand out an id
    /// that is already taken.
    pub fn init_genesis(&self, state: &GenesisState) -> Result<(), ComputeError> {
        let mut max_code_id = 0;
        for code in &state.codes {
            self.import_code(code.code_id, &code.record, code.code.as_slice())
                .map_err(|e| e.wrap(format!("code {}", code.code_id)))?;
            max_code_id = max_code_id.max(code.code_id);
        }

        for contract in &state.contracts {
            self.import_contract(
                &contract.address,
                &contract.record,
                contract.contract_key.as_slice(),
                &contract.state,
            )
            .map_err(|e| e.wrap(format!("contract {}", contract.address)))?;
        }

        for seq in &state.sequences {
            self.import_auto_increment_id(seq.name.as_bytes(), seq.value)
                .map_err(|e| e.wrap(format!("sequence {}", seq.name)))?;
        }

        let next_code_id = self.peek_auto_increment_id(keys::LAST_CODE_ID)?;
        if next_code_id <= max_code_id {
            return Err(ComputeError::Invalid(format!(
                "code sequence {next_code_id} must be greater than {max_code_id}"
            )));
        }
        let next_instance_id = self.peek_auto_increment_id(keys::LAST_INSTANCE_ID)?;
        if next_instance_id <= state.contracts.len() as u64 {
            return Err(ComputeError::Invalid(format!(
                "instance sequence {next_instance_id} must be greater than {}",
                state.contracts.len()
            )));
        }

        info!(
            codes = state.codes.len(),
            contracts = state.contracts.len(),
            "Imported genesis state"
        );
        Ok(())
    }

    /// Exports the full state.
    pub fn export_genesis(&self) -> Result<GenesisState, ComputeError> {
        let codes = self
            .iterate_code_infos()?
            .into_iter()
            .map(|(code_id, record)| -> Result<_, ComputeError> {
                let code = self
                    .get_wasm(code_id)?
                    .ok_or_else(|| ComputeError::NotFound(format!("code id {code_id}")))?;
                Ok(GenesisCode {
                    code_id,
                    record,
                    code: Binary::from(code),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let contracts = self
            .iterate_contract_infos()?
            .into_iter()
            .map(|(address, record)| -> Result<_, ComputeError> {
                let contract_key = self.get_contract_key(&address)?.unwrap_or_default();
                let state = self
                    .contract_state(&address)?
                    .into_iter()
                    .map(|(key, value)| Model {
                        key: Binary::from(key),
                        value: Binary::from(value),
                    })
                    .collect();
                Ok(GenesisContract {
                    address,
                    record,
                    contract_key: Binary::from(contract_key),
                    state,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let sequences = [keys::LAST_CODE_ID, keys::LAST_INSTANCE_ID]
            .into_iter()
            .map(|name| -> Result<_, ComputeError> {
                Ok(GenesisSequence {
                    name: String::from_utf8_lossy(name).into_owned(),
                    value: self.peek_auto_increment_id(name)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GenesisState {
            codes,
            contracts,
            sequences,
        })
    }

    /// Imports code under a fixed id.
    ///
    /// # Errors
    ///
    /// `CreateFailed` if the code cannot be compiled, `Invalid` if its hash
    /// differs from the record, `Duplicate` if the id is taken.
    pub fn import_code(
        &self,
        code_id: CodeId,
        record: &CodeRecord,
        code: &[u8],
    ) -> Result<(), ComputeError> {
        let wasm = uncompress(code, limits::MAX_CODE_SIZE)
            .map_err(|e| ComputeError::CreateFailed(e.to_string()))?;
        let code_hash = self
            .engine
            .create(&wasm)
            .map_err(|e| ComputeError::CreateFailed(e.to_string()))?;
        if code_hash != record.code_hash {
            return Err(ComputeError::Invalid("code hashes not same".to_string()));
        }

        let key = keys::code_key(code_id);
        if self.store.has(&key)? {
            return Err(ComputeError::Duplicate(format!("duplicate code: {code_id}")));
        }
        self.write(&key, record)
    }

    /// Imports a contract with its storage.
    ///
    /// # Errors
    ///
    /// `NotFound` if its code is missing, `Duplicate` if the contract, its
    /// label or a storage key already exists.
    pub fn import_contract(
        &self,
        address: &Address,
        record: &ContractRecord,
        contract_key: &[u8],
        state: &[Model],
    ) -> Result<(), ComputeError> {
        if self.get_code_info(record.code_id)?.is_none() {
            return Err(ComputeError::NotFound(format!("code id: {}", record.code_id)));
        }
        if self.contains_contract_info(address)? {
            return Err(ComputeError::Duplicate(format!("contract: {address}")));
        }
        if let Some(owner) = self.get_contract_address(&record.label)? {
            return Err(ComputeError::Duplicate(format!(
                "label {} is bound to {owner}",
                record.label
            )));
        }

        self.persist_contract(address, record, contract_key.to_vec())?;
        if record.ibc_port_id.is_some() {
            self.ensure_ibc_port(address)?;
        }
        self.import_contract_state(address, state)
    }

    /// Writes storage entries of a contract.
    ///
    /// # Errors
    ///
    /// `Duplicate` if a key is already set.
    pub fn import_contract_state(
        &self,
        address: &Address,
        state: &[Model],
    ) -> Result<(), ComputeError> {
        let store = PrefixStore::new(&*self.store, address);
        for model in state {
            if store.get(model.key.as_slice())?.is_some() {
                return Err(ComputeError::Duplicate(format!(
                    "duplicate key: {}",
                    hex::encode(model.key.as_slice())
                )));
            }
            store.set(model.key.as_slice(), model.value.as_slice())?;
        }
        Ok(())
    }

    /// Sets a sequence that has never been used.
    ///
    /// # Errors
    ///
    /// `Duplicate` if the sequence is already set.
    pub fn import_auto_increment_id(&self, name: &[u8], value: u64) -> Result<(), ComputeError> {
        let key = keys::sequence_key(name);
        if self.store.has(&key)? {
            return Err(ComputeError::Duplicate(format!(
                "autoincrement id: {}",
                String::from_utf8_lossy(name)
            )));
        }
        self.store.set(&key, &value.to_be_bytes())?;
        Ok(())
    }
}
