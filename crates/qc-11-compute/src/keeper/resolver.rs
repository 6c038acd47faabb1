//! # Contract Instance Resolver
//!
//! Loads contract and code records, produces the contract's isolated storage
//! view, and owns the auto-increment sequences and read accessors.

use super::keys;
use super::Keeper;
use crate::domain::entities::{CodeRecord, ContractRecord, ContractSecret};
use crate::domain::services::{derive_contract_address, ibc_port_id};
use crate::domain::value_objects::{Address, CodeHash, CodeId};
use crate::errors::{ComputeError, StoreError};
use crate::ports::outbound::{ContractStorage, KvPairs, LedgerStore};
use tracing::{debug, info};

// =============================================================================
// PREFIX STORE
// =============================================================================

/// A contract's storage: the ledger store seen through `0x03 ++ address`.
pub struct PrefixStore<'a> {
    store: &'a dyn LedgerStore,
    prefix: Vec<u8>,
}

impl<'a> PrefixStore<'a> {
    /// Storage view of `contract`.
    #[must_use]
    pub fn new(store: &'a dyn LedgerStore, contract: &Address) -> Self {
        Self {
            store,
            prefix: keys::contract_store_prefix(contract),
        }
    }

    fn full_key(&self, key: &[u8]) -> Vec<u8> {
        let mut full = Vec::with_capacity(self.prefix.len() + key.len());
        full.extend_from_slice(&self.prefix);
        full.extend_from_slice(key);
        full
    }
}

impl ContractStorage for PrefixStore<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.store.get(&self.full_key(key))
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.store.set(&self.full_key(key), value)
    }

    fn remove(&self, key: &[u8]) -> Result<(), StoreError> {
        self.store.delete(&self.full_key(key))
    }

    fn iter(&self) -> Result<KvPairs, StoreError> {
        let strip = self.prefix.len();
        Ok(self
            .store
            .iter_prefix(&self.prefix)?
            .into_iter()
            .map(|(k, v)| (k[strip..].to_vec(), v))
            .collect())
    }
}

impl std::fmt::Debug for PrefixStore<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefixStore")
            .field("prefix", &hex::encode(&self.prefix))
            .finish()
    }
}

/// A resolved contract: its records and storage view.
#[derive(Debug)]
pub struct ContractInstance<'a> {
    /// Contract metadata.
    pub contract: ContractRecord,
    /// Code metadata.
    pub code: CodeRecord,
    /// Contract storage.
    pub store: PrefixStore<'a>,
}

// =============================================================================
// RESOLUTION & ACCESSORS
// =============================================================================

impl Keeper {
    /// Resolves a contract. Side-effect free.
    ///
    /// # Errors
    ///
    /// `NotFound` if the contract record or its code record is missing.
    pub fn contract_instance(&self, address: &Address) -> Result<ContractInstance<'_>, ComputeError> {
        let contract: ContractRecord = self
            .read(&keys::contract_key(address))?
            .ok_or_else(|| ComputeError::NotFound(format!("contract {address}")))?;
        let code: CodeRecord = self
            .read(&keys::code_key(contract.code_id))?
            .ok_or_else(|| ComputeError::NotFound(format!("code id {}", contract.code_id)))?;
        Ok(ContractInstance {
            contract,
            code,
            store: PrefixStore::new(&*self.store, address),
        })
    }

    /// Code metadata.
    pub fn get_code_info(&self, code_id: CodeId) -> Result<Option<CodeRecord>, ComputeError> {
        self.read(&keys::code_key(code_id))
    }

    /// Contract metadata.
    pub fn get_contract_info(&self, address: &Address) -> Result<Option<ContractRecord>, ComputeError> {
        self.read(&keys::contract_key(address))
    }

    /// Returns true if a contract record exists at `address`.
    pub fn contains_contract_info(&self, address: &Address) -> Result<bool, ComputeError> {
        Ok(self.store.has(&keys::contract_key(address))?)
    }

    /// Address registered under `label`.
    pub fn get_contract_address(&self, label: &str) -> Result<Option<Address>, ComputeError> {
        Ok(self
            .store
            .get(&keys::label_key(label))?
            .and_then(|bytes| Address::from_slice(&bytes)))
    }

    /// Code hash of a contract.
    ///
    /// # Errors
    ///
    /// `NotFound` if the contract or its code is missing.
    pub fn get_contract_hash(&self, address: &Address) -> Result<CodeHash, ComputeError> {
        let contract = self
            .get_contract_info(address)?
            .ok_or_else(|| ComputeError::NotFound(format!("contract {address}")))?;
        let code = self
            .get_code_info(contract.code_id)?
            .ok_or_else(|| ComputeError::NotFound(format!("code id {}", contract.code_id)))?;
        Ok(code.code_hash)
    }

    /// Engine secret of a contract.
    pub fn get_contract_secret(&self, address: &Address) -> Result<Option<ContractSecret>, ComputeError> {
        self.read(&keys::contract_secret_key(address))
    }

    /// Engine key of a contract.
    pub fn get_contract_key(&self, address: &Address) -> Result<Option<Vec<u8>>, ComputeError> {
        Ok(self.get_contract_secret(address)?.map(|s| s.enclave_key))
    }

    /// Code bytes of `code_id`, or `None` if no such code.
    ///
    /// # Errors
    ///
    /// `NotFound` if the engine lost the code of an existing record.
    pub fn get_wasm(&self, code_id: CodeId) -> Result<Option<Vec<u8>>, ComputeError> {
        let Some(code) = self.get_code_info(code_id)? else {
            return Ok(None);
        };
        self.engine
            .get_code(&code.code_hash)
            .map(Some)
            .map_err(|e| ComputeError::NotFound(e.to_string()))
    }

    /// Raw read of a contract's storage.
    pub fn query_raw(&self, address: &Address, key: &[u8]) -> Result<Option<Vec<u8>>, ComputeError> {
        Ok(PrefixStore::new(&*self.store, address).get(key)?)
    }

    /// All storage pairs of a contract.
    pub fn contract_state(&self, address: &Address) -> Result<KvPairs, ComputeError> {
        Ok(PrefixStore::new(&*self.store, address).iter()?)
    }

    /// Random seed of `height`.
    pub fn get_random_seed(&self, height: u64) -> Result<Option<Vec<u8>>, ComputeError> {
        Ok(self.store.get(&keys::random_key(height))?)
    }

    /// Stores the random seed of `height`.
    pub fn set_random_seed(&self, height: u64, seed: &[u8]) -> Result<(), ComputeError> {
        info!(height, seed = %hex::encode(seed), "Setting random seed");
        Ok(self.store.set(&keys::random_key(height), seed)?)
    }

    /// All code records, by ascending id.
    pub fn iterate_code_infos(&self) -> Result<Vec<(CodeId, CodeRecord)>, ComputeError> {
        self.store
            .iter_prefix(&[keys::CODE_PREFIX])?
            .into_iter()
            .map(|(key, value)| -> Result<_, ComputeError> {
                let id = keys::code_id_from_key(&key)
                    .ok_or_else(|| StoreError::Corrupted(hex::encode(&key)))?;
                Ok((id, bincode::deserialize(&value)?))
            })
            .collect()
    }

    /// All contract records, by ascending address.
    pub fn iterate_contract_infos(&self) -> Result<Vec<(Address, ContractRecord)>, ComputeError> {
        self.store
            .iter_prefix(&[keys::CONTRACT_PREFIX])?
            .into_iter()
            .map(|(key, value)| -> Result<_, ComputeError> {
                let address = keys::address_from_contract_key(&key)
                    .ok_or_else(|| StoreError::Corrupted(hex::encode(&key)))?;
                Ok((address, bincode::deserialize(&value)?))
            })
            .collect()
    }

    /// Persists a new contract: record, secret and label index.
    pub(crate) fn persist_contract(
        &self,
        address: &Address,
        record: &ContractRecord,
        enclave_key: Vec<u8>,
    ) -> Result<(), ComputeError> {
        self.write(&keys::contract_key(address), record)?;
        self.write(
            &keys::contract_secret_key(address),
            &ContractSecret {
                enclave_key,
                label: record.label.clone(),
            },
        )?;
        self.store
            .set(&keys::label_key(&record.label), address.as_bytes())?;
        Ok(())
    }

    /// Binds the IBC port of `address`. Binding an already bound port
    /// returns it unchanged.
    ///
    /// # Errors
    ///
    /// `Duplicate` if the port is bound to another contract.
    pub(crate) fn ensure_ibc_port(&self, address: &Address) -> Result<String, ComputeError> {
        let port = ibc_port_id(address);
        let key = keys::ibc_port_key(&port);
        match self.store.get(&key)? {
            Some(owner) if owner.as_slice() == address.as_bytes() => Ok(port),
            Some(_) => Err(ComputeError::Duplicate(format!("ibc port {port}"))),
            None => {
                self.store.set(&key, address.as_bytes())?;
                debug!(%address, port = %port, "Bound IBC port");
                Ok(port)
            }
        }
    }

    // -------------------------------------------------------------------------
    // SEQUENCES
    // -------------------------------------------------------------------------

    fn read_sequence(&self, name: &[u8]) -> Result<u64, ComputeError> {
        match self.store.get(&keys::sequence_key(name))? {
            None => Ok(1),
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| StoreError::Corrupted(String::from_utf8_lossy(name).into_owned()))?;
                Ok(u64::from_be_bytes(raw))
            }
        }
    }

    /// Returns the current value of a sequence and stores the next one.
    pub(crate) fn auto_increment_id(&self, name: &[u8]) -> Result<u64, ComputeError> {
        let id = self.read_sequence(name)?;
        self.store
            .set(&keys::sequence_key(name), &id.saturating_add(1).to_be_bytes())?;
        Ok(id)
    }

    /// Current value of a sequence, without advancing it.
    pub fn peek_auto_increment_id(&self, name: &[u8]) -> Result<u64, ComputeError> {
        self.read_sequence(name)
    }

    /// Id the next uploaded code will get.
    pub fn get_next_code_id(&self) -> Result<CodeId, ComputeError> {
        self.read_sequence(keys::LAST_CODE_ID)
    }

    /// Allocates an instance id and derives the address of a new contract.
    pub(crate) fn generate_contract_address(
        &self,
        code_id: CodeId,
        creator: &Address,
    ) -> Result<Address, ComputeError> {
        let instance_id = self.auto_increment_id(keys::LAST_INSTANCE_ID)?;
        Ok(derive_contract_address(code_id, instance_id, creator))
    }
}
