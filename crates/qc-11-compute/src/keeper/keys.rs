//! # Store Layout
//!
//! | Prefix | Key | Value |
//! |--------|-----|-------|
//! | `0x01` | code id (BE u64) | `CodeRecord` |
//! | `0x02` | contract address | `ContractRecord` |
//! | `0x03` | contract address ++ user key | contract storage |
//! | `0x04` | sequence name | last issued id (BE u64) |
//! | `0x06` | contract address | `ContractSecret` |
//! | `0x07` | label | contract address |
//! | `0x08` | block height (BE u64) | random seed |
//! | `0x09` | IBC port id | contract address |

use crate::domain::value_objects::{Address, CodeId};

/// Code records.
pub const CODE_PREFIX: u8 = 0x01;
/// Contract records.
pub const CONTRACT_PREFIX: u8 = 0x02;
/// Contract storage.
pub const CONTRACT_STORE_PREFIX: u8 = 0x03;
/// Auto-increment sequences.
pub const SEQUENCE_PREFIX: u8 = 0x04;
/// Contract secrets.
pub const CONTRACT_SECRET_PREFIX: u8 = 0x06;
/// Label index.
pub const LABEL_PREFIX: u8 = 0x07;
/// Per-height random seeds.
pub const RANDOM_PREFIX: u8 = 0x08;
/// IBC port bindings.
pub const IBC_PORT_PREFIX: u8 = 0x09;

/// Sequence issuing code ids.
pub const LAST_CODE_ID: &[u8] = b"lastCodeId";
/// Sequence issuing contract instance ids.
pub const LAST_INSTANCE_ID: &[u8] = b"lastContractId";

fn prefixed(prefix: u8, tail: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + tail.len());
    key.push(prefix);
    key.extend_from_slice(tail);
    key
}

/// Key of a code record.
#[must_use]
pub fn code_key(code_id: CodeId) -> Vec<u8> {
    prefixed(CODE_PREFIX, &code_id.to_be_bytes())
}

/// Key of a contract record.
#[must_use]
pub fn contract_key(address: &Address) -> Vec<u8> {
    prefixed(CONTRACT_PREFIX, address.as_bytes())
}

/// Prefix of a contract's storage.
#[must_use]
pub fn contract_store_prefix(address: &Address) -> Vec<u8> {
    prefixed(CONTRACT_STORE_PREFIX, address.as_bytes())
}

/// Key of a sequence.
#[must_use]
pub fn sequence_key(name: &[u8]) -> Vec<u8> {
    prefixed(SEQUENCE_PREFIX, name)
}

/// Key of a contract secret.
#[must_use]
pub fn contract_secret_key(address: &Address) -> Vec<u8> {
    prefixed(CONTRACT_SECRET_PREFIX, address.as_bytes())
}

/// Key of a label index entry.
#[must_use]
pub fn label_key(label: &str) -> Vec<u8> {
    prefixed(LABEL_PREFIX, label.as_bytes())
}

/// Key of the random seed of a height.
#[must_use]
pub fn random_key(height: u64) -> Vec<u8> {
    prefixed(RANDOM_PREFIX, &height.to_be_bytes())
}

/// Key of an IBC port binding.
#[must_use]
pub fn ibc_port_key(port_id: &str) -> Vec<u8> {
    prefixed(IBC_PORT_PREFIX, port_id.as_bytes())
}

/// Decodes the address suffix of a contract-record key.
#[must_use]
pub fn address_from_contract_key(key: &[u8]) -> Option<Address> {
    key.strip_prefix(&[CONTRACT_PREFIX]).and_then(Address::from_slice)
}

/// Decodes the code id suffix of a code-record key.
#[must_use]
pub fn code_id_from_key(key: &[u8]) -> Option<CodeId> {
    let tail: [u8; 8] = key.strip_prefix(&[CODE_PREFIX])?.try_into().ok()?;
    Some(CodeId::from_be_bytes(tail))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_keys_sort_by_id() {
        assert!(code_key(2) < code_key(256));
        assert_eq!(code_id_from_key(&code_key(77)), Some(77));
    }

    #[test]
    fn test_contract_key_round_trip() {
        let addr = Address::new([5u8; 20]);
        assert_eq!(address_from_contract_key(&contract_key(&addr)), Some(addr));
        assert_eq!(address_from_contract_key(&code_key(1)), None);
    }

    #[test]
    fn test_store_prefix_is_namespaced() {
        let a = contract_store_prefix(&Address::new([1u8; 20]));
        let b = contract_store_prefix(&Address::new([2u8; 20]));
        assert!(!a.starts_with(&b) && !b.starts_with(&a));
    }
}
