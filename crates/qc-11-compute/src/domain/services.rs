//! # Domain Services
//!
//! Pure functions for contract invocation. Deterministic, no side effects.

use crate::domain::value_objects::{Address, CodeId};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use std::io::Read;

// =============================================================================
// CONTRACT ADDRESS DERIVATION
// =============================================================================

/// Derives a contract address.
///
/// `RIPEMD160(SHA256(be_u64((code_id << 32) + instance_id) ++ creator))`
///
/// The shift and add wrap on overflow, matching the persisted addresses of
/// existing chains.
#[must_use]
pub fn derive_contract_address(code_id: CodeId, instance_id: u64, creator: &Address) -> Address {
    let contract_id = (code_id << 32).wrapping_add(instance_id);

    let mut preimage = Vec::with_capacity(8 + Address::LEN);
    preimage.extend_from_slice(&contract_id.to_be_bytes());
    preimage.extend_from_slice(creator.as_bytes());

    let sha = Sha256::digest(&preimage);
    let digest = Ripemd160::digest(sha);

    let mut addr = [0u8; 20];
    addr.copy_from_slice(&digest);
    Address::new(addr)
}

// =============================================================================
// IBC PORTS
// =============================================================================

/// Prefix of every contract-owned IBC port.
pub const IBC_PORT_PREFIX: &str = "wasm.";

/// Port id bound to a contract.
#[must_use]
pub fn ibc_port_id(contract: &Address) -> String {
    format!("{IBC_PORT_PREFIX}{contract}")
}

/// Extracts the contract address from a port id.
#[must_use]
pub fn contract_from_port_id(port_id: &str) -> Option<Address> {
    port_id.strip_prefix(IBC_PORT_PREFIX)?.parse().ok()
}

// =============================================================================
// CODE UPLOAD
// =============================================================================

const GZIP_MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];

/// Returns true if `code` starts with the gzip header.
#[must_use]
pub fn is_gzip(code: &[u8]) -> bool {
    code.starts_with(&GZIP_MAGIC)
}

/// Decompresses gzip-compressed code, passing other payloads through.
///
/// # Errors
///
/// Returns an error if the stream is corrupt or inflates beyond `limit` bytes.
pub fn uncompress(code: &[u8], limit: usize) -> std::io::Result<Vec<u8>> {
    if !is_gzip(code) {
        return Ok(code.to_vec());
    }

    let mut out = Vec::new();
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    flate2::read::GzDecoder::new(code)
        .take(cap)
        .read_to_end(&mut out)?;
    if out.len() > limit {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("uncompressed code exceeds {limit} bytes"),
        ));
    }
    Ok(out)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_address_derivation_is_pure() {
        let creator = Address::new([3u8; 20]);
        assert_eq!(
            derive_contract_address(1, 1, &creator),
            derive_contract_address(1, 1, &creator)
        );
        assert_ne!(
            derive_contract_address(1, 1, &creator),
            derive_contract_address(1, 2, &creator)
        );
    }

    #[test]
    fn test_address_depends_on_creator() {
        assert_ne!(
            derive_contract_address(1, 1, &Address::new([1u8; 20])),
            derive_contract_address(1, 1, &Address::new([2u8; 20]))
        );
    }

    #[test]
    fn test_ibc_port_round_trip() {
        let addr = Address::new([0x42; 20]);
        let port = ibc_port_id(&addr);
        assert!(port.starts_with("wasm.0x"));
        assert_eq!(contract_from_port_id(&port), Some(addr));
        assert_eq!(contract_from_port_id("transfer"), None);
    }

    #[test]
    fn test_uncompress_passthrough_and_gzip() {
        let raw = b"\0asm plain code".to_vec();
        assert_eq!(uncompress(&raw, 1024).unwrap(), raw);

        let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(&raw).unwrap();
        let zipped = enc.finish().unwrap();
        assert!(is_gzip(&zipped));
        assert_eq!(uncompress(&zipped, 1024).unwrap(), raw);
        assert!(uncompress(&zipped, 4).is_err());
    }
}
