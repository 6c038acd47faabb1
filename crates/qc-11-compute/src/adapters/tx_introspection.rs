//! # Transaction Envelope Introspection
//!
//! Decodes the bincode transaction envelope used by the in-memory stack.
//! Chains with their own transaction format implement [`TxIntrospector`]
//! over it instead.

use crate::domain::entities::SignerMaterial;
use crate::domain::value_objects::Address;
use crate::errors::TxDecodeError;
use crate::ports::outbound::{DecodedTx, TxIntrospector, TxSigner};
use serde::{Deserialize, Serialize};

/// One signer entry of an envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeSigner {
    /// Signer account.
    pub address: Address,
    /// Signing material.
    pub material: SignerMaterial,
}

/// Transaction envelope: the signers, in signature order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxEnvelope {
    /// Signers.
    pub signers: Vec<EnvelopeSigner>,
}

impl TxEnvelope {
    /// Adds a signer.
    #[must_use]
    pub fn with_signer(mut self, address: Address, material: SignerMaterial) -> Self {
        self.signers.push(EnvelopeSigner { address, material });
        self
    }

    /// Encodes the envelope as transaction bytes.
    pub fn encode(&self) -> Result<Vec<u8>, TxDecodeError> {
        bincode::serialize(self).map_err(|e| TxDecodeError(e.to_string()))
    }
}

/// Decodes [`TxEnvelope`] bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeIntrospector;

impl TxIntrospector for EnvelopeIntrospector {
    fn decode(&self, tx_bytes: &[u8]) -> Result<DecodedTx, TxDecodeError> {
        let envelope: TxEnvelope =
            bincode::deserialize(tx_bytes).map_err(|e| TxDecodeError(e.to_string()))?;
        Ok(DecodedTx {
            signers: envelope
                .signers
                .into_iter()
                .map(|s| TxSigner {
                    address: s.address,
                    material: s.material,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::SignMode;

    #[test]
    fn test_envelope_decodes_signers_in_order() {
        let material = SignerMaterial {
            sign_bytes: b"doc".to_vec(),
            sign_mode: SignMode::Direct,
            mode_info_bytes: vec![1],
            pub_key_bytes: vec![2; 33],
            signature: vec![3; 64],
        };
        let bytes = TxEnvelope::default()
            .with_signer(Address::new([1; 20]), material.clone())
            .with_signer(Address::new([2; 20]), SignerMaterial::default())
            .encode()
            .unwrap();

        let decoded = EnvelopeIntrospector.decode(&bytes).unwrap();
        assert_eq!(decoded.signers.len(), 2);
        assert_eq!(decoded.signers[0].material, material);
        assert_eq!(decoded.signers[1].address, Address::new([2; 20]));
    }

    #[test]
    fn test_garbage_fails() {
        assert!(EnvelopeIntrospector.decode(&[0xff; 3]).is_err());
    }
}
