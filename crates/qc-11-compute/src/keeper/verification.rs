//! # Verification Context Builder
//!
//! An externally triggered call authenticates with the signing material of
//! the transaction signer matching the caller. A call issued by another
//! contract carries that contract's callback signature instead and never
//! touches the transaction.

use super::Keeper;
use crate::context::CallContext;
use crate::domain::entities::VerificationContext;
use crate::domain::value_objects::Address;
use crate::errors::ComputeError;
use tracing::debug;

impl Keeper {
    /// Builds the verification context of a call by `sender`.
    ///
    /// # Errors
    ///
    /// `SigFailed` if the transaction cannot be decoded, `sender` did not
    /// sign it, or the signer has no signature.
    pub fn verification_context(
        &self,
        ctx: CallContext<'_>,
        sender: &Address,
        callback_signature: Option<&[u8]>,
    ) -> Result<VerificationContext, ComputeError> {
        if let Some(signature) = callback_signature {
            return Ok(VerificationContext::from_callback(signature.to_vec()));
        }

        let decoded = self
            .introspector
            .decode(ctx.tx_bytes())
            .map_err(|e| ComputeError::SigFailed(e.to_string()))?;

        let signer = decoded
            .signers
            .into_iter()
            .find(|s| s.address == *sender)
            .ok_or_else(|| {
                ComputeError::SigFailed(format!("message sender {sender} is not a transaction signer"))
            })?;

        if signer.material.signature.is_empty() {
            return Err(ComputeError::SigFailed(format!(
                "no signature for signer {sender}"
            )));
        }

        debug!(%sender, sign_mode = ?signer.material.sign_mode, "Resolved signer material");
        Ok(VerificationContext::from_signer(signer.material))
    }
}
