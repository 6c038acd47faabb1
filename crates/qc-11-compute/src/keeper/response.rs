//! # Response Handler
//!
//! Emits a contract's attributes and custom events, then hands its
//! submessages to the dispatcher. Reply data returned by the dispatcher
//! supersedes the contract's own data.

use super::Keeper;
use crate::context::CallContext;
use crate::domain::entities::VerificationContext;
use crate::domain::messages::ContractResponse;
use crate::domain::value_objects::{Address, Binary};
use crate::errors::ComputeError;
use crate::events::{contract_attributes_event, custom_events};

impl Keeper {
    /// Processes a current-schema response of `contract`.
    ///
    /// `og_msg` and `og_verification` belong to the call that produced the
    /// response and are reused for replies.
    ///
    /// # Errors
    ///
    /// `Invalid` for malformed custom events; dispatch errors wrapped in
    /// `"submessages"`; fatal errors unchanged.
    pub fn handle_contract_response(
        &self,
        ctx: CallContext<'_>,
        contract: &Address,
        ibc_port: Option<&str>,
        response: ContractResponse,
        og_msg: &[u8],
        og_verification: &VerificationContext,
    ) -> Result<Option<Binary>, ComputeError> {
        if let Some(event) = contract_attributes_event(contract, &response.attributes) {
            ctx.events().emit(event);
        }
        if !response.events.is_empty() {
            ctx.events()
                .emit_all(custom_events(contract, &response.events)?);
        }

        let dispatched = self
            .dispatch_submessages(
                ctx,
                contract,
                ibc_port,
                response.messages,
                og_msg,
                og_verification,
            )
            .map_err(|e| e.wrap("submessages"))?;

        Ok(dispatched.or(response.data))
    }
}
