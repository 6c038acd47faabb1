//! # Submessage Dispatcher & Reply Engine
//!
//! Submessages run strictly in order, each in its own store transaction and
//! event scope. A submessage that fails is rolled back completely; whether
//! its failure aborts the emitting call or is handed back through a reply
//! depends on its `reply_on` policy.
//!
//! ## Gas
//!
//! A submessage with a gas limit runs under a child meter capped at the
//! parent's remaining gas. When its own limit is the cap, exhausting the
//! child meter is an ordinary failure of that submessage and the parent is
//! charged at most that limit. When the parent's remaining gas is the cap,
//! the child's full consumption is charged to the parent, which then runs
//! out of gas and aborts the transaction.

use super::invoke::KeeperQuerier;
use super::Keeper;
use crate::context::CallContext;
use crate::domain::entities::{CallKind, Environment, MessageInfo, VerificationContext};
use crate::domain::invariants::{
    check_failed_submsg_events_invariant, check_gas_monotonic_invariant,
    check_reply_prefix_invariant, limits,
};
use crate::domain::legacy::EngineResponse;
use crate::domain::messages::{
    CosmosMsg, Event, InstantiateReplyData, Reply, SubMsg, SubMsgResponse, SubMsgResult, WasmMsg,
};
use crate::domain::value_objects::{Address, Binary, CodeHash, Coins};
use crate::errors::ComputeError;
use crate::events::{attribute_keys, event_types, EventManager};
use crate::gas::GasMeter;
use crate::metrics::CallTimer;
use crate::ports::outbound::EngineCall;
use tracing::{debug, instrument, warn};

/// An empty expected hash is not checked.
fn check_code_hash(expected: &str, actual: &CodeHash) -> Result<(), ComputeError> {
    if expected.is_empty() || expected.eq_ignore_ascii_case(&actual.to_string()) {
        return Ok(());
    }
    Err(ComputeError::Invalid(format!(
        "code hash mismatch: expected {expected}, found {actual}"
    )))
}

/// Gas meter of a submessage that declared a gas limit.
struct ChildMeter {
    meter: GasMeter,
    /// The parent's remaining gas, not the declared limit, set the cap.
    bound_by_parent: bool,
}

/// Descriptor charged to the parent meter for a gas-limited submessage.
const SUBCALL_DESCRIPTOR: &str = "subcall with gas limit";

/// Descriptor of the instance load charged before a reply.
const REPLY_LOAD_DESCRIPTOR: &str = "Loading compute module: reply";

impl Keeper {
    /// Dispatches the submessages of `contract` in order.
    ///
    /// Returns the data of the last reply that returned non-empty data, or
    /// `None` if no reply did.
    ///
    /// # Errors
    ///
    /// The error of a failed submessage whose policy does not reply on
    /// error, any reply error, and fatal errors.
    pub fn dispatch_submessages(
        &self,
        ctx: CallContext<'_>,
        contract: &Address,
        ibc_port: Option<&str>,
        msgs: Vec<SubMsg>,
        og_msg: &[u8],
        og_verification: &VerificationContext,
    ) -> Result<Option<Binary>, ComputeError> {
        let mut data: Option<Binary> = None;

        for msg in msgs {
            let (result, events) = self.run_submessage(ctx, contract, ibc_port, &msg)?;

            let result = match result {
                Ok(sub_data) => {
                    ctx.events().emit_all(events.iter().cloned());
                    if !msg.reply_on.on_success() {
                        continue;
                    }
                    SubMsgResult::Ok(SubMsgResponse {
                        events,
                        data: sub_data,
                    })
                }
                Err(err) => {
                    if !msg.reply_on.on_error() {
                        return Err(err);
                    }
                    let result = SubMsgResult::Err(err.to_string());
                    debug_assert!(check_failed_submsg_events_invariant(&result, &events));
                    result
                }
            };

            debug!(
                %contract,
                id = msg.id,
                reply_on = %msg.reply_on,
                ok = result.is_ok(),
                "Replying to submessage"
            );
            let reply = Reply { id: msg.id, result };
            if let Some(reply_data) = self.reply(ctx, contract, reply, og_msg, og_verification)? {
                if !reply_data.is_empty() {
                    data = Some(reply_data);
                }
            }
        }

        Ok(data)
    }

    /// Runs one submessage in its own store transaction and event scope.
    ///
    /// The outer `Err` is fatal for the transaction; the inner result is the
    /// submessage outcome. Events are only returned on success.
    fn run_submessage(
        &self,
        ctx: CallContext<'_>,
        contract: &Address,
        ibc_port: Option<&str>,
        msg: &SubMsg,
    ) -> Result<(Result<Option<Binary>, ComputeError>, Vec<Event>), ComputeError> {
        let sub_events = EventManager::new();
        let parent_before = ctx.gas_meter().consumed();
        let child_meter = msg.gas_limit.map(|limit| {
            let remaining = ctx.gas_meter().remaining();
            ChildMeter {
                meter: GasMeter::new(limit.min(remaining)),
                bound_by_parent: limit >= remaining,
            }
        });

        let scoped = ctx.with_events(&sub_events);
        let sub_ctx = match &child_meter {
            Some(child) => scoped.with_gas_meter(&child.meter),
            None => scoped,
        };

        self.store.begin();
        let mut result = self.dispatch_message(sub_ctx, contract, ibc_port, &msg.msg);
        match &result {
            Ok(_) => self.store.commit()?,
            Err(_) => self.store.rollback()?,
        }

        if let Some(ChildMeter {
            meter,
            bound_by_parent,
        }) = &child_meter
        {
            // Past the parent's own remaining gas the overrun lands on the
            // parent meter and aborts the transaction.
            let spent = if *bound_by_parent {
                meter.consumed()
            } else {
                meter.consumed().min(meter.limit())
            };
            ctx.gas_meter().consume(spent, SUBCALL_DESCRIPTOR)?;
            debug_assert!(check_gas_monotonic_invariant(
                parent_before,
                ctx.gas_meter().consumed()
            ));
            if let Err(err) = &result {
                if err.is_fatal() {
                    warn!(%contract, id = msg.id, limit = meter.limit(), "Submessage ran out of gas");
                    result = Err(ComputeError::ExecuteFailed(err.to_string()));
                }
            }
        }

        match result {
            Err(err) if err.is_fatal() => Err(err),
            Ok(data) => Ok((Ok(data), sub_events.take())),
            Err(err) => {
                debug!(%contract, id = msg.id, kind = msg.msg.kind(), error = %err, "Submessage failed");
                Ok((Err(err), Vec::new()))
            }
        }
    }

    /// Delivers one message on behalf of `contract`.
    fn dispatch_message(
        &self,
        ctx: CallContext<'_>,
        contract: &Address,
        ibc_port: Option<&str>,
        msg: &CosmosMsg,
    ) -> Result<Option<Binary>, ComputeError> {
        match msg {
            CosmosMsg::Wasm(WasmMsg::Execute {
                contract_addr,
                code_hash,
                msg,
                funds,
                callback_signature,
            }) => {
                check_code_hash(code_hash, &self.get_contract_hash(contract_addr)?)?;
                let signature = callback_signature.clone().unwrap_or_default();
                self.execute(
                    ctx,
                    contract_addr,
                    contract,
                    msg.as_slice(),
                    funds,
                    Some(signature.as_slice()),
                )
            }
            CosmosMsg::Wasm(WasmMsg::Instantiate {
                code_id,
                code_hash,
                msg,
                funds,
                label,
                callback_signature,
            }) => {
                if let Some(code) = self.get_code_info(*code_id)? {
                    check_code_hash(code_hash, &code.code_hash)?;
                }
                let signature = callback_signature.clone().unwrap_or_default();
                let (address, data) = self.instantiate(
                    ctx,
                    *code_id,
                    contract,
                    msg.as_slice(),
                    label,
                    funds,
                    Some(signature.as_slice()),
                )?;
                let reply_data = serde_json::to_vec(&InstantiateReplyData { address, data })?;
                Ok(Some(Binary::from(reply_data)))
            }
            other => {
                let response = self.router.route(contract, ibc_port, other)?;
                ctx.events().emit_all(response.events);
                Ok(response.data)
            }
        }
    }

    /// Delivers `reply` to `contract`.
    ///
    /// The payload is the first 64 bytes of `og_msg` followed by the JSON
    /// encoding of `reply`, authenticated with `og_verification`.
    ///
    /// # Errors
    ///
    /// `ReplyFailed` for any non-fatal failure, including a legacy-schema
    /// response; fatal errors unchanged.
    #[instrument(skip(self, ctx, reply, og_msg, og_verification), fields(id = reply.id))]
    pub fn reply(
        &self,
        ctx: CallContext<'_>,
        contract: &Address,
        reply: Reply,
        og_msg: &[u8],
        og_verification: &VerificationContext,
    ) -> Result<Option<Binary>, ComputeError> {
        let _timer = CallTimer::start(CallKind::Reply.as_str());
        let _frame = ctx.call_stack().enter()?;

        let instance = self.contract_instance(contract)?;
        ctx.gas_meter()
            .consume(self.config.instance_cost, REPLY_LOAD_DESCRIPTOR)?;

        if !check_reply_prefix_invariant(og_msg) {
            return Err(ComputeError::ReplyFailed(format!(
                "original message is {} bytes, reply needs at least {}",
                og_msg.len(),
                limits::REPLY_PREFIX_LEN
            )));
        }
        let mut payload = og_msg[..limits::REPLY_PREFIX_LEN].to_vec();
        payload.extend(serde_json::to_vec(&reply)?);

        let env = Environment {
            block: ctx.block().clone(),
            message: MessageInfo {
                sender: Some(*contract),
                sent_funds: Coins::empty(),
            },
            contract_address: *contract,
            contract_key: self.get_contract_key(contract)?,
            random: self.get_random_seed(ctx.block().height)?,
            query_depth: 0,
        };

        let querier = KeeperQuerier::new(self, ctx, 0);
        let outcome = self.engine.execute(
            EngineCall {
                code_hash: &instance.code.code_hash,
                env: &env,
                msg: &payload,
                store: &instance.store,
                querier: &querier,
                gas_meter: self.bridge.multiplied(ctx.gas_meter()),
                gas_limit: self.bridge.budget_for_call(ctx.gas_meter()),
                verification: og_verification,
            },
            CallKind::Reply,
        );
        self.bridge.charge_host(ctx.gas_meter(), outcome.gas_used)?;

        let response = match outcome.result {
            Ok(EngineResponse::Current(response)) => response,
            Ok(EngineResponse::Legacy(_)) => {
                return Err(ComputeError::ReplyFailed(
                    "legacy contracts do not support replies".to_string(),
                ))
            }
            Err(err) => return Err(ComputeError::ReplyFailed(err.to_string())),
        };

        ctx.events().emit(
            Event::new(event_types::REPLY)
                .add_attribute(attribute_keys::CONTRACT_ADDRESS, contract.to_string()),
        );

        self.handle_contract_response(
            ctx,
            contract,
            instance.contract.ibc_port_id.as_deref(),
            response,
            og_msg,
            og_verification,
        )
        .map_err(|err| {
            if err.is_fatal() {
                err
            } else {
                ComputeError::ReplyFailed(err.to_string())
            }
        })
    }
}
