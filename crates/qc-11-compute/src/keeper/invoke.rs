//! # Invocation Façade
//!
//! Public entry points that run a contract: code upload, instantiation,
//! execution and smart queries. Each call charges the instance load cost,
//! resolves what it needs, runs the engine under a budget derived from the
//! host meter, charges the engine's usage back and hands the response to
//! the response handler.

use super::keys;
use super::{Keeper, PrefixStore};
use crate::context::CallContext;
use crate::domain::entities::{
    AbsoluteTxPosition, CallKind, CodeRecord, ContractRecord, Environment, MessageInfo,
    VerificationContext,
};
use crate::domain::invariants::{check_label_invariant, check_query_depth_invariant, limits};
use crate::domain::legacy::{EngineResponse, LegacyResponse};
use crate::domain::messages::{ContractResponse, Event};
use crate::domain::services::uncompress;
use crate::domain::value_objects::{Address, Binary, CodeId, Coins};
use crate::errors::ComputeError;
use crate::events::{attribute_keys, event_types};
use crate::gas::GasMeter;
use crate::metrics::{self, CallTimer};
use crate::ports::outbound::{EngineCall, Querier};
use tracing::{debug, info, instrument};

const COMPILE_DESCRIPTOR: &str = "Compiling WASM Bytecode";
const INIT_LOAD_DESCRIPTOR: &str = "Loading compute module: init";
const EXECUTE_LOAD_DESCRIPTOR: &str = "Loading compute module: execute";
const QUERY_LOAD_DESCRIPTOR: &str = "Loading compute module: query";

// =============================================================================
// NESTED QUERIES
// =============================================================================

/// Querier handed to a running contract. Smart queries run one level
/// deeper than the call that issued them.
pub struct KeeperQuerier<'a> {
    keeper: &'a Keeper,
    ctx: CallContext<'a>,
    depth: u32,
}

impl<'a> KeeperQuerier<'a> {
    /// Querier for a call running at query depth `depth`.
    #[must_use]
    pub fn new(keeper: &'a Keeper, ctx: CallContext<'a>, depth: u32) -> Self {
        Self { keeper, ctx, depth }
    }
}

impl Querier for KeeperQuerier<'_> {
    fn query_smart(&self, contract: &Address, msg: &[u8]) -> Result<Vec<u8>, ComputeError> {
        self.keeper
            .query_smart_at(self.ctx, contract, msg, false, self.depth + 1)
    }

    fn query_raw(&self, contract: &Address, key: &[u8]) -> Result<Option<Vec<u8>>, ComputeError> {
        self.keeper.query_raw(contract, key)
    }
}

impl std::fmt::Debug for KeeperQuerier<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeeperQuerier")
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// ENTRY POINTS
// =============================================================================

impl Keeper {
    /// Uploads code, optionally gzip-compressed, and returns its id.
    ///
    /// # Errors
    ///
    /// `CreateFailed` if the code cannot be decompressed or compiled.
    #[instrument(skip(self, ctx, code, source, builder), fields(size = code.len()))]
    pub fn create(
        &self,
        ctx: CallContext<'_>,
        creator: &Address,
        code: &[u8],
        source: &str,
        builder: &str,
    ) -> Result<CodeId, ComputeError> {
        let wasm = uncompress(code, limits::MAX_CODE_SIZE)
            .map_err(|e| ComputeError::CreateFailed(e.to_string()))?;

        let compile_cost = self.config.compile_cost.saturating_mul(wasm.len() as u64);
        ctx.gas_meter().consume(compile_cost, COMPILE_DESCRIPTOR)?;

        let code_hash = self
            .engine
            .create(&wasm)
            .map_err(|e| ComputeError::CreateFailed(e.to_string()))?;

        let code_id = self.auto_increment_id(keys::LAST_CODE_ID)?;
        self.write(
            &keys::code_key(code_id),
            &CodeRecord::new(code_hash, *creator, source, builder),
        )?;

        info!(code_id, %code_hash, %creator, "Stored contract code");
        Ok(code_id)
    }

    /// Instantiates `code_id` and returns the new contract's address and
    /// data.
    ///
    /// `callback_signature` is set when another contract issues the call.
    ///
    /// # Errors
    ///
    /// - `Invalid` for a malformed label, `Duplicate` for a taken one
    /// - `NotFound` if the code does not exist
    /// - `AccountExists` if the derived address already has an account
    /// - `InstantiateFailed` if the engine fails
    /// - dispatch errors wrapped in `"dispatch"`
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self, ctx, init_msg, deposit, callback_signature), fields(%creator))]
    pub fn instantiate(
        &self,
        ctx: CallContext<'_>,
        code_id: CodeId,
        creator: &Address,
        init_msg: &[u8],
        label: &str,
        deposit: &Coins,
        callback_signature: Option<&[u8]>,
    ) -> Result<(Address, Option<Binary>), ComputeError> {
        let _timer = CallTimer::start(CallKind::Instantiate.as_str());
        let _frame = ctx.call_stack().enter()?;

        ctx.gas_meter()
            .consume(self.config.instance_cost, INIT_LOAD_DESCRIPTOR)?;
        let verification = self.verification_context(ctx, creator, callback_signature)?;

        if !check_label_invariant(label) {
            return Err(ComputeError::Invalid(format!(
                "label must be non-blank and at most {} bytes",
                limits::MAX_LABEL_LEN
            )));
        }
        if self.get_contract_address(label)?.is_some() {
            return Err(ComputeError::Duplicate(format!("label {label}")));
        }

        let code = self
            .get_code_info(code_id)?
            .ok_or_else(|| ComputeError::NotFound(format!("code id {code_id}")))?;

        let address = self.generate_contract_address(code_id, creator)?;
        if self.bank.account_exists(&address)? {
            return Err(ComputeError::AccountExists(address.to_string()));
        }

        if deposit.is_zero() {
            self.bank.create_account(&address)?;
        } else {
            self.transfer_in(creator, &address, deposit)?;
        }

        let env = Environment {
            block: ctx.block().clone(),
            message: MessageInfo {
                sender: Some(*creator),
                sent_funds: deposit.clone(),
            },
            contract_address: address,
            contract_key: None,
            random: self.get_random_seed(ctx.block().height)?,
            query_depth: 0,
        };

        let store = PrefixStore::new(&*self.store, &address);
        let querier = KeeperQuerier::new(self, ctx, 0);
        let outcome = self.engine.instantiate(EngineCall {
            code_hash: &code.code_hash,
            env: &env,
            msg: init_msg,
            store: &store,
            querier: &querier,
            gas_meter: self.bridge.multiplied(ctx.gas_meter()),
            gas_limit: self.bridge.budget_for_call(ctx.gas_meter()),
            verification: &verification,
        });
        self.bridge.charge_host(ctx.gas_meter(), outcome.gas_used)?;
        let output = outcome
            .result
            .map_err(|e| ComputeError::InstantiateFailed(e.to_string()))?;

        let mut record = ContractRecord::new(
            code_id,
            *creator,
            label,
            AbsoluteTxPosition::from_block(ctx.block()),
        );

        let response = match output.response {
            EngineResponse::Current(response) => {
                let capabilities = self
                    .engine
                    .analyze(&code.code_hash)
                    .map_err(|e| ComputeError::InstantiateFailed(e.to_string()))?;
                if capabilities.has_ibc_entry_points {
                    record.ibc_port_id = Some(self.ensure_ibc_port(&address)?);
                }
                ctx.events().emit(
                    Event::new(event_types::INSTANTIATE)
                        .add_attribute(attribute_keys::CONTRACT_ADDRESS, address.to_string())
                        .add_attribute(attribute_keys::CODE_ID, code_id.to_string()),
                );
                self.persist_contract(&address, &record, output.contract_key)?;
                response
            }
            EngineResponse::Legacy(legacy) => {
                self.persist_contract(&address, &record, output.contract_key)?;
                normalize(legacy, &address)?
            }
        };

        info!(%address, code_id, label, "Instantiated contract");

        let data = self
            .handle_contract_response(
                ctx,
                &address,
                record.ibc_port_id.as_deref(),
                response,
                init_msg,
                &verification,
            )
            .map_err(|e| e.wrap("dispatch"))?;

        Ok((address, data))
    }

    /// Executes `contract` on behalf of `caller`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the contract does not exist
    /// - `InvalidAddress` if funds are sent from a blocked account
    /// - `ExecuteFailed` if the engine fails
    /// - dispatch errors wrapped in `"dispatch"`
    #[instrument(skip(self, ctx, msg, funds, callback_signature), fields(%contract, %caller))]
    pub fn execute(
        &self,
        ctx: CallContext<'_>,
        contract: &Address,
        caller: &Address,
        msg: &[u8],
        funds: &Coins,
        callback_signature: Option<&[u8]>,
    ) -> Result<Option<Binary>, ComputeError> {
        let _timer = CallTimer::start(CallKind::Execute.as_str());
        let _frame = ctx.call_stack().enter()?;

        ctx.gas_meter()
            .consume(self.config.instance_cost, EXECUTE_LOAD_DESCRIPTOR)?;
        let verification = self.verification_context(ctx, caller, callback_signature)?;
        let instance = self.contract_instance(contract)?;

        if !funds.is_zero() {
            self.transfer_in(caller, contract, funds)?;
        }

        let env = Environment {
            block: ctx.block().clone(),
            message: MessageInfo {
                sender: Some(*caller),
                sent_funds: funds.clone(),
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
                msg,
                store: &instance.store,
                querier: &querier,
                gas_meter: self.bridge.multiplied(ctx.gas_meter()),
                gas_limit: self.bridge.budget_for_call(ctx.gas_meter()),
                verification: &verification,
            },
            CallKind::Execute,
        );
        self.bridge.charge_host(ctx.gas_meter(), outcome.gas_used)?;
        let response = outcome
            .result
            .map_err(|e| ComputeError::ExecuteFailed(e.to_string()))?;

        let response = match response {
            EngineResponse::Current(response) => {
                ctx.events().emit(
                    Event::new(event_types::EXECUTE)
                        .add_attribute(attribute_keys::CONTRACT_ADDRESS, contract.to_string()),
                );
                response
            }
            EngineResponse::Legacy(legacy) => normalize(legacy, contract)?,
        };

        debug!(
            %contract,
            submessages = response.messages.len(),
            gas_used = ctx.gas_meter().consumed(),
            "Executed contract"
        );

        self.handle_contract_response(
            ctx,
            contract,
            instance.contract.ibc_port_id.as_deref(),
            response,
            msg,
            &verification,
        )
        .map_err(|e| e.wrap("dispatch"))
    }

    /// Runs a smart query at depth 1.
    ///
    /// With `use_default_gas_limit` the query runs under a fresh meter capped
    /// at the configured smart query limit instead of the caller's meter.
    ///
    /// # Errors
    ///
    /// `NotFound` if the contract does not exist, `QueryFailed` if the
    /// engine fails.
    pub fn query_smart(
        &self,
        ctx: CallContext<'_>,
        contract: &Address,
        msg: &[u8],
        use_default_gas_limit: bool,
    ) -> Result<Vec<u8>, ComputeError> {
        self.query_smart_at(ctx, contract, msg, use_default_gas_limit, 1)
    }

    #[instrument(skip(self, ctx, msg), fields(%contract))]
    fn query_smart_at(
        &self,
        ctx: CallContext<'_>,
        contract: &Address,
        msg: &[u8],
        use_default_gas_limit: bool,
        depth: u32,
    ) -> Result<Vec<u8>, ComputeError> {
        let max = self.config.max_query_depth;
        if !check_query_depth_invariant(depth, max) {
            return Err(ComputeError::QueryDepthExceeded { depth, max });
        }
        let _timer = CallTimer::start(CallKind::Query.as_str());

        let capped;
        let ctx = if use_default_gas_limit {
            capped = GasMeter::new(self.config.smart_query_gas_limit);
            ctx.with_gas_meter(&capped)
        } else {
            ctx
        };

        ctx.gas_meter()
            .consume(self.config.instance_cost, QUERY_LOAD_DESCRIPTOR)?;
        let instance = self.contract_instance(contract)?;

        let env = Environment {
            block: ctx.block().clone(),
            message: MessageInfo {
                sender: None,
                sent_funds: Coins::empty(),
            },
            contract_address: *contract,
            contract_key: self.get_contract_key(contract)?,
            random: Some(vec![0]),
            query_depth: depth,
        };

        let verification = VerificationContext::default();
        let querier = KeeperQuerier::new(self, ctx, depth);
        let outcome = self.engine.query(EngineCall {
            code_hash: &instance.code.code_hash,
            env: &env,
            msg,
            store: &instance.store,
            querier: &querier,
            gas_meter: self.bridge.multiplied(ctx.gas_meter()),
            gas_limit: self.bridge.budget_for_call(ctx.gas_meter()),
            verification: &verification,
        });
        self.bridge.charge_host(ctx.gas_meter(), outcome.gas_used)?;
        metrics::observe_query_gas(outcome.gas_used);

        outcome
            .result
            .map_err(|e| ComputeError::QueryFailed(e.to_string()))
    }

    /// Moves funds sent along with a call into the contract.
    fn transfer_in(&self, from: &Address, to: &Address, amount: &Coins) -> Result<(), ComputeError> {
        if self.bank.is_blocked(from) {
            return Err(ComputeError::InvalidAddress(
                "blocked address can not be used".to_string(),
            ));
        }
        self.bank.send_funds(from, to, amount)?;
        Ok(())
    }
}

fn normalize(
    legacy: LegacyResponse,
    contract: &Address,
) -> Result<ContractResponse, ComputeError> {
    legacy
        .into_current(contract)
        .map_err(|e| ComputeError::Invalid(e.to_string()).wrap("dispatch"))
}
