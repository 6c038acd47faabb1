//! # Compute Service
//!
//! Transaction boundary around the [`Keeper`]. Every call runs inside one
//! store transaction with its own gas meter, event log and call stack; it is
//! committed when the call succeeds and rolled back otherwise.
//!
//! Queries run in a transaction that is always rolled back, so a contract
//! cannot persist writes from a query.

use crate::adapters::{
    EnvelopeIntrospector, InMemoryBank, InMemoryStore, JournalingRouter, ScriptedEngine,
};
use crate::config::ComputeConfig;
use crate::context::{CallContext, CallStack};
use crate::domain::entities::{BlockInfo, CodeRecord, ContractRecord};
use crate::domain::value_objects::{Address, Binary, CodeId};
use crate::errors::ComputeError;
use crate::events::EventManager;
use crate::gas::GasMeter;
use crate::keeper::Keeper;
use crate::metrics;
use crate::ports::inbound::{
    ComputeApi, ExecuteRequest, InstantiateRequest, Instantiated, QueryRequest, StoreCodeRequest,
    TxContext, TxOutcome,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Statistics for the Compute Service.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ServiceStats {
    /// Transactions processed.
    pub transactions_executed: u64,
    /// Committed transactions.
    pub successful_executions: u64,
    /// Rolled-back transactions, excluding gas exhaustion.
    pub failed_executions: u64,
    /// Transactions aborted by gas exhaustion.
    pub out_of_gas_aborts: u64,
    /// Host gas consumed by committed transactions.
    pub total_gas_used: u64,
    /// Smart queries served.
    pub queries_served: u64,
}

/// The main Compute Service.
pub struct ComputeService {
    keeper: Keeper,
    stats: RwLock<ServiceStats>,
}

impl ComputeService {
    /// Create a service over `keeper`.
    #[must_use]
    pub fn new(keeper: Keeper) -> Self {
        Self {
            keeper,
            stats: RwLock::new(ServiceStats::default()),
        }
    }

    /// The wrapped keeper.
    #[must_use]
    pub fn keeper(&self) -> &Keeper {
        &self.keeper
    }

    /// Get current service statistics.
    #[must_use]
    pub fn stats(&self) -> ServiceStats {
        self.stats.read().clone()
    }

    /// Runs `call` as one transaction.
    fn run_tx<T>(
        &self,
        tx: &TxContext,
        call: impl FnOnce(CallContext<'_>) -> Result<T, ComputeError>,
    ) -> Result<TxOutcome<T>, ComputeError> {
        let store = self.keeper.store();
        let meter = GasMeter::new(tx.gas_limit);
        let events = EventManager::new();
        let stack = CallStack::new(self.keeper.config().max_call_depth);
        let ctx = CallContext::new(&tx.block, &tx.tx_bytes, &meter, &events, &stack);

        store.begin();
        let result = call(ctx);

        let mut stats = self.stats.write();
        stats.transactions_executed += 1;
        match result {
            Ok(value) => {
                store.commit()?;
                stats.successful_executions += 1;
                stats.total_gas_used = stats.total_gas_used.saturating_add(meter.consumed());
                debug!(
                    gas_used = meter.consumed(),
                    events = events.len(),
                    "Transaction committed"
                );
                Ok(TxOutcome {
                    value,
                    gas_used: meter.consumed(),
                    events: events.take(),
                })
            }
            Err(err) => {
                store.rollback()?;
                if err.is_fatal() {
                    metrics::record_out_of_gas();
                    stats.out_of_gas_aborts += 1;
                    warn!(error = %err, "Transaction aborted");
                } else {
                    stats.failed_executions += 1;
                    debug!(error = %err, kind = ?err.kind(), "Transaction rolled back");
                }
                Err(err)
            }
        }
    }
}

impl ComputeApi for ComputeService {
    #[instrument(skip(self, tx, req), fields(creator = %req.creator))]
    fn store_code(
        &self,
        tx: &TxContext,
        req: StoreCodeRequest,
    ) -> Result<TxOutcome<CodeId>, ComputeError> {
        self.run_tx(tx, |ctx| {
            self.keeper
                .create(ctx, &req.creator, &req.code, &req.source, &req.builder)
        })
    }

    #[instrument(skip(self, tx, req), fields(code_id = req.code_id, label = %req.label))]
    fn instantiate(
        &self,
        tx: &TxContext,
        req: InstantiateRequest,
    ) -> Result<TxOutcome<Instantiated>, ComputeError> {
        let outcome = self.run_tx(tx, |ctx| {
            self.keeper.instantiate(
                ctx,
                req.code_id,
                &req.creator,
                &req.init_msg,
                &req.label,
                &req.deposit,
                None,
            )
        })?;
        let (address, data) = outcome.value;
        info!(%address, gas_used = outcome.gas_used, "Instantiate transaction committed");
        Ok(TxOutcome {
            value: Instantiated { address, data },
            gas_used: outcome.gas_used,
            events: outcome.events,
        })
    }

    #[instrument(skip(self, tx, req), fields(contract = %req.contract))]
    fn execute(
        &self,
        tx: &TxContext,
        req: ExecuteRequest,
    ) -> Result<TxOutcome<Option<Binary>>, ComputeError> {
        self.run_tx(tx, |ctx| {
            self.keeper
                .execute(ctx, &req.contract, &req.sender, &req.msg, &req.funds, None)
        })
    }

    #[instrument(skip(self, block, req), fields(contract = %req.contract))]
    fn query(&self, block: &BlockInfo, req: QueryRequest) -> Result<Vec<u8>, ComputeError> {
        let store = self.keeper.store();
        let meter = GasMeter::infinite();
        let events = EventManager::new();
        let stack = CallStack::new(self.keeper.config().max_call_depth);
        let ctx = CallContext::new(block, &[], &meter, &events, &stack);

        store.begin();
        let result = self.keeper.query_smart(ctx, &req.contract, &req.msg, true);
        store.rollback()?;

        self.stats.write().queries_served += 1;
        result
    }

    fn code_info(&self, code_id: CodeId) -> Result<Option<CodeRecord>, ComputeError> {
        self.keeper.get_code_info(code_id)
    }

    fn contract_info(&self, address: &Address) -> Result<Option<ContractRecord>, ComputeError> {
        self.keeper.get_contract_info(address)
    }

    fn contract_address(&self, label: &str) -> Result<Option<Address>, ComputeError> {
        self.keeper.get_contract_address(label)
    }
}

impl std::fmt::Debug for ComputeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeService")
            .field("keeper", &self.keeper)
            .field("stats", &*self.stats.read())
            .finish()
    }
}

// =============================================================================
// IN-MEMORY STACK
// =============================================================================

/// A service wired to the in-memory adapters, with handles to each of them.
#[derive(Debug)]
pub struct TestStack {
    /// The service.
    pub service: ComputeService,
    /// Ledger store.
    pub store: Arc<InMemoryStore>,
    /// Bank.
    pub bank: Arc<InMemoryBank>,
    /// Engine; register programs here.
    pub engine: Arc<ScriptedEngine>,
    /// Router and its journal.
    pub router: Arc<JournalingRouter>,
}

/// Create a service with in-memory adapters (for testing).
#[must_use]
pub fn create_test_service(config: ComputeConfig) -> TestStack {
    let store = Arc::new(InMemoryStore::new());
    let bank = Arc::new(InMemoryBank::new(store.clone()));
    let engine = Arc::new(ScriptedEngine::new());
    let router = Arc::new(JournalingRouter::new(store.clone(), bank.clone()));
    let keeper = Keeper::new(
        store.clone(),
        engine.clone(),
        bank.clone(),
        Arc::new(EnvelopeIntrospector),
        router.clone(),
        config,
    );
    TestStack {
        service: ComputeService::new(keeper),
        store,
        bank,
        engine,
        router,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{program, Program, ProgramOutput, TxEnvelope};
    use crate::domain::entities::{SignMode, SignerMaterial};
    use crate::domain::legacy::EngineResponse;
    use crate::domain::messages::ContractResponse;
    use crate::domain::value_objects::Coins;
    use crate::errors::ErrorKind;

    const CODE: &[u8] = b"\0asm-noop";

    fn creator() -> Address {
        Address::new([7; 20])
    }

    fn tx(gas_limit: u64) -> TxContext {
        let material = SignerMaterial {
            sign_bytes: b"sign-doc".to_vec(),
            sign_mode: SignMode::Direct,
            mode_info_bytes: Vec::new(),
            pub_key_bytes: vec![2; 33],
            signature: vec![9; 64],
        };
        TxContext {
            block: BlockInfo::default(),
            tx_bytes: TxEnvelope::default()
                .with_signer(creator(), material)
                .encode()
                .unwrap(),
            gas_limit,
        }
    }

    fn noop() -> Program {
        program(|_| {
            Ok(ProgramOutput::Response(EngineResponse::Current(
                ContractResponse::default(),
            )))
        })
    }

    #[test]
    fn test_store_code_commits_and_counts() {
        let stack = create_test_service(ComputeConfig::default());
        stack.engine.register(CODE, noop());

        let outcome = stack
            .service
            .store_code(
                &tx(10_000_000),
                StoreCodeRequest {
                    creator: creator(),
                    code: CODE.to_vec(),
                    source: String::new(),
                    builder: String::new(),
                },
            )
            .unwrap();

        assert_eq!(outcome.value, 1);
        assert_eq!(outcome.gas_used, 2 * CODE.len() as u64);
        assert!(stack.service.code_info(1).unwrap().is_some());
        assert_eq!(stack.service.stats().successful_executions, 1);
        assert_eq!(stack.store.depth(), 0);
    }

    #[test]
    fn test_out_of_gas_is_counted_as_abort() {
        let stack = create_test_service(ComputeConfig::default());
        let err = stack
            .service
            .store_code(
                &tx(3),
                StoreCodeRequest {
                    creator: creator(),
                    code: CODE.to_vec(),
                    source: String::new(),
                    builder: String::new(),
                },
            )
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Fatal);
        assert_eq!(stack.service.stats().out_of_gas_aborts, 1);
        assert!(stack.service.code_info(1).unwrap().is_none());
    }

    #[test]
    fn test_failed_instantiate_rolls_back_sequences() {
        let stack = create_test_service(ComputeConfig::default());
        let err = stack
            .service
            .instantiate(
                &tx(10_000_000),
                InstantiateRequest {
                    code_id: 42,
                    creator: creator(),
                    init_msg: vec![0; 64],
                    label: "missing".into(),
                    deposit: Coins::empty(),
                },
            )
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(stack.service.stats().failed_executions, 1);
        assert!(stack.store.is_empty());
    }
}
