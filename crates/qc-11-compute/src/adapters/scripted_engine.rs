//! # Scripted Execution Engine
//!
//! Execution engine whose contracts are Rust closures registered per code.
//! Code bytes are stored and hashed like a real engine would (SHA-256 of the
//! uncompressed code); calling code without a registered program fails.
//!
//! Every call costs a fixed amount of engine gas on top of what the program
//! charges. A call that exceeds its budget fails and reports the whole
//! budget as used.

use crate::domain::entities::{CallKind, CodeCapabilities, Environment, VerificationContext};
use crate::domain::invariants::limits;
use crate::domain::legacy::EngineResponse;
use crate::domain::messages::Reply;
use crate::domain::value_objects::{Address, CodeHash};
use crate::errors::EngineError;
use crate::ports::outbound::{
    ContractStorage, EngineCall, EngineOutcome, ExecutionEngine, InstantiateOutput, Querier,
};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Magic prefix of a wasm module.
pub const WASM_MAGIC: &[u8; 4] = b"\0asm";

/// What a program sees of a call.
pub struct ProgramCall<'a> {
    /// Entry point.
    pub kind: CallKind,
    /// Call environment.
    pub env: &'a Environment,
    /// Call payload.
    pub msg: &'a [u8],
    /// Contract storage.
    pub store: &'a dyn ContractStorage,
    /// Nested queries.
    pub querier: &'a dyn Querier,
    /// Signing context of the call.
    pub verification: &'a VerificationContext,
    gas_limit: u64,
    gas_used: Cell<u64>,
}

impl ProgramCall<'_> {
    /// Charges engine gas.
    ///
    /// # Errors
    ///
    /// Fails once the budget is exceeded; the program should return the
    /// error unchanged.
    pub fn charge(&self, amount: u64) -> Result<(), String> {
        let used = self.gas_used.get().saturating_add(amount);
        self.gas_used.set(used);
        if used > self.gas_limit {
            return Err("out of gas".to_string());
        }
        Ok(())
    }

    /// Engine gas used so far.
    #[must_use]
    pub fn gas_used(&self) -> u64 {
        self.gas_used.get()
    }

    /// Engine gas budget of the call.
    #[must_use]
    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    /// The delivered reply, for reply calls.
    #[must_use]
    pub fn reply(&self) -> Option<Reply> {
        if self.kind != CallKind::Reply || self.msg.len() < limits::REPLY_PREFIX_LEN {
            return None;
        }
        serde_json::from_slice(&self.msg[limits::REPLY_PREFIX_LEN..]).ok()
    }
}

/// Output of a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramOutput {
    /// Response of instantiate, execute or reply.
    Response(EngineResponse),
    /// Result of a query.
    Data(Vec<u8>),
}

/// A contract program.
pub type Program = Arc<dyn Fn(&ProgramCall<'_>) -> Result<ProgramOutput, String> + Send + Sync>;

/// Wraps a closure as a [`Program`].
pub fn program<F>(f: F) -> Program
where
    F: Fn(&ProgramCall<'_>) -> Result<ProgramOutput, String> + Send + Sync + 'static,
{
    Arc::new(f)
}

struct Registered {
    program: Program,
    capabilities: CodeCapabilities,
}

/// Engine running registered closures.
pub struct ScriptedEngine {
    programs: RwLock<HashMap<CodeHash, Registered>>,
    codes: RwLock<HashMap<CodeHash, Vec<u8>>>,
    call_cost: u64,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEngine {
    /// Engine gas charged for every call.
    pub const DEFAULT_CALL_COST: u64 = 50_000;

    /// Create an engine with no programs.
    #[must_use]
    pub fn new() -> Self {
        Self::with_call_cost(Self::DEFAULT_CALL_COST)
    }

    /// Create an engine with a custom per-call cost.
    #[must_use]
    pub fn with_call_cost(call_cost: u64) -> Self {
        Self {
            programs: RwLock::new(HashMap::new()),
            codes: RwLock::new(HashMap::new()),
            call_cost,
        }
    }

    /// Hash of uncompressed code.
    #[must_use]
    pub fn code_hash(code: &[u8]) -> CodeHash {
        CodeHash::new(Sha256::digest(code).into())
    }

    /// Engine secret the engine derives for a contract.
    #[must_use]
    pub fn contract_key(address: &Address) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(b"contract_key");
        hasher.update(address.as_bytes());
        hasher.finalize().to_vec()
    }

    /// Registers the program run by `code`.
    pub fn register(&self, code: &[u8], program: Program) -> CodeHash {
        self.register_with_capabilities(code, program, CodeCapabilities::default())
    }

    /// Registers the program run by `code`, with explicit capabilities.
    pub fn register_with_capabilities(
        &self,
        code: &[u8],
        program: Program,
        capabilities: CodeCapabilities,
    ) -> CodeHash {
        let hash = Self::code_hash(code);
        self.programs.write().insert(
            hash,
            Registered {
                program,
                capabilities,
            },
        );
        hash
    }

    fn run(&self, call: EngineCall<'_>, kind: CallKind) -> EngineOutcome<ProgramOutput> {
        if !self.codes.read().contains_key(call.code_hash) {
            return EngineOutcome::err(format!("code {} not found", call.code_hash), 0);
        }
        let Some(program) = self
            .programs
            .read()
            .get(call.code_hash)
            .map(|r| Arc::clone(&r.program))
        else {
            return EngineOutcome::err(format!("no program for code {}", call.code_hash), 0);
        };

        let pc = ProgramCall {
            kind,
            env: call.env,
            msg: call.msg,
            store: call.store,
            querier: call.querier,
            verification: call.verification,
            gas_limit: call.gas_limit,
            gas_used: Cell::new(0),
        };

        let result = pc.charge(self.call_cost).and_then(|()| program(&pc));
        let used = pc.gas_used();
        trace!(
            kind = kind.as_str(),
            contract = %call.env.contract_address,
            used,
            limit = call.gas_limit,
            host_consumed = call.gas_meter.consumed(),
            "Ran program"
        );
        if used > call.gas_limit {
            return EngineOutcome::err("out of gas", call.gas_limit);
        }
        match result {
            Ok(output) => EngineOutcome::ok(output, used),
            Err(err) => EngineOutcome::err(err, used),
        }
    }
}

fn into_response(outcome: EngineOutcome<ProgramOutput>) -> EngineOutcome<EngineResponse> {
    let gas_used = outcome.gas_used;
    match outcome.result {
        Ok(ProgramOutput::Response(response)) => EngineOutcome::ok(response, gas_used),
        Ok(ProgramOutput::Data(_)) => EngineOutcome::err("program returned query data", gas_used),
        Err(err) => EngineOutcome::err(err.0, gas_used),
    }
}

impl ExecutionEngine for ScriptedEngine {
    fn create(&self, code: &[u8]) -> Result<CodeHash, EngineError> {
        if !code.starts_with(WASM_MAGIC) {
            return Err(EngineError::new("invalid wasm magic"));
        }
        let hash = Self::code_hash(code);
        self.codes.write().insert(hash, code.to_vec());
        Ok(hash)
    }

    fn analyze(&self, code_hash: &CodeHash) -> Result<CodeCapabilities, EngineError> {
        if !self.codes.read().contains_key(code_hash) {
            return Err(EngineError::new(format!("code {code_hash} not found")));
        }
        Ok(self
            .programs
            .read()
            .get(code_hash)
            .map(|r| r.capabilities.clone())
            .unwrap_or_default())
    }

    fn get_code(&self, code_hash: &CodeHash) -> Result<Vec<u8>, EngineError> {
        self.codes
            .read()
            .get(code_hash)
            .cloned()
            .ok_or_else(|| EngineError::new(format!("code {code_hash} not found")))
    }

    fn instantiate(&self, call: EngineCall<'_>) -> EngineOutcome<InstantiateOutput> {
        let contract = call.env.contract_address;
        let outcome = into_response(self.run(call, CallKind::Instantiate));
        EngineOutcome {
            result: outcome.result.map(|response| InstantiateOutput {
                response,
                contract_key: Self::contract_key(&contract),
            }),
            gas_used: outcome.gas_used,
        }
    }

    fn execute(&self, call: EngineCall<'_>, kind: CallKind) -> EngineOutcome<EngineResponse> {
        into_response(self.run(call, kind))
    }

    fn query(&self, call: EngineCall<'_>) -> EngineOutcome<Vec<u8>> {
        let outcome = self.run(call, CallKind::Query);
        let gas_used = outcome.gas_used;
        match outcome.result {
            Ok(ProgramOutput::Data(data)) => EngineOutcome::ok(data, gas_used),
            Ok(ProgramOutput::Response(_)) => {
                EngineOutcome::err("query returned a response", gas_used)
            }
            Err(err) => EngineOutcome::err(err.0, gas_used),
        }
    }
}

impl std::fmt::Debug for ScriptedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedEngine")
            .field("codes", &self.codes.read().len())
            .field("programs", &self.programs.read().len())
            .field("call_cost", &self.call_cost)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_rejects_non_wasm() {
        let engine = ScriptedEngine::new();
        assert!(engine.create(b"not wasm").is_err());
        let hash = engine.create(b"\0asm-code").unwrap();
        assert_eq!(hash, ScriptedEngine::code_hash(b"\0asm-code"));
        assert_eq!(engine.get_code(&hash).unwrap(), b"\0asm-code".to_vec());
    }

    #[test]
    fn test_analyze_reports_registered_capabilities() {
        let engine = ScriptedEngine::new();
        let hash = engine.register_with_capabilities(
            b"\0asm-ibc",
            program(|_| Ok(ProgramOutput::Data(Vec::new()))),
            CodeCapabilities {
                has_ibc_entry_points: true,
                required_features: vec!["stargate".into()],
            },
        );
        assert!(engine.analyze(&hash).is_err());
        engine.create(b"\0asm-ibc").unwrap();
        assert!(engine.analyze(&hash).unwrap().has_ibc_entry_points);
    }

    #[test]
    fn test_contract_key_is_deterministic() {
        let a = Address::new([1; 20]);
        assert_eq!(ScriptedEngine::contract_key(&a), ScriptedEngine::contract_key(&a));
        assert_ne!(
            ScriptedEngine::contract_key(&a),
            ScriptedEngine::contract_key(&Address::new([2; 20]))
        );
    }
}
