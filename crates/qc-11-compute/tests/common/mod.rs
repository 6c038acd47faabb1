//! Shared harness for the integration tests.
//!
//! Contracts are scripted closures. Call payloads carry a 64-byte prefix
//! (standing in for the encryption header) followed by the JSON of an
//! [`Action`] telling the program what to do.

#![allow(dead_code)]

use qc_11_compute::prelude::*;
use serde::{Deserialize, Serialize};

// =============================================================================
// PAYLOADS
// =============================================================================

/// Prefix every contract payload starts with.
pub const PREFIX: [u8; 64] = [0xEE; 64];

/// Denomination used throughout the tests.
pub const DENOM: &str = "ucpu";

/// What a scripted contract does when instantiated or executed.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Return this current-schema response.
    Respond(ContractResponse),
    /// Return this legacy-schema response.
    RespondLegacy(LegacyResponse),
    /// Write `dirty` to storage, then fail.
    Fail(String),
    /// Burn this much engine gas, then return an empty response.
    Burn(u64),
}

/// Encodes `action` behind the payload prefix.
pub fn payload(action: &Action) -> Vec<u8> {
    let mut msg = PREFIX.to_vec();
    msg.extend(serde_json::to_vec(action).unwrap());
    msg
}

/// Payload returning an empty current response.
pub fn noop() -> Vec<u8> {
    payload(&Action::Respond(ContractResponse::new()))
}

fn store_err(err: impl ToString) -> String {
    err.to_string()
}

fn decode(call: &ProgramCall<'_>) -> Result<Action, String> {
    if call.msg.len() < PREFIX.len() {
        return Err("payload without prefix".to_string());
    }
    serde_json::from_slice(&call.msg[PREFIX.len()..]).map_err(store_err)
}

// =============================================================================
// PROGRAMS
// =============================================================================

/// General-purpose contract.
///
/// - instantiate/execute: records the entry point under `last_call` and runs
///   the [`Action`] in the payload
/// - reply: records `reply:<id>` as `ok`/`err` and returns `reply-<id>`
/// - query: returns the storage value under the query bytes
pub fn echo_program() -> Program {
    program(|call| match call.kind {
        CallKind::Instantiate | CallKind::Execute => {
            call.store
                .set(b"last_call", call.kind.as_str().as_bytes())
                .map_err(store_err)?;
            match decode(call)? {
                Action::Respond(response) => {
                    Ok(ProgramOutput::Response(EngineResponse::Current(response)))
                }
                Action::RespondLegacy(response) => {
                    Ok(ProgramOutput::Response(EngineResponse::Legacy(response)))
                }
                Action::Fail(reason) => {
                    call.store.set(b"dirty", b"1").map_err(store_err)?;
                    Err(reason)
                }
                Action::Burn(amount) => {
                    call.charge(amount)?;
                    Ok(ProgramOutput::Response(EngineResponse::Current(
                        ContractResponse::new(),
                    )))
                }
            }
        }
        CallKind::Reply => {
            let reply = call.reply().ok_or("malformed reply")?;
            let outcome = if reply.result.is_ok() { "ok" } else { "err" };
            call.store
                .set(format!("reply:{}", reply.id).as_bytes(), outcome.as_bytes())
                .map_err(store_err)?;
            let response = ContractResponse::new()
                .add_attribute("reply_id", reply.id.to_string())
                .set_data(format!("reply-{}", reply.id).into_bytes());
            Ok(ProgramOutput::Response(EngineResponse::Current(response)))
        }
        CallKind::Query => {
            call.store.set(b"queried", b"1").map_err(store_err)?;
            let value = call.store.get(call.msg).map_err(store_err)?;
            Ok(ProgramOutput::Data(value.unwrap_or_default()))
        }
    })
}

/// [`echo_program`] whose reply to submessage `id` emits `msg`.
pub fn reply_emitting_program(id: u64, msg: CosmosMsg) -> Program {
    let echo = echo_program();
    program(move |call| match call.reply() {
        Some(reply) if reply.id == id => {
            let response = ContractResponse::new()
                .add_attribute("reply_id", reply.id.to_string())
                .add_message(msg.clone());
            Ok(ProgramOutput::Response(EngineResponse::Current(response)))
        }
        _ => echo(call),
    })
}

/// [`echo_program`] that also stores, per entry point, the JSON of its
/// verification context under `seen:<entry>` and its raw payload under
/// `payload:<entry>`.
pub fn recording_program() -> Program {
    let echo = echo_program();
    program(move |call| {
        let entry = call.kind.as_str();
        let seen = serde_json::to_vec(call.verification).map_err(store_err)?;
        call.store
            .set(format!("seen:{entry}").as_bytes(), &seen)
            .map_err(store_err)?;
        call.store
            .set(format!("payload:{entry}").as_bytes(), call.msg)
            .map_err(store_err)?;
        echo(call)
    })
}

/// Contract answering every reply with a legacy response.
pub fn legacy_reply_program() -> Program {
    program(|call| match call.kind {
        CallKind::Reply => Ok(ProgramOutput::Response(EngineResponse::Legacy(
            LegacyResponse::default(),
        ))),
        _ => match decode(call)? {
            Action::Respond(response) => {
                Ok(ProgramOutput::Response(EngineResponse::Current(response)))
            }
            _ => Err("unsupported action".to_string()),
        },
    })
}

/// Contract whose queries query itself until the depth limit stops them.
/// Returns the deepest depth reached.
pub fn recursive_query_program() -> Program {
    program(|call| match call.kind {
        CallKind::Query => {
            match call.querier.query_smart(&call.env.contract_address, call.msg) {
                Ok(data) => Ok(ProgramOutput::Data(data)),
                Err(err) if err.kind() == ErrorKind::QueryDepthExceeded => Ok(
                    ProgramOutput::Data(call.env.query_depth.to_string().into_bytes()),
                ),
                Err(err) => Err(err.to_string()),
            }
        }
        _ => Ok(ProgramOutput::Response(EngineResponse::Current(
            ContractResponse::new(),
        ))),
    })
}

// =============================================================================
// HARNESS
// =============================================================================

/// Code of the echo contract.
pub const ECHO_CODE: &[u8] = b"\0asm-echo";

/// Plenty of gas for any single transaction in these tests.
pub const TX_GAS: u64 = 50_000_000;

/// Installs a test subscriber honoring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Default transaction signer.
pub fn creator() -> Address {
    Address::new([7; 20])
}

/// An address no test instantiates or funds.
pub fn recipient() -> Address {
    Address::new([9; 20])
}

/// Coins of the test denomination.
pub fn coins(amount: u128) -> Coins {
    Coins::from(vec![Coin::new(amount, DENOM)])
}

/// Signing material of every test transaction signer.
pub fn signer_material() -> SignerMaterial {
    SignerMaterial {
        sign_bytes: b"sign-doc".to_vec(),
        sign_mode: SignMode::Direct,
        mode_info_bytes: vec![1],
        pub_key_bytes: vec![2; 33],
        signature: vec![3; 64],
    }
}

/// A service over in-memory adapters plus shortcuts for common calls.
pub struct Harness {
    pub stack: TestStack,
    pub block: BlockInfo,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ComputeConfig::default())
    }

    pub fn with_config(config: ComputeConfig) -> Self {
        init_tracing();
        Self {
            stack: create_test_service(config),
            block: BlockInfo::default(),
        }
    }

    pub fn service(&self) -> &ComputeService {
        &self.stack.service
    }

    pub fn keeper(&self) -> &Keeper {
        self.stack.service.keeper()
    }

    /// Transaction signed by `signer`.
    pub fn tx_signed_by(&self, signer: Address, gas_limit: u64) -> TxContext {
        TxContext {
            block: self.block.clone(),
            tx_bytes: TxEnvelope::default()
                .with_signer(signer, signer_material())
                .encode()
                .unwrap(),
            gas_limit,
        }
    }

    /// Transaction signed by [`creator`].
    pub fn tx(&self, gas_limit: u64) -> TxContext {
        self.tx_signed_by(creator(), gas_limit)
    }

    /// Registers `program` for `code` and uploads the code.
    pub fn upload(&self, code: &[u8], program: Program) -> CodeId {
        self.stack.engine.register(code, program);
        self.service()
            .store_code(
                &self.tx(TX_GAS),
                StoreCodeRequest {
                    creator: creator(),
                    code: code.to_vec(),
                    source: String::new(),
                    builder: String::new(),
                },
            )
            .unwrap()
            .value
    }

    pub fn try_instantiate(
        &self,
        code_id: CodeId,
        label: &str,
        init_msg: Vec<u8>,
        deposit: Coins,
    ) -> Result<TxOutcome<Instantiated>, ComputeError> {
        self.service().instantiate(
            &self.tx(TX_GAS),
            InstantiateRequest {
                code_id,
                creator: creator(),
                init_msg,
                label: label.to_string(),
                deposit,
            },
        )
    }

    /// Instantiates `code_id` with an empty response and no deposit.
    pub fn instantiate(&self, code_id: CodeId, label: &str) -> Address {
        self.try_instantiate(code_id, label, noop(), Coins::empty())
            .unwrap()
            .value
            .address
    }

    pub fn try_execute(
        &self,
        contract: Address,
        action: &Action,
        gas_limit: u64,
    ) -> Result<TxOutcome<Option<Binary>>, ComputeError> {
        self.service().execute(
            &self.tx(gas_limit),
            ExecuteRequest {
                contract,
                sender: creator(),
                msg: payload(action),
                funds: Coins::empty(),
            },
        )
    }

    pub fn execute(&self, contract: Address, action: &Action) -> TxOutcome<Option<Binary>> {
        self.try_execute(contract, action, TX_GAS).unwrap()
    }

    pub fn fund(&self, address: &Address, amount: u128) {
        self.stack.bank.mint(address, &coins(amount)).unwrap();
    }

    pub fn balance(&self, address: &Address) -> U256 {
        self.stack.bank.balance(address, DENOM).unwrap()
    }

    /// Raw storage value of `contract` as a string.
    pub fn storage(&self, contract: &Address, key: &str) -> Option<String> {
        self.keeper()
            .query_raw(contract, key.as_bytes())
            .unwrap()
            .map(|v| String::from_utf8(v).unwrap())
    }

    /// Raw storage value of `contract`.
    pub fn storage_bytes(&self, contract: &Address, key: &str) -> Option<Vec<u8>> {
        self.keeper().query_raw(contract, key.as_bytes()).unwrap()
    }

    /// Verification context `contract` last saw at `entry`, as stored by
    /// [`recording_program`].
    pub fn seen_verification(&self, contract: &Address, entry: &str) -> VerificationContext {
        let bytes = self
            .storage_bytes(contract, &format!("seen:{entry}"))
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Payloads of the custom messages the router journaled, in order.
    pub fn journaled_custom(&self) -> Vec<String> {
        self.stack
            .router
            .journal()
            .unwrap()
            .into_iter()
            .filter_map(|entry| match entry.msg {
                CosmosMsg::Custom(bytes) => Some(String::from_utf8(bytes.into_vec()).unwrap()),
                _ => None,
            })
            .collect()
    }
}

/// Submessage executing `contract` with `action`.
pub fn execute_msg(contract: Address, action: &Action) -> WasmMsg {
    WasmMsg::Execute {
        contract_addr: contract,
        code_hash: String::new(),
        msg: Binary::from(payload(action)),
        funds: Coins::empty(),
        callback_signature: None,
    }
}

/// Custom message carrying `text`.
pub fn custom(text: &str) -> CosmosMsg {
    CosmosMsg::Custom(Binary::from(text.as_bytes().to_vec()))
}

/// Events of type `ty` emitted by `contract`.
pub fn events_of<'a>(events: &'a [Event], ty: &str, contract: &Address) -> Vec<&'a Event> {
    let address = contract.to_string();
    events
        .iter()
        .filter(|e| e.ty == ty && e.attribute("contract_address") == Some(address.as_str()))
        .collect()
}
