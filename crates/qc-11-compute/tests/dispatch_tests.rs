//! Submessage dispatch and reply delivery, end to end through the service.

mod common;

use common::*;
use qc_11_compute::prelude::*;

// =============================================================================
// TEST HELPERS
// =============================================================================

/// Harness with two echo contracts, `parent` and `child`.
fn setup() -> (Harness, Address, Address) {
    let h = Harness::new();
    let code_id = h.upload(ECHO_CODE, echo_program());
    let parent = h.instantiate(code_id, "parent");
    let child = h.instantiate(code_id, "child");
    (h, parent, child)
}

fn respond(response: ContractResponse) -> Action {
    Action::Respond(response)
}

// =============================================================================
// ORDERING & ATOMICITY
// =============================================================================

#[test]
fn test_submessages_dispatch_depth_first() {
    let (h, parent, child) = setup();
    let child_action = respond(ContractResponse::new().add_message(custom("C")));
    let action = respond(
        ContractResponse::new()
            .add_message(custom("A"))
            .add_message(execute_msg(child, &child_action))
            .add_message(custom("B")),
    );

    let outcome = h.execute(parent, &action);

    assert_eq!(h.journaled_custom(), vec!["A", "C", "B"]);
    assert_eq!(events_of(&outcome.events, "execute", &parent).len(), 1);
    assert_eq!(events_of(&outcome.events, "execute", &child).len(), 1);
    let parent_pos = outcome.events.iter().position(|e| e.ty == "execute").unwrap();
    let child_pos = outcome.events.iter().rposition(|e| e.ty == "execute").unwrap();
    assert!(parent_pos < child_pos);
}

#[test]
fn test_reply_submessages_run_before_the_next_submessage() {
    let h = Harness::new();
    let code_id = h.upload(b"\0asm-relay", reply_emitting_program(1, custom("C")));
    let parent = h.instantiate(code_id, "relay");
    let action = respond(
        ContractResponse::new()
            .add_submessage(SubMsg::reply_on_success(custom("A"), 1))
            .add_message(custom("B")),
    );

    let outcome = h.execute(parent, &action);

    assert_eq!(h.journaled_custom(), vec!["A", "C", "B"]);
    assert_eq!(events_of(&outcome.events, "reply", &parent).len(), 1);
}

#[test]
fn test_failed_submessage_without_reply_aborts_the_call() {
    let (h, parent, child) = setup();
    let action = respond(
        ContractResponse::new()
            .add_message(custom("A"))
            .add_message(execute_msg(child, &Action::Fail("boom".into()))),
    );

    let err = h.try_execute(parent, &action, TX_GAS).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExecuteFailed);
    assert!(!err.is_fatal());
    assert!(h.journaled_custom().is_empty());
    assert_eq!(h.storage(&parent, "last_call").as_deref(), Some("instantiate"));
    assert_eq!(h.storage(&child, "dirty"), None);
    assert_eq!(h.service().stats().failed_executions, 1);
}

#[test]
fn test_reply_on_error_discards_child_state_and_events() {
    let (h, parent, child) = setup();
    let action = respond(ContractResponse::new().add_submessage(SubMsg::reply_on_error(
        execute_msg(child, &Action::Fail("boom".into())),
        7,
    )));

    let outcome = h.execute(parent, &action);

    assert_eq!(outcome.value, Some(Binary::from(b"reply-7".to_vec())));
    assert_eq!(h.storage(&parent, "reply:7").as_deref(), Some("err"));
    assert_eq!(h.storage(&parent, "last_call").as_deref(), Some("execute"));
    assert_eq!(h.storage(&child, "dirty"), None);
    assert!(events_of(&outcome.events, "execute", &child).is_empty());
    assert_eq!(events_of(&outcome.events, "reply", &parent).len(), 1);
}

#[test]
fn test_reply_on_error_is_skipped_on_success() {
    let (h, parent, child) = setup();
    let action = respond(
        ContractResponse::new()
            .set_data(b"own".to_vec())
            .add_submessage(SubMsg::reply_on_error(execute_msg(child, &Action::Burn(1)), 2)),
    );

    let outcome = h.execute(parent, &action);

    assert_eq!(outcome.value, Some(Binary::from(b"own".to_vec())));
    assert_eq!(h.storage(&parent, "reply:2"), None);
    assert_eq!(events_of(&outcome.events, "execute", &child).len(), 1);
}

// =============================================================================
// REPLY DATA
// =============================================================================

#[test]
fn test_reply_on_success_overrides_data() {
    let (h, parent, _) = setup();
    h.fund(&parent, 10);
    let send = BankMsg::Send {
        to_address: recipient(),
        amount: coins(5),
    };
    let action = respond(
        ContractResponse::new()
            .set_data(b"own".to_vec())
            .add_submessage(SubMsg::reply_on_success(send, 1)),
    );

    let outcome = h.execute(parent, &action);

    assert_eq!(outcome.value, Some(Binary::from(b"reply-1".to_vec())));
    assert_eq!(h.balance(&recipient()), U256::from(5u64));
    assert_eq!(h.balance(&parent), U256::from(5u64));
    let transfer = outcome.events.iter().find(|e| e.ty == "transfer").unwrap();
    assert_eq!(transfer.attribute("amount"), Some("5ucpu"));
}

#[test]
fn test_fire_and_forget_keeps_contract_data() {
    let (h, parent, _) = setup();
    let action = respond(
        ContractResponse::new()
            .set_data(b"own".to_vec())
            .add_message(custom("x")),
    );

    let outcome = h.execute(parent, &action);

    assert_eq!(outcome.value, Some(Binary::from(b"own".to_vec())));
    assert_eq!(h.journaled_custom(), vec!["x"]);
}

#[test]
fn test_last_reply_with_data_wins() {
    let (h, parent, _) = setup();
    let action = respond(
        ContractResponse::new()
            .add_submessage(SubMsg::reply_always(custom("a"), 1))
            .add_submessage(SubMsg::reply_always(custom("b"), 2)),
    );

    let outcome = h.execute(parent, &action);

    assert_eq!(outcome.value, Some(Binary::from(b"reply-2".to_vec())));
    assert_eq!(h.storage(&parent, "reply:1").as_deref(), Some("ok"));
    assert_eq!(h.storage(&parent, "reply:2").as_deref(), Some("ok"));
}

#[test]
fn test_instantiate_submessage_returns_new_address() {
    let h = Harness::new();
    let code_id = h.upload(ECHO_CODE, echo_program());
    let parent = h.instantiate(code_id, "parent");
    let code_hash = h.service().code_info(code_id).unwrap().unwrap().code_hash;
    let msg = WasmMsg::Instantiate {
        code_id,
        code_hash: code_hash.to_string(),
        msg: Binary::from(payload(&respond(ContractResponse::new().set_data(b"hi".to_vec())))),
        funds: Coins::empty(),
        label: "spawned".into(),
        callback_signature: None,
    };

    h.execute(parent, &respond(ContractResponse::new().add_message(msg)));

    let spawned = h.service().contract_address("spawned").unwrap().unwrap();
    let record = h.service().contract_info(&spawned).unwrap().unwrap();
    assert_eq!(record.creator, parent);
    assert_eq!(spawned, derive_contract_address(code_id, 2, &parent));
}

#[test]
fn test_code_hash_mismatch_fails_submessage() {
    let (h, parent, child) = setup();
    let msg = WasmMsg::Execute {
        contract_addr: child,
        code_hash: "00".repeat(32),
        msg: Binary::from(noop()),
        funds: Coins::empty(),
        callback_signature: None,
    };

    let err = h
        .try_execute(parent, &respond(ContractResponse::new().add_message(msg)), TX_GAS)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Invalid);
}

// =============================================================================
// GAS LIMITS
// =============================================================================

#[test]
fn test_gas_limited_submessage_out_of_gas_is_replied() {
    let (h, parent, child) = setup();
    let action = respond(ContractResponse::new().add_submessage(
        SubMsg::reply_on_error(execute_msg(child, &Action::Burn(1)), 3).with_gas_limit(1_000),
    ));

    let outcome = h.execute(parent, &action);

    assert_eq!(h.storage(&parent, "reply:3").as_deref(), Some("err"));
    assert_eq!(outcome.value, Some(Binary::from(b"reply-3".to_vec())));
    assert_eq!(h.service().stats().out_of_gas_aborts, 0);
}

#[test]
fn test_gas_limited_submessage_without_reply_fails_softly() {
    let (h, parent, child) = setup();
    let action = respond(
        ContractResponse::new()
            .add_submessage(SubMsg::new(execute_msg(child, &Action::Burn(1))).with_gas_limit(1_000)),
    );

    let err = h.try_execute(parent, &action, TX_GAS).unwrap_err();

    assert!(!err.is_fatal());
    assert_eq!(err.kind(), ErrorKind::ExecuteFailed);
    assert_eq!(h.service().stats().failed_executions, 1);
    assert_eq!(h.service().stats().out_of_gas_aborts, 0);
}

#[test]
fn test_gas_limited_submessage_charges_parent_at_most_its_limit() {
    let (h, parent, child) = setup();
    let limited = respond(ContractResponse::new().add_submessage(
        SubMsg::reply_on_error(execute_msg(child, &Action::Burn(1)), 3).with_gas_limit(1_000),
    ));
    let baseline = respond(
        ContractResponse::new().add_submessage(SubMsg::reply_always(custom("x"), 3)),
    );

    let limited_gas = h.execute(parent, &limited).gas_used;
    let baseline_gas = h.execute(parent, &baseline).gas_used;

    assert!(limited_gas <= baseline_gas + 1_000);
    assert!(limited_gas >= baseline_gas);
}

#[test]
fn test_unlimited_submessage_out_of_gas_aborts_transaction() {
    let (h, parent, child) = setup();
    let action = respond(ContractResponse::new().add_submessage(SubMsg::reply_on_error(
        execute_msg(child, &Action::Burn(1)),
        4,
    )));

    let err = h.try_execute(parent, &action, 60_000).unwrap_err();

    assert!(err.is_fatal());
    assert_eq!(err.kind(), ErrorKind::Fatal);
    assert_eq!(h.storage(&parent, "reply:4"), None);
    assert_eq!(h.service().stats().out_of_gas_aborts, 1);
}

#[test]
fn test_gas_limit_above_remaining_gas_aborts_transaction() {
    let (h, parent, child) = setup();
    let burn = execute_msg(child, &Action::Burn(10_000_000_000));
    let submessages = [
        SubMsg::new(burn.clone()).with_gas_limit(1_000_000_000),
        SubMsg::reply_on_error(burn, 6).with_gas_limit(1_000_000_000),
    ];

    for (aborts, submessage) in (1..).zip(submessages) {
        let action = respond(ContractResponse::new().add_submessage(submessage));
        let err = h.try_execute(parent, &action, 150_000).unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(err.kind(), ErrorKind::Fatal);
        assert_eq!(h.service().stats().out_of_gas_aborts, aborts);
    }
    assert_eq!(h.storage(&parent, "reply:6"), None);
    assert_eq!(h.service().stats().failed_executions, 0);
}

// =============================================================================
// CALL DEPTH
// =============================================================================

#[test]
fn test_self_recursion_hits_call_depth_limit() {
    let h = Harness::with_config(ComputeConfig {
        max_call_depth: 3,
        ..ComputeConfig::default()
    });
    let code_id = h.upload(ECHO_CODE, echo_program());
    let contract = h.instantiate(code_id, "loop");

    let mut action = respond(ContractResponse::new());
    for _ in 0..4 {
        action = respond(ContractResponse::new().add_message(execute_msg(contract, &action)));
    }

    let err = h.try_execute(contract, &action, TX_GAS).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CallDepthExceeded);
}

#[test]
fn test_nesting_within_call_depth_limit_succeeds() {
    let h = Harness::with_config(ComputeConfig {
        max_call_depth: 3,
        ..ComputeConfig::default()
    });
    let code_id = h.upload(ECHO_CODE, echo_program());
    let contract = h.instantiate(code_id, "loop");

    let mut action = respond(ContractResponse::new());
    for _ in 0..2 {
        action = respond(ContractResponse::new().add_message(execute_msg(contract, &action)));
    }

    let outcome = h.execute(contract, &action);

    assert_eq!(events_of(&outcome.events, "execute", &contract).len(), 3);
}

// =============================================================================
// ROUTED MESSAGES
// =============================================================================

#[test]
fn test_ibc_message_requires_bound_port() {
    let (h, parent, _) = setup();
    let msg = IbcMsg::CloseChannel {
        channel_id: "channel-0".into(),
    };

    let err = h
        .try_execute(parent, &respond(ContractResponse::new().add_message(msg)), TX_GAS)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Router);
}

#[test]
fn test_ibc_contract_gets_port_and_routes_packets() {
    let h = Harness::new();
    let code = b"\0asm-ibc";
    h.stack.engine.register_with_capabilities(
        code,
        echo_program(),
        CodeCapabilities {
            has_ibc_entry_points: true,
            required_features: Vec::new(),
        },
    );
    let code_id = h
        .service()
        .store_code(
            &h.tx(TX_GAS),
            StoreCodeRequest {
                creator: creator(),
                code: code.to_vec(),
                source: String::new(),
                builder: String::new(),
            },
        )
        .unwrap()
        .value;
    let contract = h.instantiate(code_id, "ibc");
    let record = h.service().contract_info(&contract).unwrap().unwrap();
    assert_eq!(record.ibc_port_id, Some(ibc_port_id(&contract)));

    let msg = IbcMsg::CloseChannel {
        channel_id: "channel-0".into(),
    };
    h.execute(contract, &respond(ContractResponse::new().add_message(msg)));

    let journal = h.stack.router.journal().unwrap();
    assert_eq!(journal.len(), 1);
    assert_eq!(journal[0].ibc_port.as_deref(), Some(ibc_port_id(&contract).as_str()));
}
