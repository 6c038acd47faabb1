//! Property tests for the gas bridge, the host meter and address derivation.

use proptest::prelude::*;
use qc_11_compute::prelude::*;

proptest! {
    #[test]
    fn budget_never_exceeds_ceiling(
        limit in 0u64..u64::MAX / 2,
        consumed in 0u64..1_000_000_000,
        multiplier in 1u64..10_000,
        ceiling in 1u64..u64::MAX,
    ) {
        let bridge = GasBridge::new(multiplier, ceiling);
        let meter = GasMeter::new(limit);
        let _ = meter.consume(consumed, "setup");
        let budget = bridge.budget_for_call(&meter);
        prop_assert!(budget <= ceiling);
        prop_assert!(budget <= meter.remaining().saturating_mul(multiplier));
    }

    #[test]
    fn every_engine_call_costs_host_gas(used in 0u64..u64::MAX, multiplier in 1u64..10_000) {
        let bridge = GasBridge::new(multiplier, u64::MAX);
        let host = bridge.to_host(used);
        prop_assert!(host >= 1);
        prop_assert_eq!(host, used / multiplier + 1);
    }

    #[test]
    fn consumption_is_monotonic(charges in proptest::collection::vec(0u64..10_000, 0..32)) {
        let meter = GasMeter::new(50_000);
        let mut last = meter.consumed();
        for charge in charges {
            let result = meter.consume(charge, "step");
            prop_assert!(meter.consumed() >= last);
            prop_assert_eq!(result.is_err(), meter.consumed() > meter.limit());
            last = meter.consumed();
        }
    }

    #[test]
    fn contract_addresses_are_deterministic(
        code_id in 1u64..1_000,
        instance in 1u64..1_000_000,
        creator in any::<[u8; 20]>(),
    ) {
        let creator = Address::new(creator);
        prop_assert_eq!(
            derive_contract_address(code_id, instance, &creator),
            derive_contract_address(code_id, instance, &creator)
        );
        prop_assert_ne!(
            derive_contract_address(code_id, instance, &creator),
            derive_contract_address(code_id, instance + 1, &creator)
        );
    }

    #[test]
    fn ibc_ports_round_trip(bytes in any::<[u8; 20]>()) {
        let contract = Address::new(bytes);
        let port = ibc_port_id(&contract);
        prop_assert!(port.starts_with("wasm."));
        prop_assert_eq!(
            qc_11_compute::domain::services::contract_from_port_id(&port),
            Some(contract)
        );
    }
}

#[test]
fn test_charge_reaching_limit_is_fatal() {
    let bridge = GasBridge::new(1_000, u64::MAX);
    let meter = GasMeter::new(10);
    assert!(bridge.charge_host(&meter, 8_000).is_ok());
    assert_eq!(meter.consumed(), 9);
    assert!(bridge.charge_host(&meter, 0).is_err());
    assert!(meter.is_out_of_gas());
}
