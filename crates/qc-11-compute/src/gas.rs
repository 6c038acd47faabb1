//! # Gas Bridge
//!
//! Host gas is metered per transaction by [`GasMeter`]. The execution engine
//! accounts in finer units: one host unit is `multiplier` engine units.
//!
//! - Before a call the engine gets `remaining × multiplier`, clamped to the
//!   per-call ceiling.
//! - After a call `used / multiplier + 1` host units are charged. Reaching
//!   the meter limit at that point aborts the transaction.

use crate::config::ComputeConfig;
use crate::errors::FatalError;
use std::cell::Cell;

// =============================================================================
// HOST GAS METER
// =============================================================================

/// Host gas meter of one call chain. Consumption only ever grows.
#[derive(Debug)]
pub struct GasMeter {
    limit: u64,
    consumed: Cell<u64>,
}

impl GasMeter {
    /// Creates a meter with the given limit.
    #[must_use]
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            consumed: Cell::new(0),
        }
    }

    /// Creates a meter that never runs out.
    #[must_use]
    pub fn infinite() -> Self {
        Self::new(u64::MAX)
    }

    /// Meter limit.
    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Gas consumed so far.
    #[must_use]
    pub fn consumed(&self) -> u64 {
        self.consumed.get()
    }

    /// Gas left before the limit.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.consumed())
    }

    /// Returns true once consumption reached the limit.
    #[must_use]
    pub fn is_out_of_gas(&self) -> bool {
        self.consumed() >= self.limit
    }

    /// Charges `amount`.
    ///
    /// # Errors
    ///
    /// Fails if consumption goes past the limit. The charge is recorded
    /// regardless.
    pub fn consume(&self, amount: u64, descriptor: &str) -> Result<(), FatalError> {
        let consumed = self.consumed().saturating_add(amount);
        self.consumed.set(consumed);
        if consumed > self.limit {
            return Err(FatalError::OutOfGas {
                descriptor: descriptor.to_string(),
                limit: self.limit,
                consumed,
            });
        }
        Ok(())
    }
}

// =============================================================================
// BRIDGE
// =============================================================================

/// Translates between host and engine gas units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasBridge {
    multiplier: u64,
    max_engine_gas: u64,
}

impl GasBridge {
    /// Descriptor of the post-call charge.
    pub const CHARGE_DESCRIPTOR: &'static str = "wasm contract";

    /// Descriptor of the abort raised when a call drains the meter.
    pub const EXHAUSTED_DESCRIPTOR: &'static str = "wasm function execution";

    /// Creates a bridge. A zero multiplier is treated as one.
    #[must_use]
    pub fn new(multiplier: u64, max_engine_gas: u64) -> Self {
        Self {
            multiplier: multiplier.max(1),
            max_engine_gas,
        }
    }

    /// Bridge for the given configuration.
    #[must_use]
    pub fn from_config(config: &ComputeConfig) -> Self {
        Self::new(config.gas_multiplier, config.max_engine_gas)
    }

    /// Engine units per host unit.
    #[must_use]
    pub fn multiplier(&self) -> u64 {
        self.multiplier
    }

    /// Engine gas ceiling per call.
    #[must_use]
    pub fn max_engine_gas(&self) -> u64 {
        self.max_engine_gas
    }

    /// Engine budget for a call given the host meter.
    #[must_use]
    pub fn budget_for_call(&self, meter: &GasMeter) -> u64 {
        meter
            .remaining()
            .saturating_mul(self.multiplier)
            .min(self.max_engine_gas)
    }

    /// Host units charged for `engine_used`.
    #[must_use]
    pub fn to_host(&self, engine_used: u64) -> u64 {
        (engine_used / self.multiplier).saturating_add(1)
    }

    /// Charges the host meter for `engine_used` and returns the host units.
    ///
    /// # Errors
    ///
    /// Fails if the meter is driven to or past its limit.
    pub fn charge_host(&self, meter: &GasMeter, engine_used: u64) -> Result<u64, FatalError> {
        let host = self.to_host(engine_used);
        meter.consume(host, Self::CHARGE_DESCRIPTOR)?;
        if meter.is_out_of_gas() {
            return Err(FatalError::OutOfGas {
                descriptor: Self::EXHAUSTED_DESCRIPTOR.to_string(),
                limit: meter.limit(),
                consumed: meter.consumed(),
            });
        }
        Ok(host)
    }

    /// View of `meter` reporting consumption in engine units.
    #[must_use]
    pub fn multiplied<'a>(&self, meter: &'a GasMeter) -> MultipliedGasMeter<'a> {
        MultipliedGasMeter {
            meter,
            multiplier: self.multiplier,
        }
    }
}

/// Host meter as seen by the engine: every read is multiplied.
#[derive(Debug, Clone, Copy)]
pub struct MultipliedGasMeter<'a> {
    meter: &'a GasMeter,
    multiplier: u64,
}

impl MultipliedGasMeter<'_> {
    /// Host consumption in engine units.
    #[must_use]
    pub fn consumed(&self) -> u64 {
        self.meter.consumed().saturating_mul(self.multiplier)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge() -> GasBridge {
        GasBridge::new(1000, 10_000_000_000)
    }

    #[test]
    fn test_budget_is_clamped() {
        let meter = GasMeter::new(u64::MAX);
        assert_eq!(bridge().budget_for_call(&meter), 10_000_000_000);

        let small = GasMeter::new(500);
        assert_eq!(bridge().budget_for_call(&small), 500_000);
    }

    #[test]
    fn test_charge_rounds_up_by_one() {
        let meter = GasMeter::new(1_000_000);
        assert_eq!(bridge().charge_host(&meter, 0).unwrap(), 1);
        assert_eq!(bridge().charge_host(&meter, 2_999).unwrap(), 3);
        assert_eq!(meter.consumed(), 4);
    }

    #[test]
    fn test_charge_to_exact_limit_is_fatal() {
        let meter = GasMeter::new(10);
        let err = bridge().charge_host(&meter, 9_000).unwrap_err();
        assert!(matches!(err, FatalError::OutOfGas { consumed: 10, .. }));
    }

    #[test]
    fn test_consume_past_limit_fails_but_records() {
        let meter = GasMeter::new(5);
        assert!(meter.consume(3, "a").is_ok());
        assert!(meter.consume(3, "b").is_err());
        assert_eq!(meter.consumed(), 6);
        assert_eq!(meter.remaining(), 0);
    }

    #[test]
    fn test_multiplied_view() {
        let meter = GasMeter::new(100);
        meter.consume(7, "x").unwrap();
        assert_eq!(bridge().multiplied(&meter).consumed(), 7_000);
    }
}
