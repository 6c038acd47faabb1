//! # Call Context
//!
//! State threaded through one call chain: block information, the raw
//! transaction, the active gas meter and event log, and the explicit call
//! stack bounding recursion.
//!
//! A [`CallContext`] is a bundle of borrows and is `Copy`. Nested calls
//! derive a new context with a child meter or child event log; the borrowed
//! originals outlive every derived context.

use crate::domain::entities::BlockInfo;
use crate::domain::invariants::check_call_depth_invariant;
use crate::errors::ComputeError;
use crate::events::EventManager;
use crate::gas::GasMeter;
use std::cell::Cell;

// =============================================================================
// CALL STACK
// =============================================================================

/// Depth counter of nested instantiate/execute/reply frames.
#[derive(Debug)]
pub struct CallStack {
    depth: Cell<usize>,
    max_depth: usize,
}

impl CallStack {
    /// Creates an empty stack.
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            depth: Cell::new(0),
            max_depth,
        }
    }

    /// Current depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    /// Configured maximum.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Pushes a frame, popped when the guard drops.
    ///
    /// # Errors
    ///
    /// Returns `CallDepthExceeded` if the frame would exceed the maximum.
    pub fn enter(&self) -> Result<FrameGuard<'_>, ComputeError> {
        let depth = self.depth.get() + 1;
        if !check_call_depth_invariant(depth, self.max_depth) {
            return Err(ComputeError::CallDepthExceeded {
                depth,
                max: self.max_depth,
            });
        }
        self.depth.set(depth);
        Ok(FrameGuard { stack: self })
    }
}

/// Pops its frame on drop.
#[derive(Debug)]
pub struct FrameGuard<'a> {
    stack: &'a CallStack,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.stack
            .depth
            .set(self.stack.depth.get().saturating_sub(1));
    }
}

// =============================================================================
// CALL CONTEXT
// =============================================================================

/// Borrowed state of one call chain.
#[derive(Debug, Clone, Copy)]
pub struct CallContext<'a> {
    block: &'a BlockInfo,
    tx_bytes: &'a [u8],
    gas: &'a GasMeter,
    events: &'a EventManager,
    stack: &'a CallStack,
}

impl<'a> CallContext<'a> {
    /// Creates a context.
    #[must_use]
    pub fn new(
        block: &'a BlockInfo,
        tx_bytes: &'a [u8],
        gas: &'a GasMeter,
        events: &'a EventManager,
        stack: &'a CallStack,
    ) -> Self {
        Self {
            block,
            tx_bytes,
            gas,
            events,
            stack,
        }
    }

    /// Block information.
    #[must_use]
    pub fn block(&self) -> &'a BlockInfo {
        self.block
    }

    /// Raw bytes of the enclosing transaction.
    #[must_use]
    pub fn tx_bytes(&self) -> &'a [u8] {
        self.tx_bytes
    }

    /// Active gas meter.
    #[must_use]
    pub fn gas_meter(&self) -> &'a GasMeter {
        self.gas
    }

    /// Active event log.
    #[must_use]
    pub fn events(&self) -> &'a EventManager {
        self.events
    }

    /// Call stack.
    #[must_use]
    pub fn call_stack(&self) -> &'a CallStack {
        self.stack
    }

    /// Same context metered by `gas`.
    #[must_use]
    pub fn with_gas_meter<'b>(&self, gas: &'b GasMeter) -> CallContext<'b>
    where
        'a: 'b,
    {
        CallContext {
            gas,
            ..*self
        }
    }

    /// Same context emitting into `events`.
    #[must_use]
    pub fn with_events<'b>(&self, events: &'b EventManager) -> CallContext<'b>
    where
        'a: 'b,
    {
        CallContext {
            events,
            ..*self
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_pop_on_drop() {
        let stack = CallStack::new(2);
        {
            let _a = stack.enter().unwrap();
            let _b = stack.enter().unwrap();
            assert_eq!(stack.depth(), 2);
            assert!(matches!(
                stack.enter(),
                Err(ComputeError::CallDepthExceeded { depth: 3, max: 2 })
            ));
        }
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_child_meter_is_scoped() {
        let block = BlockInfo::default();
        let meter = GasMeter::new(100);
        let events = EventManager::new();
        let stack = CallStack::new(4);
        let ctx = CallContext::new(&block, &[], &meter, &events, &stack);

        let child = GasMeter::new(5);
        let child_ctx = ctx.with_gas_meter(&child);
        child_ctx.gas_meter().consume(3, "test").unwrap();
        assert_eq!(child.consumed(), 3);
        assert_eq!(meter.consumed(), 0);
        assert_eq!(child_ctx.block().height, block.height);
    }
}
