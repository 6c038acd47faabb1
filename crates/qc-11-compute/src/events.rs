//! # Events
//!
//! Event types and attribute keys emitted by the invocation engine, and the
//! per-call [`EventManager`] collecting them.
//!
//! ## Emitted Events
//!
//! | Type | Attributes | When |
//! |------|------------|------|
//! | `instantiate` | `contract_address`, `code_id` | current-schema instantiation |
//! | `execute` | `contract_address` | current-schema execution |
//! | `reply` | `contract_address` | reply delivered |
//! | `wasm` | `contract_address`, then contract attributes | contract returned attributes |
//! | `wasm-<type>` | `contract_address`, then event attributes | contract returned custom events |

use crate::domain::invariants::limits;
use crate::domain::messages::{Attribute, Event};
use crate::domain::value_objects::Address;
use crate::errors::ComputeError;
use std::cell::RefCell;

/// Event type names.
pub mod event_types {
    /// Contract instantiated.
    pub const INSTANTIATE: &str = "instantiate";
    /// Contract executed.
    pub const EXECUTE: &str = "execute";
    /// Reply delivered.
    pub const REPLY: &str = "reply";
    /// Contract attributes.
    pub const WASM: &str = "wasm";
    /// Prefix of custom contract events.
    pub const CUSTOM_PREFIX: &str = "wasm-";
    /// Funds moved by a bank message.
    pub const TRANSFER: &str = "transfer";
}

/// Attribute keys.
pub mod attribute_keys {
    /// Emitting or invoked contract.
    pub const CONTRACT_ADDRESS: &str = "contract_address";
    /// Instantiated code id.
    pub const CODE_ID: &str = "code_id";
    /// Transfer recipient.
    pub const RECIPIENT: &str = "recipient";
    /// Transfer sender.
    pub const SENDER: &str = "sender";
    /// Transfer amount.
    pub const AMOUNT: &str = "amount";
}

// =============================================================================
// EVENT MANAGER
// =============================================================================

/// Append-only event log scoped to one call.
#[derive(Debug, Default)]
pub struct EventManager {
    events: RefCell<Vec<Event>>,
}

impl EventManager {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one event.
    pub fn emit(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    /// Appends several events, preserving order.
    pub fn emit_all(&self, events: impl IntoIterator<Item = Event>) {
        self.events.borrow_mut().extend(events);
    }

    /// Snapshot of the events so far.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    /// Number of events so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    /// Returns true if nothing was emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    /// Drains the log.
    #[must_use]
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}

// =============================================================================
// CONTRACT EVENTS
// =============================================================================

/// `wasm` event carrying contract attributes, or `None` without attributes.
#[must_use]
pub fn contract_attributes_event(contract: &Address, attributes: &[Attribute]) -> Option<Event> {
    if attributes.is_empty() {
        return None;
    }
    let mut event =
        Event::new(event_types::WASM).add_attribute(attribute_keys::CONTRACT_ADDRESS, contract.to_string());
    event.attributes.extend(attributes.iter().cloned());
    Some(event)
}

/// Converts custom contract events to `wasm-<type>` events.
///
/// # Errors
///
/// Returns `Invalid` if an event type is shorter than two characters after
/// trimming, or an attribute key is empty or starts with `_`.
pub fn custom_events(contract: &Address, events: &[Event]) -> Result<Vec<Event>, ComputeError> {
    events
        .iter()
        .map(|event| {
            let ty = event.ty.trim();
            if ty.len() < limits::MIN_CUSTOM_EVENT_TYPE_LEN {
                return Err(ComputeError::Invalid(format!(
                    "event type too short: {:?}",
                    event.ty
                )));
            }

            let mut out = Event::new(format!("{}{ty}", event_types::CUSTOM_PREFIX))
                .add_attribute(attribute_keys::CONTRACT_ADDRESS, contract.to_string());
            for attr in &event.attributes {
                let key = attr.key.trim();
                if key.is_empty() {
                    return Err(ComputeError::Invalid("empty attribute key".into()));
                }
                if key.starts_with('_') {
                    return Err(ComputeError::Invalid(format!(
                        "attribute key starting with '_' is reserved: {key}"
                    )));
                }
                out.attributes
                    .push(Attribute::new(key, attr.value.trim()));
            }
            Ok(out)
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_preserves_order() {
        let manager = EventManager::new();
        manager.emit(Event::new("a"));
        manager.emit_all(vec![Event::new("b"), Event::new("c")]);
        let types: Vec<_> = manager.events().into_iter().map(|e| e.ty).collect();
        assert_eq!(types, vec!["a", "b", "c"]);
        assert_eq!(manager.take().len(), 3);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_attributes_event_prefixed_with_contract() {
        let contract = Address::new([1u8; 20]);
        assert!(contract_attributes_event(&contract, &[]).is_none());

        let event =
            contract_attributes_event(&contract, &[Attribute::new("action", "mint")]).unwrap();
        assert_eq!(event.ty, "wasm");
        assert_eq!(event.attributes[0].key, "contract_address");
        assert_eq!(event.attributes[1].value, "mint");
    }

    #[test]
    fn test_custom_event_validation() {
        let contract = Address::new([1u8; 20]);
        let ok = custom_events(&contract, &[Event::new(" swap ").add_attribute("pool", "1")])
            .unwrap();
        assert_eq!(ok[0].ty, "wasm-swap");
        assert_eq!(ok[0].attribute("contract_address"), Some(contract.to_string().as_str()));

        assert!(custom_events(&contract, &[Event::new("x")]).is_err());
        assert!(custom_events(&contract, &[Event::new("swap").add_attribute("_hidden", "1")]).is_err());
        assert!(custom_events(&contract, &[Event::new("swap").add_attribute(" ", "1")]).is_err());
    }
}
