//! Suppression of self-originated backend change events

use std::collections::HashMap;
use std::sync::Mutex;

/// Ledger of backend change events this driver expects to see echoed back
/// for its own writes.
///
/// Before a self-write the driver records one expected echo for the id; the
/// standing change handler consumes the expectation instead of re-processing
/// the event. The expectation persists until the echo arrives, so backends
/// that emit asynchronously cannot desynchronize suppression the way a
/// detach/reattach window could.
#[derive(Debug, Default)]
pub(crate) struct EchoLedger {
    pending: Mutex<HashMap<String, u32>>,
}

impl EchoLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record one expected echo for an id.
    ///
    /// The returned claim revokes the expectation when dropped; call
    /// [`EchoClaim::keep`] once the backend write succeeded so the handler
    /// can consume it. A failed write therefore never leaves a stale
    /// expectation behind.
    pub(crate) fn expect(&self, id: &str) -> EchoClaim<'_> {
        let mut pending = self.pending.lock().expect("ledger lock poisoned");
        *pending.entry(id.to_string()).or_insert(0) += 1;
        EchoClaim {
            ledger: self,
            id: id.to_string(),
            armed: true,
        }
    }

    /// Consume one expected echo for an id, if any. Returns `true` when the
    /// event was self-originated and must be ignored.
    pub(crate) fn consume(&self, id: &str) -> bool {
        let mut pending = self.pending.lock().expect("ledger lock poisoned");
        match pending.get_mut(id) {
            Some(count) if *count > 0 => {
                *count -= 1;
                if *count == 0 {
                    pending.remove(id);
                }
                true
            }
            _ => false,
        }
    }

    fn revoke(&self, id: &str) {
        self.consume(id);
    }
}

/// Guard over one recorded echo expectation.
pub(crate) struct EchoClaim<'a> {
    ledger: &'a EchoLedger,
    id: String,
    armed: bool,
}

impl EchoClaim<'_> {
    /// Leave the expectation in place for the standing handler to consume
    pub(crate) fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for EchoClaim<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.ledger.revoke(&self.id);
        }
    }
}
