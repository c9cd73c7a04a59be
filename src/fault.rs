use crate::notification::{Notifier, StatusHandle};
use crate::power::fault_description;

use chrono::Local;

const FAULT_TITLE: &str = "Inverter errors";

/// Edge-detects the fault bitmask across polls. A transition to non-zero
/// posts a status update; the transition back to zero annotates that update
/// in place with the resolution time, or posts a fresh "back to normal" one
/// when the original is no longer editable. Unchanged observations, the
/// steady 0 -> 0 case included, stay silent.
pub struct FaultTracker {
    last_fault: u16,
    last_message: Option<StatusHandle>,
}

impl Default for FaultTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl FaultTracker {
    pub fn new() -> Self {
        Self {
            last_fault: 0,
            last_message: None,
        }
    }

    pub fn last_fault(&self) -> u16 {
        self.last_fault
    }

    pub fn observe(&mut self, fault: u16, notifier: &mut dyn Notifier) {
        if self.last_fault == fault {
            return;
        }

        if fault != 0 {
            let text = format!("Error: {}", fault_description(fault));
            self.last_message = Some(notifier.enqueue_status_update(FAULT_TITLE, &text));
        } else {
            let mut notified = false;
            if let Some(handle) = self.last_message.take() {
                notified = handle.update(|entry| {
                    let elapsed = (Local::now() - entry.timestamp).num_seconds();
                    entry
                        .text
                        .push_str(&format!(", resolved after {} seconds.", elapsed));
                });
            }
            if !notified {
                notifier.enqueue_status_update(FAULT_TITLE, "Back to normal");
            }
        }
        self.last_fault = fault;
    }
}
