//! One-at-a-time guard for a command family.

use crate::CommandFamily;
use rust_fsm::*;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub operation_slot(Vacant)

    Vacant => {
        Acquire => InFlight
    },
    InFlight => {
        Release => Vacant
    }
}

use operation_slot::Input as SlotInput;
use operation_slot::State as SlotState;
use operation_slot::StateMachine as SlotMachine;

/// In-flight token for one command family.
pub(crate) struct OperationSlot {
    family: CommandFamily,
    machine: Mutex<SlotMachine>,
}

impl OperationSlot {
    pub(crate) fn new(family: CommandFamily) -> Self {
        Self {
            family,
            machine: Mutex::new(SlotMachine::new()),
        }
    }

    /// Take the token, or `None` if a command of this family is pending.
    pub(crate) fn try_acquire(&self) -> Option<OperationGuard<'_>> {
        let mut machine = self.lock();
        match machine.consume(&SlotInput::Acquire) {
            Ok(_) => {
                debug!(family = %self.family, "Command started");
                Some(OperationGuard { slot: self })
            }
            Err(_) => {
                debug!(family = %self.family, "Command already in flight");
                None
            }
        }
    }

    pub(crate) fn is_in_flight(&self) -> bool {
        *self.lock().state() == SlotState::InFlight
    }

    fn release(&self) {
        if self.lock().consume(&SlotInput::Release).is_ok() {
            debug!(family = %self.family, "Command finished");
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotMachine> {
        self.machine
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Returns the token when dropped, including when the command future is
/// dropped before it resolves.
pub(crate) struct OperationGuard<'a> {
    slot: &'a OperationSlot,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.slot.release();
    }
}
