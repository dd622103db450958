//! Status-change / error interrupt handling.

use crate::kernel::{InterruptHandle, IrqVector, Kernel, Routine, Runnable};
use crate::pac::can;

/// State the status routine runs against.
struct StatusShared {
    regs: *mut can::RegisterBlock,
}

// The register pointer is only dereferenced for volatile accesses.
unsafe impl Send for StatusShared {}
unsafe impl Sync for StatusShared {}

impl Runnable for StatusShared {
    /// Samples the error state and acknowledges the interrupt.
    fn run(&self) {
        let can = unsafe { &*self.regs };
        let _esr = can.esr.read();
        // ERRI/WKUI/SLAKI are write-1-to-clear; acknowledging them keeps the
        // vector from re-firing.
        let mut ack = can::Msr::zero();
        ack.set_erri(true);
        ack.set_wkui(true);
        ack.set_slaki(true);
        can.msr.write(ack);
    }
}

/// The status-change half of the controller.
pub(crate) struct StatusCore<K: Kernel> {
    // Declared first: the handle must drop before the state it points into.
    isr: Option<K::Interrupt>,
    shared: StatusShared,
}

impl<K: Kernel> StatusCore<K> {
    pub(crate) fn new(regs: *mut can::RegisterBlock) -> Self {
        Self {
            isr: None,
            shared: StatusShared { regs },
        }
    }

    /// Registers and enables the status routine.
    ///
    /// # Safety
    ///
    /// `self` must stay at its current address until the core is dropped.
    pub(crate) unsafe fn install_isr(&mut self, kernel: &K) -> bool {
        let routine = Routine::new(&self.shared);
        match unsafe { kernel.create_interrupt(routine, IrqVector::Sce) } {
            Some(handle) => {
                handle.enable();
                self.isr = Some(handle);
                true
            }
            None => false,
        }
    }

    pub(crate) fn disable_isr(&self) {
        if let Some(isr) = &self.isr {
            isr.disable();
        }
    }
}
