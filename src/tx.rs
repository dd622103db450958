//! Transmit path: three hardware mailboxes behind a free-count semaphore.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::frame::Frame;
use crate::kernel::{
    InterruptHandle, IrqVector, Kernel, MutexGuard, Routine, Runnable, Semaphore,
};
use crate::pac::can::{self, TX_MAILBOX_COUNT};
use crate::pac::generic::{Raw, RegisterValue};

/// Saturation ceiling of the per-mailbox error counter.
const ERROR_COUNTER_LIMIT: u32 = 0x2000_0000;

/// Latched snapshot of one mailbox's transmit status bits.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MailboxState {
    /// Request completed.
    pub rqcp: bool,
    /// Transmission OK.
    pub txok: bool,
    /// Arbitration lost.
    pub alst: bool,
    /// Transmission error.
    pub terr: bool,
    /// Mailbox empty.
    pub tme: bool,
}

impl MailboxState {
    fn from_tsr(tsr: can::Tsr, index: usize) -> Self {
        Self {
            rqcp: tsr.rqcp(index),
            txok: tsr.txok(index),
            alst: tsr.alst(index),
            terr: tsr.terr(index),
            tme: tsr.tme(index),
        }
    }

    fn to_bits(self) -> u32 {
        u32::from(self.rqcp)
            | u32::from(self.txok) << 1
            | u32::from(self.alst) << 2
            | u32::from(self.terr) << 3
            | u32::from(self.tme) << 4
    }

    fn from_bits(bits: u32) -> Self {
        Self {
            rqcp: bits & 1 != 0,
            txok: bits & 2 != 0,
            alst: bits & 4 != 0,
            terr: bits & 8 != 0,
            tme: bits & 16 != 0,
        }
    }
}

/// One hardware TX mailbox slot.
pub(crate) struct TxMailbox {
    index: usize,
    regs: *mut can::RegisterBlock,
    status: AtomicU32,
    error_counter: AtomicU32,
}

// The raw register pointer is only used for volatile MMIO accesses; the
// latched status and the error counter are atomics.
unsafe impl Send for TxMailbox {}
unsafe impl Sync for TxMailbox {}

impl TxMailbox {
    pub(crate) fn new(index: usize, regs: *mut can::RegisterBlock) -> Self {
        Self {
            index,
            regs,
            status: AtomicU32::new(0),
            error_counter: AtomicU32::new(0),
        }
    }

    fn can(&self) -> &can::RegisterBlock {
        unsafe { &*self.regs }
    }

    /// Whether the slot is free (TSR.TMEx set).
    pub(crate) fn is_empty(&self) -> bool {
        self.can().tsr.read().tme(self.index)
    }

    /// Emits `frame` on this slot.
    ///
    /// Returns whether the transmit request was issued.
    pub(crate) fn transmit(&self, frame: &Frame) -> bool {
        if !self.is_empty() {
            return false;
        }

        let mailbox = &self.can().tx[self.index];
        mailbox.tir.modify(|r| r.set_txrq(false));
        mailbox.tdtr.modify(|r| r.set_dlc(u32::from(frame.dlc())));
        let (low, high) = frame.payload_words();
        mailbox.tdlr.write(Raw(low));
        mailbox.tdhr.write(Raw(high));
        // The identifier word already carries STID/EXID/IDE/RTR in register
        // layout; setting TXRQ hands the slot to the hardware.
        let mut tir = can::Tir::from_bits(frame.id.bits());
        tir.set_txrq(true);
        mailbox.tir.write(tir);
        true
    }

    /// Interrupt-side completion step.
    ///
    /// Fixates the status bits into the latch and, when the request has
    /// completed, acknowledges RQCP and reports `true`. A failed
    /// transmission (TXOK clear) bumps the error counter.
    pub(crate) fn routine(&self) -> bool {
        self.fix_request_status();
        let state = self.state();
        if !(state.rqcp && state.tme) {
            return false;
        }
        if !state.txok {
            let count = self.error_counter.load(Ordering::Relaxed);
            if count < ERROR_COUNTER_LIMIT {
                self.error_counter.store(count + 1, Ordering::Relaxed);
            }
        }
        self.clear_request_status();
        true
    }

    /// Snapshots the five status bits of this slot into the latch.
    fn fix_request_status(&self) {
        let state = MailboxState::from_tsr(self.can().tsr.read(), self.index);
        self.status.store(state.to_bits(), Ordering::Relaxed);
    }

    /// Acknowledges the completed request with a single write-1-to-clear.
    fn clear_request_status(&self) {
        self.can().tsr.write(can::Tsr::rqcp_mask(self.index));
    }

    /// The most recently latched status snapshot.
    pub(crate) fn state(&self) -> MailboxState {
        MailboxState::from_bits(self.status.load(Ordering::Relaxed))
    }

    pub(crate) fn error_counter(&self) -> u32 {
        self.error_counter.load(Ordering::Relaxed)
    }
}

/// State shared between `transmit` callers and the TX-done routine.
pub(crate) struct TxShared<'k, K: Kernel> {
    kernel: &'k K,
    free_count: K::Semaphore,
    mailboxes: [TxMailbox; TX_MAILBOX_COUNT],
}

impl<K: Kernel> Runnable for TxShared<'_, K> {
    fn run(&self) {
        let mut switch_context = false;
        for mailbox in &self.mailboxes {
            if mailbox.routine() && self.free_count.release_from_interrupt() {
                switch_context |= self.free_count.has_to_switch_context();
            }
        }
        if switch_context {
            self.kernel.yield_from_interrupt();
        }
    }
}

/// The transmit half of the controller.
pub(crate) struct TxCore<'k, K: Kernel> {
    // Declared first: the handle must drop before the state it points into.
    isr: Option<K::Interrupt>,
    mutex: K::Mutex,
    shared: TxShared<'k, K>,
}

impl<'k, K: Kernel> TxCore<'k, K> {
    pub(crate) fn new(kernel: &'k K, regs: *mut can::RegisterBlock) -> Option<Self> {
        let mutex = kernel.create_mutex()?;
        let free_count =
            kernel.create_semaphore(TX_MAILBOX_COUNT as u32, TX_MAILBOX_COUNT as u32)?;
        Some(Self {
            isr: None,
            mutex,
            shared: TxShared {
                kernel,
                free_count,
                mailboxes: [
                    TxMailbox::new(0, regs),
                    TxMailbox::new(1, regs),
                    TxMailbox::new(2, regs),
                ],
            },
        })
    }

    /// Registers and enables the TX-done routine.
    ///
    /// # Safety
    ///
    /// `self` must stay at its current address until the core is dropped.
    pub(crate) unsafe fn install_isr(&mut self) -> bool {
        let routine = Routine::new(&self.shared);
        match unsafe { self.shared.kernel.create_interrupt(routine, IrqVector::Tx) } {
            Some(handle) => {
                handle.enable();
                self.isr = Some(handle);
                true
            }
            None => false,
        }
    }

    /// Disables the TX-done routine ahead of teardown.
    pub(crate) fn disable_isr(&self) {
        if let Some(isr) = &self.isr {
            isr.disable();
        }
    }

    /// Queues `frame` on the first free mailbox, blocking until one is free.
    pub(crate) fn transmit(&self, frame: &Frame) -> bool {
        if !self.shared.free_count.acquire() {
            return false;
        }
        let _guard = MutexGuard::new(&self.mutex);
        for mailbox in &self.shared.mailboxes {
            if mailbox.is_empty() {
                return mailbox.transmit(frame);
            }
        }
        // A permit is held, so a mailbox with TME set had to exist.
        unreachable!("acquired a free-mailbox permit but every mailbox is pending")
    }

    /// The largest error counter across the three mailboxes.
    pub(crate) fn max_error_counter(&self) -> i32 {
        self.shared
            .mailboxes
            .iter()
            .map(TxMailbox::error_counter)
            .max()
            .unwrap_or(0) as i32
    }
}
