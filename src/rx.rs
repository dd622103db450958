//! Receive path: two hardware FIFOs drained into bounded software FIFOs.

use core::cell::UnsafeCell;

use heapless::Deque;

use crate::filter::{FilterMode, FilterScale, RxFilter};
use crate::frame::Frame;
use crate::kernel::{
    InterruptHandle, IrqVector, Kernel, MutexGuard, Routine, Runnable, Semaphore,
};
use crate::pac::can::{self, RX_FIFO_COUNT};
use crate::pac::generic::{Raw, RegisterValue};
use crate::RxFifo;

/// Depth of a hardware RX FIFO and of its software mirror.
pub(crate) const RX_FIFO_DEPTH: usize = 3;

/// Bounded frame FIFO with a configurable overflow policy.
///
/// Locked (RFLM set): a frame arriving at a full FIFO is dropped.
/// Unlocked: the oldest queued frame is displaced to make room.
pub(crate) struct SoftwareFifo {
    frames: Deque<Frame, RX_FIFO_DEPTH>,
    locked: bool,
}

impl SoftwareFifo {
    pub(crate) fn new(locked: bool) -> Self {
        Self {
            frames: Deque::new(),
            locked,
        }
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.locked
    }

    pub(crate) fn is_full(&self) -> bool {
        self.frames.is_full()
    }

    /// Queues `frame`, reporting whether it was stored.
    pub(crate) fn push(&mut self, frame: Frame) -> bool {
        if self.frames.is_full() {
            if self.locked {
                return false;
            }
            self.frames.pop_front();
        }
        self.frames.push_back(frame).is_ok()
    }

    /// Removes and returns the oldest queued frame.
    pub(crate) fn pop(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }
}

/// State shared between `receive` callers and the FIFO routine.
struct RxShared<'k, K: Kernel> {
    kernel: &'k K,
    index: usize,
    regs: *mut can::RegisterBlock,
    fill_count: K::Semaphore,
    fifo: UnsafeCell<SoftwareFifo>,
}

// The register pointer is only dereferenced for volatile accesses. The
// software FIFO cell has exactly one interrupt-context writer; the thread
// side only touches it inside a critical section (see `RxHwFifo::receive`).
unsafe impl<K: Kernel> Send for RxShared<'_, K> {}
unsafe impl<K: Kernel> Sync for RxShared<'_, K> {}

impl<K: Kernel> RxShared<'_, K> {
    fn can(&self) -> &can::RegisterBlock {
        unsafe { &*self.regs }
    }
}

impl<K: Kernel> Runnable for RxShared<'_, K> {
    /// Drains the hardware FIFO head into the software FIFO.
    fn run(&self) {
        let can = self.can();
        let rfr = &can.rfr[self.index];
        if rfr.read().fmp() == 0 {
            // Spurious interrupt.
            return;
        }

        let head = &can.rx[self.index];
        let frame = Frame::from_mailbox_words(
            head.rir.read().to_bits(),
            head.rdtr.read().dlc(),
            head.rdlr.read().0,
            head.rdhr.read().0,
        );

        let mut switch_context = false;
        let fifo = unsafe { &mut *self.fifo.get() };
        // Displacing the oldest frame keeps the queued count unchanged, so
        // no permit is released in that case.
        let displaced = !fifo.is_locked() && fifo.is_full();
        if fifo.push(frame) && !displaced && self.fill_count.release_from_interrupt() {
            switch_context = self.fill_count.has_to_switch_context();
        }

        // Release the hardware mailbox head.
        rfr.modify(|r| r.set_rfom(true));

        if switch_context {
            self.kernel.yield_from_interrupt();
        }
    }
}

/// One hardware RX FIFO with its software mirror and fill semaphore.
pub(crate) struct RxHwFifo<'k, K: Kernel> {
    // Declared first: the handle must drop before the state it points into.
    isr: Option<K::Interrupt>,
    mutex: K::Mutex,
    shared: RxShared<'k, K>,
}

impl<'k, K: Kernel> RxHwFifo<'k, K> {
    pub(crate) fn new(
        kernel: &'k K,
        index: usize,
        locked: bool,
        regs: *mut can::RegisterBlock,
    ) -> Option<Self> {
        let mutex = kernel.create_mutex()?;
        let fill_count = kernel.create_semaphore(0, RX_FIFO_DEPTH as u32)?;
        Some(Self {
            isr: None,
            mutex,
            shared: RxShared {
                kernel,
                index,
                regs,
                fill_count,
                fifo: UnsafeCell::new(SoftwareFifo::new(locked)),
            },
        })
    }

    /// Registers and enables the FIFO routine.
    ///
    /// # Safety
    ///
    /// `self` must stay at its current address until the FIFO is dropped.
    pub(crate) unsafe fn install_isr(&mut self) -> bool {
        let vector = if self.shared.index == 0 {
            IrqVector::Rx0
        } else {
            IrqVector::Rx1
        };
        let routine = Routine::new(&self.shared);
        match unsafe { self.shared.kernel.create_interrupt(routine, vector) } {
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

    /// Blocks until a frame is queued, then copies it to `frame_out`.
    pub(crate) fn receive(&self, frame_out: &mut Frame) -> bool {
        if !self.shared.fill_count.acquire() {
            return false;
        }
        let _guard = MutexGuard::new(&self.mutex);
        // Keep the FIFO routine out while the head is taken.
        critical_section::with(|_| {
            let fifo = unsafe { &mut *self.shared.fifo.get() };
            match fifo.pop() {
                Some(frame) => {
                    *frame_out = frame;
                    true
                }
                None => false,
            }
        })
    }
}

/// The receive half of the controller: both FIFOs and the filter banks.
pub(crate) struct RxCore<'k, K: Kernel> {
    regs: *mut can::RegisterBlock,
    mutex: K::Mutex,
    fifos: [RxHwFifo<'k, K>; RX_FIFO_COUNT],
}

// The register pointer is only dereferenced for volatile accesses, and the
// filter bank protocol runs under `mutex`.
unsafe impl<K: Kernel> Send for RxCore<'_, K> {}
unsafe impl<K: Kernel> Sync for RxCore<'_, K> {}

impl<'k, K: Kernel> RxCore<'k, K> {
    pub(crate) fn new(kernel: &'k K, locked: bool, regs: *mut can::RegisterBlock) -> Option<Self> {
        let mutex = kernel.create_mutex()?;
        let fifo0 = RxHwFifo::new(kernel, 0, locked, regs)?;
        let fifo1 = RxHwFifo::new(kernel, 1, locked, regs)?;
        Some(Self {
            regs,
            mutex,
            fifos: [fifo0, fifo1],
        })
    }

    /// Registers and enables both FIFO routines.
    ///
    /// # Safety
    ///
    /// `self` must stay at its current address until the core is dropped.
    pub(crate) unsafe fn install_isrs(&mut self) -> bool {
        for fifo in &mut self.fifos {
            if !unsafe { fifo.install_isr() } {
                return false;
            }
        }
        true
    }

    pub(crate) fn disable_isrs(&self) {
        for fifo in &self.fifos {
            fifo.disable_isr();
        }
    }

    fn can(&self) -> &can::RegisterBlock {
        unsafe { &*self.regs }
    }

    /// Blocking receive from the selected FIFO.
    pub(crate) fn receive(&self, frame_out: &mut Frame, fifo: RxFifo) -> bool {
        self.fifos[fifo as usize].receive(frame_out)
    }

    /// Reprograms one acceptance filter bank.
    ///
    /// The whole bank update happens inside filter-init mode with the bank
    /// deactivated, so reception never observes a half-written bank.
    pub(crate) fn set_receive_filter(&self, filter: &RxFilter) -> bool {
        if !filter.is_index_valid() {
            return false;
        }
        let index = filter.index;

        let _guard = MutexGuard::new(&self.mutex);
        let can = self.can();
        can.fmr.modify(|r| r.set_finit(true));
        can.fa1r.modify(|r| r.set_bank(index, false));
        can.fm1r
            .modify(|r| r.set_bank(index, filter.mode == FilterMode::IdList));
        can.fs1r
            .modify(|r| r.set_bank(index, filter.scale == FilterScale::Bits32));
        can.ffa1r
            .modify(|r| r.set_bank(index, filter.fifo == RxFifo::Fifo1));
        let (fr1, fr2) = filter.bank_words();
        can.fb[index].fr1.write(Raw(fr1));
        can.fb[index].fr2.write(Raw(fr2));
        can.fa1r.modify(|r| r.set_bank(index, true));
        can.fmr.modify(|r| r.set_finit(false));
        true
    }
}
