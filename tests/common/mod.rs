//! Mock kernel and mock register blocks for the host scenarios.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use bxcan_rtos::kernel::{InterruptHandle, IrqVector, Kernel, Mutex, Routine, Semaphore};
use bxcan_rtos::pac::generic::{Raw, RegisterValue};
use bxcan_rtos::pac::{can, dbg, gpio, rcc, Peripherals};
use bxcan_rtos::{Frame, Id};

fn vector_index(vector: IrqVector) -> usize {
    match vector {
        IrqVector::Tx => 0,
        IrqVector::Rx0 => 1,
        IrqVector::Rx1 => 2,
        IrqVector::Sce => 3,
    }
}

/// Single-threaded stand-in for the RTOS services.
///
/// The INAK handshake is emulated at two deterministic hooks: locking the
/// factory mutex (the first mutex created) asserts INAK, and registering the
/// SCE routine (the last registration before the driver leaves init mode)
/// deasserts it.
pub struct MockKernel {
    pub cpu_clock: Cell<u32>,
    handshake: Cell<Option<*mut can::RegisterBlock>>,
    mutexes_created: Cell<usize>,
    semaphores: RefCell<Vec<Rc<Cell<u32>>>>,
    routines: RefCell<[Option<Routine>; 4]>,
    pub yields: Cell<u32>,
    pub blocked_acquires: Cell<u32>,
    pub waiter_ready_on_release: Cell<bool>,
    pub switch_context: Cell<bool>,
}

// The scenarios are single-threaded; the driver only needs the bound.
unsafe impl Sync for MockKernel {}

impl MockKernel {
    pub fn new(cpu_clock: u32) -> Self {
        Self {
            cpu_clock: Cell::new(cpu_clock),
            handshake: Cell::new(None),
            mutexes_created: Cell::new(0),
            semaphores: RefCell::new(Vec::new()),
            routines: RefCell::new([None; 4]),
            yields: Cell::new(0),
            blocked_acquires: Cell::new(0),
            waiter_ready_on_release: Cell::new(false),
            switch_context: Cell::new(false),
        }
    }

    /// Enables the INAK handshake emulation against `can`.
    pub fn attach(&self, can: *mut can::RegisterBlock) {
        self.handshake.set(Some(can));
    }

    fn set_inak(&self, level: bool) {
        if let Some(ptr) = self.handshake.get() {
            let can = unsafe { &*ptr };
            can.msr.modify(|r| r.set_inak(level));
        }
    }

    /// Invokes the routine registered on `vector`.
    pub fn fire(&self, vector: IrqVector) {
        let routine = self.routines.borrow()[vector_index(vector)].expect("no routine registered");
        unsafe { routine.run() };
    }

    pub fn has_routine(&self, vector: IrqVector) -> bool {
        self.routines.borrow()[vector_index(vector)].is_some()
    }

    /// Current permit count of the `index`-th semaphore the driver created
    /// (0 = TX free count, 1 = FIFO 0 fill count, 2 = FIFO 1 fill count).
    pub fn semaphore_count(&self, index: usize) -> u32 {
        self.semaphores.borrow()[index].get()
    }
}

pub struct MockMutex {
    kernel: *const MockKernel,
    reactive: bool,
    locked: Cell<bool>,
}

unsafe impl Sync for MockMutex {}

impl MockMutex {
    fn kernel(&self) -> &MockKernel {
        unsafe { &*self.kernel }
    }
}

impl Mutex for MockMutex {
    fn lock(&self) {
        assert!(!self.locked.get(), "mutex is not reentrant");
        self.locked.set(true);
        if self.reactive {
            self.kernel().set_inak(true);
        }
    }

    fn unlock(&self) {
        assert!(self.locked.get(), "unlock without lock");
        self.locked.set(false);
    }
}

pub struct MockSemaphore {
    kernel: *const MockKernel,
    count: Rc<Cell<u32>>,
    maximum: u32,
}

unsafe impl Sync for MockSemaphore {}

impl MockSemaphore {
    fn kernel(&self) -> &MockKernel {
        unsafe { &*self.kernel }
    }
}

impl Semaphore for MockSemaphore {
    fn acquire(&self) -> bool {
        let count = self.count.get();
        if count == 0 {
            // A real kernel would park the thread here; the scenarios treat
            // this as an observable would-block.
            self.kernel().blocked_acquires.set(self.kernel().blocked_acquires.get() + 1);
            return false;
        }
        self.count.set(count - 1);
        true
    }

    fn release_from_interrupt(&self) -> bool {
        let count = self.count.get();
        assert!(count < self.maximum, "semaphore released past its ceiling");
        self.count.set(count + 1);
        self.kernel().waiter_ready_on_release.get()
    }

    fn has_to_switch_context(&self) -> bool {
        self.kernel().switch_context.get()
    }
}

pub struct MockInterrupt {
    pub enabled: Cell<bool>,
}

impl InterruptHandle for MockInterrupt {
    fn enable(&self) {
        self.enabled.set(true);
    }

    fn disable(&self) {
        self.enabled.set(false);
    }
}

impl Kernel for MockKernel {
    type Mutex = MockMutex;
    type Semaphore = MockSemaphore;
    type Interrupt = MockInterrupt;

    fn create_mutex(&self) -> Option<MockMutex> {
        let index = self.mutexes_created.get();
        self.mutexes_created.set(index + 1);
        Some(MockMutex {
            kernel: self,
            reactive: index == 0,
            locked: Cell::new(false),
        })
    }

    fn create_semaphore(&self, initial: u32, maximum: u32) -> Option<MockSemaphore> {
        let count = Rc::new(Cell::new(initial));
        self.semaphores.borrow_mut().push(count.clone());
        Some(MockSemaphore {
            kernel: self,
            count,
            maximum,
        })
    }

    unsafe fn create_interrupt(
        &self,
        routine: Routine,
        vector: IrqVector,
    ) -> Option<MockInterrupt> {
        self.routines.borrow_mut()[vector_index(vector)] = Some(routine);
        if vector == IrqVector::Sce {
            // The last registration happens inside init mode; completing it
            // lets the controller's exit handshake observe INAK low.
            self.set_inak(false);
        }
        Some(MockInterrupt {
            enabled: Cell::new(false),
        })
    }

    fn yield_from_interrupt(&self) {
        self.yields.set(self.yields.get() + 1);
    }

    fn cpu_clock_hz(&self) -> u32 {
        self.cpu_clock.get()
    }
}

/// Register blocks living in plain host memory.
pub struct MockDevice {
    can: Box<can::RegisterBlock>,
    rcc: Box<rcc::RegisterBlock>,
    gpio: Box<gpio::RegisterBlock>,
    dbg: Box<dbg::RegisterBlock>,
}

impl MockDevice {
    pub fn new() -> Self {
        // All-zero blocks; tests stage the reset bits they rely on.
        unsafe {
            Self {
                can: Box::new(std::mem::zeroed()),
                rcc: Box::new(std::mem::zeroed()),
                gpio: Box::new(std::mem::zeroed()),
                dbg: Box::new(std::mem::zeroed()),
            }
        }
    }

    pub fn can(&self) -> &can::RegisterBlock {
        &self.can
    }

    pub fn rcc(&self) -> &rcc::RegisterBlock {
        &self.rcc
    }

    pub fn gpio(&self) -> &gpio::RegisterBlock {
        &self.gpio
    }

    pub fn dbg(&self) -> &dbg::RegisterBlock {
        &self.dbg
    }

    pub fn can_ptr(&self) -> *mut can::RegisterBlock {
        &*self.can as *const can::RegisterBlock as *mut can::RegisterBlock
    }

    pub fn peripherals(&self) -> Peripherals {
        unsafe {
            Peripherals::new(
                self.can_ptr(),
                &*self.rcc as *const rcc::RegisterBlock as *mut _,
                &*self.gpio as *const gpio::RegisterBlock as *mut _,
                &*self.dbg as *const dbg::RegisterBlock as *mut _,
            )
        }
    }

    /// Hardware reset state of TSR: all mailboxes empty.
    pub fn set_all_mailboxes_empty(&self) {
        self.can.tsr.modify(|r| {
            r.set_tme0(true);
            r.set_tme1(true);
            r.set_tme2(true);
        });
    }

    /// Emulates the transmit-request hand-over: a mailbox whose TXRQ is set
    /// stops being empty.
    pub fn latch_transmit_requests(&self) {
        for index in 0..can::TX_MAILBOX_COUNT {
            if self.can.tx[index].tir.read().txrq() {
                let bits = self.can.tsr.read().to_bits() & !(1 << (26 + index));
                self.can.tsr.write(can::Tsr::from_bits(bits));
            }
        }
    }

    /// Emulates the end of a transmission attempt on `index`: RQCP latches,
    /// TME comes back, TXOK/ALST/TERR report the outcome.
    pub fn complete_transmission(&self, index: usize, txok: bool, alst: bool, terr: bool) {
        self.can.tx[index].tir.modify(|r| r.set_txrq(false));
        let mut bits = self.can.tsr.read().to_bits();
        bits |= 1 << (8 * index); // RQCP
        bits |= u32::from(txok) << (8 * index + 1);
        bits |= u32::from(alst) << (8 * index + 2);
        bits |= u32::from(terr) << (8 * index + 3);
        bits |= 1 << (26 + index); // TME
        self.can.tsr.write(can::Tsr::from_bits(bits));
    }

    /// Fires the TX vector and then applies the write-1-to-clear semantics
    /// of the driver's RQCP acknowledge to the plain-memory TSR.
    ///
    /// Stage at most one completed mailbox per call; the acknowledge write
    /// of a second completion would overwrite the first in plain memory.
    pub fn fire_tx(&self, kernel: &MockKernel) {
        let before = self.can.tsr.read().to_bits();
        kernel.fire(IrqVector::Tx);
        let written = self.can.tsr.read().to_bits();
        if written != before {
            // The driver wrote a single-RQCP acknowledge mask. Clear that
            // mailbox's completion flags and keep everything else.
            let index = (written.trailing_zeros() / 8) as usize;
            let completion = 0xF << (8 * index);
            self.can
                .tsr
                .write(can::Tsr::from_bits(before & !completion));
        }
    }

    /// Stages `frame` as the head of hardware FIFO `fifo`.
    pub fn stage_rx_frame(&self, fifo: usize, frame: &Frame) {
        let head = &self.can.rx[fifo];
        let mut rir = can::Rir::zero();
        match frame.id() {
            Id::Standard(id) => {
                rir.set_stid(u32::from(id.as_raw()));
            }
            Id::Extended(id) => {
                rir.set_ide(true);
                rir.set_stid(id.as_raw() >> 18);
                rir.set_exid(id.as_raw() & 0x3FFFF);
            }
        }
        rir.set_rtr(frame.is_remote_frame());
        head.rir.write(rir);
        head.rdtr.modify(|r| r.set_dlc(u32::from(frame.dlc())));
        let words = match frame.data() {
            Some(data) => data.as_u32x2(),
            None => [0, 0],
        };
        head.rdlr.write(Raw(words[0]));
        head.rdhr.write(Raw(words[1]));
        self.can.rfr[fifo].modify(|r| r.set_fmp(r.fmp() + 1));
    }

    /// Fires the FIFO vector and emulates the RFOM mailbox release.
    pub fn fire_rx(&self, kernel: &MockKernel, fifo: usize) {
        kernel.fire(if fifo == 0 {
            IrqVector::Rx0
        } else {
            IrqVector::Rx1
        });
        let rfr = &self.can.rfr[fifo];
        if rfr.read().rfom() {
            rfr.modify(|r| {
                r.set_rfom(false);
                r.set_fmp(r.fmp().saturating_sub(1));
            });
        }
    }

    /// Delivers `frame` through the FIFO interrupt path.
    pub fn deliver_rx_frame(&self, kernel: &MockKernel, fifo: usize, frame: &Frame) {
        self.stage_rx_frame(fifo, frame);
        self.fire_rx(kernel, fifo);
    }

    /// Copies a pending TX mailbox into an RX FIFO head, the way a looped-
    /// back transmission would arrive.
    pub fn loop_back_mailbox(&self, mailbox: usize, fifo: usize) {
        let tx = &self.can.tx[mailbox];
        let rx = &self.can.rx[fifo];
        // The RIR layout matches TIR with bit 0 reserved.
        rx.rir
            .write(can::Rir::from_bits(tx.tir.read().to_bits() & !1));
        rx.rdtr.modify(|r| r.set_dlc(tx.tdtr.read().dlc()));
        rx.rdlr.write(tx.tdlr.read());
        rx.rdhr.write(tx.tdhr.read());
        self.can.rfr[fifo].modify(|r| r.set_fmp(r.fmp() + 1));
    }
}
