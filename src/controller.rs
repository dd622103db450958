//! Peripheral lifecycle and the caller-facing operations.

use crate::filter::RxFilter;
use crate::frame::Frame;
use crate::interrupt::Interrupts;
use crate::kernel::{Kernel, MutexGuard};
use crate::pac::generic::RegisterValue;
use crate::pac::{can, gpio, Peripherals};
use crate::rx::RxCore;
use crate::status::StatusCore;
use crate::tx::TxCore;
use crate::{Config, Number, RxFifo};

/// The peripheral clock tree this driver is laid out for: bxCAN on APB1 at
/// 36 MHz, SYSCLK at 72 MHz.
const EXPECTED_CPU_CLOCK_HZ: u32 = 72_000_000;

/// Bounded iteration count of the INAK handshake spins.
const INAK_TIMEOUT: u32 = 0xFFFF;

/// CAN1 pins on port A (default remap).
const CAN_RX_PIN: usize = 11;
const CAN_TX_PIN: usize = 12;

/// BTR words (BRP/TS1/TS2/SJW fields) indexed by sample point and bit rate.
///
/// Rows: CANopen 87.5 %, ARINC 825 75 %. Columns: 1000, 800, 500, 250, 125,
/// 100, 50, 20, 10 kbit/s on the 36 MHz peripheral clock.
/// Ref http://www.bittiming.can-wiki.info/
pub(crate) const BIT_TIMING: [[u32; 9]; 2] = [
    [
        0x001E_0001,
        0x001B_0002,
        0x001E_0003,
        0x001C_0008,
        0x001C_0011,
        0x001E_0013,
        0x001C_002C,
        0x001E_0063,
        0x001C_00E0,
    ],
    [
        0x003C_0001,
        0x0039_0002,
        0x003C_0003,
        0x003A_0008,
        0x003A_0011,
        0x004D_0011,
        0x004D_0023,
        0x004D_0059,
        0x003A_00E0,
    ],
];

/// One live CAN controller.
pub(crate) struct CanResource<'k, K: Kernel> {
    kernel: &'k K,
    config: Config,
    periph: Peripherals,
    tx: TxCore<'k, K>,
    rx: RxCore<'k, K>,
    status: StatusCore<K>,
}

// Shared access is safe: register traffic goes through volatile cells under
// the semaphore/mutex protocol, and the interrupt handles are only touched
// while the resource is exclusively owned (construction and teardown).
unsafe impl<K: Kernel> Send for CanResource<'_, K> {}
unsafe impl<K: Kernel> Sync for CanResource<'_, K> {}

impl<'k, K: Kernel> CanResource<'k, K> {
    /// First construction phase: kernel objects only, no hardware access.
    pub(crate) fn new(kernel: &'k K, config: Config, periph: Peripherals) -> Option<Self> {
        if config.number != Number::Can1 {
            return None;
        }
        let regs = periph.can_ptr();
        let tx = TxCore::new(kernel, regs)?;
        let rx = RxCore::new(kernel, config.reg.mcr.rflm, regs)?;
        let status = StatusCore::new(regs);
        Some(Self {
            kernel,
            config,
            periph,
            tx,
            rx,
            status,
        })
    }

    /// Second construction phase: interrupt registration and the hardware
    /// init sequence. Every step rolls back on failure.
    ///
    /// # Safety
    ///
    /// `self` must stay at its current address until it is dropped; the
    /// registered routines are bound to it.
    pub(crate) unsafe fn activate(&mut self, factory_mutex: &K::Mutex) -> bool {
        let _guard = MutexGuard::new(factory_mutex);

        if !self.check_clocks() {
            return false;
        }
        self.enable_clock(true);
        self.setup_pins();
        if !self.enter_init_mode() {
            self.enable_clock(false);
            return false;
        }
        self.apply_control_config();
        self.apply_bit_timing();
        if !unsafe { self.install_isrs() } {
            self.disable_isrs();
            self.enable_clock(false);
            return false;
        }
        if !self.leave_init_mode() {
            self.disable_isrs();
            self.enable_clock(false);
            return false;
        }
        self.enable_interrupts();
        true
    }

    /// Mirror of the init sequence, run under the factory mutex.
    pub(crate) fn deinitialize(&self, factory_mutex: &K::Mutex) {
        let _guard = MutexGuard::new(factory_mutex);
        self.can().ier.write(can::Ier::from_bits(0));
        self.disable_isrs();
        self.enable_clock(false);
    }

    pub(crate) fn transmit(&self, frame: &Frame) -> bool {
        self.tx.transmit(frame)
    }

    pub(crate) fn receive(&self, frame_out: &mut Frame, fifo: RxFifo) -> bool {
        self.rx.receive(frame_out, fifo)
    }

    pub(crate) fn set_receive_filter(&self, filter: &RxFilter) -> bool {
        self.rx.set_receive_filter(filter)
    }

    pub(crate) fn transmit_error_counter(&self) -> i32 {
        self.tx.max_error_counter()
    }

    fn can(&self) -> &can::RegisterBlock {
        self.periph.can()
    }

    fn check_clocks(&self) -> bool {
        self.kernel.cpu_clock_hz() == EXPECTED_CPU_CLOCK_HZ
    }

    fn enable_clock(&self, enable: bool) {
        self.periph.rcc().apb1enr.modify(|r| r.set_can1en(enable));
    }

    /// RX as input with pull-up, TX as alternate-function push-pull, 50 MHz.
    fn setup_pins(&self) {
        self.periph.rcc().apb2enr.modify(|r| r.set_iopaen(true));
        let port = self.periph.gpio();
        port.crh
            .modify(|r| r.set_pin(CAN_RX_PIN - 8, gpio::MODE_INPUT, gpio::CNF_INPUT_PULL));
        port.odr.modify(|r| r.set_bit(CAN_RX_PIN, true));
        port.crh.modify(|r| {
            r.set_pin(
                CAN_TX_PIN - 8,
                gpio::MODE_OUTPUT_50MHZ,
                gpio::CNF_ALTERNATE_PUSH_PULL,
            )
        });
    }

    fn enter_init_mode(&self) -> bool {
        self.can().mcr.modify(|r| {
            r.set_sleep(false);
            r.set_inrq(true);
        });
        self.wait_inak(true)
    }

    fn leave_init_mode(&self) -> bool {
        self.can().mcr.modify(|r| r.set_inrq(false));
        self.wait_inak(false)
    }

    fn wait_inak(&self, level: bool) -> bool {
        let can = self.can();
        for _ in 0..INAK_TIMEOUT {
            if can.msr.read().inak() == level {
                return true;
            }
        }
        false
    }

    fn apply_control_config(&self) {
        let mcr = &self.config.reg.mcr;
        self.can().mcr.modify(|r| {
            r.set_txfp(mcr.txfp);
            r.set_rflm(mcr.rflm);
            r.set_nart(false);
            r.set_awum(false);
            r.set_abom(false);
            r.set_ttcm(false);
            r.set_dbf(mcr.dbf);
        });
        // The DBGMCU freeze bit always tracks the current config.
        self.periph
            .dbg()
            .cr
            .modify(|r| r.set_dbg_can1_stop(mcr.dbf));
    }

    fn apply_bit_timing(&self) {
        let can = self.can();
        can.btr.modify(|r| {
            r.set_lbkm(self.config.reg.btr.lbkm);
            r.set_silm(self.config.reg.btr.silm);
        });
        let entry = can::Btr::from_bits(
            BIT_TIMING[self.config.sample_point as usize][self.config.bit_rate as usize],
        );
        can.btr.modify(|r| {
            r.set_brp(entry.brp());
            r.set_ts1(entry.ts1());
            r.set_ts2(entry.ts2());
            r.set_sjw(entry.sjw());
        });
    }

    unsafe fn install_isrs(&mut self) -> bool {
        unsafe {
            self.tx.install_isr() && self.rx.install_isrs() && self.status.install_isr(self.kernel)
        }
    }

    fn disable_isrs(&self) {
        self.tx.disable_isr();
        self.rx.disable_isrs();
        self.status.disable_isr();
    }

    fn enable_interrupts(&self) {
        let ints = Interrupts::TRANSMIT_MAILBOX_EMPTY
            | Interrupts::FIFO0_MESSAGE_PENDING
            | Interrupts::FIFO0_FULL
            | Interrupts::FIFO0_OVERRUN
            | Interrupts::FIFO1_MESSAGE_PENDING
            | Interrupts::FIFO1_FULL
            | Interrupts::FIFO1_OVERRUN
            | Interrupts::ERROR_WARNING
            | Interrupts::ERROR_PASSIVE
            | Interrupts::BUS_OFF
            | Interrupts::LAST_ERROR_CODE
            | Interrupts::ERROR
            | Interrupts::WAKEUP
            | Interrupts::SLEEP;
        self.can().ier.write(can::Ier::from_bits(ints.bits()));
    }
}
