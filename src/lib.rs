//! Blocking, interrupt-driven driver for the STM32 bxCAN peripheral.
//!
//! The peripheral owns three TX mailboxes, two receive FIFOs of depth 3 and
//! 14 acceptance filter banks. This driver services its four interrupt
//! vectors and exposes a blocking API on top: callers park on counting
//! semaphores supplied by the host kernel, and the interrupt routines wake
//! them as mailboxes drain and FIFOs fill.
//!
//! The host kernel is abstracted behind the [`kernel::Kernel`] trait; the
//! register memory behind [`Peripherals`]. Both are injected into the
//! [`CanFactory`], which arbitrates construction: at most one live
//! controller per controller number.
//!
//! On the thread side, [`Can::transmit`] blocks until a mailbox is free and
//! [`Can::receive`] blocks until a frame is queued. The `critical-section`
//! crate guards the short FIFO hand-off between threads and interrupt
//! routines; link a critical-section implementation for your platform (the
//! host tests use the `std` one).

#![doc(test(attr(deny(unused_imports, unused_must_use))))]
#![no_std]

mod controller;
mod embedded_hal;
mod factory;
mod filter;
mod frame;
mod id;
mod interrupt;
mod readme;
mod rx;
mod status;
mod tx;

pub mod kernel;
pub mod pac;

pub use crate::factory::CanFactory;
pub use crate::filter::{FilterMode, FilterScale, RxFilter};
pub use crate::frame::{Data, Frame, FramePriority};
pub use crate::id::{ExtendedId, Id, StandardId};
pub use crate::interrupt::{Interrupt, Interrupts};
pub use crate::pac::Peripherals;
pub use crate::tx::MailboxState;

use crate::kernel::Kernel;

/// Controller number.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Number {
    /// CAN1, the only master controller on the supported parts.
    #[default]
    Can1 = 0,
    /// CAN2 (not supported by this driver).
    Can2 = 1,
}

/// Bus bit rate on the 36 MHz peripheral clock.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitRate {
    Kbit1000 = 0,
    Kbit800 = 1,
    Kbit500 = 2,
    Kbit250 = 3,
    #[default]
    Kbit125 = 4,
    Kbit100 = 5,
    Kbit50 = 6,
    Kbit20 = 7,
    Kbit10 = 8,
}

/// Position of the sample point within a bit time.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SamplePoint {
    /// 87.5 %, the CANopen recommendation.
    #[default]
    CanOpen = 0,
    /// 75 %, per ARINC 825.
    Arinc825 = 1,
}

/// One of the two hardware receive FIFOs.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxFifo {
    #[default]
    Fifo0 = 0,
    Fifo1 = 1,
}

/// Master-control mode bits exposed to the integrator.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct McrConfig {
    /// Transmit by request order instead of identifier priority.
    pub txfp: bool,
    /// Lock the receive FIFOs on overrun (drop the newest frame).
    pub rflm: bool,
    /// Freeze CAN traffic while the CPU is halted in debug.
    pub dbf: bool,
}

/// Bit-timing mode bits exposed to the integrator.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BtrConfig {
    /// Loopback mode.
    pub lbkm: bool,
    /// Silent mode.
    pub silm: bool,
}

/// Register mode bits copied into the peripheral during init.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterConfig {
    pub mcr: McrConfig,
    pub btr: BtrConfig,
}

/// Configuration of one controller, immutable after creation.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub number: Number,
    pub bit_rate: BitRate,
    pub sample_point: SamplePoint,
    pub reg: RegisterConfig,
}

/// A live CAN controller.
///
/// Handed out by [`CanFactory::create`]; dropping it deinitializes the
/// hardware and frees the controller number.
pub struct Can<'f, 'k, K: Kernel> {
    factory: &'f CanFactory<'k, K>,
}

impl<'f, 'k, K: Kernel> Can<'f, 'k, K> {
    pub(crate) fn bind(factory: &'f CanFactory<'k, K>) -> Self {
        Self { factory }
    }

    /// Queues `frame` for transmission, blocking until a mailbox is free.
    ///
    /// Returns `false` when the wait was cancelled by the kernel.
    pub fn transmit(&self, frame: &Frame) -> bool {
        match self.factory.resource() {
            Some(resource) => resource.transmit(frame),
            None => false,
        }
    }

    /// Receives the next frame from `fifo`, blocking until one is queued.
    ///
    /// Returns `false` when the wait was cancelled by the kernel.
    pub fn receive(&self, frame_out: &mut Frame, fifo: RxFifo) -> bool {
        match self.factory.resource() {
            Some(resource) => resource.receive(frame_out, fifo),
            None => false,
        }
    }

    /// Reprograms one acceptance filter bank.
    pub fn set_receive_filter(&self, filter: &RxFilter) -> bool {
        match self.factory.resource() {
            Some(resource) => resource.set_receive_filter(filter),
            None => false,
        }
    }

    /// The largest transmit error counter across the mailboxes.
    pub fn transmit_error_counter(&self) -> i32 {
        match self.factory.resource() {
            Some(resource) => resource.transmit_error_counter(),
            None => -1,
        }
    }
}

impl<K: Kernel> Drop for Can<'_, '_, K> {
    fn drop(&mut self) {
        self.factory.destroy();
    }
}
