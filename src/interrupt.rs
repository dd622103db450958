//! Interrupt types.

use core::ops;

/// bxCAN interrupt sources.
///
/// The discriminants are the bit positions in the interrupt enable register.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Interrupt {
    Sleep = 17,
    Wakeup = 16,
    Error = 15,
    LastErrorCode = 11,
    BusOff = 10,
    ErrorPassive = 9,
    ErrorWarning = 8,
    Fifo1Overrun = 6,
    Fifo1Full = 5,
    Fifo1MessagePending = 4,
    Fifo0Overrun = 3,
    Fifo0Full = 2,
    Fifo0MessagePending = 1,
    TransmitMailboxEmpty = 0,
}

bitflags::bitflags! {
    /// A set of bxCAN interrupts.
    pub struct Interrupts: u32 {
        const SLEEP = 1 << 17;
        const WAKEUP = 1 << 16;
        const ERROR = 1 << 15;
        const LAST_ERROR_CODE = 1 << 11;
        const BUS_OFF = 1 << 10;
        const ERROR_PASSIVE = 1 << 9;
        const ERROR_WARNING = 1 << 8;
        const FIFO1_OVERRUN = 1 << 6;
        const FIFO1_FULL = 1 << 5;
        const FIFO1_MESSAGE_PENDING = 1 << 4;
        const FIFO0_OVERRUN = 1 << 3;
        const FIFO0_FULL = 1 << 2;
        const FIFO0_MESSAGE_PENDING = 1 << 1;
        const TRANSMIT_MAILBOX_EMPTY = 1 << 0;
    }
}

impl From<Interrupt> for Interrupts {
    fn from(i: Interrupt) -> Self {
        Self::from_bits_truncate(1 << i as u32)
    }
}

/// Adds an interrupt to the interrupt set.
impl ops::BitOrAssign<Interrupt> for Interrupts {
    fn bitor_assign(&mut self, rhs: Interrupt) {
        *self |= Self::from(rhs);
    }
}
