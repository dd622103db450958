//! GPIO port register block (STM32F1 style CRL/CRH configuration).

use super::generic::{register, Raw, Reg, RegisterValue};

/// Pin drives its alternate function, push-pull (CNF = 0b10 with an output
/// MODE), or is an input with pull-up/down (CNF = 0b10 with MODE = 0b00).
pub const CNF_ALTERNATE_PUSH_PULL: u32 = 0b10;
pub const CNF_INPUT_PULL: u32 = 0b10;
/// MODE field values.
pub const MODE_INPUT: u32 = 0b00;
pub const MODE_OUTPUT_50MHZ: u32 = 0b11;

register! {
    /// Port configuration register, one of CRL (pins 0-7) or CRH (pins 8-15).
    pub struct Cr {
    }
}

impl Cr {
    /// Programs the 4-bit MODE/CNF group of `slot` (pin % 8).
    #[inline]
    pub fn set_pin(&mut self, slot: usize, mode: u32, cnf: u32) {
        let lo = slot * 4;
        let mask = 0xF << lo;
        let value = ((cnf << 2) | mode) << lo;
        *self = Self::from_bits((self.to_bits() & !mask) | value);
    }

    #[inline]
    pub fn pin(&self, slot: usize) -> u32 {
        (self.to_bits() >> (slot * 4)) & 0xF
    }
}

register! {
    /// Output data register (GPIOx_ODR). For inputs with CNF = 0b10 the ODR
    /// bit selects pull-up (1) or pull-down (0).
    pub struct Odr {
    }
}

impl Odr {
    #[inline]
    pub fn set_bit(&mut self, pin: usize, value: bool) {
        let bits = if value {
            self.to_bits() | (1 << pin)
        } else {
            self.to_bits() & !(1 << pin)
        };
        *self = Self::from_bits(bits);
    }

    #[inline]
    pub fn bit(&self, pin: usize) -> bool {
        self.to_bits() & (1 << pin) != 0
    }
}

/// One GPIO port register block.
#[repr(C)]
pub struct RegisterBlock {
    pub crl: Reg<Cr>,
    pub crh: Reg<Cr>,
    pub idr: Reg<Raw>,
    pub odr: Reg<Odr>,
    pub bsrr: Reg<Raw>,
    pub brr: Reg<Raw>,
    pub lckr: Reg<Raw>,
}
