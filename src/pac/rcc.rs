//! Reset and clock control register block, trimmed to the enable registers
//! the driver programs.

use super::generic::{register, Raw, Reg};

register! {
    /// APB2 peripheral clock enable register (RCC_APB2ENR).
    pub struct Apb2enr {
        bit afioen/set_afioen: 0;
        bit iopaen/set_iopaen: 2;
        bit iopben/set_iopben: 3;
        bit iopcen/set_iopcen: 4;
    }
}

register! {
    /// APB1 peripheral clock enable register (RCC_APB1ENR).
    pub struct Apb1enr {
        bit can1en/set_can1en: 25;
    }
}

/// The RCC register block.
#[repr(C)]
pub struct RegisterBlock {
    pub cr: Reg<Raw>,
    pub cfgr: Reg<Raw>,
    pub cir: Reg<Raw>,
    pub apb2rstr: Reg<Raw>,
    pub apb1rstr: Reg<Raw>,
    pub ahbenr: Reg<Raw>,
    pub apb2enr: Reg<Apb2enr>,
    pub apb1enr: Reg<Apb1enr>,
    pub bdcr: Reg<Raw>,
    pub csr: Reg<Raw>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem;

    #[test]
    fn enable_register_offsets() {
        assert_eq!(mem::offset_of!(RegisterBlock, apb2enr), 0x18);
        assert_eq!(mem::offset_of!(RegisterBlock, apb1enr), 0x1C);
    }
}
