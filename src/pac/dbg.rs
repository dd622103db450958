//! MCU debug component register block (DBGMCU).

use super::generic::{register, Raw, Reg};

register! {
    /// Debug MCU configuration register (DBGMCU_CR).
    pub struct Cr {
        bit dbg_can1_stop/set_dbg_can1_stop: 14;
    }
}

/// The DBGMCU register block.
#[repr(C)]
pub struct RegisterBlock {
    pub idcode: Reg<Raw>,
    pub cr: Reg<Cr>,
}
