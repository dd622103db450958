//! Acceptance filter bank configuration.

use crate::frame::IdReg;
use crate::pac::can::FILTER_BANK_COUNT;
use crate::{Id, RxFifo};

/// Filter bank mode: match under a mask, or match a list of identifiers.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FilterMode {
    /// Identifier/mask pairs.
    IdMask,
    /// Identifier lists.
    IdList,
}

/// Filter bank scale.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FilterScale {
    /// Two 16-bit registers per bank word.
    Bits16,
    /// One 32-bit register per bank word.
    Bits32,
}

/// Configuration of one of the 14 acceptance filter banks.
///
/// `bits` carries the bank's two filter registers: FR1 in the low word,
/// FR2 in the high word.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxFilter {
    pub index: usize,
    pub fifo: RxFifo,
    pub mode: FilterMode,
    pub scale: FilterScale,
    pub bits: u64,
}

impl RxFilter {
    /// A 32-bit identifier/mask filter that accepts every frame.
    pub fn accept_all(index: usize, fifo: RxFifo) -> Self {
        Self {
            index,
            fifo,
            mode: FilterMode::IdMask,
            scale: FilterScale::Bits32,
            bits: 0,
        }
    }

    /// A single 32-bit identifier/mask filter.
    ///
    /// Only the identifier bits that are set in `mask` take part in the
    /// match; IDE and RTR must match exactly.
    pub fn mask32(index: usize, fifo: RxFifo, id: Id, mask: u32) -> Self {
        let (id_word, mask_word) = match id {
            Id::Standard(id) => (
                u32::from(id.as_raw()) << IdReg::STANDARD_SHIFT,
                (mask << IdReg::STANDARD_SHIFT) & IdReg::STANDARD_MASK,
            ),
            Id::Extended(id) => (
                id.as_raw() << IdReg::EXTENDED_SHIFT | IdReg::IDE_MASK,
                (mask << IdReg::EXTENDED_SHIFT) & IdReg::EXTENDED_MASK,
            ),
        };
        let mask_word = mask_word | IdReg::IDE_MASK | IdReg::RTR_MASK;
        Self {
            index,
            fifo,
            mode: FilterMode::IdMask,
            scale: FilterScale::Bits32,
            bits: u64::from(id_word) | u64::from(mask_word) << 32,
        }
    }

    /// A raw bank configuration.
    pub fn raw(index: usize, fifo: RxFifo, mode: FilterMode, scale: FilterScale, bits: u64) -> Self {
        Self {
            index,
            fifo,
            mode,
            scale,
            bits,
        }
    }

    /// Whether the bank index addresses one of the available banks.
    pub(crate) fn is_index_valid(&self) -> bool {
        self.index < FILTER_BANK_COUNT
    }

    /// The bank's FR1/FR2 register words.
    pub(crate) fn bank_words(&self) -> (u32, u32) {
        (self.bits as u32, (self.bits >> 32) as u32)
    }
}
