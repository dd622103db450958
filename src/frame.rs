//! CAN frames and their hardware identifier encoding.

use core::cmp::{Ord, Ordering};
use core::ops::{Deref, DerefMut};

use crate::{ExtendedId, Id, StandardId};

/// Identifier of a CAN message, in the bit layout of the TX/RX mailbox
/// identifier registers.
///
/// The `Ord` trait can be used to determine the frame’s priority this ID
/// belongs to. Lower identifier values have a higher priority. Additionally
/// standard frames have a higher priority than extended frames and data
/// frames have a higher priority than remote frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) struct IdReg(u32);

impl IdReg {
    pub(crate) const STANDARD_SHIFT: u32 = 21;
    pub(crate) const STANDARD_MASK: u32 = 0x7FF << Self::STANDARD_SHIFT;

    pub(crate) const EXTENDED_SHIFT: u32 = 3;
    pub(crate) const EXTENDED_MASK: u32 = 0x1FFF_FFFF << Self::EXTENDED_SHIFT;

    pub(crate) const IDE_MASK: u32 = 0x0000_0004;

    pub(crate) const RTR_MASK: u32 = 0x0000_0002;

    /// Creates a new standard identifier (11bit, Range: 0..0x7FF)
    fn new_standard(id: StandardId) -> Self {
        Self(u32::from(id.as_raw()) << Self::STANDARD_SHIFT)
    }

    /// Creates a new extendended identifier (29bit , Range: 0..0x1FFFFFFF).
    fn new_extended(id: ExtendedId) -> IdReg {
        Self(id.as_raw() << Self::EXTENDED_SHIFT | Self::IDE_MASK)
    }

    /// Recovers an identifier from a mailbox identifier register, dropping
    /// the TXRQ bit.
    pub(crate) fn from_register(reg: u32) -> IdReg {
        Self(reg & 0xFFFF_FFFE)
    }

    /// Returns the raw register word (TXRQ clear).
    pub(crate) fn bits(self) -> u32 {
        self.0
    }

    /// Sets the remote transmission (RTR) flag. This marks the identifier as
    /// being part of a remote frame.
    #[must_use = "returns a new IdReg without modifying `self`"]
    fn with_rtr(self, rtr: bool) -> IdReg {
        if rtr {
            Self(self.0 | Self::RTR_MASK)
        } else {
            Self(self.0 & !Self::RTR_MASK)
        }
    }

    /// Returns the identifier.
    fn to_id(self) -> Id {
        if self.is_extended() {
            Id::Extended(unsafe { ExtendedId::new_unchecked(self.0 >> Self::EXTENDED_SHIFT) })
        } else {
            Id::Standard(unsafe {
                StandardId::new_unchecked((self.0 >> Self::STANDARD_SHIFT) as u16)
            })
        }
    }

    /// Returns `true` if the identifier is an extended identifier.
    fn is_extended(self) -> bool {
        self.0 & Self::IDE_MASK != 0
    }

    /// Returns `true` if the identifer is part of a remote frame (RTR bit set).
    fn rtr(self) -> bool {
        self.0 & Self::RTR_MASK != 0
    }
}

impl From<Id> for IdReg {
    fn from(id: Id) -> Self {
        match id {
            Id::Standard(s) => IdReg::new_standard(s),
            Id::Extended(e) => IdReg::new_extended(e),
        }
    }
}

impl Ord for IdReg {
    fn cmp(&self, other: &Self) -> Ordering {
        // When the IDs match, data frames have priority over remote frames.
        let rtr = self.rtr().cmp(&other.rtr()).reverse();

        let id_a = self.to_id();
        let id_b = other.to_id();
        match (id_a, id_b) {
            (Id::Standard(a), Id::Standard(b)) => {
                // Lower IDs have priority over higher IDs.
                a.as_raw().cmp(&b.as_raw()).reverse().then(rtr)
            }
            (Id::Extended(a), Id::Extended(b)) => a.as_raw().cmp(&b.as_raw()).reverse().then(rtr),
            (Id::Standard(a), Id::Extended(b)) => {
                // Standard frames have priority over extended frames if their Base IDs match.
                a.as_raw()
                    .cmp(&b.standard_id().as_raw())
                    .reverse()
                    .then(Ordering::Greater)
            }
            (Id::Extended(a), Id::Standard(b)) => a
                .standard_id()
                .as_raw()
                .cmp(&b.as_raw())
                .reverse()
                .then(Ordering::Less),
        }
    }
}

impl PartialOrd for IdReg {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A CAN data or remote frame.
///
/// Two frames compare equal only when every field matches bit for bit:
/// identifier, IDE and RTR flags, DLC, and all eight payload bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    pub(crate) id: IdReg,
    pub(crate) data: Data,
}

impl Frame {
    /// Creates a new data frame.
    pub fn new_data(id: impl Into<Id>, data: impl Into<Data>) -> Self {
        Self {
            id: IdReg::from(id.into()),
            data: data.into(),
        }
    }

    /// Creates a new remote frame with configurable data length code (DLC).
    ///
    /// Returns `None` when `dlc` exceeds 8.
    pub fn new_remote(id: impl Into<Id>, dlc: u8) -> Option<Self> {
        if dlc > 8 {
            return None;
        }
        let mut data = Data::empty();
        // A remote frame has a DLC but carries no payload.
        data.len = dlc;
        Some(Self {
            id: IdReg::from(id.into()).with_rtr(true),
            data,
        })
    }

    /// Returns `true` if this frame is an extended frame.
    #[inline]
    pub fn is_extended(&self) -> bool {
        self.id.is_extended()
    }

    /// Returns `true` if this frame is a standard frame.
    #[inline]
    pub fn is_standard(&self) -> bool {
        !self.id.is_extended()
    }

    /// Returns `true` if this frame is a remote frame.
    #[inline]
    pub fn is_remote_frame(&self) -> bool {
        self.id.rtr()
    }

    /// Returns `true` if this frame is a data frame.
    #[inline]
    pub fn is_data_frame(&self) -> bool {
        !self.is_remote_frame()
    }

    /// Returns the frame identifier.
    #[inline]
    pub fn id(&self) -> Id {
        self.id.to_id()
    }

    /// Returns the data length code.
    #[inline]
    pub fn dlc(&self) -> u8 {
        self.data.len
    }

    /// Returns the payload of a data frame, or `None` for remote frames.
    pub fn data(&self) -> Option<&Data> {
        if self.is_data_frame() {
            Some(&self.data)
        } else {
            None
        }
    }

    /// Returns the priority of the frame during bus arbitration.
    pub fn priority(&self) -> FramePriority {
        FramePriority(self.id)
    }

    /// Reassembles a frame from the words of a mailbox register quartet.
    pub(crate) fn from_mailbox_words(ir: u32, dlc: u32, low: u32, high: u32) -> Self {
        let mut data = Data::empty();
        data.bytes[0..4].copy_from_slice(&low.to_ne_bytes());
        data.bytes[4..8].copy_from_slice(&high.to_ne_bytes());
        // The hardware DLC field is 4 bits wide.
        data.len = core::cmp::min(dlc, 8) as u8;
        Self {
            id: IdReg::from_register(ir),
            data,
        }
    }

    /// Returns the two payload register words of this frame.
    pub(crate) fn payload_words(&self) -> (u32, u32) {
        let [low, high] = self.data.as_u32x2();
        (low, high)
    }
}

/// Priority of a frame during bus arbitration. Frames with a higher priority
/// win arbitration against frames with a lower one.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FramePriority(IdReg);

/// Payload of a CAN data frame.
///
/// The eight payload bytes are also viewable as four half-words, two words
/// or one double-word, matching the mailbox data register granularity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Data {
    pub(crate) len: u8,
    pub(crate) bytes: [u8; 8],
}

impl Data {
    /// Creates a data payload from a byte slice.
    ///
    /// Returns `None` when `data` contains more than 8 bytes.
    pub fn new(data: &[u8]) -> Option<Self> {
        if data.len() > 8 {
            return None;
        }
        let mut bytes = [0; 8];
        bytes[..data.len()].copy_from_slice(data);
        Some(Self {
            len: data.len() as u8,
            bytes,
        })
    }

    /// Creates an empty data payload containing 0 bytes.
    #[inline]
    pub const fn empty() -> Self {
        Self {
            len: 0,
            bytes: [0; 8],
        }
    }

    /// Returns all eight payload bytes, including bytes past the DLC.
    #[inline]
    pub fn as_u8x8(&self) -> &[u8; 8] {
        &self.bytes
    }

    /// Returns the payload as four native-endian half-words.
    pub fn as_u16x4(&self) -> [u16; 4] {
        let mut words = [0; 4];
        for (i, word) in words.iter_mut().enumerate() {
            *word = u16::from_ne_bytes([self.bytes[2 * i], self.bytes[2 * i + 1]]);
        }
        words
    }

    /// Returns the payload as the two native-endian data register words.
    pub fn as_u32x2(&self) -> [u32; 2] {
        [
            u32::from_ne_bytes(self.bytes[0..4].try_into().unwrap()),
            u32::from_ne_bytes(self.bytes[4..8].try_into().unwrap()),
        ]
    }

    /// Returns the payload as one native-endian double-word.
    pub fn as_u64(&self) -> u64 {
        u64::from_ne_bytes(self.bytes)
    }
}

impl Deref for Data {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        &self.bytes[..usize::from(self.len)]
    }
}

impl DerefMut for Data {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[..usize::from(self.len)]
    }
}

impl AsRef<[u8]> for Data {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.deref()
    }
}

macro_rules! data_from_array {
    ( $($len:literal),+ ) => {
        $(
            impl From<[u8; $len]> for Data {
                #[inline]
                fn from(array: [u8; $len]) -> Self {
                    let mut bytes = [0; 8];
                    bytes[..$len].copy_from_slice(&array);
                    Self { len: $len, bytes }
                }
            }
        )+
    };
}

data_from_array!(0, 1, 2, 3, 4, 5, 6, 7, 8);

#[cfg(test)]
mod tests;
