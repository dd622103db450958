//! CAN identifier types.

/// Standard 11-bit CAN identifier (0..=0x7FF).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StandardId(u16);

impl StandardId {
    /// CAN ID 0, the highest priority.
    pub const ZERO: Self = Self(0);

    /// CAN ID 0x7FF, the lowest priority.
    pub const MAX: Self = Self(0x7FF);

    /// Tries to create a `StandardId` from a raw 16-bit integer.
    ///
    /// Returns `None` when `raw` is out of range.
    #[inline]
    pub const fn new(raw: u16) -> Option<Self> {
        if raw <= 0x7FF {
            Some(Self(raw))
        } else {
            None
        }
    }

    /// Creates a `StandardId` without checking the range.
    ///
    /// # Safety
    ///
    /// `raw` must not exceed 0x7FF.
    #[inline]
    pub const unsafe fn new_unchecked(raw: u16) -> Self {
        Self(raw)
    }

    /// Returns the identifier value.
    #[inline]
    pub fn as_raw(&self) -> u16 {
        self.0
    }
}

/// Extended 29-bit CAN identifier (0..=0x1FFF_FFFF).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ExtendedId(u32);

impl ExtendedId {
    /// CAN ID 0, the highest priority.
    pub const ZERO: Self = Self(0);

    /// CAN ID 0x1FFFFFFF, the lowest priority.
    pub const MAX: Self = Self(0x1FFF_FFFF);

    /// Tries to create an `ExtendedId` from a raw 32-bit integer.
    ///
    /// Returns `None` when `raw` is out of range.
    #[inline]
    pub const fn new(raw: u32) -> Option<Self> {
        if raw <= 0x1FFF_FFFF {
            Some(Self(raw))
        } else {
            None
        }
    }

    /// Creates an `ExtendedId` without checking the range.
    ///
    /// # Safety
    ///
    /// `raw` must not exceed 0x1FFF_FFFF.
    #[inline]
    pub const unsafe fn new_unchecked(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the identifier value.
    #[inline]
    pub fn as_raw(&self) -> u32 {
        self.0
    }

    /// Returns the Base ID part of this extended identifier.
    #[inline]
    pub fn standard_id(&self) -> StandardId {
        // Standard ID is the upper 11 bits.
        StandardId((self.0 >> 18) as u16)
    }
}

/// A CAN identifier, standard or extended.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Id {
    /// Standard 11-bit identifier.
    Standard(StandardId),
    /// Extended 29-bit identifier.
    Extended(ExtendedId),
}

impl From<StandardId> for Id {
    #[inline]
    fn from(id: StandardId) -> Self {
        Id::Standard(id)
    }
}

impl From<ExtendedId> for Id {
    #[inline]
    fn from(id: ExtendedId) -> Self {
        Id::Extended(id)
    }
}
