//! Typed accessors for single bits and multi-bit fields of an 8-bit register.

/// A single bit position within an 8-bit register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Bit(u8);

impl Bit {
    pub const fn new(position: u8) -> Self {
        assert!(position < 8);
        Bit(position)
    }

    pub const fn position(self) -> u8 {
        self.0
    }

    pub const fn mask(self) -> u8 {
        1 << self.0
    }

    pub const fn set(self, reg: u8) -> u8 {
        reg | self.mask()
    }

    pub const fn clear(self, reg: u8) -> u8 {
        reg & !self.mask()
    }

    pub const fn test(self, reg: u8) -> bool {
        reg & self.mask() != 0
    }

    /// Sets or clears the bit depending on `on`.
    pub const fn assign(self, reg: u8, on: bool) -> u8 {
        if on {
            self.set(reg)
        } else {
            self.clear(reg)
        }
    }
}

/// A contiguous run of `width` bits starting at `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Field {
    offset: u8,
    width: u8,
}

impl Field {
    pub const fn new(offset: u8, width: u8) -> Self {
        assert!(width > 0 && offset + width <= 8);
        Field { offset, width }
    }

    /// Mask of the field's value before shifting into place.
    pub const fn value_mask(self) -> u8 {
        (0xFFu16 >> (8 - self.width)) as u8
    }

    pub const fn mask(self) -> u8 {
        self.value_mask() << self.offset
    }

    pub const fn get(self, reg: u8) -> u8 {
        (reg & self.mask()) >> self.offset
    }

    /// Rewrites the whole field with `value`, leaving the other bits alone.
    /// Bits of `value` beyond the field width are dropped.
    pub const fn assign(self, reg: u8, value: u8) -> u8 {
        (reg & !self.mask()) | ((value & self.value_mask()) << self.offset)
    }

    pub const fn clear(self, reg: u8) -> u8 {
        reg & !self.mask()
    }
}
