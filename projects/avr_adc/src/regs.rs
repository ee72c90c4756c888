//! ADC register map of the ATmega328 and the register file abstraction the
//! driver talks through.

use core::ptr;

use crate::bits::{Bit, Field};

/// The registers touched by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    /// Multiplexer selection: reference, alignment and channel.
    Admux,
    /// Control and status: enable, start, flag and prescaler.
    Adcsra,
    /// Result high byte.
    Adch,
    /// Result low byte.
    Adcl,
}

impl Register {
    /// Data space address on the ATmega328P.
    pub const fn address(self) -> usize {
        match self {
            Register::Adcl => 0x78,
            Register::Adch => 0x79,
            Register::Adcsra => 0x7A,
            Register::Admux => 0x7C,
        }
    }
}

/// ADMUX bits.
pub mod admux {
    use super::*;

    pub const REFS: Field = Field::new(6, 2);
    pub const ADLAR: Bit = Bit::new(5);
    pub const MUX: Field = Field::new(0, 4);
}

/// ADCSRA bits.
pub mod adcsra {
    use super::*;

    pub const ADEN: Bit = Bit::new(7);
    pub const ADSC: Bit = Bit::new(6);
    pub const ADATE: Bit = Bit::new(5);
    /// Write-one-to-clear.
    pub const ADIF: Bit = Bit::new(4);
    pub const ADIE: Bit = Bit::new(3);
    pub const ADPS: Field = Field::new(0, 3);
}

/// Voltage reference selected by REFS1:0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Reference {
    /// External AREF pin, internal reference off.
    Aref = 0b00,
    /// AVCC supply.
    Avcc = 0b01,
    /// Internal 1.1V band-gap.
    Internal1V1 = 0b11,
}

impl Reference {
    pub const fn bits(self) -> u8 {
        self as u8
    }

    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0b11 {
            0b00 => Some(Reference::Aref),
            0b01 => Some(Reference::Avcc),
            0b11 => Some(Reference::Internal1V1),
            _ => None,
        }
    }
}

/// ADC clock division factor selected by ADPS2:0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Prescaler {
    Div2 = 0b001,
    Div4 = 0b010,
    Div8 = 0b011,
    Div16 = 0b100,
    Div32 = 0b101,
    Div64 = 0b110,
    Div128 = 0b111,
}

impl Prescaler {
    pub const fn bits(self) -> u8 {
        self as u8
    }

    pub const fn divisor(self) -> u16 {
        1 << (self as u8)
    }
}

/// Byte-wide access to the ADC register group.
///
/// Reads take `&mut self` because reading hardware registers can have side
/// effects (the ADCL/ADCH pair locks on an ADCL read).
pub trait RegisterFile {
    fn read(&mut self, reg: Register) -> u8;

    fn write(&mut self, reg: Register, value: u8);

    /// Read-modify-write.
    fn modify<F>(&mut self, reg: Register, f: F)
    where
        F: FnOnce(u8) -> u8,
    {
        let value = self.read(reg);
        self.write(reg, f(value));
    }
}

impl<T: RegisterFile + ?Sized> RegisterFile for &mut T {
    fn read(&mut self, reg: Register) -> u8 {
        (**self).read(reg)
    }

    fn write(&mut self, reg: Register, value: u8) {
        (**self).write(reg, value)
    }
}

/// Memory mapped ADC registers of the running ATmega328.
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// # Safety
    ///
    /// Only one `Mmio` may exist at a time, nothing else (interrupt handlers
    /// included) may access the ADC registers while it is alive, and the code
    /// must run on an ATmega328-family device.
    pub unsafe fn new() -> Self {
        Mmio { _private: () }
    }
}

impl RegisterFile for Mmio {
    fn read(&mut self, reg: Register) -> u8 {
        // SAFETY: fixed, aligned, byte-wide I/O address; exclusivity per `Mmio::new`
        unsafe { ptr::read_volatile(reg.address() as *const u8) }
    }

    fn write(&mut self, reg: Register, value: u8) {
        // SAFETY: as above
        unsafe { ptr::write_volatile(reg.address() as *mut u8, value) }
    }
}
