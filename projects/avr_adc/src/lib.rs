//! Polling driver for the analog-to-digital converter of ATmega328-class
//! microcontrollers.
//!
//! ```no_run
//! use avr_adc::{regs::Mmio, Adc, AdcChannel};
//! # struct Delay;
//! # impl embedded_hal::blocking::delay::DelayUs<u32> for Delay { fn delay_us(&mut self, _: u32) {} }
//! # impl embedded_hal::blocking::delay::DelayMs<u32> for Delay { fn delay_ms(&mut self, _: u32) {} }
//!
//! let regs = unsafe { Mmio::new() };
//! let mut adc = Adc::new(regs, Delay);
//! adc.init(true);
//!
//! let Ok(raw) = adc.read_channel(AdcChannel::Adc0) else { unreachable!() };
//! let Ok(celsius) = adc.read_internal_temperature() else { unreachable!() };
//! ```
#![cfg_attr(not(test), no_std)]

// MUST be the first module
mod fmt;

pub mod adc;
pub mod bits;
pub mod regs;
pub mod sim;
pub mod temperature;
pub mod wait;

pub use adc::{
    combine, Adc, AdcChannel, AdcInput, Ain0, Ain1, Ain2, Ain3, Ain4, Ain5, Ain6, Ain7, Config,
    InvalidChannel, TempSense, PRESCALER, TEMPERATURE_MUX,
};
pub use temperature::TemperatureSensor;
pub use wait::{Blocking, BoundedRetries, Deadline, WaitError, WaitStrategy};
