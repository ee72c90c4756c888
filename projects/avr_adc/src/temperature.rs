//! Internal temperature sensor.
//!
//! The linear fit below comes from the ATmega328 datasheet and only holds for
//! that silicon; other members of the family need their own coefficients.

use embedded_hal::{
    adc::OneShot,
    blocking::delay::{DelayMs, DelayUs},
};

use crate::{
    adc::{Adc, TempSense},
    regs::RegisterFile,
    wait::{Blocking, WaitStrategy},
};

/// Slope of the fit in thousandths of a degree per LSB (0.782 °C/LSB).
pub const SLOPE_MILLI: i32 = 782;
/// Offset of the fit in degrees.
pub const OFFSET_CELSIUS: i32 = -250;

/// `0.782 * raw - 250`, truncated toward zero.
///
/// Evaluated in integers so the truncation point is exact. Not clamped: the
/// full 10-bit input range maps to -250..=549. Bits above the 10-bit result
/// are ignored.
pub const fn celsius_from_raw(raw: u16) -> i16 {
    let raw = raw & 0x03FF;
    let milli = SLOPE_MILLI * raw as i32 + OFFSET_CELSIUS * 1000;
    (milli / 1000) as i16
}

/// Saturates into the `i8` range.
pub const fn to_i8(celsius: i16) -> i8 {
    if celsius > i8::MAX as i16 {
        i8::MAX
    } else if celsius < i8::MIN as i16 {
        i8::MIN
    } else {
        celsius as i8
    }
}

pub struct TemperatureSensor<R, D, W = Blocking> {
    adc: Adc<R, D, W>,
    sensor: TempSense,
}

impl<R, D, W> TemperatureSensor<R, D, W>
where
    R: RegisterFile,
    D: DelayUs<u32> + DelayMs<u32>,
    W: WaitStrategy,
{
    pub fn new(adc: Adc<R, D, W>, sensor: TempSense) -> Self {
        TemperatureSensor { adc, sensor }
    }

    pub fn read_temperature(&mut self) -> Result<i8, W::Error> {
        self.read_celsius().map(to_i8)
    }

    pub fn read_celsius(&mut self) -> Result<i16, W::Error> {
        let digits: u16 = nb::block!(self.adc.read(&mut self.sensor))?;
        Ok(celsius_from_raw(digits))
    }

    pub fn free(self) -> (Adc<R, D, W>, TempSense) {
        (self.adc, self.sensor)
    }
}
