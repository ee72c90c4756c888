//! Polling driver for the ATmega328 ADC.
//!
//! Every conversion runs the same sequence: wait out any conversion still
//! running, select reference and input, let the multiplexer settle, set ADSC
//! (clearing a stale ADIF), wait for ADIF, clear ADIF, then read ADCL
//! followed by ADCH. Reference voltage, result alignment and prescaler
//! are fixed by the driver.

use core::fmt;

use embedded_hal::{
    adc::{Channel, OneShot},
    blocking::delay::{DelayMs, DelayUs},
};
use fugit::{ExtU32, MicrosDurationU32, MillisDurationU32};

use crate::{
    regs::{adcsra, admux, Prescaler, Reference, Register, RegisterFile},
    temperature,
    wait::{Blocking, WaitStrategy},
};

/// Slowest ADC clock. Keeps the converter clock inside the 50-200 kHz window
/// needed for full resolution at common CPU clocks.
pub const PRESCALER: Prescaler = Prescaler::Div128;

/// MUX3:0 code routing the internal temperature sensor to the converter.
pub const TEMPERATURE_MUX: u8 = 0b1000;

/// Single-ended input channel ADC0..ADC7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum AdcChannel {
    Adc0 = 0,
    Adc1 = 1,
    Adc2 = 2,
    Adc3 = 3,
    Adc4 = 4,
    Adc5 = 5,
    Adc6 = 6,
    Adc7 = 7,
}

impl AdcChannel {
    pub const ALL: [AdcChannel; 8] = [
        AdcChannel::Adc0,
        AdcChannel::Adc1,
        AdcChannel::Adc2,
        AdcChannel::Adc3,
        AdcChannel::Adc4,
        AdcChannel::Adc5,
        AdcChannel::Adc6,
        AdcChannel::Adc7,
    ];

    pub const fn index(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for AdcChannel {
    type Error = InvalidChannel;

    fn try_from(index: u8) -> Result<Self, InvalidChannel> {
        AdcChannel::ALL
            .get(usize::from(index))
            .copied()
            .ok_or(InvalidChannel(index))
    }
}

/// A raw channel index outside 0..=7. Such a value would spill into the
/// reference select bits if it reached ADMUX.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidChannel(pub u8);

impl fmt::Display for InvalidChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ADC channel {} out of range 0..=7", self.0)
    }
}

/// What the multiplexer routes to the converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcInput {
    Channel(AdcChannel),
    Temperature,
}

impl AdcInput {
    pub const fn mux_code(self) -> u8 {
        match self {
            AdcInput::Channel(channel) => channel.index(),
            AdcInput::Temperature => TEMPERATURE_MUX,
        }
    }

    /// The sensor output does not track AVCC, so it is measured against the
    /// band-gap.
    pub const fn reference(self) -> Reference {
        match self {
            AdcInput::Channel(_) => Reference::Avcc,
            AdcInput::Temperature => Reference::Internal1V1,
        }
    }
}

/// Settle times inserted between input selection and conversion start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub channel_settle: MicrosDurationU32,
    pub sensor_settle: MillisDurationU32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel_settle: 10.micros(),
            sensor_settle: 10.millis(),
        }
    }
}

impl Config {
    pub fn with_channel_settle(mut self, settle: MicrosDurationU32) -> Self {
        self.channel_settle = settle;
        self
    }

    pub fn with_sensor_settle(mut self, settle: MillisDurationU32) -> Self {
        self.sensor_settle = settle;
        self
    }
}

/// ADC driver owning its register file, a delay provider and the strategy
/// used to wait for conversions.
///
/// Creating the driver does not touch the hardware; call [`Adc::init`] (or
/// [`Adc::enable`]) before reading.
pub struct Adc<R, D, W = Blocking> {
    regs: R,
    delay: D,
    wait: W,
    config: Config,
    temp_sensor_taken: bool,
}

impl<R, D> Adc<R, D, Blocking>
where
    R: RegisterFile,
    D: DelayUs<u32> + DelayMs<u32>,
{
    pub fn new(regs: R, delay: D) -> Self {
        Self::with_config(regs, delay, Blocking, Config::default())
    }
}

impl<R, D, W> Adc<R, D, W>
where
    R: RegisterFile,
    D: DelayUs<u32> + DelayMs<u32>,
    W: WaitStrategy,
{
    pub fn with_config(regs: R, delay: D, wait: W, config: Config) -> Self {
        Adc {
            regs,
            delay,
            wait,
            config,
            temp_sensor_taken: false,
        }
    }

    /// Powers the converter up (`true`) or down (`false`).
    ///
    /// Enabling selects the /128 clock, the AVCC reference and a right
    /// aligned result before ADEN is set. Disabling clears prescaler,
    /// reference and ADEN; it does not abort a running conversion.
    pub fn init(&mut self, enable: bool) {
        if enable {
            self.modify_control(|r| adcsra::ADPS.assign(r, PRESCALER.bits()));
            self.regs.modify(Register::Admux, |r| {
                admux::ADLAR.clear(admux::REFS.assign(r, Reference::Avcc.bits()))
            });
            self.modify_control(|r| adcsra::ADEN.set(r));
            debug!("ADC enabled, clock / {}", PRESCALER.divisor());
        } else {
            self.modify_control(|r| adcsra::ADPS.clear(r));
            self.regs.modify(Register::Admux, |r| admux::REFS.clear(r));
            self.modify_control(|r| adcsra::ADEN.clear(r));
            debug!("ADC disabled");
        }
    }

    pub fn enable(&mut self) {
        self.init(true)
    }

    pub fn disable(&mut self) {
        self.init(false)
    }

    pub fn is_enabled(&mut self) -> bool {
        adcsra::ADEN.test(self.regs.read(Register::Adcsra))
    }

    /// Converts `channel` against AVCC. The result is in 0..=1023.
    pub fn read_channel(&mut self, channel: AdcChannel) -> Result<u16, W::Error> {
        self.convert(AdcInput::Channel(channel))
    }

    /// Raw sample of the internal temperature sensor against the band-gap.
    pub fn read_temperature_raw(&mut self) -> Result<u16, W::Error> {
        self.convert(AdcInput::Temperature)
    }

    /// Die temperature in approximate degrees Celsius, saturated to `i8`.
    pub fn read_internal_temperature(&mut self) -> Result<i8, W::Error> {
        let raw = self.read_temperature_raw()?;
        Ok(temperature::to_i8(temperature::celsius_from_raw(raw)))
    }

    /// Handle for reading the temperature sensor through [`OneShot`].
    /// Only one handle exists at a time; returns `None` while it is out.
    pub fn take_temp_sensor(&mut self) -> Option<TempSense> {
        if self.temp_sensor_taken {
            return None;
        }
        self.temp_sensor_taken = true;
        Some(TempSense { _private: () })
    }

    /// Gives the handle back so it can be taken again.
    pub fn release_temp_sensor(&mut self, sensor: TempSense) {
        let TempSense { .. } = sensor;
        self.temp_sensor_taken = false;
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registers(&self) -> &R {
        &self.regs
    }

    pub fn registers_mut(&mut self) -> &mut R {
        &mut self.regs
    }

    pub fn free(self) -> (R, D, W) {
        (self.regs, self.delay, self.wait)
    }

    fn convert(&mut self, input: AdcInput) -> Result<u16, W::Error> {
        if !self.is_enabled() {
            warn!("conversion on mux {} requested while ADC is disabled", input.mux_code());
        }

        // a conversion left running by an earlier timeout still owns the
        // data registers, and a write to ADSC is ignored until it ends
        let regs = &mut self.regs;
        self.wait
            .wait_until(|| !adcsra::ADSC.test(regs.read(Register::Adcsra)))
            .map_err(|e| {
                warn!("ADC still busy, mux {} not started", input.mux_code());
                e
            })?;

        self.regs.modify(Register::Admux, |r| {
            admux::MUX.assign(
                admux::REFS.assign(r, input.reference().bits()),
                input.mux_code(),
            )
        });
        match input {
            AdcInput::Channel(_) => self.delay.delay_us(self.config.channel_settle.to_micros()),
            AdcInput::Temperature => self.delay.delay_ms(self.config.sensor_settle.to_millis()),
        }

        // start, dropping any stale ADIF in the same write
        self.regs.modify(Register::Adcsra, |r| adcsra::ADSC.set(adcsra::ADIF.set(r)));
        let regs = &mut self.regs;
        self.wait
            .wait_until(|| adcsra::ADIF.test(regs.read(Register::Adcsra)))
            .map_err(|e| {
                warn!("ADC conversion on mux {} did not complete", input.mux_code());
                e
            })?;
        self.regs.modify(Register::Adcsra, |r| adcsra::ADIF.set(r));

        // ADCL first: it locks the pair until ADCH is read
        let low = self.regs.read(Register::Adcl);
        let high = self.regs.read(Register::Adch);
        let raw = combine(high, low);
        trace!("mux {} -> {}", input.mux_code(), raw);
        Ok(raw)
    }

    /// Read-modify-write of ADCSRA that never writes a 1 back into ADIF.
    fn modify_control<F>(&mut self, f: F)
    where
        F: FnOnce(u8) -> u8,
    {
        self.regs.modify(Register::Adcsra, |r| adcsra::ADIF.clear(f(r)));
    }
}

/// Joins a right aligned result. Only the two low bits of `high` count.
pub const fn combine(high: u8, low: u8) -> u16 {
    (((high & 0x03) as u16) << 8) | low as u16
}

/// The internal temperature sensor as an [`embedded_hal::adc::Channel`].
#[derive(Debug)]
pub struct TempSense {
    _private: (),
}

impl<R, D, W> Channel<Adc<R, D, W>> for TempSense {
    type ID = AdcInput;

    fn channel() -> AdcInput {
        AdcInput::Temperature
    }
}

macro_rules! analog_inputs {
    ($($pin:ident => $channel:ident),+ $(,)?) => {
        $(
            #[doc = concat!("Analog input pin wired to `AdcChannel::", stringify!($channel), "`.")]
            #[derive(Debug, Default, Clone, Copy)]
            pub struct $pin;

            impl<R, D, W> Channel<Adc<R, D, W>> for $pin {
                type ID = AdcInput;

                fn channel() -> AdcInput {
                    AdcInput::Channel(AdcChannel::$channel)
                }
            }
        )+
    };
}

analog_inputs!(
    Ain0 => Adc0,
    Ain1 => Adc1,
    Ain2 => Adc2,
    Ain3 => Adc3,
    Ain4 => Adc4,
    Ain5 => Adc5,
    Ain6 => Adc6,
    Ain7 => Adc7,
);

impl<R, D, W, PIN> OneShot<Adc<R, D, W>, u16, PIN> for Adc<R, D, W>
where
    R: RegisterFile,
    D: DelayUs<u32> + DelayMs<u32>,
    W: WaitStrategy,
    PIN: Channel<Adc<R, D, W>, ID = AdcInput>,
{
    type Error = W::Error;

    fn read(&mut self, _pin: &mut PIN) -> nb::Result<u16, Self::Error> {
        self.convert(PIN::channel()).map_err(nb::Error::Other)
    }
}
