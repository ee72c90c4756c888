//! Host-side model of the ADC register group, for exercising the driver
//! without hardware.

use embedded_hal::blocking::delay::{DelayMs, DelayUs};

use crate::regs::{adcsra, admux, Register, RegisterFile};

/// Register-level model of the ATmega328 ADC.
///
/// A conversion starts when ADSC is written while ADEN is set. It latches the
/// ADMUX contents at that moment, stays busy for `polls_per_conversion` reads
/// of ADCSRA, then clears ADSC, raises ADIF and loads ADCH:ADCL.
#[derive(Debug, Clone)]
pub struct SimRegisters {
    admux: u8,
    adcsra: u8,
    adch: u8,
    adcl: u8,
    samples: [u16; 16],
    forced: Option<(u8, u8)>,
    polls_per_conversion: u32,
    stuck: bool,
    busy: Option<Busy>,
    stats: SimStats,
    low_read: bool,
}

#[derive(Debug, Clone, Copy)]
struct Busy {
    remaining: u32,
    admux: u8,
}

/// Counters gathered while the simulated ADC runs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SimStats {
    pub conversions_started: u32,
    pub conversions_completed: u32,
    /// ADCSRA reads that found a conversion still running.
    pub busy_polls: u32,
    pub flag_clears: u32,
    /// ADCH reads not preceded by an ADCL read.
    pub order_violations: u32,
    /// ADMUX seen when the last conversion started.
    pub last_started_admux: Option<u8>,
}

impl Default for SimRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl SimRegisters {
    /// Power-on reset state, every sample 0, conversions finishing on the
    /// first poll.
    pub fn new() -> Self {
        SimRegisters {
            admux: 0,
            adcsra: 0,
            adch: 0,
            adcl: 0,
            samples: [0; 16],
            forced: None,
            polls_per_conversion: 0,
            stuck: false,
            busy: None,
            stats: SimStats::default(),
            low_read: false,
        }
    }

    /// Number of busy ADCSRA reads before a conversion completes.
    pub fn with_polls_per_conversion(mut self, polls: u32) -> Self {
        self.polls_per_conversion = polls;
        self
    }

    /// Value converted whenever MUX3:0 equals `mux` at conversion start.
    /// Truncated to 10 bits.
    pub fn set_sample(&mut self, mux: u8, value: u16) {
        self.samples[usize::from(mux & 0x0F)] = value & 0x03FF;
    }

    /// Loads exactly these bytes into ADCH:ADCL on every completion,
    /// bypassing the sample table and alignment.
    pub fn force_result(&mut self, high: u8, low: u8) {
        self.forced = Some((high, low));
    }

    /// A stuck converter never raises ADIF.
    pub fn set_stuck(&mut self, stuck: bool) {
        self.stuck = stuck;
    }

    /// Raw register contents, without read side effects.
    pub fn peek(&self, reg: Register) -> u8 {
        match reg {
            Register::Admux => self.admux,
            Register::Adcsra => self.adcsra,
            Register::Adch => self.adch,
            Register::Adcl => self.adcl,
        }
    }

    /// Overwrites a register, without write side effects.
    pub fn poke(&mut self, reg: Register, value: u8) {
        match reg {
            Register::Admux => self.admux = value,
            Register::Adcsra => self.adcsra = value,
            Register::Adch => self.adch = value,
            Register::Adcl => self.adcl = value,
        }
    }

    pub fn stats(&self) -> SimStats {
        self.stats
    }

    pub fn is_converting(&self) -> bool {
        self.busy.is_some()
    }

    fn start_conversion(&mut self) {
        self.stats.conversions_started += 1;
        self.stats.last_started_admux = Some(self.admux);
        self.busy = Some(Busy {
            remaining: self.polls_per_conversion,
            admux: self.admux,
        });
    }

    fn poll(&mut self) {
        let Some(mut busy) = self.busy else {
            return;
        };
        if self.stuck || busy.remaining > 0 {
            busy.remaining = busy.remaining.saturating_sub(1);
            self.busy = Some(busy);
            self.stats.busy_polls += 1;
            return;
        }
        self.busy = None;
        self.complete(busy.admux);
    }

    fn complete(&mut self, latched_admux: u8) {
        let (high, low) = match self.forced {
            Some(bytes) => bytes,
            None => {
                let value = self.samples[usize::from(admux::MUX.get(latched_admux))];
                if admux::ADLAR.test(latched_admux) {
                    ((value >> 2) as u8, ((value & 0x03) << 6) as u8)
                } else {
                    ((value >> 8) as u8, (value & 0xFF) as u8)
                }
            }
        };
        self.adch = high;
        self.adcl = low;
        self.adcsra = adcsra::ADIF.set(adcsra::ADSC.clear(self.adcsra));
        self.stats.conversions_completed += 1;
    }
}

impl RegisterFile for SimRegisters {
    fn read(&mut self, reg: Register) -> u8 {
        match reg {
            Register::Adcsra => {
                self.poll();
                self.adcsra
            }
            Register::Adcl => {
                self.low_read = true;
                self.adcl
            }
            Register::Adch => {
                if !self.low_read {
                    self.stats.order_violations += 1;
                }
                self.low_read = false;
                self.adch
            }
            Register::Admux => self.admux,
        }
    }

    fn write(&mut self, reg: Register, value: u8) {
        match reg {
            Register::Admux => self.admux = value,
            Register::Adcsra => {
                let flag = adcsra::ADIF;
                let mut next = flag.clear(value) | (self.adcsra & flag.mask());
                if flag.test(value) && flag.test(self.adcsra) {
                    next = flag.clear(next);
                    self.stats.flag_clears += 1;
                }
                let starting = adcsra::ADSC.test(value)
                    && adcsra::ADEN.test(next)
                    && self.busy.is_none();
                // ADSC reads back as one only while a conversion runs
                next = if starting || self.busy.is_some() {
                    adcsra::ADSC.set(next)
                } else {
                    adcsra::ADSC.clear(next)
                };
                self.adcsra = next;
                if starting {
                    self.start_conversion();
                }
            }
            // data registers are read-only
            Register::Adch | Register::Adcl => {}
        }
    }
}

/// Delay provider that only records what it was asked to do.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SimDelay {
    pub calls: u32,
    pub total_us: u64,
    pub last_us: Option<u32>,
    pub last_ms: Option<u32>,
}

impl SimDelay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DelayUs<u32> for SimDelay {
    fn delay_us(&mut self, us: u32) {
        self.calls += 1;
        self.total_us += u64::from(us);
        self.last_us = Some(us);
    }
}

impl DelayMs<u32> for SimDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.calls += 1;
        self.total_us += u64::from(ms) * 1000;
        self.last_ms = Some(ms);
    }
}
