//! Strategies for waiting on the conversion-complete flag.

use core::{convert::Infallible, fmt};

use embedded_hal::blocking::delay::DelayUs;
use fugit::MicrosDurationU32;

/// Polls a readiness condition until it holds or the strategy gives up.
pub trait WaitStrategy {
    type Error;

    fn wait_until<F>(&mut self, ready: F) -> Result<(), Self::Error>
    where
        F: FnMut() -> bool;
}

/// Spins until the condition holds. Never gives up, so a peripheral that
/// never raises its flag hangs the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct Blocking;

impl WaitStrategy for Blocking {
    type Error = Infallible;

    fn wait_until<F>(&mut self, mut ready: F) -> Result<(), Infallible>
    where
        F: FnMut() -> bool,
    {
        while !ready() {
            core::hint::spin_loop();
        }
        Ok(())
    }
}

/// Gives up after `max_polls` unsuccessful polls.
#[derive(Debug, Clone, Copy)]
pub struct BoundedRetries {
    max_polls: u32,
}

impl BoundedRetries {
    pub const fn new(max_polls: u32) -> Self {
        BoundedRetries { max_polls }
    }
}

impl WaitStrategy for BoundedRetries {
    type Error = WaitError;

    fn wait_until<F>(&mut self, mut ready: F) -> Result<(), WaitError>
    where
        F: FnMut() -> bool,
    {
        for _ in 0..self.max_polls {
            if ready() {
                return Ok(());
            }
            core::hint::spin_loop();
        }
        // one last look so `max_polls == 0` still observes an already set flag
        if ready() {
            Ok(())
        } else {
            Err(WaitError::RetriesExhausted {
                polls: self.max_polls,
            })
        }
    }
}

/// Gives up once `timeout` has elapsed, sleeping `interval` between polls.
pub struct Deadline<D> {
    delay: D,
    timeout: MicrosDurationU32,
    interval: MicrosDurationU32,
}

impl<D> Deadline<D>
where
    D: DelayUs<u32>,
{
    pub fn new(delay: D, timeout: MicrosDurationU32, interval: MicrosDurationU32) -> Self {
        Deadline {
            delay,
            timeout,
            interval,
        }
    }

    pub fn free(self) -> D {
        self.delay
    }
}

impl<D> WaitStrategy for Deadline<D>
where
    D: DelayUs<u32>,
{
    type Error = WaitError;

    fn wait_until<F>(&mut self, mut ready: F) -> Result<(), WaitError>
    where
        F: FnMut() -> bool,
    {
        let budget = self.timeout.to_micros();
        let step = self.interval.to_micros().max(1);
        let mut waited = 0u32;
        loop {
            if ready() {
                return Ok(());
            }
            if waited >= budget {
                return Err(WaitError::DeadlineElapsed { waited_us: waited });
            }
            let pause = step.min(budget - waited);
            self.delay.delay_us(pause);
            waited += pause;
        }
    }
}

/// A bounded wait ran out before the conversion finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaitError {
    RetriesExhausted { polls: u32 },
    DeadlineElapsed { waited_us: u32 },
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitError::RetriesExhausted { polls } => {
                write!(f, "conversion not complete after {} polls", polls)
            }
            WaitError::DeadlineElapsed { waited_us } => {
                write!(f, "conversion not complete after {} us", waited_us)
            }
        }
    }
}
