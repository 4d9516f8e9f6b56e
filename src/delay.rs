//! Delay providers
//!
//! [`TimerDelay`] turns any timer into a blocking delay provider. The
//! timer is set up as a free-running 1 MHz counter, see
//! [`Timer::init_delay`], and the delays spin on the counter.
//!
//! # Examples
//!
//! ```ignore
//! let mut delay = TimerDelay::new(dp.TIM2.timer(), &rcc)?;
//!
//! delay.delay_ms(500_u32);
//!
//! // Release the timer from the delay
//! let timer = delay.free();
//! ```

use cast::u32;
use embedded_hal::blocking::delay::{DelayMs, DelayUs};

use crate::error::Result;
use crate::rcc::Rcc;
use crate::timer::Timer;

/// Spin until `ticks` counter ticks have elapsed, returning the number of
/// ticks actually waited
///
/// `now` reads a free-running up-counter that wraps at `mask`. Elapsed
/// time is measured as `(now - start) & mask`, which is correct across a
/// wraparound as long as fewer than `mask` ticks pass between two reads.
/// Waits longer than half the counter range are split into chunks so
/// that invariant holds whatever `ticks` is.
pub fn wait_ticks<F>(ticks: u32, mask: u32, mut now: F) -> u32
where
    F: FnMut() -> u32,
{
    let max_chunk = (mask >> 1).max(1);
    let mut remaining = ticks;
    let mut start = now() & mask;

    while remaining > 0 {
        let chunk = remaining.min(max_chunk);
        while now().wrapping_sub(start) & mask < chunk {
            core::hint::spin_loop();
        }
        // Restart from the chunk boundary so the overshoot counts
        // towards the next chunk
        start = start.wrapping_add(chunk) & mask;
        remaining -= chunk;
    }

    ticks.wrapping_add(now().wrapping_sub(start) & mask)
}

/// Timer as a delay provider
pub struct TimerDelay<'a> {
    timer: Timer<'a>,
}

impl<'a> TimerDelay<'a> {
    /// Configure `timer` as a 1 MHz free-running counter and wrap it
    pub fn new(mut timer: Timer<'a>, rcc: &Rcc) -> Result<Self> {
        timer.init_delay(rcc)?;
        Ok(TimerDelay { timer })
    }

    /// Releases the timer
    pub fn free(self) -> Timer<'a> {
        self.timer
    }
}

impl<'a> DelayUs<u32> for TimerDelay<'a> {
    fn delay_us(&mut self, us: u32) {
        self.timer.delay_us(us);
    }
}

impl<'a> DelayUs<u16> for TimerDelay<'a> {
    fn delay_us(&mut self, us: u16) {
        self.delay_us(u32(us))
    }
}

impl<'a> DelayUs<u8> for TimerDelay<'a> {
    fn delay_us(&mut self, us: u8) {
        self.delay_us(u32(us))
    }
}

impl<'a> DelayMs<u32> for TimerDelay<'a> {
    fn delay_ms(&mut self, ms: u32) {
        self.timer.delay_ms(ms);
    }
}

impl<'a> DelayMs<u16> for TimerDelay<'a> {
    fn delay_ms(&mut self, ms: u16) {
        self.delay_ms(u32(ms));
    }
}

impl<'a> DelayMs<u8> for TimerDelay<'a> {
    fn delay_ms(&mut self, ms: u8) {
        self.delay_ms(u32(ms));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    use crate::bits::tests::zeroed;
    use crate::pac::tim1 as tim;
    use crate::timer::tests::Clocks;
    use crate::timer::{TimerId, TimerState};

    /// Counter advancing by `step` on every read, starting at `start`
    fn counter(start: u32, step: u32, mask: u32) -> (Cell<u32>, impl Fn(&Cell<u32>) -> u32) {
        (Cell::new(start & mask), move |c: &Cell<u32>| {
            let v = c.get();
            c.set(v.wrapping_add(step) & mask);
            v
        })
    }

    fn check(ticks: u32, start: u32, step: u32, mask: u32) {
        let (cell, tick) = counter(start, step, mask);
        let waited = wait_ticks(ticks, mask, || tick(&cell));
        assert!(waited >= ticks, "{} < {}", waited, ticks);
        assert!(waited <= ticks + 2 * step, "{} > {} + {}", waited, ticks, 2 * step);
    }

    #[test]
    fn waits_at_least_requested() {
        for &ticks in &[0, 1, 2, 7, 100, 1_000] {
            check(ticks, 0, 1, 0xFFFF);
            check(ticks, 0, 3, 0xFFFF);
        }
    }

    #[test]
    /// The counter wraps during the wait
    fn wraparound() {
        check(100, 0xFFF0, 1, 0xFFFF);
        check(100, 0xFFF0, 3, 0xFFFF);
        check(50, u32::MAX - 10, 3, u32::MAX);
    }

    #[test]
    /// Longer than half the counter range
    fn long_wait_is_chunked() {
        check(0x1_8000, 0x1234, 3, 0xFFFF);
        check(0xFFFF, 0, 1, 0xFFFF);
    }

    #[test]
    fn wraps_timer() {
        let clocks = Clocks::hsi();
        let rcc = clocks.rcc();
        let tim: tim::RegisterBlock = zeroed();
        let delay = TimerDelay::new(Timer::from_registers(&tim, TimerId::TIM2), &rcc).unwrap();
        assert_eq!(tim.psc.read().bits(), 15);
        let timer = delay.free();
        assert_eq!(timer.state(), TimerState::Running);
    }
}
