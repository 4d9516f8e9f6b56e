//! Timers
//!
//! One [`Timer`] driver covers the advanced (TIM1, TIM8), general purpose
//! (TIM2 to TIM5, TIM9 to TIM14) and basic (TIM6, TIM7) timers. The
//! output compare / PWM and input capture functions live in
//! [`pwm`](crate::pwm) and [`capture`](crate::capture).
//!
//! A timer moves through three states:
//!
//! ```text
//! Disabled --init--> Configured --enable--> Running
//!     ^                  ^  \____disable______/ |
//!     \______deinit______\______________________/
//! ```
//!
//! Prescalers are always derived from the live timer clock reported by
//! the [`Rcc`], so the same code gives the same tick rate at 8, 16, 84
//! or 180 MHz.

use core::sync::atomic::{AtomicBool, Ordering};

use cast::u16;

use crate::delay::wait_ticks;
use crate::pac::{tim1 as tim, Interrupt};
use crate::error::{Error, Result};
use crate::nvic;
use crate::rcc::{Bus, PeripheralClock, Rcc};
use crate::time::Hertz;

// DIER / SR
const UIF: u32 = 1 << 0;

/// Tick rate of the blocking microsecond delay
const DELAY_TICK_HZ: u32 = 1_000_000;
/// Tick rate of the 16-bit millisecond delays
const MS_TICK_HZ: u32 = 10_000;
const MS_TICKS_PER_MS: u32 = MS_TICK_HZ / 1_000;
/// Longest single shot of the 10 kHz millisecond delay
pub const MS_DELAY_MAX: u32 = 0xFFFF / MS_TICKS_PER_MS;

/// Completion flag of the interrupt driven delay, set by
/// [`Timer::handle_irq`]
static DELAY_DONE: AtomicBool = AtomicBool::new(false);

/// Timer instances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerId {
    TIM1,
    TIM2,
    TIM3,
    TIM4,
    TIM5,
    TIM6,
    TIM7,
    TIM8,
    TIM9,
    TIM10,
    TIM11,
    TIM12,
    TIM13,
    TIM14,
}

impl TimerId {
    /// TIM1 and TIM8 have a main output enable gate and a repetition
    /// counter
    pub fn is_advanced(self) -> bool {
        matches!(self, TimerId::TIM1 | TimerId::TIM8)
    }

    /// TIM6 and TIM7 only count up and have no channels
    pub fn is_basic(self) -> bool {
        matches!(self, TimerId::TIM6 | TimerId::TIM7)
    }

    /// Counter mask, 32 bits on TIM2 and TIM5
    pub fn counter_mask(self) -> u32 {
        match self {
            TimerId::TIM2 | TimerId::TIM5 => u32::MAX,
            _ => 0xFFFF,
        }
    }

    /// Number of capture / compare channels
    pub fn channels(self) -> u8 {
        match self {
            TimerId::TIM6 | TimerId::TIM7 => 0,
            TimerId::TIM10 | TimerId::TIM11 | TimerId::TIM13 | TimerId::TIM14 => 1,
            TimerId::TIM9 | TimerId::TIM12 => 2,
            _ => 4,
        }
    }

    pub fn bus(self) -> Bus {
        match self {
            TimerId::TIM1
            | TimerId::TIM8
            | TimerId::TIM9
            | TimerId::TIM10
            | TimerId::TIM11 => Bus::APB2,
            _ => Bus::APB1,
        }
    }

    pub fn clock(self) -> PeripheralClock {
        match self {
            TimerId::TIM1 => PeripheralClock::TIM1,
            TimerId::TIM2 => PeripheralClock::TIM2,
            TimerId::TIM3 => PeripheralClock::TIM3,
            TimerId::TIM4 => PeripheralClock::TIM4,
            TimerId::TIM5 => PeripheralClock::TIM5,
            TimerId::TIM6 => PeripheralClock::TIM6,
            TimerId::TIM7 => PeripheralClock::TIM7,
            TimerId::TIM8 => PeripheralClock::TIM8,
            TimerId::TIM9 => PeripheralClock::TIM9,
            TimerId::TIM10 => PeripheralClock::TIM10,
            TimerId::TIM11 => PeripheralClock::TIM11,
            TimerId::TIM12 => PeripheralClock::TIM12,
            TimerId::TIM13 => PeripheralClock::TIM13,
            TimerId::TIM14 => PeripheralClock::TIM14,
        }
    }

    /// NVIC line carrying the update interrupt
    pub fn update_interrupt(self) -> Interrupt {
        match self {
            TimerId::TIM1 | TimerId::TIM10 => Interrupt::TIM1_UP_TIM10,
            TimerId::TIM2 => Interrupt::TIM2,
            TimerId::TIM3 => Interrupt::TIM3,
            TimerId::TIM4 => Interrupt::TIM4,
            TimerId::TIM5 => Interrupt::TIM5,
            TimerId::TIM6 => Interrupt::TIM6_DAC,
            TimerId::TIM7 => Interrupt::TIM7,
            TimerId::TIM8 | TimerId::TIM13 => Interrupt::TIM8_UP_TIM13,
            TimerId::TIM9 => Interrupt::TIM1_BRK_TIM9,
            TimerId::TIM11 => Interrupt::TIM1_TRG_COM_TIM11,
            TimerId::TIM12 => Interrupt::TIM8_BRK_TIM12,
            TimerId::TIM14 => Interrupt::TIM8_TRG_COM_TIM14,
        }
    }

    /// NVIC line carrying the capture / compare interrupts
    pub fn cc_interrupt(self) -> Interrupt {
        match self {
            TimerId::TIM1 => Interrupt::TIM1_CC,
            TimerId::TIM8 => Interrupt::TIM8_CC,
            other => other.update_interrupt(),
        }
    }
}

/// Capture / compare channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    C1 = 0,
    C2 = 1,
    C3 = 2,
    C4 = 3,
}

/// Counting direction and alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CounterMode {
    Up,
    Down,
    /// Compare flags set while counting down
    CenterAligned1,
    /// Compare flags set while counting up
    CenterAligned2,
    /// Compare flags set in both directions
    CenterAligned3,
}

/// Ratio between the timer clock and the dead-time / filter sampling
/// clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockDivision {
    Div1 = 0,
    Div2 = 1,
    Div4 = 2,
}

/// Time base configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerConfig {
    /// PSC, the counter clock is the timer clock / (prescaler + 1)
    pub prescaler: u16,
    /// ARR, 16 bits except on TIM2 and TIM5
    pub period: u32,
    pub counter_mode: CounterMode,
    pub clock_division: ClockDivision,
    /// RCR, TIM1 and TIM8 only
    pub repetition: u8,
    /// Buffer ARR until the next update event
    pub auto_reload_preload: bool,
}

impl Default for TimerConfig {
    fn default() -> Self {
        TimerConfig {
            prescaler: 0,
            period: 0xFFFF,
            counter_mode: CounterMode::Up,
            clock_division: ClockDivision::Div1,
            repetition: 0,
            auto_reload_preload: false,
        }
    }
}

/// Timer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerState {
    Disabled,
    /// Prescaler and period loaded, not counting
    Configured,
    Running,
}

/// Interrupt events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// Counter overflow or underflow
    Update,
    /// Capture or compare on a channel
    CaptureCompare(Channel),
}

impl Event {
    fn mask(self) -> u32 {
        match self {
            Event::Update => UIF,
            Event::CaptureCompare(ch) => 1 << (ch as u32 + 1),
        }
    }
}

/// Prescaler register value giving a counter clock no faster than
/// `tick`
///
/// The division is rounded up so a tick is never shorter than
/// requested. Fails if the timer clock is slower than `tick` or the
/// prescaler does not fit in 16 bits.
pub fn prescaler_for(timer_clock: Hertz, tick: Hertz) -> Result<u16> {
    if tick.0 == 0 || timer_clock.0 < tick.0 {
        return Err(Error::Invalid);
    }
    let div = (timer_clock.0 + tick.0 - 1) / tick.0;
    u16(div - 1).map_err(|_| Error::Invalid)
}

/// PSC and ARR of a single 10 kHz shot lasting `ms`, clamped to
/// [`MS_DELAY_MAX`]
pub fn ms_delay_registers(timer_clock: Hertz, ms: u32) -> Result<(u16, u16)> {
    let psc = prescaler_for(timer_clock, Hertz(MS_TICK_HZ))?;
    let ticks = ms.clamp(1, MS_DELAY_MAX) * MS_TICKS_PER_MS;
    Ok((psc, (ticks - 1) as u16))
}

/// Extension trait for the timer handles
pub trait TimerExt {
    /// Unconfigured timer driver
    fn timer(self) -> Timer<'static>;
}

macro_rules! hal {
    ($($TIMX:ident,)+) => {
        $(
            impl TimerExt for crate::pac::$TIMX {
                fn timer(self) -> Timer<'static> {
                    // All timers place their registers at the advanced
                    // timer offsets
                    let tim = unsafe { &*(crate::pac::$TIMX::ptr() as *const tim::RegisterBlock) };
                    Timer::from_registers(tim, TimerId::$TIMX)
                }
            }
        )+
    };
}

hal! {
    TIM1, TIM2, TIM3, TIM4, TIM5, TIM6, TIM7,
    TIM8, TIM9, TIM10, TIM11, TIM12, TIM13, TIM14,
}

/// Hardware timer
pub struct Timer<'a> {
    pub(crate) tim: &'a tim::RegisterBlock,
    pub(crate) id: TimerId,
    configured: bool,
}

impl<'a> Timer<'a> {
    pub fn from_registers(tim: &'a tim::RegisterBlock, id: TimerId) -> Self {
        Timer {
            tim,
            id,
            configured: false,
        }
    }

    pub fn id(&self) -> TimerId {
        self.id
    }

    pub fn state(&self) -> TimerState {
        if !self.configured {
            TimerState::Disabled
        } else if self.tim.cr1.read().cen().bit_is_set() {
            TimerState::Running
        } else {
            TimerState::Configured
        }
    }

    /// Input clock of this timer
    pub fn clock(&self, rcc: &Rcc) -> Hertz {
        rcc.timer_clock(self.id.bus())
    }

    /// Enable the timer clock and load the time base
    ///
    /// The counter is stopped and reset. The prescaler and period take
    /// effect immediately through a software update event.
    pub fn init(&mut self, rcc: &Rcc, cfg: &TimerConfig) -> Result<()> {
        if cfg.period > self.id.counter_mask()
            || (cfg.repetition != 0 && !self.id.is_advanced())
            || (self.id.is_basic()
                && (cfg.counter_mode != CounterMode::Up
                    || cfg.clock_division != ClockDivision::Div1))
        {
            return Err(Error::Invalid);
        }

        rcc.enable(self.id.clock());
        self.tim.cr1.modify(|_, w| w.cen().clear_bit());

        let (down, cms) = match cfg.counter_mode {
            CounterMode::Up => (false, 0b00),
            CounterMode::Down => (true, 0b00),
            CounterMode::CenterAligned1 => (false, 0b01),
            CounterMode::CenterAligned2 => (false, 0b10),
            CounterMode::CenterAligned3 => (false, 0b11),
        };
        self.tim.cr1.modify(|_, w| unsafe {
            w.dir()
                .bit(down)
                .opm()
                .clear_bit()
                .cms()
                .bits(cms)
                .ckd()
                .bits(cfg.clock_division as u8)
                .arpe()
                .bit(cfg.auto_reload_preload)
        });

        write_bits!(self.tim.arr, cfg.period);
        write_bits!(self.tim.psc, cfg.prescaler as u32);
        if self.id.is_advanced() {
            write_bits!(self.tim.rcr, cfg.repetition as u32);
        }
        write_bits!(self.tim.cnt, 0);
        self.generate_update();

        self.configured = true;
        debug!(
            "{:?} PSC {} ARR {}",
            self.id, cfg.prescaler, cfg.period
        );
        Ok(())
    }

    /// Stop the timer, reset it and gate its clock
    pub fn deinit(&mut self, rcc: &Rcc) {
        self.tim.cr1.modify(|_, w| w.cen().clear_bit());
        write_bits!(self.tim.dier, 0);
        rcc.reset(self.id.clock());
        rcc.disable(self.id.clock());
        self.configured = false;
    }

    /// Start counting
    pub fn enable(&mut self) {
        self.tim.cr1.modify(|_, w| w.cen().set_bit());
    }

    /// Stop counting
    pub fn disable(&mut self) {
        self.tim.cr1.modify(|_, w| w.cen().clear_bit());
    }

    /// Load PSC and ARR from their preload registers. The update flag
    /// raised by this is cleared.
    pub fn generate_update(&mut self) {
        self.tim.egr.write(|w| w.ug().set_bit());
        self.tim.sr.modify(|_, w| w.uif().clear_bit());
    }

    pub fn set_prescaler(&mut self, psc: u16) {
        write_bits!(self.tim.psc, psc as u32);
    }

    pub fn set_period(&mut self, period: u32) -> Result<()> {
        if period > self.id.counter_mask() {
            return Err(Error::Invalid);
        }
        write_bits!(self.tim.arr, period);
        Ok(())
    }

    pub fn period(&self) -> u32 {
        self.tim.arr.read().bits()
    }

    pub fn set_counter(&mut self, value: u32) {
        write_bits!(self.tim.cnt, value & self.id.counter_mask());
    }

    pub fn counter(&self) -> u32 {
        self.tim.cnt.read().bits() & self.id.counter_mask()
    }

    /// Enable an interrupt event
    pub fn listen(&mut self, event: Event) {
        set_bits!(self.tim.dier, event.mask());
    }

    /// Disable an interrupt event
    pub fn unlisten(&mut self, event: Event) {
        clear_bits!(self.tim.dier, event.mask());
    }

    pub fn is_pending(&self, event: Event) -> bool {
        self.tim.sr.read().bits() & event.mask() != 0
    }

    /// Clears interrupt flag
    pub fn clear_irq(&mut self, event: Event) {
        clear_bits!(self.tim.sr, event.mask());
    }

    pub fn update_interrupt(&self) -> Interrupt {
        self.id.update_interrupt()
    }

    /// Free-running counter at 1 MHz, started
    ///
    /// Fails with [`Error::Invalid`] if the timer clock is slower than
    /// 1 MHz.
    pub fn init_delay(&mut self, rcc: &Rcc) -> Result<()> {
        let prescaler = prescaler_for(self.clock(rcc), Hertz(DELAY_TICK_HZ))?;
        self.init(
            rcc,
            &TimerConfig {
                prescaler,
                period: self.id.counter_mask(),
                ..Default::default()
            },
        )?;
        self.enable();
        Ok(())
    }

    /// Busy-wait `us` microseconds on a timer set up by
    /// [`Timer::init_delay`]
    ///
    /// Counter wraparound is handled by masked subtraction.
    pub fn delay_us(&self, us: u32) {
        let mask = self.id.counter_mask();
        let tim = self.tim;
        wait_ticks(us, mask, || tim.cnt.read().bits());
    }

    /// Busy-wait `ms` milliseconds on a timer set up by
    /// [`Timer::init_delay`]
    pub fn delay_ms(&self, ms: u32) {
        for _ in 0..ms {
            self.delay_us(1_000);
        }
    }

    fn load_ms_shot(&mut self, rcc: &Rcc, ms: u32) -> Result<()> {
        let (psc, arr) = ms_delay_registers(self.clock(rcc), ms)?;
        if !self.configured {
            rcc.enable(self.id.clock());
            self.configured = true;
        }
        self.tim.cr1.modify(|_, w| w.cen().clear_bit());
        write_bits!(self.tim.psc, psc as u32);
        write_bits!(self.tim.arr, arr as u32);
        write_bits!(self.tim.cnt, 0);
        self.generate_update();
        Ok(())
    }

    /// Blocking millisecond delay on a 10 kHz tick, polling the update
    /// flag
    ///
    /// Delays longer than [`MS_DELAY_MAX`] run as several shots.
    /// `ms == 0` returns at once.
    pub fn basic_delay_ms(&mut self, rcc: &Rcc, ms: u32) -> Result<()> {
        let mut remaining = ms;
        while remaining > 0 {
            let shot = remaining.min(MS_DELAY_MAX);
            self.load_ms_shot(rcc, shot)?;
            self.tim.cr1.modify(|_, w| w.opm().set_bit().cen().set_bit());
            while self.tim.sr.read().uif().bit_is_clear() {
                core::hint::spin_loop();
            }
            self.tim.sr.modify(|_, w| w.uif().clear_bit());
            self.tim.cr1.modify(|_, w| w.cen().clear_bit().opm().clear_bit());
            remaining -= shot;
        }
        Ok(())
    }

    /// Arm a single interrupt driven shot of `ms` milliseconds
    ///
    /// Clears the completion flag, enables the update interrupt and
    /// starts counting. The NVIC line is not touched. `ms` is clamped to
    /// [`MS_DELAY_MAX`].
    pub fn start_delay_ms_it(&mut self, rcc: &Rcc, ms: u32) -> Result<()> {
        self.load_ms_shot(rcc, ms)?;
        DELAY_DONE.store(false, Ordering::Release);
        self.tim.dier.modify(|_, w| w.uie().set_bit());
        self.tim.cr1.modify(|_, w| w.cen().set_bit());
        Ok(())
    }

    /// Interrupt driven millisecond delay
    ///
    /// Arms the shot, enables the update interrupt line in the NVIC and
    /// spins until [`Timer::handle_irq`] reports completion. The update
    /// handler of this timer must call [`Timer::handle_irq`].
    pub fn delay_ms_it(&mut self, rcc: &Rcc, ms: u32) -> Result<()> {
        if ms == 0 {
            return Ok(());
        }
        self.start_delay_ms_it(rcc, ms)?;
        nvic::enable(self.id.update_interrupt());
        while !delay_done() {
            core::hint::spin_loop();
        }
        Ok(())
    }

    /// Update interrupt handler
    ///
    /// If the update flag is set with its interrupt enabled: clears the
    /// flag, stops the counter and sets the delay completion flag.
    /// Returns whether it did.
    pub fn handle_irq(&mut self) -> bool {
        if self.tim.sr.read().uif().bit_is_set() && self.tim.dier.read().uie().bit_is_set() {
            self.tim.sr.modify(|_, w| w.uif().clear_bit());
            self.tim.cr1.modify(|_, w| w.cen().clear_bit());
            DELAY_DONE.store(true, Ordering::Release);
            true
        } else {
            false
        }
    }

    /// Check a channel exists on this timer
    pub(crate) fn check_channel(&self, channel: Channel) -> Result<()> {
        if (channel as u8) < self.id.channels() {
            Ok(())
        } else {
            Err(Error::Invalid)
        }
    }

    /// Rewrite the 8-bit CCMR field of a channel
    ///
    /// The output and input views of CCMR1/CCMR2 share one register, the
    /// field is handled as raw bits for both.
    pub(crate) fn update_ccmr<F>(&self, channel: Channel, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        let offset = (channel as u32 % 2) * 8;
        let update = move |bits: u32| {
            let field = f((bits >> offset) & 0xFF) & 0xFF;
            (bits & !(0xFF << offset)) | (field << offset)
        };
        match channel {
            Channel::C1 | Channel::C2 => self
                .tim
                .ccmr1_output()
                .modify(|r, w| unsafe { w.bits(update(r.bits())) }),
            Channel::C3 | Channel::C4 => self
                .tim
                .ccmr2_output()
                .modify(|r, w| unsafe { w.bits(update(r.bits())) }),
        }
    }

    /// Enable bits of the capture/compare outputs and inputs
    pub(crate) fn ccer_bits(&self) -> u32 {
        self.tim.ccer.read().bits()
    }
}

/// Whether the interrupt driven delay has completed
pub fn delay_done() -> bool {
    DELAY_DONE.load(Ordering::Acquire)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bits::tests::{peek, zeroed};
    use crate::pac::{flash, pwr, rcc};

    pub(crate) struct Clocks {
        pub rcc: rcc::RegisterBlock,
        pub flash: flash::RegisterBlock,
        pub pwr: pwr::RegisterBlock,
    }

    impl Clocks {
        /// Reset state: HSI, all dividers 1
        pub fn hsi() -> Self {
            Clocks {
                rcc: zeroed(),
                flash: zeroed(),
                pwr: zeroed(),
            }
        }

        /// SYSCLK from the PLL with the given PLLCFGR and CFGR values
        pub fn pll(pllcfgr: u32, cfgr_dividers: u32) -> Self {
            let c = Clocks::hsi();
            write_bits!(c.rcc.pllcfgr, pllcfgr);
            write_bits!(c.rcc.cfgr, (0b10 << 2) | cfgr_dividers);
            c
        }

        pub fn rcc(&self) -> Rcc<'_> {
            Rcc::from_registers(&self.rcc, &self.flash, &self.pwr)
        }
    }

    // PLLCFGR for 84 MHz from HSI: M16 N336 P4
    const PLL_84MHZ_HSI: u32 = 16 | (336 << 6) | (1 << 16);
    // PLLCFGR for 180 MHz from HSE: M8 N360 P2
    const PLL_180MHZ_HSE: u32 = 8 | (360 << 6) | (1 << 22);
    // CFGR PPRE1 /2
    const APB1_DIV2: u32 = 0b100 << 10;
    // CFGR PPRE1 /4, PPRE2 /2
    const APB1_DIV4_APB2_DIV2: u32 = (0b101 << 10) | (0b100 << 13);

    #[test]
    /// The 1 MHz prescaler follows the live bus clock and APB doubling
    fn delay_prescaler_follows_bus_clock() {
        let cases = [
            // (clock tree, timer, expected PSC, timer clock)
            (Clocks::hsi(), TimerId::TIM2, 15, 16_000_000),
            (Clocks::pll(PLL_84MHZ_HSI, APB1_DIV2), TimerId::TIM2, 83, 84_000_000),
            (Clocks::pll(PLL_84MHZ_HSI, APB1_DIV2), TimerId::TIM9, 83, 84_000_000),
            (Clocks::pll(PLL_180MHZ_HSE, APB1_DIV4_APB2_DIV2), TimerId::TIM5, 89, 90_000_000),
            (Clocks::pll(PLL_180MHZ_HSE, APB1_DIV4_APB2_DIV2), TimerId::TIM1, 179, 180_000_000),
        ];
        for (clocks, id, psc, clk) in cases.iter() {
            let rcc = clocks.rcc();
            let tim: tim::RegisterBlock = zeroed();
            let mut timer = Timer::from_registers(&tim, *id);
            assert_eq!(timer.clock(&rcc), Hertz(*clk));
            timer.init_delay(&rcc).unwrap();
            assert_eq!(tim.psc.read().bits(), *psc);
            assert_eq!(tim.arr.read().bits(), id.counter_mask());
            assert_eq!(timer.state(), TimerState::Running);
        }

        // 8 MHz HSE
        let clocks = Clocks::hsi();
        write_bits!(clocks.rcc.cfgr, 0b01 << 2);
        let rcc = clocks.rcc();
        let tim: tim::RegisterBlock = zeroed();
        let mut timer = Timer::from_registers(&tim, TimerId::TIM3);
        timer.init_delay(&rcc).unwrap();
        assert_eq!(tim.psc.read().bits(), 7);
        assert_eq!(tim.arr.read().bits(), 0xFFFF);
    }

    #[test]
    fn prescaler_rounds_towards_slower_ticks() {
        assert_eq!(prescaler_for(Hertz(16_000_000), Hertz(1_000_000)), Ok(15));
        // 11.25 MHz: divide by 12 rather than 11
        assert_eq!(prescaler_for(Hertz(11_250_000), Hertz(1_000_000)), Ok(11));
        assert_eq!(
            prescaler_for(Hertz(500_000), Hertz(1_000_000)),
            Err(Error::Invalid)
        );
        // 180 MHz / 1 kHz does not fit in 16 bits
        assert_eq!(
            prescaler_for(Hertz(180_000_000), Hertz(1_000)),
            Err(Error::Invalid)
        );
    }

    #[test]
    fn ms_delay_arithmetic() {
        assert_eq!(ms_delay_registers(Hertz(16_000_000), 1), Ok((1599, 9)));
        assert_eq!(ms_delay_registers(Hertz(90_000_000), 500), Ok((8999, 4999)));
        assert_eq!(ms_delay_registers(Hertz(180_000_000), 100_000), Ok((17999, 65529)));
    }

    #[test]
    fn init_loads_time_base() {
        let clocks = Clocks::hsi();
        let rcc = clocks.rcc();
        let tim: tim::RegisterBlock = zeroed();
        let mut timer = Timer::from_registers(&tim, TimerId::TIM1);
        assert_eq!(timer.state(), TimerState::Disabled);

        timer
            .init(
                &rcc,
                &TimerConfig {
                    prescaler: 99,
                    period: 999,
                    counter_mode: CounterMode::CenterAligned3,
                    clock_division: ClockDivision::Div4,
                    repetition: 3,
                    auto_reload_preload: true,
                },
            )
            .unwrap();
        assert_eq!(timer.state(), TimerState::Configured);
        assert_eq!(tim.psc.read().bits(), 99);
        assert_eq!(tim.arr.read().bits(), 999);
        assert_eq!(tim.rcr.read().bits(), 3);
        assert_eq!(tim.cr1.read().bits(), (0b11 << 5) | (0b10 << 8) | (1 << 7));
        assert_eq!(peek(&tim.egr), 1);
        assert!(rcc.is_enabled(PeripheralClock::TIM1));

        timer.enable();
        assert_eq!(timer.state(), TimerState::Running);
        timer.disable();
        assert_eq!(timer.state(), TimerState::Configured);
        timer.deinit(&rcc);
        assert_eq!(timer.state(), TimerState::Disabled);
        assert!(!rcc.is_enabled(PeripheralClock::TIM1));
    }

    #[test]
    fn init_rejects_unsupported_time_base() {
        let clocks = Clocks::hsi();
        let rcc = clocks.rcc();
        let tim: tim::RegisterBlock = zeroed();

        let mut tim3 = Timer::from_registers(&tim, TimerId::TIM3);
        let long = TimerConfig {
            period: 0x1_0000,
            ..Default::default()
        };
        assert_eq!(tim3.init(&rcc, &long), Err(Error::Invalid));
        let repetition = TimerConfig {
            repetition: 1,
            ..Default::default()
        };
        assert_eq!(tim3.init(&rcc, &repetition), Err(Error::Invalid));

        let mut tim6 = Timer::from_registers(&tim, TimerId::TIM6);
        let down = TimerConfig {
            counter_mode: CounterMode::Down,
            ..Default::default()
        };
        assert_eq!(tim6.init(&rcc, &down), Err(Error::Invalid));
        assert_eq!(tim.cr1.read().bits(), 0);

        let mut tim2 = Timer::from_registers(&tim, TimerId::TIM2);
        assert_eq!(tim2.init(&rcc, &long), Ok(()));
    }

    #[test]
    /// The update handler stops the counter and reports completion
    fn interrupt_delay_completion() {
        let clocks = Clocks::hsi();
        let rcc = clocks.rcc();
        let tim: tim::RegisterBlock = zeroed();
        let mut timer = Timer::from_registers(&tim, TimerId::TIM6);

        timer.start_delay_ms_it(&rcc, 20).unwrap();
        assert_eq!(tim.psc.read().bits(), 1599);
        assert_eq!(tim.arr.read().bits(), 199);
        assert!(tim.dier.read().uie().bit_is_set());
        assert!(tim.cr1.read().cen().bit_is_set());
        assert!(!delay_done());

        // Spurious call without the flag
        assert!(!timer.handle_irq());
        assert!(!delay_done());

        set_bits!(tim.sr, UIF);
        assert!(timer.handle_irq());
        assert!(delay_done());
        assert!(tim.sr.read().uif().bit_is_clear());
        assert!(tim.cr1.read().cen().bit_is_clear());
    }

    #[test]
    fn zero_delays_return_immediately() {
        let clocks = Clocks::hsi();
        let rcc = clocks.rcc();
        let tim: tim::RegisterBlock = zeroed();
        let mut timer = Timer::from_registers(&tim, TimerId::TIM7);
        assert_eq!(timer.basic_delay_ms(&rcc, 0), Ok(()));
        assert_eq!(timer.delay_ms_it(&rcc, 0), Ok(()));
        assert_eq!(tim.cr1.read().bits(), 0);
    }

    #[test]
    fn interrupt_lines() {
        assert_eq!(TimerId::TIM1.update_interrupt(), Interrupt::TIM1_UP_TIM10);
        assert_eq!(TimerId::TIM6.update_interrupt(), Interrupt::TIM6_DAC);
        assert_eq!(TimerId::TIM14.update_interrupt(), Interrupt::TIM8_TRG_COM_TIM14);
        assert_eq!(TimerId::TIM8.cc_interrupt(), Interrupt::TIM8_CC);
        assert_eq!(TimerId::TIM3.cc_interrupt(), Interrupt::TIM3);
    }
}
