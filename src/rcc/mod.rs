//! Reset and Clock Control
//!
//! This module configures the RCC unit: the four oscillators (HSE, HSI,
//! LSE, LSI), the main PLL, the system clock multiplexer `sys_ck`, the
//! AHB clock `hclk` and the two APB clocks `pclk1` and `pclk2`. It also
//! gates the bus clocks of individual peripherals, see [`rec`].
//!
//! HSI is 16 MHz. The board HSE is 8 MHz unless overridden with
//! [`Rcc::with_hse_frequency`].
//!
//! # Usage
//!
//! Configuration is split in two steps, oscillators first:
//!
//! ```ignore
//! let dp = device::Peripherals::take().unwrap();
//! let mut rcc = Rcc::new(dp.RCC, dp.FLASH, dp.PWR);
//!
//! rcc.configure_oscillator(&OscillatorConfig {
//!     hse: Some(HseState::Bypass),
//!     pll: PllState::On(PllConfig::HSE_8MHZ_TO_180MHZ),
//!     ..Default::default()
//! })?;
//! ```
//!
//! then the system clock multiplexer and the bus dividers:
//!
//! ```ignore
//! rcc.configure_system_clock(
//!     &ClockConfig {
//!         sysclk: Some(SysClkSource::Pll),
//!         ahb: Some(AhbDivider::Div1),
//!         apb1: Some(ApbDivider::Div4),
//!         apb2: Some(ApbDivider::Div2),
//!     },
//!     FlashLatency::WS5,
//! )?;
//! ```
//!
//! [`Rcc::configure_180mhz`] does all of the above, including the voltage
//! scaling and over-drive needed above 168 MHz.
//!
//! # Safety
//!
//! Stopping the oscillator that drives SYSCLK hangs the core. Requests
//! that would do so fail with [`Error::ClockInUse`] and leave every
//! register untouched, because the whole request is validated before the
//! first write.
//!
//! # Frequencies
//!
//! All the frequency queries ([`Rcc::sysclk`], [`Rcc::hclk`],
//! [`Rcc::pclk1`], [`Rcc::timer_clock`], ...) decode the live register
//! state on every call. They are correct immediately after a clock switch.

use crate::config::{self, SpinBudget};
use crate::pac::{flash, pwr, rcc, FLASH, PWR, RCC};
use crate::error::{Error, Result};
use crate::time::Hertz;

mod core_clocks;
mod pll;
pub mod rec;

pub use core_clocks::CoreClocks;
pub use pll::{pll_output, PllConfig, PllSource, SYSCLK_MAX};
pub use rec::{Bus, PeripheralClock};

/// Maximum APB1 frequency
const PCLK1_MAX: u32 = 45_000_000;
/// Maximum APB2 frequency
const PCLK2_MAX: u32 = 90_000_000;

/// HSE oscillator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HseState {
    Off,
    /// Crystal or resonator
    On,
    /// External clock signal on OSC_IN
    Bypass,
}

/// LSE oscillator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LseState {
    Off,
    On,
    Bypass,
}

/// HSI oscillator request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HsiConfig {
    pub on: bool,
    /// HSITRIM, 0 ..= 31. Reset value 16
    pub calibration: u8,
}

impl Default for HsiConfig {
    fn default() -> Self {
        HsiConfig {
            on: true,
            calibration: 16,
        }
    }
}

/// PLL request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PllState {
    Unchanged,
    Off,
    On(PllConfig),
}

impl Default for PllState {
    fn default() -> Self {
        PllState::Unchanged
    }
}

/// Oscillators to configure
///
/// `None` leaves an oscillator as it is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OscillatorConfig {
    pub hse: Option<HseState>,
    pub hsi: Option<HsiConfig>,
    pub lse: Option<LseState>,
    /// `Some(true)` starts the LSI, `Some(false)` stops it
    pub lsi: Option<bool>,
    pub pll: PllState,
}

/// Oscillator identifiers for [`Rcc::is_ready`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Oscillator {
    Hse,
    Hsi,
    Lse,
    Lsi,
    Pll,
}

/// System clock multiplexer input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SysClkSource {
    Hsi,
    Hse,
    /// PLL P output
    Pll,
    /// PLL R output
    PllR,
}

impl SysClkSource {
    fn bits(self) -> u32 {
        match self {
            SysClkSource::Hsi => 0b00,
            SysClkSource::Hse => 0b01,
            SysClkSource::Pll => 0b10,
            SysClkSource::PllR => 0b11,
        }
    }

    fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0b00 => SysClkSource::Hsi,
            0b01 => SysClkSource::Hse,
            0b10 => SysClkSource::Pll,
            _ => SysClkSource::PllR,
        }
    }

    fn is_pll(self) -> bool {
        matches!(self, SysClkSource::Pll | SysClkSource::PllR)
    }
}

/// AHB prescaler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AhbDivider {
    Div1,
    Div2,
    Div4,
    Div8,
    Div16,
    Div64,
    Div128,
    Div256,
    Div512,
}

const AHB_DIVIDERS: [u32; 8] = [2, 4, 8, 16, 64, 128, 256, 512];

impl AhbDivider {
    fn bits(self) -> u32 {
        match self {
            AhbDivider::Div1 => 0b0000,
            AhbDivider::Div2 => 0b1000,
            AhbDivider::Div4 => 0b1001,
            AhbDivider::Div8 => 0b1010,
            AhbDivider::Div16 => 0b1011,
            AhbDivider::Div64 => 0b1100,
            AhbDivider::Div128 => 0b1101,
            AhbDivider::Div256 => 0b1110,
            AhbDivider::Div512 => 0b1111,
        }
    }

    fn divisor(self) -> u32 {
        hpre_divisor(self.bits())
    }
}

fn hpre_divisor(hpre: u32) -> u32 {
    match hpre {
        0..=7 => 1,
        _ => AHB_DIVIDERS[(hpre as usize - 8) & 0b111],
    }
}

/// APB prescaler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ApbDivider {
    Div1,
    Div2,
    Div4,
    Div8,
    Div16,
}

const APB_DIVIDERS: [u32; 4] = [2, 4, 8, 16];

impl ApbDivider {
    fn bits(self) -> u32 {
        match self {
            ApbDivider::Div1 => 0b000,
            ApbDivider::Div2 => 0b100,
            ApbDivider::Div4 => 0b101,
            ApbDivider::Div8 => 0b110,
            ApbDivider::Div16 => 0b111,
        }
    }

    fn divisor(self) -> u32 {
        ppre_divisor(self.bits())
    }
}

fn ppre_divisor(ppre: u32) -> u32 {
    match ppre {
        0..=3 => 1,
        _ => APB_DIVIDERS[(ppre as usize - 4) & 0b11],
    }
}

/// Timer kernel clock for a bus clock and its PPRE field
///
/// Timers run at the bus clock when the APB prescaler is 1 and at
/// twice the bus clock otherwise.
pub fn timer_clock_from(pclk: Hertz, ppre: u32) -> Hertz {
    if ppre < 0b100 {
        pclk
    } else {
        Hertz(pclk.0 * 2)
    }
}

/// Flash wait states
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum FlashLatency {
    WS0 = 0,
    WS1 = 1,
    WS2 = 2,
    WS3 = 3,
    WS4 = 4,
    WS5 = 5,
}

impl FlashLatency {
    /// Smallest latency for `hclk` at 2.7 ..= 3.6 V
    pub fn for_hclk(hclk: Hertz) -> Option<FlashLatency> {
        Some(match hclk.0 {
            0..=30_000_000 => FlashLatency::WS0,
            30_000_001..=60_000_000 => FlashLatency::WS1,
            60_000_001..=90_000_000 => FlashLatency::WS2,
            90_000_001..=120_000_000 => FlashLatency::WS3,
            120_000_001..=150_000_000 => FlashLatency::WS4,
            150_000_001..=180_000_000 => FlashLatency::WS5,
            _ => return None,
        })
    }

    fn from_bits(bits: u32) -> FlashLatency {
        match bits {
            0 => FlashLatency::WS0,
            1 => FlashLatency::WS1,
            2 => FlashLatency::WS2,
            3 => FlashLatency::WS3,
            4 => FlashLatency::WS4,
            _ => FlashLatency::WS5,
        }
    }
}

/// System clock request
///
/// `None` keeps the current setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockConfig {
    pub sysclk: Option<SysClkSource>,
    pub ahb: Option<AhbDivider>,
    pub apb1: Option<ApbDivider>,
    pub apb2: Option<ApbDivider>,
}

/// Internal voltage regulator output scale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VoltageScale {
    /// Up to 180 MHz with over-drive
    Scale1,
    /// Up to 168 MHz with over-drive
    Scale2,
    /// Up to 120 MHz
    Scale3,
}

/// Extension trait that constrains the `RCC` peripheral
pub trait RccExt {
    /// Constrains the `RCC` peripheral so it plays nicely with the other
    /// abstractions
    fn constrain(self, flash: FLASH, pwr: PWR) -> Rcc<'static>;
}

impl RccExt for RCC {
    fn constrain(self, flash: FLASH, pwr: PWR) -> Rcc<'static> {
        Rcc::new(self, flash, pwr)
    }
}

/// Constrained RCC peripheral
///
/// Also owns FLASH (wait states) and PWR (voltage scaling), which are
/// part of every system clock change.
pub struct Rcc<'a> {
    pub(crate) rb: &'a rcc::RegisterBlock,
    flash: &'a flash::RegisterBlock,
    pwr: &'a pwr::RegisterBlock,
    hse: Hertz,
    spin_budget: Option<SpinBudget>,
}

impl Rcc<'static> {
    pub fn new(rcc: RCC, flash: FLASH, pwr: PWR) -> Self {
        // Taking the handles by value gives exclusive use of the blocks
        let _ = (rcc, flash, pwr);
        unsafe { Rcc::from_registers(&*RCC::ptr(), &*FLASH::ptr(), &*PWR::ptr()) }
    }
}

impl<'a> Rcc<'a> {
    /// Drive an arbitrary set of register blocks
    pub fn from_registers(
        rb: &'a rcc::RegisterBlock,
        flash: &'a flash::RegisterBlock,
        pwr: &'a pwr::RegisterBlock,
    ) -> Self {
        Rcc {
            rb,
            flash,
            pwr,
            hse: config::HSE,
            spin_budget: None,
        }
    }

    /// Frequency of the crystal or clock signal on OSC_IN
    pub fn with_hse_frequency(mut self, hse: Hertz) -> Self {
        self.hse = hse;
        self
    }

    /// Override every readiness spin budget
    pub fn with_spin_budget(mut self, spins: u32) -> Self {
        self.spin_budget = Some(SpinBudget(spins));
        self
    }

    fn budget(&self, default: u32) -> SpinBudget {
        self.spin_budget.unwrap_or(SpinBudget(default))
    }

    /// The RCC register block
    pub fn registers(&self) -> &'a rcc::RegisterBlock {
        self.rb
    }

    fn hse_state(&self) -> HseState {
        let cr = self.rb.cr.read();
        match (cr.hseon().bit_is_set(), cr.hsebyp().bit_is_set()) {
            (false, _) => HseState::Off,
            (true, false) => HseState::On,
            (true, true) => HseState::Bypass,
        }
    }

    fn lse_state(&self) -> LseState {
        let bdcr = self.rb.bdcr.read();
        match (bdcr.lseon().bit_is_set(), bdcr.lsebyp().bit_is_set()) {
            (false, _) => LseState::Off,
            (true, false) => LseState::On,
            (true, true) => LseState::Bypass,
        }
    }

    fn pll_config(&self) -> PllConfig {
        PllConfig::from_pllcfgr(self.rb.pllcfgr.read().bits())
    }

    fn pll_input(&self, source: PllSource) -> Hertz {
        match source {
            PllSource::Hsi => config::HSI,
            PllSource::Hse => self.hse,
        }
    }

    /// Hardware ready flag of an oscillator
    pub fn is_ready(&self, osc: Oscillator) -> bool {
        match osc {
            Oscillator::Hse => self.rb.cr.read().hserdy().bit_is_set(),
            Oscillator::Hsi => self.rb.cr.read().hsirdy().bit_is_set(),
            Oscillator::Pll => self.rb.cr.read().pllrdy().bit_is_set(),
            Oscillator::Lse => self.rb.bdcr.read().lserdy().bit_is_set(),
            Oscillator::Lsi => self.rb.csr.read().lsirdy().bit_is_set(),
        }
    }

    /// Start, stop or reconfigure the oscillators named in `cfg`
    ///
    /// Each oscillator that is started or stopped is polled until its
    /// ready flag follows, failing with [`Error::Timeout`] if it does not
    /// within the spin budget.
    ///
    /// Fails with [`Error::ClockInUse`] and writes nothing if the request
    /// would stop or reconfigure the clock currently driving SYSCLK, or
    /// the oscillator feeding the PLL while the PLL drives SYSCLK.
    /// Out of range PLL parameters give [`Error::Invalid`].
    pub fn configure_oscillator(&mut self, cfg: &OscillatorConfig) -> Result<()> {
        self.validate_oscillator(cfg)?;

        if let Some(state) = cfg.hse {
            self.set_hse(state)?;
        }
        if let Some(hsi) = cfg.hsi {
            self.set_hsi(hsi)?;
        }
        if let Some(on) = cfg.lsi {
            self.set_lsi(on)?;
        }
        if let Some(state) = cfg.lse {
            self.set_lse(state)?;
        }
        match cfg.pll {
            PllState::Unchanged => Ok(()),
            PllState::Off => self.pll_off(),
            PllState::On(pll) => self.set_pll(pll),
        }
    }

    fn validate_oscillator(&self, cfg: &OscillatorConfig) -> Result<()> {
        let active = self.sysclk_source();
        let pll_on = self.rb.cr.read().pllon().bit_is_set();
        let current_pll = self.pll_config();
        let pll_feeds_sysclk = active.is_pll();

        if let Some(state) = cfg.hse {
            let in_use = active == SysClkSource::Hse
                || (pll_feeds_sysclk && current_pll.source == PllSource::Hse);
            if in_use && state != self.hse_state() {
                warn!("HSE drives SYSCLK, refusing {:?}", state);
                return Err(Error::ClockInUse);
            }
        }

        if let Some(hsi) = cfg.hsi {
            if hsi.calibration > 31 {
                return Err(Error::Invalid);
            }
            let in_use = active == SysClkSource::Hsi
                || (pll_feeds_sysclk && current_pll.source == PllSource::Hsi);
            if in_use && !hsi.on {
                warn!("HSI drives SYSCLK, refusing to stop it");
                return Err(Error::ClockInUse);
            }
        }

        match cfg.pll {
            PllState::Unchanged => {}
            PllState::Off => {
                if pll_feeds_sysclk {
                    warn!("PLL drives SYSCLK, refusing to stop it");
                    return Err(Error::ClockInUse);
                }
            }
            PllState::On(pll) => {
                pll.validate(self.pll_input(pll.source))?;
                if pll_feeds_sysclk && !(pll_on && pll == current_pll) {
                    warn!("PLL drives SYSCLK, refusing to reconfigure it");
                    return Err(Error::ClockInUse);
                }
                // The PLL input must be running once the HSE/HSI part of
                // this request has been applied
                let input_stopped = match pll.source {
                    PllSource::Hse => match cfg.hse {
                        Some(state) => state == HseState::Off,
                        None => self.hse_state() == HseState::Off,
                    },
                    PllSource::Hsi => match cfg.hsi {
                        Some(hsi) => !hsi.on,
                        None => !self.rb.cr.read().hsion().bit_is_set(),
                    },
                };
                if input_stopped {
                    return Err(Error::Invalid);
                }
            }
        }
        Ok(())
    }

    fn set_hse(&mut self, state: HseState) -> Result<()> {
        if state == self.hse_state() {
            return Ok(());
        }
        let budget = self.budget(config::HSE_STARTUP_SPINS);

        // HSEBYP can only be written with the oscillator stopped
        if self.rb.cr.read().hseon().bit_is_set() {
            self.rb.cr.modify(|_, w| w.hseon().clear_bit());
            budget.wait_until(|| !self.rb.cr.read().hserdy().bit_is_set())?;
        }
        match state {
            HseState::Off => {}
            HseState::On => {
                self.rb.cr.modify(|_, w| w.hsebyp().clear_bit());
                self.rb.cr.modify(|_, w| w.hseon().set_bit());
            }
            HseState::Bypass => {
                self.rb.cr.modify(|_, w| w.hsebyp().set_bit());
                self.rb.cr.modify(|_, w| w.hseon().set_bit());
            }
        }
        if state != HseState::Off {
            budget
                .wait_until(|| self.rb.cr.read().hserdy().bit_is_set())
                .map_err(|e| {
                    error!("HSE did not start");
                    e
                })?;
        }
        debug!("HSE {:?}", state);
        Ok(())
    }

    fn set_hsi(&mut self, hsi: HsiConfig) -> Result<()> {
        let budget = self.budget(config::HSI_SPINS);
        self.rb
            .cr
            .modify(|_, w| unsafe { w.hsitrim().bits(hsi.calibration) });

        let running = self.rb.cr.read().hsion().bit_is_set();
        if hsi.on && !running {
            self.rb.cr.modify(|_, w| w.hsion().set_bit());
            budget.wait_until(|| self.rb.cr.read().hsirdy().bit_is_set())?;
        } else if !hsi.on && running {
            self.rb.cr.modify(|_, w| w.hsion().clear_bit());
            budget.wait_until(|| !self.rb.cr.read().hsirdy().bit_is_set())?;
        }
        Ok(())
    }

    fn set_lsi(&mut self, on: bool) -> Result<()> {
        let budget = self.budget(config::LSI_SPINS);
        if on {
            self.rb.csr.modify(|_, w| w.lsion().set_bit());
            budget.wait_until(|| self.rb.csr.read().lsirdy().bit_is_set())
        } else {
            self.rb.csr.modify(|_, w| w.lsion().clear_bit());
            budget.wait_until(|| !self.rb.csr.read().lsirdy().bit_is_set())
        }
    }

    fn set_lse(&mut self, state: LseState) -> Result<()> {
        if state == self.lse_state() {
            return Ok(());
        }
        let budget = self.budget(config::LSE_STARTUP_SPINS);

        // The LSE lives in the backup domain
        self.enable_backup_access();

        if self.rb.bdcr.read().lseon().bit_is_set() {
            self.rb.bdcr.modify(|_, w| w.lseon().clear_bit());
            budget.wait_until(|| !self.rb.bdcr.read().lserdy().bit_is_set())?;
        }
        match state {
            LseState::Off => return Ok(()),
            LseState::On => self.rb.bdcr.modify(|_, w| w.lsebyp().clear_bit()),
            LseState::Bypass => self.rb.bdcr.modify(|_, w| w.lsebyp().set_bit()),
        }
        self.rb.bdcr.modify(|_, w| w.lseon().set_bit());
        budget.wait_until(|| self.rb.bdcr.read().lserdy().bit_is_set())
    }

    fn pll_off(&mut self) -> Result<()> {
        self.rb.cr.modify(|_, w| w.pllon().clear_bit());
        self.budget(config::PLL_LOCK_SPINS)
            .wait_until(|| !self.rb.cr.read().pllrdy().bit_is_set())
    }

    fn set_pll(&mut self, pll: PllConfig) -> Result<()> {
        if self.rb.cr.read().pllon().bit_is_set() {
            if pll == self.pll_config() {
                return Ok(());
            }
            self.pll_off()?;
        }

        let bits = pll.pllcfgr_bits();
        self.rb
            .pllcfgr
            .modify(|r, w| unsafe { w.bits((r.bits() & !pll::PLLCFGR_MASK) | bits) });

        self.rb.cr.modify(|_, w| w.pllon().set_bit());
        self.budget(config::PLL_LOCK_SPINS)
            .wait_until(|| self.rb.cr.read().pllrdy().bit_is_set())
            .map_err(|e| {
                error!("PLL did not lock");
                e
            })?;
        debug!(
            "PLL locked, P output {} Hz",
            pll.output(self.pll_input(pll.source)).0
        );
        Ok(())
    }

    /// Enable the PWR clock and write access to the backup domain
    pub(crate) fn enable_backup_access(&self) {
        self.enable(PeripheralClock::PWR);
        self.pwr.cr.modify(|_, w| w.dbp().set_bit());
    }

    /// Select the regulator voltage scale
    pub fn set_voltage_scale(&mut self, scale: VoltageScale) {
        self.enable(PeripheralClock::PWR);
        let vos = match scale {
            VoltageScale::Scale1 => 0b11,
            VoltageScale::Scale2 => 0b10,
            VoltageScale::Scale3 => 0b01,
        };
        self.pwr.cr.modify(|_, w| unsafe { w.vos().bits(vos) });
    }

    /// Enable the regulator over-drive, required above 168 MHz
    ///
    /// The PLL must already be running.
    pub fn enable_over_drive(&mut self) -> Result<()> {
        let budget = self.budget(config::OVER_DRIVE_SPINS);
        self.enable(PeripheralClock::PWR);

        self.pwr.cr.modify(|_, w| w.oden().set_bit());
        budget.wait_until(|| self.pwr.csr.read().odrdy().bit_is_set())?;
        self.pwr.cr.modify(|_, w| w.odswen().set_bit());
        budget.wait_until(|| self.pwr.csr.read().odswrdy().bit_is_set())
    }

    fn flash_latency(&self) -> FlashLatency {
        FlashLatency::from_bits(self.flash.acr.read().latency().bits() as u32)
    }

    fn set_flash_latency(&self, latency: FlashLatency) -> Result<()> {
        self.flash.acr.modify(|_, w| unsafe {
            w.latency()
                .bits(latency as u8)
                .prften()
                .set_bit()
                .icen()
                .set_bit()
                .dcen()
                .set_bit()
        });
        // The new value must be visible before the frequency changes
        if self.flash_latency() != latency {
            error!("Flash latency readback mismatch");
            return Err(Error::Invalid);
        }
        Ok(())
    }

    fn source_frequency(&self, source: SysClkSource) -> Hertz {
        match source {
            SysClkSource::Hsi => config::HSI,
            SysClkSource::Hse => self.hse,
            SysClkSource::Pll => self.pll_output(),
            SysClkSource::PllR => self.pll_r_output(),
        }
    }

    fn source_ready(&self, source: SysClkSource) -> bool {
        match source {
            SysClkSource::Hsi => self.is_ready(Oscillator::Hsi),
            SysClkSource::Hse => self.is_ready(Oscillator::Hse),
            SysClkSource::Pll | SysClkSource::PllR => self.is_ready(Oscillator::Pll),
        }
    }

    /// Switch the system clock and set the bus dividers
    ///
    /// Flash wait states are raised before the switch when the new HCLK
    /// needs more of them and lowered after it otherwise. `latency` must
    /// cover the resulting HCLK, and the resulting APB clocks must stay
    /// within 45 MHz (APB1) and 90 MHz (APB2), else [`Error::Invalid`].
    /// A source that is not ready is also [`Error::Invalid`]. The switch
    /// is polled until the multiplexer status follows and fails with
    /// [`Error::Timeout`] if it does not.
    pub fn configure_system_clock(
        &mut self,
        cfg: &ClockConfig,
        latency: FlashLatency,
    ) -> Result<()> {
        let source = cfg.sysclk.unwrap_or_else(|| self.sysclk_source());
        let ahb = cfg
            .ahb
            .map(AhbDivider::divisor)
            .unwrap_or_else(|| hpre_divisor(self.rb.cfgr.read().hpre().bits() as u32));
        let apb1 = cfg
            .apb1
            .map(ApbDivider::divisor)
            .unwrap_or_else(|| ppre_divisor(self.rb.cfgr.read().ppre1().bits() as u32));
        let apb2 = cfg
            .apb2
            .map(ApbDivider::divisor)
            .unwrap_or_else(|| ppre_divisor(self.rb.cfgr.read().ppre2().bits() as u32));

        let hclk = Hertz(self.source_frequency(source).0 / ahb);
        match FlashLatency::for_hclk(hclk) {
            Some(minimum) if minimum <= latency => {}
            _ => {
                warn!("{} wait states too few for HCLK {} Hz", latency as u8, hclk.0);
                return Err(Error::Invalid);
            }
        }
        if hclk.0 / apb1 > PCLK1_MAX || hclk.0 / apb2 > PCLK2_MAX {
            return Err(Error::Invalid);
        }
        if !self.source_ready(source) {
            warn!("SYSCLK source {:?} not ready", source);
            return Err(Error::Invalid);
        }

        let raise = latency > self.flash_latency();
        if raise {
            self.set_flash_latency(latency)?;
        }

        // Park the APB dividers at their maximum across the switch
        self.rb
            .cfgr
            .modify(|_, w| unsafe { w.ppre1().bits(0b111).ppre2().bits(0b111) });

        self.rb
            .cfgr
            .modify(|_, w| unsafe { w.sw().bits(source.bits() as u8) });
        self.budget(config::CLOCK_SWITCH_SPINS)
            .wait_until(|| self.sysclk_source() == source)
            .map_err(|e| {
                error!("SYSCLK switch to {:?} timed out", source);
                e
            })?;

        if let Some(ahb) = cfg.ahb {
            self.rb
                .cfgr
                .modify(|_, w| unsafe { w.hpre().bits(ahb.bits() as u8) });
        }
        let apb1_bits = match cfg.apb1 {
            Some(div) => div.bits(),
            None => apb_bits_for(apb1),
        };
        let apb2_bits = match cfg.apb2 {
            Some(div) => div.bits(),
            None => apb_bits_for(apb2),
        };
        self.rb.cfgr.modify(|_, w| unsafe {
            w.ppre1().bits(apb1_bits as u8).ppre2().bits(apb2_bits as u8)
        });

        if !raise {
            self.set_flash_latency(latency)?;
        }

        info!(
            "SYSCLK {:?} {} Hz, HCLK {} Hz, PCLK1 {} Hz, PCLK2 {} Hz",
            source,
            self.sysclk().0,
            self.hclk().0,
            self.pclk1().0,
            self.pclk2().0
        );
        Ok(())
    }

    /// Current system clock multiplexer input, from the switch status
    pub fn sysclk_source(&self) -> SysClkSource {
        SysClkSource::from_bits(self.rb.cfgr.read().sws().bits() as u32)
    }

    /// PLL P output frequency from the live PLLCFGR
    pub fn pll_output(&self) -> Hertz {
        let pll = self.pll_config();
        pll.output(self.pll_input(pll.source))
    }

    /// PLL R output frequency from the live PLLCFGR
    pub fn pll_r_output(&self) -> Hertz {
        let pll = self.pll_config();
        pll.output_r(self.pll_input(pll.source))
    }

    pub fn sysclk(&self) -> Hertz {
        self.source_frequency(self.sysclk_source())
    }

    pub fn hclk(&self) -> Hertz {
        Hertz(self.sysclk().0 / hpre_divisor(self.rb.cfgr.read().hpre().bits() as u32))
    }

    pub fn pclk1(&self) -> Hertz {
        Hertz(self.hclk().0 / ppre_divisor(self.ppre(Bus::APB1)))
    }

    pub fn pclk2(&self) -> Hertz {
        Hertz(self.hclk().0 / ppre_divisor(self.ppre(Bus::APB2)))
    }

    fn ppre(&self, bus: Bus) -> u32 {
        match bus {
            Bus::AHB1 => 0,
            Bus::APB1 => self.rb.cfgr.read().ppre1().bits() as u32,
            Bus::APB2 => self.rb.cfgr.read().ppre2().bits() as u32,
        }
    }

    /// Clock of a bus. AHB1 runs at HCLK
    pub fn bus_clock(&self, bus: Bus) -> Hertz {
        match bus {
            Bus::AHB1 => self.hclk(),
            Bus::APB1 => self.pclk1(),
            Bus::APB2 => self.pclk2(),
        }
    }

    /// Divider of a bus clock relative to HCLK
    pub fn bus_divider(&self, bus: Bus) -> u32 {
        ppre_divisor(self.ppre(bus))
    }

    /// Input clock of the timers on `bus`
    pub fn timer_clock(&self, bus: Bus) -> Hertz {
        timer_clock_from(self.bus_clock(bus), self.ppre(bus))
    }

    /// Snapshot of the live clock tree
    pub fn clocks(&self) -> CoreClocks {
        CoreClocks {
            source: self.sysclk_source(),
            sysclk: self.sysclk(),
            hclk: self.hclk(),
            pclk: (self.pclk1(), self.pclk2()),
            apb_divider: (self.bus_divider(Bus::APB1), self.bus_divider(Bus::APB2)),
            timer: (self.timer_clock(Bus::APB1), self.timer_clock(Bus::APB2)),
            pll: if self.is_ready(Oscillator::Pll) {
                Some(self.pll_output())
            } else {
                None
            },
        }
    }

    /// Run from the 16 MHz HSI with all dividers at 1
    pub fn use_hsi(&mut self) -> Result<CoreClocks> {
        self.configure_oscillator(&OscillatorConfig {
            hsi: Some(HsiConfig::default()),
            ..Default::default()
        })?;
        self.configure_system_clock(
            &ClockConfig {
                sysclk: Some(SysClkSource::Hsi),
                ahb: Some(AhbDivider::Div1),
                apb1: Some(ApbDivider::Div1),
                apb2: Some(ApbDivider::Div1),
            },
            FlashLatency::WS0,
        )?;
        Ok(self.clocks())
    }

    /// Run from the HSE with all dividers at 1
    pub fn use_hse(&mut self, state: HseState) -> Result<CoreClocks> {
        if state == HseState::Off {
            return Err(Error::Invalid);
        }
        self.configure_oscillator(&OscillatorConfig {
            hse: Some(state),
            ..Default::default()
        })?;
        let latency = FlashLatency::for_hclk(self.hse).ok_or(Error::Invalid)?;
        self.configure_system_clock(
            &ClockConfig {
                sysclk: Some(SysClkSource::Hse),
                ahb: Some(AhbDivider::Div1),
                apb1: Some(ApbDivider::Div1),
                apb2: Some(ApbDivider::Div1),
            },
            latency,
        )?;
        Ok(self.clocks())
    }

    /// 180 MHz from the 8 MHz HSE in bypass mode
    ///
    /// HCLK 180 MHz, PCLK1 45 MHz, PCLK2 90 MHz, 5 wait states.
    pub fn configure_180mhz(&mut self) -> Result<CoreClocks> {
        self.set_voltage_scale(VoltageScale::Scale1);
        self.configure_oscillator(&OscillatorConfig {
            hse: Some(HseState::Bypass),
            pll: PllState::On(PllConfig::HSE_8MHZ_TO_180MHZ),
            ..Default::default()
        })?;
        self.enable_over_drive()?;
        self.configure_system_clock(
            &ClockConfig {
                sysclk: Some(SysClkSource::Pll),
                ahb: Some(AhbDivider::Div1),
                apb1: Some(ApbDivider::Div4),
                apb2: Some(ApbDivider::Div2),
            },
            FlashLatency::WS5,
        )?;
        Ok(self.clocks())
    }
}

fn apb_bits_for(divisor: u32) -> u32 {
    match divisor {
        2 => 0b100,
        4 => 0b101,
        8 => 0b110,
        16 => 0b111,
        _ => 0b000,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::field;
    use crate::bits::tests::{poke, zeroed};

    const CR_HSION: u32 = 1 << 0;
    const CR_HSIRDY: u32 = 1 << 1;
    const CR_HSEON: u32 = 1 << 16;
    const CR_HSERDY: u32 = 1 << 17;
    const CR_HSEBYP: u32 = 1 << 18;
    const CR_PLLON: u32 = 1 << 24;
    const CR_PLLRDY: u32 = 1 << 25;
    const CFGR_SWS_SHIFT: u32 = 2;
    const CFGR_HPRE_SHIFT: u32 = 4;
    const CFGR_PPRE1_SHIFT: u32 = 10;
    const CFGR_PPRE2_SHIFT: u32 = 13;
    const BDCR_LSEON: u32 = 1 << 0;
    const BDCR_LSERDY: u32 = 1 << 1;
    const ACR_PRFTEN: u32 = 1 << 8;
    const ACR_ICEN: u32 = 1 << 9;
    const ACR_DCEN: u32 = 1 << 10;
    const PWR_CR_DBP: u32 = 1 << 8;
    const PWR_CR_VOS_SHIFT: u32 = 14;
    const PWR_CR_ODEN: u32 = 1 << 16;
    const PWR_CR_ODSWEN: u32 = 1 << 17;
    const PWR_CSR_ODRDY: u32 = 1 << 16;
    const PWR_CSR_ODSWRDY: u32 = 1 << 17;

    fn all_set(bits: u32, mask: u32) -> bool {
        bits & mask == mask
    }

    struct Blocks {
        rcc: rcc::RegisterBlock,
        flash: flash::RegisterBlock,
        pwr: pwr::RegisterBlock,
    }

    impl Blocks {
        fn new() -> Self {
            Blocks {
                rcc: zeroed(),
                flash: zeroed(),
                pwr: zeroed(),
            }
        }

        fn rcc(&self) -> Rcc<'_> {
            Rcc::from_registers(&self.rcc, &self.flash, &self.pwr).with_spin_budget(8)
        }

        fn snapshot(&self) -> [u32; 8] {
            [
                self.rcc.cr.read().bits(),
                self.rcc.pllcfgr.read().bits(),
                self.rcc.cfgr.read().bits(),
                self.rcc.bdcr.read().bits(),
                self.rcc.csr.read().bits(),
                self.rcc.apb1enr.read().bits(),
                self.flash.acr.read().bits(),
                self.pwr.cr.read().bits(),
            ]
        }
    }

    /// Emulate a device running from the PLL at 180 MHz
    fn running_from_pll(b: &Blocks) {
        write_bits!(b.rcc.cr, CR_HSEON | CR_HSEBYP | CR_HSERDY | CR_PLLON | CR_PLLRDY);
        write_bits!(b.rcc.pllcfgr, PllConfig::HSE_8MHZ_TO_180MHZ.pllcfgr_bits());
        write_bits!(b.rcc.cfgr, (0b10 << CFGR_SWS_SHIFT) | 0b10);
    }

    #[test]
    /// Stopping the oscillator driving SYSCLK fails and writes nothing
    fn refuse_to_stop_active_oscillator() {
        let b = Blocks::new();
        write_bits!(b.rcc.cr, CR_HSEON | CR_HSERDY | CR_HSION | CR_HSIRDY);
        write_bits!(b.rcc.cfgr, 0b01 << CFGR_SWS_SHIFT);
        let before = b.snapshot();

        let mut rcc = b.rcc();
        let result = rcc.configure_oscillator(&OscillatorConfig {
            hse: Some(HseState::Off),
            ..Default::default()
        });
        assert_eq!(result, Err(Error::ClockInUse));
        assert_eq!(b.snapshot(), before);

        // Switching crystal to bypass also stops the oscillator
        let result = rcc.configure_oscillator(&OscillatorConfig {
            hse: Some(HseState::Bypass),
            ..Default::default()
        });
        assert_eq!(result, Err(Error::ClockInUse));
        assert_eq!(b.snapshot(), before);
    }

    #[test]
    fn refuse_to_stop_pll_or_its_input() {
        let b = Blocks::new();
        running_from_pll(&b);
        let before = b.snapshot();
        let mut rcc = b.rcc();

        for cfg in [
            OscillatorConfig {
                pll: PllState::Off,
                ..Default::default()
            },
            OscillatorConfig {
                hse: Some(HseState::Off),
                ..Default::default()
            },
            OscillatorConfig {
                pll: PllState::On(PllConfig {
                    n: 336,
                    ..PllConfig::HSE_8MHZ_TO_180MHZ
                }),
                ..Default::default()
            },
            // A valid change followed by a refused one writes nothing
            OscillatorConfig {
                lsi: Some(true),
                pll: PllState::Off,
                ..Default::default()
            },
        ] {
            assert_eq!(rcc.configure_oscillator(&cfg), Err(Error::ClockInUse));
            assert_eq!(b.snapshot(), before);
        }

        // HSI is not in use and may be stopped
        set_bits!(b.rcc.cr, CR_HSION);
        let result = rcc.configure_oscillator(&OscillatorConfig {
            hsi: Some(HsiConfig {
                on: false,
                calibration: 16,
            }),
            ..Default::default()
        });
        assert_eq!(result, Ok(()));
        assert!(!all_set(b.rcc.cr.read().bits(), CR_HSION));
    }

    #[test]
    fn same_state_request_is_a_no_op() {
        let b = Blocks::new();
        running_from_pll(&b);
        let before = b.snapshot();
        let mut rcc = b.rcc();

        let result = rcc.configure_oscillator(&OscillatorConfig {
            hse: Some(HseState::Bypass),
            pll: PllState::On(PllConfig::HSE_8MHZ_TO_180MHZ),
            ..Default::default()
        });
        assert_eq!(result, Ok(()));
        assert_eq!(b.snapshot(), before);
    }

    #[test]
    fn start_hse_times_out() {
        let b = Blocks::new();
        let mut rcc = b.rcc();
        let result = rcc.configure_oscillator(&OscillatorConfig {
            hse: Some(HseState::On),
            ..Default::default()
        });
        assert_eq!(result, Err(Error::Timeout));
        assert!(all_set(b.rcc.cr.read().bits(), CR_HSEON));
    }

    #[test]
    fn configure_pll() {
        let b = Blocks::new();
        // HSI running, PLL locks as soon as it is enabled
        write_bits!(b.rcc.cr, CR_HSION | CR_HSIRDY | CR_PLLRDY);
        write_bits!(b.rcc.pllcfgr, 0x2400_3010);
        let mut rcc = b.rcc();

        let pll = PllConfig {
            source: PllSource::Hsi,
            m: 16,
            n: 336,
            p: 4,
            q: 7,
            r: 2,
        };
        assert_eq!(
            rcc.configure_oscillator(&OscillatorConfig {
                pll: PllState::On(pll),
                ..Default::default()
            }),
            Ok(())
        );
        assert!(all_set(b.rcc.cr.read().bits(), CR_PLLON));
        assert_eq!(rcc.pll_output(), Hertz(84_000_000));

        let bad = PllConfig { m: 1, ..pll };
        assert_eq!(
            rcc.configure_oscillator(&OscillatorConfig {
                pll: PllState::On(bad),
                ..Default::default()
            }),
            Err(Error::Invalid)
        );
    }

    #[test]
    fn pll_input_must_run() {
        let b = Blocks::new();
        write_bits!(b.rcc.cr, CR_HSION | CR_HSIRDY);
        let mut rcc = b.rcc();
        let result = rcc.configure_oscillator(&OscillatorConfig {
            pll: PllState::On(PllConfig::HSE_8MHZ_TO_180MHZ),
            ..Default::default()
        });
        assert_eq!(result, Err(Error::Invalid));
        assert_eq!(b.rcc.cr.read().bits(), CR_HSION | CR_HSIRDY);
    }

    #[test]
    fn start_lse_enables_backup_access() {
        let b = Blocks::new();
        write_bits!(b.rcc.bdcr, BDCR_LSERDY);
        let mut rcc = b.rcc();
        let result = rcc.configure_oscillator(&OscillatorConfig {
            lse: Some(LseState::On),
            ..Default::default()
        });
        assert_eq!(result, Ok(()));
        assert!(all_set(b.rcc.bdcr.read().bits(), BDCR_LSEON));
        assert!(all_set(b.pwr.cr.read().bits(), PWR_CR_DBP));
        assert!(rcc.is_enabled(PeripheralClock::PWR));
    }

    #[test]
    fn switch_to_pll_at_180mhz() {
        let b = Blocks::new();
        running_from_pll(&b);
        // Reset dividers, zero wait states
        write_bits!(b.rcc.cfgr, 0b10 << CFGR_SWS_SHIFT);
        let mut rcc = b.rcc();

        let result = rcc.configure_system_clock(
            &ClockConfig {
                sysclk: Some(SysClkSource::Pll),
                ahb: Some(AhbDivider::Div1),
                apb1: Some(ApbDivider::Div4),
                apb2: Some(ApbDivider::Div2),
            },
            FlashLatency::WS5,
        );
        assert_eq!(result, Ok(()));

        assert_eq!(b.flash.acr.read().bits(), 5 | ACR_PRFTEN | ACR_ICEN | ACR_DCEN);
        assert_eq!(field(b.rcc.cfgr.read().bits(), 0, 2), 0b10);
        assert_eq!(field(b.rcc.cfgr.read().bits(), CFGR_HPRE_SHIFT, 4), 0);
        assert_eq!(field(b.rcc.cfgr.read().bits(), CFGR_PPRE1_SHIFT, 3), 0b101);
        assert_eq!(field(b.rcc.cfgr.read().bits(), CFGR_PPRE2_SHIFT, 3), 0b100);

        let clocks = rcc.clocks();
        assert_eq!(clocks.sysclk(), Hertz(180_000_000));
        assert_eq!(clocks.hclk(), Hertz(180_000_000));
        assert_eq!(clocks.pclk1(), Hertz(45_000_000));
        assert_eq!(clocks.pclk2(), Hertz(90_000_000));
        assert_eq!(clocks.bus_divider(Bus::APB1), 4);
        assert_eq!(clocks.bus_divider(Bus::APB2), 2);
        assert_eq!(clocks.timer_clock(Bus::APB1), Hertz(90_000_000));
        assert_eq!(clocks.timer_clock(Bus::APB2), Hertz(180_000_000));
        assert_eq!(clocks.sysclk_source(), SysClkSource::Pll);
        assert_eq!(clocks.pll(), Some(Hertz(180_000_000)));
    }

    #[test]
    fn insufficient_latency_is_refused() {
        let b = Blocks::new();
        running_from_pll(&b);
        let before = b.snapshot();
        let mut rcc = b.rcc();

        let result = rcc.configure_system_clock(
            &ClockConfig {
                sysclk: Some(SysClkSource::Pll),
                ahb: Some(AhbDivider::Div1),
                apb1: Some(ApbDivider::Div4),
                apb2: Some(ApbDivider::Div2),
            },
            FlashLatency::WS4,
        );
        assert_eq!(result, Err(Error::Invalid));
        assert_eq!(b.snapshot(), before);

        // APB1 above 45 MHz
        let result = rcc.configure_system_clock(
            &ClockConfig {
                apb1: Some(ApbDivider::Div2),
                ..Default::default()
            },
            FlashLatency::WS5,
        );
        assert_eq!(result, Err(Error::Invalid));
        assert_eq!(b.snapshot(), before);
    }

    #[test]
    fn source_not_ready_is_refused() {
        let b = Blocks::new();
        write_bits!(b.rcc.cr, CR_HSION | CR_HSIRDY);
        let mut rcc = b.rcc();
        let result = rcc.configure_system_clock(
            &ClockConfig {
                sysclk: Some(SysClkSource::Hse),
                ..Default::default()
            },
            FlashLatency::WS0,
        );
        assert_eq!(result, Err(Error::Invalid));
        assert_eq!(b.rcc.cfgr.read().bits(), 0);
    }

    #[test]
    fn switch_times_out_when_status_does_not_follow() {
        let b = Blocks::new();
        write_bits!(b.rcc.cr, CR_HSION | CR_HSIRDY | CR_HSEON | CR_HSERDY);
        let mut rcc = b.rcc();
        let result = rcc.configure_system_clock(
            &ClockConfig {
                sysclk: Some(SysClkSource::Hse),
                ..Default::default()
            },
            FlashLatency::WS0,
        );
        assert_eq!(result, Err(Error::Timeout));
    }

    #[test]
    fn use_hsi_preset() {
        let b = Blocks::new();
        write_bits!(b.rcc.cr, CR_HSIRDY);
        write_bits!(b.flash.acr, 2);
        let mut rcc = b.rcc();
        let clocks = rcc.use_hsi().unwrap();
        assert_eq!(clocks.sysclk(), Hertz(16_000_000));
        assert_eq!(clocks.pclk1(), Hertz(16_000_000));
        assert_eq!(clocks.timer_clock(Bus::APB1), Hertz(16_000_000));
        assert_eq!(clocks.pll(), None);
        // Lowered after the switch
        assert_eq!(field(b.flash.acr.read().bits(), 0, 4), 0);
    }

    #[test]
    fn configure_180mhz_from_hsi() {
        let b = Blocks::new();
        // Oscillators and over-drive report ready at once, the
        // multiplexer status stays on HSI
        write_bits!(b.rcc.cr, CR_HSION | CR_HSIRDY | CR_HSERDY | CR_PLLRDY);
        poke(&b.pwr.csr, PWR_CSR_ODRDY | PWR_CSR_ODSWRDY);
        let mut rcc = b.rcc();

        assert_eq!(rcc.configure_180mhz(), Err(Error::Timeout));
        assert!(all_set(b.rcc.cr.read().bits(), CR_HSEON | CR_HSEBYP | CR_PLLON));
        assert_eq!(rcc.pll_output(), Hertz(180_000_000));
        assert_eq!(field(b.pwr.cr.read().bits(), PWR_CR_VOS_SHIFT, 2), 0b11);
        assert!(all_set(b.pwr.cr.read().bits(), PWR_CR_ODEN | PWR_CR_ODSWEN));
        // Wait states raised before the switch was attempted
        assert_eq!(field(b.flash.acr.read().bits(), 0, 4), 5);
        assert_eq!(field(b.rcc.cfgr.read().bits(), 0, 2), 0b10);
    }

    #[test]
    fn configure_180mhz_when_already_running() {
        let b = Blocks::new();
        running_from_pll(&b);
        poke(&b.pwr.csr, PWR_CSR_ODRDY | PWR_CSR_ODSWRDY);
        let mut rcc = b.rcc();

        let clocks = rcc.configure_180mhz().unwrap();
        assert_eq!(clocks.hclk(), Hertz(180_000_000));
        assert_eq!(clocks.pclk1(), Hertz(45_000_000));
        assert_eq!(clocks.pclk2(), Hertz(90_000_000));
        assert_eq!(field(b.flash.acr.read().bits(), 0, 4), 5);
    }

    #[test]
    /// Bus and timer clocks follow the live dividers
    fn timer_clock_doubling_rule() {
        assert_eq!(timer_clock_from(Hertz(42_000_000), 0b000), Hertz(42_000_000));
        assert_eq!(timer_clock_from(Hertz(42_000_000), 0b100), Hertz(84_000_000));
        assert_eq!(timer_clock_from(Hertz(45_000_000), 0b101), Hertz(90_000_000));

        let b = Blocks::new();
        running_from_pll(&b);
        let rcc = b.rcc();
        write_field!(b.rcc.cfgr, CFGR_HPRE_SHIFT, 4, AhbDivider::Div2.bits());
        write_field!(b.rcc.cfgr, CFGR_PPRE1_SHIFT, 3, ApbDivider::Div1.bits());
        write_field!(b.rcc.cfgr, CFGR_PPRE2_SHIFT, 3, ApbDivider::Div16.bits());
        assert_eq!(rcc.hclk(), Hertz(90_000_000));
        assert_eq!(rcc.timer_clock(Bus::APB1), Hertz(90_000_000));
        assert_eq!(rcc.pclk2(), Hertz(5_625_000));
        assert_eq!(rcc.timer_clock(Bus::APB2), Hertz(11_250_000));
        assert_eq!(rcc.bus_divider(Bus::APB2), 16);
    }

    #[test]
    fn flash_latency_table() {
        assert_eq!(FlashLatency::for_hclk(Hertz(16_000_000)), Some(FlashLatency::WS0));
        assert_eq!(FlashLatency::for_hclk(Hertz(30_000_000)), Some(FlashLatency::WS0));
        assert_eq!(FlashLatency::for_hclk(Hertz(84_000_000)), Some(FlashLatency::WS2));
        assert_eq!(FlashLatency::for_hclk(Hertz(180_000_000)), Some(FlashLatency::WS5));
        assert_eq!(FlashLatency::for_hclk(Hertz(200_000_000)), None);
    }
}
