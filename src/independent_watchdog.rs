//! Independent watchdog
//!
//! The IWDG counts down from its reload value on the ~32 kHz LSI and
//! resets the device when it reaches zero. Once started it cannot be
//! stopped except by a reset, so [`IndependentWatchdog::reload`] must be
//! called more often than the configured timeout.
//!
//! ```ignore
//! let mut iwdg = IndependentWatchdog::new(dp.IWDG);
//! iwdg.configure_timeout(1_000)?;
//! iwdg.start()?;
//!
//! loop {
//!     // ...
//!     iwdg.reload();
//! }
//! ```

use embedded_hal::watchdog::{Watchdog, WatchdogEnable};

use crate::config::{self, SpinBudget};
use crate::pac::{iwdg, IWDG};
use crate::error::{Error, Result};
use crate::time::MilliSeconds;

const KEY_WRITE_ACCESS: u32 = 0x5555;
const KEY_START: u32 = 0xCCCC;
const KEY_RELOAD: u32 = 0xAAAA;


/// Largest reload value, RLR is 12 bits
pub const MAX_RELOAD: u16 = 0x0FFF;

/// Counter clock divider
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Prescaler {
    Div4 = 0,
    Div8 = 1,
    Div16 = 2,
    Div32 = 3,
    Div64 = 4,
    Div128 = 5,
    Div256 = 6,
}

impl Prescaler {
    const ALL: [Prescaler; 7] = [
        Prescaler::Div4,
        Prescaler::Div8,
        Prescaler::Div16,
        Prescaler::Div32,
        Prescaler::Div64,
        Prescaler::Div128,
        Prescaler::Div256,
    ];

    pub fn divider(self) -> u32 {
        4 << self as u32
    }
}

/// Prescaler and reload value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IwdgConfig {
    pub prescaler: Prescaler,
    /// 0 ..= 4095
    pub reload: u16,
}

impl IwdgConfig {
    /// ~100 ms
    pub const TIMEOUT_100MS: IwdgConfig = IwdgConfig {
        prescaler: Prescaler::Div4,
        reload: 799,
    };
    /// ~500 ms
    pub const TIMEOUT_500MS: IwdgConfig = IwdgConfig {
        prescaler: Prescaler::Div8,
        reload: 1999,
    };
    /// ~1 s
    pub const TIMEOUT_1S: IwdgConfig = IwdgConfig {
        prescaler: Prescaler::Div8,
        reload: 3999,
    };
    /// ~2 s
    pub const TIMEOUT_2S: IwdgConfig = IwdgConfig {
        prescaler: Prescaler::Div16,
        reload: 3999,
    };
    /// ~4.1 s, the longest timeout at /32
    pub const TIMEOUT_5S: IwdgConfig = IwdgConfig {
        prescaler: Prescaler::Div32,
        reload: MAX_RELOAD,
    };
    /// ~8.2 s, the longest timeout at /64
    pub const TIMEOUT_10S: IwdgConfig = IwdgConfig {
        prescaler: Prescaler::Div64,
        reload: MAX_RELOAD,
    };

    /// Smallest prescaler able to count `ms` milliseconds
    ///
    /// Fails with [`Error::Invalid`] if `ms` is beyond the range of the
    /// /256 prescaler.
    pub fn for_timeout(ms: u32) -> Result<Self> {
        let lsi = config::LSI.0 as u64;
        for &prescaler in Prescaler::ALL.iter() {
            let ticks = ms as u64 * lsi / (prescaler.divider() as u64 * 1000);
            if ticks <= MAX_RELOAD as u64 {
                return Ok(IwdgConfig {
                    prescaler,
                    reload: (ticks as u16).saturating_sub(1),
                });
            }
        }
        Err(Error::Invalid)
    }

    /// Timeout in milliseconds at the nominal LSI frequency
    pub fn timeout_ms(&self) -> u32 {
        calculate_timeout(self.prescaler, self.reload)
    }
}

/// Timeout in milliseconds of a prescaler and reload pair at the nominal
/// LSI frequency
pub fn calculate_timeout(prescaler: Prescaler, reload: u16) -> u32 {
    let ticks = reload as u64 + 1;
    (prescaler.divider() as u64 * ticks * 1000 / config::LSI.0 as u64) as u32
}

/// Register update flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status {
    /// Prescaler update in progress
    pub prescaler_update: bool,
    /// Reload value update in progress
    pub reload_update: bool,
}

/// The implementation of the hardware IWDG
pub struct IndependentWatchdog<'a> {
    iwdg: &'a iwdg::RegisterBlock,
    config: Option<IwdgConfig>,
    spin_budget: SpinBudget,
}

impl IndependentWatchdog<'static> {
    /// Create a new instance
    pub fn new(iwdg: IWDG) -> Self {
        let _ = iwdg;
        IndependentWatchdog::from_registers(unsafe { &*IWDG::ptr() })
    }
}

impl<'a> IndependentWatchdog<'a> {
    pub fn from_registers(iwdg: &'a iwdg::RegisterBlock) -> Self {
        IndependentWatchdog {
            iwdg,
            config: None,
            spin_budget: SpinBudget(config::IWDG_UPDATE_SPINS),
        }
    }

    pub fn with_spin_budget(mut self, spins: u32) -> Self {
        self.spin_budget = SpinBudget(spins);
        self
    }

    /// Load the prescaler and reload value
    ///
    /// Does not start the watchdog. Waits for the update flags to clear
    /// and fails with [`Error::Timeout`] if they do not.
    pub fn init(&mut self, cfg: IwdgConfig) -> Result<()> {
        if cfg.reload > MAX_RELOAD {
            return Err(Error::Invalid);
        }

        write_bits!(self.iwdg.kr, KEY_WRITE_ACCESS);
        self.iwdg
            .pr
            .write(|w| unsafe { w.pr().bits(cfg.prescaler as u8) });
        self.iwdg.rlr.write(|w| unsafe { w.rl().bits(cfg.reload) });

        let sr = &self.iwdg.sr;
        self.spin_budget
            .wait_until(|| {
                let sr = sr.read();
                sr.pvu().bit_is_clear() && sr.rvu().bit_is_clear()
            })
            .map_err(|e| {
                error!("IWDG update timeout");
                e
            })?;

        self.config = Some(cfg);
        info!(
            "IWDG /{} reload {} ({} ms)",
            cfg.prescaler.divider(),
            cfg.reload,
            cfg.timeout_ms()
        );
        Ok(())
    }

    /// Load the configuration with the closest timeout not shorter than
    /// `ms`, and return it
    pub fn configure_timeout(&mut self, ms: u32) -> Result<IwdgConfig> {
        let cfg = IwdgConfig::for_timeout(ms)?;
        self.init(cfg)?;
        Ok(cfg)
    }

    /// Configuration loaded by the last successful [`init`](Self::init)
    pub fn config(&self) -> Option<IwdgConfig> {
        self.config
    }

    /// Start the countdown. It cannot be stopped afterwards.
    ///
    /// Fails with [`Error::Invalid`] before a successful
    /// [`init`](Self::init).
    pub fn start(&mut self) -> Result<()> {
        if self.config.is_none() {
            return Err(Error::Invalid);
        }
        write_bits!(self.iwdg.kr, KEY_START);
        Ok(())
    }

    /// Feed the watchdog, reloading the counter
    pub fn reload(&mut self) {
        write_bits!(self.iwdg.kr, KEY_RELOAD);
    }

    pub fn status(&self) -> Status {
        let sr = self.iwdg.sr.read();
        Status {
            prescaler_update: sr.pvu().bit_is_set(),
            reload_update: sr.rvu().bit_is_set(),
        }
    }
}

impl<'a> Watchdog for IndependentWatchdog<'a> {
    fn feed(&mut self) {
        self.reload();
    }
}

impl<'a> WatchdogEnable for IndependentWatchdog<'a> {
    type Time = MilliSeconds;

    /// Configure for `period` and start
    fn start<T>(&mut self, period: T)
    where
        T: Into<MilliSeconds>,
    {
        let ms = period.into().0;
        if let Err(_e) = self.configure_timeout(ms) {
            error!("IWDG timeout {} ms not applied: {:?}", ms, _e);
            return;
        }
        IndependentWatchdog::start(self).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::tests::{peek, poke, zeroed};

    #[test]
    fn prescaler_search() {
        assert_eq!(
            IwdgConfig::for_timeout(1_000),
            Ok(IwdgConfig {
                prescaler: Prescaler::Div8,
                reload: 3999
            })
        );
        assert_eq!(
            IwdgConfig::for_timeout(100),
            Ok(IwdgConfig {
                prescaler: Prescaler::Div4,
                reload: 799
            })
        );
        // 512 ms is exactly 4096 ticks at /4, one too many
        assert_eq!(IwdgConfig::for_timeout(512).map(|c| c.prescaler), Ok(Prescaler::Div8));
        assert_eq!(
            IwdgConfig::for_timeout(32_760),
            Ok(IwdgConfig {
                prescaler: Prescaler::Div256,
                reload: 4094
            })
        );
        assert_eq!(IwdgConfig::for_timeout(40_000), Err(Error::Invalid));
        assert_eq!(
            IwdgConfig::for_timeout(0),
            Ok(IwdgConfig {
                prescaler: Prescaler::Div4,
                reload: 0
            })
        );
    }

    #[test]
    fn presets() {
        assert_eq!(IwdgConfig::TIMEOUT_100MS.timeout_ms(), 100);
        assert_eq!(IwdgConfig::TIMEOUT_500MS.timeout_ms(), 500);
        assert_eq!(IwdgConfig::TIMEOUT_1S.timeout_ms(), 1_000);
        assert_eq!(IwdgConfig::TIMEOUT_2S.timeout_ms(), 2_000);
        assert_eq!(IwdgConfig::TIMEOUT_5S.timeout_ms(), 4_096);
        assert_eq!(IwdgConfig::TIMEOUT_10S.timeout_ms(), 8_192);
    }

    #[test]
    fn init_writes_keys_and_values() {
        let rb: iwdg::RegisterBlock = zeroed();
        let mut iwdg = IndependentWatchdog::from_registers(&rb).with_spin_budget(8);

        assert_eq!(iwdg.start(), Err(Error::Invalid));
        assert_eq!(peek(&rb.kr), 0);

        let cfg = iwdg.configure_timeout(1_000).unwrap();
        assert_eq!(cfg.prescaler, Prescaler::Div8);
        assert_eq!(peek(&rb.kr), KEY_WRITE_ACCESS);
        assert_eq!(rb.pr.read().bits(), 1);
        assert_eq!(rb.rlr.read().bits(), 3999);

        iwdg.start().unwrap();
        assert_eq!(peek(&rb.kr), KEY_START);
        iwdg.feed();
        assert_eq!(peek(&rb.kr), KEY_RELOAD);
    }

    #[test]
    fn reload_out_of_range() {
        let rb: iwdg::RegisterBlock = zeroed();
        let mut iwdg = IndependentWatchdog::from_registers(&rb);
        let cfg = IwdgConfig {
            prescaler: Prescaler::Div4,
            reload: 4096,
        };
        assert_eq!(iwdg.init(cfg), Err(Error::Invalid));
        assert_eq!(peek(&rb.kr), 0);
        assert_eq!(iwdg.config(), None);
    }

    #[test]
    fn update_flags_stuck() {
        let rb: iwdg::RegisterBlock = zeroed();
        poke(&rb.sr, 1 << 1);
        let mut iwdg = IndependentWatchdog::from_registers(&rb).with_spin_budget(8);
        assert_eq!(
            iwdg.status(),
            Status {
                prescaler_update: false,
                reload_update: true
            }
        );
        assert_eq!(iwdg.init(IwdgConfig::TIMEOUT_2S), Err(Error::Timeout));
        assert_eq!(iwdg.start(), Err(Error::Invalid));
    }
}
