//! Real-Time Clock
//!
//! Calendar clock in the backup domain, ticking at 1 Hz from the LSI or
//! the LSE. Time and date are held in BCD in TR and DR, in 24 hour
//! format. Reads bypass the shadow registers so a value written is read
//! back immediately.
//!
//! Every calendar write runs the same bracket: remove the write
//! protection, enter initialisation mode, write, leave initialisation
//! mode, restore the write protection. The protection is restored even
//! if initialisation mode could not be entered.
//!
//! The clock source of a running RTC only changes across a backup domain
//! reset. [`Rtc::init`] refuses a different source unless
//! [`RtcConfig::reset_backup_domain`] is set.

use crate::config::{self, SpinBudget};
use crate::bits::field;
use crate::pac::{rtc, RTC};
use crate::error::{Error, Result};
use crate::rcc::{LseState, OscillatorConfig, Rcc};

// RCC BDCR
const BDCR_RTCSEL_SHIFT: u32 = 8;

// ISR
const ISR_INIT: u32 = 1 << 7;

const WPR_KEY1: u32 = 0xCA;
const WPR_KEY2: u32 = 0x53;
const WPR_LOCK: u32 = 0xFF;

/// RTC kernel clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RtcClock {
    /// ~32 kHz internal RC, always available
    Lsi,
    /// 32.768 kHz crystal or external clock
    ///
    /// This is in the backup power domain, and so it can remain
    /// operational as long as VBat is present.
    Lse(LseState),
}

impl RtcClock {
    fn rtcsel(self) -> u32 {
        match self {
            RtcClock::Lse(_) => 0b01,
            RtcClock::Lsi => 0b10,
        }
    }

    /// PREDIV_A and PREDIV_S giving a 1 Hz calendar clock
    pub fn prescalers(self) -> (u8, u16) {
        match self {
            // 32000 / (128 * 250)
            RtcClock::Lsi => (127, 249),
            // 32768 / (128 * 256)
            RtcClock::Lse(_) => (127, 255),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RtcConfig {
    pub clock: RtcClock,
    /// Reset the whole backup domain first. This clears the calendar and
    /// is needed to change the clock source of a running RTC.
    pub reset_backup_domain: bool,
}

impl Default for RtcConfig {
    fn default() -> Self {
        RtcConfig {
            clock: RtcClock::Lsi,
            reset_backup_domain: false,
        }
    }
}

/// Time of day, 24 hour format
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Time {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

impl Time {
    pub fn new(hours: u8, minutes: u8, seconds: u8) -> Result<Self> {
        if hours > 23 || minutes > 59 || seconds > 59 {
            return Err(Error::Invalid);
        }
        Ok(Time {
            hours,
            minutes,
            seconds,
        })
    }

    /// TR register value
    pub fn to_tr(self) -> u32 {
        bcd(self.hours) << 16 | bcd(self.minutes) << 8 | bcd(self.seconds)
    }

    pub fn from_tr(tr: u32) -> Self {
        Time {
            hours: from_bcd((tr >> 16) & 0x3F),
            minutes: from_bcd((tr >> 8) & 0x7F),
            seconds: from_bcd(tr & 0x7F),
        }
    }
}

/// Calendar date
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Date {
    /// Years since 2000, 0 ..= 99
    pub year: u8,
    /// 1 ..= 12
    pub month: u8,
    /// Day of the month, 1 ..= 31
    pub date: u8,
    /// 1 (Monday) ..= 7 (Sunday)
    pub weekday: u8,
}

impl Date {
    pub fn new(year: u8, month: u8, date: u8, weekday: u8) -> Result<Self> {
        if year > 99
            || !(1..=12).contains(&month)
            || !(1..=31).contains(&date)
            || !(1..=7).contains(&weekday)
        {
            return Err(Error::Invalid);
        }
        Ok(Date {
            year,
            month,
            date,
            weekday,
        })
    }

    /// DR register value. The weekday is binary, the rest BCD.
    pub fn to_dr(self) -> u32 {
        bcd(self.year) << 16
            | (self.weekday as u32 & 0x7) << 13
            | bcd(self.month) << 8
            | bcd(self.date)
    }

    pub fn from_dr(dr: u32) -> Self {
        Date {
            year: from_bcd((dr >> 16) & 0xFF),
            month: from_bcd((dr >> 8) & 0x1F),
            date: from_bcd(dr & 0x3F),
            weekday: ((dr >> 13) & 0x7) as u8,
        }
    }
}

fn bcd(value: u8) -> u32 {
    ((value / 10) << 4 | value % 10) as u32
}

fn from_bcd(bcd: u32) -> u8 {
    ((bcd >> 4) * 10 + (bcd & 0xF)) as u8
}

/// Real-Time Clock
pub struct Rtc<'a> {
    reg: &'a rtc::RegisterBlock,
    spin_budget: SpinBudget,
}

impl Rtc<'static> {
    pub fn new(rtc: RTC) -> Self {
        let _ = rtc;
        Rtc::from_registers(unsafe { &*RTC::ptr() })
    }
}

impl<'a> Rtc<'a> {
    pub fn from_registers(reg: &'a rtc::RegisterBlock) -> Self {
        Rtc {
            reg,
            spin_budget: SpinBudget(config::RTC_INIT_SPINS),
        }
    }

    pub fn with_spin_budget(mut self, spins: u32) -> Self {
        self.spin_budget = SpinBudget(spins);
        self
    }

    /// Start the clock source, select it and set the 1 Hz prescalers
    ///
    /// Backup domain access is enabled through PWR first. The oscillator
    /// start is bounded like every [`Rcc`] oscillator request.
    ///
    /// A backup domain already clocked from another source is
    /// [`Error::Invalid`] unless `reset_backup_domain` is set, and nothing
    /// is written in that case.
    pub fn init(&mut self, rcc: &mut Rcc, cfg: &RtcConfig) -> Result<()> {
        let selected = field(rcc.rb.bdcr.read().bits(), BDCR_RTCSEL_SHIFT, 2);
        if !cfg.reset_backup_domain && selected != 0 && selected != cfg.clock.rtcsel() {
            error!("RTC clocked from source {}, backup domain reset needed", selected);
            return Err(Error::Invalid);
        }

        rcc.enable_backup_access();

        if cfg.reset_backup_domain {
            rcc.rb.bdcr.modify(|_, w| w.bdrst().set_bit());
            rcc.rb.bdcr.modify(|_, w| w.bdrst().clear_bit());
        }

        let osc = match cfg.clock {
            RtcClock::Lsi => OscillatorConfig {
                lsi: Some(true),
                ..Default::default()
            },
            RtcClock::Lse(state) => OscillatorConfig {
                lse: Some(state),
                ..Default::default()
            },
        };
        rcc.configure_oscillator(&osc)?;

        write_field!(rcc.rb.bdcr, BDCR_RTCSEL_SHIFT, 2, cfg.clock.rtcsel());
        rcc.rb.bdcr.modify(|_, w| w.rtcen().set_bit());

        let (prediv_a, prediv_s) = cfg.clock.prescalers();
        let reg = self.reg;
        self.write_protected(|| {
            write_bits!(reg.prer, (prediv_a as u32) << 16 | prediv_s as u32);
            reg.cr.modify(|_, w| w.fmt().clear_bit());
        })?;
        self.unlock();
        self.reg.cr.modify(|_, w| w.bypshad().set_bit());
        self.lock();

        info!("RTC running from {:?}", cfg.clock);
        Ok(())
    }

    fn unlock(&self) {
        write_bits!(self.reg.wpr, WPR_KEY1);
        write_bits!(self.reg.wpr, WPR_KEY2);
    }

    fn lock(&self) {
        write_bits!(self.reg.wpr, WPR_LOCK);
    }

    /// Run `f` in initialisation mode with the write protection removed
    fn write_protected<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(),
    {
        self.unlock();
        set_bits!(self.reg.isr, ISR_INIT);
        let isr = &self.reg.isr;
        if let Err(e) = self
            .spin_budget
            .wait_until(|| isr.read().initf().bit_is_set())
        {
            error!("RTC init mode not entered");
            clear_bits!(isr, ISR_INIT);
            self.lock();
            return Err(e);
        }
        f();
        clear_bits!(self.reg.isr, ISR_INIT);
        self.lock();
        Ok(())
    }

    pub fn set_time(&mut self, time: &Time) -> Result<()> {
        let tr = Time::new(time.hours, time.minutes, time.seconds)?.to_tr();
        let reg = self.reg;
        self.write_protected(|| write_bits!(reg.tr, tr))
    }

    pub fn set_date(&mut self, date: &Date) -> Result<()> {
        let dr = Date::new(date.year, date.month, date.date, date.weekday)?.to_dr();
        let reg = self.reg;
        self.write_protected(|| write_bits!(reg.dr, dr))
    }

    pub fn time(&self) -> Time {
        Time::from_tr(self.reg.tr.read().bits())
    }

    pub fn date(&self) -> Date {
        Date::from_dr(self.reg.dr.read().bits())
    }

    /// Whether the calendar has been set since the last backup domain
    /// reset
    pub fn is_calendar_initialized(&self) -> bool {
        self.reg.isr.read().inits().bit_is_set()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::tests::{peek, zeroed};
    use crate::timer::tests::Clocks;

    const BDCR_RTCEN: u32 = 1 << 15;
    const CR_BYPSHAD: u32 = 1 << 5;
    const CR_FMT: u32 = 1 << 6;
    const ISR_INITF: u32 = 1 << 6;

    fn ready_block() -> rtc::RegisterBlock {
        let reg: rtc::RegisterBlock = zeroed();
        write_bits!(reg.isr, ISR_INITF);
        reg
    }

    #[test]
    fn time_packing_round_trips() {
        for hours in 0..24 {
            for minutes in 0..60 {
                for seconds in 0..60 {
                    let time = Time::new(hours, minutes, seconds).unwrap();
                    assert_eq!(Time::from_tr(time.to_tr()), time);
                }
            }
        }
        assert_eq!(Time::new(23, 59, 58).unwrap().to_tr(), 0x23_59_58);
    }

    #[test]
    fn date_packing() {
        let date = Date::new(26, 10, 16, 5).unwrap();
        assert_eq!(date.to_dr(), 0x26 << 16 | 5 << 13 | 0x10 << 8 | 0x16);
        assert_eq!(Date::from_dr(date.to_dr()), date);
    }

    #[test]
    fn out_of_range_values() {
        assert_eq!(Time::new(24, 0, 0), Err(Error::Invalid));
        assert_eq!(Time::new(0, 60, 0), Err(Error::Invalid));
        assert_eq!(Time::new(0, 0, 60), Err(Error::Invalid));
        assert_eq!(Date::new(100, 1, 1, 1), Err(Error::Invalid));
        assert_eq!(Date::new(0, 13, 1, 1), Err(Error::Invalid));
        assert_eq!(Date::new(0, 1, 0, 1), Err(Error::Invalid));
        assert_eq!(Date::new(0, 1, 1, 8), Err(Error::Invalid));

        let reg = ready_block();
        let mut rtc = Rtc::from_registers(&reg);
        let bad = Time {
            hours: 25,
            minutes: 0,
            seconds: 0,
        };
        assert_eq!(rtc.set_time(&bad), Err(Error::Invalid));
        assert_eq!(peek(&reg.wpr), 0);
    }

    #[test]
    fn set_time_runs_the_write_bracket() {
        let reg = ready_block();
        let mut rtc = Rtc::from_registers(&reg).with_spin_budget(8);

        rtc.set_time(&Time::new(13, 37, 5).unwrap()).unwrap();
        rtc.set_date(&Date::new(26, 2, 28, 6).unwrap()).unwrap();
        assert_eq!(reg.tr.read().bits(), 0x13_37_05);
        assert_eq!(rtc.time(), Time::new(13, 37, 5).unwrap());
        assert_eq!(rtc.date(), Date::new(26, 2, 28, 6).unwrap());
        assert!(reg.isr.read().init().bit_is_clear());
        assert_eq!(peek(&reg.wpr), WPR_LOCK);
    }

    #[test]
    /// Write protection is restored when INITF never sets
    fn relock_on_timeout() {
        let reg: rtc::RegisterBlock = zeroed();
        let mut rtc = Rtc::from_registers(&reg).with_spin_budget(8);
        assert_eq!(
            rtc.set_time(&Time::new(1, 2, 3).unwrap()),
            Err(Error::Timeout)
        );
        assert_eq!(reg.tr.read().bits(), 0);
        assert_eq!(peek(&reg.wpr), WPR_LOCK);
        assert!(reg.isr.read().init().bit_is_clear());
    }

    #[test]
    fn init_from_lsi() {
        let clocks = Clocks::hsi();
        // LSI ready, backup domain not yet clocked
        write_bits!(clocks.rcc.csr, 1 << 1);
        let mut rcc = clocks.rcc().with_spin_budget(8);

        let reg = ready_block();
        let mut rtc = Rtc::from_registers(&reg).with_spin_budget(8);
        rtc.init(&mut rcc, &RtcConfig::default()).unwrap();

        assert!(clocks.pwr.cr.read().dbp().bit_is_set());
        assert_eq!(clocks.rcc.bdcr.read().bits(), 0b10 << 8 | BDCR_RTCEN);
        assert_eq!(reg.prer.read().bits(), 127 << 16 | 249);
        assert_eq!(reg.cr.read().bits() & (CR_BYPSHAD | CR_FMT), CR_BYPSHAD);
        assert_eq!(peek(&reg.wpr), WPR_LOCK);
    }

    #[test]
    /// A backup domain clocked from the LSE keeps its source
    fn source_change_needs_backup_reset() {
        let clocks = Clocks::hsi();
        write_bits!(clocks.rcc.csr, 1 << 1);
        write_bits!(clocks.rcc.bdcr, 0b01 << 8 | BDCR_RTCEN);
        let mut rcc = clocks.rcc().with_spin_budget(8);

        let reg = ready_block();
        let mut rtc = Rtc::from_registers(&reg).with_spin_budget(8);
        assert_eq!(
            rtc.init(&mut rcc, &RtcConfig::default()),
            Err(Error::Invalid)
        );
        assert_eq!(clocks.rcc.bdcr.read().bits(), 0b01 << 8 | BDCR_RTCEN);
        assert!(clocks.pwr.cr.read().dbp().bit_is_clear());
        assert_eq!(reg.prer.read().bits(), 0);

        let reset = RtcConfig {
            reset_backup_domain: true,
            ..Default::default()
        };
        rtc.init(&mut rcc, &reset).unwrap();
        assert_eq!(field(clocks.rcc.bdcr.read().bits(), 8, 2), 0b10);
        assert_eq!(reg.prer.read().bits(), 127 << 16 | 249);
    }

    #[test]
    fn lse_prescalers() {
        assert_eq!(RtcClock::Lse(LseState::On).prescalers(), (127, 255));
        assert_eq!(RtcClock::Lsi.prescalers(), (127, 249));
    }
}
