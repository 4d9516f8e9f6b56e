//! Output compare and Pulse Width Modulation (PWM)
//!
//! Output compare is available on every timer with channels: TIM1 to TIM5
//! and TIM8 have 4, TIM9 and TIM12 have 2, TIM10, TIM11, TIM13 and TIM14
//! have 1. The basic timers TIM6 and TIM7 have none.
//!
//! The time base is set up first with [`Timer::init`]. The PWM frequency
//! is the timer clock / ((PSC + 1) * (ARR + 1)) and the duty cycle of a
//! channel is CCR / (ARR + 1).
//!
//! ## Usage
//!
//! ```ignore
//! let mut tim1 = dp.TIM1.timer();
//! tim1.init(&rcc, &TimerConfig { prescaler: 179, period: 999, ..Default::default() })?;
//! tim1.pwm_config(Channel::C1, &OcConfig::pwm(250))?;
//!
//! // Outputs of TIM1 and TIM8 also need the main output enable, which
//! // pwm_start sets
//! tim1.pwm_start(Channel::C1)?;
//!
//! // Set the duty cycle of channel 1 to 50%
//! tim1.set_duty(Channel::C1, tim1.max_duty() / 2)?;
//! ```

use crate::error::{Error, Result};
use crate::timer::{Channel, Timer};

// CCMRx output fields, relative to the channel's byte
const CCMR_CCS_MASK: u32 = 0b11;
const CCMR_OCPE: u32 = 1 << 3;
const CCMR_OCM_SHIFT: u8 = 4;
const CCMR_OC_MASK: u32 = CCMR_CCS_MASK | CCMR_OCPE | (0b111 << CCMR_OCM_SHIFT);

/// Output compare mode, OCxM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OcMode {
    /// Frozen, the output is unaffected by the comparison
    Timing = 0b000,
    /// Set active on match
    Active = 0b001,
    /// Set inactive on match
    Inactive = 0b010,
    /// Toggle on match
    Toggle = 0b011,
    ForceInactive = 0b100,
    ForceActive = 0b101,
    /// Active while CNT < CCR when counting up
    Pwm1 = 0b110,
    /// Inactive while CNT < CCR when counting up
    Pwm2 = 0b111,
}

/// Output polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    ActiveHigh,
    ActiveLow,
}

/// Output compare configuration of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OcConfig {
    pub mode: OcMode,
    /// CCR
    pub pulse: u32,
    pub polarity: Polarity,
    /// Buffer CCR until the next update event
    pub preload: bool,
}

impl OcConfig {
    /// PWM mode 1, active high, with preload
    pub fn pwm(pulse: u32) -> Self {
        OcConfig {
            mode: OcMode::Pwm1,
            pulse,
            polarity: Polarity::ActiveHigh,
            preload: true,
        }
    }
}

impl Default for OcConfig {
    fn default() -> Self {
        OcConfig {
            mode: OcMode::Timing,
            pulse: 0,
            polarity: Polarity::ActiveHigh,
            preload: false,
        }
    }
}

fn cce(channel: Channel) -> u32 {
    1 << (channel as u32 * 4)
}

fn ccp(channel: Channel) -> u32 {
    1 << (channel as u32 * 4 + 1)
}

impl<'a> Timer<'a> {
    /// Configure a channel as an output compare
    ///
    /// The channel output stays disabled until [`Timer::oc_start`].
    pub fn oc_config(&mut self, channel: Channel, cfg: &OcConfig) -> Result<()> {
        self.check_channel(channel)?;
        if cfg.pulse > self.id.counter_mask() {
            return Err(Error::Invalid);
        }

        clear_bits!(self.tim.ccer, cce(channel));

        let preload = if cfg.preload { CCMR_OCPE } else { 0 };
        self.update_ccmr(channel, |field| {
            (field & !CCMR_OC_MASK) | ((cfg.mode as u32) << CCMR_OCM_SHIFT) | preload
        });

        match cfg.polarity {
            Polarity::ActiveHigh => clear_bits!(self.tim.ccer, ccp(channel)),
            Polarity::ActiveLow => set_bits!(self.tim.ccer, ccp(channel)),
        }
        write_bits!(self.tim.ccr[channel as usize], cfg.pulse);
        Ok(())
    }

    /// Configure a channel as a PWM output
    ///
    /// Only the two PWM modes are accepted. CCR preload is always
    /// enabled so duty changes take effect on the next period.
    pub fn pwm_config(&mut self, channel: Channel, cfg: &OcConfig) -> Result<()> {
        if !matches!(cfg.mode, OcMode::Pwm1 | OcMode::Pwm2) {
            return Err(Error::Invalid);
        }
        self.oc_config(
            channel,
            &OcConfig {
                preload: true,
                ..*cfg
            },
        )
    }

    /// Enable the channel output and start the counter
    pub fn oc_start(&mut self, channel: Channel) -> Result<()> {
        self.check_channel(channel)?;
        set_bits!(self.tim.ccer, cce(channel));
        if self.id.is_advanced() {
            self.tim.bdtr.modify(|_, w| w.moe().set_bit());
        }
        self.tim.cr1.modify(|_, w| w.cen().set_bit());
        Ok(())
    }

    /// Disable the channel output
    ///
    /// The counter and, on TIM1 and TIM8, the main output enable are
    /// turned off once no channel output is left enabled.
    pub fn oc_stop(&mut self, channel: Channel) -> Result<()> {
        self.check_channel(channel)?;
        clear_bits!(self.tim.ccer, cce(channel));
        let ccer = self.ccer_bits();
        let any = [Channel::C1, Channel::C2, Channel::C3, Channel::C4]
            .iter()
            .any(|&ch| ccer & cce(ch) != 0);
        if !any {
            if self.id.is_advanced() {
                self.tim.bdtr.modify(|_, w| w.moe().clear_bit());
            }
            self.tim.cr1.modify(|_, w| w.cen().clear_bit());
        }
        Ok(())
    }

    pub fn pwm_start(&mut self, channel: Channel) -> Result<()> {
        self.oc_start(channel)
    }

    pub fn pwm_stop(&mut self, channel: Channel) -> Result<()> {
        self.oc_stop(channel)
    }

    /// Set the compare value of a channel
    ///
    /// Values above [`Timer::max_duty`] keep the output permanently
    /// active. Values wider than the counter saturate at its maximum.
    pub fn set_duty(&mut self, channel: Channel, duty: u32) -> Result<()> {
        self.check_channel(channel)?;
        write_bits!(
            self.tim.ccr[channel as usize],
            duty.min(self.id.counter_mask())
        );
        Ok(())
    }

    pub fn duty(&self, channel: Channel) -> Result<u32> {
        self.check_channel(channel)?;
        Ok(self.tim.ccr[channel as usize].read().bits())
    }

    /// Compare value of a 100% duty cycle, the period
    pub fn max_duty(&self) -> u32 {
        self.tim.arr.read().bits()
    }
}

impl<'a> embedded_hal::Pwm for Timer<'a> {
    type Channel = Channel;
    /// Period in timer ticks
    type Time = u32;
    type Duty = u32;

    fn disable(&mut self, channel: Channel) {
        self.pwm_stop(channel).ok();
    }

    fn enable(&mut self, channel: Channel) {
        self.pwm_start(channel).ok();
    }

    fn get_period(&self) -> u32 {
        self.period()
    }

    fn get_duty(&self, channel: Channel) -> u32 {
        self.duty(channel).unwrap_or(0)
    }

    fn get_max_duty(&self) -> u32 {
        self.max_duty()
    }

    fn set_duty(&mut self, channel: Channel, duty: u32) {
        Timer::set_duty(self, channel, duty).ok();
    }

    fn set_period<P>(&mut self, period: P)
    where
        P: Into<u32>,
    {
        self.set_period(period.into()).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::tests::zeroed;
    use crate::pac::tim1 as tim;
    use crate::timer::tests::Clocks;
    use crate::timer::{TimerConfig, TimerId};

    fn pwm_timer<'a>(tim: &'a tim::RegisterBlock, id: TimerId, clocks: &Clocks) -> Timer<'a> {
        let rcc = clocks.rcc();
        let mut timer = Timer::from_registers(tim, id);
        timer
            .init(
                &rcc,
                &TimerConfig {
                    prescaler: 15,
                    period: 999,
                    ..Default::default()
                },
            )
            .unwrap();
        timer
    }

    #[test]
    /// CCMR1 holds channels 1 and 2, CCMR2 channels 3 and 4
    fn channel_field_placement() {
        let clocks = Clocks::hsi();
        let tim: tim::RegisterBlock = zeroed();
        let mut timer = pwm_timer(&tim, TimerId::TIM3, &clocks);

        timer.pwm_config(Channel::C1, &OcConfig::pwm(100)).unwrap();
        assert_eq!(tim.ccmr1_output().read().bits(), 0b110 << 4 | 1 << 3);
        timer
            .pwm_config(
                Channel::C4,
                &OcConfig {
                    mode: OcMode::Pwm2,
                    pulse: 400,
                    polarity: Polarity::ActiveLow,
                    preload: false,
                },
            )
            .unwrap();
        assert_eq!(tim.ccmr2_output().read().bits(), (0b111 << 4 | 1 << 3) << 8);
        assert_eq!(tim.ccr[0].read().bits(), 100);
        assert_eq!(tim.ccr[3].read().bits(), 400);
        assert_eq!(tim.ccer.read().bits(), 1 << 13);

        timer
            .oc_config(
                Channel::C2,
                &OcConfig {
                    mode: OcMode::Toggle,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(tim.ccmr1_output().read().bits(), 0b110 << 4 | 1 << 3 | 0b011 << 12);
    }

    #[test]
    fn pwm_rejects_non_pwm_modes() {
        let clocks = Clocks::hsi();
        let tim: tim::RegisterBlock = zeroed();
        let mut timer = pwm_timer(&tim, TimerId::TIM2, &clocks);
        let toggle = OcConfig {
            mode: OcMode::Toggle,
            ..Default::default()
        };
        assert_eq!(timer.pwm_config(Channel::C1, &toggle), Err(Error::Invalid));
        assert_eq!(tim.ccmr1_output().read().bits(), 0);
    }

    #[test]
    fn channels_beyond_the_timer_are_refused() {
        let clocks = Clocks::hsi();
        let tim: tim::RegisterBlock = zeroed();
        let mut tim10 = pwm_timer(&tim, TimerId::TIM10, &clocks);
        assert_eq!(tim10.pwm_config(Channel::C2, &OcConfig::pwm(1)), Err(Error::Invalid));
        assert_eq!(tim10.set_duty(Channel::C2, 1), Err(Error::Invalid));

        let mut tim7 = Timer::from_registers(&tim, TimerId::TIM7);
        assert_eq!(tim7.oc_start(Channel::C1), Err(Error::Invalid));
    }

    #[test]
    /// Only TIM1 and TIM8 have the main output enable
    fn main_output_enable_on_advanced_timers_only() {
        let clocks = Clocks::hsi();

        let tim: tim::RegisterBlock = zeroed();
        let mut tim1 = pwm_timer(&tim, TimerId::TIM1, &clocks);
        tim1.pwm_config(Channel::C1, &OcConfig::pwm(500)).unwrap();
        tim1.pwm_start(Channel::C1).unwrap();
        assert!(tim.bdtr.read().moe().bit_is_set());
        assert!(tim.ccer.read().bits() & 1 != 0);
        assert!(tim.cr1.read().cen().bit_is_set());
        tim1.pwm_stop(Channel::C1).unwrap();
        assert_eq!(tim.bdtr.read().bits(), 0);
        assert!(!tim.cr1.read().cen().bit_is_set());

        let tim: tim::RegisterBlock = zeroed();
        let mut tim4 = pwm_timer(&tim, TimerId::TIM4, &clocks);
        tim4.pwm_config(Channel::C3, &OcConfig::pwm(500)).unwrap();
        tim4.pwm_start(Channel::C3).unwrap();
        assert_eq!(tim.bdtr.read().bits(), 0);
        assert!(tim.ccer.read().bits() & (1 << 8) != 0);
    }

    #[test]
    fn stop_keeps_counter_while_other_channels_run() {
        let clocks = Clocks::hsi();
        let tim: tim::RegisterBlock = zeroed();
        let mut timer = pwm_timer(&tim, TimerId::TIM8, &clocks);
        timer.pwm_start(Channel::C1).unwrap();
        timer.pwm_start(Channel::C2).unwrap();
        timer.pwm_stop(Channel::C1).unwrap();
        assert!(tim.cr1.read().cen().bit_is_set());
        assert!(tim.bdtr.read().moe().bit_is_set());
    }

    #[test]
    fn duty_follows_period() {
        let clocks = Clocks::hsi();
        let tim: tim::RegisterBlock = zeroed();
        let mut timer = pwm_timer(&tim, TimerId::TIM12, &clocks);
        assert_eq!(timer.max_duty(), 999);
        timer.set_duty(Channel::C2, timer.max_duty() / 2).unwrap();
        assert_eq!(timer.duty(Channel::C2), Ok(499));

        use embedded_hal::Pwm;
        Pwm::set_duty(&mut timer, Channel::C1, 250);
        assert_eq!(timer.get_duty(Channel::C1), 250);
        assert_eq!(timer.get_period(), 999);
    }

    #[test]
    /// A compare value wider than a 16-bit counter saturates rather than
    /// wrapping to a short pulse
    fn duty_saturates_at_counter_width() {
        let clocks = Clocks::hsi();
        let tim: tim::RegisterBlock = zeroed();
        let mut tim3 = pwm_timer(&tim, TimerId::TIM3, &clocks);
        tim3.set_duty(Channel::C1, 0x1_0001).unwrap();
        assert_eq!(tim3.duty(Channel::C1), Ok(0xFFFF));

        let mut tim2 = pwm_timer(&tim, TimerId::TIM2, &clocks);
        tim2.set_duty(Channel::C2, 0x1_0001).unwrap();
        assert_eq!(tim2.duty(Channel::C2), Ok(0x1_0001));
    }
}
