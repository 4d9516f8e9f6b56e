//! Input capture
//!
//! A channel in input capture mode latches the counter into its CCR on
//! the selected edge of its input. The time base (prescaler, period) is
//! set up first with [`Timer::init`].
//!
//! ```ignore
//! tim2.init(&rcc, &TimerConfig { prescaler: 83, period: u32::MAX, ..Default::default() })?;
//! tim2.ic_config(Channel::C1, &IcConfig::default())?;
//! tim2.ic_start_it(Channel::C1)?;
//!
//! // TIM2 handler
//! if tim2.is_pending(Event::CaptureCompare(Channel::C1)) {
//!     let stamp = tim2.ic_read(Channel::C1)?;
//! }
//! ```

use crate::error::{Error, Result};
use crate::timer::{Channel, Timer};

// CCMRx input fields, relative to the channel's byte
const CCMR_ICPSC_SHIFT: u8 = 2;
const CCMR_ICF_SHIFT: u8 = 4;

/// Capture edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IcPolarity {
    Rising,
    Falling,
    BothEdges,
}

/// Input routed to the channel, CCxS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IcSelection {
    /// TIx to ICx
    Direct = 0b01,
    /// The neighbouring input, TI2 to IC1, TI1 to IC2, ...
    Indirect = 0b10,
    /// Trigger controller input
    Trc = 0b11,
}

/// Capture on every n-th edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IcPrescaler {
    Div1 = 0b00,
    Div2 = 0b01,
    Div4 = 0b10,
    Div8 = 0b11,
}

/// Input capture configuration of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IcConfig {
    pub polarity: IcPolarity,
    pub selection: IcSelection,
    pub prescaler: IcPrescaler,
    /// Digital filter, ICxF, 0 ..= 15
    pub filter: u8,
}

impl Default for IcConfig {
    fn default() -> Self {
        IcConfig {
            polarity: IcPolarity::Rising,
            selection: IcSelection::Direct,
            prescaler: IcPrescaler::Div1,
            filter: 0,
        }
    }
}

fn cce(channel: Channel) -> u32 {
    1 << (channel as u32 * 4)
}

fn polarity_mask(channel: Channel) -> u32 {
    // CCxP and CCxNP
    0b1010 << (channel as u32 * 4)
}

fn ccie(channel: Channel) -> u32 {
    1 << (channel as u32 + 1)
}

impl<'a> Timer<'a> {
    /// Configure a channel for input capture
    pub fn ic_config(&mut self, channel: Channel, cfg: &IcConfig) -> Result<()> {
        self.check_channel(channel)?;
        if cfg.filter > 15 {
            return Err(Error::Invalid);
        }

        // CCxS is only writable with the channel off
        clear_bits!(self.tim.ccer, cce(channel));

        let field = (cfg.selection as u32)
            | ((cfg.prescaler as u32) << CCMR_ICPSC_SHIFT)
            | ((cfg.filter as u32) << CCMR_ICF_SHIFT);
        self.update_ccmr(channel, |_| field);

        let shift = channel as u32 * 4;
        let polarity: u32 = match cfg.polarity {
            IcPolarity::Rising => 0b0000,
            IcPolarity::Falling => 0b0010,
            IcPolarity::BothEdges => 0b1010,
        } << shift;
        self.tim
            .ccer
            .modify(|r, w| unsafe { w.bits((r.bits() & !polarity_mask(channel)) | polarity) });
        Ok(())
    }

    /// Enable capture on a channel and start the counter
    pub fn ic_start(&mut self, channel: Channel) -> Result<()> {
        self.check_channel(channel)?;
        set_bits!(self.tim.ccer, cce(channel));
        self.tim.cr1.modify(|_, w| w.cen().set_bit());
        Ok(())
    }

    /// As [`Timer::ic_start`], with the capture interrupt enabled
    pub fn ic_start_it(&mut self, channel: Channel) -> Result<()> {
        self.check_channel(channel)?;
        clear_bits!(self.tim.sr, ccie(channel));
        set_bits!(self.tim.dier, ccie(channel));
        self.ic_start(channel)
    }

    /// Disable capture and its interrupt on a channel
    pub fn ic_stop(&mut self, channel: Channel) -> Result<()> {
        self.check_channel(channel)?;
        clear_bits!(self.tim.dier, ccie(channel));
        clear_bits!(self.tim.ccer, cce(channel));
        if self.ccer_bits() & 0x1111 == 0 {
            self.tim.cr1.modify(|_, w| w.cen().clear_bit());
        }
        Ok(())
    }

    /// Last captured counter value. Reading CCR clears the capture flag.
    pub fn ic_read(&mut self, channel: Channel) -> Result<u32> {
        self.check_channel(channel)?;
        Ok(self.tim.ccr[channel as usize].read().bits())
    }
}
