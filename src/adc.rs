//! Analog to Digital Converter (ADC)
//!
//! ADC1, ADC2 and ADC3 are 12-bit successive approximation converters
//! with 19 multiplexed channels: 16 external inputs, the temperature
//! sensor (18), the internal reference (17) and VBAT (18 on ADC1, shared
//! with the temperature sensor).
//!
//! A conversion group is a sequence of up to 16 ranks, each naming a
//! channel. The sequence length is set by [`AdcConfig::conversions`] and
//! the ranks by [`Adc::config_channel`].
//!
//! ```ignore
//! let mut adc1 = dp.ADC1.adc(&dp.ADC_COMMON);
//! adc1.init(&rcc, &AdcConfig::default())?;
//! adc1.config_channel(0, 1, AdcSampleTime::T_84)?;
//! adc1.start_conversion();
//! adc1.poll_for_conversion()?;
//! let sample = adc1.read();
//! ```
//!
//! [`Adc`] also implements the embedded-hal `OneShot` trait, reading a
//! single channel on rank 1.

use embedded_hal::adc::{Channel, OneShot};

use crate::config::{self, SpinBudget};
use crate::bits::field;
use crate::pac::{adc1 as adc, adc_common, ADC1, ADC2, ADC3, ADC_COMMON};
use crate::error::{Error, Result};
use crate::rcc::{PeripheralClock, Rcc};

// SR
const SR_EOC: u32 = 1 << 1;
const SR_OVR: u32 = 1 << 5;

// CR1
const CR1_EOCIE: u32 = 1 << 5;
const CR1_SCAN: u32 = 1 << 8;
const CR1_RES_SHIFT: u32 = 24;
const CR1_OVRIE: u32 = 1 << 26;

// CR2
const CR2_CONT: u32 = 1 << 1;
const CR2_EOCS: u32 = 1 << 10;
const CR2_ALIGN: u32 = 1 << 11;
const CR2_EXTSEL_SHIFT: u32 = 24;
const CR2_EXTEN_SHIFT: u32 = 28;
const CR2_SWSTART: u32 = 1 << 30;

// SQR1
const SQR1_L_SHIFT: u32 = 20;

// Common CCR
const CCR_ADCPRE_SHIFT: u32 = 16;
const CCR_TSVREFE: u32 = 1 << 23;

/// Highest channel number
pub const MAX_CHANNEL: u8 = 18;

/// ADC instances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcId {
    ADC1,
    ADC2,
    ADC3,
}

impl AdcId {
    pub fn clock(self) -> PeripheralClock {
        match self {
            AdcId::ADC1 => PeripheralClock::ADC1,
            AdcId::ADC2 => PeripheralClock::ADC2,
            AdcId::ADC3 => PeripheralClock::ADC3,
        }
    }
}

/// ADC sampling time
///
/// Options for sampling time. Each is T + 0.5 ADC clock cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcSampleTime {
    /// 3 cycles sampling time
    T_3 = 0b000,
    /// 15 cycles sampling time
    T_15 = 0b001,
    /// 28 cycles sampling time
    T_28 = 0b010,
    /// 56 cycles sampling time
    T_56 = 0b011,
    /// 84 cycles sampling time
    T_84 = 0b100,
    /// 112 cycles sampling time
    T_112 = 0b101,
    /// 144 cycles sampling time
    T_144 = 0b110,
    /// 480 cycles sampling time
    T_480 = 0b111,
}

impl Default for AdcSampleTime {
    fn default() -> Self {
        AdcSampleTime::T_84
    }
}

/// ADC resolution setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resolution {
    TwelveBit = 0b00,
    TenBit = 0b01,
    EightBit = 0b10,
    SixBit = 0b11,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Align {
    Right,
    Left,
}

/// Edge of the external trigger that starts a regular conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExternalTrigger {
    /// Software start only
    Disabled = 0b00,
    Rising = 0b01,
    Falling = 0b10,
    Both = 0b11,
}

/// ADC clock, PCLK2 divided by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockPrescaler {
    Div2 = 0b00,
    Div4 = 0b01,
    Div6 = 0b10,
    Div8 = 0b11,
}

/// Status flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Flag {
    AnalogWatchdog = 0,
    EndOfConversion = 1,
    InjectedEndOfConversion = 2,
    InjectedStart = 3,
    RegularStart = 4,
    Overrun = 5,
}

/// Interrupt events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    EndOfConversion,
    Overrun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdcConfig {
    pub resolution: Resolution,
    /// Convert every rank of the sequence
    pub scan: bool,
    pub align: Align,
    /// Restart the sequence when it ends
    pub continuous: bool,
    /// Raise EOC after each conversion rather than after the sequence
    pub eoc_each_conversion: bool,
    pub external_trigger: ExternalTrigger,
    /// Sequence length, 1 ..= 16
    pub conversions: u8,
    pub prescaler: ClockPrescaler,
}

impl Default for AdcConfig {
    fn default() -> Self {
        AdcConfig {
            resolution: Resolution::TwelveBit,
            scan: false,
            align: Align::Right,
            continuous: false,
            eoc_each_conversion: false,
            external_trigger: ExternalTrigger::Disabled,
            conversions: 1,
            prescaler: ClockPrescaler::Div4,
        }
    }
}

/// A converter channel usable with `OneShot`
pub struct AdcChannel<const N: u8>;

/// Internal reference voltage
pub type Vrefint = AdcChannel<17>;
/// Internal temperature sensor
pub type Temperature = AdcChannel<18>;

impl<'a, const N: u8> Channel<Adc<'a>> for AdcChannel<N> {
    type ID = u8;

    fn channel() -> u8 {
        N
    }
}

pub trait AdcExt {
    /// `common` is shared by the three converters and only borrowed
    fn adc(self, common: &ADC_COMMON) -> Adc<'static>;
}

macro_rules! adc_hal {
    ($($ADC:ident,)+) => {
        $(
            impl AdcExt for $ADC {
                fn adc(self, common: &ADC_COMMON) -> Adc<'static> {
                    let _ = (self, common);
                    let (rb, common) = unsafe {
                        (
                            &*($ADC::ptr() as *const adc::RegisterBlock),
                            &*ADC_COMMON::ptr(),
                        )
                    };
                    Adc::from_registers(rb, common, AdcId::$ADC)
                }
            }
        )+
    };
}

adc_hal!(ADC1, ADC2, ADC3,);

/// Analog to Digital Converter
pub struct Adc<'a> {
    rb: &'a adc::RegisterBlock,
    common: &'a adc_common::RegisterBlock,
    id: AdcId,
    spin_budget: SpinBudget,
}

impl<'a> Adc<'a> {
    pub fn from_registers(
        rb: &'a adc::RegisterBlock,
        common: &'a adc_common::RegisterBlock,
        id: AdcId,
    ) -> Self {
        Adc {
            rb,
            common,
            id,
            spin_budget: SpinBudget(config::ADC_CONVERSION_SPINS),
        }
    }

    pub fn with_spin_budget(mut self, spins: u32) -> Self {
        self.spin_budget = SpinBudget(spins);
        self
    }

    pub fn id(&self) -> AdcId {
        self.id
    }

    /// Enable the clock and load the configuration
    ///
    /// The converter is left powered down, see [`Adc::enable`].
    pub fn init(&mut self, rcc: &Rcc, cfg: &AdcConfig) -> Result<()> {
        if cfg.conversions == 0 || cfg.conversions > 16 {
            return Err(Error::Invalid);
        }
        rcc.enable(self.id.clock());

        let scan = if cfg.scan { CR1_SCAN } else { 0 };
        let res = (cfg.resolution as u32) << CR1_RES_SHIFT;
        self.rb.cr1.modify(|r, w| unsafe {
            w.bits((r.bits() & !((0b11 << CR1_RES_SHIFT) | CR1_SCAN)) | res | scan)
        });

        let mut cr2 = (cfg.external_trigger as u32) << CR2_EXTEN_SHIFT;
        if cfg.align == Align::Left {
            cr2 |= CR2_ALIGN;
        }
        if cfg.continuous {
            cr2 |= CR2_CONT;
        }
        if cfg.eoc_each_conversion {
            cr2 |= CR2_EOCS;
        }
        let mut mask = CR2_ALIGN | CR2_CONT | CR2_EOCS | (0b11 << CR2_EXTEN_SHIFT);
        if cfg.external_trigger == ExternalTrigger::Disabled {
            // Do not leave a stale trigger source selected
            mask |= 0b1111 << CR2_EXTSEL_SHIFT;
        }
        self.rb
            .cr2
            .modify(|r, w| unsafe { w.bits((r.bits() & !mask) | cr2) });

        write_field!(self.rb.sqr1, SQR1_L_SHIFT, 4, cfg.conversions - 1);
        write_field!(self.common.ccr, CCR_ADCPRE_SHIFT, 2, cfg.prescaler as u32);

        debug!(
            "{:?} {:?}, {} conversions",
            self.id, cfg.resolution, cfg.conversions
        );
        Ok(())
    }

    /// Reset the converters and gate the clock. The reset line is
    /// shared by the three ADCs.
    pub fn deinit(&mut self, rcc: &Rcc) {
        self.rb.cr2.modify(|_, w| w.adon().clear_bit());
        rcc.reset(self.id.clock());
        rcc.disable(self.id.clock());
    }

    /// Place `channel` at `rank` of the regular sequence with the given
    /// sampling time
    pub fn config_channel(
        &mut self,
        channel: u8,
        rank: u8,
        sample_time: AdcSampleTime,
    ) -> Result<()> {
        if channel > MAX_CHANNEL || !(1..=16).contains(&rank) {
            return Err(Error::Invalid);
        }

        if channel > 9 {
            write_field!(self.rb.smpr1, (channel - 10) * 3, 3, sample_time as u32);
        } else {
            write_field!(self.rb.smpr2, channel * 3, 3, sample_time as u32);
        }

        match rank {
            1..=6 => write_field!(self.rb.sqr3, (rank - 1) * 5, 5, channel),
            7..=12 => write_field!(self.rb.sqr2, (rank - 7) * 5, 5, channel),
            _ => write_field!(self.rb.sqr1, (rank - 13) * 5, 5, channel),
        }
        Ok(())
    }

    /// Power up the converter
    pub fn enable(&mut self) {
        self.rb.cr2.modify(|_, w| w.adon().set_bit());
    }

    /// Power down the converter
    pub fn disable(&mut self) {
        self.rb.cr2.modify(|_, w| w.adon().clear_bit());
    }

    pub fn is_enabled(&self) -> bool {
        self.rb.cr2.read().adon().bit_is_set()
    }

    /// Start the regular sequence from software
    ///
    /// A powered down converter is enabled first and given its
    /// stabilisation time.
    pub fn start_conversion(&mut self) {
        if !self.is_enabled() {
            self.enable();
            for _ in 0..config::ADC_STABILIZATION_SPINS {
                core::hint::spin_loop();
            }
        }
        set_bits!(self.rb.cr2, CR2_SWSTART);
    }

    /// Leave continuous mode. A conversion in progress still completes.
    pub fn stop_conversion(&mut self) {
        clear_bits!(self.rb.cr2, CR2_CONT);
    }

    /// Last conversion result. Reading clears the EOC flag.
    pub fn read(&mut self) -> u16 {
        self.rb.dr.read().bits() as u16
    }

    pub fn flag(&self, flag: Flag) -> bool {
        self.rb.sr.read().bits() & (1 << flag as u32) != 0
    }

    pub fn clear_flag(&mut self, flag: Flag) {
        clear_bits!(self.rb.sr, 1 << flag as u32);
    }

    /// Wait for the end of conversion flag
    pub fn poll_for_conversion(&self) -> Result<()> {
        let sr = &self.rb.sr;
        self.spin_budget.wait_until(|| sr.read().eoc().bit_is_set())
    }

    pub fn listen(&mut self, event: Event) {
        set_bits!(self.rb.cr1, match event {
            Event::EndOfConversion => CR1_EOCIE,
            Event::Overrun => CR1_OVRIE,
        });
    }

    pub fn unlisten(&mut self, event: Event) {
        clear_bits!(self.rb.cr1, match event {
            Event::EndOfConversion => CR1_EOCIE,
            Event::Overrun => CR1_OVRIE,
        });
    }

    /// Interrupt handler
    ///
    /// Returns the sample if a conversion ended. A pending overrun is
    /// cleared.
    pub fn handle_irq(&mut self) -> Option<u16> {
        let sr = self.rb.sr.read().bits();
        if sr & SR_OVR != 0 {
            warn!("{:?} overrun", self.id);
            clear_bits!(self.rb.sr, SR_OVR);
        }
        if sr & SR_EOC != 0 {
            Some(self.read())
        } else {
            None
        }
    }

    /// Connect the temperature sensor and internal reference to their
    /// channels. Shared by the three ADCs.
    pub fn set_temp_sensor_vrefint(&mut self, enable: bool) {
        if enable {
            set_bits!(self.common.ccr, CCR_TSVREFE);
        } else {
            clear_bits!(self.common.ccr, CCR_TSVREFE);
        }
    }

    /// Single blocking conversion of `channel` on rank 1
    pub fn convert(&mut self, channel: u8) -> Result<u16> {
        if channel > MAX_CHANNEL {
            return Err(Error::Invalid);
        }
        // Keep the sampling time already configured for the channel
        let sample_time = if channel > 9 {
            field(self.rb.smpr1.read().bits(), (channel as u32 - 10) * 3, 3)
        } else {
            field(self.rb.smpr2.read().bits(), channel as u32 * 3, 3)
        };
        let sample_time = sample_time_from_bits(sample_time);
        self.config_channel(channel, 1, sample_time)?;
        self.start_conversion();
        self.poll_for_conversion()?;
        Ok(self.read())
    }
}

fn sample_time_from_bits(bits: u32) -> AdcSampleTime {
    match bits {
        0b000 => AdcSampleTime::T_3,
        0b001 => AdcSampleTime::T_15,
        0b010 => AdcSampleTime::T_28,
        0b011 => AdcSampleTime::T_56,
        0b100 => AdcSampleTime::T_84,
        0b101 => AdcSampleTime::T_112,
        0b110 => AdcSampleTime::T_144,
        _ => AdcSampleTime::T_480,
    }
}

impl<'a, WORD, PIN> OneShot<Adc<'a>, WORD, PIN> for Adc<'a>
where
    WORD: From<u16>,
    PIN: Channel<Adc<'a>, ID = u8>,
{
    type Error = Error;

    fn read(&mut self, _pin: &mut PIN) -> nb::Result<WORD, Error> {
        let sample = self.convert(PIN::channel())?;
        Ok(sample.into())
    }
}
