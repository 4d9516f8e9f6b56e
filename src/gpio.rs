//! General Purpose Input / Output
//!
//! Each port holds 16 pins. A [`Gpio`] driver is obtained from the port
//! handle, which also enables the port clock:
//!
//! ```ignore
//! let gpioa = dp.GPIOA.split(&rcc);
//! gpioa.configure(5, &PinConfig::output())?;
//! gpioa.write_pin(5, PinState::High);
//! ```
//!
//! Pins are configured at runtime by number. Arguments out of range are
//! rejected with [`Error::Invalid`] before any register is written.
//!
//! ## Modes
//!
//! - **Input**: floating or pulled input
//! - **Output**: push-pull or open-drain output
//! - **Alternate**: pin driven by another peripheral, AF0 ..= AF15
//! - **Analog**: analog input for the ADC
//! - **Interrupt**: input whose edges raise an EXTI request. The port
//!   must be given an [`Exti`] with [`Gpio::with_exti`] first. Enabling
//!   the line in the NVIC is left to the caller.
//!
//! Pin reads always sample the input data register, so an output pin
//! reads the level actually present on the pad. Writes go through the
//! atomic set/reset register and never disturb the other pins of the
//! port.

use core::convert::Infallible;

use crate::bits::field;
use crate::pac::gpioa as gpio;
use crate::error::{Error, Result};
use crate::exti::{Edge, Event, Exti};
use crate::rcc::{PeripheralClock, Rcc};

pub use embedded_hal::digital::v2::PinState;

/// GPIO port. The discriminant is the EXTI line selector value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    A = 0,
    B = 1,
    C = 2,
    D = 3,
    E = 4,
    F = 5,
    G = 6,
    H = 7,
}

impl Port {
    pub fn from_index(index: u8) -> Option<Port> {
        Some(match index {
            0 => Port::A,
            1 => Port::B,
            2 => Port::C,
            3 => Port::D,
            4 => Port::E,
            5 => Port::F,
            6 => Port::G,
            7 => Port::H,
            _ => return None,
        })
    }

    fn clock(self) -> PeripheralClock {
        match self {
            Port::A => PeripheralClock::GPIOA,
            Port::B => PeripheralClock::GPIOB,
            Port::C => PeripheralClock::GPIOC,
            Port::D => PeripheralClock::GPIOD,
            Port::E => PeripheralClock::GPIOE,
            Port::F => PeripheralClock::GPIOF,
            Port::G => PeripheralClock::GPIOG,
            Port::H => PeripheralClock::GPIOH,
        }
    }
}

/// Pin mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Input,
    Output,
    Alternate,
    Analog,
    /// Input routed to its EXTI line
    Interrupt(Edge),
}

impl Mode {
    fn moder_bits(self) -> u32 {
        match self {
            Mode::Input | Mode::Interrupt(_) => 0b00,
            Mode::Output => 0b01,
            Mode::Alternate => 0b10,
            Mode::Analog => 0b11,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputType {
    PushPull,
    OpenDrain,
}

/// Internal pull resistor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    None = 0,
    Up = 1,
    Down = 2,
}

/// Output slew rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Speed {
    Low = 0,
    Medium = 1,
    High = 2,
    VeryHigh = 3,
}

/// Configuration of one pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinConfig {
    pub mode: Mode,
    pub output_type: OutputType,
    pub pull: Pull,
    pub speed: Speed,
    /// Alternate function number, used in `Mode::Alternate`
    pub alternate: u8,
}

impl Default for PinConfig {
    fn default() -> Self {
        PinConfig {
            mode: Mode::Input,
            output_type: OutputType::PushPull,
            pull: Pull::None,
            speed: Speed::Low,
            alternate: 0,
        }
    }
}

impl PinConfig {
    /// Push-pull output
    pub fn output() -> Self {
        PinConfig {
            mode: Mode::Output,
            ..Default::default()
        }
    }

    /// Input with a pull resistor
    pub fn input(pull: Pull) -> Self {
        PinConfig {
            pull,
            ..Default::default()
        }
    }

    /// Push-pull alternate function
    pub fn alternate(af: u8) -> Self {
        PinConfig {
            mode: Mode::Alternate,
            speed: Speed::VeryHigh,
            alternate: af,
            ..Default::default()
        }
    }

    /// Open-drain alternate function with pull-up, as used by I2C
    pub fn alternate_open_drain(af: u8) -> Self {
        PinConfig {
            output_type: OutputType::OpenDrain,
            pull: Pull::Up,
            ..PinConfig::alternate(af)
        }
    }

    pub fn analog() -> Self {
        PinConfig {
            mode: Mode::Analog,
            ..Default::default()
        }
    }

    /// Floating input raising an EXTI request on `edge`
    pub fn interrupt(edge: Edge) -> Self {
        PinConfig {
            mode: Mode::Interrupt(edge),
            ..Default::default()
        }
    }
}

/// Extension trait to obtain a [`Gpio`] driver from a port handle
pub trait GpioExt {
    /// Enable the port clock and return its driver
    fn split(self, rcc: &Rcc) -> Gpio<'static>;
}

macro_rules! gpio {
    ($($GPIOX:ident: $port:ident,)+) => {
        $(
            impl GpioExt for crate::pac::$GPIOX {
                fn split(self, rcc: &Rcc) -> Gpio<'static> {
                    rcc.enable(Port::$port.clock());
                    // Every port shares the GPIOA register layout
                    let rb = unsafe { &*(crate::pac::$GPIOX::ptr() as *const gpio::RegisterBlock) };
                    Gpio::from_registers(rb, Port::$port)
                }
            }
        )+
    };
}

gpio! {
    GPIOA: A,
    GPIOB: B,
    GPIOC: C,
    GPIOD: D,
    GPIOE: E,
    GPIOF: F,
    GPIOG: G,
    GPIOH: H,
}

/// Driver for one GPIO port
pub struct Gpio<'a> {
    rb: &'a gpio::RegisterBlock,
    port: Port,
    exti: Option<&'a Exti<'a>>,
}

impl<'a> Gpio<'a> {
    pub fn from_registers(rb: &'a gpio::RegisterBlock, port: Port) -> Self {
        Gpio {
            rb,
            port,
            exti: None,
        }
    }

    /// Attach the EXTI controller used by interrupt modes
    pub fn with_exti(mut self, exti: &'a Exti<'a>) -> Self {
        self.exti = Some(exti);
        self
    }

    pub fn port(&self) -> Port {
        self.port
    }

    /// Program mode, output type, speed, pull and alternate function of
    /// `pin`
    ///
    /// Interrupt modes also route EXTI line `pin` to this port, select
    /// the edges and unmask the line. The NVIC line is left alone.
    pub fn configure(&self, pin: u8, cfg: &PinConfig) -> Result<()> {
        if pin > 15 || cfg.alternate > 15 {
            return Err(Error::Invalid);
        }
        let exti = match cfg.mode {
            Mode::Interrupt(_) => Some(self.exti.ok_or(Error::Invalid)?),
            _ => None,
        };

        let two = pin * 2;
        if matches!(cfg.mode, Mode::Output | Mode::Alternate) {
            write_field!(self.rb.ospeedr, two, 2, cfg.speed as u32);
            let od = matches!(cfg.output_type, OutputType::OpenDrain);
            write_field!(self.rb.otyper, pin, 1, od as u32);
        }
        let pull = match cfg.mode {
            Mode::Analog => Pull::None,
            _ => cfg.pull,
        };
        write_field!(self.rb.pupdr, two, 2, pull as u32);

        if cfg.mode == Mode::Alternate {
            self.set_alternate(pin, cfg.alternate);
        }
        write_field!(self.rb.moder, two, 2, cfg.mode.moder_bits());

        if let (Some(exti), Mode::Interrupt(edge)) = (exti, cfg.mode) {
            // Lines 0 to 15 always exist
            if let Some(ev) = Event::gpio(pin) {
                exti.route(pin, self.port);
                exti.set_trigger(ev, edge);
                exti.listen(ev);
            }
        }
        Ok(())
    }

    fn set_alternate(&self, pin: u8, af: u8) {
        let offset = (pin % 8) * 4;
        if pin < 8 {
            write_field!(self.rb.afrl, offset, 4, af);
        } else {
            write_field!(self.rb.afrh, offset, 4, af);
        }
    }

    /// Return `pin` to its reset state: floating input, low speed,
    /// push-pull, AF0
    ///
    /// An EXTI line routed to this pin is disabled.
    pub fn deinit_pin(&self, pin: u8) -> Result<()> {
        if pin > 15 {
            return Err(Error::Invalid);
        }
        if let (Some(exti), Some(ev)) = (self.exti, Event::gpio(pin)) {
            if exti.routed_port(pin) == Some(self.port) {
                exti.disable(ev);
            }
        }
        let two = pin * 2;
        write_field!(self.rb.moder, two, 2, 0);
        self.set_alternate(pin, 0);
        write_field!(self.rb.ospeedr, two, 2, 0);
        write_field!(self.rb.otyper, pin, 1, 0);
        write_field!(self.rb.pupdr, two, 2, 0);
        Ok(())
    }

    /// Pulse the port reset line, returning every pin to its reset state.
    /// The port clock stays on.
    pub fn deinit(&self, rcc: &Rcc) {
        rcc.reset(self.port.clock());
    }

    /// Mode currently programmed for `pin`, interrupt modes read as input
    pub fn mode(&self, pin: u8) -> Option<Mode> {
        if pin > 15 {
            return None;
        }
        Some(match field(self.rb.moder.read().bits(), pin as u32 * 2, 2) {
            0b00 => Mode::Input,
            0b01 => Mode::Output,
            0b10 => Mode::Alternate,
            _ => Mode::Analog,
        })
    }

    /// Level on the `pin` pad. Pins out of range read low
    pub fn read_pin(&self, pin: u8) -> PinState {
        read(self.rb, pin)
    }

    /// Drive `pin`. Pins out of range are ignored
    pub fn write_pin(&self, pin: u8, state: PinState) {
        write(self.rb, pin, state)
    }

    pub fn toggle_pin(&self, pin: u8) {
        toggle(self.rb, pin)
    }

    /// Input levels of the whole port
    pub fn read_port(&self) -> u16 {
        self.rb.idr.read().bits() as u16
    }

    /// Drive the whole port
    pub fn write_port(&self, value: u16) {
        write_bits!(self.rb.odr, value as u32);
    }

    /// Handle implementing the `embedded-hal` digital traits for `pin`
    pub fn pin(&self, pin: u8) -> Result<Pin<'a>> {
        if pin > 15 {
            return Err(Error::Invalid);
        }
        Ok(Pin { rb: self.rb, pin })
    }
}

/// BSRR value driving `pin` to `state`: set bits in the low half, reset
/// bits in the high half
fn bsrr_bits(pin: u8, state: PinState) -> u32 {
    match state {
        PinState::High => 1 << pin,
        PinState::Low => 1 << (pin + 16),
    }
}

fn read(rb: &gpio::RegisterBlock, pin: u8) -> PinState {
    if pin > 15 {
        return PinState::Low;
    }
    PinState::from(rb.idr.read().bits() & (1 << pin) != 0)
}

fn write(rb: &gpio::RegisterBlock, pin: u8, state: PinState) {
    if pin > 15 {
        return;
    }
    write_bits!(rb.bsrr, bsrr_bits(pin, state));
}

fn toggle(rb: &gpio::RegisterBlock, pin: u8) {
    if pin > 15 {
        return;
    }
    let driven = rb.odr.read().bits() & (1 << pin) != 0;
    write(rb, pin, PinState::from(!driven));
}

/// Single pin of a port
pub struct Pin<'a> {
    rb: &'a gpio::RegisterBlock,
    pin: u8,
}

impl<'a> Pin<'a> {
    pub fn number(&self) -> u8 {
        self.pin
    }
}

impl<'a> embedded_hal::digital::v2::OutputPin for Pin<'a> {
    type Error = Infallible;

    fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
        write(self.rb, self.pin, PinState::High);
        Ok(())
    }

    fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
        write(self.rb, self.pin, PinState::Low);
        Ok(())
    }
}

impl<'a> embedded_hal::digital::v2::StatefulOutputPin for Pin<'a> {
    fn is_set_high(&self) -> core::result::Result<bool, Self::Error> {
        Ok(self.rb.odr.read().bits() & (1 << self.pin) != 0)
    }

    fn is_set_low(&self) -> core::result::Result<bool, Self::Error> {
        self.is_set_high().map(|b| !b)
    }
}

impl<'a> embedded_hal::digital::v2::ToggleableOutputPin for Pin<'a> {
    type Error = Infallible;

    fn toggle(&mut self) -> core::result::Result<(), Self::Error> {
        toggle(self.rb, self.pin);
        Ok(())
    }
}

impl<'a> embedded_hal::digital::v2::InputPin for Pin<'a> {
    type Error = Infallible;

    fn is_high(&self) -> core::result::Result<bool, Self::Error> {
        Ok(read(self.rb, self.pin) == PinState::High)
    }

    fn is_low(&self) -> core::result::Result<bool, Self::Error> {
        self.is_high().map(|b| !b)
    }
}
