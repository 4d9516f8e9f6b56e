//! Serial
//!
//! USART and UART instances in asynchronous 8N1 mode, oversampling by
//! 16, without hardware flow control.
//!
//! ```ignore
//! let mut usart2 = dp.USART2.serial();
//! usart2.init(&rcc, &Config::default().baudrate(9_600.bps()))?;
//! writeln!(usart2, "hello").ok();
//! ```

use core::fmt;

use crate::config::{self, SpinBudget};
use crate::pac::{usart1 as usart, Interrupt, UART4, UART5, USART1, USART2, USART3, USART6};
use crate::error;
use crate::hal::serial;
use crate::rcc::{PeripheralClock, Rcc};
use crate::time::{Bps, Hertz};
use void::Void;

// SR
const SR_PE: u32 = 1 << 0;
const SR_FE: u32 = 1 << 1;
const SR_NF: u32 = 1 << 2;
const SR_ORE: u32 = 1 << 3;
const SR_RXNE: u32 = 1 << 5;

// CR1
const CR1_RE: u32 = 1 << 2;
const CR1_TE: u32 = 1 << 3;
const CR1_IDLEIE: u32 = 1 << 4;
const CR1_RXNEIE: u32 = 1 << 5;
const CR1_TCIE: u32 = 1 << 6;
const CR1_TXEIE: u32 = 1 << 7;
const CR1_PCE: u32 = 1 << 10;
const CR1_M: u32 = 1 << 12;
const CR1_OVER8: u32 = 1 << 15;

// CR2 STOP bits
const CR2_STOP_MASK: u32 = 0b11 << 12;

// CR3 RTSE, CTSE
const CR3_FLOW_MASK: u32 = 0b11 << 8;

/// Interrupt event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// New data has been received
    Rxne,
    /// New data can be sent
    Txe,
    /// The last frame has left the shift register
    TransmissionComplete,
    /// The receive line went idle
    Idle,
}

/// Serial error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// Framing error
    Framing,
    /// Noise error
    Noise,
    /// RX buffer overrun
    Overrun,
    /// Parity check error
    Parity,
    /// A blocking transfer ran out of its spin budget
    Timeout,
}

/// Enabled directions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Tx,
    Rx,
    TxRx,
}

impl Mode {
    fn cr1_bits(self) -> u32 {
        match self {
            Mode::Tx => CR1_TE,
            Mode::Rx => CR1_RE,
            Mode::TxRx => CR1_TE | CR1_RE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub baudrate: Bps,
    pub mode: Mode,
}

impl Config {
    pub fn baudrate(mut self, baudrate: Bps) -> Self {
        self.baudrate = baudrate;
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            baudrate: Bps(115_200),
            mode: Mode::TxRx,
        }
    }
}

/// BRR for `baud` with the peripheral clocked from `pclk`, rounded to
/// the nearest sixteenth
pub fn brr(pclk: Hertz, baud: Bps) -> error::Result<u32> {
    if baud.0 == 0 {
        return Err(error::Error::Invalid);
    }
    let div = (pclk.0 as u64 + baud.0 as u64 / 2) / baud.0 as u64;
    // USARTDIV from 1.0 to 4095.9375
    if !(16..=0xFFFF).contains(&div) {
        return Err(error::Error::Invalid);
    }
    Ok(div as u32)
}

/// USART and UART instances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsartId {
    USART1,
    USART2,
    USART3,
    UART4,
    UART5,
    USART6,
}

impl UsartId {
    pub fn clock(self) -> PeripheralClock {
        match self {
            UsartId::USART1 => PeripheralClock::USART1,
            UsartId::USART2 => PeripheralClock::USART2,
            UsartId::USART3 => PeripheralClock::USART3,
            UsartId::UART4 => PeripheralClock::UART4,
            UsartId::UART5 => PeripheralClock::UART5,
            UsartId::USART6 => PeripheralClock::USART6,
        }
    }

    pub fn interrupt(self) -> Interrupt {
        match self {
            UsartId::USART1 => Interrupt::USART1,
            UsartId::USART2 => Interrupt::USART2,
            UsartId::USART3 => Interrupt::USART3,
            UsartId::UART4 => Interrupt::UART4,
            UsartId::UART5 => Interrupt::UART5,
            UsartId::USART6 => Interrupt::USART6,
        }
    }
}

pub trait SerialExt {
    fn serial(self) -> Serial<'static>;
}

macro_rules! usart {
    ($($USARTX:ident,)+) => {
        $(
            impl SerialExt for $USARTX {
                fn serial(self) -> Serial<'static> {
                    let _ = self;
                    // UART4 and UART5 lack the synchronous and flow control
                    // bits but share the USART layout
                    let rb = unsafe { &*($USARTX::ptr() as *const usart::RegisterBlock) };
                    Serial::from_registers(rb, UsartId::$USARTX)
                }
            }
        )+
    };
}

usart!(USART1, USART2, USART3, UART4, UART5, USART6,);

/// Serial abstraction
pub struct Serial<'a> {
    rb: &'a usart::RegisterBlock,
    id: UsartId,
    spin_budget: SpinBudget,
}

impl<'a> Serial<'a> {
    pub fn from_registers(rb: &'a usart::RegisterBlock, id: UsartId) -> Self {
        Serial {
            rb,
            id,
            spin_budget: SpinBudget(config::USART_FLAG_SPINS),
        }
    }

    pub fn with_spin_budget(mut self, spins: u32) -> Self {
        self.spin_budget = SpinBudget(spins);
        self
    }

    pub fn id(&self) -> UsartId {
        self.id
    }

    /// Enable the clock and configure 8N1 at the requested baud rate,
    /// computed from the live clock of the owning bus
    pub fn init(&mut self, rcc: &Rcc, cfg: &Config) -> error::Result<()> {
        let clock = self.id.clock();
        let pclk = rcc.bus_clock(clock.bus());
        let div = brr(pclk, cfg.baudrate)?;

        rcc.enable(clock);
        self.rb.cr1.modify(|_, w| w.ue().clear_bit());

        // 1 stop bit, no flow control
        clear_bits!(self.rb.cr2, CR2_STOP_MASK);
        clear_bits!(self.rb.cr3, CR3_FLOW_MASK);
        write_bits!(self.rb.brr, div);
        // 8 data bits, no parity, oversampling by 16
        let mode = cfg.mode.cr1_bits();
        self.rb.cr1.modify(|r, w| unsafe {
            w.bits((r.bits() & !(CR1_M | CR1_PCE | CR1_OVER8 | CR1_TE | CR1_RE)) | mode)
        });
        self.rb.cr1.modify(|_, w| w.ue().set_bit());

        debug!(
            "{:?} {} bps from {} Hz, BRR {}",
            self.id, cfg.baudrate.0, pclk.0, div
        );
        Ok(())
    }

    /// Disable the peripheral and gate its clock
    pub fn deinit(&mut self, rcc: &Rcc) {
        self.rb.cr1.modify(|_, w| w.ue().clear_bit());
        rcc.disable(self.id.clock());
    }

    /// Starts listening for an interrupt event
    pub fn listen(&mut self, event: Event) {
        set_bits!(self.rb.cr1, event_mask(event));
    }

    /// Stop listening for an interrupt event
    pub fn unlisten(&mut self, event: Event) {
        clear_bits!(self.rb.cr1, event_mask(event));
    }

    /// Whether the receive line went idle. Clears the flag.
    pub fn is_idle(&mut self) -> bool {
        if self.rb.sr.read().idle().bit_is_set() {
            let _ = self.rb.dr.read().bits();
            true
        } else {
            false
        }
    }

    /// Blocking transmit of `data`, returns once the last frame is out
    pub fn send(&mut self, data: &[u8]) -> Result<(), Error> {
        let sr = &self.rb.sr;
        for &byte in data {
            self.spin_budget
                .wait_until(|| sr.read().txe().bit_is_set())
                .map_err(|_| Error::Timeout)?;
            write_bits!(self.rb.dr, byte as u32);
        }
        self.spin_budget
            .wait_until(|| sr.read().tc().bit_is_set())
            .map_err(|_| Error::Timeout)
    }

    /// Blocking receive filling `buffer`
    pub fn receive(&mut self, buffer: &mut [u8]) -> Result<(), Error> {
        for byte in buffer.iter_mut() {
            let mut spins = self.spin_budget.0;
            *byte = loop {
                match serial::Read::read(self) {
                    Ok(b) => break b,
                    Err(nb::Error::Other(e)) => return Err(e),
                    Err(nb::Error::WouldBlock) if spins == 0 => return Err(Error::Timeout),
                    Err(nb::Error::WouldBlock) => {
                        spins -= 1;
                        core::hint::spin_loop();
                    }
                }
            };
        }
        Ok(())
    }
}

fn event_mask(event: Event) -> u32 {
    match event {
        Event::Rxne => CR1_RXNEIE,
        Event::Txe => CR1_TXEIE,
        Event::TransmissionComplete => CR1_TCIE,
        Event::Idle => CR1_IDLEIE,
    }
}

impl<'a> serial::Read<u8> for Serial<'a> {
    type Error = Error;

    fn read(&mut self) -> nb::Result<u8, Error> {
        let sr = self.rb.sr.read().bits();

        let err = if sr & SR_PE != 0 {
            Some(Error::Parity)
        } else if sr & SR_FE != 0 {
            Some(Error::Framing)
        } else if sr & SR_NF != 0 {
            Some(Error::Noise)
        } else if sr & SR_ORE != 0 {
            Some(Error::Overrun)
        } else {
            None
        };

        if let Some(err) = err {
            // Error flags clear on an SR read followed by a DR read
            let _ = self.rb.dr.read().bits();
            Err(nb::Error::Other(err))
        } else if sr & SR_RXNE != 0 {
            Ok(self.rb.dr.read().bits() as u8)
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}

impl<'a> serial::Write<u8> for Serial<'a> {
    // NOTE(Void) Transmission cannot fail
    type Error = Void;

    fn flush(&mut self) -> nb::Result<(), Void> {
        if self.rb.sr.read().tc().bit_is_set() {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    fn write(&mut self, byte: u8) -> nb::Result<(), Void> {
        if self.rb.sr.read().txe().bit_is_set() {
            write_bits!(self.rb.dr, byte as u32);
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}

impl<'a> fmt::Write for Serial<'a> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            if let Err(e) = nb::block!(serial::Write::write(self, byte)) {
                void::unreachable(e)
            }
        }
        Ok(())
    }
}
