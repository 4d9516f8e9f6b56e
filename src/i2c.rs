//! Inter Integrated Circuit (I2C)
//!
//! Master mode with 7-bit addressing, in standard (100 kHz) or fast
//! (400 kHz) mode. Transfers poll the status flags, each wait bounded by
//! the spin budget. Once START has been sent, any failure releases the
//! bus with a STOP condition.
//!
//! ```ignore
//! let mut i2c1 = dp.I2C1.i2c();
//! i2c1.init(&rcc, &I2cConfig::default())?;
//! i2c1.master_send(0x3C, &[0x00, 0xAF], Stop::Generate)?;
//! ```

use crate::config::{self, SpinBudget};
use crate::pac::{i2c1 as i2c, Interrupt, I2C1, I2C2, I2C3};
use crate::error;
use crate::hal::blocking::i2c::{Read, Write, WriteRead};
use crate::rcc::{PeripheralClock, Rcc};
use crate::time::Hertz;

// CR1
const CR1_PE: u32 = 1 << 0;
const CR1_START: u32 = 1 << 8;
const CR1_STOP: u32 = 1 << 9;
const CR1_ACK: u32 = 1 << 10;
const CR1_SWRST: u32 = 1 << 15;

// CR2
const CR2_ITERREN: u32 = 1 << 8;
const CR2_ITEVTEN: u32 = 1 << 9;
const CR2_ITBUFEN: u32 = 1 << 10;

// OAR1, bit 14 must be kept at 1 by software
const OAR1_RESERVED: u32 = 1 << 14;

// SR1
const SR1_SB: u32 = 1 << 0;
const SR1_ADDR: u32 = 1 << 1;
const SR1_BTF: u32 = 1 << 2;
const SR1_RXNE: u32 = 1 << 6;
const SR1_TXE: u32 = 1 << 7;
const SR1_BERR: u32 = 1 << 8;
const SR1_ARLO: u32 = 1 << 9;
const SR1_AF: u32 = 1 << 10;

// SR2
const SR2_MSL: u32 = 1 << 0;
const SR2_BUSY: u32 = 1 << 1;

// CCR
const CCR_DUTY: u32 = 1 << 14;
const CCR_FS: u32 = 1 << 15;

const STANDARD_SPEED: u32 = 100_000;
const FAST_SPEED: u32 = 400_000;

/// I2C error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// Bus error
    Bus,
    /// Arbitration loss
    Arbitration,
    /// No ack received
    NotAcknowledge,
    /// A flag did not change within the spin budget
    Timeout,
}

/// I2C Stop Configuration
///
/// What to do with the bus at the end of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Stop {
    /// Generate a STOP condition
    Generate,
    /// Keep the bus, the next transfer starts with a repeated START
    Hold,
}

/// SCL low to high ratio in fast mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DutyCycle {
    Ratio2to1,
    Ratio16to9,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// 100 kHz
    Standard,
    /// 400 kHz
    Fast(DutyCycle),
}

impl Mode {
    pub fn speed(self) -> Hertz {
        match self {
            Mode::Standard => Hertz(STANDARD_SPEED),
            Mode::Fast(_) => Hertz(FAST_SPEED),
        }
    }
}

/// I2C Events
///
/// Each event is a possible interrupt source, if enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// START sent, address sent, byte transfer finished (ITEVTEN)
    Event,
    /// TXE and RXNE (ITBUFEN)
    Buffer,
    /// Bus, arbitration and acknowledge errors (ITERREN)
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cConfig {
    pub mode: Mode,
    /// 7-bit own address
    pub own_address: u8,
    /// Acknowledge received bytes
    pub ack: bool,
}

impl Default for I2cConfig {
    fn default() -> Self {
        I2cConfig {
            mode: Mode::Standard,
            own_address: 0,
            ack: true,
        }
    }
}

/// Register values for one bus speed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    /// CR2 FREQ, PCLK1 in MHz
    pub freq: u32,
    /// CCR including the F/S and DUTY bits
    pub ccr: u32,
    pub trise: u32,
}

/// Compute FREQ, CCR and TRISE for `mode` with the peripheral clocked
/// from `pclk1`
///
/// PCLK1 must be 2 ..= 50 MHz. The SCL period is rounded up so the bus
/// never runs faster than the nominal speed.
pub fn timing(pclk1: Hertz, mode: Mode) -> error::Result<Timing> {
    let freq = pclk1.to_mhz();
    if !(2..=50).contains(&freq) {
        return Err(error::Error::Invalid);
    }
    let speed = mode.speed().0;
    let ceil = |d: u32| (pclk1.0 + d - 1) / d;

    let (ccr, trise) = match mode {
        // Rise time 1000 ns
        Mode::Standard => (ceil(2 * speed).max(4), freq + 1),
        // Rise time 300 ns
        Mode::Fast(duty) => {
            let ccr = match duty {
                DutyCycle::Ratio2to1 => ceil(3 * speed).max(1),
                DutyCycle::Ratio16to9 => ceil(25 * speed).max(1) | CCR_DUTY,
            };
            (ccr | CCR_FS, freq * 300 / 1000 + 1)
        }
    };
    Ok(Timing { freq, ccr, trise })
}

/// I2C instances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cId {
    I2C1,
    I2C2,
    I2C3,
}

impl I2cId {
    pub fn clock(self) -> PeripheralClock {
        match self {
            I2cId::I2C1 => PeripheralClock::I2C1,
            I2cId::I2C2 => PeripheralClock::I2C2,
            I2cId::I2C3 => PeripheralClock::I2C3,
        }
    }

    /// Event and error interrupt lines
    pub fn interrupts(self) -> (Interrupt, Interrupt) {
        match self {
            I2cId::I2C1 => (Interrupt::I2C1_EV, Interrupt::I2C1_ER),
            I2cId::I2C2 => (Interrupt::I2C2_EV, Interrupt::I2C2_ER),
            I2cId::I2C3 => (Interrupt::I2C3_EV, Interrupt::I2C3_ER),
        }
    }
}

pub trait I2cExt {
    fn i2c(self) -> I2c<'static>;
}

macro_rules! i2c_hal {
    ($($I2CX:ident,)+) => {
        $(
            impl I2cExt for $I2CX {
                fn i2c(self) -> I2c<'static> {
                    let _ = self;
                    let rb = unsafe { &*($I2CX::ptr() as *const i2c::RegisterBlock) };
                    I2c::from_registers(rb, I2cId::$I2CX)
                }
            }
        )+
    };
}

i2c_hal!(I2C1, I2C2, I2C3,);

pub struct I2c<'a> {
    rb: &'a i2c::RegisterBlock,
    id: I2cId,
    ack: bool,
    spin_budget: SpinBudget,
}

impl<'a> I2c<'a> {
    pub fn from_registers(rb: &'a i2c::RegisterBlock, id: I2cId) -> Self {
        I2c {
            rb,
            id,
            ack: true,
            spin_budget: SpinBudget(config::I2C_FLAG_SPINS),
        }
    }

    pub fn with_spin_budget(mut self, spins: u32) -> Self {
        self.spin_budget = SpinBudget(spins);
        self
    }

    pub fn id(&self) -> I2cId {
        self.id
    }

    /// Enable the clock, program the bus timing from the live PCLK1 and
    /// enable the peripheral
    pub fn init(&mut self, rcc: &Rcc, cfg: &I2cConfig) -> error::Result<()> {
        if cfg.own_address > 0x7F {
            return Err(error::Error::Invalid);
        }
        let pclk1 = rcc.pclk1();
        let t = timing(pclk1, cfg.mode)?;

        rcc.enable(self.id.clock());
        clear_bits!(self.rb.cr1, CR1_PE);
        set_bits!(self.rb.cr1, CR1_SWRST);
        clear_bits!(self.rb.cr1, CR1_SWRST);

        write_field!(self.rb.cr2, 0, 6, t.freq);
        write_bits!(self.rb.ccr, t.ccr);
        write_bits!(self.rb.trise, t.trise);
        write_bits!(
            self.rb.oar1,
            OAR1_RESERVED | ((cfg.own_address as u32) << 1)
        );

        self.ack = cfg.ack;
        set_bits!(self.rb.cr1, CR1_PE);
        if cfg.ack {
            // ACK can only be set with PE on
            set_bits!(self.rb.cr1, CR1_ACK);
        }

        debug!(
            "{:?} {:?} PCLK1 {} Hz CCR {} TRISE {}",
            self.id, cfg.mode, pclk1.0, t.ccr, t.trise
        );
        Ok(())
    }

    /// Disable the peripheral and gate its clock
    pub fn deinit(&mut self, rcc: &Rcc) {
        clear_bits!(self.rb.cr1, CR1_PE);
        rcc.disable(self.id.clock());
    }

    pub fn listen(&mut self, event: Event) {
        set_bits!(self.rb.cr2, event_mask(event));
    }

    pub fn unlisten(&mut self, event: Event) {
        clear_bits!(self.rb.cr2, event_mask(event));
    }

    /// Wait until any bit of `mask` is set in SR1
    ///
    /// Bus, arbitration and acknowledge errors are cleared and reported.
    fn wait_sr1(&self, mask: u32) -> Result<(), Error> {
        let rb = self.rb;
        let mut fault = None;
        self.spin_budget
            .wait_until(|| {
                let sr1 = rb.sr1.read().bits();
                fault = if sr1 & SR1_BERR != 0 {
                    Some((Error::Bus, SR1_BERR))
                } else if sr1 & SR1_ARLO != 0 {
                    Some((Error::Arbitration, SR1_ARLO))
                } else if sr1 & SR1_AF != 0 {
                    Some((Error::NotAcknowledge, SR1_AF))
                } else {
                    None
                };
                fault.is_some() || sr1 & mask != 0
            })
            .map_err(|_| {
                warn!("{:?} SR1 {} timeout", self.id, mask);
                Error::Timeout
            })?;

        match fault {
            Some((e, flag)) => {
                clear_bits!(rb.sr1, flag);
                Err(e)
            }
            None => Ok(()),
        }
    }

    /// Wait for a bus held by another master
    fn wait_bus_free(&self) -> Result<(), Error> {
        let sr2 = &self.rb.sr2;
        if sr2.read().bits() & (SR2_BUSY | SR2_MSL) == SR2_BUSY {
            self.spin_budget
                .wait_until(|| sr2.read().busy().bit_is_clear())
                .map_err(|_| Error::Timeout)?;
        }
        Ok(())
    }

    /// START (or repeated START) followed by the address byte
    fn start(&self, address_byte: u8) -> Result<(), Error> {
        set_bits!(self.rb.cr1, CR1_START);
        self.wait_sr1(SR1_SB)?;
        write_bits!(self.rb.dr, address_byte as u32);
        self.wait_sr1(SR1_ADDR)
    }

    /// Release the bus if `result` failed after START
    fn stop_on_error<T>(&self, result: Result<T, Error>) -> Result<T, Error> {
        if let Err(e) = &result {
            warn!("{:?} {:?}, releasing the bus", self.id, e);
            set_bits!(self.rb.cr1, CR1_STOP);
        }
        result
    }

    /// Reading SR1 then SR2 clears ADDR
    fn clear_addr(&self) {
        let _ = self.rb.sr1.read().bits();
        let _ = self.rb.sr2.read().bits();
    }

    /// Write `data` to the slave at 7-bit address `addr`
    ///
    /// An empty `data` only addresses the slave.
    pub fn master_send(&mut self, addr: u8, data: &[u8], stop: Stop) -> Result<(), Error> {
        self.wait_bus_free()?;
        let sent = self.send_bytes(addr, data);
        self.stop_on_error(sent)?;

        if stop == Stop::Generate {
            set_bits!(self.rb.cr1, CR1_STOP);
        }
        trace!("{:?} sent {} bytes to {}", self.id, data.len(), addr);
        Ok(())
    }

    fn send_bytes(&self, addr: u8, data: &[u8]) -> Result<(), Error> {
        self.start(addr << 1)?;
        self.clear_addr();

        for &byte in data {
            self.wait_sr1(SR1_TXE)?;
            write_bits!(self.rb.dr, byte as u32);
        }
        // BTF needs a byte in the shift register
        if !data.is_empty() {
            self.wait_sr1(SR1_BTF)?;
        }
        Ok(())
    }

    /// Fill `buffer` from the slave at 7-bit address `addr`
    ///
    /// The last byte is not acknowledged.
    pub fn master_receive(
        &mut self,
        addr: u8,
        buffer: &mut [u8],
        stop: Stop,
    ) -> Result<(), Error> {
        if buffer.is_empty() {
            return Ok(());
        }

        self.wait_bus_free()?;
        set_bits!(self.rb.cr1, CR1_ACK);
        let received = self.receive_bytes(addr, buffer, stop);
        if self.ack {
            set_bits!(self.rb.cr1, CR1_ACK);
        }
        self.stop_on_error(received)
    }

    fn receive_bytes(&self, addr: u8, buffer: &mut [u8], stop: Stop) -> Result<(), Error> {
        let Some((last, rest)) = buffer.split_last_mut() else {
            return Ok(());
        };
        self.start((addr << 1) | 1)?;

        if rest.is_empty() {
            // NACK the only byte before ADDR is cleared
            clear_bits!(self.rb.cr1, CR1_ACK);
            self.clear_addr();
        } else {
            self.clear_addr();
            for byte in rest {
                self.wait_sr1(SR1_RXNE)?;
                *byte = self.rb.dr.read().bits() as u8;
            }
            clear_bits!(self.rb.cr1, CR1_ACK);
        }
        if stop == Stop::Generate {
            set_bits!(self.rb.cr1, CR1_STOP);
        }
        self.wait_sr1(SR1_RXNE)?;
        *last = self.rb.dr.read().bits() as u8;
        Ok(())
    }
}

fn event_mask(event: Event) -> u32 {
    match event {
        Event::Event => CR2_ITEVTEN,
        Event::Buffer => CR2_ITBUFEN,
        Event::Error => CR2_ITERREN,
    }
}

impl<'a> Write for I2c<'a> {
    type Error = Error;

    fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), Error> {
        self.master_send(addr, bytes, Stop::Generate)
    }
}

impl<'a> Read for I2c<'a> {
    type Error = Error;

    fn read(&mut self, addr: u8, buffer: &mut [u8]) -> Result<(), Error> {
        self.master_receive(addr, buffer, Stop::Generate)
    }
}

impl<'a> WriteRead for I2c<'a> {
    type Error = Error;

    fn write_read(
        &mut self,
        addr: u8,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Error> {
        self.master_send(addr, bytes, Stop::Hold)?;
        self.master_receive(addr, buffer, Stop::Generate)
    }
}
