//! Direct Memory Access
//!
//! DMA1 and DMA2 each have 8 streams. A stream is configured once with a
//! [`DmaConfig`] and then started for each transfer. Only DMA2 can copy
//! memory to memory.
//!
//! ```ignore
//! let dma2 = dp.DMA2.split();
//! let mut stream = dma2.stream(0, DmaConfig {
//!     direction: Direction::MemoryToMemory,
//!     memory_size: DataSize::Word,
//!     peripheral_size: DataSize::Word,
//!     memory_increment: true,
//!     peripheral_increment: true,
//!     ..Default::default()
//! })?;
//! stream.init(&rcc)?;
//! stream.start(src.as_ptr() as u32, dst.as_mut_ptr() as u32, src.len() as u16)?;
//! while !stream.flags().transfer_complete {}
//! ```
//!
//! Memory to memory transfers run through the FIFO and cannot be
//! circular.
//!
//! The interrupt status of stream `n` sits in LISR (streams 0 to 3) or
//! HISR (streams 4 to 7) at bit offset 0, 6, 16 or 22 for `n % 4`.

use crate::config::{self, SpinBudget};
use crate::pac::{dma2 as dma, Interrupt, DMA1, DMA2};
use crate::error::{Error, Result};
use crate::rcc::{PeripheralClock, Rcc};

// SxCR
const CR_DMEIE: u32 = 1 << 1;
const CR_TEIE: u32 = 1 << 2;
const CR_HTIE: u32 = 1 << 3;
const CR_TCIE: u32 = 1 << 4;
const CR_DIR_SHIFT: u8 = 6;
const CR_CIRC: u32 = 1 << 8;
const CR_PINC: u32 = 1 << 9;
const CR_MINC: u32 = 1 << 10;
const CR_PSIZE_SHIFT: u8 = 11;
const CR_MSIZE_SHIFT: u8 = 13;
const CR_PL_SHIFT: u8 = 16;
const CR_CHSEL_SHIFT: u8 = 25;
const CR_INTERRUPTS: u32 = CR_DMEIE | CR_TEIE | CR_HTIE | CR_TCIE;

// SxFCR
const FCR_DMDIS: u32 = 1 << 2;
const FCR_FEIE: u32 = 1 << 7;
/// Reset value of SxFCR
const FCR_RESET: u32 = 0x21;

// Stream flags, relative to the stream's offset in xISR / xIFCR
const FLAG_FE: u32 = 1 << 0;
const FLAG_DME: u32 = 1 << 2;
const FLAG_TE: u32 = 1 << 3;
const FLAG_HT: u32 = 1 << 4;
const FLAG_TC: u32 = 1 << 5;
const FLAG_ALL: u32 = FLAG_FE | FLAG_DME | FLAG_TE | FLAG_HT | FLAG_TC;

const FLAG_OFFSETS: [u8; 4] = [0, 6, 16, 22];

/// DMA controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Controller {
    Dma1,
    Dma2,
}

impl Controller {
    pub fn clock(self) -> PeripheralClock {
        match self {
            Controller::Dma1 => PeripheralClock::DMA1,
            Controller::Dma2 => PeripheralClock::DMA2,
        }
    }
}

/// A stream of a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamId {
    pub controller: Controller,
    /// 0 ..= 7
    pub stream: u8,
}

impl StreamId {
    /// Bit offset of the stream's flags in its status register
    pub fn flag_offset(self) -> u8 {
        FLAG_OFFSETS[(self.stream % 4) as usize]
    }

    /// Streams 4 to 7 use HISR / HIFCR
    pub fn uses_high_registers(self) -> bool {
        self.stream >= 4
    }

    pub fn interrupt(self) -> Option<Interrupt> {
        use Interrupt::*;
        const DMA1_LINES: [Interrupt; 8] = [
            DMA1_STREAM0, DMA1_STREAM1, DMA1_STREAM2, DMA1_STREAM3,
            DMA1_STREAM4, DMA1_STREAM5, DMA1_STREAM6, DMA1_STREAM7,
        ];
        const DMA2_LINES: [Interrupt; 8] = [
            DMA2_STREAM0, DMA2_STREAM1, DMA2_STREAM2, DMA2_STREAM3,
            DMA2_STREAM4, DMA2_STREAM5, DMA2_STREAM6, DMA2_STREAM7,
        ];
        let lines = match self.controller {
            Controller::Dma1 => &DMA1_LINES,
            Controller::Dma2 => &DMA2_LINES,
        };
        lines.get(self.stream as usize).copied()
    }
}

/// Transfer direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    PeripheralToMemory = 0b00,
    MemoryToPeripheral = 0b01,
    /// DMA2 only
    MemoryToMemory = 0b10,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Priority {
    Low = 0b00,
    Medium = 0b01,
    High = 0b10,
    VeryHigh = 0b11,
}

/// Width of one data item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataSize {
    Byte = 0b00,
    HalfWord = 0b01,
    Word = 0b10,
}

/// FIFO fill level that triggers a memory burst
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FifoThreshold {
    QuarterFull = 0b00,
    HalfFull = 0b01,
    ThreeQuarterFull = 0b10,
    Full = 0b11,
}

/// Stream configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaConfig {
    /// Request channel, 0 ..= 7
    pub channel: u8,
    pub direction: Direction,
    pub priority: Priority,
    pub peripheral_size: DataSize,
    pub memory_size: DataSize,
    pub peripheral_increment: bool,
    pub memory_increment: bool,
    /// Restart from the initial addresses after the last item
    pub circular: bool,
    /// FIFO mode with the given threshold, direct mode when `None`
    pub fifo: Option<FifoThreshold>,
}

impl Default for DmaConfig {
    fn default() -> Self {
        DmaConfig {
            channel: 0,
            direction: Direction::PeripheralToMemory,
            priority: Priority::Low,
            peripheral_size: DataSize::Byte,
            memory_size: DataSize::Byte,
            peripheral_increment: false,
            memory_increment: true,
            circular: false,
            fifo: None,
        }
    }
}

impl DmaConfig {
    fn cr_bits(&self) -> u32 {
        let mut cr = ((self.channel as u32) << CR_CHSEL_SHIFT)
            | ((self.priority as u32) << CR_PL_SHIFT)
            | ((self.memory_size as u32) << CR_MSIZE_SHIFT)
            | ((self.peripheral_size as u32) << CR_PSIZE_SHIFT)
            | ((self.direction as u32) << CR_DIR_SHIFT);
        if self.memory_increment {
            cr |= CR_MINC;
        }
        if self.peripheral_increment {
            cr |= CR_PINC;
        }
        if self.circular {
            cr |= CR_CIRC;
        }
        cr
    }
}

/// Stream event flags
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Flags {
    pub transfer_complete: bool,
    pub half_transfer: bool,
    pub transfer_error: bool,
    pub direct_mode_error: bool,
    pub fifo_error: bool,
}

impl Flags {
    fn from_bits(bits: u32) -> Self {
        Flags {
            transfer_complete: bits & FLAG_TC != 0,
            half_transfer: bits & FLAG_HT != 0,
            transfer_error: bits & FLAG_TE != 0,
            direct_mode_error: bits & FLAG_DME != 0,
            fifo_error: bits & FLAG_FE != 0,
        }
    }

    fn bits(self) -> u32 {
        let mut bits = 0;
        if self.transfer_complete {
            bits |= FLAG_TC;
        }
        if self.half_transfer {
            bits |= FLAG_HT;
        }
        if self.transfer_error {
            bits |= FLAG_TE;
        }
        if self.direct_mode_error {
            bits |= FLAG_DME;
        }
        if self.fifo_error {
            bits |= FLAG_FE;
        }
        bits
    }

    /// Every flag set
    pub fn all() -> Self {
        Flags::from_bits(FLAG_ALL)
    }

    pub fn is_error(&self) -> bool {
        self.transfer_error || self.direct_mode_error || self.fifo_error
    }
}

/// Functions called from [`DmaStream::handle_irq`]
#[derive(Clone, Copy)]
pub struct Callbacks {
    pub on_complete: fn(StreamId),
    pub on_half: fn(StreamId),
    /// Transfer, direct mode or FIFO error
    pub on_error: fn(StreamId, Flags),
}

fn ignore(_: StreamId) {}

fn ignore_error(_: StreamId, _: Flags) {}

impl Default for Callbacks {
    fn default() -> Self {
        Callbacks {
            on_complete: ignore,
            on_half: ignore,
            on_error: ignore_error,
        }
    }
}

pub trait DmaExt {
    fn split(self) -> Dma<'static>;
}

impl DmaExt for DMA1 {
    fn split(self) -> Dma<'static> {
        let _ = self;
        let rb = unsafe { &*(DMA1::ptr() as *const dma::RegisterBlock) };
        Dma::from_registers(rb, Controller::Dma1)
    }
}

impl DmaExt for DMA2 {
    fn split(self) -> Dma<'static> {
        let _ = self;
        Dma::from_registers(unsafe { &*DMA2::ptr() }, Controller::Dma2)
    }
}

/// DMA controller, hands out its streams
pub struct Dma<'a> {
    rb: &'a dma::RegisterBlock,
    controller: Controller,
}

impl<'a> Dma<'a> {
    pub fn from_registers(rb: &'a dma::RegisterBlock, controller: Controller) -> Self {
        Dma { rb, controller }
    }

    /// Stream `stream` with configuration `config`
    ///
    /// Stream or channel above 7 are [`Error::Invalid`]. So is memory to
    /// memory on DMA1, in circular mode or in direct mode. Nothing is
    /// written until [`DmaStream::init`].
    pub fn stream(&self, stream: u8, config: DmaConfig) -> Result<DmaStream<'a>> {
        if stream > 7 || config.channel > 7 {
            return Err(Error::Invalid);
        }
        if config.direction == Direction::MemoryToMemory
            && (self.controller == Controller::Dma1 || config.circular || config.fifo.is_none())
        {
            warn!("memory to memory needs DMA2, the FIFO and a single pass");
            return Err(Error::Invalid);
        }
        Ok(DmaStream {
            rb: self.rb,
            id: StreamId {
                controller: self.controller,
                stream,
            },
            config,
            callbacks: Callbacks::default(),
            spin_budget: SpinBudget(config::DMA_DISABLE_SPINS),
        })
    }
}

/// One DMA stream
pub struct DmaStream<'a> {
    rb: &'a dma::RegisterBlock,
    id: StreamId,
    config: DmaConfig,
    callbacks: Callbacks,
    spin_budget: SpinBudget,
}

impl<'a> DmaStream<'a> {
    pub fn with_spin_budget(mut self, spins: u32) -> Self {
        self.spin_budget = SpinBudget(spins);
        self
    }

    pub fn with_callbacks(mut self, callbacks: Callbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn config(&self) -> &DmaConfig {
        &self.config
    }

    fn index(&self) -> usize {
        self.id.stream as usize
    }

    fn wait_disabled(&self) -> Result<()> {
        let cr = &self.rb.st[self.index()].cr;
        cr.modify(|_, w| w.en().clear_bit());
        self.spin_budget.wait_until(|| cr.read().en().bit_is_clear())
    }

    /// Enable the controller clock and load the stream configuration
    ///
    /// The stream is disabled first. Fails with [`Error::Timeout`] if
    /// it does not stop within the spin budget.
    pub fn init(&mut self, rcc: &Rcc) -> Result<()> {
        rcc.enable(self.id.controller.clock());
        self.wait_disabled()?;

        let st = &self.rb.st[self.index()];
        let mask = (0b111 << CR_CHSEL_SHIFT)
            | (0b1111 << 21) // MBURST, PBURST
            | (0b11 << CR_PL_SHIFT)
            | (0b11 << CR_MSIZE_SHIFT)
            | (0b11 << CR_PSIZE_SHIFT)
            | CR_MINC
            | CR_PINC
            | CR_CIRC
            | (0b11 << CR_DIR_SHIFT);
        let bits = self.config.cr_bits();
        st.cr.modify(|r, w| unsafe { w.bits((r.bits() & !mask) | bits) });

        match self.config.fifo {
            Some(threshold) => st.fcr.modify(|r, w| unsafe {
                w.bits((r.bits() & !0b11) | FCR_DMDIS | FCR_FEIE | threshold as u32)
            }),
            None => clear_bits!(st.fcr, FCR_DMDIS),
        }
        debug!(
            "{:?} stream {} channel {}",
            self.id.controller, self.id.stream, self.config.channel
        );
        Ok(())
    }

    /// Stop the stream and return its registers to their reset values
    pub fn deinit(&mut self) -> Result<()> {
        self.wait_disabled()?;
        let st = &self.rb.st[self.index()];
        write_bits!(st.cr, 0);
        write_bits!(st.ndtr, 0);
        write_bits!(st.par, 0);
        write_bits!(st.m0ar, 0);
        write_bits!(st.m1ar, 0);
        write_bits!(st.fcr, FCR_RESET);
        self.clear_flags(Flags::all());
        Ok(())
    }

    /// Start a transfer of `len` items from `src` to `dst`
    ///
    /// The peripheral address is `src` for peripheral to memory and
    /// memory to memory transfers, `dst` for memory to peripheral.
    /// Fails with [`Error::Busy`] while a transfer runs, and with
    /// [`Error::Invalid`] for an empty transfer. In both cases nothing is
    /// written.
    pub fn start(&mut self, src: u32, dst: u32, len: u16) -> Result<()> {
        let st = &self.rb.st[self.index()];
        if st.cr.read().en().bit_is_set() {
            warn!("{:?} stream {} busy", self.id.controller, self.id.stream);
            return Err(Error::Busy);
        }
        if len == 0 {
            return Err(Error::Invalid);
        }

        let (par, m0ar) = match self.config.direction {
            Direction::PeripheralToMemory | Direction::MemoryToMemory => (src, dst),
            Direction::MemoryToPeripheral => (dst, src),
        };
        write_bits!(st.par, par);
        write_bits!(st.m0ar, m0ar);
        write_bits!(st.ndtr, len as u32);
        self.clear_flags(Flags::all());
        st.cr.modify(|_, w| w.en().set_bit());
        Ok(())
    }

    /// As [`start`](Self::start), with the transfer complete, half
    /// transfer, transfer error and direct mode error interrupts enabled
    pub fn start_it(&mut self, src: u32, dst: u32, len: u16) -> Result<()> {
        let st = &self.rb.st[self.index()];
        if st.cr.read().en().bit_is_set() {
            warn!("{:?} stream {} busy", self.id.controller, self.id.stream);
            return Err(Error::Busy);
        }
        if len == 0 {
            return Err(Error::Invalid);
        }
        set_bits!(st.cr, CR_INTERRUPTS);
        self.start(src, dst, len)
    }

    /// Abort the transfer and wait for the stream to stop
    pub fn stop(&mut self) -> Result<()> {
        clear_bits!(self.rb.st[self.index()].cr, CR_INTERRUPTS);
        self.wait_disabled()
    }

    pub fn is_enabled(&self) -> bool {
        self.rb.st[self.index()].cr.read().en().bit_is_set()
    }

    /// Items left to transfer
    pub fn remaining(&self) -> u16 {
        self.rb.st[self.index()].ndtr.read().bits() as u16
    }

    pub fn flags(&self) -> Flags {
        let isr = if self.id.uses_high_registers() {
            self.rb.hisr.read().bits()
        } else {
            self.rb.lisr.read().bits()
        };
        Flags::from_bits(isr >> self.id.flag_offset())
    }

    /// Clear the given flags. xIFCR is write-one-to-clear.
    pub fn clear_flags(&mut self, flags: Flags) {
        let bits = flags.bits() << self.id.flag_offset();
        if self.id.uses_high_registers() {
            write_bits!(self.rb.hifcr, bits);
        } else {
            write_bits!(self.rb.lifcr, bits);
        }
    }

    /// Interrupt handler of the stream
    ///
    /// Clears each pending flag and calls the matching callback: transfer
    /// complete, half transfer, then one call for any error flags.
    /// Returns the flags that were handled.
    pub fn handle_irq(&mut self) -> Flags {
        let flags = self.flags();
        self.clear_flags(flags);

        if flags.transfer_complete {
            (self.callbacks.on_complete)(self.id);
        }
        if flags.half_transfer {
            (self.callbacks.on_half)(self.id);
        }
        if flags.is_error() {
            error!("{:?} stream {} error", self.id.controller, self.id.stream);
            (self.callbacks.on_error)(self.id, flags);
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};

    use crate::bits::tests::{peek, poke, zeroed};
    use crate::timer::tests::Clocks;

    const CR_EN: u32 = 1 << 0;

    fn m2m() -> DmaConfig {
        DmaConfig {
            direction: Direction::MemoryToMemory,
            priority: Priority::High,
            peripheral_size: DataSize::Word,
            memory_size: DataSize::Word,
            peripheral_increment: true,
            memory_increment: true,
            fifo: Some(FifoThreshold::Full),
            ..Default::default()
        }
    }

    #[test]
    /// Offsets 0, 6, 16, 22 in the low then high registers
    fn flag_offsets() {
        let offsets: [(u8, bool); 8] = [
            (0, false),
            (6, false),
            (16, false),
            (22, false),
            (0, true),
            (6, true),
            (16, true),
            (22, true),
        ];
        for (stream, &(offset, high)) in offsets.iter().enumerate() {
            let id = StreamId {
                controller: Controller::Dma1,
                stream: stream as u8,
            };
            assert_eq!(id.flag_offset(), offset);
            assert_eq!(id.uses_high_registers(), high);
        }
    }

    #[test]
    fn flags_read_from_the_stream_slot() {
        let rb: dma::RegisterBlock = zeroed();
        let dma = Dma::from_registers(&rb, Controller::Dma2);
        // Stream 5: HISR bits 6 ..= 11
        poke(&rb.hisr, (FLAG_TC | FLAG_TE) << 6);
        let mut s5 = dma.stream(5, DmaConfig::default()).unwrap();
        let flags = s5.flags();
        assert!(flags.transfer_complete);
        assert!(flags.transfer_error);
        assert!(!flags.half_transfer);
        let s1 = dma.stream(1, DmaConfig::default()).unwrap();
        assert_eq!(s1.flags(), Flags::default());

        s5.clear_flags(Flags::all());
        assert_eq!(peek(&rb.hifcr), 0b11_1101 << 6);
        assert_eq!(peek(&rb.lifcr), 0);
    }

    #[test]
    fn init_loads_configuration() {
        let clocks = Clocks::hsi();
        let rcc = clocks.rcc();
        let rb: dma::RegisterBlock = zeroed();
        let dma = Dma::from_registers(&rb, Controller::Dma2);
        let mut stream = dma
            .stream(
                0,
                DmaConfig {
                    channel: 3,
                    ..m2m()
                },
            )
            .unwrap();
        stream.init(&rcc).unwrap();

        assert!(rcc.is_enabled(PeripheralClock::DMA2));
        assert_eq!(
            rb.st[0].cr.read().bits(),
            3 << 25 | 0b10 << 16 | 0b10 << 13 | 0b10 << 11 | 1 << 10 | 1 << 9 | 0b10 << 6
        );
        assert_eq!(rb.st[0].fcr.read().bits(), FCR_DMDIS | FCR_FEIE | 0b11);
    }

    #[test]
    fn invalid_streams() {
        let rb: dma::RegisterBlock = zeroed();
        let dma1 = Dma::from_registers(&rb, Controller::Dma1);
        assert!(dma1.stream(8, DmaConfig::default()).is_err());
        let bad_channel = DmaConfig {
            channel: 8,
            ..Default::default()
        };
        assert!(dma1.stream(0, bad_channel).is_err());
        assert!(dma1.stream(0, m2m()).is_err());
    }

    #[test]
    /// Memory to memory needs the FIFO and a single pass
    fn memory_to_memory_constraints() {
        let rb: dma::RegisterBlock = zeroed();
        let dma2 = Dma::from_registers(&rb, Controller::Dma2);
        assert!(dma2.stream(0, m2m()).is_ok());

        let circular = DmaConfig {
            circular: true,
            ..m2m()
        };
        assert_eq!(dma2.stream(0, circular).err(), Some(Error::Invalid));
        let direct = DmaConfig {
            fifo: None,
            ..m2m()
        };
        assert_eq!(dma2.stream(0, direct).err(), Some(Error::Invalid));

        // Peripheral transfers may be circular without the FIFO
        let ring = DmaConfig {
            circular: true,
            ..Default::default()
        };
        assert!(dma2.stream(0, ring).is_ok());
        assert_eq!(rb.st[0].cr.read().bits(), 0);
    }

    #[test]
    /// The peripheral address follows the direction
    fn start_assigns_addresses() {
        let rb: dma::RegisterBlock = zeroed();
        let dma = Dma::from_registers(&rb, Controller::Dma2);

        let mut rx = dma.stream(2, DmaConfig::default()).unwrap();
        rx.start(0x4001_1004, 0x2000_0000, 16).unwrap();
        assert_eq!(rb.st[2].par.read().bits(), 0x4001_1004);
        assert_eq!(rb.st[2].m0ar.read().bits(), 0x2000_0000);
        assert_eq!(rb.st[2].ndtr.read().bits(), 16);
        assert_eq!(peek(&rb.lifcr), FLAG_ALL << 16);
        assert!(rx.is_enabled());

        let tx_cfg = DmaConfig {
            direction: Direction::MemoryToPeripheral,
            ..Default::default()
        };
        let mut tx = dma.stream(7, tx_cfg).unwrap();
        tx.start(0x2000_0100, 0x4001_1004, 4).unwrap();
        assert_eq!(rb.st[7].par.read().bits(), 0x4001_1004);
        assert_eq!(rb.st[7].m0ar.read().bits(), 0x2000_0100);

        let mut copy = dma.stream(1, m2m()).unwrap();
        copy.start(0x2000_0000, 0x2000_1000, 8).unwrap();
        assert_eq!(rb.st[1].par.read().bits(), 0x2000_0000);
        assert_eq!(rb.st[1].m0ar.read().bits(), 0x2000_1000);
    }

    #[test]
    fn busy_stream_is_left_alone() {
        let rb: dma::RegisterBlock = zeroed();
        let dma = Dma::from_registers(&rb, Controller::Dma1);
        let mut stream = dma.stream(3, DmaConfig::default()).unwrap();
        write_bits!(rb.st[3].cr, CR_EN);
        write_bits!(rb.st[3].par, 0x1111);

        assert_eq!(stream.start(0x2222, 0x3333, 4), Err(Error::Busy));
        assert_eq!(stream.start_it(0x2222, 0x3333, 4), Err(Error::Busy));
        assert_eq!(rb.st[3].par.read().bits(), 0x1111);
        assert_eq!(rb.st[3].m0ar.read().bits(), 0);
        assert_eq!(rb.st[3].ndtr.read().bits(), 0);
        assert_eq!(rb.st[3].cr.read().bits(), CR_EN);

        stream.stop().unwrap();
        assert_eq!(stream.start(0x2222, 0x3333, 0), Err(Error::Invalid));
        assert_eq!(rb.st[3].ndtr.read().bits(), 0);
    }

    #[test]
    fn start_it_arms_interrupts() {
        let rb: dma::RegisterBlock = zeroed();
        let dma = Dma::from_registers(&rb, Controller::Dma1);
        let mut stream = dma.stream(4, DmaConfig::default()).unwrap();
        stream.start_it(0x4000_4404, 0x2000_0000, 32).unwrap();
        let armed = CR_TCIE | CR_HTIE | CR_TEIE | CR_DMEIE | CR_EN;
        assert_eq!(rb.st[4].cr.read().bits() & armed, armed);
        assert_eq!(peek(&rb.hifcr), FLAG_ALL);
    }

    static COMPLETE: AtomicU32 = AtomicU32::new(0);
    static HALF: AtomicU32 = AtomicU32::new(0);
    static ERRORS: AtomicU32 = AtomicU32::new(0);

    fn on_complete(id: StreamId) {
        assert_eq!(id.stream, 6);
        COMPLETE.fetch_add(1, Ordering::Relaxed);
    }

    fn on_half(_: StreamId) {
        HALF.fetch_add(1, Ordering::Relaxed);
    }

    fn on_error(_: StreamId, flags: Flags) {
        assert!(flags.fifo_error);
        ERRORS.fetch_add(1, Ordering::Relaxed);
    }

    #[test]
    fn handle_irq_dispatches_callbacks() {
        let rb: dma::RegisterBlock = zeroed();
        let dma = Dma::from_registers(&rb, Controller::Dma2);
        let mut stream = dma
            .stream(6, DmaConfig::default())
            .unwrap()
            .with_callbacks(Callbacks {
                on_complete,
                on_half,
                on_error,
            });

        // Stream 6: HISR bits 16 ..= 21
        poke(&rb.hisr, (FLAG_TC | FLAG_FE) << 16);
        let flags = stream.handle_irq();
        assert!(flags.transfer_complete && flags.fifo_error);
        assert_eq!(peek(&rb.hifcr), (FLAG_TC | FLAG_FE) << 16);
        assert_eq!(COMPLETE.load(Ordering::Relaxed), 1);
        assert_eq!(HALF.load(Ordering::Relaxed), 0);
        assert_eq!(ERRORS.load(Ordering::Relaxed), 1);
    }
}
