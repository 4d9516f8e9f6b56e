//! Fault exceptions
//!
//! Out of reset every fault escalates to HardFault. [`enable_fault_exceptions`]
//! gives bus, usage and memory management faults their own exceptions,
//! and [`enable_traps`] makes divides by zero and unaligned accesses
//! fault instead of completing silently.
//!
//! ```ignore
//! let mut cp = cortex_m::Peripherals::take().unwrap();
//! fault::enable_fault_exceptions(&mut cp.SCB);
//! fault::enable_traps(&mut cp.SCB, Traps::all());
//! fault::set_hook(|kind, frame, status| { /* persist for the next boot */ });
//! ```
//!
//! With the `fault-handlers` feature the crate defines the HardFault,
//! BusFault, UsageFault and MemoryManagement handlers. Each logs the
//! fault status and stacked registers, passes them to the hook installed
//! by [`set_hook`], and halts. Only the HardFault handler receives the
//! stacked frame.

use core::sync::atomic::{AtomicPtr, Ordering};

use cortex_m::peripheral::scb::Exception;
use cortex_m::peripheral::SCB;

// CCR
const CCR_UNALIGN_TRP: u32 = 1 << 3;
const CCR_DIV_0_TRP: u32 = 1 << 4;

// HFSR
const HFSR_VECTTBL: u32 = 1 << 1;
const HFSR_FORCED: u32 = 1 << 30;

// CFSR, MMFSR byte
const CFSR_IACCVIOL: u32 = 1 << 0;
const CFSR_DACCVIOL: u32 = 1 << 1;
const CFSR_MUNSTKERR: u32 = 1 << 3;
const CFSR_MSTKERR: u32 = 1 << 4;
const CFSR_MLSPERR: u32 = 1 << 5;
const CFSR_MMARVALID: u32 = 1 << 7;
// BFSR byte
const CFSR_IBUSERR: u32 = 1 << 8;
const CFSR_PRECISERR: u32 = 1 << 9;
const CFSR_IMPRECISERR: u32 = 1 << 10;
const CFSR_UNSTKERR: u32 = 1 << 11;
const CFSR_STKERR: u32 = 1 << 12;
const CFSR_LSPERR: u32 = 1 << 13;
const CFSR_BFARVALID: u32 = 1 << 15;
// UFSR half word
const CFSR_UNDEFINSTR: u32 = 1 << 16;
const CFSR_INVSTATE: u32 = 1 << 17;
const CFSR_INVPC: u32 = 1 << 18;
const CFSR_NOCP: u32 = 1 << 19;
const CFSR_UNALIGNED: u32 = 1 << 24;
const CFSR_DIVBYZERO: u32 = 1 << 25;

/// Route bus, usage and memory management faults to their own handlers
pub fn enable_fault_exceptions(scb: &mut SCB) {
    scb.enable(Exception::UsageFault);
    scb.enable(Exception::BusFault);
    scb.enable(Exception::MemoryManagement);
}

/// Conditions that fault only when trapped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Traps {
    /// SDIV and UDIV by zero
    pub divide_by_zero: bool,
    /// Unaligned LDR, STR and their half word forms
    pub unaligned: bool,
}

impl Traps {
    pub fn all() -> Self {
        Traps {
            divide_by_zero: true,
            unaligned: true,
        }
    }

    /// CCR bits
    pub fn ccr_bits(self) -> u32 {
        let mut bits = 0;
        if self.divide_by_zero {
            bits |= CCR_DIV_0_TRP;
        }
        if self.unaligned {
            bits |= CCR_UNALIGN_TRP;
        }
        bits
    }
}

/// Set the trap bits of `traps` in CCR. Traps already enabled stay on.
pub fn enable_traps(scb: &mut SCB, traps: Traps) {
    let bits = traps.ccr_bits();
    unsafe { scb.ccr.modify(|r| r | bits) }
}

/// Exception that took the fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultKind {
    HardFault,
    MemoryManagement,
    BusFault,
    UsageFault,
}

/// Registers pushed on exception entry
///
/// Laid out like `cortex_m_rt::ExceptionFrame`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StackedFrame {
    pub r0: u32,
    pub r1: u32,
    pub r2: u32,
    pub r3: u32,
    pub r12: u32,
    pub lr: u32,
    pub pc: u32,
    pub xpsr: u32,
}

#[cfg(feature = "rt")]
impl From<&cortex_m_rt::ExceptionFrame> for StackedFrame {
    fn from(ef: &cortex_m_rt::ExceptionFrame) -> Self {
        StackedFrame {
            r0: ef.r0(),
            r1: ef.r1(),
            r2: ef.r2(),
            r3: ef.r3(),
            r12: ef.r12(),
            lr: ef.lr(),
            pc: ef.pc(),
            xpsr: ef.xpsr(),
        }
    }
}

/// What the fault status registers name as the cause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Cause {
    DivideByZero,
    Unaligned,
    NoCoprocessor,
    InvalidPc,
    InvalidState,
    UndefinedInstruction,
    /// Bus error on a data access, at the address in BFAR if valid
    PreciseBus,
    /// Bus error on a buffered write, the stacked PC is not the culprit
    ImpreciseBus,
    InstructionBus,
    /// Exception entry stacking failed
    Stacking,
    /// Exception return unstacking failed
    Unstacking,
    /// Lazy floating point state preservation failed
    FpLazyState,
    /// MPU violation on a data access, at the address in MMFAR if valid
    DataAccess,
    /// Execute from a non executable region
    InstructionAccess,
    /// Vector table read during exception processing
    VectorTable,
    /// A configurable fault escalated to HardFault
    Escalated,
}

// Most specific first
const CFSR_CAUSES: [(u32, Cause); 14] = [
    (CFSR_DIVBYZERO, Cause::DivideByZero),
    (CFSR_UNALIGNED, Cause::Unaligned),
    (CFSR_NOCP, Cause::NoCoprocessor),
    (CFSR_INVPC, Cause::InvalidPc),
    (CFSR_INVSTATE, Cause::InvalidState),
    (CFSR_UNDEFINSTR, Cause::UndefinedInstruction),
    (CFSR_PRECISERR, Cause::PreciseBus),
    (CFSR_IMPRECISERR, Cause::ImpreciseBus),
    (CFSR_IBUSERR, Cause::InstructionBus),
    (CFSR_STKERR | CFSR_MSTKERR, Cause::Stacking),
    (CFSR_UNSTKERR | CFSR_MUNSTKERR, Cause::Unstacking),
    (CFSR_LSPERR | CFSR_MLSPERR, Cause::FpLazyState),
    (CFSR_DACCVIOL, Cause::DataAccess),
    (CFSR_IACCVIOL, Cause::InstructionAccess),
];

/// Snapshot of the fault status registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaultStatus {
    pub cfsr: u32,
    pub hfsr: u32,
    /// Faulting data address of a memory management fault
    pub mmfar: Option<u32>,
    /// Faulting data address of a precise bus fault
    pub bfar: Option<u32>,
}

impl FaultStatus {
    /// Combine raw register values. The address registers are kept only
    /// when CFSR marks them valid.
    pub fn new(cfsr: u32, hfsr: u32, mmfar: u32, bfar: u32) -> Self {
        FaultStatus {
            cfsr,
            hfsr,
            mmfar: (cfsr & CFSR_MMARVALID != 0).then_some(mmfar),
            bfar: (cfsr & CFSR_BFARVALID != 0).then_some(bfar),
        }
    }

    /// Sample CFSR, HFSR, MMFAR and BFAR
    pub fn read() -> Self {
        let scb = unsafe { &*SCB::PTR };
        FaultStatus::new(
            scb.cfsr.read(),
            scb.hfsr.read(),
            scb.mmfar.read(),
            scb.bfar.read(),
        )
    }

    /// A configurable fault escalated to HardFault
    pub fn forced(&self) -> bool {
        self.hfsr & HFSR_FORCED != 0
    }

    pub fn cause(&self) -> Option<Cause> {
        if self.hfsr & HFSR_VECTTBL != 0 {
            return Some(Cause::VectorTable);
        }
        CFSR_CAUSES
            .iter()
            .find(|&&(mask, _)| self.cfsr & mask != 0)
            .map(|&(_, cause)| cause)
            .or_else(|| self.forced().then_some(Cause::Escalated))
    }
}

/// Called from the fault handlers before they halt
///
/// `frame` is `None` for the configurable faults, whose handlers do not
/// receive the stacked registers.
pub type FaultHook = fn(FaultKind, Option<&StackedFrame>, &FaultStatus);

static HOOK: AtomicPtr<()> = AtomicPtr::new(core::ptr::null_mut());

/// Install `hook`, replacing any earlier one
pub fn set_hook(hook: FaultHook) {
    HOOK.store(hook as *mut (), Ordering::Release);
}

pub fn clear_hook() {
    HOOK.store(core::ptr::null_mut(), Ordering::Release);
}

fn hook() -> Option<FaultHook> {
    let ptr = HOOK.load(Ordering::Acquire);
    if ptr.is_null() {
        None
    } else {
        // Only ever stored from a `FaultHook`
        Some(unsafe { core::mem::transmute::<*mut (), FaultHook>(ptr) })
    }
}

/// Log a fault and pass it to the installed hook
pub fn report(kind: FaultKind, frame: Option<&StackedFrame>, status: &FaultStatus) {
    error!(
        "{:?}: cause {:?} CFSR {:#x} HFSR {:#x}",
        kind,
        status.cause(),
        status.cfsr,
        status.hfsr
    );
    if let Some(address) = status.mmfar.or(status.bfar) {
        error!("faulting address {:#x}", address);
    }
    if let Some(frame) = frame {
        error!(
            "PC {:#x} LR {:#x} xPSR {:#x} R0 {:#x} R1 {:#x} R2 {:#x} R3 {:#x} R12 {:#x}",
            frame.pc,
            frame.lr,
            frame.xpsr,
            frame.r0,
            frame.r1,
            frame.r2,
            frame.r3,
            frame.r12
        );
    }
    if let Some(hook) = hook() {
        hook(kind, frame, status);
    }
}

#[cfg(feature = "fault-handlers")]
mod handlers {
    use cortex_m_rt::{exception, ExceptionFrame};

    use super::{report, FaultKind, FaultStatus, StackedFrame};

    fn halt(kind: FaultKind, frame: Option<&StackedFrame>) -> ! {
        report(kind, frame, &FaultStatus::read());
        loop {
            core::hint::spin_loop();
        }
    }

    #[exception]
    unsafe fn HardFault(ef: &ExceptionFrame) -> ! {
        halt(FaultKind::HardFault, Some(&StackedFrame::from(ef)))
    }

    #[exception]
    fn MemoryManagement() -> ! {
        halt(FaultKind::MemoryManagement, None)
    }

    #[exception]
    fn BusFault() -> ! {
        halt(FaultKind::BusFault, None)
    }

    #[exception]
    fn UsageFault() -> ! {
        halt(FaultKind::UsageFault, None)
    }
}
