//! Interrupt controller helpers
//!
//! Thin wrappers over `cortex_m::peripheral::NVIC` for the device
//! [`Interrupt`] lines. Priorities use the 4 implemented bits, 0 being
//! the most urgent.

use cortex_m::interrupt::InterruptNumber;
use cortex_m::peripheral::NVIC;

use crate::config::NVIC_PRIO_BITS;
use crate::error::{Error, Result};
use crate::pac::Interrupt;

/// Priority register value for `level`
pub fn priority_bits(level: u8) -> Result<u8> {
    if level >= 1 << NVIC_PRIO_BITS {
        return Err(Error::Invalid);
    }
    Ok(level << (8 - NVIC_PRIO_BITS))
}

/// Unmask an interrupt line
pub fn enable(irq: Interrupt) {
    unsafe { NVIC::unmask(irq) }
}

/// Mask an interrupt line
pub fn disable(irq: Interrupt) {
    NVIC::mask(irq)
}

pub fn is_enabled(irq: Interrupt) -> bool {
    NVIC::is_enabled(irq)
}

pub fn pend(irq: Interrupt) {
    NVIC::pend(irq)
}

pub fn unpend(irq: Interrupt) {
    NVIC::unpend(irq)
}

/// Set the priority of an interrupt line, 0 ..= 15
pub fn set_priority(irq: Interrupt, level: u8) -> Result<()> {
    let bits = priority_bits(level)?;
    // Writes a single byte of the IPR array
    unsafe { (*NVIC::PTR).ipr[irq.number() as usize].write(bits) };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_packing() {
        assert_eq!(priority_bits(0), Ok(0x00));
        assert_eq!(priority_bits(2), Ok(0x20));
        assert_eq!(priority_bits(15), Ok(0xF0));
        assert_eq!(priority_bits(16), Err(Error::Invalid));
    }
}
