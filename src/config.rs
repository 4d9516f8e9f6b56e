//! Board constants and spin budgets
//!
//! Every hardware readiness wait in this crate polls a flag a bounded
//! number of times and then gives up with [`Error::Timeout`]. The default
//! bounds live here so they can be tuned for the core clock in one place;
//! drivers also accept a per-instance override through
//! `with_spin_budget`.

use crate::error::{Error, Result};
use crate::time::Hertz;

/// High speed internal RC oscillator
pub const HSI: Hertz = Hertz(16_000_000);
/// High speed external oscillator fitted to the board
pub const HSE: Hertz = Hertz(8_000_000);
/// Low speed internal RC oscillator
pub const LSI: Hertz = Hertz(32_000);
/// Low speed external crystal
pub const LSE: Hertz = Hertz(32_768);

/// Number of priority bits implemented in the NVIC
pub const NVIC_PRIO_BITS: u8 = 4;

/// HSE start up
pub const HSE_STARTUP_SPINS: u32 = 0x0005_0000;
/// HSI start and stop
pub const HSI_SPINS: u32 = 0x0001_0000;
/// LSE start up (slow crystal)
pub const LSE_STARTUP_SPINS: u32 = 0x0050_0000;
/// LSI start and stop
pub const LSI_SPINS: u32 = 0x0001_0000;
/// PLL lock and unlock
pub const PLL_LOCK_SPINS: u32 = 0x0002_0000;
/// SYSCLK multiplexer switch
pub const CLOCK_SWITCH_SPINS: u32 = 0x0005_0000;
/// Over-drive enable and switch
pub const OVER_DRIVE_SPINS: u32 = 0x0002_0000;
/// IWDG prescaler and reload update
pub const IWDG_UPDATE_SPINS: u32 = 0x0001_0000;
/// DMA stream disable
pub const DMA_DISABLE_SPINS: u32 = 0x0001_0000;
/// RTC initialisation mode entry
pub const RTC_INIT_SPINS: u32 = 0x0001_0000;
/// I2C flag changes
pub const I2C_FLAG_SPINS: u32 = 0x0001_0000;
/// ADC end of conversion
pub const ADC_CONVERSION_SPINS: u32 = 0x0001_0000;
/// ADC power up stabilisation (tSTAB, a few microseconds)
pub const ADC_STABILIZATION_SPINS: u32 = 0x0000_0800;
/// USART flag changes
pub const USART_FLAG_SPINS: u32 = 0x0001_0000;

/// Bounded busy-wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpinBudget(pub u32);

impl SpinBudget {
    /// Poll `ready` until it returns true, at most `self.0` times
    ///
    /// A zero budget still polls once.
    pub fn wait_until<F>(self, mut ready: F) -> Result<()>
    where
        F: FnMut() -> bool,
    {
        let mut spins = self.0;
        loop {
            if ready() {
                return Ok(());
            }
            if spins == 0 {
                return Err(Error::Timeout);
            }
            spins -= 1;
            core::hint::spin_loop();
        }
    }
}
