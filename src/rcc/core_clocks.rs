//! Snapshot of the clock tree

use super::{Bus, SysClkSource};
use crate::time::Hertz;

/// Frequencies decoded from the RCC registers at one point in time
///
/// Goes stale as soon as the clock tree is reconfigured. Drivers ask
/// [`Rcc`](super::Rcc) for live values instead of keeping one of these.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CoreClocks {
    pub(super) source: SysClkSource,
    pub(super) sysclk: Hertz,
    pub(super) hclk: Hertz,
    /// (APB1, APB2)
    pub(super) pclk: (Hertz, Hertz),
    pub(super) apb_divider: (u32, u32),
    pub(super) timer: (Hertz, Hertz),
    pub(super) pll: Option<Hertz>,
}

impl CoreClocks {
    pub fn sysclk_source(&self) -> SysClkSource {
        self.source
    }

    pub fn sysclk(&self) -> Hertz {
        self.sysclk
    }

    pub fn hclk(&self) -> Hertz {
        self.hclk
    }

    pub fn pclk1(&self) -> Hertz {
        self.pclk.0
    }

    pub fn pclk2(&self) -> Hertz {
        self.pclk.1
    }

    /// Clock of `bus`, HCLK for AHB1
    pub fn bus_clock(&self, bus: Bus) -> Hertz {
        match bus {
            Bus::AHB1 => self.hclk,
            Bus::APB1 => self.pclk.0,
            Bus::APB2 => self.pclk.1,
        }
    }

    /// Division from HCLK to `bus`
    pub fn bus_divider(&self, bus: Bus) -> u32 {
        match bus {
            Bus::AHB1 => 1,
            Bus::APB1 => self.apb_divider.0,
            Bus::APB2 => self.apb_divider.1,
        }
    }

    /// Input clock of the timers on `bus`, twice the bus clock when the
    /// bus is divided
    pub fn timer_clock(&self, bus: Bus) -> Hertz {
        match bus {
            Bus::AHB1 => self.hclk,
            Bus::APB1 => self.timer.0,
            Bus::APB2 => self.timer.1,
        }
    }

    /// Main PLL P output, `None` while the PLL is unlocked
    pub fn pll(&self) -> Option<Hertz> {
        self.pll
    }
}
