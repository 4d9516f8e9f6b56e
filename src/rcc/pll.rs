//! Main Phase Locked Loop Configuration
//!
//! The main PLL divides its input by M, multiplies by N in the VCO and
//! produces three outputs: P (system clock), Q (48 MHz domain) and R
//! (alternative system clock).
//!
//! ```text
//! vco_in  = input / M          0.95 ..= 2.1 MHz
//! vco_out = vco_in * N         100 ..= 432 MHz
//! pll_p   = vco_out / P        <= 180 MHz
//! ```

use crate::error::{Error, Result};
use crate::time::Hertz;

const VCO_IN_MIN: u32 = 950_000;
const VCO_IN_MAX: u32 = 2_100_000;
const VCO_OUT_MIN: u32 = 100_000_000;
const VCO_OUT_MAX: u32 = 432_000_000;
/// Maximum system clock with over-drive enabled
pub const SYSCLK_MAX: u32 = 180_000_000;

// PLLCFGR fields
const PLLM_SHIFT: u8 = 0;
const PLLN_SHIFT: u8 = 6;
const PLLP_SHIFT: u8 = 16;
const PLLSRC_BIT: u32 = 1 << 22;
const PLLQ_SHIFT: u8 = 24;
const PLLR_SHIFT: u8 = 28;
pub(super) const PLLCFGR_MASK: u32 =
    0x3F | (0x1FF << 6) | (0b11 << 16) | PLLSRC_BIT | (0xF << 24) | (0b111 << 28);

/// PLL input clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PllSource {
    Hsi,
    Hse,
}

/// Configuration of the main PLL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PllConfig {
    pub source: PllSource,
    /// Input divider, 2 ..= 63
    pub m: u8,
    /// VCO multiplier, 50 ..= 432
    pub n: u16,
    /// System clock divider, one of 2, 4, 6, 8
    pub p: u8,
    /// 48 MHz domain divider, 2 ..= 15
    pub q: u8,
    /// Alternative system clock divider, 2 ..= 7
    pub r: u8,
}

/// `((input / m) * n) / div` in integer arithmetic
///
/// Also used for the R output with `div = r`.
pub fn pll_output(input: u32, m: u32, n: u32, div: u32) -> u32 {
    if m == 0 || div == 0 {
        return 0;
    }
    let vco = (input / m) as u64 * n as u64;
    (vco / div as u64).min(u32::MAX as u64) as u32
}

impl PllConfig {
    /// 8 MHz HSE to 180 MHz
    pub const HSE_8MHZ_TO_180MHZ: PllConfig = PllConfig {
        source: PllSource::Hse,
        m: 8,
        n: 360,
        p: 2,
        q: 7,
        r: 2,
    };

    /// P output for the given input frequency
    pub fn output(&self, input: Hertz) -> Hertz {
        Hertz(pll_output(input.0, self.m as u32, self.n as u32, self.p as u32))
    }

    /// R output for the given input frequency
    pub fn output_r(&self, input: Hertz) -> Hertz {
        Hertz(pll_output(input.0, self.m as u32, self.n as u32, self.r as u32))
    }

    /// Check the dividers and the resulting VCO and output frequencies
    pub fn validate(&self, input: Hertz) -> Result<()> {
        if !(2..=63).contains(&self.m)
            || !(50..=432).contains(&self.n)
            || !matches!(self.p, 2 | 4 | 6 | 8)
            || !(2..=15).contains(&self.q)
            || !(2..=7).contains(&self.r)
        {
            return Err(Error::Invalid);
        }

        let vco_in = input.0 / self.m as u32;
        if !(VCO_IN_MIN..=VCO_IN_MAX).contains(&vco_in) {
            return Err(Error::Invalid);
        }
        let vco_out = vco_in as u64 * self.n as u64;
        if vco_out < VCO_OUT_MIN as u64 || vco_out > VCO_OUT_MAX as u64 {
            return Err(Error::Invalid);
        }
        if self.output(input).0 > SYSCLK_MAX {
            return Err(Error::Invalid);
        }
        Ok(())
    }

    /// PLLCFGR field bits. Only meaningful after `validate`
    pub(super) fn pllcfgr_bits(&self) -> u32 {
        let src = match self.source {
            PllSource::Hsi => 0,
            PllSource::Hse => PLLSRC_BIT,
        };
        ((self.m as u32) << PLLM_SHIFT)
            | ((self.n as u32) << PLLN_SHIFT)
            | (((self.p as u32 / 2) - 1) << PLLP_SHIFT)
            | src
            | ((self.q as u32) << PLLQ_SHIFT)
            | ((self.r as u32) << PLLR_SHIFT)
    }

    /// Decode the live PLLCFGR value
    pub(super) fn from_pllcfgr(bits: u32) -> PllConfig {
        PllConfig {
            source: if bits & PLLSRC_BIT != 0 {
                PllSource::Hse
            } else {
                PllSource::Hsi
            },
            m: ((bits >> PLLM_SHIFT) & 0x3F) as u8,
            n: ((bits >> PLLN_SHIFT) & 0x1FF) as u16,
            p: ((((bits >> PLLP_SHIFT) & 0b11) + 1) * 2) as u8,
            q: ((bits >> PLLQ_SHIFT) & 0xF) as u8,
            r: ((bits >> PLLR_SHIFT) & 0b111) as u8,
        }
    }
}
