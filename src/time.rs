//! Units for frequencies, rates and durations
//!
//! Thin `u32` newtypes so that a baud rate cannot be passed where a bus
//! frequency is expected. Build them with [`U32Ext`]:
//!
//! ```ignore
//! use stm32f446_drivers::time::{Hertz, U32Ext};
//!
//! assert_eq!(16.mhz(), Hertz(16_000_000));
//! ```

use core::fmt;

macro_rules! unit {
    ($(#[$meta:meta])* $name:ident, $suffix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, concat!("{}", $suffix), self.0)
            }
        }
    };
}

unit!(
    /// Line rate of a serial port
    Bps, " bps"
);
unit!(
    /// Clock frequency
    Hertz, " Hz"
);
unit!(MilliSeconds, " ms");
unit!(MicroSeconds, " us");

impl Hertz {
    /// Whole megahertz, rounded down
    pub const fn to_mhz(self) -> u32 {
        self.0 / 1_000_000
    }
}

impl From<MilliSeconds> for MicroSeconds {
    fn from(ms: MilliSeconds) -> Self {
        MicroSeconds(ms.0.saturating_mul(1_000))
    }
}

/// Unit constructors on plain integers
pub trait U32Ext {
    fn bps(self) -> Bps;
    fn hz(self) -> Hertz;
    /// Kilohertz, scaled into [`Hertz`]
    fn khz(self) -> Hertz;
    /// Megahertz, scaled into [`Hertz`]
    fn mhz(self) -> Hertz;
    fn ms(self) -> MilliSeconds;
    fn us(self) -> MicroSeconds;
}

impl U32Ext for u32 {
    fn bps(self) -> Bps {
        Bps(self)
    }

    fn hz(self) -> Hertz {
        Hertz(self)
    }

    fn khz(self) -> Hertz {
        Hertz(self * 1_000)
    }

    fn mhz(self) -> Hertz {
        Hertz(self * 1_000_000)
    }

    fn ms(self) -> MilliSeconds {
        MilliSeconds(self)
    }

    fn us(self) -> MicroSeconds {
        MicroSeconds(self)
    }
}
