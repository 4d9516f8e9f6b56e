//! Driver status codes

/// Errors returned by the configuration and control functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// An argument is out of range or the operation is not allowed in
    /// the current state
    Invalid,
    /// The request would stop the clock currently driving SYSCLK
    ClockInUse,
    /// A hardware ready flag did not change within its spin budget
    Timeout,
    /// The resource is already engaged
    Busy,
}

pub type Result<T> = core::result::Result<T, Error>;
