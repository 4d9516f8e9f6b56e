//! Peripheral drivers for the STM32F446
//!
//! Register-level drivers for the clock tree and the peripherals of an
//! STM32F446 board:
//!
//! * [Reset & Clock Control](crate::rcc)
//! * [General Purpose Input / Output](crate::gpio)
//! * [External interrupts](crate::exti) and [NVIC helpers](crate::nvic)
//! * [Timers](crate::timer), with [PWM](crate::pwm),
//!   [input capture](crate::capture) and [delays](crate::delay)
//! * [Independent watchdog](crate::independent_watchdog)
//! * [DMA streams](crate::dma)
//! * [Real time clock](crate::rtc)
//! * [Fault exceptions](crate::fault)
//! * [Analog to digital converters](crate::adc)
//! * [I2C master](crate::i2c)
//! * [USART](crate::serial)
//!
//! Drivers borrow the register blocks of the `stm32f4` peripheral access
//! crate, re-exported as [`pac`], and read bus
//! frequencies from the live clock tree through [`rcc::Rcc`], so a timer
//! or baud rate set up after a clock change uses the new frequency.
//!
//! Every hardware wait is bounded, see [`config`].
//!
//! ## Logging
//!
//! With the `defmt` or `log` feature the drivers report configuration
//! changes and failures through that crate.

#![cfg_attr(not(test), no_std)]
#![allow(non_camel_case_types)]

#[macro_use]
mod fmt;
#[macro_use]
mod bits;

pub use embedded_hal as hal;

pub use nb;
pub use nb::block;

pub use stm32f4::stm32f446 as stm32;

pub use crate::stm32 as pac;
pub use crate::stm32 as device;

// Enable use of interrupt macro
#[cfg(feature = "rt")]
pub use crate::stm32::interrupt;

pub mod config;
pub mod error;
pub use crate::error::{Error, Result};

pub mod adc;
pub mod capture;
pub mod delay;
pub mod dma;
pub mod exti;
pub mod fault;
pub mod gpio;
pub mod i2c;
pub mod independent_watchdog;
pub mod nvic;
pub mod prelude;
pub mod pwm;
pub mod rcc;
pub mod rtc;
pub mod serial;
pub mod time;
pub mod timer;
