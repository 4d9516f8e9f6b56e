//! Prelude
pub use embedded_hal::prelude::*;

pub use crate::adc::AdcExt as _stm32f446_drivers_adc_AdcExt;
pub use crate::dma::DmaExt as _stm32f446_drivers_dma_DmaExt;
pub use crate::exti::ExtiExt as _stm32f446_drivers_exti_ExtiExt;
pub use crate::gpio::GpioExt as _stm32f446_drivers_gpio_GpioExt;
pub use crate::i2c::I2cExt as _stm32f446_drivers_i2c_I2cExt;
pub use crate::rcc::RccExt as _stm32f446_drivers_rcc_RccExt;
pub use crate::serial::SerialExt as _stm32f446_drivers_serial_SerialExt;
pub use crate::time::U32Ext as _stm32f446_drivers_time_U32Ext;
pub use crate::timer::TimerExt as _stm32f446_drivers_timer_TimerExt;
