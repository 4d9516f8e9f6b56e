//! Peripheral Reset and Enable Control (REC)
//!
//! Every peripheral driven by this crate has a bus clock gate and a reset
//! line in the RCC. [`PeripheralClock`] names them, and the methods on
//! [`Rcc`](super::Rcc) switch them.
//!
//! ```ignore
//! rcc.enable(PeripheralClock::TIM2);
//! rcc.reset(PeripheralClock::TIM2);
//! ```

use super::Rcc;

/// Bus a peripheral is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bus {
    AHB1,
    APB1,
    APB2,
}

macro_rules! peripheral_reset_and_enable_control {
    ($($AXBn:ident => [$($p:ident: $bit:expr),+ $(,)?];)+) => {
        /// Peripherals whose bus clock and reset are controlled by the RCC
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        #[allow(non_camel_case_types)]
        pub enum PeripheralClock {
            $($($p,)+)+
        }

        impl PeripheralClock {
            /// Bus the peripheral is attached to
            pub const fn bus(self) -> Bus {
                match self {
                    $($(PeripheralClock::$p => Bus::$AXBn,)+)+
                }
            }

            /// Enable bit in the bus enable register
            pub(crate) const fn enable_mask(self) -> u32 {
                match self {
                    $($(PeripheralClock::$p => 1 << $bit,)+)+
                }
            }
        }
    };
}

peripheral_reset_and_enable_control! {
    AHB1 => [
        GPIOA: 0, GPIOB: 1, GPIOC: 2, GPIOD: 3,
        GPIOE: 4, GPIOF: 5, GPIOG: 6, GPIOH: 7,
        DMA1: 21, DMA2: 22,
    ];
    APB1 => [
        TIM2: 0, TIM3: 1, TIM4: 2, TIM5: 3, TIM6: 4, TIM7: 5,
        TIM12: 6, TIM13: 7, TIM14: 8,
        USART2: 17, USART3: 18, UART4: 19, UART5: 20,
        I2C1: 21, I2C2: 22, I2C3: 23,
        PWR: 28,
    ];
    APB2 => [
        TIM1: 0, TIM8: 1, USART1: 4, USART6: 5,
        ADC1: 8, ADC2: 9, ADC3: 10,
        SYSCFG: 14,
        TIM9: 16, TIM10: 17, TIM11: 18,
    ];
}

impl PeripheralClock {
    /// Reset bit in the bus reset register. The three ADCs share one.
    pub(crate) const fn reset_mask(self) -> u32 {
        match self {
            PeripheralClock::ADC2 | PeripheralClock::ADC3 => {
                PeripheralClock::ADC1.enable_mask()
            }
            _ => self.enable_mask(),
        }
    }
}

impl<'a> Rcc<'a> {
    /// Enable the bus clock of a peripheral
    pub fn enable(&self, p: PeripheralClock) {
        let mask = p.enable_mask();
        match p.bus() {
            Bus::AHB1 => set_bits!(self.rb.ahb1enr, mask),
            Bus::APB1 => set_bits!(self.rb.apb1enr, mask),
            Bus::APB2 => set_bits!(self.rb.apb2enr, mask),
        }
        // Delay after an RCC peripheral clock enabling
        let _ = self.enabled_bits(p.bus());
    }

    /// Disable the bus clock of a peripheral
    pub fn disable(&self, p: PeripheralClock) {
        let mask = p.enable_mask();
        match p.bus() {
            Bus::AHB1 => clear_bits!(self.rb.ahb1enr, mask),
            Bus::APB1 => clear_bits!(self.rb.apb1enr, mask),
            Bus::APB2 => clear_bits!(self.rb.apb2enr, mask),
        }
    }

    /// Pulse the reset line of a peripheral
    pub fn reset(&self, p: PeripheralClock) {
        let mask = p.reset_mask();
        match p.bus() {
            Bus::AHB1 => {
                set_bits!(self.rb.ahb1rstr, mask);
                clear_bits!(self.rb.ahb1rstr, mask);
            }
            Bus::APB1 => {
                set_bits!(self.rb.apb1rstr, mask);
                clear_bits!(self.rb.apb1rstr, mask);
            }
            Bus::APB2 => {
                set_bits!(self.rb.apb2rstr, mask);
                clear_bits!(self.rb.apb2rstr, mask);
            }
        }
    }

    pub fn is_enabled(&self, p: PeripheralClock) -> bool {
        self.enabled_bits(p.bus()) & p.enable_mask() != 0
    }

    fn enabled_bits(&self, bus: Bus) -> u32 {
        match bus {
            Bus::AHB1 => self.rb.ahb1enr.read().bits(),
            Bus::APB1 => self.rb.apb1enr.read().bits(),
            Bus::APB2 => self.rb.apb2enr.read().bits(),
        }
    }
}
