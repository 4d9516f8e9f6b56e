//! External interrupt controller
//!
//! Lines 0 to 15 are shared by the GPIO ports: line `n` can listen to pin
//! `n` of exactly one port, selected through SYSCFG. Routing a line and
//! enabling its interrupt in the NVIC are separate steps.
//!
//! ```ignore
//! let exti = dp.EXTI.exti(dp.SYSCFG, &rcc);
//! let gpioc = dp.GPIOC.split(&rcc).with_exti(&exti);
//! gpioc.configure(13, &PinConfig::interrupt(Edge::Falling))?;
//! nvic::set_priority(Interrupt::EXTI15_10, 2)?;
//! nvic::enable(Interrupt::EXTI15_10);
//!
//! // In the EXTI15_10 handler, after the application logic
//! exti.handle_irq(13);
//! ```

use crate::bits::field;
use crate::pac::{exti, syscfg, Interrupt, EXTI, SYSCFG};
use crate::gpio::Port;
use crate::rcc::{PeripheralClock, Rcc};

/// EXTI trigger event
#[derive(Debug, PartialEq, Eq, PartialOrd, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    GPIO0 = 0,
    GPIO1 = 1,
    GPIO2 = 2,
    GPIO3 = 3,
    GPIO4 = 4,
    GPIO5 = 5,
    GPIO6 = 6,
    GPIO7 = 7,
    GPIO8 = 8,
    GPIO9 = 9,
    GPIO10 = 10,
    GPIO11 = 11,
    GPIO12 = 12,
    GPIO13 = 13,
    GPIO14 = 14,
    GPIO15 = 15,
    PVD = 16,
    RTC_ALARM = 17,
    USB_FS_WAKEUP = 18,
    USB_HS_WAKEUP = 20,
    RTC_TAMP_STAMP = 21,
    RTC_WAKEUP = 22,
}

impl Event {
    /// GPIO line for a pin number
    pub fn gpio(pin: u8) -> Option<Event> {
        const GPIO: [Event; 16] = [
            Event::GPIO0,
            Event::GPIO1,
            Event::GPIO2,
            Event::GPIO3,
            Event::GPIO4,
            Event::GPIO5,
            Event::GPIO6,
            Event::GPIO7,
            Event::GPIO8,
            Event::GPIO9,
            Event::GPIO10,
            Event::GPIO11,
            Event::GPIO12,
            Event::GPIO13,
            Event::GPIO14,
            Event::GPIO15,
        ];
        GPIO.get(pin as usize).copied()
    }

    fn mask(self) -> u32 {
        1 << self as u8
    }
}

/// Edge detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    Rising,
    Falling,
    RisingFalling,
}

/// NVIC line serving a GPIO EXTI line
pub fn interrupt_for(pin: u8) -> Option<Interrupt> {
    Some(match pin {
        0 => Interrupt::EXTI0,
        1 => Interrupt::EXTI1,
        2 => Interrupt::EXTI2,
        3 => Interrupt::EXTI3,
        4 => Interrupt::EXTI4,
        5..=9 => Interrupt::EXTI9_5,
        10..=15 => Interrupt::EXTI15_10,
        _ => return None,
    })
}

pub trait ExtiExt {
    fn exti(self, syscfg: SYSCFG, rcc: &Rcc) -> Exti<'static>;
}

impl ExtiExt for EXTI {
    fn exti(self, syscfg: SYSCFG, rcc: &Rcc) -> Exti<'static> {
        rcc.enable(PeripheralClock::SYSCFG);
        let _ = (self, syscfg);
        unsafe { Exti::from_registers(&*EXTI::ptr(), &*SYSCFG::ptr()) }
    }
}

/// EXTI controller together with the SYSCFG line selectors
pub struct Exti<'a> {
    rb: &'a exti::RegisterBlock,
    syscfg: &'a syscfg::RegisterBlock,
}

impl<'a> Exti<'a> {
    pub fn from_registers(
        rb: &'a exti::RegisterBlock,
        syscfg: &'a syscfg::RegisterBlock,
    ) -> Self {
        Exti { rb, syscfg }
    }

    /// Connect GPIO line `pin` to `port`
    pub fn route(&self, pin: u8, port: Port) {
        if pin > 15 {
            return;
        }
        let offset = (pin % 4) * 4;
        match pin / 4 {
            0 => write_field!(self.syscfg.exticr1, offset, 4, port as u32),
            1 => write_field!(self.syscfg.exticr2, offset, 4, port as u32),
            2 => write_field!(self.syscfg.exticr3, offset, 4, port as u32),
            _ => write_field!(self.syscfg.exticr4, offset, 4, port as u32),
        }
    }

    /// EXTICR register holding the selector of GPIO line `pin`
    fn exticr(&self, pin: u8) -> u32 {
        match pin / 4 {
            0 => self.syscfg.exticr1.read().bits(),
            1 => self.syscfg.exticr2.read().bits(),
            2 => self.syscfg.exticr3.read().bits(),
            _ => self.syscfg.exticr4.read().bits(),
        }
    }

    /// Port currently connected to GPIO line `pin`
    pub fn routed_port(&self, pin: u8) -> Option<Port> {
        if pin > 15 {
            return None;
        }
        Port::from_index(field(self.exticr(pin), (pin as u32 % 4) * 4, 4) as u8)
    }

    /// Select the edges that trigger `ev`
    pub fn set_trigger(&self, ev: Event, edge: Edge) {
        let mask = ev.mask();
        match edge {
            Edge::Rising => {
                set_bits!(self.rb.rtsr, mask);
                clear_bits!(self.rb.ftsr, mask);
            }
            Edge::Falling => {
                clear_bits!(self.rb.rtsr, mask);
                set_bits!(self.rb.ftsr, mask);
            }
            Edge::RisingFalling => {
                set_bits!(self.rb.rtsr, mask);
                set_bits!(self.rb.ftsr, mask);
            }
        }
    }

    /// Unmask the interrupt request of `ev`
    pub fn listen(&self, ev: Event) {
        set_bits!(self.rb.imr, ev.mask());
    }

    /// Mask the interrupt request of `ev`
    pub fn unlisten(&self, ev: Event) {
        clear_bits!(self.rb.imr, ev.mask());
    }

    /// Stop every trigger and request of `ev`
    pub fn disable(&self, ev: Event) {
        let mask = ev.mask();
        clear_bits!(self.rb.imr, mask);
        clear_bits!(self.rb.emr, mask);
        clear_bits!(self.rb.rtsr, mask);
        clear_bits!(self.rb.ftsr, mask);
    }

    pub fn is_pending(&self, ev: Event) -> bool {
        self.rb.pr.read().bits() & ev.mask() != 0
    }

    /// Clear the pending flag. PR is write-one-to-clear
    pub fn unpend(&self, ev: Event) {
        write_bits!(self.rb.pr, ev.mask());
    }

    /// Generate `ev` from software
    pub fn trigger(&self, ev: Event) {
        set_bits!(self.rb.swier, ev.mask());
    }

    /// Clear the pending flag of GPIO line `pin`
    ///
    /// Call from the interrupt handler once the application has reacted
    /// to the edge. Returns whether the line was pending.
    pub fn handle_irq(&self, pin: u8) -> bool {
        match Event::gpio(pin) {
            Some(ev) => {
                let pending = self.is_pending(ev);
                self.unpend(ev);
                pending
            }
            None => false,
        }
    }
}
