// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Push buttons and other contact inputs, sampled without debouncing.

use stm32f7xx_hal::gpio::{self, Input};

use super::led::ActiveLevel;

pub struct Button<const P: char, const N: u8, MODE> {
    pin: gpio::Pin<P, N, Input<MODE>>,
    active: ActiveLevel,
}

impl<const P: char, const N: u8, MODE> Button<P, N, MODE> {
    pub fn new(pin: gpio::Pin<P, N, Input<MODE>>, active: ActiveLevel) -> Self {
        Self { pin, active }
    }

    /// Pressed when the pin reads high (external pull-down).
    pub fn active_high(pin: gpio::Pin<P, N, Input<MODE>>) -> Self {
        Self::new(pin, ActiveLevel::High)
    }

    /// Pressed when the pin reads low (pull-up, contact to ground).
    pub fn active_low(pin: gpio::Pin<P, N, Input<MODE>>) -> Self {
        Self::new(pin, ActiveLevel::Low)
    }

    #[inline]
    pub fn is_pressed(&self) -> bool {
        match self.active {
            ActiveLevel::High => self.pin.is_high(),
            ActiveLevel::Low => self.pin.is_low(),
        }
    }

    pub fn free(self) -> gpio::Pin<P, N, Input<MODE>> {
        self.pin
    }
}
