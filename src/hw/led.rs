// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Status LEDs.

use stm32f7xx_hal::gpio::{self, Output, PushPull};

/// Whether a signal is asserted by driving the pin high or low.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActiveLevel {
    High,
    Low,
}

/// LED on a push-pull output that remembers its active level and last state.
pub struct Led<const P: char, const N: u8> {
    pin: gpio::Pin<P, N, Output<PushPull>>,
    active: ActiveLevel,
    is_on: bool,
}

impl<const P: char, const N: u8> Led<P, N> {
    /// Wrap `pin` and switch the LED off.
    pub fn new<MODE>(pin: gpio::Pin<P, N, MODE>, active: ActiveLevel) -> Self {
        let mut led = Self {
            pin: pin.into_push_pull_output(),
            active,
            is_on: true,
        };
        led.off();
        led
    }

    pub fn active_high<MODE>(pin: gpio::Pin<P, N, MODE>) -> Self {
        Self::new(pin, ActiveLevel::High)
    }

    pub fn active_low<MODE>(pin: gpio::Pin<P, N, MODE>) -> Self {
        Self::new(pin, ActiveLevel::Low)
    }

    /// Drive the LED logically ON (true) or OFF (false).
    pub fn set(&mut self, on: bool) {
        if on == (self.active == ActiveLevel::High) {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
        self.is_on = on;
    }

    #[inline]
    pub fn on(&mut self) {
        self.set(true);
    }

    #[inline]
    pub fn off(&mut self) {
        self.set(false);
    }

    pub fn toggle(&mut self) {
        self.set(!self.is_on);
    }

    #[inline]
    pub fn is_on(&self) -> bool {
        self.is_on
    }

    pub fn free(self) -> gpio::Pin<P, N, Output<PushPull>> {
        self.pin
    }
}
