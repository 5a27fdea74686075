// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Busy-wait delay counted in core clock cycles.

use embedded_hal::delay::DelayNs;
use stm32f7xx_hal::rcc::Clocks;

pub struct CycleDelay {
    sysclk_hz: u32,
}

impl CycleDelay {
    pub fn new(clocks: &Clocks) -> Self {
        Self {
            sysclk_hz: clocks.sysclk().raw(),
        }
    }
}

impl DelayNs for CycleDelay {
    fn delay_ns(&mut self, ns: u32) {
        let cycles = u64::from(ns) * u64::from(self.sysclk_hz) / 1_000_000_000;
        cortex_m::asm::delay(u32::try_from(cycles).unwrap_or(u32::MAX));
    }
}
