// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Serial Peripheral Interface (SPI) abstraction layer.
//!
//! - `SpiBus` wraps a configured HAL SPI instance with 8-bit words. Reads clock out 0xFF, which
//!   SD cards in SPI mode require while they are sending.
//! - `ChipSelect` is an active-low GPIO output wrapper for manual CS control.

use stm32f7xx_hal::{
    gpio::{self, Output, PinState, PushPull},
    prelude::*,
    spi::{self, Enabled, Spi},
};

/// Fill byte sent while reading.
pub const IDLE: u8 = 0xFF;

/// Wrapper around an enabled HAL SPI instance (8-bit words).
pub struct SpiBus<I, P> {
    spi: Spi<I, P, Enabled<u8>>,
}

impl<I, P> SpiBus<I, P>
where
    I: spi::Instance,
    P: spi::Pins<I>,
{
    pub fn new(spi: Spi<I, P, Enabled<u8>>) -> Self {
        Self { spi }
    }

    /// Perform a blocking, full-duplex transfer of one byte.
    pub fn transfer_byte(&mut self, byte: u8) -> Result<u8, spi::Error> {
        let mut tmp = [byte];
        self.spi.transfer(&mut tmp)?;
        Ok(tmp[0])
    }

    #[inline]
    pub fn read_byte(&mut self) -> Result<u8, spi::Error> {
        self.transfer_byte(IDLE)
    }

    /// Send every byte of `bytes`, ignoring what comes back.
    pub fn write_all(&mut self, bytes: &[u8]) -> Result<(), spi::Error> {
        for &b in bytes {
            self.transfer_byte(b)?;
        }
        Ok(())
    }

    /// Fill `buf` with received bytes.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<(), spi::Error> {
        buf.fill(IDLE);
        self.spi.transfer(buf)?;
        Ok(())
    }

    /// Clock `count` idle bytes with nothing selected.
    pub fn idle_clocks(&mut self, count: usize) -> Result<(), spi::Error> {
        for _ in 0..count {
            self.read_byte()?;
        }
        Ok(())
    }

    pub fn free(self) -> Spi<I, P, Enabled<u8>> {
        self.spi
    }
}

/// Manual chip-select line, active-low, generic over any GPIO pin.
pub struct ChipSelect<const P: char, const N: u8> {
    pin: gpio::Pin<P, N, Output<PushPull>>,
}

impl<const P: char, const N: u8> ChipSelect<P, N> {
    /// Create an active-low chip select and set to the inactive state (i.e., high).
    pub fn active_low<MODE>(pin: gpio::Pin<P, N, MODE>) -> Self {
        let mut pin = pin.into_push_pull_output();
        pin.set_state(PinState::High);
        Self { pin }
    }

    #[inline]
    pub fn select(&mut self) {
        self.pin.set_low();
    }

    #[inline]
    pub fn deselect(&mut self) {
        self.pin.set_high();
    }

    pub fn free(self) -> gpio::Pin<P, N, Output<PushPull>> {
        self.pin
    }
}
