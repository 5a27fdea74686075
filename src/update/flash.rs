// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Flash programming interface used by the commit engine.

use core::fmt::Debug;

/// On-chip flash with erase units of any size.
pub trait Flash {
    type Error: Debug;

    /// First address past the erase unit containing `addr`, or `None` outside the device.
    fn unit_end(&self, addr: u32) -> Option<u32>;

    /// Erase the unit containing `addr`.
    fn erase(&mut self, addr: u32) -> Result<(), Self::Error>;

    /// Program `data` at `addr`. Both the address and the length are multiples of 4.
    fn program(&mut self, addr: u32, data: &[u8]) -> Result<(), Self::Error>;
}
