// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # stick-update
//!
//! Removable-media firmware updater for the OmniTiles STM32F7 boards. The updater sits at the start
//! of flash, decides at reset whether to run the resident application, and otherwise waits for a
//! mass-storage medium carrying `FIRMWARE.BIN`, which it programs into the application region.
//!
//! ## Crate Structure
//!
//! | Module | Purpose |
//! | ------ | -------- |
//! | [`block`] | 512-byte block device contract |
//! | [`fs`] | Minimal read-only FAT16/FAT32 reader |
//! | [`update`] | Flash commit engine and the mass-storage attach loop |
//! | [`boot`] | Reset-time decision between updater and application |
//! | [`config`] | Board memory map and build-time policy |
//! | `hw` | MCU-level wrappers (flash, USART, SPI, GPIO), feature `firmware` |
//! | `drivers` | Device-level drivers (SD card over SPI), feature `firmware` |
//!
//! Everything outside `hw` and `drivers` is hardware independent and tested on the host:
//!
//! ```bash
//! cargo test
//! ```
//!
//! Build and flash the bootloader:
//!
//! ```bash
//! cargo run --release --features firmware --target thumbv7em-none-eabihf
//! ```
//!
//! ## License
//!
//! Licensed under the **MIT License**.
//! See the `LICENSE` file in the repository root for full terms.
//!
//! © 2025–2026 Christopher Liu

#![cfg_attr(not(test), no_std)]

pub mod block;
pub mod boot;
pub mod config;
pub mod fs;
pub mod update;
pub mod vector;

#[cfg(feature = "firmware")]
pub mod drivers;
#[cfg(feature = "firmware")]
pub mod hw;

#[cfg(test)]
mod testutil;
