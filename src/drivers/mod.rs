// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Device-Specific Drivers
//!
//! This module contains device-specific drivers that sit above the raw `hw/` layer and below the
//! updater logic.
//!
//! ## Existing drivers
//!
//! - [`sd_spi`] – SD/SDHC card in SPI mode, the removable update medium

pub mod sd_spi;

pub use sd_spi::SdCard;
