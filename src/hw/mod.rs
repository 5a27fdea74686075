// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # MCU-Level Wrappers
//!
//! Thin layers over `stm32f7xx-hal` for the peripherals the updater touches. Everything here is
//! built only with the `firmware` feature.

pub mod boot;
pub mod button;
pub mod delay;
pub mod flash;
pub mod led;
pub mod logger;
pub mod pins;
pub mod spi;
pub mod usart;

pub use boot::BoardBootEnv;
pub use button::Button;
pub use delay::CycleDelay;
pub use flash::InternalFlash;
pub use led::Led;
pub use spi::ChipSelect;
pub use spi::SpiBus;
pub use usart::Usart;
