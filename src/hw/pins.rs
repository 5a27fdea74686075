// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Pin definitions for the NUCLEO-F767ZI board running the updater.
//!
//! The SD card sits on SPI1 (Arduino D11/D12/D13 header pins) with chip select on PD14 (D10) and
//! the socket's card-detect switch on PD15 (D9), closed to ground while a card is inserted.

use stm32f7xx_hal::{
    gpio::{gpioa, gpiob, gpioc, gpiod, Alternate, Floating, Input, Output, PullUp, PushPull},
    pac,
    prelude::*,
};

/// User button B1, read before anything else is configured.
pub type UserButtonPin = gpioc::PC13<Input<Floating>>;

/// Split GPIOC and take only the user button.
pub fn user_button(gpioc: pac::GPIOC) -> UserButtonPin {
    gpioc.split().pc13.into_floating_input()
}

/// Pins used once the updater runs. Construct this once with:
///
/// ```rust
/// let pins = BoardPins::new(dp.GPIOA, dp.GPIOB, dp.GPIOD);
/// ```
pub struct BoardPins {
    pub leds: Leds,
    pub usart3: Usart3Pins,
    pub sd: SdPins,
}

pub struct Leds {
    pub green: gpiob::PB0<Output<PushPull>>, // LD1
    pub blue: gpiob::PB7<Output<PushPull>>,  // LD2
    pub red: gpiob::PB14<Output<PushPull>>,  // LD3
}

/// ST-LINK virtual COM port.
pub struct Usart3Pins {
    pub tx: gpiod::PD8<Alternate<7>>,
    pub rx: gpiod::PD9<Alternate<7>>,
}

pub struct SdPins {
    pub sck: gpioa::PA5<Alternate<5>>,
    pub miso: gpioa::PA6<Alternate<5>>,
    pub mosi: gpioa::PA7<Alternate<5>>,
    pub cs: gpiod::PD14<Output<PushPull>>,
    pub detect: gpiod::PD15<Input<PullUp>>,
}

impl BoardPins {
    pub fn new(gpioa: pac::GPIOA, gpiob: pac::GPIOB, gpiod: pac::GPIOD) -> Self {
        let gpioa = gpioa.split();
        let gpiob = gpiob.split();
        let gpiod = gpiod.split();

        Self {
            leds: Leds {
                green: gpiob.pb0.into_push_pull_output(),
                blue: gpiob.pb7.into_push_pull_output(),
                red: gpiob.pb14.into_push_pull_output(),
            },

            usart3: Usart3Pins {
                tx: gpiod.pd8.into_alternate::<7>(),
                rx: gpiod.pd9.into_alternate::<7>(),
            },

            sd: SdPins {
                sck: gpioa.pa5.into_alternate::<5>(),
                miso: gpioa.pa6.into_alternate::<5>(),
                mosi: gpioa.pa7.into_alternate::<5>(),
                cs: gpiod.pd14.into_push_pull_output(),
                detect: gpiod.pd15.into_pull_up_input(),
            },
        }
    }
}
