// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Updater entry point for the NUCLEO-F767ZI.
//!
//! At reset the user button is read and [`boot::decide`] picks between the resident application
//! and the updater. The updater waits for an SD card carrying `FIRMWARE.BIN`, programs it and
//! resets.
//!
//! LEDs: blue while waiting for a card, green after a commit, red after a failed attempt.

#![no_main]
#![no_std]

use cortex_m_rt::entry;
use log::{info, LevelFilter};
use panic_halt as _;

use hal::{
    pac,
    prelude::*,
    serial::{Config, Serial},
    spi::{Mode, Phase, Polarity, Spi},
};
use stm32f7xx_hal as hal;

use stick_update::boot::{self, BootAction};
use stick_update::config::{BootConfig, UpdaterConfig};
use stick_update::drivers::SdCard;
use stick_update::hw::{
    self, pins, BoardBootEnv, Button, ChipSelect, CycleDelay, InternalFlash, Led, SpiBus, Usart,
};
use stick_update::update::{Step, Updater};

#[entry]
fn main() -> ! {
    // Peripherals
    let dp = pac::Peripherals::take().unwrap();

    // Nothing but the button is touched before the decision.
    let button = Button::active_high(pins::user_button(dp.GPIOC));
    let mut env = BoardBootEnv::new(button);
    let reason = match boot::decide(&BootConfig::DEFAULT, &mut env) {
        BootAction::JumpToApplication { vector_table } => unsafe {
            hw::boot::jump_to_application(vector_table)
        },
        BootAction::RunUpdater(reason) => reason,
    };

    // Clocks
    let rcc = dp.RCC.constrain();
    let clocks = rcc.cfgr.freeze();
    let mut apb2 = rcc.apb2;

    let pins = pins::BoardPins::new(dp.GPIOA, dp.GPIOB, dp.GPIOD);

    // LED
    let mut led_green = Led::active_high(pins.leds.green);
    let mut led_blue = Led::active_high(pins.leds.blue);
    let mut led_red = Led::active_high(pins.leds.red);

    // USART3 (ST-LINK VCP)
    let usart_cfg = Config {
        baud_rate: 115_200.bps(),
        ..Default::default()
    };
    let serial = Serial::new(
        dp.USART3,
        (pins.usart3.tx, pins.usart3.rx),
        &clocks,
        usart_cfg,
    );
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    hw::logger::init(Usart::new(serial), level);
    info!("stick-update {}: {:?}", env!("CARGO_PKG_VERSION"), reason);

    // SPI1 (SD card)
    let spi_mode = Mode {
        polarity: Polarity::IdleLow,
        phase: Phase::CaptureOnFirstTransition,
    };
    let spi1 = Spi::new(dp.SPI1, (pins.sd.sck, pins.sd.miso, pins.sd.mosi)).enable::<u8>(
        spi_mode,
        400.kHz(),
        &clocks,
        &mut apb2,
    );
    let card = SdCard::new(
        SpiBus::new(spi1),
        ChipSelect::active_low(pins.sd.cs),
        pins.sd.detect,
    );

    let updater = Updater::new(
        card,
        InternalFlash::new(dp.FLASH),
        CycleDelay::new(&clocks),
        UpdaterConfig::DEFAULT,
    );

    led_blue.on();
    updater.run(
        |step| match step {
            Step::Committed(_) => {
                led_blue.off();
                led_green.on();
                log::logger().flush();
            }
            Step::Failed(_) => led_red.on(),
            Step::Idle => {}
        },
        hw::boot::system_reset,
    )
}
