// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! `log` backend writing one line per record to the debug USART.
//!
//! ```text
//! [INFO] stick_update::update::commit: erasing 0x08008000..0x0801a2c4
//! ```

use core::cell::RefCell;
use core::fmt::Write;

use cortex_m::interrupt::{self, Mutex};
use log::{LevelFilter, Log, Metadata, Record};
use stm32f7xx_hal::pac::USART3;

use super::Usart;

struct UsartLogger {
    port: Mutex<RefCell<Option<Usart<USART3>>>>,
}

static LOGGER: UsartLogger = UsartLogger {
    port: Mutex::new(RefCell::new(None)),
};

/// Route `log` output to `usart`. Later calls only replace the port.
pub fn init(usart: Usart<USART3>, level: LevelFilter) {
    interrupt::free(|cs| {
        LOGGER.port.borrow(cs).replace(Some(usart));
    });
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

impl Log for UsartLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        interrupt::free(|cs| {
            if let Some(port) = self.port.borrow(cs).borrow_mut().as_mut() {
                let _ = writeln!(port, "[{}] {}: {}", record.level(), record.target(), record.args());
            }
        });
    }

    fn flush(&self) {
        interrupt::free(|cs| {
            if let Some(port) = self.port.borrow(cs).borrow_mut().as_mut() {
                port.flush();
            }
        });
    }
}
