// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Attach loop: wait for a drive, commit its image, reset on success.

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use super::{commit_image, Error, Flash, HostEvent, MassStorageHost};
use crate::block::{Block, BLOCK_SIZE};
use crate::config::UpdaterConfig;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum State {
    NoDevice,
    DeviceEnumerated,
}

/// Outcome of one [`Updater::step`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Step {
    /// Nothing attached, or nothing new happened.
    Idle,
    /// The image was committed; this many bytes were written.
    Committed(u32),
    /// The attached drive could not be used. Waiting for the next attachment.
    Failed(Error),
}

/// Owns the host, the flash and the sector buffer for the lifetime of the updater.
pub struct Updater<H, F, D> {
    host: H,
    flash: F,
    delay: D,
    config: UpdaterConfig,
    state: State,
    buf: Block,
}

impl<H, F, D> Updater<H, F, D>
where
    H: MassStorageHost,
    F: Flash,
    D: DelayNs,
{
    pub fn new(host: H, flash: F, delay: D, config: UpdaterConfig) -> Self {
        Self {
            host,
            flash,
            delay,
            config,
            state: State::NoDevice,
            buf: [0; BLOCK_SIZE],
        }
    }

    #[inline]
    pub fn state(&self) -> State {
        self.state
    }

    /// Pump the host once and, if a drive is attached, try to commit its image.
    ///
    /// Every commit attempt ends in [`State::NoDevice`], so a drive is tried once per attachment.
    pub fn step(&mut self) -> Step {
        while let Some(event) = self.host.poll() {
            self.state = match event {
                HostEvent::Opened => {
                    info!("drive attached");
                    State::DeviceEnumerated
                }
                HostEvent::Closed => {
                    info!("drive removed");
                    State::NoDevice
                }
            };
        }

        if self.state != State::DeviceEnumerated {
            return Step::Idle;
        }
        self.state = State::NoDevice;

        match commit_image(
            &mut self.host,
            &mut self.flash,
            &mut self.delay,
            &self.config,
            &mut self.buf,
        ) {
            Ok(bytes) => Step::Committed(bytes),
            Err(e) => {
                warn!("update failed: {:?}", e);
                Step::Failed(e)
            }
        }
    }

    /// Step forever. Every step other than [`Step::Idle`] is passed to `on_step`; a commit is
    /// followed by `reset`.
    pub fn run(mut self, mut on_step: impl FnMut(&Step), reset: fn() -> !) -> ! {
        loop {
            let step = self.step();
            if step == Step::Idle {
                continue;
            }
            on_step(&step);
            if let Step::Committed(_) = step {
                reset();
            }
        }
    }

    /// Release the peripherals.
    pub fn free(self) -> (H, F, D) {
        (self.host, self.flash, self.delay)
    }
}
