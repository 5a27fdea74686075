// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Firmware Update
//!
//! The commit engine copies `FIRMWARE.BIN` from an attached drive into the application region of
//! flash. The attach loop ([`Updater`]) waits for a drive, runs the commit engine once per
//! attachment and reports the outcome.
//!
//! The first eight bytes of the image (initial stack pointer and reset vector) are held in RAM and
//! programmed only after every other byte has been written. Until then the application region has
//! no valid vector table and the boot decision keeps returning to the updater, so an interrupted
//! update can always be retried.

pub mod commit;
pub mod flash;
pub mod host;
pub mod updater;

pub use commit::{commit_image, HeldHeader};
pub use flash::Flash;
pub use host::{HostEvent, MassStorageHost};
pub use updater::{State, Step, Updater};

use crate::fs;

/// Errors from one commit attempt.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// The drive never reported ready within the retry budget.
    DriveNotReady,
    /// Mounting the volume or reading the image failed.
    Fs(fs::Error),
    /// No `FIRMWARE.BIN` in the root directory, or it is empty.
    FileNotFound,
    /// Image shorter than a vector-table head.
    ImageTooSmall(u32),
    /// Image larger than the application region.
    ImageTooLarge { size: u32, capacity: u32 },
    /// Erasing up to the image end would also erase the erase unit ending at `unit_end`, past the
    /// end of the application region.
    EraseOverlapsReserved { unit_end: u32, region_end: u32 },
    /// Erase or program failed.
    Flash,
    /// The cluster chain ended with `remaining` bytes still to be written.
    Incomplete { remaining: u32 },
}

impl From<fs::Error> for Error {
    fn from(e: fs::Error) -> Self {
        Error::Fs(e)
    }
}
