// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Boot Decision
//!
//! Runs once after every reset and chooses between the updater and the resident application. The
//! decision is made against a [`BootEnv`], so the firmware supplies real memory and GPIO while the
//! tests supply plain values. Performing the jump is left to the firmware.

use log::info;

use crate::config::BootConfig;
use crate::vector::VectorTable;

/// Why the updater is running instead of the application.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UpdateReason {
    /// No plausible vector table at the application start.
    NoApplication,
    /// The application left an update request in RAM before resetting.
    Requested,
    /// The update button was held at reset.
    ButtonHeld,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BootAction {
    RunUpdater(UpdateReason),
    /// Point VTOR at `vector_table`, load its stack pointer and branch to its reset vector.
    JumpToApplication { vector_table: u32 },
}

/// What the decision is allowed to look at.
pub trait BootEnv {
    /// Read the vector-table head stored at `addr`.
    fn vector_table(&self, addr: u32) -> VectorTable;

    /// Return true and clear the request word if it holds `magic`. Any other value is left alone.
    fn take_update_request(&mut self, magic: u32) -> bool;

    fn button_pressed(&mut self) -> bool;
}

/// Choose what to run. Checks, in order: a valid application, a pending request, the button.
pub fn decide<E: BootEnv>(config: &BootConfig, env: &mut E) -> BootAction {
    let reason = if !env
        .vector_table(config.app_start)
        .is_plausible(&config.vector_check)
    {
        Some(UpdateReason::NoApplication)
    } else if env.take_update_request(config.request_magic) {
        Some(UpdateReason::Requested)
    } else if env.button_pressed() {
        Some(UpdateReason::ButtonHeld)
    } else {
        None
    };

    match reason {
        Some(reason) => {
            info!("staying in updater: {:?}", reason);
            BootAction::RunUpdater(reason)
        }
        None => BootAction::JumpToApplication {
            vector_table: config.app_start,
        },
    }
}
