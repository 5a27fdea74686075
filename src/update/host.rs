// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Mass-storage host seen from the attach loop.

use crate::block::BlockDevice;

/// Attach and detach notifications from the host stack.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HostEvent {
    /// A mass-storage device was enumerated and can be read.
    Opened,
    /// The device went away.
    Closed,
}

/// A host stack driving one removable mass-storage device.
///
/// Block reads go to the currently attached device.
pub trait MassStorageHost: BlockDevice {
    /// Run the host state machine once and return the next pending event, if any.
    fn poll(&mut self) -> Option<HostEvent>;

    /// True once the attached device answers reads.
    fn drive_ready(&mut self) -> bool;
}
