// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Reset-time hardware: the RAM request word, the vector table in flash and the jump itself.

use cortex_m::peripheral::SCB;

use super::Button;
use crate::boot::BootEnv;
use crate::config::{UPDATE_REQUEST_ADDR, UPDATE_REQUEST_MAGIC};
use crate::vector::VectorTable;

/// A word of RAM outside the linker's `RAM` region, so it survives a reset untouched by startup
/// code.
pub struct RamFlag {
    addr: *mut u32,
}

impl RamFlag {
    /// The update request word at [`UPDATE_REQUEST_ADDR`].
    pub const fn update_request() -> Self {
        Self {
            addr: UPDATE_REQUEST_ADDR as *mut u32,
        }
    }

    #[inline]
    pub fn read(&self) -> u32 {
        unsafe { self.addr.read_volatile() }
    }

    #[inline]
    pub fn write(&mut self, value: u32) {
        unsafe { self.addr.write_volatile(value) }
    }
}

/// Boot environment of the board: flash, the request word and the user button.
pub struct BoardBootEnv<const P: char, const N: u8, MODE> {
    flag: RamFlag,
    button: Button<P, N, MODE>,
}

impl<const P: char, const N: u8, MODE> BoardBootEnv<P, N, MODE> {
    pub fn new(button: Button<P, N, MODE>) -> Self {
        Self {
            flag: RamFlag::update_request(),
            button,
        }
    }

    pub fn free(self) -> Button<P, N, MODE> {
        self.button
    }
}

impl<const P: char, const N: u8, MODE> BootEnv for BoardBootEnv<P, N, MODE> {
    fn vector_table(&self, addr: u32) -> VectorTable {
        let words = addr as *const u32;
        unsafe {
            VectorTable {
                initial_sp: words.read_volatile(),
                reset_vector: words.add(1).read_volatile(),
            }
        }
    }

    fn take_update_request(&mut self, magic: u32) -> bool {
        if self.flag.read() == magic {
            self.flag.write(0);
            true
        } else {
            false
        }
    }

    fn button_pressed(&mut self) -> bool {
        self.button.is_pressed()
    }
}

/// Hand the core to the application whose vector table is at `vector_table`.
///
/// # Safety
///
/// `vector_table` must hold a plausible stack pointer and reset vector, and no peripheral the
/// application expects in its reset state may have been reconfigured. No interrupt may be enabled
/// or pending in the NVIC.
///
/// The application starts with interrupts unmasked (PRIMASK clear), as after a reset.
pub unsafe fn jump_to_application(vector_table: u32) -> ! {
    cortex_m::interrupt::disable();
    let peripherals = cortex_m::Peripherals::steal();
    peripherals.SCB.vtor.write(vector_table);
    cortex_m::asm::dsb();
    cortex_m::asm::isb();
    cortex_m::interrupt::enable();
    cortex_m::asm::bootload(vector_table as *const u32)
}

pub fn system_reset() -> ! {
    SCB::sys_reset()
}

/// Ask the updater to run on the next boot and reset into it. For use by applications.
pub fn request_update() -> ! {
    cortex_m::interrupt::disable();
    RamFlag::update_request().write(UPDATE_REQUEST_MAGIC);
    system_reset()
}
