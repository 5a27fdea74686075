// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! SD card in SPI mode, used as the removable update medium.
//!
//! Only what single-block reads need is implemented: the CMD0/CMD8/ACMD41 power-up sequence,
//! CMD58 to tell byte-addressed (SDSC) cards from block-addressed (SDHC/SDXC) ones, and CMD17.
//! Insertion and removal are seen through the socket's card-detect switch and reported as
//! [`HostEvent`]s.

use log::{debug, info, warn};
use stm32f7xx_hal::{
    gpio::{self, Input, PullUp},
    spi,
};

use crate::block::{Block, BlockDevice};
use crate::hw::{ChipSelect, SpiBus};
use crate::update::{HostEvent, MassStorageHost};

// Command indices
pub mod cmd {
    pub const GO_IDLE_STATE: u8 = 0;
    pub const SEND_IF_COND: u8 = 8;
    pub const SET_BLOCKLEN: u8 = 16;
    pub const READ_SINGLE_BLOCK: u8 = 17;
    pub const APP_CMD: u8 = 55;
    pub const READ_OCR: u8 = 58;
    pub const SD_SEND_OP_COND: u8 = 41;
}

const R1_IDLE: u8 = 0x01;
const R1_ILLEGAL_COMMAND: u8 = 0x04;
const DATA_TOKEN: u8 = 0xFE;

/// Polls for an R1 response after a command.
const RESPONSE_POLLS: usize = 10;
/// ACMD41 attempts before giving up on power-up.
const INIT_ATTEMPTS: usize = 4000;
/// Bytes read while waiting for a data token.
const TOKEN_POLLS: usize = 50_000;

/// Error type for `SdCard` operations.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// SPI peripheral error.
    Spi,
    /// No card in the socket.
    NoCard,
    /// Card present but not initialized.
    NotReady,
    /// No R1 response to this command.
    NoResponse(u8),
    /// Command answered with error bits set.
    Command { cmd: u8, r1: u8 },
    /// CMD8 echoed the wrong check pattern.
    BadVoltage,
    /// The card stayed busy through the whole ACMD41 budget.
    InitTimeout,
    /// No data token, or an error token, before a block.
    DataToken(u8),
}

impl From<spi::Error> for Error {
    fn from(_: spi::Error) -> Self {
        Error::Spi
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Addressing {
    /// SDSC: command argument is a byte offset.
    Byte,
    /// SDHC/SDXC: command argument is a block number.
    Block,
}

/// SD card on a dedicated SPI bus with its chip-select and card-detect pins.
pub struct SdCard<I, PINS, const CP: char, const CN: u8, const DP: char, const DN: u8> {
    spi: SpiBus<I, PINS>,
    cs: ChipSelect<CP, CN>,
    detect: gpio::Pin<DP, DN, Input<PullUp>>,
    present: bool,
    addressing: Option<Addressing>,
}

impl<I, PINS, const CP: char, const CN: u8, const DP: char, const DN: u8>
    SdCard<I, PINS, CP, CN, DP, DN>
where
    I: spi::Instance,
    PINS: spi::Pins<I>,
{
    /// The bus must run at 400 kHz or less for power-up; mode 0.
    pub fn new(
        spi: SpiBus<I, PINS>,
        cs: ChipSelect<CP, CN>,
        detect: gpio::Pin<DP, DN, Input<PullUp>>,
    ) -> Self {
        Self {
            spi,
            cs,
            detect,
            present: false,
            addressing: None,
        }
    }

    /// Card-detect switch closed.
    #[inline]
    pub fn is_present(&self) -> bool {
        self.detect.is_low()
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.addressing.is_some()
    }

    /// Run the SPI-mode power-up sequence.
    pub fn init(&mut self) -> Result<(), Error> {
        self.addressing = None;
        if !self.is_present() {
            return Err(Error::NoCard);
        }

        // At least 74 clocks with CS high.
        self.cs.deselect();
        self.spi.idle_clocks(10)?;

        let r1 = self.command(cmd::GO_IDLE_STATE, 0, 0x95)?;
        self.finish();
        if r1 != R1_IDLE {
            return Err(Error::Command {
                cmd: cmd::GO_IDLE_STATE,
                r1,
            });
        }

        let r1 = self.command(cmd::SEND_IF_COND, 0x1AA, 0x87)?;
        let v2 = if r1 & R1_ILLEGAL_COMMAND != 0 {
            self.finish();
            false
        } else {
            let mut r7 = [0u8; 4];
            self.spi.read_into(&mut r7)?;
            self.finish();
            if r7[3] != 0xAA {
                return Err(Error::BadVoltage);
            }
            true
        };

        let hcs = if v2 { 1 << 30 } else { 0 };
        let mut ready = false;
        for _ in 0..INIT_ATTEMPTS {
            self.command(cmd::APP_CMD, 0, 0x01)?;
            self.finish();
            let r1 = self.command(cmd::SD_SEND_OP_COND, hcs, 0x01)?;
            self.finish();
            if r1 == 0 {
                ready = true;
                break;
            }
        }
        if !ready {
            return Err(Error::InitTimeout);
        }

        let addressing = if v2 {
            self.command(cmd::READ_OCR, 0, 0x01)?;
            let mut ocr = [0u8; 4];
            self.spi.read_into(&mut ocr)?;
            self.finish();
            if ocr[0] & 0x40 != 0 {
                Addressing::Block
            } else {
                Addressing::Byte
            }
        } else {
            Addressing::Byte
        };

        if addressing == Addressing::Byte {
            let r1 = self.command(cmd::SET_BLOCKLEN, 512, 0x01)?;
            self.finish();
            if r1 != 0 {
                return Err(Error::Command {
                    cmd: cmd::SET_BLOCKLEN,
                    r1,
                });
            }
        }

        info!("sd: card ready ({:?} addressing)", addressing);
        self.addressing = Some(addressing);
        Ok(())
    }

    /// Read one 512-byte block.
    pub fn read(&mut self, lba: u32, buf: &mut Block) -> Result<(), Error> {
        let arg = match self.addressing {
            Some(Addressing::Block) => lba,
            Some(Addressing::Byte) => lba.checked_mul(512).ok_or(Error::NotReady)?,
            None => return Err(Error::NotReady),
        };

        let result = self.read_data(arg, buf);
        self.finish();
        result
    }

    fn read_data(&mut self, arg: u32, buf: &mut Block) -> Result<(), Error> {
        let r1 = self.command(cmd::READ_SINGLE_BLOCK, arg, 0x01)?;
        if r1 != 0 {
            return Err(Error::Command {
                cmd: cmd::READ_SINGLE_BLOCK,
                r1,
            });
        }

        let mut token = 0xFF;
        for _ in 0..TOKEN_POLLS {
            token = self.spi.read_byte()?;
            if token != 0xFF {
                break;
            }
        }
        if token != DATA_TOKEN {
            return Err(Error::DataToken(token));
        }

        self.spi.read_into(buf)?;
        // CRC, unchecked in SPI mode.
        let mut crc = [0u8; 2];
        self.spi.read_into(&mut crc)?;
        Ok(())
    }

    /// Select the card, send a command frame and return R1. The card stays selected.
    fn command(&mut self, index: u8, arg: u32, crc: u8) -> Result<u8, Error> {
        self.cs.select();
        self.spi.read_byte()?;

        let a = arg.to_be_bytes();
        self.spi
            .write_all(&[0x40 | index, a[0], a[1], a[2], a[3], crc])?;

        for _ in 0..RESPONSE_POLLS {
            let r1 = self.spi.read_byte()?;
            if r1 & 0x80 == 0 {
                return Ok(r1);
            }
        }
        self.finish();
        Err(Error::NoResponse(index))
    }

    /// Deselect and give the card the trailing clocks it needs to release MISO.
    fn finish(&mut self) {
        self.cs.deselect();
        let _ = self.spi.read_byte();
    }

    pub fn free(self) -> (SpiBus<I, PINS>, ChipSelect<CP, CN>, gpio::Pin<DP, DN, Input<PullUp>>) {
        (self.spi, self.cs, self.detect)
    }
}

impl<I, PINS, const CP: char, const CN: u8, const DP: char, const DN: u8> BlockDevice
    for SdCard<I, PINS, CP, CN, DP, DN>
where
    I: spi::Instance,
    PINS: spi::Pins<I>,
{
    type Error = Error;

    fn read_block(&mut self, lba: u32, buf: &mut Block) -> Result<(), Error> {
        self.read(lba, buf)
    }
}

impl<I, PINS, const CP: char, const CN: u8, const DP: char, const DN: u8> MassStorageHost
    for SdCard<I, PINS, CP, CN, DP, DN>
where
    I: spi::Instance,
    PINS: spi::Pins<I>,
{
    fn poll(&mut self) -> Option<HostEvent> {
        let present = self.is_present();
        if present == self.present {
            return None;
        }
        self.present = present;
        self.addressing = None;
        if present {
            debug!("sd: card inserted");
            Some(HostEvent::Opened)
        } else {
            debug!("sd: card removed");
            Some(HostEvent::Closed)
        }
    }

    fn drive_ready(&mut self) -> bool {
        if self.is_initialized() {
            return true;
        }
        match self.init() {
            Ok(()) => true,
            Err(e) => {
                warn!("sd: init failed: {:?}", e);
                false
            }
        }
    }
}
