//! Streaming in-memory buffers to serial peripherals with DMA.
//!
//! The crate covers the part of peripheral demos that is more than register
//! setup: encoding values into a wire format, arming a DMA channel over a
//! buffer that stays put in memory, and keeping a bus session alive across
//! peripherals whose byte counter is shorter than the buffer.
//!
//! | Module | Purpose |
//! | ------ | ------- |
//! | [`encoder`] | One-wire LED bit encoding over SPI, LED strip buffer |
//! | [`waveform`] | Sine lookup table and trigger timer period |
//! | [`framebuffer`] | OLED / TFT framebuffers as DMA sources |
//! | [`config`] | Typed transfer descriptor and its validation |
//! | [`channel`] | Register-surface traits for DMA channels and peripherals |
//! | [`controller`] | Channel lifecycle and the buffer-owning `Transfer` |
//! | [`chunked`] | Reload state machine for length-limited peripherals |
//! | `hw` | STM32F303 implementations (ARM targets only) |

#![cfg_attr(not(test), no_std)]

#[cfg(all(target_arch = "arm", target_os = "none"))]
use panic_semihosting as _;

pub mod channel;
pub mod chunked;
pub mod config;
pub mod controller;
pub mod encoder;
pub mod framebuffer;
mod traits;
pub mod waveform;

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod hw;

#[cfg(test)]
mod sim;

pub use channel::{DmaChannel, Peripheral, ReloadPeripheral};
pub use chunked::{Chunk, ChunkCursor, ChunkedTransfer, Service, State, Step};
pub use config::{ChannelConfig, ElementWidth, Mode, Priority, TransferDescriptor};
pub use controller::{DmaController, Rejected, Transfer};
pub use traits::{DmaReadBuffer, DmaWord};

/// Errors from the transfer layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Element count doesn't fit the channel's length register.
    LengthOverflow,
    ZeroLength,
    /// Address not aligned to the element width.
    Misaligned,
    /// Buffer word size differs from the configured element width.
    WidthMismatch,
    /// Chunk cap must be within `1..=255`.
    InvalidChunkCap,
    /// Memory-to-peripheral transfers must not increment the destination.
    PeripheralIncrement,
    /// Channel enabled before a source, destination and length were set.
    NotArmed,
    /// Operation not allowed while a transfer is in flight.
    Busy,
    /// The DMA engine flagged a transfer error.
    TransferError,
    /// The peripheral dropped the bus session (missed reload deadline).
    BusError,
    /// A spin-wait ran past its deadline.
    Timeout,
}

/// Busy-poll `poll` until it returns `Ok(true)`.
///
/// `deadline` bounds the number of polls; `None` spins for as long as the
/// hardware takes.
pub fn spin_wait<F>(deadline: Option<u32>, mut poll: F) -> Result<(), Error>
where
    F: FnMut() -> Result<bool, Error>,
{
    let mut polls: u32 = 0;
    loop {
        if poll()? {
            return Ok(());
        }
        if let Some(limit) = deadline {
            polls += 1;
            if polls >= limit {
                return Err(Error::Timeout);
            }
        }
        core::hint::spin_loop();
    }
}
