//! Hardware seams.
//!
//! [`DmaChannel`] is the register surface of one DMA channel. The controller
//! and the chunked state machine only ever talk to hardware through it, which
//! is what lets them run against a simulated channel in tests.

use crate::config::ChannelConfig;

/// Register-level access to a single DMA channel.
pub trait DmaChannel {
    /// Write every `CCR` field except `EN`. Only called while disabled.
    fn write_config(&mut self, config: &ChannelConfig);

    fn set_paddr(&mut self, addr: u32);

    fn set_maddr(&mut self, addr: u32);

    fn set_ndt(&mut self, len: u16);

    /// Elements left before the channel stops or wraps around.
    fn ndt(&self) -> u16;

    fn enable(&mut self);

    fn disable(&mut self);

    fn is_enabled(&self) -> bool;

    fn transfer_complete(&self) -> bool;

    fn transfer_error(&self) -> bool;

    /// Clear all of this channel's interrupt flags.
    fn clear_flags(&mut self);
}

/// A peripheral that consumes DMA data from a fixed register.
///
/// # Safety
///
/// `data_register` must return the address of a register of this
/// peripheral that accepts DMA writes of the configured width, and it must
/// return the same address every time.
pub unsafe trait Peripheral {
    /// Address of the data register the channel writes to.
    fn data_register(&self) -> u32;

    /// Start issuing DMA requests (trigger or TX-empty requests).
    fn enable_requests(&mut self);

    fn disable_requests(&mut self);
}

/// A peripheral with a hardware byte counter that has to be reloaded to keep
/// a bus session open past `cap` bytes (I2C `NBYTES` + `RELOAD`).
pub trait ReloadPeripheral {
    /// Begin a session with `first` bytes in the counter. `more` keeps the
    /// session open once the counter hits zero.
    fn start(&mut self, first: u8, more: bool);

    /// Write the next chunk length. Must happen before the counter expires.
    fn reload(&mut self, next: u8, more: bool);

    /// Close the bus session.
    fn stop(&mut self);

    /// Counter expired with reload requested (`TCR`).
    fn reload_pending(&self) -> bool;

    /// Counter expired without reload (`TC`).
    fn complete(&self) -> bool;

    /// Bus error, arbitration loss or NACK: the session was dropped.
    fn bus_error(&self) -> bool;

    fn clear_errors(&mut self);
}
