//! Typed DMA channel configuration.
//!
//! A [`TransferDescriptor`] carries every field of a memory-to-peripheral
//! transfer. It is validated as a whole before the first register write, so a
//! rejected descriptor never leaves a channel half-configured.

use crate::Error;

/// Largest element count the 16-bit `CNDTR` register can hold.
pub const MAX_TRANSFER_LEN: usize = u16::MAX as usize;

/// Size of one element moved per DMA beat.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ElementWidth {
    Bits8,
    Bits16,
    Bits32,
}

impl ElementWidth {
    pub const fn bytes(self) -> u32 {
        match self {
            ElementWidth::Bits8 => 1,
            ElementWidth::Bits16 => 2,
            ElementWidth::Bits32 => 4,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Priority {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl Priority {
    /// Value of the two-bit `PL` field.
    pub const fn bits(self) -> u8 {
        match self {
            Priority::Low => 0b00,
            Priority::Medium => 0b01,
            Priority::High => 0b10,
            Priority::VeryHigh => 0b11,
        }
    }
}

/// Whether the channel stops after `count` elements or wraps around.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    OneShot,
    Circular,
}

/// Channel control bits, i.e. everything in `CCR` except the enable bit.
///
/// The direction is always memory to peripheral: the DMA engine only ever
/// reads from memory the crate owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelConfig {
    pub width: ElementWidth,
    pub increment_source: bool,
    pub increment_destination: bool,
    pub mode: Mode,
    pub priority: Priority,
    pub complete_interrupt: bool,
}

impl ChannelConfig {
    /// Memory-to-peripheral, source increments, destination fixed.
    pub const fn mem2periph(width: ElementWidth, mode: Mode) -> Self {
        Self {
            width,
            increment_source: true,
            increment_destination: false,
            mode,
            priority: Priority::High,
            complete_interrupt: false,
        }
    }

    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub const fn with_complete_interrupt(mut self, enabled: bool) -> Self {
        self.complete_interrupt = enabled;
        self
    }

    pub const fn circular(&self) -> bool {
        matches!(self.mode, Mode::Circular)
    }
}

/// Full description of one transfer: where from, where to, how many.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransferDescriptor {
    pub source: u32,
    /// Always the peripheral data register.
    pub destination: u32,
    pub count: usize,
    pub config: ChannelConfig,
}

impl TransferDescriptor {
    pub const fn new(source: u32, destination: u32, count: usize, config: ChannelConfig) -> Self {
        Self {
            source,
            destination,
            count,
            config,
        }
    }

    /// Reject any combination the hardware can't represent.
    pub fn validate(&self) -> Result<(), Error> {
        self.config.validate()?;
        validate_addresses(self.source, self.destination, self.config.width)?;
        validate_count(self.count)?;
        Ok(())
    }
}

impl ChannelConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.increment_destination {
            return Err(Error::PeripheralIncrement);
        }
        Ok(())
    }
}

pub(crate) fn validate_count(count: usize) -> Result<u16, Error> {
    match count {
        0 => Err(Error::ZeroLength),
        n if n > MAX_TRANSFER_LEN => Err(Error::LengthOverflow),
        n => Ok(n as u16),
    }
}

pub(crate) fn validate_addresses(source: u32, destination: u32, width: ElementWidth) -> Result<(), Error> {
    let align = width.bytes();
    if source % align != 0 || destination % align != 0 {
        return Err(Error::Misaligned);
    }
    Ok(())
}
