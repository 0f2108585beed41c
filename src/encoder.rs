//! One-wire LED encoding over SPI.
//!
//! WS2812-style LEDs read each bit from the width of a high pulse. Clocking
//! SPI at ~6 MHz makes one SPI byte last one LED bit cell, so a byte with a
//! long run of leading ones reads as `1` and a short run as `0`. Each color
//! channel therefore expands to eight wire bytes, MSB first, and a frame ends
//! with a low period long enough for the strip to latch.

use as_slice::{AsMutSlice, AsSlice};

/// Wire byte for a logical `1`: ~1 µs high out of 1.33 µs at 6 MHz.
pub const LONG_HIGH: u8 = 0xFC;
/// Wire byte for a logical `0`: ~0.33 µs high.
pub const SHORT_HIGH: u8 = 0xC0;

pub const BYTES_PER_CHANNEL: usize = 8;
pub const BYTES_PER_LED: usize = 3 * BYTES_PER_CHANNEL;
/// Zero bytes appended to a frame; 64 × 1.33 µs is well past the latch time.
pub const RESET_BYTES: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    Red,
    Green,
    Blue,
}

/// Order the strip expects channels on the wire.
pub const fn channel_order() -> [Channel; 3] {
    [Channel::Green, Channel::Red, Channel::Blue]
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const OFF: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn channel(&self, channel: Channel) -> u8 {
        match channel {
            Channel::Red => self.r,
            Channel::Green => self.g,
            Channel::Blue => self.b,
        }
    }

    fn channel_mut(&mut self, channel: Channel) -> &mut u8 {
        match channel {
            Channel::Red => &mut self.r,
            Channel::Green => &mut self.g,
            Channel::Blue => &mut self.b,
        }
    }
}

pub fn encode_led_channel(value: u8) -> [u8; BYTES_PER_CHANNEL] {
    let mut out = [SHORT_HIGH; BYTES_PER_CHANNEL];
    for (i, byte) in out.iter_mut().enumerate() {
        if value & (0x80u8 >> i) != 0 {
            *byte = LONG_HIGH;
        }
    }
    out
}

/// Inverse of [`encode_led_channel`]. Anything but `SHORT_HIGH` reads as `1`.
pub fn decode_led_channel(wire: &[u8]) -> u8 {
    wire.iter()
        .take(BYTES_PER_CHANNEL)
        .enumerate()
        .filter(|&(_, &b)| b != SHORT_HIGH)
        .fold(0u8, |acc, (i, _)| acc | (0x80u8 >> i))
}

/// The latch period terminating a frame.
pub fn reset_pulse(min_low_bytes: usize) -> core::iter::Take<core::iter::Repeat<u8>> {
    core::iter::repeat(0x00).take(min_low_bytes)
}

pub fn encode_color(color: Color) -> [u8; BYTES_PER_LED] {
    let mut out = [0; BYTES_PER_LED];
    for (dst, channel) in out.chunks_mut(BYTES_PER_CHANNEL).zip(channel_order().iter()) {
        dst.copy_from_slice(&encode_led_channel(color.channel(*channel)));
    }
    out
}

pub fn decode_color(wire: &[u8]) -> Color {
    let mut color = Color::OFF;
    for (src, channel) in wire.chunks(BYTES_PER_CHANNEL).zip(channel_order().iter()) {
        *color.channel_mut(*channel) = decode_led_channel(src);
    }
    color
}

/// Buffer length for a strip of `leds` LEDs, latch period included.
pub const fn strip_len(leds: usize) -> usize {
    leds * BYTES_PER_LED + RESET_BYTES
}

/// Byte range of LED `index`, or `None` if it can't be addressed.
fn led_range(index: usize) -> Option<core::ops::Range<usize>> {
    let base = index.checked_mul(BYTES_PER_LED)?;
    Some(base..base.checked_add(BYTES_PER_LED)?)
}

/// Wire buffer for a whole strip: `N` is [`strip_len`] of the LED count.
///
/// Streamed with a circular DMA transfer; updating colors while it runs
/// may tear a frame, which the next pass repairs.
pub struct LedStrip<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> LedStrip<N> {
    /// A strip with every LED off.
    pub const fn new() -> Self {
        assert!(N >= RESET_BYTES && (N - RESET_BYTES) % BYTES_PER_LED == 0);
        let mut bytes = [0; N];
        let mut i = 0;
        while i < N - RESET_BYTES {
            bytes[i] = SHORT_HIGH;
            i += 1;
        }
        Self { bytes }
    }

    pub const fn led_count(&self) -> usize {
        (N - RESET_BYTES) / BYTES_PER_LED
    }

    /// Out-of-range indices are ignored.
    pub fn set_color(&mut self, index: usize, color: Color) {
        if let Some(dst) = led_range(index).and_then(|r| self.leds_mut().get_mut(r)) {
            dst.copy_from_slice(&encode_color(color));
        }
    }

    /// Decode the color currently in the buffer for LED `index`.
    pub fn color(&self, index: usize) -> Option<Color> {
        led_range(index)
            .and_then(|r| self.leds().get(r))
            .map(decode_color)
    }

    pub fn fill(&mut self, color: Color) {
        let encoded = encode_color(color);
        for dst in self.leds_mut().chunks_mut(BYTES_PER_LED) {
            dst.copy_from_slice(&encoded);
        }
    }

    fn leds(&self) -> &[u8] {
        &self.bytes[..N - RESET_BYTES]
    }

    fn leds_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[..N - RESET_BYTES]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl<const N: usize> Default for LedStrip<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> AsSlice for LedStrip<N> {
    type Element = u8;

    fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl<const N: usize> AsMutSlice for LedStrip<N> {
    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}
