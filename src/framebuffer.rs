//! Display framebuffers used as DMA sources.

use as_slice::AsSlice;

pub const OLED_WIDTH: usize = 128;
pub const OLED_HEIGHT: usize = 64;
/// One bit per pixel, eight vertical pixels per byte.
pub const OLED_PIXEL_BYTES: usize = OLED_WIDTH * OLED_HEIGHT / 8;
/// SSD1306 control byte: everything after it is display RAM data.
pub const OLED_DATA_CONTROL: u8 = 0x40;

/// SSD1306 power-up sequence. Leading `0x00` marks the rest as commands.
pub static SSD1306_INIT: [u8; 25] = [
    0x00, //
    // clock divide, multiplex 64 rows
    0xD5, 0x80, 0xA8, 0x3F, //
    // display offset, start line, charge pump on
    0xD3, 0x00, 0x40, 0x8D, 0x14, //
    // horizontal addressing, segment remap, reverse COM scan
    0x20, 0x00, 0xA1, 0xC8, //
    // COM pins, contrast
    0xDA, 0x12, 0x81, 0x0A, //
    // precharge, VCOMH level
    0xD9, 0xF1, 0xDB, 0x40, //
    // resume from RAM, normal polarity, display on
    0xA4, 0xA6, 0xAF,
];

/// 128×64 monochrome frame, prefixed with the data control byte so a single
/// I2C session carries a whole frame.
pub struct OledFrame {
    bytes: [u8; 1 + OLED_PIXEL_BYTES],
}

impl OledFrame {
    pub const LEN: usize = 1 + OLED_PIXEL_BYTES;

    pub const fn new() -> Self {
        let mut bytes = [0; 1 + OLED_PIXEL_BYTES];
        bytes[0] = OLED_DATA_CONTROL;
        Self { bytes }
    }

    /// Display RAM: page-major, each byte a column of 8 pixels, LSB on top.
    pub fn pixels(&self) -> &[u8] {
        &self.bytes[1..]
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[1..]
    }

    /// Set every byte of display RAM to `pattern`.
    pub fn fill(&mut self, pattern: u8) {
        for b in self.pixels_mut() {
            *b = pattern;
        }
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, on: bool) {
        if x >= OLED_WIDTH || y >= OLED_HEIGHT {
            return;
        }
        let byte = &mut self.pixels_mut()[(y / 8) * OLED_WIDTH + x];
        let mask = 1u8 << (y % 8);
        if on {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<bool> {
        if x >= OLED_WIDTH || y >= OLED_HEIGHT {
            return None;
        }
        Some(self.pixels()[(y / 8) * OLED_WIDTH + x] & (1 << (y % 8)) != 0)
    }
}

impl Default for OledFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl AsSlice for OledFrame {
    type Element = u8;

    fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

pub const TFT_WIDTH: usize = 128;
pub const TFT_HEIGHT: usize = 128;
pub const TFT_PIXELS: usize = TFT_WIDTH * TFT_HEIGHT;

/// Pack 8-bit channels into RGB-565.
pub const fn rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3)
}

/// 128×128 RGB-565 frame, streamed as 16-bit words.
///
/// With 8-bit SPI frames, a 16-bit write to the data register goes out low
/// byte first. Pixels are stored byte-swapped so the panel sees the high byte
/// first.
pub struct TftFrame {
    words: [u16; TFT_PIXELS],
}

impl TftFrame {
    pub const fn new() -> Self {
        Self {
            words: [0; TFT_PIXELS],
        }
    }

    pub fn fill(&mut self, color: u16) {
        let word = color.swap_bytes();
        for w in self.words.iter_mut() {
            *w = word;
        }
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, color: u16) {
        if x < TFT_WIDTH && y < TFT_HEIGHT {
            self.words[y * TFT_WIDTH + x] = color.swap_bytes();
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u16> {
        if x < TFT_WIDTH && y < TFT_HEIGHT {
            Some(self.words[y * TFT_WIDTH + x].swap_bytes())
        } else {
            None
        }
    }
}

impl Default for TftFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl AsSlice for TftFrame {
    type Element = u16;

    fn as_slice(&self) -> &[u16] {
        &self.words
    }
}
