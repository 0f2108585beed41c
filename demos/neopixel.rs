//! Cycles a 90-LED WS2812 strip through a rainbow.
//!
//! SPI1 MOSI (PB5) clocks the encoded color buffer out at 6 MHz from a
//! circular DMA transfer. The main loop rewrites colors in place while the
//! transfer keeps running.

#![no_std]
#![no_main]

use cortex_m_rt::entry;
use cortex_m_semihosting::hprintln;
use dma_stream::encoder::{strip_len, Color, LedStrip};
use dma_stream::hw::spi::{BaudDiv, SpiConfig, SpiTx};
use dma_stream::hw::{dma::Channels, pac, rcc};
use dma_stream::{ChannelConfig, DmaController, ElementWidth, Mode, Peripheral, Transfer};

const NUM_LEDS: usize = 90;
/// Brightness ceiling, out of 255.
const MAX_B: u8 = 63;
const B_INC: u8 = 1;

static mut COLORS: LedStrip<{ strip_len(NUM_LEDS) }> = LedStrip::new();

/// Red -> purple -> blue -> teal -> green -> yellow -> red, one step per LED,
/// starting from whatever LED 0 currently shows.
fn rainbow(strip: &mut LedStrip<{ strip_len(NUM_LEDS) }>) {
    let Color { mut r, mut g, mut b } = strip.color(0).unwrap_or(Color::OFF);
    for i in 0..NUM_LEDS {
        if r == 0 && g == 0 && b == 0 {
            r = B_INC;
        }
        if r > 0 && r < MAX_B && b == 0 {
            r += B_INC;
        } else if r >= MAX_B && b < MAX_B && g == 0 {
            b += B_INC;
        } else if b >= MAX_B && r > 0 {
            r -= B_INC;
        } else if b >= MAX_B && g < MAX_B {
            g += B_INC;
        } else if g >= MAX_B && b > 0 {
            b -= B_INC;
        } else if g >= MAX_B && r < MAX_B {
            r += B_INC;
        } else if r >= MAX_B && g > 0 {
            g -= B_INC;
        } else {
            r = 0;
            g = 0;
            b = 0;
        }
        strip.set_color(i, Color::rgb(r, g, b));
    }
}

#[entry]
fn main() -> ! {
    let dp = pac::Peripherals::take().unwrap();

    // 48 MHz, so SPI1 / 8 = 6 MHz: one SPI byte per LED bit cell
    let sysclk = rcc::use_pll(&dp.RCC, &dp.FLASH, 12).unwrap();

    // PB5: AF5 (SPI1 MOSI)
    dp.RCC.ahbenr.modify(|_, w| w.iopben().enabled());
    dp.GPIOB.moder.modify(|_, w| w.moder5().alternate());
    dp.GPIOB.afrl.modify(|_, w| w.afrl5().af5());

    let channels = Channels::new(dp.DMA1, &dp.RCC);
    let mut spi = SpiTx::new(
        dp.SPI1,
        &dp.RCC,
        SpiConfig {
            baud: BaudDiv::Div8,
            mode3: true,
        },
    );

    let strip = unsafe { &mut COLORS };
    let config = ChannelConfig::mem2periph(ElementWidth::Bits8, Mode::Circular);
    let dma = DmaController::new(channels.ch3, config).unwrap();
    let mut transfer = Transfer::start(dma, strip, &spi).unwrap();
    spi.enable_requests();

    hprintln!("neopixel: {} LEDs at {} Hz core clock", NUM_LEDS, sysclk).unwrap();

    loop {
        transfer.modify(|strip| rainbow(strip)).unwrap();
        cortex_m::asm::delay(10_000);
    }
}
