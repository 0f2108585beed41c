//! Pushes a 128×128 RGB-565 framebuffer to an ILI9163C panel.
//!
//! The init commands go out byte by byte with busy-polling; after that SPI1
//! only carries pixel data, streamed by a circular DMA transfer.
//!
//! Pins: PB3 SCK, PB5 MOSI (AF5), PB4 CS, PB6 reset, PB7 data/command.

#![no_std]
#![no_main]

use cortex_m_rt::entry;
use cortex_m_semihosting::hprintln;
use dma_stream::framebuffer::TftFrame;
use dma_stream::hw::spi::{BaudDiv, SpiConfig, SpiTx};
use dma_stream::hw::{dma::Channels, pac, rcc};
use dma_stream::{ChannelConfig, DmaController, ElementWidth, Error, Mode, Peripheral, Transfer};

#[derive(Clone, Copy)]
enum Pin {
    /// PB4
    Cs,
    /// PB6
    Rst,
    /// PB7, high for data, low for commands
    Dc,
}

/// Polls per status flag before giving up on the panel.
const SPI_DEADLINE: Option<u32> = Some(100_000);

static mut FRAMEBUFFER: TftFrame = TftFrame::new();

fn set_pin(gpiob: &pac::GPIOB, pin: Pin, high: bool) {
    gpiob.bsrr.write(|w| match (pin, high) {
        (Pin::Cs, true) => w.bs4().set_bit(),
        (Pin::Cs, false) => w.br4().set_bit(),
        (Pin::Rst, true) => w.bs6().set_bit(),
        (Pin::Rst, false) => w.br6().set_bit(),
        (Pin::Dc, true) => w.bs7().set_bit(),
        (Pin::Dc, false) => w.br7().set_bit(),
    });
}

/// Switch the D/C line once the previous byte has left the shifter.
fn data_mode(spi: &SpiTx, gpiob: &pac::GPIOB, data: bool) -> Result<(), Error> {
    spi.wait_idle(SPI_DEADLINE)?;
    set_pin(gpiob, Pin::Dc, data);
    Ok(())
}

fn init_panel(spi: &mut SpiTx, gpiob: &pac::GPIOB) -> Result<(), Error> {
    set_pin(gpiob, Pin::Cs, false);

    data_mode(spi, gpiob, false)?;
    // software reset
    spi.write_u8(0x01, SPI_DEADLINE)?;
    cortex_m::asm::delay(200_000);
    // display off
    spi.write_u8(0x28, SPI_DEADLINE)?;
    // 16 bits per pixel
    spi.write_u8(0x3A, SPI_DEADLINE)?;
    data_mode(spi, gpiob, true)?;
    spi.write_u8(0x55, SPI_DEADLINE)?;
    // exit sleep, display on
    data_mode(spi, gpiob, false)?;
    spi.write_u8(0x11, SPI_DEADLINE)?;
    cortex_m::asm::delay(200_000);
    spi.write_u8(0x29, SPI_DEADLINE)?;
    cortex_m::asm::delay(200_000);

    // The panels are offset by a few pixels: columns [2:129], rows [1:128].
    spi.write_u8(0x2A, SPI_DEADLINE)?;
    data_mode(spi, gpiob, true)?;
    spi.write_u16(0x0200, SPI_DEADLINE)?;
    spi.write_u16(0x8100, SPI_DEADLINE)?;
    data_mode(spi, gpiob, false)?;
    spi.write_u8(0x2B, SPI_DEADLINE)?;
    data_mode(spi, gpiob, true)?;
    spi.write_u16(0x0100, SPI_DEADLINE)?;
    spi.write_u16(0x8000, SPI_DEADLINE)?;
    data_mode(spi, gpiob, false)?;

    // write to RAM; pixel data only from here on
    spi.write_u8(0x2C, SPI_DEADLINE)?;
    data_mode(spi, gpiob, true)
}

#[entry]
fn main() -> ! {
    let dp = pac::Peripherals::take().unwrap();

    let sysclk = rcc::use_pll(&dp.RCC, &dp.FLASH, 16).unwrap();

    dp.RCC.ahbenr.modify(|_, w| w.iopben().enabled());
    let gpiob = &dp.GPIOB;
    // PB3/PB5 alternate function, PB4/PB6/PB7 outputs
    gpiob.moder.modify(|_, w| {
        w.moder3()
            .alternate()
            .moder4()
            .output()
            .moder5()
            .alternate()
            .moder6()
            .output()
            .moder7()
            .output()
    });
    gpiob.afrl.modify(|_, w| w.afrl3().af5().afrl5().af5());
    set_pin(gpiob, Pin::Dc, false);
    set_pin(gpiob, Pin::Cs, true);
    set_pin(gpiob, Pin::Rst, true);

    let channels = Channels::new(dp.DMA1, &dp.RCC);
    let fb = unsafe { &mut FRAMEBUFFER };
    let config = ChannelConfig::mem2periph(ElementWidth::Bits16, Mode::Circular);
    let dma = DmaController::new(channels.ch3, config).unwrap();

    // hardware reset pulse
    set_pin(gpiob, Pin::Rst, false);
    cortex_m::asm::delay(200_000);
    set_pin(gpiob, Pin::Rst, true);

    let mut spi = SpiTx::new(
        dp.SPI1,
        &dp.RCC,
        SpiConfig {
            baud: BaudDiv::Div4,
            mode3: true,
        },
    );

    if let Err(e) = init_panel(&mut spi, gpiob) {
        hprintln!("tft: init failed: {:?}", e).unwrap();
    }

    // the init bytes bypass DMA; the channel only starts now
    let mut transfer = Transfer::start(dma, fb, &spi).unwrap();
    spi.enable_requests();

    hprintln!("tft: streaming at {} Hz core clock", sysclk).unwrap();

    // alternate solid colors to get a feel for the refresh rate
    let mut color: u16 = 0x1984;
    loop {
        transfer.modify(|fb| fb.fill(color)).unwrap();
        color ^= 0xFFFF;
        cortex_m::asm::delay(2_500_000);
    }
}
