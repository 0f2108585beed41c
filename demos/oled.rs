//! Streams a 128×64 framebuffer to an SSD1306 over I2C1 (PB6 SCL, PB7 SDA).
//!
//! DMA1 channel 6 first sends the init command block as a one-shot transfer,
//! then the same channel is re-armed over the framebuffer in circular mode.
//! A frame is 1025 bytes but I2C can only count 255 at a time, so the I2C
//! interrupt reloads the byte counter until the frame is out. The main loop
//! draws into the framebuffer and kicks off the next frame.
//!
//! Only the chunk state machine and the I2C handle are shared with the
//! interrupt. Drawing and rewinding the DMA channel happen in the main loop,
//! so critical sections stay a few register accesses long.

#![no_std]
#![no_main]

use core::cell::RefCell;

use cortex_m::interrupt::{self, Mutex};
use cortex_m::peripheral::NVIC;
use cortex_m_rt::entry;
use cortex_m_semihosting::hprintln;
use dma_stream::chunked::I2C_CHUNK_CAP;
use dma_stream::framebuffer::{OledFrame, SSD1306_INIT};
use dma_stream::hw::dma::Channels;
use dma_stream::hw::i2c::{I2cTx, TIMING_400K_8MHZ};
use dma_stream::hw::pac::{self, interrupt, Interrupt};
use dma_stream::{
    ChannelConfig, ChunkedTransfer, DmaController, ElementWidth, Mode, Peripheral, ReloadPeripheral,
    Service, Transfer,
};

/// 0x3C in 8-bit form. Some modules answer on 0x7A instead.
const OLED_ADDR: u8 = 0x78;
const DEADLINE: Option<u32> = Some(1_000_000);

static mut FRAME: OledFrame = OledFrame::new();

/// State the I2C interrupt works on.
struct Bus {
    i2c: I2cTx,
    stream: ChunkedTransfer,
    /// Set when a frame was dropped mid-way; the DMA cursor must be rewound
    /// before the next frame.
    rewind: bool,
    frames: u32,
    dropped: u32,
}

static BUS: Mutex<RefCell<Option<Bus>>> = Mutex::new(RefCell::new(None));

/// Failures seen by the main loop.
#[derive(Default)]
struct Faults {
    draw: u32,
    rewind: u32,
    start: u32,
}

#[entry]
fn main() -> ! {
    let dp = pac::Peripherals::take().unwrap();

    // PB6/PB7: AF4, open drain
    dp.RCC.ahbenr.modify(|_, w| w.iopben().enabled());
    dp.GPIOB
        .moder
        .modify(|_, w| w.moder6().alternate().moder7().alternate());
    dp.GPIOB
        .otyper
        .modify(|_, w| w.ot6().open_drain().ot7().open_drain());
    dp.GPIOB.afrl.modify(|_, w| w.afrl6().af4().afrl7().af4());

    let channels = Channels::new(dp.DMA1, &dp.RCC);
    let mut i2c = I2cTx::new(dp.I2C1, &dp.RCC, TIMING_400K_8MHZ, OLED_ADDR);

    // init commands: one bounded transfer
    let config = ChannelConfig::mem2periph(ElementWidth::Bits8, Mode::OneShot);
    let dma = DmaController::new(channels.ch6, config).unwrap();
    let mut init = Transfer::start(dma, &SSD1306_INIT, &i2c).unwrap();
    i2c.enable_requests();
    i2c.start(SSD1306_INIT.len() as u8, false);
    let sent = init
        .wait(DEADLINE)
        .and_then(|_| i2c.wait_complete(DEADLINE));
    i2c.stop();
    if let Err(e) = sent.and_then(|_| i2c.wait_idle(DEADLINE)) {
        hprintln!("oled: init block failed: {:?}", e).unwrap();
    }

    // same channel, new role: stream the framebuffer
    let (mut dma, _) = init.stop();
    dma.configure(ChannelConfig::mem2periph(ElementWidth::Bits8, Mode::Circular))
        .unwrap();
    let frame = unsafe { &mut FRAME };
    let mut transfer = Transfer::start(dma, frame, &i2c).unwrap();

    let mut stream = ChunkedTransfer::new(I2C_CHUNK_CAP).unwrap();
    i2c.listen();
    stream.start(&mut i2c, OledFrame::LEN).unwrap();

    interrupt::free(|cs| {
        BUS.borrow(cs).replace(Some(Bus {
            i2c,
            stream,
            rewind: false,
            frames: 0,
            dropped: 0,
        }));
    });
    unsafe {
        NVIC::unmask(Interrupt::I2C1_EV_EXTI23);
        NVIC::unmask(Interrupt::I2C1_ER);
    }

    hprintln!("oled: streaming {} byte frames", OledFrame::LEN).unwrap();

    // Each byte is a column of 8 pixels, so a uniform fill draws horizontal
    // lines of varying thickness.
    let mut pattern: u8 = 0x00;
    let mut faults = Faults::default();
    let mut reported = 0;
    loop {
        if transfer.modify(|f| f.fill(pattern)).is_err() {
            faults.draw += 1;
        }

        // (bus idle, rewind needed, frames, dropped)
        let (idle, rewind, frames, dropped) = interrupt::free(|cs| {
            match BUS.borrow(cs).borrow_mut().as_mut() {
                Some(bus) => {
                    let idle = !bus.stream.is_active() && !bus.i2c.is_busy();
                    let rewind = idle && bus.rewind;
                    if rewind {
                        bus.rewind = false;
                    }
                    (idle, rewind, bus.frames, bus.dropped)
                }
                None => (false, false, 0, 0),
            }
        });

        if idle {
            // no session open, so the channel sees no requests while it moves
            if rewind && transfer.restart().is_err() {
                faults.rewind += 1;
            }
            let started = interrupt::free(|cs| match BUS.borrow(cs).borrow_mut().as_mut() {
                Some(bus) => bus.stream.start(&mut bus.i2c, OledFrame::LEN),
                None => Ok(()),
            });
            if started.is_err() {
                faults.start += 1;
            }
        }

        if frames.wrapping_sub(reported) >= 256 {
            reported = frames;
            hprintln!(
                "oled: {} frames, {} dropped, faults: draw {} rewind {} start {}",
                frames,
                dropped,
                faults.draw,
                faults.rewind,
                faults.start
            )
            .ok();
        }

        pattern = pattern.wrapping_add(1);
        cortex_m::asm::delay(200_000);
    }
}

/// Reload the byte counter, finish a frame, or drop it on a bus error.
fn service_bus() {
    interrupt::free(|cs| {
        if let Some(bus) = BUS.borrow(cs).borrow_mut().as_mut() {
            match bus.stream.service(&mut bus.i2c) {
                Ok(Service::FrameDone) => bus.frames += 1,
                Ok(_) => {}
                Err(_) => {
                    bus.dropped += 1;
                    bus.rewind = true;
                }
            }
        }
    });
}

#[interrupt]
fn I2C1_EV_EXTI23() {
    service_bus();
}

#[interrupt]
fn I2C1_ER() {
    service_bus();
}
