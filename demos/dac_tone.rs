//! Plays a 440 Hz sine on PA4 (DAC1 CH1).
//!
//! TIM6 paces the DAC; each trigger pulls the next sample from a circular
//! DMA transfer over the sine table, so the core does nothing once started.

#![no_std]
#![no_main]

use cortex_m_rt::entry;
use cortex_m_semihosting::hprintln;
use dma_stream::hw::{dac::DacTone, dma::Channels, pac};
use dma_stream::waveform::{self, SINE_SAMPLES, SINE_WAVE};
use dma_stream::{
    ChannelConfig, DmaController, ElementWidth, Mode, Peripheral, Priority, Transfer,
};

/// HSI after reset.
const CORE_CLOCK: u32 = 8_000_000;
const TONE_HZ: u32 = 440;

#[entry]
fn main() -> ! {
    let dp = pac::Peripherals::take().unwrap();

    // PA4: analog
    dp.RCC.ahbenr.modify(|_, w| w.iopaen().enabled());
    dp.GPIOA.moder.modify(|_, w| w.moder4().analog());

    let channels = Channels::new(dp.DMA1, &dp.RCC);
    let mut dac = DacTone::new(dp.DAC1, dp.TIM6, &dp.SYSCFG, &dp.RCC);

    // a late sample is an audible click, so the DAC wins arbitration
    let config = ChannelConfig::mem2periph(ElementWidth::Bits16, Mode::Circular)
        .with_priority(Priority::VeryHigh);
    let dma = DmaController::new(channels.ch3, config).unwrap();
    // primed, but idle until the DAC trigger is enabled
    let _transfer = Transfer::start(dma, &SINE_WAVE, &dac).unwrap();

    let period = waveform::timer_period(CORE_CLOCK, TONE_HZ, SINE_SAMPLES as u32);
    dac.start_timer(period as u16);
    dac.enable_channel();
    cortex_m::asm::delay(1000);
    dac.enable_requests();

    hprintln!(
        "tone: TIM6 ARR = {} (~{} Hz)",
        period,
        waveform::output_frequency(CORE_CLOCK, period, SINE_SAMPLES as u32)
    )
    .unwrap();

    loop {
        continue;
    }
}
