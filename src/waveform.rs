//! Sine lookup table for the DAC tone demo.
//!
//! The DAC is fed one sample per trigger-timer tick from a circular DMA
//! transfer, so the tone frequency is set by the timer alone.

/// Samples per period.
pub const SINE_SAMPLES: usize = 32;

/// Amplitude divisor applied to the full-scale table. Keeps the buzzer quiet.
pub const AMPLITUDE_DIV: u16 = 8;

/// One period of a sine over the full 12-bit DAC range.
pub const SINE_FULL_SCALE: [u16; SINE_SAMPLES] = [
    2048, 2447, 2831, 3185, 3495, 3750, 3939, 4056, //
    4095, 4056, 3939, 3750, 3495, 3185, 2831, 2447, //
    2048, 1649, 1265, 911, 601, 346, 157, 40, //
    0, 40, 157, 346, 601, 911, 1265, 1649,
];

/// 12-bit right-aligned DAC codes, evaluated at compile time.
pub static SINE_WAVE: [u16; SINE_SAMPLES] = scale(&SINE_FULL_SCALE, AMPLITUDE_DIV);

/// Divide every sample by `div`, truncating.
pub const fn scale<const N: usize>(table: &[u16; N], div: u16) -> [u16; N] {
    let mut out = [0; N];
    let mut i = 0;
    while i < N {
        out[i] = table[i] / div;
        i += 1;
    }
    out
}

/// Trigger timer reload value for `frequency` Hz with `samples` per period.
///
/// Integer division truncates, so the tone comes out slightly sharp; that
/// matches what the hardware has always been programmed with.
pub const fn timer_period(core_clock: u32, frequency: u32, samples: u32) -> u32 {
    core_clock / (frequency * samples)
}

/// Tone frequency a given reload value actually produces, in Hz (truncated).
pub const fn output_frequency(core_clock: u32, period: u32, samples: u32) -> u32 {
    core_clock / (period * samples)
}
