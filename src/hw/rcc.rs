//! System clock from the PLL.

use super::pac;
use crate::{spin_wait, Error};

const HSI_DIV2: u32 = 4_000_000;

/// `PPRE1` value dividing HCLK by 2.
const APB_DIV2: u8 = 0b100;
/// `SW`/`SWS` value for the PLL.
const SYSCLK_PLL: u8 = 0b10;

/// Polls per flag before giving up on the clock tree.
const CLOCK_DEADLINE: Option<u32> = Some(100_000);

/// Run SYSCLK from `HSI / 2 * mul` (`mul` in `2..=16`). Returns the new core
/// clock in Hz, or `Timeout` if the PLL never locks or the switch doesn't
/// take.
pub fn use_pll(rcc: &pac::RCC, flash: &pac::FLASH, mul: u32) -> Result<u32, Error> {
    let sysclk = HSI_DIV2 * mul;

    let latency = match sysclk {
        0..=24_000_000 => 0,
        24_000_001..=48_000_000 => 1,
        _ => 2,
    };
    flash.acr.modify(|_, w| unsafe { w.latency().bits(latency) });

    // APB1 tops out at 36 MHz
    let ppre1 = if sysclk > 36_000_000 { APB_DIV2 } else { 0 };
    rcc.cfgr.modify(|_, w| unsafe {
        w.pllsrc()
            .clear_bit()
            .pllmul()
            .bits((mul - 2) as u8)
            .ppre1()
            .bits(ppre1)
    });

    rcc.cr.modify(|_, w| w.pllon().set_bit());
    spin_wait(CLOCK_DEADLINE, || Ok(rcc.cr.read().pllrdy().bit_is_set()))?;

    rcc.cfgr.modify(|_, w| unsafe { w.sw().bits(SYSCLK_PLL) });
    spin_wait(CLOCK_DEADLINE, || Ok(rcc.cfgr.read().sws().bits() == SYSCLK_PLL))?;

    Ok(sysclk)
}
