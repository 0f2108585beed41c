//! SPI1 as a transmit-only DMA sink.

use core::ptr;

use super::pac;
use crate::channel::Peripheral;
use crate::{spin_wait, Error};

/// `f_PCLK / 2^(n + 1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BaudDiv {
    Div2 = 0,
    Div4 = 1,
    Div8 = 2,
    Div16 = 3,
    Div32 = 4,
    Div64 = 5,
    Div128 = 6,
    Div256 = 7,
}

/// Master, software chip select, 8-bit frames, MSB first.
#[derive(Clone, Copy, Debug)]
pub struct SpiConfig {
    pub baud: BaudDiv,
    /// CPOL = CPHA = 1.
    pub mode3: bool,
}

/// `DS` value for 8-bit data frames.
const FRAME_8BIT: u8 = 0b0111;

pub struct SpiTx {
    spi: pac::SPI1,
}

impl SpiTx {
    pub fn new(spi: pac::SPI1, rcc: &pac::RCC, config: SpiConfig) -> Self {
        rcc.apb2enr.modify(|_, w| w.spi1en().set_bit());

        // all fields at once, then enable
        spi.cr1.write(|w| unsafe {
            w.br()
                .bits(config.baud as u8)
                .cpol()
                .bit(config.mode3)
                .cpha()
                .bit(config.mode3)
                .mstr()
                .set_bit()
                .ssm()
                .set_bit()
                .ssi()
                .set_bit()
        });
        spi.cr2
            .write(|w| unsafe { w.ds().bits(FRAME_8BIT).frxth().set_bit() });
        spi.cr1.modify(|_, w| w.spe().set_bit());

        Self { spi }
    }

    fn dr(&self) -> *mut u8 {
        &self.spi.dr as *const _ as *mut u8
    }

    fn tx_empty(&self) -> bool {
        self.spi.sr.read().txe().bit_is_set()
    }

    /// Queue one byte once the TX buffer has room.
    pub fn write_u8(&mut self, byte: u8, deadline: Option<u32>) -> Result<(), Error> {
        spin_wait(deadline, || Ok(self.tx_empty()))?;
        // byte access, otherwise the data register packs two frames
        unsafe { ptr::write_volatile(self.dr(), byte) };
        Ok(())
    }

    /// Queue two frames; the low byte goes out first.
    pub fn write_u16(&mut self, word: u16, deadline: Option<u32>) -> Result<(), Error> {
        spin_wait(deadline, || Ok(self.tx_empty()))?;
        unsafe { ptr::write_volatile(self.dr() as *mut u16, word) };
        Ok(())
    }

    /// Wait for the shifter to drain.
    pub fn wait_idle(&self, deadline: Option<u32>) -> Result<(), Error> {
        spin_wait(deadline, || Ok(self.spi.sr.read().bsy().bit_is_clear()))
    }
}

unsafe impl Peripheral for SpiTx {
    fn data_register(&self) -> u32 {
        &self.spi.dr as *const _ as u32
    }

    fn enable_requests(&mut self) {
        self.spi.cr2.modify(|_, w| w.txdmaen().set_bit());
    }

    fn disable_requests(&mut self) {
        self.spi.cr2.modify(|_, w| w.txdmaen().clear_bit());
    }
}
