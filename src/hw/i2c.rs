//! I2C1 as a transmit-only DMA sink with `NBYTES` reload.

use super::pac;
use crate::channel::{Peripheral, ReloadPeripheral};
use crate::{spin_wait, Error};

/// `TIMINGR` fields, see the reference manual's timing tables.
#[derive(Clone, Copy, Debug)]
pub struct Timing {
    pub presc: u8,
    pub scldel: u8,
    pub sdadel: u8,
    pub sclh: u8,
    pub scll: u8,
}

/// Fast mode (400 kHz) with an 8 MHz HSI kernel clock.
pub const TIMING_400K_8MHZ: Timing = Timing {
    presc: 0,
    scldel: 3,
    sdadel: 1,
    sclh: 3,
    scll: 9,
};

pub struct I2cTx {
    i2c: pac::I2C1,
    /// 8-bit form, i.e. the 7-bit address shifted left by one.
    address: u8,
}

impl I2cTx {
    pub fn new(i2c: pac::I2C1, rcc: &pac::RCC, timing: Timing, address: u8) -> Self {
        rcc.apb1enr.modify(|_, w| w.i2c1en().set_bit());

        i2c.timingr.write(|w| unsafe {
            w.presc()
                .bits(timing.presc)
                .scldel()
                .bits(timing.scldel)
                .sdadel()
                .bits(timing.sdadel)
                .sclh()
                .bits(timing.sclh)
                .scll()
                .bits(timing.scll)
        });
        i2c.cr1.modify(|_, w| w.pe().set_bit());

        Self { i2c, address }
    }

    /// Interrupt on `TCR`/`TC`, bus errors and NACK.
    pub fn listen(&mut self) {
        self.i2c
            .cr1
            .modify(|_, w| w.tcie().set_bit().errie().set_bit().nackie().set_bit());
    }

    pub fn is_busy(&self) -> bool {
        self.i2c.isr.read().busy().bit_is_set()
    }

    /// Spin until the last session has released the bus.
    pub fn wait_idle(&self, deadline: Option<u32>) -> Result<(), Error> {
        spin_wait(deadline, || Ok(!self.is_busy()))
    }

    /// Spin until a non-reload session has shifted out its last byte.
    pub fn wait_complete(&self, deadline: Option<u32>) -> Result<(), Error> {
        spin_wait(deadline, || {
            if self.bus_error() {
                return Err(Error::BusError);
            }
            Ok(self.complete())
        })
    }
}

impl ReloadPeripheral for I2cTx {
    fn start(&mut self, first: u8, more: bool) {
        let address = self.address as u16;
        self.i2c.cr2.modify(|_, w| unsafe {
            w.sadd()
                .bits(address)
                .rd_wrn()
                .clear_bit()
                .nbytes()
                .bits(first)
                .reload()
                .bit(more)
                .autoend()
                .clear_bit()
                .start()
                .set_bit()
        });
    }

    fn reload(&mut self, next: u8, more: bool) {
        // writing NBYTES clears TCR and releases the clock stretch
        self.i2c
            .cr2
            .modify(|_, w| unsafe { w.nbytes().bits(next).reload().bit(more) });
    }

    fn stop(&mut self) {
        self.i2c.cr2.modify(|_, w| w.stop().set_bit());
    }

    fn reload_pending(&self) -> bool {
        self.i2c.isr.read().tcr().bit_is_set()
    }

    fn complete(&self) -> bool {
        self.i2c.isr.read().tc().bit_is_set()
    }

    fn bus_error(&self) -> bool {
        let isr = self.i2c.isr.read();
        isr.nackf().bit_is_set() || isr.berr().bit_is_set() || isr.arlo().bit_is_set()
    }

    fn clear_errors(&mut self) {
        self.i2c.icr.write(|w| {
            w.nackcf()
                .set_bit()
                .stopcf()
                .set_bit()
                .berrcf()
                .set_bit()
                .arlocf()
                .set_bit()
        });
    }
}

unsafe impl Peripheral for I2cTx {
    fn data_register(&self) -> u32 {
        &self.i2c.txdr as *const _ as u32
    }

    fn enable_requests(&mut self) {
        self.i2c.cr1.modify(|_, w| w.txdmaen().set_bit());
    }

    fn disable_requests(&mut self) {
        self.i2c.cr1.modify(|_, w| w.txdmaen().clear_bit());
    }
}
