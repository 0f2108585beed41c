//! DAC1 channel 1, paced by TIM6.

use super::pac;
use crate::channel::Peripheral;

/// `TSEL1` value selecting the TIM6 trigger output.
const TRIGGER_TIM6: u8 = 0b000;
/// `MMS` value: the update event is the trigger output.
const TRGO_UPDATE: u8 = 0b010;

/// DAC output whose samples are pulled by DMA on every TIM6 update.
pub struct DacTone {
    dac: pac::DAC1,
    tim: pac::TIM6,
}

impl DacTone {
    pub fn new(dac: pac::DAC1, tim: pac::TIM6, syscfg: &pac::SYSCFG, rcc: &pac::RCC) -> Self {
        rcc.apb1enr
            .modify(|_, w| w.dac1en().set_bit().tim6en().set_bit());
        rcc.apb2enr.modify(|_, w| w.syscfgen().set_bit());
        // route DAC1 CH1 requests to DMA1 channel 3 instead of DMA2 channel 3
        syscfg
            .cfgr1
            .modify(|_, w| w.tim6_dac1_dma_rmp().set_bit());

        Self { dac, tim }
    }

    /// Start TIM6 with the given reload value; every update event is a
    /// trigger output.
    pub fn start_timer(&mut self, period: u16) {
        self.tim.psc.write(|w| unsafe { w.psc().bits(0) });
        self.tim.arr.write(|w| unsafe { w.arr().bits(period) });
        self.tim.cr2.modify(|_, w| unsafe { w.mms().bits(TRGO_UPDATE) });
        self.tim.cr1.modify(|_, w| w.cen().set_bit());
    }

    /// Enable channel 1 with TIM6 TRGO as trigger and DMA requests on.
    /// Requests only flow once the trigger is enabled as well.
    pub fn enable_channel(&mut self) {
        self.dac.cr.modify(|_, w| unsafe {
            w.tsel1()
                .bits(TRIGGER_TIM6)
                .dmaen1()
                .set_bit()
                .en1()
                .set_bit()
        });
    }
}

unsafe impl Peripheral for DacTone {
    fn data_register(&self) -> u32 {
        &self.dac.dhr12r1 as *const _ as u32
    }

    fn enable_requests(&mut self) {
        self.dac.cr.modify(|_, w| w.ten1().set_bit());
    }

    fn disable_requests(&mut self) {
        self.dac.cr.modify(|_, w| w.ten1().clear_bit());
    }
}
