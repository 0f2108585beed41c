//! DMA1 channels.

use super::pac;
use crate::channel::DmaChannel;
use crate::config::{ChannelConfig, ElementWidth, Priority};

/// DMA1, split into its seven channels.
pub struct Channels {
    pub ch1: C1,
    pub ch2: C2,
    pub ch3: C3,
    pub ch4: C4,
    pub ch5: C5,
    pub ch6: C6,
    pub ch7: C7,
}

impl Channels {
    pub fn new(_dma1: pac::DMA1, rcc: &pac::RCC) -> Self {
        // enable DMA1 peripheral
        rcc.ahbenr.modify(|_, w| w.dma1en().enabled());

        Self {
            ch1: C1 { _0: () },
            ch2: C2 { _0: () },
            ch3: C3 { _0: () },
            ch4: C4 { _0: () },
            ch5: C5 { _0: () },
            ch6: C6 { _0: () },
            ch7: C7 { _0: () },
        }
    }
}

fn dma1() -> &'static pac::dma1::RegisterBlock {
    // Each channel struct only touches its own registers, `IFCR` is
    // write-one-to-clear and `ISR` is read-only.
    unsafe { &*pac::DMA1::ptr() }
}

macro_rules! channels {
    ( $( $CX:ident: ($chx:ident, $cgifx:ident, $tcifx:ident, $teifx:ident), )+ ) => {
        $(
            pub struct $CX {
                _0: (),
            }

            impl DmaChannel for $CX {
                fn write_config(&mut self, config: &ChannelConfig) {
                    dma1().$chx.cr.write(|w| {
                        w.mem2mem().disabled();
                        w.dir().from_memory();
                        w.minc().bit(config.increment_source);
                        w.pinc().bit(config.increment_destination);
                        w.circ().bit(config.circular());
                        w.tcie().bit(config.complete_interrupt);
                        match config.width {
                            ElementWidth::Bits8 => {
                                w.psize().bits8();
                                w.msize().bits8()
                            }
                            ElementWidth::Bits16 => {
                                w.psize().bits16();
                                w.msize().bits16()
                            }
                            ElementWidth::Bits32 => {
                                w.psize().bits32();
                                w.msize().bits32()
                            }
                        };
                        match config.priority {
                            Priority::Low => w.pl().low(),
                            Priority::Medium => w.pl().medium(),
                            Priority::High => w.pl().high(),
                            Priority::VeryHigh => w.pl().very_high(),
                        }
                    });
                }

                fn set_paddr(&mut self, addr: u32) {
                    dma1().$chx.par.write(|w| w.pa().bits(addr));
                }

                fn set_maddr(&mut self, addr: u32) {
                    dma1().$chx.mar.write(|w| w.ma().bits(addr));
                }

                fn set_ndt(&mut self, len: u16) {
                    dma1().$chx.ndtr.write(|w| w.ndt().bits(len));
                }

                fn ndt(&self) -> u16 {
                    dma1().$chx.ndtr.read().ndt().bits()
                }

                fn enable(&mut self) {
                    dma1().$chx.cr.modify(|_, w| w.en().enabled());
                }

                fn disable(&mut self) {
                    dma1().$chx.cr.modify(|_, w| w.en().disabled());
                }

                fn is_enabled(&self) -> bool {
                    dma1().$chx.cr.read().en().bit_is_set()
                }

                fn transfer_complete(&self) -> bool {
                    dma1().isr.read().$tcifx().bit_is_set()
                }

                fn transfer_error(&self) -> bool {
                    dma1().isr.read().$teifx().bit_is_set()
                }

                fn clear_flags(&mut self) {
                    dma1().ifcr.write(|w| w.$cgifx().set_bit());
                }
            }
        )+
    };
}

channels!(
    C1: (ch1, cgif1, tcif1, teif1),
    C2: (ch2, cgif2, tcif2, teif2),
    C3: (ch3, cgif3, tcif3, teif3),
    C4: (ch4, cgif4, tcif4, teif4),
    C5: (ch5, cgif5, tcif5, teif5),
    C6: (ch6, cgif6, tcif6, teif6),
    C7: (ch7, cgif7, tcif7, teif7),
);
