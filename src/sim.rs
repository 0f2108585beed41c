//! Simulated hardware for host tests.
//!
//! `SimChannel` behaves like one STM32 DMA channel: `CNDTR` counts down per
//! peripheral request, wraps in circular mode, and the channel refuses
//! configuration writes while enabled. `SimI2c` models the `NBYTES`/`RELOAD`
//! counter of the I2C v2 peripheral. Both log every register write.

use heapless::Vec;

use crate::channel::{DmaChannel, Peripheral, ReloadPeripheral};
use crate::config::ChannelConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegWrite {
    Config,
    Paddr(u32),
    Maddr(u32),
    Ndt(u16),
    Enable,
    Disable,
    ClearFlags,
}

#[derive(Default)]
pub struct SimChannel {
    pub config: Option<ChannelConfig>,
    pub paddr: u32,
    pub maddr: u32,
    /// Length written by software; reloaded into `ndt` in circular mode.
    pub programmed: u16,
    pub ndt: u16,
    pub enabled: bool,
    pub tc: bool,
    pub te: bool,
    /// Elements the peripheral pulled, across wraps.
    pub moved: usize,
    pub writes: Vec<RegWrite, 64>,
}

impl SimChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&mut self, w: RegWrite) {
        let _ = self.writes.push(w);
    }

    /// The peripheral issues `n` requests.
    pub fn drain(&mut self, n: usize) {
        for _ in 0..n {
            if !self.enabled || self.ndt == 0 {
                return;
            }
            self.ndt -= 1;
            self.moved += 1;
            if self.ndt == 0 {
                self.tc = true;
                if self.config.map_or(false, |c| c.circular()) {
                    self.ndt = self.programmed;
                }
            }
        }
    }

    /// A bus fault: hardware sets `TEIF` and clears `EN`.
    pub fn fault(&mut self) {
        self.te = true;
        self.enabled = false;
    }
}

impl DmaChannel for SimChannel {
    fn write_config(&mut self, config: &ChannelConfig) {
        assert!(!self.enabled, "CCR written while channel enabled");
        self.config = Some(*config);
        self.log(RegWrite::Config);
    }

    fn set_paddr(&mut self, addr: u32) {
        assert!(!self.enabled, "CPAR written while channel enabled");
        self.paddr = addr;
        self.log(RegWrite::Paddr(addr));
    }

    fn set_maddr(&mut self, addr: u32) {
        assert!(!self.enabled, "CMAR written while channel enabled");
        self.maddr = addr;
        self.log(RegWrite::Maddr(addr));
    }

    fn set_ndt(&mut self, len: u16) {
        assert!(!self.enabled, "CNDTR written while channel enabled");
        self.programmed = len;
        self.ndt = len;
        self.log(RegWrite::Ndt(len));
    }

    fn ndt(&self) -> u16 {
        self.ndt
    }

    fn enable(&mut self) {
        self.enabled = true;
        self.log(RegWrite::Enable);
    }

    fn disable(&mut self) {
        self.enabled = false;
        self.log(RegWrite::Disable);
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn transfer_complete(&self) -> bool {
        self.tc
    }

    fn transfer_error(&self) -> bool {
        self.te
    }

    fn clear_flags(&mut self) {
        self.tc = false;
        self.te = false;
        self.log(RegWrite::ClearFlags);
    }
}

/// Simple request source standing in for DAC/SPI.
pub struct SimPeripheral {
    pub register: u32,
    pub requesting: bool,
}

unsafe impl Peripheral for SimPeripheral {
    fn data_register(&self) -> u32 {
        self.register
    }

    fn enable_requests(&mut self) {
        self.requesting = true;
    }

    fn disable_requests(&mut self) {
        self.requesting = false;
    }
}

#[derive(Default)]
pub struct SimI2c {
    pub counter: u8,
    pub more: bool,
    pub open: bool,
    pub tcr: bool,
    pub tc: bool,
    pub berr: bool,
    pub starts: usize,
    pub stops: usize,
    pub sent: usize,
    pub reloads: Vec<u8, 64>,
}

impl SimI2c {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shift bytes out until the counter expires. Returns bytes shifted.
    pub fn shift_chunk(&mut self) -> usize {
        if !self.open || self.tcr || self.tc {
            return 0;
        }
        let n = self.counter as usize;
        self.sent += n;
        self.counter = 0;
        if self.more {
            self.tcr = true;
        } else {
            self.tc = true;
        }
        n
    }

    /// The reload wasn't written in time: the session is gone.
    pub fn miss_deadline(&mut self) {
        self.open = false;
        self.tcr = false;
        self.berr = true;
    }
}

impl ReloadPeripheral for SimI2c {
    fn start(&mut self, first: u8, more: bool) {
        self.open = true;
        self.tc = false;
        self.tcr = false;
        self.counter = first;
        self.more = more;
        self.starts += 1;
    }

    fn reload(&mut self, next: u8, more: bool) {
        assert!(self.tcr, "NBYTES reloaded without TCR");
        self.tcr = false;
        self.counter = next;
        self.more = more;
        let _ = self.reloads.push(next);
    }

    fn stop(&mut self) {
        self.open = false;
        self.tc = false;
        self.stops += 1;
    }

    fn reload_pending(&self) -> bool {
        self.tcr
    }

    fn complete(&self) -> bool {
        self.tc
    }

    fn bus_error(&self) -> bool {
        self.berr
    }

    fn clear_errors(&mut self) {
        self.berr = false;
    }
}
