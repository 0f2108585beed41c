//! DMA channel lifecycle.
//!
//! [`DmaController`] owns one channel and its descriptor. Arming writes
//! source, destination and length but never starts data movement; the channel
//! only moves data once it is enabled and its peripheral issues requests. That
//! lets the consumer side (a DAC trigger, a display controller) be switched on
//! after the channel is primed.
//!
//! [`Transfer`] additionally owns the source buffer for as long as the
//! hardware may read it.

use core::ops::DerefMut;
use core::sync::atomic::{self, Ordering};

use crate::channel::{DmaChannel, Peripheral};
use crate::config::{ChannelConfig, Mode, TransferDescriptor};
use crate::traits::{DmaReadBuffer, DmaWord};
use crate::{spin_wait, Error};

/// One DMA channel plus the descriptor it was last armed with.
pub struct DmaController<C> {
    channel: C,
    config: ChannelConfig,
    armed: Option<TransferDescriptor>,
}

impl<C: DmaChannel> DmaController<C> {
    /// Take over `channel`, disabling it and writing `config`.
    pub fn new(mut channel: C, config: ChannelConfig) -> Result<Self, Error> {
        config.validate()?;
        channel.disable();
        channel.write_config(&config);
        channel.clear_flags();
        Ok(Self {
            channel,
            config,
            armed: None,
        })
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn descriptor(&self) -> Option<&TransferDescriptor> {
        self.armed.as_ref()
    }

    /// Replace the channel control bits.
    ///
    /// The channel is disabled around the write and re-enabled only if it was
    /// enabled before. On an armed channel the element width is fixed and the
    /// armed addresses are checked against the new config before any register
    /// is written.
    pub fn configure(&mut self, config: ChannelConfig) -> Result<(), Error> {
        let checked = match self.armed {
            Some(desc) if desc.config.width != config.width => Err(Error::WidthMismatch),
            Some(desc) => TransferDescriptor { config, ..desc }.validate(),
            None => config.validate(),
        };
        if let Err(e) = checked {
            #[cfg(feature = "defmt")]
            defmt::warn!("dma: rejected channel config: {}", e);
            return Err(e);
        }
        let was_enabled = self.channel.is_enabled();
        self.disable();
        self.channel.write_config(&config);
        self.config = config;
        if let Some(desc) = self.armed.as_mut() {
            desc.config = config;
        }
        if was_enabled {
            self.enable()?;
        }
        Ok(())
    }

    /// Set source, destination and length. Leaves the channel disabled.
    ///
    /// All checks run before the first register write.
    ///
    /// # Safety
    ///
    /// `source` must point at `count` elements of the configured width that
    /// stay readable and in place until the channel is disabled or re-armed.
    /// `destination` must be a peripheral data register that accepts DMA
    /// writes of that width.
    pub unsafe fn arm(&mut self, source: u32, destination: u32, count: usize) -> Result<(), Error> {
        let desc = TransferDescriptor::new(source, destination, count, self.config);
        if let Err(e) = desc.validate() {
            #[cfg(feature = "defmt")]
            defmt::warn!("dma: rejected arm of {} elements: {}", count, e);
            return Err(e);
        }
        self.write_descriptor(&desc);
        self.armed = Some(desc);
        Ok(())
    }

    /// Configure and arm from one descriptor, validating it as a whole first.
    ///
    /// # Safety
    ///
    /// Same as [`arm`](Self::arm), for the descriptor's addresses, count and
    /// width.
    pub unsafe fn arm_descriptor(&mut self, desc: TransferDescriptor) -> Result<(), Error> {
        desc.validate()?;
        self.disable();
        self.channel.write_config(&desc.config);
        self.config = desc.config;
        self.write_descriptor(&desc);
        self.armed = Some(desc);
        Ok(())
    }

    fn write_descriptor(&mut self, desc: &TransferDescriptor) {
        self.disable();
        self.channel.set_paddr(desc.destination);
        self.channel.set_maddr(desc.source);
        // `validate` bounded the count to the register width.
        self.channel.set_ndt(desc.count as u16);
        self.channel.clear_flags();
    }

    pub fn enable(&mut self) -> Result<(), Error> {
        if self.armed.is_none() {
            return Err(Error::NotArmed);
        }
        // Prevent preceding writes to the source buffer from being moved
        // past the enable (i.e. after the transfer has started).
        atomic::compiler_fence(Ordering::Release);
        self.channel.clear_flags();
        self.channel.enable();
        Ok(())
    }

    pub fn disable(&mut self) {
        self.channel.disable();

        // Prevent subsequent buffer accesses from being moved ahead of the
        // disable.
        atomic::compiler_fence(Ordering::Acquire);
    }

    /// Rewind to the start of the armed buffer and enable again.
    pub fn restart(&mut self) -> Result<(), Error> {
        let desc = self.armed.ok_or(Error::NotArmed)?;
        self.write_descriptor(&desc);
        self.enable()
    }

    /// Whether the channel still responds to requests with data left to move.
    pub fn is_running(&self) -> bool {
        if !self.channel.is_enabled() || self.channel.transfer_error() {
            return false;
        }
        match self.config.mode {
            Mode::Circular => true,
            Mode::OneShot => self.channel.ndt() > 0,
        }
    }

    pub fn transfer_count_remaining(&self) -> u16 {
        self.channel.ndt()
    }

    pub fn transfer_complete(&self) -> bool {
        self.channel.transfer_complete()
    }

    /// Spin until the channel raises transfer complete, then clear the flag.
    ///
    /// In circular mode this returns once per pass over the buffer.
    pub fn wait(&mut self, deadline: Option<u32>) -> Result<(), Error> {
        let channel = &self.channel;
        spin_wait(deadline, || {
            if channel.transfer_error() {
                return Err(Error::TransferError);
            }
            Ok(channel.transfer_complete())
        })?;
        self.channel.clear_flags();
        Ok(())
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn free(mut self) -> C {
        self.disable();
        self.channel
    }
}

/// Returned by [`Transfer::start`] when the buffer can't be streamed. Hands
/// both resources back.
pub struct Rejected<B, C> {
    pub error: Error,
    pub controller: DmaController<C>,
    pub buffer: B,
}

impl<B, C> core::fmt::Debug for Rejected<B, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Rejected").field("error", &self.error).finish()
    }
}

/// A running memory-to-peripheral transfer that owns its source buffer.
pub struct Transfer<B, C: DmaChannel> {
    // always `Some` outside of `Drop::drop` and `stop`
    inner: Option<TransferInner<B, C>>,
}

struct TransferInner<B, C: DmaChannel> {
    controller: DmaController<C>,
    buffer: B,
}

impl<B, C> Transfer<B, C>
where
    B: DmaReadBuffer + 'static,
    C: DmaChannel,
{
    /// Arm `controller` over `buffer` towards the data register of `target`
    /// and enable it.
    ///
    /// Data only moves once the peripheral starts requesting it.
    pub fn start<P: Peripheral>(
        mut controller: DmaController<C>,
        buffer: B,
        target: &P,
    ) -> Result<Self, Rejected<B, C>> {
        let (ptr, len) = buffer.dma_read_buffer();
        let checked = if controller.config.width != <B::Word as DmaWord>::WIDTH {
            Err(Error::WidthMismatch)
        } else {
            // The buffer is `'static` and owned by the transfer until the
            // channel is disabled; `target` vouches for its data register.
            unsafe { controller.arm(ptr as u32, target.data_register(), len) }
        };
        if let Err(error) = checked.and_then(|_| controller.enable()) {
            return Err(Rejected {
                error,
                controller,
                buffer,
            });
        }

        Ok(Transfer {
            inner: Some(TransferInner { controller, buffer }),
        })
    }
}

impl<B, C: DmaChannel> Transfer<B, C> {
    fn inner(&self) -> &TransferInner<B, C> {
        match self.inner.as_ref() {
            Some(inner) => inner,
            None => unreachable!(),
        }
    }

    fn inner_mut(&mut self) -> &mut TransferInner<B, C> {
        match self.inner.as_mut() {
            Some(inner) => inner,
            None => unreachable!(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner().controller.is_running()
    }

    pub fn remaining(&self) -> u16 {
        self.inner().controller.transfer_count_remaining()
    }

    /// Spin until the current pass over the buffer completes.
    pub fn wait(&mut self, deadline: Option<u32>) -> Result<(), Error> {
        self.inner_mut().controller.wait(deadline)
    }

    pub fn controller(&self) -> &DmaController<C> {
        &self.inner().controller
    }

    /// Rewind to the start of the buffer, e.g. after the peripheral dropped
    /// a frame half way through.
    pub fn restart(&mut self) -> Result<(), Error> {
        self.inner_mut().controller.restart()
    }

    pub fn buffer(&self) -> &B {
        &self.inner().buffer
    }

    /// Mutate the buffer in place.
    ///
    /// Allowed while a circular transfer runs: the DMA read cursor and the
    /// writer are not synchronised and a pass may see a mix of old and new
    /// content. Rejected with `Busy` while a one-shot transfer is in flight.
    pub fn modify<F, R>(&mut self, f: F) -> Result<R, Error>
    where
        B: DerefMut,
        F: FnOnce(&mut B::Target) -> R,
    {
        let inner = self.inner_mut();
        if inner.controller.config.mode == Mode::OneShot && inner.controller.is_running() {
            return Err(Error::Busy);
        }
        atomic::compiler_fence(Ordering::Acquire);
        let r = f(&mut *inner.buffer);
        atomic::compiler_fence(Ordering::Release);
        Ok(r)
    }

    /// Stop the channel and hand back the controller and buffer.
    pub fn stop(mut self) -> (DmaController<C>, B) {
        match self.inner.take() {
            Some(mut inner) => {
                inner.controller.disable();
                (inner.controller, inner.buffer)
            }
            None => unreachable!(),
        }
    }
}

impl<B, C: DmaChannel> Drop for Transfer<B, C> {
    fn drop(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            inner.controller.disable();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{self, ElementWidth, Priority};
    use crate::sim::{RegWrite, SimChannel, SimPeripheral};
    use crate::waveform::{self, SINE_WAVE};

    const DAC_DHR12R1: u32 = 0x4000_7408;
    const SPI1_DR: u32 = 0x4001_300c;

    fn controller(width: ElementWidth, mode: Mode) -> DmaController<SimChannel> {
        DmaController::new(SimChannel::new(), ChannelConfig::mem2periph(width, mode)).unwrap()
    }

    fn spi() -> SimPeripheral {
        SimPeripheral {
            register: SPI1_DR,
            requesting: false,
        }
    }

    /// Arm over a made-up address; the simulated channel never dereferences it.
    fn arm(ctrl: &mut DmaController<SimChannel>, source: u32, dest: u32, count: usize) -> Result<(), Error> {
        unsafe { ctrl.arm(source, dest, count) }
    }

    fn sim<B>(transfer: &mut Transfer<B, SimChannel>) -> &mut SimChannel {
        transfer.inner_mut().controller.channel_mut()
    }

    #[test]
    fn oversized_arm_writes_no_register() {
        let mut ctrl = controller(ElementWidth::Bits8, Mode::OneShot);
        let before = ctrl.channel().writes.len();

        let res = arm(&mut ctrl, 0x2000_0000, SPI1_DR, config::MAX_TRANSFER_LEN + 1);

        assert_eq!(res, Err(Error::LengthOverflow));
        assert_eq!(ctrl.channel().writes.len(), before);
        assert!(ctrl.descriptor().is_none());
    }

    #[test]
    fn arm_primes_without_starting() {
        let mut ctrl = controller(ElementWidth::Bits16, Mode::Circular);
        arm(&mut ctrl, 0x2000_0100, DAC_DHR12R1, 32).unwrap();

        let ch = ctrl.channel();
        assert!(!ch.enabled);
        assert_eq!(ch.paddr, DAC_DHR12R1);
        assert_eq!(ch.maddr, 0x2000_0100);
        assert_eq!(ch.ndt, 32);
        assert!(!ctrl.is_running());
    }

    #[test]
    fn rejected_descriptor_writes_no_register() {
        let mut ctrl = controller(ElementWidth::Bits8, Mode::OneShot);
        let before = ctrl.channel().writes.len();
        let cfg = ChannelConfig::mem2periph(ElementWidth::Bits16, Mode::Circular);

        let odd = TransferDescriptor::new(0x2000_0001, DAC_DHR12R1, 32, cfg);
        assert_eq!(unsafe { ctrl.arm_descriptor(odd) }, Err(Error::Misaligned));
        let empty = TransferDescriptor::new(0x2000_0000, DAC_DHR12R1, 0, cfg);
        assert_eq!(unsafe { ctrl.arm_descriptor(empty) }, Err(Error::ZeroLength));

        assert_eq!(ctrl.channel().writes.len(), before);
        assert_eq!(ctrl.config().width, ElementWidth::Bits8);
        assert!(ctrl.descriptor().is_none());
    }

    #[test]
    fn descriptor_sets_config_and_addresses_together() {
        let mut ctrl = controller(ElementWidth::Bits8, Mode::OneShot);
        let cfg = ChannelConfig::mem2periph(ElementWidth::Bits16, Mode::Circular)
            .with_priority(Priority::VeryHigh)
            .with_complete_interrupt(true);
        let desc = TransferDescriptor::new(0x2000_0040, DAC_DHR12R1, 32, cfg);

        unsafe { ctrl.arm_descriptor(desc).unwrap() };

        assert_eq!(ctrl.channel().config, Some(cfg));
        assert_eq!(ctrl.config(), &cfg);
        assert_eq!(ctrl.descriptor(), Some(&desc));
        assert_eq!(ctrl.channel().ndt, 32);
        assert!(!ctrl.channel().enabled);
    }

    #[test]
    fn enable_requires_arm() {
        let mut ctrl = controller(ElementWidth::Bits8, Mode::OneShot);
        assert_eq!(ctrl.enable(), Err(Error::NotArmed));
        assert_eq!(ctrl.restart(), Err(Error::NotArmed));
    }

    #[test]
    fn configure_disables_around_write_and_restores_enable() {
        let mut ctrl = controller(ElementWidth::Bits8, Mode::OneShot);
        arm(&mut ctrl, 0x2000_0000, SPI1_DR, 25).unwrap();
        ctrl.enable().unwrap();
        ctrl.channel_mut().writes.clear();

        ctrl.configure(ChannelConfig::mem2periph(ElementWidth::Bits8, Mode::Circular))
            .unwrap();

        let writes = &ctrl.channel().writes;
        let disable = writes.iter().position(|w| *w == RegWrite::Disable).unwrap();
        let config = writes.iter().position(|w| *w == RegWrite::Config).unwrap();
        let enable = writes.iter().rposition(|w| *w == RegWrite::Enable).unwrap();
        assert!(disable < config && config < enable);
        assert!(ctrl.channel().enabled);
        assert_eq!(ctrl.descriptor().unwrap().config.mode, Mode::Circular);
    }

    #[test]
    fn armed_channel_keeps_its_width() {
        let mut ctrl = controller(ElementWidth::Bits8, Mode::Circular);
        arm(&mut ctrl, 0x2000_0003, SPI1_DR, 16).unwrap();
        ctrl.enable().unwrap();
        ctrl.channel_mut().writes.clear();

        let wider = ChannelConfig::mem2periph(ElementWidth::Bits32, Mode::Circular);
        assert_eq!(ctrl.configure(wider), Err(Error::WidthMismatch));

        let mut incrementing = ChannelConfig::mem2periph(ElementWidth::Bits8, Mode::Circular);
        incrementing.increment_destination = true;
        assert_eq!(ctrl.configure(incrementing), Err(Error::PeripheralIncrement));

        assert!(ctrl.channel().writes.is_empty());
        assert!(ctrl.channel().enabled);
        assert_eq!(ctrl.config().width, ElementWidth::Bits8);
        assert_eq!(ctrl.descriptor().unwrap().config.width, ElementWidth::Bits8);
    }

    #[test]
    fn one_shot_stops_after_count() {
        let mut ctrl = controller(ElementWidth::Bits8, Mode::OneShot);
        arm(&mut ctrl, 0x2000_0000, SPI1_DR, 25).unwrap();
        ctrl.enable().unwrap();
        assert!(ctrl.is_running());

        ctrl.channel_mut().drain(10);
        assert_eq!(ctrl.transfer_count_remaining(), 15);
        ctrl.channel_mut().drain(100);

        assert!(!ctrl.is_running());
        assert_eq!(ctrl.channel().moved, 25);
        assert_eq!(ctrl.wait(Some(1)), Ok(()));
        assert!(!ctrl.transfer_complete());
    }

    #[test]
    fn circular_wraps_and_keeps_running() {
        let mut ctrl = controller(ElementWidth::Bits16, Mode::Circular);
        arm(&mut ctrl, 0x2000_0000, DAC_DHR12R1, 32).unwrap();
        ctrl.enable().unwrap();

        ctrl.channel_mut().drain(32 * 3 + 5);

        assert!(ctrl.is_running());
        assert_eq!(ctrl.transfer_count_remaining(), 27);
        assert_eq!(ctrl.channel().moved, 101);
    }

    #[test]
    fn wait_times_out_and_reports_errors() {
        let mut ctrl = controller(ElementWidth::Bits8, Mode::OneShot);
        arm(&mut ctrl, 0x2000_0000, SPI1_DR, 4).unwrap();
        ctrl.enable().unwrap();
        assert_eq!(ctrl.wait(Some(50)), Err(Error::Timeout));

        ctrl.channel_mut().fault();
        assert_eq!(ctrl.wait(Some(50)), Err(Error::TransferError));
        assert!(!ctrl.is_running());
    }

    #[test]
    fn restart_rewinds_to_buffer_start() {
        let mut ctrl = controller(ElementWidth::Bits8, Mode::Circular);
        arm(&mut ctrl, 0x2000_0400, 0x4000_5428, 1025).unwrap();
        ctrl.enable().unwrap();
        ctrl.channel_mut().drain(300);

        ctrl.restart().unwrap();

        assert_eq!(ctrl.transfer_count_remaining(), 1025);
        assert_eq!(ctrl.channel().maddr, 0x2000_0400);
        assert!(ctrl.channel().enabled);
    }

    #[test]
    fn free_disables_the_channel() {
        let mut ctrl = controller(ElementWidth::Bits8, Mode::Circular);
        arm(&mut ctrl, 0x2000_0000, SPI1_DR, 8).unwrap();
        ctrl.enable().unwrap();

        let channel = ctrl.free();

        assert!(!channel.enabled);
        assert_eq!(channel.writes.last(), Some(&RegWrite::Disable));
    }

    #[test]
    fn transfer_streams_sine_table_to_dac() {
        let ctrl = controller(ElementWidth::Bits16, Mode::Circular);
        let mut dac = SimPeripheral {
            register: DAC_DHR12R1,
            requesting: false,
        };

        let transfer = Transfer::start(ctrl, &SINE_WAVE, &dac).unwrap();
        // primed but idle until the DAC trigger is switched on
        assert_eq!(transfer.remaining(), waveform::SINE_SAMPLES as u16);
        assert_eq!(transfer.controller().channel().paddr, DAC_DHR12R1);
        dac.enable_requests();
        assert!(dac.requesting);
        assert!(transfer.is_running());

        let (ctrl, table) = transfer.stop();
        assert!(!ctrl.channel().enabled);
        assert_eq!(ctrl.channel().maddr, table.as_ptr() as u32);
    }

    #[test]
    fn width_mismatch_hands_resources_back() {
        static BYTES: [u8; 8] = [0; 8];
        let ctrl = controller(ElementWidth::Bits16, Mode::Circular);

        let rejected = match Transfer::start(ctrl, &BYTES, &spi()) {
            Err(r) => r,
            Ok(_) => panic!("8-bit buffer accepted by 16-bit channel"),
        };

        assert_eq!(rejected.error, Error::WidthMismatch);
        assert_eq!(rejected.buffer.len(), 8);
        assert!(rejected.controller.descriptor().is_none());
    }

    #[test]
    fn transfer_restart_rewinds_owned_buffer() {
        let buf: &'static mut [u8; 16] = Box::leak(Box::new([0u8; 16]));
        let ctrl = controller(ElementWidth::Bits8, Mode::Circular);
        let mut transfer = Transfer::start(ctrl, buf, &spi()).unwrap();

        sim(&mut transfer).drain(21);
        assert_eq!(transfer.remaining(), 11);

        transfer.restart().unwrap();

        assert_eq!(transfer.remaining(), 16);
        assert_eq!(transfer.controller().channel().maddr, transfer.buffer().as_ptr() as u32);
        assert!(transfer.is_running());
    }

    #[test]
    fn modify_rules_follow_mode() {
        let buf: &'static mut [u8; 16] = Box::leak(Box::new([0u8; 16]));
        let ctrl = controller(ElementWidth::Bits8, Mode::OneShot);
        let mut transfer = Transfer::start(ctrl, buf, &spi()).unwrap();

        assert_eq!(transfer.modify(|b| b[0] = 1), Err(Error::Busy));
        sim(&mut transfer).drain(16);
        assert_eq!(transfer.modify(|b| b[0] = 1), Ok(()));

        let (mut ctrl, buf) = transfer.stop();
        ctrl.configure(ChannelConfig::mem2periph(ElementWidth::Bits8, Mode::Circular))
            .unwrap();
        let mut transfer = Transfer::start(ctrl, buf, &spi()).unwrap();
        sim(&mut transfer).drain(5);
        assert_eq!(transfer.modify(|b| b[1] = 2), Ok(()));
        assert_eq!(transfer.buffer()[..2], [1, 2]);
    }
}
