//! Chunked transfers for peripherals with a short byte counter.
//!
//! The I2C peripheral can only be told about 255 bytes at a time. To stream a
//! longer buffer in one bus session, the counter is reloaded from the
//! "transfer complete reload" interrupt before it runs out. [`ChunkedTransfer`]
//! is that state machine, with the hardware event injected by the caller:
//!
//! ```text
//!  Idle --begin--> Active --complete--> remaining > 0 ? reload, Active
//!                                                     : Done
//! ```
//!
//! Every handler is a handful of arithmetic steps with no loops, so it fits
//! comfortably inside the reload deadline.

use crate::channel::ReloadPeripheral;
use crate::Error;

/// Counter ceiling of the I2C `NBYTES` field.
pub const I2C_CHUNK_CAP: u8 = 255;

/// Remaining byte count and the per-chunk ceiling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChunkCursor {
    remaining: usize,
    cap: u8,
}

impl ChunkCursor {
    pub fn new(cap: u8) -> Result<Self, Error> {
        if cap == 0 {
            return Err(Error::InvalidChunkCap);
        }
        Ok(Self { remaining: 0, cap })
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn cap(&self) -> u8 {
        self.cap
    }

    fn next_chunk(&self) -> Chunk {
        let len = if self.remaining > self.cap as usize {
            self.cap
        } else {
            self.remaining as u8
        };
        Chunk {
            len,
            more: self.remaining > len as usize,
        }
    }
}

/// One hardware transaction: its length, and whether another follows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Chunk {
    pub len: u8,
    pub more: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    Idle,
    /// A chunk of `in_flight` bytes is on the bus.
    Active { in_flight: u8 },
    /// The whole logical transfer went out. Behaves like `Idle`.
    Done,
}

/// Outcome of a completion event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    /// Write this chunk into the counter now.
    Reload(Chunk),
    Done,
    /// Event arrived with no transfer in flight.
    Spurious,
}

/// What [`ChunkedTransfer::service`] did for one interrupt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Service {
    Reloaded(u8),
    /// Frame finished and the session was closed.
    FrameDone,
    Nothing,
}

/// Continues one logical transfer across several hardware transactions.
#[derive(Debug)]
pub struct ChunkedTransfer {
    cursor: ChunkCursor,
    state: State,
    reloads: u32,
}

impl ChunkedTransfer {
    pub fn new(cap: u8) -> Result<Self, Error> {
        Ok(Self {
            cursor: ChunkCursor::new(cap)?,
            state: State::Idle,
            reloads: 0,
        })
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn remaining(&self) -> usize {
        self.cursor.remaining
    }

    /// Reload events issued since the last `begin`.
    pub fn reloads(&self) -> u32 {
        self.reloads
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, State::Active { .. })
    }

    /// Start a logical transfer of `total` bytes. Returns the first chunk.
    pub fn begin(&mut self, total: usize) -> Result<Chunk, Error> {
        if self.is_active() {
            return Err(Error::Busy);
        }
        if total == 0 {
            return Err(Error::ZeroLength);
        }
        self.cursor.remaining = total;
        self.reloads = 0;
        let chunk = self.cursor.next_chunk();
        self.state = State::Active {
            in_flight: chunk.len,
        };
        Ok(chunk)
    }

    /// The chunk on the bus completed. Runs in interrupt context.
    pub fn on_chunk_complete(&mut self) -> Step {
        let in_flight = match self.state {
            State::Active { in_flight } => in_flight,
            _ => return Step::Spurious,
        };
        self.cursor.remaining -= in_flight as usize;
        if self.cursor.remaining == 0 {
            self.state = State::Done;
            return Step::Done;
        }
        let chunk = self.cursor.next_chunk();
        self.state = State::Active {
            in_flight: chunk.len,
        };
        self.reloads += 1;
        Step::Reload(chunk)
    }

    /// The peripheral dropped the session. The frame is abandoned.
    pub fn on_bus_error(&mut self) -> Error {
        #[cfg(feature = "defmt")]
        defmt::warn!(
            "chunked: bus error with {} bytes left, frame dropped",
            self.cursor.remaining
        );
        self.cancel();
        Error::BusError
    }

    /// Abandon any in-flight chunk and return to `Idle`.
    pub fn cancel(&mut self) {
        self.cursor.remaining = 0;
        self.state = State::Idle;
    }

    /// Open a bus session on `periph` for `total` bytes.
    pub fn start<P: ReloadPeripheral>(&mut self, periph: &mut P, total: usize) -> Result<(), Error> {
        let chunk = self.begin(total)?;
        periph.clear_errors();
        periph.start(chunk.len, chunk.more);
        Ok(())
    }

    /// Interrupt handler body: look at the peripheral flags and act on them.
    pub fn service<P: ReloadPeripheral>(&mut self, periph: &mut P) -> Result<Service, Error> {
        if periph.bus_error() {
            periph.clear_errors();
            periph.stop();
            return Err(self.on_bus_error());
        }
        if !periph.reload_pending() && !periph.complete() {
            return Ok(Service::Nothing);
        }
        match self.on_chunk_complete() {
            Step::Reload(chunk) => {
                periph.reload(chunk.len, chunk.more);
                #[cfg(feature = "defmt")]
                defmt::trace!("chunked: reload {} ({} left)", chunk.len, self.cursor.remaining);
                Ok(Service::Reloaded(chunk.len))
            }
            Step::Done => {
                periph.stop();
                #[cfg(feature = "defmt")]
                defmt::debug!("chunked: frame done after {} reloads", self.reloads);
                Ok(Service::FrameDone)
            }
            Step::Spurious => Ok(Service::Nothing),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimI2c;

    /// Drive the state machine alone; returns every chunk length it asked for.
    fn run(total: usize, cap: u8) -> (Vec<u8>, ChunkedTransfer) {
        let mut xfer = ChunkedTransfer::new(cap).unwrap();
        let mut chunks = Vec::new();
        chunks.push(xfer.begin(total).unwrap().len);
        loop {
            match xfer.on_chunk_complete() {
                Step::Reload(c) => chunks.push(c.len),
                Step::Done => break,
                Step::Spurious => panic!("spurious event while active"),
            }
        }
        (chunks, xfer)
    }

    #[test]
    fn reload_count_and_chunk_sum() {
        for &cap in &[1u8, 2, 7, 64, 200, 255] {
            for &total in &[1usize, 2, 254, 255, 256, 510, 511, 1000, 1024, 1025, 4096] {
                let (chunks, xfer) = run(total, cap);
                let expected = (total + cap as usize - 1) / cap as usize;
                assert_eq!(xfer.reloads() as usize, expected - 1, "L={} C={}", total, cap);
                assert_eq!(chunks.iter().map(|&c| c as usize).sum::<usize>(), total);
                assert!(chunks.iter().all(|&c| c > 0 && c <= cap));
                assert_eq!(xfer.state(), State::Done);
                assert_eq!(xfer.remaining(), 0);
            }
        }
    }

    #[test]
    fn kilobyte_over_i2c() {
        let mut xfer = ChunkedTransfer::new(I2C_CHUNK_CAP).unwrap();
        let first = xfer.begin(1024).unwrap();
        assert_eq!(first, Chunk { len: 255, more: true });

        let mut left_at_reload = Vec::new();
        let mut reloaded = Vec::new();
        while let Step::Reload(c) = xfer.on_chunk_complete() {
            left_at_reload.push(xfer.remaining());
            reloaded.push(c.len);
        }

        assert_eq!(reloaded, [255, 255, 255, 4]);
        assert_eq!(left_at_reload, [769, 514, 259, 4]);
        assert_eq!(xfer.reloads(), 4);
        assert_eq!(xfer.state(), State::Done);
        assert_eq!(xfer.remaining(), 0);
    }

    #[test]
    fn short_transfer_needs_no_reload() {
        let mut xfer = ChunkedTransfer::new(I2C_CHUNK_CAP).unwrap();
        assert_eq!(xfer.begin(25).unwrap(), Chunk { len: 25, more: false });
        assert_eq!(xfer.on_chunk_complete(), Step::Done);
        assert_eq!(xfer.reloads(), 0);
    }

    #[test]
    fn begin_rules() {
        assert!(ChunkedTransfer::new(0).is_err());

        let mut xfer = ChunkedTransfer::new(255).unwrap();
        assert_eq!(xfer.begin(0), Err(Error::ZeroLength));
        xfer.begin(600).unwrap();
        assert_eq!(xfer.begin(600), Err(Error::Busy));
        assert_eq!(xfer.on_chunk_complete(), Step::Reload(Chunk { len: 255, more: true }));
    }

    #[test]
    fn events_outside_active_are_spurious() {
        let mut xfer = ChunkedTransfer::new(255).unwrap();
        assert_eq!(xfer.on_chunk_complete(), Step::Spurious);
        xfer.begin(10).unwrap();
        assert_eq!(xfer.on_chunk_complete(), Step::Done);
        assert_eq!(xfer.on_chunk_complete(), Step::Spurious);
        // Done behaves like Idle
        assert!(xfer.begin(10).is_ok());
    }

    #[test]
    fn cancel_forces_idle() {
        let mut xfer = ChunkedTransfer::new(255).unwrap();
        xfer.begin(1024).unwrap();
        xfer.on_chunk_complete();
        xfer.cancel();
        assert_eq!(xfer.state(), State::Idle);
        assert_eq!(xfer.remaining(), 0);
        assert_eq!(xfer.on_chunk_complete(), Step::Spurious);
    }

    #[test]
    fn service_streams_frame_over_simulated_i2c() {
        let mut i2c = SimI2c::new();
        let mut xfer = ChunkedTransfer::new(I2C_CHUNK_CAP).unwrap();
        xfer.start(&mut i2c, 1025).unwrap();

        let mut done = false;
        while !done {
            i2c.shift_chunk();
            match xfer.service(&mut i2c).unwrap() {
                Service::Reloaded(_) => {}
                Service::FrameDone => done = true,
                Service::Nothing => panic!("interrupt without a flag"),
            }
        }

        assert_eq!(i2c.sent, 1025);
        assert_eq!(&i2c.reloads[..], &[255, 255, 255, 5][..]);
        assert_eq!(i2c.starts, 1);
        assert_eq!(i2c.stops, 1);
        assert!(!i2c.open);
    }

    #[test]
    fn missed_deadline_drops_frame_then_next_frame_starts_clean() {
        let mut i2c = SimI2c::new();
        let mut xfer = ChunkedTransfer::new(I2C_CHUNK_CAP).unwrap();
        xfer.start(&mut i2c, 1025).unwrap();
        i2c.shift_chunk();
        i2c.miss_deadline();

        assert_eq!(xfer.service(&mut i2c), Err(Error::BusError));
        assert_eq!(xfer.state(), State::Idle);
        assert_eq!(xfer.remaining(), 0);
        assert!(!i2c.bus_error());

        xfer.start(&mut i2c, 1025).unwrap();
        assert_eq!(i2c.starts, 2);
        assert_eq!(i2c.counter, 255);
        assert!(i2c.more);
    }

    #[test]
    fn quiet_interrupt_changes_nothing() {
        let mut i2c = SimI2c::new();
        let mut xfer = ChunkedTransfer::new(I2C_CHUNK_CAP).unwrap();
        xfer.start(&mut i2c, 300).unwrap();
        assert_eq!(xfer.service(&mut i2c), Ok(Service::Nothing));
        assert_eq!(xfer.remaining(), 300);
    }
}
