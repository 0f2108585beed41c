//! `unsafe` traits for buffers that DMA streams out to a peripheral.
//!
//! A buffer handed to the DMA engine must stay at the same address for the
//! whole transfer, even if the owning handle is moved. We get that from
//! `StableDeref`. The element type decides the transfer width, so the DMA
//! length register always counts elements, never bytes.

use as_slice::AsSlice;
use core::ops::Deref;
use stable_deref_trait::StableDeref;

use crate::config::ElementWidth;

/// Word types the DMA engine can move in a single beat.
///
/// # Safety
///
/// `WIDTH` must match `size_of::<Self>()`, and the type must be valid for
/// every possible bit pattern.
pub unsafe trait DmaWord: Copy {
    const WIDTH: ElementWidth;
}

unsafe impl DmaWord for u8 {
    const WIDTH: ElementWidth = ElementWidth::Bits8;
}

unsafe impl DmaWord for u16 {
    const WIDTH: ElementWidth = ElementWidth::Bits16;
}

unsafe impl DmaWord for u32 {
    const WIDTH: ElementWidth = ElementWidth::Bits32;
}

/// A handle to words that a DMA channel streams out to a peripheral.
///
/// # Safety
///
/// The handle must point at the buffer itself, not at a copy, and the
/// buffer must not move while the handle is alive. See also
/// `dma_read_buffer`.
pub unsafe trait DmaReadBuffer {
    type Word: DmaWord;

    /// Returns the address of the first element and the element count.
    ///
    /// # Safety
    ///
    /// Repeated calls return the same pair, and every element in that range
    /// is readable by the DMA engine.
    fn dma_read_buffer(&self) -> (*const Self::Word, usize);
}

unsafe impl<B, W> DmaReadBuffer for B
where
    B: Deref + StableDeref,
    B::Target: AsSlice<Element = W>,
    W: DmaWord,
{
    type Word = W;

    fn dma_read_buffer(&self) -> (*const W, usize) {
        let target = self.as_slice();
        (target.as_ptr(), target.len())
    }
}
