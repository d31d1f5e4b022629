//! Transient upload buffers.
//!
//! Every upload allocates its own host-visible staging buffer sized to the
//! (alignment-padded) payload. The buffer is consumed by exactly one copy pass
//! and released when the [`Staging`] guard goes out of scope. There is no pooling.

use std::borrow::Cow;

use crate::device::GpuDevice;

/// A filled staging buffer owned for the duration of one copy.
pub(crate) struct Staging<'d, D: GpuDevice> {
    device: &'d D,
    raw: D::StagingBuffer,
    size: u64,
}

impl<'d, D: GpuDevice> Staging<'d, D> {
    /// Maps a fresh staging buffer, copies `data` in and unmaps it.
    pub(crate) fn new(device: &'d D, data: &[u8]) -> anyhow::Result<Self> {
        let raw = device.create_staging_buffer(data)?;
        Ok(Self {
            device,
            raw,
            size: data.len() as u64,
        })
    }

    pub(crate) fn raw(&self) -> &D::StagingBuffer {
        &self.raw
    }

    pub(crate) fn size(&self) -> u64 {
        self.size
    }
}

impl<D: GpuDevice> Drop for Staging<'_, D> {
    fn drop(&mut self) {
        self.device.release_staging_buffer(&self.raw);
    }
}

/// Rounds `value` up to the next multiple of `alignment`.
pub fn align_to(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

/// Pads `data` with zeros so its length is a multiple of `alignment`.
pub fn pad_to_alignment(data: &[u8], alignment: u64) -> Cow<'_, [u8]> {
    let padded = align_to(data.len() as u64, alignment) as usize;
    if padded == data.len() {
        Cow::Borrowed(data)
    } else {
        let mut out = Vec::with_capacity(padded);
        out.extend_from_slice(data);
        out.resize(padded, 0);
        Cow::Owned(out)
    }
}

/// Re-packs tightly packed texel rows so every row starts on `pitch` bytes.
///
/// Returns the input unchanged when `row_bytes` already equals `pitch`.
pub fn pad_rows(pixels: &[u8], row_bytes: usize, rows: usize, pitch: usize) -> Cow<'_, [u8]> {
    debug_assert!(pitch >= row_bytes);
    debug_assert_eq!(pixels.len(), row_bytes * rows);
    if pitch == row_bytes {
        return Cow::Borrowed(pixels);
    }
    let mut out = vec![0u8; pitch * rows];
    for (src, dst) in pixels.chunks_exact(row_bytes).zip(out.chunks_exact_mut(pitch)) {
        dst[..row_bytes].copy_from_slice(src);
    }
    Cow::Owned(out)
}
