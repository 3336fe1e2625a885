//! CRC-32/IEEE helpers for record framing.
//!
//! The original storage-area store computes CRC-32/IEEE with a hand-rolled
//! 16-entry nibble table. That table is bit-identical to the well-known
//! CRC-32/IEEE (polynomial `0xEDB88320`, init `!0`, inverted output), so
//! this crate computes it with [`crc32fast`] instead — already part of the
//! dependency stack, and hardware-accelerated where available.

use crate::area::{ReadArea, WriteChunk};
use crate::error::Result;

/// Size of the scratch buffer used to stream payload bytes off the medium
/// when computing a CRC over data that is not already in memory.
pub(crate) const SCAN_BUF: usize = 32;

/// Computes the CRC-32 over the logical concatenation of `chunks`,
/// skipping the first `skip` bytes (the unprotected header region of a
/// record, §3).
pub(crate) fn crc32_payload(skip: usize, chunks: &[WriteChunk<'_>]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    let mut remaining_skip = skip;
    for chunk in chunks {
        let data = chunk.data;
        if remaining_skip >= data.len() {
            remaining_skip -= data.len();
            continue;
        }
        hasher.update(&data[remaining_skip..]);
        remaining_skip = 0;
    }
    hasher.finalize()
}

/// Computes the CRC-32 over `len` bytes starting at `offset` in `area`,
/// skipping the first `skip` bytes, streaming through a small fixed-size
/// buffer rather than requiring the whole span in memory at once.
pub(crate) fn crc32_area_payload<A: ReadArea>(
    area: &mut A,
    offset: usize,
    len: usize,
    skip: usize,
) -> Result<u32> {
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = [0u8; SCAN_BUF];
    let mut pos = skip;
    while pos < len {
        let n = core::cmp::min(buf.len(), len - pos);
        area.read(offset + pos, &mut buf[..n])?;
        hasher.update(&buf[..n]);
        pos += n;
    }
    Ok(hasher.finalize())
}
