//! In-sector scanning: locating record frames within a single sector.
//!
//! Two related procedures live here:
//!
//! - [`probe_first_frame`]: a cheap, non-recovering check for whether a
//!   sector begins with a structurally valid frame, used by mount to
//!   locate the active sector and its generation counter.
//! - [`SectorScanner`]: the general in-sector walk used to compute the
//!   write frontier, to walk the cursor across records, and to walk the
//!   compaction/recovery reclamation windows. It tolerates torn writes by
//!   stepping forward one write block at a time ("recovery") when a
//!   candidate frame fails validation.

use super::crc::crc32_area_payload;
use super::record::{align_up, FRAME_OVERHEAD, HEADER_SIZE, MAGIC};
use crate::area::ReadArea;
use crate::error::Result;

/// Parameters for a single [`SectorScanner::next`] call.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ScanParams {
    pub sector_base: usize,
    pub sector_size: usize,
    pub write_size: usize,
    pub crc_skip: usize,
    /// Current store generation counter, ω.
    pub expected_wrap: u8,
    /// Index of the sector being scanned.
    pub sector_idx: usize,
    /// Index of the store's current active (write-frontier) sector, s.
    pub active_sector: usize,
    /// Tolerate and step over invalid candidates instead of stopping.
    pub recovery: bool,
    /// Stop once `offset` reaches this point (used when scanning the
    /// active sector up to its known write frontier).
    pub stop_at: Option<usize>,
}

/// Checks a candidate frame's stored generation byte against the
/// generation this scan is looking for.
///
/// A sector whose raw index is greater than the store's current active
/// sector has not yet been overwritten this wrap and still holds the
/// previous generation's records; bumping its stored byte by one
/// normalizes the comparison so both "this generation" and "not yet
/// reclaimed previous generation" sectors scan uniformly.
fn wrap_matches(stored: u8, sector_idx: usize, active_sector: usize, expected: u8) -> bool {
    let bump = if sector_idx > active_sector { 1 } else { 0 };
    stored.wrapping_add(bump) == expected
}

/// Walks record frames within one sector, starting at `start_offset`
/// (immediately past any sector cookie) and advancing past one frame on
/// each successful call.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SectorScanner {
    pub offset: usize,
    size: usize,
}

impl SectorScanner {
    pub fn new(start_offset: usize) -> Self {
        Self {
            offset: start_offset,
            size: 0,
        }
    }

    /// Resumes a walk from externally persisted state (a [`super::Cursor`]).
    pub fn resume(offset: usize, size: usize) -> Self {
        Self { offset, size }
    }

    /// Returns the payload size of the next valid frame, or `None` once
    /// the sector (or `stop_at`) is exhausted. On success, `self.offset`
    /// points at the frame's first byte.
    pub fn next<A: ReadArea>(&mut self, area: &mut A, p: &ScanParams) -> Result<Option<usize>> {
        loop {
            if self.size != 0 {
                self.offset += align_up(FRAME_OVERHEAD + self.size, p.write_size);
                self.size = 0;
            }

            if let Some(stop) = p.stop_at {
                if self.offset >= stop {
                    return Ok(None);
                }
            }
            if self.offset + HEADER_SIZE > p.sector_size {
                return Ok(None);
            }

            let mut hdr = [0u8; HEADER_SIZE];
            area.read(p.sector_base + self.offset, &mut hdr)?;

            let magic_ok = hdr[0] == MAGIC;
            let size = u16::from_le_bytes([hdr[2], hdr[3]]) as usize;
            let size_ok = magic_ok
                && size > 0
                && self.offset + align_up(FRAME_OVERHEAD + size, p.write_size) <= p.sector_size;
            let wrap_ok =
                size_ok && wrap_matches(hdr[1], p.sector_idx, p.active_sector, p.expected_wrap);

            if !wrap_ok {
                if !p.recovery {
                    return Ok(None);
                }
                #[cfg(feature = "defmt")]
                defmt::warn!(
                    "sector {}: invalid frame at offset {}, stepping {} bytes and retrying",
                    p.sector_idx,
                    self.offset,
                    p.write_size
                );
                self.offset += p.write_size;
                continue;
            }

            let payload_off = p.sector_base + self.offset + HEADER_SIZE;
            let mut crc_buf = [0u8; 4];
            area.read(payload_off + size, &mut crc_buf)?;
            let crc_stored = u32::from_le_bytes(crc_buf);
            let crc_calc = crc32_area_payload(area, payload_off, size, p.crc_skip)?;

            if crc_calc != crc_stored {
                if !p.recovery {
                    return Ok(None);
                }
                #[cfg(feature = "defmt")]
                defmt::warn!(
                    "sector {}: CRC mismatch at offset {}, skipping torn record",
                    p.sector_idx,
                    self.offset
                );
                self.offset += p.write_size;
                continue;
            }

            self.size = size;
            return Ok(Some(size));
        }
    }
}

/// Checks whether sector `sector_base` begins (immediately after any
/// cookie, at `start_offset`) with a single structurally and CRC valid
/// frame, without tolerating torn writes. Returns the frame's size and
/// raw generation byte.
///
/// Used only by mount to locate the active sector; the generation
/// comparison is deliberately skipped here; mount reads the raw byte and
/// decides what to do with it.
pub(crate) fn probe_first_frame<A: ReadArea>(
    area: &mut A,
    sector_base: usize,
    sector_size: usize,
    write_size: usize,
    crc_skip: usize,
    start_offset: usize,
) -> Result<Option<(usize, u8)>> {
    if start_offset + HEADER_SIZE > sector_size {
        return Ok(None);
    }
    let mut hdr = [0u8; HEADER_SIZE];
    area.read(sector_base + start_offset, &mut hdr)?;
    if hdr[0] != MAGIC {
        return Ok(None);
    }
    let size = u16::from_le_bytes([hdr[2], hdr[3]]) as usize;
    if size == 0 || start_offset + align_up(FRAME_OVERHEAD + size, write_size) > sector_size {
        return Ok(None);
    }
    let payload_off = sector_base + start_offset + HEADER_SIZE;
    let mut crc_buf = [0u8; 4];
    area.read(payload_off + size, &mut crc_buf)?;
    let crc_stored = u32::from_le_bytes(crc_buf);
    let crc_calc = crc32_area_payload(area, payload_off, size, crc_skip)?;
    if crc_calc != crc_stored {
        return Ok(None);
    }
    Ok(Some((size, hdr[1])))
}
