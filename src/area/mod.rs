//! # Storage area abstraction
//!
//! A storage area is a region of a block device with a constant write-block
//! size `W`, a constant erase-block size `E`, and a fixed number of erase
//! blocks. It unifies flash, EEPROM, RAM and disk behind one interface so
//! that the record store in [`crate::store`] can be written once and backed
//! by any of them.
//!
//! # Design Philosophy
//!
//! - **Technology agnostic**: the trait hierarchy exposes only the
//!   properties every medium can honestly report (write size, erase size,
//!   erase count, a small property bitset); it never assumes erase exists,
//!   or that overwrite is free.
//! - **Write-block discipline**: every medium, even RAM, is written through
//!   the same [`buffered_writev`] algorithm so that partial, unaligned
//!   writes are buffered and flushed in `W`-sized blocks exactly the way a
//!   real flash or EEPROM part requires.
//! - **`no_std` first**: no allocation; chunk lists and scratch buffers are
//!   bounded and stack-resident.
//!
//! # Layers
//!
//! - [`ReadArea`]: size, write/erase geometry, properties, and reads.
//! - [`WriteArea`]: buffered, write-block-aligned programming.
//! - [`EraseArea`]: erase-block erasure, for media that need it.
//!
//! # Adapters
//!
//! - [`RamArea`]: `FULL_OVERWRITE`, arbitrary bit transitions.
//! - [`NorFlashArea`]: `LIMITED_OVERWRITE`, optional `AUTO_ERASE`,
//!   enforces the 1→0 bit-transition rule of real NOR flash.
//! - [`EepromArea`]: `FULL_OVERWRITE`, byte-grain writes.

mod eeprom;
mod nor;
mod ram;

pub use eeprom::EepromArea;
pub use nor::NorFlashArea;
pub use ram::RamArea;

use crate::error::{Error, Result};

/// Upper bound on the write-block size (`W`) any adapter in this crate may
/// declare, and the size of the stack scratch buffer used to flush
/// write-block-aligned data.
pub const MAX_WRITE_BLOCK: usize = 512;

/// The value a freshly erased byte holds.
pub const FILL_VALUE: u8 = 0xFF;

/// Bitset of properties describing how a storage area may be used.
///
/// Exactly one of [`Properties::FULL_OVERWRITE`] or
/// [`Properties::LIMITED_OVERWRITE`] is expected to be set for a writable
/// area (a read-only area sets neither).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Properties(u8);

impl Properties {
    /// The area cannot be written or erased.
    pub const READONLY: Properties = Properties(0x01);
    /// Any byte may be overwritten with any value without an erase (RAM,
    /// RRAM, battery-backed SRAM).
    pub const FULL_OVERWRITE: Properties = Properties(0x02);
    /// Only 1→0 bit transitions are possible without an erase (NOR flash).
    pub const LIMITED_OVERWRITE: Properties = Properties(0x04);
    /// The erased value of a byte is `0x00` rather than `0xFF`.
    pub const ZERO_ERASE: Properties = Properties(0x08);
    /// The medium erases implicitly on write; an explicit `erase` call is
    /// not required before writing into a previously written block.
    pub const AUTO_ERASE: Properties = Properties(0x10);

    /// The empty property set.
    pub const fn empty() -> Self {
        Properties(0)
    }

    /// Whether `self` carries every bit set in `other`.
    pub const fn contains(self, other: Properties) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl core::ops::BitOr for Properties {
    type Output = Properties;
    fn bitor(self, rhs: Properties) -> Properties {
        Properties(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for Properties {
    fn bitor_assign(&mut self, rhs: Properties) {
        self.0 |= rhs.0;
    }
}

/// A single destination span for a read.
#[derive(Debug)]
pub struct ReadChunk<'a> {
    /// Destination bytes.
    pub data: &'a mut [u8],
}

/// A single source span for a write.
#[derive(Debug, Clone, Copy)]
pub struct WriteChunk<'a> {
    /// Source bytes.
    pub data: &'a [u8],
}

/// Total length spanned by a list of read chunks.
pub fn read_chunks_len(chunks: &[ReadChunk<'_>]) -> usize {
    chunks.iter().map(|c| c.data.len()).sum()
}

/// Total length spanned by a list of write chunks.
pub fn chunks_len(chunks: &[WriteChunk<'_>]) -> usize {
    chunks.iter().map(|c| c.data.len()).sum()
}

/// Commands understood by [`ReadArea::ioctl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoctlCmd {
    /// Retrieve the area's execute-in-place address, if it is memory-mapped.
    XipAddress,
}

/// Results returned by [`ReadArea::ioctl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoctlValue {
    /// The area's execute-in-place address.
    XipAddress(usize),
}

/// Read-side geometry, properties and data access for a storage area.
pub trait ReadArea {
    /// The write-block size `W`, in bytes. Always a power of two.
    fn write_block_size(&self) -> usize;

    /// The erase-block size `E`, in bytes. A multiple of `W`.
    fn erase_block_size(&self) -> usize;

    /// The number of erase blocks in the area.
    fn erase_block_count(&self) -> usize;

    /// The property bitset describing this area.
    fn properties(&self) -> Properties;

    /// Total addressable size, `erase_block_size() * erase_block_count()`.
    fn size(&self) -> usize {
        self.erase_block_size() * self.erase_block_count()
    }

    /// The byte value a freshly erased region holds.
    fn erase_value(&self) -> u8 {
        if self.properties().contains(Properties::ZERO_ERASE) {
            0x00
        } else {
            FILL_VALUE
        }
    }

    /// Scatter-read into `chunks`, starting at byte `offset`.
    fn readv(&mut self, offset: usize, chunks: &mut [ReadChunk<'_>]) -> Result<()>;

    /// Read a single contiguous span starting at byte `offset`.
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<()> {
        let mut chunks = [ReadChunk { data: buf }];
        self.readv(offset, &mut chunks)
    }

    /// Query a medium-specific property not covered by [`Properties`].
    fn ioctl(&mut self, _cmd: IoctlCmd) -> Result<IoctlValue> {
        Err(Error::NotSupported)
    }
}

/// Write access to a storage area, buffered at write-block granularity.
pub trait WriteArea: ReadArea {
    /// Gather-write `chunks`, starting at byte `offset`. The total chunk
    /// length must be a multiple of [`ReadArea::write_block_size`].
    fn writev(&mut self, offset: usize, chunks: &[WriteChunk<'_>]) -> Result<()>;

    /// Write a single contiguous span starting at byte `offset`.
    fn write(&mut self, offset: usize, buf: &[u8]) -> Result<()> {
        let chunks = [WriteChunk { data: buf }];
        self.writev(offset, &chunks)
    }
}

/// Erase access for media whose write discipline requires it.
pub trait EraseArea: WriteArea {
    /// Erase `count` erase blocks starting at `start_block`.
    fn erase(&mut self, start_block: usize, count: usize) -> Result<()>;
}

/// Checks that a `[offset, offset+len)` span lies within `size` bytes.
pub(crate) fn check_range(size: usize, offset: usize, len: usize) -> Result<()> {
    if len > size || offset > size - len {
        Err(Error::OutOfRange)
    } else {
        Ok(())
    }
}

/// Buffers a gather-write of arbitrary-length chunks into
/// `align`-byte-aligned writes, the way real flash and EEPROM parts
/// require. Bytes that don't fill a whole aligned block are held in a
/// stack-resident scratch buffer and flushed once enough data has
/// accumulated; a final partial block is an error, since every record
/// frame and sector fill in this crate produces an aligned total length.
///
/// `raw_write` performs the actual `align`-sized write to the medium.
pub(crate) fn buffered_writev<F>(
    mut offset: usize,
    chunks: &[WriteChunk<'_>],
    align: usize,
    mut raw_write: F,
) -> Result<()>
where
    F: FnMut(usize, &[u8]) -> Result<()>,
{
    if align == 0 || align > MAX_WRITE_BLOCK || !align.is_power_of_two() {
        return Err(Error::InvalidConfig);
    }

    let mut buf = [0u8; MAX_WRITE_BLOCK];
    let mut bpos = 0usize;

    for chunk in chunks {
        let mut data = chunk.data;

        if bpos != 0 {
            let cplen = core::cmp::min(data.len(), align - bpos);
            buf[bpos..bpos + cplen].copy_from_slice(&data[..cplen]);
            bpos += cplen;
            data = &data[cplen..];
            if bpos == align {
                raw_write(offset, &buf[..align])?;
                offset += align;
                bpos = 0;
            }
        }

        if data.len() >= align {
            let wrlen = data.len() & !(align - 1);
            raw_write(offset, &data[..wrlen])?;
            offset += wrlen;
            data = &data[wrlen..];
        }

        if !data.is_empty() {
            buf[..data.len()].copy_from_slice(data);
            bpos = data.len();
        }
    }

    if bpos != 0 {
        return Err(Error::InvalidAlignment);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;

    fn collecting_write(writes: &mut std::vec::Vec<(usize, std::vec::Vec<u8>)>) -> impl FnMut(usize, &[u8]) -> Result<()> + '_ {
        move |offset, data| {
            writes.push((offset, data.to_vec()));
            Ok(())
        }
    }

    #[test]
    fn buffered_writev_coalesces_unaligned_spans_into_aligned_blocks() {
        let mut writes = std::vec::Vec::new();
        let chunks = [
            WriteChunk { data: &[1, 2, 3] },
            WriteChunk { data: &[4, 5] },
            WriteChunk { data: &[6, 7, 8] },
        ];
        buffered_writev(0, &chunks, 4, collecting_write(&mut writes)).unwrap();

        assert_eq!(writes, std::vec![(0usize, std::vec![1u8, 2, 3, 4]), (4, std::vec![5u8, 6, 7, 8])]);
    }

    #[test]
    fn buffered_writev_passes_through_long_aligned_runs_without_buffering() {
        let mut writes = std::vec::Vec::new();
        let data = [0xAAu8; 16];
        let chunks = [WriteChunk { data: &data }];
        buffered_writev(100, &chunks, 8, collecting_write(&mut writes)).unwrap();

        assert_eq!(writes, std::vec![(100usize, data.to_vec())]);
    }

    #[test]
    fn buffered_writev_rejects_a_final_partial_block() {
        let mut writes = std::vec::Vec::new();
        let chunks = [WriteChunk { data: &[1, 2, 3] }];
        assert_eq!(
            buffered_writev(0, &chunks, 4, collecting_write(&mut writes)).unwrap_err(),
            Error::InvalidAlignment
        );
    }

    #[test]
    fn buffered_writev_rejects_non_power_of_two_alignment() {
        let mut writes = std::vec::Vec::new();
        let chunks = [WriteChunk { data: &[1, 2, 3] }];
        assert_eq!(
            buffered_writev(0, &chunks, 3, collecting_write(&mut writes)).unwrap_err(),
            Error::InvalidConfig
        );
    }

    #[test]
    fn properties_contains_checks_every_requested_bit() {
        let both = Properties::FULL_OVERWRITE | Properties::AUTO_ERASE;
        assert!(both.contains(Properties::FULL_OVERWRITE));
        assert!(both.contains(Properties::AUTO_ERASE));
        assert!(!both.contains(Properties::LIMITED_OVERWRITE));
        assert!(both.contains(Properties::empty()));
    }
}

/// Validates that an area reports an internally consistent geometry:
/// `write_block_size` a power of two no larger than [`MAX_WRITE_BLOCK`],
/// and `erase_block_size` a multiple of it.
///
/// Gated behind the `verify-geometry` feature; mount-time callers pay for
/// this check only when they've opted into it.
#[cfg(feature = "verify-geometry")]
pub fn verify_geometry<A: ReadArea>(area: &A) -> Result<()> {
    let w = area.write_block_size();
    let e = area.erase_block_size();
    if w == 0 || !w.is_power_of_two() || w > MAX_WRITE_BLOCK {
        return Err(Error::InvalidConfig);
    }
    if e == 0 || e % w != 0 {
        return Err(Error::InvalidConfig);
    }
    Ok(())
}
