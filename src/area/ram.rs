//! RAM-backed storage area: full overwrite, no erase constraints.
//!
//! Grounded in `storage_area_ram.c`: reads are a direct copy, writes go
//! through the same write-block buffering every medium uses, and erase
//! just fills the range with the erase value.

use super::{
    buffered_writev, check_range, chunks_len, read_chunks_len, EraseArea, IoctlCmd, IoctlValue,
    Properties, ReadArea, ReadChunk, WriteArea, WriteChunk,
};
use crate::error::{Error, Result};

/// A RAM-backed storage area of `CAP` bytes.
///
/// `CAP` must equal `erase_size * erase_blocks` as passed to [`RamArea::new`].
#[derive(Debug)]
pub struct RamArea<const CAP: usize> {
    mem: [u8; CAP],
    write_size: usize,
    erase_size: usize,
    erase_blocks: usize,
    props: Properties,
}

impl<const CAP: usize> RamArea<CAP> {
    /// Creates a RAM area with the given write-block size, erase-block
    /// size and erase-block count. `erase_size * erase_blocks` must equal
    /// `CAP`, `write_size` must be a power of two, and `erase_size` must be
    /// a multiple of `write_size`.
    pub fn new(write_size: usize, erase_size: usize, erase_blocks: usize) -> Result<Self> {
        if write_size == 0 || !write_size.is_power_of_two() {
            return Err(Error::InvalidConfig);
        }
        if erase_size == 0 || erase_size % write_size != 0 {
            return Err(Error::InvalidConfig);
        }
        if erase_size.checked_mul(erase_blocks) != Some(CAP) {
            return Err(Error::InvalidConfig);
        }
        Ok(Self {
            mem: [0xFFu8; CAP],
            write_size,
            erase_size,
            erase_blocks,
            props: Properties::FULL_OVERWRITE,
        })
    }
}

impl<const CAP: usize> ReadArea for RamArea<CAP> {
    fn write_block_size(&self) -> usize {
        self.write_size
    }

    fn erase_block_size(&self) -> usize {
        self.erase_size
    }

    fn erase_block_count(&self) -> usize {
        self.erase_blocks
    }

    fn properties(&self) -> Properties {
        self.props
    }

    fn readv(&mut self, offset: usize, chunks: &mut [ReadChunk<'_>]) -> Result<()> {
        let len = read_chunks_len(chunks);
        check_range(self.size(), offset, len)?;
        let mut pos = offset;
        for chunk in chunks.iter_mut() {
            let n = chunk.data.len();
            chunk.data.copy_from_slice(&self.mem[pos..pos + n]);
            pos += n;
        }
        Ok(())
    }

    fn ioctl(&mut self, cmd: IoctlCmd) -> Result<IoctlValue> {
        match cmd {
            IoctlCmd::XipAddress => Ok(IoctlValue::XipAddress(self.mem.as_ptr() as usize)),
        }
    }
}

impl<const CAP: usize> WriteArea for RamArea<CAP> {
    fn writev(&mut self, offset: usize, chunks: &[WriteChunk<'_>]) -> Result<()> {
        if self.props.contains(Properties::READONLY) {
            return Err(Error::ReadOnly);
        }
        let len = chunks_len(chunks);
        check_range(self.size(), offset, len)?;
        let write_size = self.write_size;
        let mem = &mut self.mem;
        buffered_writev(offset, chunks, write_size, |off, data| {
            mem[off..off + data.len()].copy_from_slice(data);
            Ok(())
        })
    }
}

impl<const CAP: usize> EraseArea for RamArea<CAP> {
    fn erase(&mut self, start_block: usize, count: usize) -> Result<()> {
        if self.props.contains(Properties::READONLY) {
            return Err(Error::ReadOnly);
        }
        if start_block + count > self.erase_blocks {
            return Err(Error::OutOfRange);
        }
        let ev = self.erase_value();
        let start = start_block * self.erase_size;
        let len = count * self.erase_size;
        self.mem[start..start + len].fill(ev);
        Ok(())
    }
}
