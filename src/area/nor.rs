//! NOR-flash-shaped storage area: limited overwrite, optional auto-erase.
//!
//! Grounded in `storage_area_flash.c`: writes may only clear bits (1→0),
//! an erase block must be erased before its bits can be set back to the
//! erase value, and `SA_PROP_LOVRWRITE` governs the same write-block
//! buffering used by every medium in this crate.

use super::{
    buffered_writev, check_range, chunks_len, EraseArea, IoctlCmd, IoctlValue, Properties,
    ReadArea, ReadChunk, WriteArea, WriteChunk,
};
use crate::error::{Error, Result};

/// A NOR-flash-shaped storage area of `CAP` bytes split into `BLOCKS` erase
/// blocks.
///
/// When constructed with `auto_erase: true`, the area erases an erase
/// block lazily the first time it is written to after being dirtied,
/// mirroring `SA_PROP_AUTOERASE` media. Otherwise the caller must call
/// [`EraseArea::erase`] before writing into a dirty block, or the write
/// fails with [`Error::MediumError`] when it would require setting a bit
/// from 0 to 1.
#[derive(Debug)]
pub struct NorFlashArea<const CAP: usize, const BLOCKS: usize> {
    mem: [u8; CAP],
    erased: [bool; BLOCKS],
    write_size: usize,
    erase_size: usize,
    props: Properties,
}

impl<const CAP: usize, const BLOCKS: usize> NorFlashArea<CAP, BLOCKS> {
    /// Creates a NOR flash area. `erase_size * BLOCKS` must equal `CAP`.
    pub fn new(write_size: usize, erase_size: usize, auto_erase: bool) -> Result<Self> {
        if write_size == 0 || !write_size.is_power_of_two() {
            return Err(Error::InvalidConfig);
        }
        if erase_size == 0 || erase_size % write_size != 0 {
            return Err(Error::InvalidConfig);
        }
        if erase_size.checked_mul(BLOCKS) != Some(CAP) {
            return Err(Error::InvalidConfig);
        }
        let mut props = Properties::LIMITED_OVERWRITE;
        if auto_erase {
            props |= Properties::AUTO_ERASE;
        }
        Ok(Self {
            mem: [0xFFu8; CAP],
            erased: [true; BLOCKS],
            write_size,
            erase_size,
            props,
        })
    }
}

impl<const CAP: usize, const BLOCKS: usize> ReadArea for NorFlashArea<CAP, BLOCKS> {
    fn write_block_size(&self) -> usize {
        self.write_size
    }

    fn erase_block_size(&self) -> usize {
        self.erase_size
    }

    fn erase_block_count(&self) -> usize {
        BLOCKS
    }

    fn properties(&self) -> Properties {
        self.props
    }

    fn readv(&mut self, offset: usize, chunks: &mut [ReadChunk<'_>]) -> Result<()> {
        let len = super::read_chunks_len(chunks);
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

impl<const CAP: usize, const BLOCKS: usize> WriteArea for NorFlashArea<CAP, BLOCKS> {
    fn writev(&mut self, offset: usize, chunks: &[WriteChunk<'_>]) -> Result<()> {
        if self.props.contains(Properties::READONLY) {
            return Err(Error::ReadOnly);
        }
        let len = chunks_len(chunks);
        check_range(self.size(), offset, len)?;

        let write_size = self.write_size;
        let erase_size = self.erase_size;
        let auto_erase = self.props.contains(Properties::AUTO_ERASE);
        let erase_value = self.erase_value();
        let mem = &mut self.mem;
        let erased = &mut self.erased;

        buffered_writev(offset, chunks, write_size, |off, data| {
            for (i, &b) in data.iter().enumerate() {
                let addr = off + i;
                let block = addr / erase_size;
                if auto_erase && !erased[block] {
                    let bstart = block * erase_size;
                    mem[bstart..bstart + erase_size].fill(erase_value);
                    erased[block] = true;
                }
                let old = mem[addr];
                if (old & b) != b {
                    return Err(Error::MediumError);
                }
                mem[addr] = b;
                if b != erase_value {
                    erased[block] = false;
                }
            }
            Ok(())
        })
    }
}

impl<const CAP: usize, const BLOCKS: usize> EraseArea for NorFlashArea<CAP, BLOCKS> {
    fn erase(&mut self, start_block: usize, count: usize) -> Result<()> {
        if self.props.contains(Properties::READONLY) {
            return Err(Error::ReadOnly);
        }
        if start_block + count > BLOCKS {
            return Err(Error::OutOfRange);
        }
        let ev = self.erase_value();
        let erase_size = self.erase_size;
        for block in start_block..start_block + count {
            let start = block * erase_size;
            self.mem[start..start + erase_size].fill(ev);
            self.erased[block] = true;
        }
        Ok(())
    }
}
