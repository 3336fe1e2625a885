//! # Record store
//!
//! A [`RecordStore`] partitions a [`crate::area`] into a fixed number of
//! equally sized sectors and writes variable-length, CRC-protected records
//! into them as an append-only, wraparound log. It never owns the backing
//! area: every operation takes it as an explicit `&mut A` parameter, which
//! keeps [`RecordHandle`] free of any reference back to the store that
//! produced it.
//!
//! # Operating modes
//!
//! - [`StoreMode::ReadOnly`]: mounts an existing log for reading only.
//! - [`StoreMode::Simple`]: a simple circular buffer; records are
//!   overwritten as the log wraps, with no attempt to preserve any of
//!   them.
//! - [`StoreMode::Persistent`]: a persistent circular buffer; a
//!   caller-supplied [`CompactPolicy`] relocates records worth keeping out
//!   of the reclamation window before their sectors are erased, and mount
//!   detects and completes a compaction interrupted by power loss.
//!
//! # Frame layout
//!
//! ```text
//! magic(1) wrapcnt(1) size(2 LE) payload(P) crc32(4 LE over payload[δ..]) pad
//! |------------------ 4 -------------------|------ P -----|----- 4 -----|
//! total length = align_up(8 + P, write_block_size)
//! ```
//!
//! `δ` (`crc_skip` in [`RecordStoreConfig`]) is the prefix of the payload
//! excluded from the CRC, enabling [`RecordStore::update`] to rewrite that
//! prefix in place without invalidating the record.

mod crc;
mod record;
mod scan;

pub use record::{CompactPolicy, Cursor, RecordHandle};

use crate::area::{
    chunks_len, read_chunks_len, EraseArea, Properties, ReadArea, ReadChunk, WriteArea, WriteChunk,
};
use crate::error::{Error, Result};
use crc::crc32_area_payload;
use crc::crc32_payload;
use record::{align_up, CRC_SIZE, FRAME_OVERHEAD, HEADER_SIZE, MAGIC};
use scan::{probe_first_frame, ScanParams, SectorScanner};

/// Upper bound on the write-block size this store supports; mirrors
/// [`crate::area::MAX_WRITE_BLOCK`] and bounds every stack scratch buffer
/// used for framing, fill, copy and read-modify-write.
pub const MAX_WRITE_BLOCK: usize = crate::area::MAX_WRITE_BLOCK;

/// Maximum number of source/destination spans a single [`RecordStore::writev`]
/// call may combine (caller chunks plus the header and CRC/pad frame).
pub const MAX_CHUNKS: usize = 10;

/// Size of the stack buffer used to peek at a record's payload when
/// presenting it to a [`CompactPolicy`], and for other small fixed reads.
pub const SCRATCH_LEN: usize = 64;

const FILL_VALUE: u8 = crate::area::FILL_VALUE;

/// The three ways a [`RecordStore`] may be mounted and operated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Mount an existing log for reading only; `write`/`writev`/`update`
    /// return [`Error::ReadOnly`].
    ReadOnly,
    /// A simple circular buffer: the oldest sector is unconditionally
    /// reused as the log wraps.
    Simple,
    /// A persistent circular buffer: a [`CompactPolicy`] decides which
    /// records in the reclamation window survive the next erase.
    Persistent,
}

/// Static configuration for a [`RecordStore`], validated against a backing
/// area's geometry at [`RecordStore::mount`] time.
#[derive(Debug, Clone, Copy)]
pub struct RecordStoreConfig<'c> {
    /// Size in bytes of each sector, `σ`. Must be a multiple of the area's
    /// write-block size, and `sector_size * sector_count` must not exceed
    /// the area's total size (a store may cover only a sub-area).
    pub sector_size: usize,
    /// Number of sectors the area is partitioned into, `κ`.
    pub sector_count: usize,
    /// Number of spare sectors reserved ahead of the write frontier for
    /// reclamation, `ς`. Ignored outside [`StoreMode::Persistent`], where
    /// `spare_sectors * sector_size` must be at least one erase block.
    pub spare_sectors: usize,
    /// An optional fixed byte string stamped at the start of every sector
    /// when the write frontier rotates into it, used to recognise sectors
    /// belonging to this store.
    pub cookie: Option<&'c [u8]>,
    /// Number of leading payload bytes excluded from a record's CRC-32,
    /// `δ`. Lets [`RecordStore::update`] rewrite that prefix without
    /// invalidating the record.
    pub crc_skip: usize,
    /// The store's operating mode.
    pub mode: StoreMode,
}

impl<'c> RecordStoreConfig<'c> {
    /// Validates this configuration against a backing area's geometry.
    pub fn validate<A: ReadArea>(&self, area: &A) -> Result<()> {
        let write_size = area.write_block_size();
        let erase_size = area.erase_block_size();

        if self.sector_count == 0 || self.sector_size == 0 {
            return Err(Error::InvalidConfig);
        }
        if write_size == 0 || self.sector_size % write_size != 0 {
            return Err(Error::InvalidConfig);
        }
        if self
            .sector_size
            .checked_mul(self.sector_count)
            .map_or(true, |n| n > area.size())
        {
            return Err(Error::InvalidConfig);
        }
        if self.sector_size >= erase_size {
            if self.sector_size % erase_size != 0 {
                return Err(Error::InvalidConfig);
            }
        } else if erase_size % self.sector_size != 0 {
            return Err(Error::InvalidConfig);
        }
        if let Some(cookie) = self.cookie {
            if cookie.len() > MAX_WRITE_BLOCK || cookie.len() >= self.sector_size {
                return Err(Error::InvalidConfig);
            }
        }
        if self.crc_skip > MAX_WRITE_BLOCK {
            return Err(Error::InvalidConfig);
        }
        if self.mode == StoreMode::Persistent {
            if self.spare_sectors == 0 || self.spare_sectors >= self.sector_count {
                return Err(Error::InvalidConfig);
            }
            if self.spare_sectors * self.sector_size < erase_size {
                return Err(Error::InvalidConfig);
            }
        }
        Ok(())
    }
}

/// A sector-partitioned, log-structured record store.
///
/// Does not own a backing area; every method that touches storage takes
/// one as an explicit parameter, so the same `RecordStore` state machine
/// works with any [`crate::area::ReadArea`]/`WriteArea`/`EraseArea`
/// implementation.
#[derive(Debug)]
pub struct RecordStore<'c> {
    config: RecordStoreConfig<'c>,
    sector: usize,
    offset: usize,
    wrap: u8,
    mounted: bool,
}

impl<'c> RecordStore<'c> {
    /// Creates an unmounted store with the given configuration.
    pub fn new(config: RecordStoreConfig<'c>) -> Self {
        Self {
            config,
            sector: 0,
            offset: 0,
            wrap: 0,
            mounted: false,
        }
    }

    /// Whether the store is currently mounted.
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    fn sector_base(&self, sector: usize) -> usize {
        sector * self.config.sector_size
    }

    fn next_sector(&self, sector: usize) -> usize {
        if sector + 1 >= self.config.sector_count {
            0
        } else {
            sector + 1
        }
    }

    fn prev_sector(&self, sector: usize) -> usize {
        if sector == 0 {
            self.config.sector_count - 1
        } else {
            sector - 1
        }
    }

    fn add_sectors(&self, sector: usize, n: usize) -> usize {
        (sector + n) % self.config.sector_count
    }

    fn cookie_offset(&self, write_size: usize) -> usize {
        align_up(self.config.cookie.map_or(0, |c| c.len()), write_size)
    }

    /// Mounts the store against `area`: scans existing sectors to locate
    /// the write frontier, and, in [`StoreMode::Persistent`], detects and
    /// completes a compaction interrupted by power loss using `policy`.
    ///
    /// Returns [`Error::AlreadyMounted`] if already mounted, or
    /// [`Error::InvalidConfig`] if the configuration does not fit `area`'s
    /// geometry.
    pub fn mount<A: EraseArea, P: CompactPolicy>(
        &mut self,
        area: &mut A,
        policy: Option<&mut P>,
    ) -> Result<()> {
        if self.mounted {
            return Err(Error::AlreadyMounted);
        }
        self.config.validate(area)?;

        #[cfg(feature = "verify-geometry")]
        crate::area::verify_geometry(area)?;

        let write_size = area.write_block_size();
        let cookie_offset = self.cookie_offset(write_size);

        let mut found_sector = self.config.sector_count;
        let mut wrap: u8 = 0;

        for i in 0..self.config.sector_count {
            #[cfg(feature = "defmt")]
            defmt::trace!("mount: probing sector {}", i);
            let base = self.sector_base(i);
            match probe_first_frame(
                area,
                base,
                self.config.sector_size,
                write_size,
                self.config.crc_skip,
                cookie_offset,
            )? {
                None => continue,
                Some((_size, w)) => {
                    if found_sector > i {
                        wrap = w;
                    }
                    if w != wrap {
                        break;
                    }
                    found_sector = i;
                }
            }
        }

        if found_sector == self.config.sector_count {
            #[cfg(feature = "defmt")]
            defmt::debug!("mount: no existing records found, starting a fresh log");
            self.sector = self.config.sector_count - 1;
            self.offset = self.config.sector_size;
            self.wrap = wrap;
            self.advance_inner(area)?;
        } else {
            #[cfg(feature = "defmt")]
            defmt::debug!("mount: active sector {} at generation {}", found_sector, wrap);
            self.sector = found_sector;
            self.wrap = wrap;

            let params = ScanParams {
                sector_base: self.sector_base(found_sector),
                sector_size: self.config.sector_size,
                write_size,
                crc_skip: self.config.crc_skip,
                expected_wrap: wrap,
                sector_idx: found_sector,
                active_sector: found_sector,
                recovery: true,
                stop_at: None,
            };
            let mut scanner = SectorScanner::new(cookie_offset);
            let mut loc = cookie_offset;
            loop {
                match scanner.next(area, &params)? {
                    None => break,
                    Some(size) => {
                        loc = scanner.offset + align_up(FRAME_OVERHEAD + size, write_size);
                    }
                }
            }
            self.offset = loc;
        }

        if self.config.mode == StoreMode::Persistent {
            if let Some(p) = policy {
                #[cfg(feature = "defmt")]
                defmt::debug!("mount: running persistent-mode recovery");
                self.recovery(area, p)?;
            }
        }

        self.mounted = true;
        Ok(())
    }

    /// Unmounts the store. Does not touch the backing area.
    pub fn unmount(&mut self) {
        self.mounted = false;
    }

    /// Erases the entire area. Requires the store to be unmounted.
    pub fn wipe<A: EraseArea>(&mut self, area: &mut A) -> Result<()> {
        if self.mounted {
            return Err(Error::InvalidArgument);
        }
        area.erase(0, area.erase_block_count())
    }

    /// Appends a single contiguous payload. Equivalent to
    /// `writev(area, &[WriteChunk { data }])`.
    pub fn write<A: EraseArea>(&mut self, area: &mut A, data: &[u8]) -> Result<()> {
        let chunks = [WriteChunk { data }];
        self.writev(area, &chunks)
    }

    /// Appends a record assembled from `chunks`, retrying at the next
    /// write block if the medium reports a failure for the current one,
    /// until either it succeeds or the sector has no room left.
    pub fn writev<A: EraseArea>(&mut self, area: &mut A, chunks: &[WriteChunk<'_>]) -> Result<()> {
        if !self.mounted {
            return Err(Error::NotMounted);
        }
        if self.config.mode == StoreMode::ReadOnly {
            return Err(Error::ReadOnly);
        }
        let payload_len = chunks_len(chunks);
        if payload_len == 0 || payload_len > u16::MAX as usize {
            return Err(Error::InvalidArgument);
        }
        if chunks.len() + 2 > MAX_CHUNKS {
            return Err(Error::InvalidArgument);
        }

        let write_size = area.write_block_size();

        loop {
            let needed = align_up(FRAME_OVERHEAD + payload_len + CRC_SIZE, write_size);
            if self.offset > self.config.sector_size || self.config.sector_size - self.offset < needed {
                return Err(Error::NoSpace);
            }
            match self.write_frame(area, chunks, payload_len, write_size) {
                Ok(()) => return Ok(()),
                Err(Error::MediumError) => {
                    self.offset += write_size;
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn write_frame<A: EraseArea>(
        &mut self,
        area: &mut A,
        chunks: &[WriteChunk<'_>],
        payload_len: usize,
        write_size: usize,
    ) -> Result<()> {
        let crc = crc32_payload(self.config.crc_skip, chunks);
        let size_bytes = (payload_len as u16).to_le_bytes();
        let header = [MAGIC, self.wrap, size_bytes[0], size_bytes[1]];

        let total_unaligned = FRAME_OVERHEAD + payload_len;
        let total_aligned = align_up(total_unaligned, write_size);
        let pad_len = total_aligned - total_unaligned;

        let mut tail = [FILL_VALUE; CRC_SIZE + MAX_WRITE_BLOCK];
        tail[..CRC_SIZE].copy_from_slice(&crc.to_le_bytes());
        let tail_len = CRC_SIZE + pad_len;

        let mut all: heapless::Vec<WriteChunk<'_>, MAX_CHUNKS> = heapless::Vec::new();
        all.push(WriteChunk { data: &header })
            .map_err(|_| Error::InvalidArgument)?;
        for c in chunks {
            all.push(*c).map_err(|_| Error::InvalidArgument)?;
        }
        all.push(WriteChunk {
            data: &tail[..tail_len],
        })
        .map_err(|_| Error::InvalidArgument)?;

        area.writev(self.sector_base(self.sector) + self.offset, &all)?;
        self.offset += total_aligned;
        Ok(())
    }

    /// Rotates the write frontier to the next sector, vacating the current
    /// one (filling its tail on [`Properties::FULL_OVERWRITE`] media,
    /// explicitly erasing the new one otherwise when it starts an erase
    /// block and the medium doesn't auto-erase) and re-stamping the
    /// configured cookie. Bumps the generation counter on wraparound to
    /// sector zero. Runs with no reclamation; [`Self::compact`] calls this
    /// first and then, in [`StoreMode::Persistent`], relocates retained
    /// records out of the sectors this just exposed to the next erase.
    pub fn advance<A: EraseArea>(&mut self, area: &mut A) -> Result<()> {
        if !self.mounted {
            return Err(Error::NotMounted);
        }
        self.advance_inner(area)
    }

    /// The actual frontier rotation, usable before `self.mounted` is set
    /// (mount's bootstrap path runs this to seat the frontier at the end
    /// of the log before it can call the public, mounted-gated entry
    /// points).
    fn advance_inner<A: EraseArea>(&mut self, area: &mut A) -> Result<()> {
        let props = area.properties();
        let write_size = area.write_block_size();
        let erase_size = area.erase_block_size();

        if props.contains(Properties::FULL_OVERWRITE) {
            self.fill_sector_tail(area)?;
        }

        self.sector = self.next_sector(self.sector);
        if self.sector == 0 {
            self.wrap = self.wrap.wrapping_add(1);
        }
        self.offset = 0;

        if !props.contains(Properties::FULL_OVERWRITE) && !props.contains(Properties::AUTO_ERASE) {
            let base = self.sector_base(self.sector);
            if base % erase_size == 0 {
                let block = base / erase_size;
                let blocks = core::cmp::max(1, self.config.sector_size / erase_size);
                area.erase(block, blocks)?;
            }
        }

        if let Some(cookie) = self.config.cookie {
            self.write_cookie(area, cookie, write_size)?;
        }
        Ok(())
    }

    fn fill_sector_tail<A: EraseArea>(&mut self, area: &mut A) -> Result<()> {
        if self.offset >= self.config.sector_size {
            return Ok(());
        }
        let buf = [FILL_VALUE; MAX_WRITE_BLOCK];
        let base = self.sector_base(self.sector);
        let mut pos = self.offset;
        while pos < self.config.sector_size {
            let n = core::cmp::min(buf.len(), self.config.sector_size - pos);
            area.write(base + pos, &buf[..n])?;
            pos += n;
        }
        Ok(())
    }

    fn write_cookie<A: EraseArea>(
        &mut self,
        area: &mut A,
        cookie: &[u8],
        write_size: usize,
    ) -> Result<()> {
        let aligned = align_up(cookie.len(), write_size);
        let mut buf = [FILL_VALUE; MAX_WRITE_BLOCK];
        buf[..cookie.len()].copy_from_slice(cookie);
        area.write(self.sector_base(self.sector), &buf[..aligned])?;
        self.offset = aligned;
        Ok(())
    }

    /// Advances the write frontier (see [`Self::advance`]), then, in
    /// [`StoreMode::Persistent`] and only when both a `policy` is supplied
    /// and the new frontier starts an erase block, walks the `ς` sectors in
    /// the reclamation window and relocates every record `policy` marks for
    /// retention ahead of the pending erase. Passing `None` degrades to a
    /// plain [`Self::advance`], which is all [`StoreMode::Simple`] and
    /// [`StoreMode::ReadOnly`] ever need.
    pub fn compact<A: EraseArea, P: CompactPolicy>(
        &mut self,
        area: &mut A,
        policy: Option<&mut P>,
    ) -> Result<()> {
        if !self.mounted {
            return Err(Error::NotMounted);
        }
        self.advance(area)?;
        let Some(policy) = policy else {
            return Ok(());
        };
        if self.config.mode != StoreMode::Persistent {
            return Ok(());
        }

        let erase_size = area.erase_block_size();
        if self.sector_base(self.sector) % erase_size != 0 {
            return Ok(());
        }

        let write_size = area.write_block_size();
        let cookie_offset = self.cookie_offset(write_size);
        let mut walk_sector = self.add_sectors(self.sector, self.config.spare_sectors);

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "compact: reclaiming window of {} sectors starting at {}",
            self.config.spare_sectors,
            walk_sector
        );

        for _ in 0..self.config.spare_sectors {
            self.compact_sector(area, policy, walk_sector, cookie_offset, write_size)?;
            walk_sector = self.next_sector(walk_sector);
        }
        Ok(())
    }

    fn compact_sector<A: EraseArea, P: CompactPolicy>(
        &mut self,
        area: &mut A,
        policy: &mut P,
        walk_sector: usize,
        cookie_offset: usize,
        write_size: usize,
    ) -> Result<()> {
        let mut scanner = SectorScanner::new(cookie_offset);
        loop {
            let params = ScanParams {
                sector_base: self.sector_base(walk_sector),
                sector_size: self.config.sector_size,
                write_size,
                crc_skip: self.config.crc_skip,
                expected_wrap: self.wrap,
                sector_idx: walk_sector,
                active_sector: self.sector,
                recovery: true,
                stop_at: None,
            };
            let size = match scanner.next(area, &params)? {
                None => break,
                Some(s) => s,
            };
            let record = RecordHandle {
                sector: walk_sector,
                offset: scanner.offset,
                size,
            };
            let mut peek = [0u8; SCRATCH_LEN];
            let n = core::cmp::min(size, peek.len());
            self.read_raw(area, record, 0, &mut peek[..n])?;

            if policy.keep(record, &peek[..n]) {
                loop {
                    match self.move_record(area, record, write_size) {
                        Ok(dst) => {
                            policy.moved(record, dst);
                            break;
                        }
                        Err(Error::NoSpace) => {
                            self.advance(area)?;
                            continue;
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }
        Ok(())
    }

    fn move_record<A: EraseArea>(
        &mut self,
        area: &mut A,
        record: RecordHandle,
        write_size: usize,
    ) -> Result<RecordHandle> {
        let frame_len = align_up(FRAME_OVERHEAD + record.size, write_size);
        if self.offset + frame_len > self.config.sector_size {
            return Err(Error::NoSpace);
        }

        let src_base = self.sector_base(record.sector) + record.offset;
        let dst_sector = self.sector;
        let dst_offset = self.offset;
        let dst_base = self.sector_base(dst_sector) + dst_offset;

        let mut buf = [0u8; MAX_WRITE_BLOCK];
        let mut pos = 0;
        let mut first = true;
        while pos < frame_len {
            let n = core::cmp::min(buf.len(), frame_len - pos);
            area.read(src_base + pos, &mut buf[..n])?;
            if first {
                buf[1] = self.wrap;
                first = false;
            }
            area.write(dst_base + pos, &buf[..n])?;
            pos += n;
        }

        self.offset += frame_len;
        Ok(RecordHandle {
            sector: dst_sector,
            offset: dst_offset,
            size: record.size,
        })
    }

    fn recovery<A: EraseArea, P: CompactPolicy>(
        &mut self,
        area: &mut A,
        policy: &mut P,
    ) -> Result<()> {
        let (s0, l0, w0) = (self.sector, self.offset, self.wrap);
        let erase_size = area.erase_block_size();
        let write_size = area.write_block_size();
        let cookie_offset = self.cookie_offset(write_size);

        let mut rolled = s0;
        while self.sector_base(rolled) % erase_size != 0 {
            rolled = self.prev_sector(rolled);
        }
        rolled = self.prev_sector(rolled);

        let m = self.count_retained(area, s0, policy, cookie_offset, write_size)?;
        let v = self.count_valid(area, rolled, cookie_offset, write_size)?;

        if v >= m {
            #[cfg(feature = "defmt")]
            defmt::debug!("recovery: {} valid >= {} retained, compaction already completed", v, m);
            self.sector = s0;
            self.offset = l0;
            self.wrap = w0;
            Ok(())
        } else {
            #[cfg(feature = "defmt")]
            defmt::warn!("recovery: {} valid < {} retained, re-running interrupted compaction", v, m);
            self.sector = rolled;
            self.offset = self.config.sector_size;
            self.compact(area, Some(policy))
        }
    }

    fn count_retained<A: EraseArea, P: CompactPolicy>(
        &mut self,
        area: &mut A,
        start: usize,
        policy: &mut P,
        cookie_offset: usize,
        write_size: usize,
    ) -> Result<usize> {
        let mut n = 0usize;
        let mut sector = start;
        for _ in 0..self.config.spare_sectors {
            let mut scanner = SectorScanner::new(cookie_offset);
            loop {
                let params = ScanParams {
                    sector_base: self.sector_base(sector),
                    sector_size: self.config.sector_size,
                    write_size,
                    crc_skip: self.config.crc_skip,
                    expected_wrap: self.wrap,
                    sector_idx: sector,
                    active_sector: self.sector,
                    recovery: true,
                    stop_at: None,
                };
                let size = match scanner.next(area, &params)? {
                    None => break,
                    Some(s) => s,
                };
                let record = RecordHandle {
                    sector,
                    offset: scanner.offset,
                    size,
                };
                let mut peek = [0u8; SCRATCH_LEN];
                let k = core::cmp::min(size, peek.len());
                self.read_raw(area, record, 0, &mut peek[..k])?;
                if policy.keep(record, &peek[..k]) {
                    n += 1;
                }
            }
            sector = self.next_sector(sector);
        }
        Ok(n)
    }

    fn count_valid<A: EraseArea>(
        &mut self,
        area: &mut A,
        start: usize,
        cookie_offset: usize,
        write_size: usize,
    ) -> Result<usize> {
        let mut n = 0usize;
        let mut sector = start;
        for _ in 0..self.config.spare_sectors {
            let mut scanner = SectorScanner::new(cookie_offset);
            loop {
                let params = ScanParams {
                    sector_base: self.sector_base(sector),
                    sector_size: self.config.sector_size,
                    write_size,
                    crc_skip: self.config.crc_skip,
                    expected_wrap: self.wrap,
                    sector_idx: sector,
                    active_sector: self.sector,
                    recovery: true,
                    stop_at: None,
                };
                match scanner.next(area, &params)? {
                    None => break,
                    Some(_) => n += 1,
                }
            }
            sector = self.next_sector(sector);
        }
        Ok(n)
    }

    /// Advances `cursor` to the next live record, oldest first, or returns
    /// [`Error::NotFound`] once the walk reaches the write frontier.
    pub fn next<A: EraseArea>(&mut self, area: &mut A, cursor: &mut Cursor) -> Result<RecordHandle> {
        if !self.mounted {
            return Err(Error::NotMounted);
        }
        let write_size = area.write_block_size();
        let cookie_offset = self.cookie_offset(write_size);

        if !cursor.initialized {
            cursor.sector = self.add_sectors(self.sector, self.config.spare_sectors + 1);
            cursor.offset = cookie_offset;
            cursor.size = 0;
            cursor.initialized = true;
        }

        loop {
            let mut scanner = SectorScanner::resume(cursor.offset, cursor.size);
            let params = ScanParams {
                sector_base: self.sector_base(cursor.sector),
                sector_size: self.config.sector_size,
                write_size,
                crc_skip: self.config.crc_skip,
                expected_wrap: self.wrap,
                sector_idx: cursor.sector,
                active_sector: self.sector,
                recovery: true,
                stop_at: if cursor.sector == self.sector {
                    Some(self.offset)
                } else {
                    None
                },
            };
            match scanner.next(area, &params)? {
                Some(size) => {
                    cursor.offset = scanner.offset;
                    cursor.size = size;
                    return Ok(RecordHandle {
                        sector: cursor.sector,
                        offset: scanner.offset,
                        size,
                    });
                }
                None => {
                    if cursor.sector == self.sector {
                        return Err(Error::NotFound);
                    }
                    cursor.sector = self.next_sector(cursor.sector);
                    cursor.offset = cookie_offset;
                    cursor.size = 0;
                }
            }
        }
    }

    fn read_raw<A: ReadArea>(
        &self,
        area: &mut A,
        record: RecordHandle,
        offset: usize,
        buf: &mut [u8],
    ) -> Result<()> {
        if offset + buf.len() > record.size {
            return Err(Error::OutOfRange);
        }
        let base = self.sector_base(record.sector) + record.offset + HEADER_SIZE + offset;
        area.read(base, buf)
    }

    /// Reads `buf.len()` payload bytes starting at `offset` within
    /// `record`.
    pub fn read<A: ReadArea>(
        &self,
        area: &mut A,
        record: RecordHandle,
        offset: usize,
        buf: &mut [u8],
    ) -> Result<()> {
        if !self.mounted {
            return Err(Error::NotMounted);
        }
        self.read_raw(area, record, offset, buf)
    }

    /// Scatter-reads `record`'s payload starting at `offset` into `chunks`,
    /// in order, the same way [`Self::writev`] walks its source chunks.
    pub fn readv<A: ReadArea>(
        &self,
        area: &mut A,
        record: RecordHandle,
        offset: usize,
        chunks: &mut [ReadChunk<'_>],
    ) -> Result<()> {
        if !self.mounted {
            return Err(Error::NotMounted);
        }
        let len = read_chunks_len(chunks);
        if offset + len > record.size {
            return Err(Error::OutOfRange);
        }
        let base = self.sector_base(record.sector) + record.offset + HEADER_SIZE + offset;
        area.readv(base, chunks)
    }

    /// Recomputes `record`'s CRC-32 over the medium and compares it to the
    /// stored value, independent of whether it was already validated by a
    /// scan that produced this handle.
    pub fn valid<A: ReadArea>(&self, area: &mut A, record: RecordHandle) -> Result<bool> {
        if !self.mounted {
            return Err(Error::NotMounted);
        }
        let payload_off = self.sector_base(record.sector) + record.offset + HEADER_SIZE;
        let mut crc_buf = [0u8; CRC_SIZE];
        area.read(payload_off + record.size, &mut crc_buf)?;
        let stored = u32::from_le_bytes(crc_buf);
        let calc = crc32_area_payload(area, payload_off, record.size, self.config.crc_skip)?;
        Ok(calc == stored)
    }

    /// Rewrites the first `data.len()` bytes of `record`'s payload in
    /// place, via read-modify-write at write-block granularity. Requires
    /// `data.len() <= crc_skip`, since those bytes are excluded from the
    /// record's CRC; only media advertising `FULL_OVERWRITE` or
    /// `LIMITED_OVERWRITE` support this.
    pub fn update<A: WriteArea>(&mut self, area: &mut A, record: RecordHandle, data: &[u8]) -> Result<()> {
        if !self.mounted {
            return Err(Error::NotMounted);
        }
        if self.config.mode == StoreMode::ReadOnly {
            return Err(Error::ReadOnly);
        }
        if data.len() > self.config.crc_skip {
            return Err(Error::InvalidArgument);
        }
        let props = area.properties();
        if !(props.contains(Properties::FULL_OVERWRITE) || props.contains(Properties::LIMITED_OVERWRITE)) {
            return Err(Error::NotSupported);
        }
        let write_size = area.write_block_size();
        let aligned_len = align_up(data.len(), write_size);
        if aligned_len > MAX_WRITE_BLOCK {
            return Err(Error::InvalidConfig);
        }
        let base = self.sector_base(record.sector) + record.offset + HEADER_SIZE;
        let mut buf = [0u8; MAX_WRITE_BLOCK];
        area.read(base, &mut buf[..aligned_len])?;
        buf[..data.len()].copy_from_slice(data);
        area.write(base, &buf[..aligned_len])
    }

    /// Reads the cookie stamped at the start of `sector`, if this store is
    /// configured with one.
    pub fn get_sector_cookie<A: ReadArea>(
        &self,
        area: &mut A,
        sector: usize,
        out: &mut [u8],
    ) -> Result<()> {
        let cookie = self.config.cookie.ok_or(Error::NotSupported)?;
        let n = core::cmp::min(out.len(), cookie.len());
        area.read(self.sector_base(sector), &mut out[..n])
    }
}
