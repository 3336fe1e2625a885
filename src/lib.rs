//! # sectorlog - a log-structured record store for embedded non-volatile media
//!
//! `sectorlog` provides append-only storage of variable-sized records on top
//! of a uniform abstraction of block devices (NOR flash, EEPROM, RAM, disk
//! sectors). It guarantees record framing survives asynchronous power loss,
//! bounds reclamation cost to a caller-chosen number of spare sectors, and
//! supports persistence of selected records across wraparound via a
//! caller-supplied compaction policy. This library is designed for embedded
//! systems and supports `no_std` environments.
//!
//! ## Architecture
//!
//! The crate is a two-layer stack:
//!
//! - [`area`]: the storage-area abstraction (`ReadArea`/`WriteArea`/
//!   `EraseArea`), the write-block buffering algorithm shared by every
//!   medium, and concrete adapters (`RamArea`, `NorFlashArea`,
//!   `EepromArea`).
//! - [`store`]: the sector-partitioned circular record store
//!   (`RecordStore`), its three operating modes (read-only, simple
//!   circular buffer, persistent circular buffer), mount-time recovery,
//!   and the compaction algorithm.
//!
//! Every mutating entry point on [`store::RecordStore`] takes `&mut self`;
//! the borrow checker enforces single-writer exclusivity for the common
//! case of one owner on one thread of control. Reaching a store from more
//! than one preemption context (an interrupt handler alongside a
//! cooperative task) is left to the embedder, who should wrap it in
//! whatever mutex their target already provides.
//!
//! ## Optional Features
//!
//! - `std`: enable standard library support (default: disabled)
//! - `defmt`: enable defmt logging support for embedded debugging
//! - `verify-geometry`: validate area/store geometry invariants at
//!   mount time, at the cost of a few extra checks
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sectorlog::area::RamArea;
//! use sectorlog::store::{Cursor, RecordStore, RecordStoreConfig, StoreMode};
//!
//! let mut area = RamArea::<4096>::new(8, 1024, 4).unwrap();
//! let config = RecordStoreConfig {
//!     sector_size: 1024,
//!     sector_count: 4,
//!     spare_sectors: 0,
//!     cookie: None,
//!     crc_skip: 0,
//!     mode: StoreMode::Simple,
//! };
//! let mut store = RecordStore::new(config);
//! store.mount(&mut area, None::<&mut fn(_, _) -> bool>).unwrap();
//! store.write(&mut area, b"hello").unwrap();
//!
//! let mut cursor = Cursor::new();
//! let record = store.next(&mut area, &mut cursor).unwrap();
//! let mut buf = [0u8; 5];
//! store.read(&mut area, record, 0, &mut buf).unwrap();
//! assert_eq!(&buf, b"hello");
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]
#![doc(html_root_url = "https://shishir-dey.github.io/sectorlog/")]

/// Crate-wide error type and failure taxonomy.
pub mod error;

/// The storage-area abstraction: a uniform read/write/erase interface over
/// flash, EEPROM, RAM and disk, plus the medium adapters used to back it.
pub mod area;

/// The sector-partitioned circular record store built on top of [`area`].
pub mod store;

pub use error::{Error, Result};
