//! Crate-wide error type shared by the storage-area and record-store layers.

/// A common error type for storage-area and record-store operations.
///
/// This enum defines the full failure taxonomy surfaced by this crate. It is
/// designed to be simple and portable for `no_std` environments, and maps
/// cleanly onto the errno-style codes used by comparable storage stacks.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// A caller-supplied argument violates a documented precondition.
    InvalidArgument,
    /// An access falls outside the bounds of the area or record.
    OutOfRange,
    /// An offset or length is not aligned to the medium's write block size.
    InvalidAlignment,
    /// The operation requires write access but the area or store is read-only.
    ReadOnly,
    /// The medium or mode does not support the requested operation.
    NotSupported,
    /// There is no room left to complete the append within the current sector.
    NoSpace,
    /// No further record could be found (e.g. a cursor walk reached the
    /// write frontier).
    NotFound,
    /// A record's stored CRC-32 does not match its payload.
    CrcMismatch,
    /// The store configuration fails geometry or invariant validation.
    InvalidConfig,
    /// `mount` was called on a store that is already mounted.
    AlreadyMounted,
    /// An operation requiring a mounted store was attempted before mounting.
    NotMounted,
    /// The underlying medium reported a failure (e.g. a bad block).
    MediumError,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Error::InvalidArgument => "invalid argument",
            Error::OutOfRange => "access out of range",
            Error::InvalidAlignment => "misaligned offset or length",
            Error::ReadOnly => "area or store is read-only",
            Error::NotSupported => "operation not supported",
            Error::NoSpace => "no space left in current sector",
            Error::NotFound => "no further record found",
            Error::CrcMismatch => "record crc mismatch",
            Error::InvalidConfig => "invalid store configuration",
            Error::AlreadyMounted => "store already mounted",
            Error::NotMounted => "store not mounted",
            Error::MediumError => "underlying medium error",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::InvalidArgument => defmt::write!(f, "InvalidArgument"),
            Error::OutOfRange => defmt::write!(f, "OutOfRange"),
            Error::InvalidAlignment => defmt::write!(f, "InvalidAlignment"),
            Error::ReadOnly => defmt::write!(f, "ReadOnly"),
            Error::NotSupported => defmt::write!(f, "NotSupported"),
            Error::NoSpace => defmt::write!(f, "NoSpace"),
            Error::NotFound => defmt::write!(f, "NotFound"),
            Error::CrcMismatch => defmt::write!(f, "CrcMismatch"),
            Error::InvalidConfig => defmt::write!(f, "InvalidConfig"),
            Error::AlreadyMounted => defmt::write!(f, "AlreadyMounted"),
            Error::NotMounted => defmt::write!(f, "NotMounted"),
            Error::MediumError => defmt::write!(f, "MediumError"),
        }
    }
}

/// Convenience alias for results returned by this crate.
pub type Result<T> = core::result::Result<T, Error>;
