//! Utilities dealing with error handling in this crate.

use failure::Fail;

/// Errors produced by this crate.
#[derive(Debug, Fail)]
pub enum Error {
    /// Errors originating from calls to `std::io::*`.
    #[fail(display = "IO Error - {}", _0)]
    IO(#[cause] std::io::Error),
    /// Errors originating from calls to `libc` or other system utilties.
    #[fail(display = "System Error - {}", _0)]
    System(#[cause] nix::Error),
    /// Errors originating from calls to `regex::*`.
    #[fail(display = "Regex Error - {}", _0)]
    Regex(#[cause] regex::Error),
    /// Errors parsing Glob patterns.
    #[fail(display = "Glob Error - {}", _0)]
    GlobPattern(#[cause] glob::PatternError),
    /// The region's prologue is truncated or carries a bad magic number.
    #[fail(display = "Corrupt region header - {}", _0)]
    CorruptHeader(String),
    /// The region was written by a producer whose major version this reader
    /// does not understand.
    #[fail(display = "Unsupported perf data version {}.{}", major, minor)]
    UnsupportedVersion {
        /// Major version found in the prologue.
        major: u8,
        /// Minor version found in the prologue.
        minor: u8,
    },
    /// A counter entry violated a structural invariant of the format.
    #[fail(display = "Corrupt entry at offset {:#x} - {}", offset, reason)]
    CorruptEntry {
        /// Byte offset of the entry within the region.
        offset: usize,
        /// The invariant that was violated.
        reason: &'static str,
    },
    /// The underlying region cannot be read at all.
    ///
    /// Distinct from structural corruption within readable bytes: the
    /// mapping may have been revoked or the region file may be gone.
    #[fail(display = "Monitoring region is unavailable")]
    RegionUnavailable,
}

macro_rules! error_from {
    ($et: ty => $cet: expr) => {
        impl From<$et> for Error {
            #[inline]
            fn from(err: $et) -> Self {
                $cet(err)
            }
        }
    };
}

error_from!(std::io::Error => Error::IO);
error_from!(nix::Error => Error::System);
error_from!(regex::Error => Error::Regex);
error_from!(glob::PatternError => Error::GlobPattern);

/// Result type used in this crate.
pub type Result<T> = std::result::Result<T, Error>;
