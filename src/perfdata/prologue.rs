//! Reader for the fixed-layout prologue at the start of a monitoring region.

use crate::perfdata::Endianness;
use crate::region::Region;
use crate::{Error, Result};
use byteorder::{BigEndian, ByteOrder};

/// Magic number at the start of every monitoring region.
///
/// Stored big-endian regardless of the region's declared byte order, since
/// the order flag itself is only discovered after the magic.
pub const PERF_DATA_MAGIC: u32 = 0xCAFE_C0C0;

/// Total size of the prologue for the supported major version.
pub const PROLOGUE_SIZE: usize = 32;

/// Lowest major version this reader understands.
pub const SUPPORTED_MAJOR_VERSION: u8 = 2;

// Field offsets within the prologue.
const OFF_BYTE_ORDER: usize = 4;
const OFF_MAJOR: usize = 5;
const OFF_MINOR: usize = 6;
const OFF_ACCESSIBLE: usize = 7;
const OFF_USED: usize = 8;
const OFF_OVERFLOW: usize = 12;
const OFF_MOD_TIMESTAMP: usize = 16;
const OFF_ENTRY_OFFSET: usize = 24;
const OFF_NUM_ENTRIES: usize = 28;

/// Validated header of a monitoring region.
///
/// Construction via [`Prologue::open`] checks the magic number, decodes the
/// byte-order flag, and gates on the major version; a failure of any of
/// these is fatal and no partial prologue is returned.
///
/// The producer updates `used`, `overflow`, the modification timestamp and
/// the accessible flag while readers are attached, so those accessors
/// re-read the region on every call rather than caching.
pub struct Prologue<'m, R: Region + ?Sized> {
    region: &'m R,
    order: Endianness,
    major: u8,
    minor: u8,
}

impl<'m, R: Region + ?Sized> Prologue<'m, R> {
    /// Validate the header of `region` and construct a prologue over it.
    pub fn open(region: &'m R) -> Result<Self> {
        let buf = region.bytes()?;
        if buf.len() < PROLOGUE_SIZE {
            return Err(Error::CorruptHeader(format!(
                "region of {} bytes is smaller than the {} byte prologue",
                buf.len(),
                PROLOGUE_SIZE
            )));
        }
        let magic = BigEndian::read_u32(&buf[..4]);
        if magic != PERF_DATA_MAGIC {
            return Err(Error::CorruptHeader(format!(
                "bad magic {:#010x}",
                magic
            )));
        }
        let order = Endianness::from_flag(buf[OFF_BYTE_ORDER]);
        let major = buf[OFF_MAJOR];
        let minor = buf[OFF_MINOR];
        if major < SUPPORTED_MAJOR_VERSION {
            return Err(Error::UnsupportedVersion { major, minor });
        }
        Ok(Prologue {
            region,
            order,
            major,
            minor,
        })
    }

    /// The region this prologue was opened over.
    pub fn region(&self) -> &'m R {
        self.region
    }

    /// Byte order of every multi-byte field after the magic.
    pub fn byte_order(&self) -> Endianness {
        self.order
    }

    /// Major version of the region format.
    pub fn major_version(&self) -> u8 {
        self.major
    }

    /// Minor version of the region format. Informational only.
    pub fn minor_version(&self) -> u8 {
        self.minor
    }

    /// Whether the producer has marked the region ready for readers.
    pub fn accessible(&self) -> Result<bool> {
        let buf = self.region.bytes()?;
        match buf.get(OFF_ACCESSIBLE) {
            Some(&b) => Ok(b != 0),
            None => Err(truncated()),
        }
    }

    /// Number of region bytes the producer has filled so far.
    ///
    /// This is the live high-water mark of the entry stream; it grows as
    /// the producer appends counters.
    pub fn used(&self) -> Result<i32> {
        self.field_i32(OFF_USED)
    }

    /// Number of bytes the producer failed to fit into the region.
    pub fn overflow(&self) -> Result<i32> {
        self.field_i32(OFF_OVERFLOW)
    }

    /// Timestamp of the producer's last structural modification.
    pub fn mod_timestamp(&self) -> Result<i64> {
        let buf = self.region.bytes()?;
        self.order
            .read_i64(buf, OFF_MOD_TIMESTAMP)
            .ok_or_else(truncated)
    }

    /// Offset of the first counter entry.
    pub fn entry_offset(&self) -> Result<i32> {
        self.field_i32(OFF_ENTRY_OFFSET)
    }

    /// Number of entries the producer claims to have written.
    pub fn num_entries(&self) -> Result<i32> {
        self.field_i32(OFF_NUM_ENTRIES)
    }

    fn field_i32(&self, off: usize) -> Result<i32> {
        let buf = self.region.bytes()?;
        self.order.read_i32(buf, off).ok_or_else(truncated)
    }
}

fn truncated() -> Error {
    Error::CorruptHeader(String::from("region truncated below the prologue"))
}

impl<'m, R: Region + ?Sized> Clone for Prologue<'m, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'m, R: Region + ?Sized> Copy for Prologue<'m, R> {}

impl<'m, R: Region + ?Sized> std::fmt::Debug for Prologue<'m, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Prologue")
            .field("byte_order", &self.order)
            .field("major", &self.major)
            .field("minor", &self.minor)
            .finish()
    }
}
