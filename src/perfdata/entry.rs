//! Decoder for individual counter entries within a monitoring region.

use crate::perfdata::{Endianness, TypeCode, Units, Variability};
use crate::{Error, Result};

/// Fixed size of the sub-header at the start of every entry.
pub(crate) const ENTRY_HEADER_SIZE: usize = 20;

/// Entries are produced on 4-byte boundaries.
pub(crate) const ENTRY_ALIGNMENT: usize = 4;

// Field offsets within the entry sub-header, relative to entry start.
const OFF_ENTRY_LENGTH: usize = 0;
const OFF_NAME_OFFSET: usize = 4;
const OFF_VECTOR_LENGTH: usize = 8;
const OFF_DATA_TYPE: usize = 12;
const OFF_FLAGS: usize = 13;
const OFF_UNITS: usize = 14;
const OFF_VARIABILITY: usize = 15;
const OFF_DATA_OFFSET: usize = 16;

/// Shape of a decoded counter, decided once per entry from its
/// `(type, unit, vector length)` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterKind {
    /// A single long value.
    ScalarLong,
    /// A vector of long values.
    LongVector,
    /// A raw byte vector.
    ByteVector,
    /// A nul-terminated text payload (byte vector with string units).
    Text,
}

/// A decoded counter, borrowing its payload from the live region.
///
/// Value accessors re-read the payload slice on every call, because the
/// producer updates values in place without synchronization; two reads of
/// the same counter may legitimately differ. Use [`Counter::snapshot`] to
/// copy a value out so it survives beyond the region's lifetime.
#[derive(Debug, Clone)]
pub struct Counter<'m> {
    name: String,
    units: Units,
    variability: Variability,
    flags: u8,
    kind: CounterKind,
    order: Endianness,
    vector_length: usize,
    payload: &'m [u8],
}

impl<'m> Counter<'m> {
    /// Name of the counter.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unit of measurement declared by the producer.
    pub fn units(&self) -> Units {
        self.units
    }

    /// Update classification declared by the producer.
    pub fn variability(&self) -> Variability {
        self.variability
    }

    /// Raw flag byte of the entry.
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Shape of this counter's value.
    pub fn kind(&self) -> CounterKind {
        self.kind
    }

    /// Declared vector length; `0` for scalar counters.
    pub fn vector_length(&self) -> usize {
        self.vector_length
    }

    /// Current value of a scalar long counter.
    ///
    /// Returns `None` for non-scalar counters.
    pub fn long_value(&self) -> Option<i64> {
        match self.kind {
            CounterKind::ScalarLong => self.order.read_i64(self.payload, 0),
            _ => None,
        }
    }

    /// Current value of element `idx` of a long counter.
    ///
    /// Element `0` of a scalar long counter is its value. Returns `None`
    /// for out-of-range indices and non-long counters.
    pub fn long_at(&self, idx: usize) -> Option<i64> {
        match self.kind {
            CounterKind::ScalarLong | CounterKind::LongVector => {
                self.order.read_i64(self.payload, idx.checked_mul(8)?)
            }
            _ => None,
        }
    }

    /// The raw payload bytes of the counter, as currently visible.
    pub fn bytes(&self) -> &'m [u8] {
        self.payload
    }

    /// Current value of a text counter.
    ///
    /// Returns `None` for non-text counters.
    pub fn text(&self) -> Option<String> {
        match self.kind {
            CounterKind::Text => Some(self.decode_text()),
            _ => None,
        }
    }

    /// Materialize the counter's current value.
    pub fn value(&self) -> CounterData {
        match self.kind {
            CounterKind::ScalarLong => CounterData::Long(self.order.get_i64(self.payload)),
            CounterKind::LongVector => CounterData::Longs(
                self.payload
                    .chunks_exact(8)
                    .map(|c| self.order.get_i64(c))
                    .collect(),
            ),
            CounterKind::ByteVector => CounterData::Bytes(self.payload.to_vec()),
            CounterKind::Text => CounterData::Text(self.decode_text()),
        }
    }

    /// Copy the counter out of the region.
    ///
    /// The snapshot owns its name and payload and remains valid after the
    /// region is unmapped or overwritten. This is the only way to retain a
    /// counter value beyond the current scan.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            name: self.name.clone(),
            units: self.units,
            variability: self.variability,
            flags: self.flags,
            data: self.value(),
        }
    }

    /// Decode the text payload: stop at the first nul byte or the vector
    /// end, whichever comes first. Payloads of a single byte or less hold
    /// no characters before their terminator.
    fn decode_text(&self) -> String {
        if self.payload.len() <= 1 {
            return String::new();
        }
        let end = self
            .payload
            .iter()
            .position(|&b| b == 0)
            .unwrap_or_else(|| self.payload.len());
        String::from_utf8_lossy(&self.payload[..end]).into_owned()
    }
}

/// The value carried by a counter, materialized at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub enum CounterData {
    /// A scalar long value.
    Long(i64),
    /// A vector of long values.
    Longs(Vec<i64>),
    /// A raw byte vector.
    Bytes(Vec<u8>),
    /// A decoded string.
    Text(String),
}

/// An owned copy of a counter's value and metadata.
///
/// Unlike [`Counter`], a snapshot is detached from the region and may
/// outlive it.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterSnapshot {
    name: String,
    units: Units,
    variability: Variability,
    flags: u8,
    data: CounterData,
}

impl CounterSnapshot {
    /// Name of the counter.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unit of measurement declared by the producer.
    pub fn units(&self) -> Units {
        self.units
    }

    /// Update classification declared by the producer.
    pub fn variability(&self) -> Variability {
        self.variability
    }

    /// Raw flag byte of the entry.
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// The copied value.
    pub fn data(&self) -> &CounterData {
        &self.data
    }
}

/// Result of decoding one entry: how far to advance the cursor, and the
/// counter if the entry had a recognized shape.
pub(crate) struct DecodedEntry<'m> {
    pub length: usize,
    pub counter: Option<Counter<'m>>,
}

/// Decode the entry starting at `off`.
///
/// `limit` bounds the entry itself (the producer's live `used` mark,
/// clamped to the buffer); name and payload offsets are additionally
/// checked against the full buffer. Structural violations fail with
/// `CorruptEntry`; an entry of unrecognized but structurally valid shape
/// yields no counter and must still advance the cursor by its length.
pub(crate) fn decode_entry<'m>(
    buf: &'m [u8],
    off: usize,
    limit: usize,
    order: Endianness,
) -> Result<DecodedEntry<'m>> {
    let corrupt = |reason: &'static str| Error::CorruptEntry {
        offset: off,
        reason,
    };

    let entry_length = order
        .read_i32(buf, off + OFF_ENTRY_LENGTH)
        .ok_or_else(|| corrupt("entry header past end of region"))?;
    if entry_length <= 0 {
        return Err(corrupt("non-positive entry length"));
    }
    let length = entry_length as usize;
    let entry_end = off
        .checked_add(length)
        .ok_or_else(|| corrupt("entry length overflows the region"))?;
    if entry_end > limit {
        return Err(corrupt("entry extends past the used bytes of the region"));
    }
    if length < ENTRY_HEADER_SIZE {
        return Err(corrupt("entry shorter than its fixed sub-header"));
    }

    let name_offset = order
        .read_i32(buf, off + OFF_NAME_OFFSET)
        .ok_or_else(|| corrupt("entry header past end of region"))?;
    let vector_length = order
        .read_i32(buf, off + OFF_VECTOR_LENGTH)
        .ok_or_else(|| corrupt("entry header past end of region"))?;
    let data_type = TypeCode::from_byte(buf[off + OFF_DATA_TYPE]);
    let flags = buf[off + OFF_FLAGS];
    let units = Units::from_byte(buf[off + OFF_UNITS]);
    let variability = Variability::from_byte(buf[off + OFF_VARIABILITY]);
    let data_offset = order
        .read_i32(buf, off + OFF_DATA_OFFSET)
        .ok_or_else(|| corrupt("entry header past end of region"))?;

    if units == Units::Invalid {
        return Err(corrupt("unrecognized units tag"));
    }
    if variability == Variability::Invalid {
        return Err(corrupt("unrecognized variability tag"));
    }
    if name_offset < 0 || vector_length < 0 || data_offset < 0 {
        return Err(corrupt("negative field in entry header"));
    }

    let name_start = off
        .checked_add(name_offset as usize)
        .filter(|&s| s <= buf.len())
        .ok_or_else(|| corrupt("name offset out of bounds"))?;
    let name_len = buf[name_start..]
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| corrupt("counter name missing nul terminator"))?;
    let name = std::str::from_utf8(&buf[name_start..name_start + name_len])
        .map_err(|_| corrupt("counter name is not valid UTF-8"))?;

    let elements = std::cmp::max(vector_length as usize, 1);
    let payload_size = data_type
        .element_size()
        .checked_mul(elements)
        .ok_or_else(|| corrupt("payload size overflows the region"))?;
    let data_start = off
        .checked_add(data_offset as usize)
        .ok_or_else(|| corrupt("data offset out of bounds"))?;
    let data_end = data_start
        .checked_add(payload_size)
        .filter(|&e| e <= buf.len())
        .ok_or_else(|| corrupt("payload out of bounds"))?;

    let kind = match (data_type, units, vector_length) {
        (TypeCode::Byte, Units::String, v) if v > 0 => Some(CounterKind::Text),
        (TypeCode::Byte, _, v) if v > 0 => Some(CounterKind::ByteVector),
        (TypeCode::Long, _, 0) => Some(CounterKind::ScalarLong),
        (TypeCode::Long, _, v) if v > 0 => Some(CounterKind::LongVector),
        _ => None,
    };

    let counter = kind.map(|kind| Counter {
        name: name.to_owned(),
        units,
        variability,
        flags,
        kind,
        order,
        vector_length: vector_length as usize,
        payload: &buf[data_start..data_end],
    });

    Ok(DecodedEntry { length, counter })
}
