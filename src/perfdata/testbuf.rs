//! Synthetic monitoring regions for tests.
//!
//! [`RegionBuilder`] lays out a well-formed region the way a producer
//! would; [`SharedBuf`] stands in for a live producer by letting tests
//! append entries and bump the `used` mark underneath an attached scanner.

use crate::perfdata::entry::ENTRY_HEADER_SIZE;
use crate::perfdata::{Endianness, Units, Variability, PERF_DATA_MAGIC, PROLOGUE_SIZE};
use crate::region::Region;
use crate::Result;
use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use std::cell::UnsafeCell;

/// Payload of a synthetic entry.
pub(crate) enum Payload<'a> {
    /// A scalar long: type `J`, vector length 0.
    Long(i64),
    /// A long vector: type `J`, vector length = element count.
    Longs(&'a [i64]),
    /// A byte vector: type `B`, vector length = byte count.
    Bytes(&'a [u8]),
    /// A nul-terminated string padded to `capacity`: type `B`.
    Text {
        /// The string content.
        s: &'a str,
        /// Declared vector length; must exceed the content length.
        capacity: usize,
    },
}

fn put_i32(out: &mut Vec<u8>, order: Endianness, v: i32) {
    match order {
        Endianness::Big => out.write_i32::<BigEndian>(v).unwrap(),
        Endianness::Little => out.write_i32::<LittleEndian>(v).unwrap(),
    }
}

fn put_i64(out: &mut Vec<u8>, order: Endianness, v: i64) {
    match order {
        Endianness::Big => out.write_i64::<BigEndian>(v).unwrap(),
        Endianness::Little => out.write_i64::<LittleEndian>(v).unwrap(),
    }
}

fn units_byte(units: Units) -> u8 {
    match units {
        Units::None => 1,
        Units::Bytes => 2,
        Units::Ticks => 3,
        Units::Events => 4,
        Units::String => 5,
        Units::Hertz => 6,
        Units::Invalid => 0,
    }
}

fn variability_byte(variability: Variability) -> u8 {
    match variability {
        Variability::Constant => 1,
        Variability::Monotonic => 2,
        Variability::Variable => 3,
        Variability::Invalid => 0,
    }
}

fn round_up(n: usize, to: usize) -> usize {
    (n + to - 1) / to * to
}

/// Encode one well-formed entry the way the producer lays it out: header,
/// nul-terminated name, then the payload aligned to 8 bytes, with the
/// whole entry padded to a 4-byte boundary.
pub(crate) fn encode_entry(
    order: Endianness,
    name: &str,
    units: Units,
    variability: Variability,
    payload: Payload,
) -> Vec<u8> {
    let (type_byte, vector_len, data): (u8, i32, Vec<u8>) = match payload {
        Payload::Long(v) => {
            let mut d = Vec::new();
            put_i64(&mut d, order, v);
            (b'J', 0, d)
        }
        Payload::Longs(vs) => {
            let mut d = Vec::new();
            for &v in vs {
                put_i64(&mut d, order, v);
            }
            (b'J', vs.len() as i32, d)
        }
        Payload::Bytes(bs) => (b'B', bs.len() as i32, bs.to_vec()),
        Payload::Text { s, capacity } => {
            assert!(s.len() < capacity, "text must leave room for its nul");
            let mut d = s.as_bytes().to_vec();
            d.resize(capacity, 0);
            (b'B', capacity as i32, d)
        }
    };
    encode_entry_raw(
        order,
        name,
        type_byte,
        vector_len,
        units_byte(units),
        variability_byte(variability),
        &data,
    )
}

/// Encode an entry with full control over its tag bytes, for shapes a
/// well-behaved producer would not emit.
pub(crate) fn encode_entry_raw(
    order: Endianness,
    name: &str,
    type_byte: u8,
    vector_len: i32,
    units: u8,
    variability: u8,
    data: &[u8],
) -> Vec<u8> {
    let name_offset = ENTRY_HEADER_SIZE;
    let data_offset = round_up(name_offset + name.len() + 1, 8);
    let entry_length = round_up(data_offset + data.len(), 4);

    let mut out = Vec::with_capacity(entry_length);
    put_i32(&mut out, order, entry_length as i32);
    put_i32(&mut out, order, name_offset as i32);
    put_i32(&mut out, order, vector_len);
    out.push(type_byte);
    out.push(0); // flags
    out.push(units);
    out.push(variability);
    put_i32(&mut out, order, data_offset as i32);
    out.extend_from_slice(name.as_bytes());
    out.push(0);
    out.resize(data_offset, 0);
    out.extend_from_slice(data);
    out.resize(entry_length, 0);
    out
}

/// Builder for a complete synthetic region.
pub(crate) struct RegionBuilder {
    order: Endianness,
    entries: Vec<u8>,
    count: i32,
}

impl RegionBuilder {
    pub fn new(order: Endianness) -> Self {
        RegionBuilder {
            order,
            entries: Vec::new(),
            count: 0,
        }
    }

    pub fn entry(
        mut self,
        name: &str,
        units: Units,
        variability: Variability,
        payload: Payload,
    ) -> Self {
        let entry = encode_entry(self.order, name, units, variability, payload);
        self.entries.extend_from_slice(&entry);
        self.count += 1;
        self
    }

    pub fn scalar_long(
        self,
        name: &str,
        value: i64,
        units: Units,
        variability: Variability,
    ) -> Self {
        self.entry(name, units, variability, Payload::Long(value))
    }

    pub fn long_vector(self, name: &str, values: &[i64], units: Units) -> Self {
        self.entry(name, units, Variability::Variable, Payload::Longs(values))
    }

    pub fn byte_vector(self, name: &str, bytes: &[u8], units: Units) -> Self {
        self.entry(name, units, Variability::Variable, Payload::Bytes(bytes))
    }

    pub fn text(self, name: &str, s: &str, capacity: usize) -> Self {
        self.entry(
            name,
            Units::String,
            Variability::Constant,
            Payload::Text { s, capacity },
        )
    }

    pub fn raw_entry(
        mut self,
        name: &str,
        type_byte: u8,
        vector_len: i32,
        units: u8,
        variability: u8,
        data: &[u8],
    ) -> Self {
        let entry = encode_entry_raw(
            self.order,
            name,
            type_byte,
            vector_len,
            units,
            variability,
            data,
        );
        self.entries.extend_from_slice(&entry);
        self.count += 1;
        self
    }

    /// Lay out the full region: prologue, then the entries back to back.
    pub fn build(&self) -> Vec<u8> {
        let used = PROLOGUE_SIZE + self.entries.len();
        let mut out = Vec::with_capacity(used);
        out.extend_from_slice(&PERF_DATA_MAGIC.to_be_bytes());
        out.push(match self.order {
            Endianness::Big => 0,
            Endianness::Little => 1,
        });
        out.push(2); // major version
        out.push(0); // minor version
        out.push(1); // accessible
        put_i32(&mut out, self.order, used as i32);
        put_i32(&mut out, self.order, 0); // overflow
        put_i64(&mut out, self.order, 1); // modification timestamp
        put_i32(&mut out, self.order, PROLOGUE_SIZE as i32);
        put_i32(&mut out, self.order, self.count);
        out.extend_from_slice(&self.entries);
        out
    }

    /// Build into a [`SharedBuf`] with `spare` bytes of unused capacity
    /// for a simulated producer to grow into.
    pub fn build_shared(&self, spare: usize) -> SharedBuf {
        let mut data = self.build();
        let used = data.len();
        data.resize(used + spare, 0);
        SharedBuf {
            data: UnsafeCell::new(data.into_boxed_slice()),
            order: self.order,
        }
    }
}

/// A region that can be mutated underneath attached readers, standing in
/// for the producer VM. Reads and writes alias deliberately, exactly as
/// they do against a real shared mapping.
pub(crate) struct SharedBuf {
    data: UnsafeCell<Box<[u8]>>,
    order: Endianness,
}

impl SharedBuf {
    fn poke_i32(&self, off: usize, v: i32) {
        let buf = unsafe { &mut *self.data.get() };
        let bytes = match self.order {
            Endianness::Big => v.to_be_bytes(),
            Endianness::Little => v.to_le_bytes(),
        };
        buf[off..off + 4].copy_from_slice(&bytes);
    }

    fn peek_i32(&self, off: usize) -> i32 {
        let buf = unsafe { &*self.data.get() };
        self.order.read_i32(buf, off).unwrap()
    }

    /// Append an encoded entry at the `used` mark and publish it by
    /// bumping `used` and the entry count, as the producer does.
    pub fn append_entry(&self, entry: &[u8]) {
        let used = self.peek_i32(8) as usize;
        {
            let buf = unsafe { &mut *self.data.get() };
            assert!(used + entry.len() <= buf.len(), "no spare capacity left");
            buf[used..used + entry.len()].copy_from_slice(entry);
        }
        self.poke_i32(8, (used + entry.len()) as i32);
        self.poke_i32(28, self.peek_i32(28) + 1);
    }
}

impl Region for SharedBuf {
    fn bytes(&self) -> Result<&[u8]> {
        Ok(unsafe { &*self.data.get() })
    }
}
