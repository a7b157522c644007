use byteorder::{LittleEndian, WriteBytesExt};

use std::fmt;
use std::io::{self, Write};

/// Number of addressable data fields in a record (`%(1)` .. `%(16)`).
pub const MAX_FIELDS: usize = 16;

/// Every known payload layout occupies the same 16 bytes on the wire.
pub const PAYLOAD_SIZE: usize = 16;

pub const EVENT_ID_MASK: u64 = 0xFFFF_FFFF_FFFF;

/// The packed second qword of every trace entry.
///
/// Layout (LSB first): `event:48 | field_count:8 | cpu:8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHeader {
    pub event: u64,
    pub field_count: u8,
    pub cpu: u8,
}

impl RawHeader {
    pub fn from_u64(raw: u64) -> Self {
        RawHeader {
            event: raw & EVENT_ID_MASK,
            field_count: ((raw >> 48) & 0xFF) as u8,
            cpu: (raw >> 56) as u8,
        }
    }

    pub fn to_u64(self) -> u64 {
        (u64::from(self.cpu) << 56)
            | (u64::from(self.field_count) << 48)
            | (self.event & EVENT_ID_MASK)
    }
}

/// Trailing data of a record, as selected by the header's field count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// `field_count == 0`
    Empty,
    /// `field_count == 2`
    Qwords([u64; 2]),
    /// `field_count == 4`
    Dwords([u32; 4]),
    /// `field_count == 8`.
    ///
    /// `TRACE_6C` entries only use the first six bytes, but every entry carries
    /// sixteen and all of them are decoded.
    Bytes([u8; 16]),
    /// `field_count == 16`
    SignedBytes([i8; 16]),
    /// Any other field count. No payload bytes follow the header.
    Unknown(u8),
}

impl Payload {
    /// The field count written in the header for this payload.
    pub fn field_count(&self) -> u8 {
        match self {
            Payload::Empty => 0,
            Payload::Qwords(_) => 2,
            Payload::Dwords(_) => 4,
            Payload::Bytes(_) => 8,
            Payload::SignedBytes(_) => 16,
            Payload::Unknown(n) => *n,
        }
    }

    /// Bytes following the header on the wire for a given field count.
    pub fn wire_size(field_count: u8) -> usize {
        match field_count {
            2 | 4 | 8 | 16 => PAYLOAD_SIZE,
            _ => 0,
        }
    }

    /// Decodes a payload from the bytes following the header.
    ///
    /// `data` must hold at least [`Payload::wire_size`] bytes for `field_count`.
    pub fn decode(field_count: u8, data: &[u8]) -> Self {
        let qword = |i: usize| u64::from_le_bytes(array_at(data, i * 8));
        let dword = |i: usize| u32::from_le_bytes(array_at(data, i * 4));

        match field_count {
            0 => Payload::Empty,
            2 => Payload::Qwords([qword(0), qword(1)]),
            4 => Payload::Dwords([dword(0), dword(1), dword(2), dword(3)]),
            8 => Payload::Bytes(array_at(data, 0)),
            16 => Payload::SignedBytes(array_at(data, 0).map(|b: u8| b as i8)),
            other => Payload::Unknown(other),
        }
    }

    /// Value of field `index` (1-based). Slots not covered by the payload are zero.
    pub fn field(&self, index: usize) -> i128 {
        if !(1..=MAX_FIELDS).contains(&index) {
            return 0;
        }
        let i = index - 1;

        match self {
            Payload::Qwords(v) => v.get(i).map_or(0, |&x| i128::from(x)),
            Payload::Dwords(v) => v.get(i).map_or(0, |&x| i128::from(x)),
            Payload::Bytes(v) => i128::from(v[i]),
            Payload::SignedBytes(v) => i128::from(v[i]),
            Payload::Empty | Payload::Unknown(_) => 0,
        }
    }

    pub fn encode<W: Write>(&self, out: &mut W) -> io::Result<()> {
        match self {
            Payload::Empty | Payload::Unknown(_) => {}
            Payload::Qwords(v) => {
                for x in v {
                    out.write_u64::<LittleEndian>(*x)?;
                }
            }
            Payload::Dwords(v) => {
                for x in v {
                    out.write_u32::<LittleEndian>(*x)?;
                }
            }
            Payload::Bytes(v) => out.write_all(v)?,
            Payload::SignedBytes(v) => {
                for x in v {
                    out.write_i8(*x)?;
                }
            }
        }
        Ok(())
    }
}

fn array_at<const N: usize>(data: &[u8], start: usize) -> [u8; N] {
    let mut out = [0_u8; N];
    if let Some(src) = data.get(start..start + N) {
        out.copy_from_slice(src);
    }
    out
}

/// A single decoded trace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub tsc: u64,
    pub cpu: u8,
    /// 48-bit event id.
    pub event: u64,
    pub payload: Payload,
}

impl Record {
    pub fn new(tsc: u64, cpu: u8, event: u64, payload: Payload) -> Self {
        Record {
            tsc,
            cpu,
            event: event & EVENT_ID_MASK,
            payload,
        }
    }

    pub fn header(&self) -> RawHeader {
        RawHeader {
            event: self.event,
            field_count: self.payload.field_count(),
            cpu: self.cpu,
        }
    }

    pub fn field_count(&self) -> u8 {
        self.payload.field_count()
    }

    /// Value of field `index` (1-based), zero past the payload.
    pub fn field(&self, index: usize) -> i128 {
        self.payload.field(index)
    }

    pub fn fields(&self) -> [i128; MAX_FIELDS] {
        std::array::from_fn(|i| self.field(i + 1))
    }

    /// Writes the record back in the wire layout it is decoded from.
    pub fn encode<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_u64::<LittleEndian>(self.tsc)?;
        out.write_u64::<LittleEndian>(self.header().to_u64())?;
        self.payload.encode(out)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + PAYLOAD_SIZE);
        // Writing into a `Vec` cannot fail.
        let _ = self.encode(&mut out);
        out
    }

    pub fn field_set(&self) -> FieldSet<'_> {
        FieldSet(self)
    }
}

/// Display adapter listing every placeholder value of a record.
///
/// Used for the diagnostic output when a template cannot be rendered.
pub struct FieldSet<'a>(&'a Record);

impl fmt::Display for FieldSet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.0;
        write!(f, "{{cpu: {}, tsc: {}, event: {}", r.cpu, r.tsc, r.event)?;
        for (i, v) in r.fields().iter().enumerate() {
            write!(f, ", {}: {}", i + 1, v)?;
        }
        f.write_str("}")
    }
}
