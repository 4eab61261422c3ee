//! Binary encoding of descriptors, cells and portable values.
//!
//! All integers are little-endian and nothing is padded:
//!
//! - descriptor: `indirection_depth: u64`, `tag: u8` (0 basic, 1 struct), then the payload
//! - basic payload: `flags: u8` (0 unsigned, 1 signed, 2 float), `width: u64`
//! - struct payload: `field_count: u64`, then each field descriptor
//! - cell: descriptor, then `size_of(type)` raw bytes
//! - portable value: `value_length: u64`, the encoded cell, then the whole heap

mod envelope;

pub use envelope::{PortableValue, decode_envelope, encode_envelope};

use crate::{
    errors::{Error, Result},
    types::{BasicType, Shape, StructType, TypeDescriptor},
    value::{ValueCell, u64_to_usize},
};

/// Descriptors nested deeper than this are rejected while decoding.
pub const MAX_NESTING: usize = 64;

/// Deepest pointer accepted while decoding, leaving room for every later `pointer_to`.
pub const MAX_INDIRECTION: u64 = 0xFFFF_FFFF;

const TAG_BASIC: u8 = 0;
const TAG_STRUCT: u8 = 1;

const FLAGS_UNSIGNED: u8 = 0;
const FLAGS_SIGNED: u8 = 1;
const FLAGS_FLOAT: u8 = 2;

#[must_use]
pub fn encode_type(r#type: &TypeDescriptor) -> Vec<u8> {
    let mut encoder = Encoder::default();
    encoder.write_type(r#type);

    encoder.finish()
}

/// # Errors
/// Returns `MalformedEncoding` if `bytes` is not exactly one encoded descriptor.
pub fn decode_type(bytes: &[u8]) -> Result<TypeDescriptor> {
    let mut decoder = Decoder::new(bytes);
    let r#type = decoder.read_type(0)?;
    decoder.finish()?;

    Ok(r#type)
}

#[must_use]
pub fn encode_value(value: &ValueCell) -> Vec<u8> {
    let mut encoder = Encoder::default();
    encoder.write_value(value);

    encoder.finish()
}

/// # Errors
/// Returns `MalformedEncoding` if `bytes` is not exactly one encoded cell.
pub fn decode_value(bytes: &[u8]) -> Result<ValueCell> {
    let mut decoder = Decoder::new(bytes);
    let value = decoder.read_value()?;
    decoder.finish()?;

    Ok(value)
}

#[derive(Default)]
struct Encoder {
    bytes: Vec<u8>,
}

impl Encoder {
    fn write_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    fn write_u64(&mut self, value: u64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    fn write_type(&mut self, r#type: &TypeDescriptor) {
        self.write_u64(r#type.indirection_depth());

        match r#type.shape() {
            Shape::Basic(basic) => {
                self.write_u8(TAG_BASIC);
                self.write_u8(match (basic.is_floating(), basic.is_signed()) {
                    (true, _) => FLAGS_FLOAT,
                    (false, true) => FLAGS_SIGNED,
                    (false, false) => FLAGS_UNSIGNED,
                });
                self.write_u64(basic.width());
            }
            Shape::Struct(r#struct) => {
                self.write_u8(TAG_STRUCT);
                self.write_u64(r#struct.field_count() as u64);

                for field in r#struct.fields() {
                    self.write_type(field);
                }
            }
        }
    }

    fn write_value(&mut self, value: &ValueCell) {
        self.write_type(value.r#type());
        self.write_bytes(value.bytes());
    }

    fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

struct Decoder<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Decoder<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn malformed(&self, reason: impl Into<String>) -> Error {
        Error::MalformedEncoding {
            position: self.position,
            reason: reason.into(),
        }
    }

    fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let bytes = self
            .position
            .checked_add(length)
            .and_then(|end| self.bytes.get(self.position..end))
            .ok_or_else(|| {
                self.malformed(format!(
                    "expected {length} more bytes, {} remain",
                    self.bytes.len() - self.position
                ))
            })?;
        self.position += length;

        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.read_bytes(8)?;
        let mut buffer = [0; 8];
        buffer.copy_from_slice(bytes);

        Ok(u64::from_le_bytes(buffer))
    }

    fn read_type(&mut self, nesting: usize) -> Result<TypeDescriptor> {
        if nesting > MAX_NESTING {
            return Err(self.malformed(format!("types nest deeper than {MAX_NESTING} levels")));
        }

        let indirection_depth = self.read_u64()?;
        if indirection_depth > MAX_INDIRECTION {
            return Err(self.malformed(format!(
                "indirection depth {indirection_depth} exceeds {MAX_INDIRECTION}"
            )));
        }

        let shape = match self.read_u8()? {
            TAG_BASIC => {
                let basic = match self.read_u8()? {
                    FLAGS_UNSIGNED => BasicType::integer(false, self.read_u64()?),
                    FLAGS_SIGNED => BasicType::integer(true, self.read_u64()?),
                    FLAGS_FLOAT => BasicType::float(self.read_u64()?),
                    flags => return Err(self.malformed(format!("unknown basic flags {flags}"))),
                };

                Shape::Basic(basic)
            }
            TAG_STRUCT => {
                let field_count = self.read_u64()?;
                let mut fields = vec![];

                for _ in 0..field_count {
                    fields.push(self.read_type(nesting + 1)?);
                }

                Shape::Struct(StructType::new(fields))
            }
            tag => return Err(self.malformed(format!("unknown type tag {tag}"))),
        };

        Ok(TypeDescriptor::from_shape(shape, indirection_depth))
    }

    fn read_value(&mut self) -> Result<ValueCell> {
        let r#type = self.read_type(0)?;
        let size = r#type.size_of();
        let length = u64_to_usize(size)
            .ok_or_else(|| self.malformed(format!("a value of {size} bytes cannot be addressed")))?;
        let bytes = self.read_bytes(length)?;

        ValueCell::from_raw(r#type, bytes)
    }

    fn finish(&self) -> Result<()> {
        if self.position != self.bytes.len() {
            return Err(self.malformed(format!(
                "{} trailing bytes",
                self.bytes.len() - self.position
            )));
        }

        Ok(())
    }
}
