use tracing::debug;

use super::{Decoder, Encoder};
use crate::{
    errors::Result,
    heap::VirtualHeap,
    types::RepresentedAs,
    value::{ValueCell, u64_to_usize},
};

/// A value bundled with the heap its pointers refer to.
///
/// Decoding hands the heap back to the caller, who must keep it alive for as long as any pointer
/// resolved against it is dereferenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortableValue {
    value: ValueCell,
    heap: VirtualHeap,
}

impl PortableValue {
    #[must_use]
    pub const fn new(value: ValueCell, heap: VirtualHeap) -> Self {
        Self { value, heap }
    }

    /// Captures a native value, and everything its pointers refer to, into a fresh heap.
    ///
    /// # Errors
    /// Returns `SizeMismatch` if the representation of `T` disagrees with its Rust size.
    ///
    /// # Safety
    /// The requirements of [`ValueCell::capture_native`] apply.
    pub unsafe fn capture<T: RepresentedAs>(value: &T) -> Result<Self> {
        let mut heap = VirtualHeap::new();
        // SAFETY: The caller upholds the requirements of `capture_native`
        let value = unsafe { ValueCell::capture_native(value, &mut heap)? };

        Ok(Self { value, heap })
    }

    #[must_use]
    pub const fn value(&self) -> &ValueCell {
        &self.value
    }

    #[must_use]
    pub const fn heap(&self) -> &VirtualHeap {
        &self.heap
    }

    #[must_use]
    pub fn into_parts(self) -> (ValueCell, VirtualHeap) {
        (self.value, self.heap)
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        encode_envelope(&self.value, &self.heap)
    }

    /// # Errors
    /// Returns `MalformedEncoding` if `bytes` is not a valid envelope.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        decode_envelope(bytes)
    }
}

#[must_use]
pub fn encode_envelope(value: &ValueCell, heap: &VirtualHeap) -> Vec<u8> {
    let mut encoded_value = Encoder::default();
    encoded_value.write_value(value);
    let encoded_value = encoded_value.finish();

    let mut encoder = Encoder::default();
    encoder.write_u64(encoded_value.len() as u64);
    encoder.write_bytes(&encoded_value);
    encoder.write_bytes(heap.as_bytes());

    debug!(
        value_length = encoded_value.len(),
        heap_length = heap.len(),
        "encoded portable value"
    );

    encoder.finish()
}

/// Decodes an envelope, treating everything after the value as a fresh heap.
///
/// # Errors
/// Returns `MalformedEncoding` if the value length overruns the input or the value itself is
/// malformed.
pub fn decode_envelope(bytes: &[u8]) -> Result<PortableValue> {
    let mut decoder = Decoder::new(bytes);
    let value_length = decoder.read_u64()?;
    let value_length = u64_to_usize(value_length).ok_or_else(|| {
        decoder.malformed(format!("a value of {value_length} bytes cannot be addressed"))
    })?;
    let value_bytes = decoder.read_bytes(value_length)?;
    let heap_bytes = &bytes[decoder.position..];

    let mut value_decoder = Decoder::new(value_bytes);
    let value = value_decoder.read_value()?;
    value_decoder.finish()?;

    debug!(
        value_length,
        heap_length = heap_bytes.len(),
        "decoded portable value"
    );

    Ok(PortableValue {
        value,
        heap: VirtualHeap::from_bytes(heap_bytes.to_vec()),
    })
}
