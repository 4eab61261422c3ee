use tracing::trace;

use crate::{
    errors::{Error, Result},
    types::{TypeDescriptor, primitives},
    value::{ValueCell, u64_to_usize},
};

/// Append-only arena holding the memory that pointer cells refer to.
///
/// Pointer cells store offsets into the heap rather than addresses, because appending may move
/// the underlying storage. Offsets that were handed out stay valid for as long as the heap lives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualHeap {
    bytes: Vec<u8>,
}

impl VirtualHeap {
    #[must_use]
    pub const fn new() -> Self {
        Self { bytes: vec![] }
    }

    #[must_use]
    pub const fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Address of the first byte of the heap. Only valid until the next append.
    #[must_use]
    pub fn base_address(&self) -> usize {
        self.bytes.as_ptr().expose_provenance()
    }

    /// Copies `bytes` to the end of the heap, returning the offset they were stored at.
    pub fn append(&mut self, bytes: &[u8]) -> usize {
        let offset = self.bytes.len();
        self.bytes.extend_from_slice(bytes);

        trace!(offset, length = bytes.len(), "heap grew");

        offset
    }

    /// Copies the pointee of `pointer` into the heap and returns a pointer cell referring to the
    /// copy. Pointees of unsigned single-byte type are copied up to and including the NUL byte
    /// that terminates them.
    ///
    /// # Errors
    /// Returns `SizeMismatch` if the element type is too large to be addressed on this platform.
    ///
    /// # Safety
    /// `pointer` must be valid for reads of `size_of(element)` bytes, or, for unsigned single-byte
    /// elements, point at a NUL-terminated string.
    pub unsafe fn register(
        &mut self,
        pointer: *const u8,
        element: &TypeDescriptor,
    ) -> Result<ValueCell> {
        let length = if element.is_byte_string_element() {
            // SAFETY: The caller guarantees the pointer refers to a NUL-terminated string
            unsafe { libc::strlen(pointer.cast()) + 1 }
        } else {
            u64_to_usize(element.size_of()).ok_or_else(|| Error::SizeMismatch {
                r#type: element.clone(),
                expected: element.size_of(),
                actual: usize::MAX as u64,
            })?
        };

        // SAFETY: The caller guarantees that `length` bytes starting at the pointer are readable
        let pointee = unsafe { std::slice::from_raw_parts(pointer, length) };
        let offset = self.append(pointee);

        Ok(ValueCell::from_offset(element.pointer_to(), offset))
    }

    /// Copies raw bytes of a pointee whose shape is unknown, returning a `voidptr` cell.
    ///
    /// # Safety
    /// `pointer` must be valid for reads of `length` bytes.
    pub unsafe fn register_bytes(&mut self, pointer: *const u8, length: usize) -> ValueCell {
        // SAFETY: The caller guarantees that `length` bytes starting at the pointer are readable
        let pointee = unsafe { std::slice::from_raw_parts(pointer, length) };
        let offset = self.append(pointee);

        ValueCell::from_offset(primitives::voidptr(), offset)
    }

    /// Copies an existing cell into the heap, returning a pointer to the copy.
    pub fn register_cell(&mut self, cell: &ValueCell) -> ValueCell {
        let offset = self.append(cell.bytes());

        ValueCell::from_offset(cell.r#type().pointer_to(), offset)
    }

    /// Borrows `length` bytes starting at `offset`, if the heap holds that many.
    #[must_use]
    pub fn read(&self, offset: usize, length: usize) -> Option<&[u8]> {
        self.bytes.get(offset..offset.checked_add(length)?)
    }
}
