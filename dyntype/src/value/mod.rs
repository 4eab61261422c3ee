pub mod native;

use tracing::trace;

pub use self::native::Native;
use crate::{
    errors::{Error, Result},
    heap::VirtualHeap,
    types::{POINTER_WIDTH, RepresentedAs, Shape, TypeDescriptor, primitives},
};

/// A byte sequence tagged with the descriptor that gives it meaning.
///
/// Struct cells hold the packed concatenation of their fields. Pointer cells hold a
/// pointer-width little-endian integer, which is a heap offset until the cell is resolved and an
/// absolute address afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueCell {
    r#type: TypeDescriptor,
    bytes: Vec<u8>,
}

macro_rules! declare_from_native {
    ($($native:ty => $descriptor:ident),* $(,)?) => {
        $(
            impl From<$native> for ValueCell {
                fn from(value: $native) -> Self {
                    Self {
                        r#type: primitives::$descriptor(),
                        bytes: value.to_le_bytes().to_vec(),
                    }
                }
            }
        )*
    };
}

declare_from_native!(
    i8 => i8,
    u8 => u8,
    i16 => i16,
    u16 => u16,
    i32 => i32,
    u32 => u32,
    i64 => i64,
    u64 => u64,
    f32 => f32,
    f64 => f64,
);

impl From<bool> for ValueCell {
    fn from(value: bool) -> Self {
        Self {
            r#type: primitives::bool(),
            bytes: vec![u8::from(value)],
        }
    }
}

impl ValueCell {
    /// Builds a struct cell whose fields are `members`, in order.
    #[must_use]
    pub fn from_struct(members: impl IntoIterator<Item = Self>) -> Self {
        let mut types = vec![];
        let mut bytes = vec![];

        for member in members {
            types.push(member.r#type);
            bytes.extend(member.bytes);
        }

        Self {
            r#type: TypeDescriptor::struct_of(types),
            bytes,
        }
    }

    /// Interprets a flat buffer as a value of `type`, splitting struct buffers field by field.
    ///
    /// # Errors
    /// Returns `SizeMismatch` if `bytes` is not exactly `size_of(type)` long.
    pub fn from_raw(r#type: TypeDescriptor, bytes: &[u8]) -> Result<Self> {
        check_size(&r#type, bytes)?;

        match r#type.as_struct() {
            Some(r#struct) => {
                let mut data = Vec::with_capacity(bytes.len());
                let mut remaining = bytes;

                for field in r#struct.fields() {
                    let (field_bytes, rest) = split_field(field, remaining)?;
                    data.extend(Self::from_raw(field.clone(), field_bytes)?.bytes);
                    remaining = rest;
                }

                Ok(Self {
                    r#type,
                    bytes: data,
                })
            }
            None => Ok(Self {
                r#type,
                bytes: bytes.to_vec(),
            }),
        }
    }

    /// Like [`ValueCell::from_raw`], but every pointer found in `bytes` is treated as a live
    /// address and its pointee is copied into `heap`, so the result only refers to heap offsets.
    ///
    /// Only the first level of indirection is captured. A pointee that itself contains
    /// pointers is copied verbatim.
    ///
    /// # Errors
    /// Returns `SizeMismatch` if `bytes` does not match the size of `type`.
    ///
    /// # Safety
    /// Every pointer reachable through `type` in `bytes` must be valid for reads of its pointee,
    /// and pointers to `u8` must point at a NUL-terminated string.
    pub unsafe fn capture(
        r#type: TypeDescriptor,
        bytes: &[u8],
        heap: &mut VirtualHeap,
    ) -> Result<Self> {
        check_size(&r#type, bytes)?;

        if r#type.is_pointer() {
            let address = read_address(&r#type, bytes)?;
            let pointee = r#type.deref()?;
            let pointer = std::ptr::with_exposed_provenance::<u8>(address);

            // SAFETY: The caller guarantees that the pointer is valid for reads of the pointee
            return unsafe { heap.register(pointer, &pointee) };
        }

        match r#type.as_struct() {
            Some(r#struct) => {
                let mut data = Vec::with_capacity(bytes.len());
                let mut remaining = bytes;

                for field in r#struct.fields() {
                    let (field_bytes, rest) = split_field(field, remaining)?;
                    // SAFETY: The field is a part of the value the caller vouched for
                    let captured = unsafe { Self::capture(field.clone(), field_bytes, heap)? };
                    data.extend(captured.bytes);
                    remaining = rest;
                }

                Ok(Self {
                    r#type,
                    bytes: data,
                })
            }
            None => Ok(Self {
                r#type,
                bytes: bytes.to_vec(),
            }),
        }
    }

    /// Captures a native value, described by its [`RepresentedAs`] implementation.
    ///
    /// # Errors
    /// Returns `SizeMismatch` if the representation of `T` disagrees with its Rust size.
    ///
    /// # Safety
    /// `T` must not contain padding, which in practice means it is a scalar or a
    /// `#[repr(C, packed)]` struct. The pointer requirements of [`ValueCell::capture`] apply.
    pub unsafe fn capture_native<T: RepresentedAs>(
        value: &T,
        heap: &mut VirtualHeap,
    ) -> Result<Self> {
        // SAFETY: `value` is a valid reference and the caller guarantees there is no padding, so
        // all `size_of::<T>()` bytes are initialized
        let bytes = unsafe {
            std::slice::from_raw_parts(std::ptr::from_ref(value).cast::<u8>(), size_of::<T>())
        };

        // SAFETY: The caller upholds the pointer requirements
        unsafe { Self::capture(T::representation(), bytes, heap) }
    }

    pub(crate) fn from_offset(r#type: TypeDescriptor, offset: usize) -> Self {
        Self {
            r#type,
            bytes: offset.to_le_bytes().to_vec(),
        }
    }

    #[must_use]
    pub const fn r#type(&self) -> &TypeDescriptor {
        &self.r#type
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Projects the field at `index` out of a struct cell. Any other cell, including a pointer
    /// to a struct, is returned as is.
    ///
    /// # Errors
    /// Returns `IndexOutOfRange` if the struct has no such field, or `SizeMismatch` if the cell
    /// is shorter than its type says.
    pub fn field(&self, index: usize) -> Result<Self> {
        let Some(r#struct) = self.r#type.as_struct() else {
            return Ok(self.clone());
        };

        let offset = r#struct.field_offset(index)?;
        let field = &r#struct.fields()[index];
        let bytes = u64_to_usize(offset)
            .zip(u64_to_usize(field.size_of()))
            .and_then(|(start, length)| self.bytes.get(start..start.checked_add(length)?))
            .ok_or_else(|| Error::SizeMismatch {
                r#type: self.r#type.clone(),
                expected: self.r#type.size_of(),
                actual: self.bytes.len() as u64,
            })?;

        Ok(Self {
            r#type: field.clone(),
            bytes: bytes.to_vec(),
        })
    }

    /// Translates stored heap offsets into absolute addresses within `heap`.
    ///
    /// Resolving an already resolved cell returns it unchanged, as does resolving a scalar.
    /// The addresses stay valid only until the heap grows again.
    ///
    /// # Errors
    /// Returns `SizeMismatch` if a pointer is not stored in exactly pointer-width bytes.
    pub fn resolve_pointer(&self, heap: &VirtualHeap) -> Result<Self> {
        if self.r#type.is_pointer() {
            if self.r#type.is_relocated() {
                return Ok(self.clone());
            }

            let offset = read_address(&self.r#type, &self.bytes)?;
            let absolute = heap.base_address().wrapping_add(offset);

            trace!(offset, absolute, "resolved pointer");

            return Ok(Self {
                r#type: self.r#type.relocated(),
                bytes: absolute.to_le_bytes().to_vec(),
            });
        }

        match self.r#type.shape() {
            Shape::Struct(r#struct) => {
                let mut types = Vec::with_capacity(r#struct.field_count());
                let mut bytes = Vec::with_capacity(self.bytes.len());

                for index in 0..r#struct.field_count() {
                    let field = self.field(index)?.resolve_pointer(heap)?;
                    types.push(field.r#type);
                    bytes.extend(field.bytes);
                }

                Ok(Self {
                    r#type: TypeDescriptor::struct_of(types),
                    bytes,
                })
            }
            Shape::Basic(_) => Ok(self.clone()),
        }
    }

    /// Reads the cell as a native value, resolving pointers against `heap` first.
    ///
    /// # Errors
    /// Returns `SizeMismatch` if the size of the cell's type is not the size of `T`.
    pub fn as_native<T: Native>(&self, heap: &VirtualHeap) -> Result<T> {
        let resolved = self.resolve_pointer(heap)?;
        resolved.check_native_width(T::WIDTH)?;

        T::from_le_slice(&resolved.bytes).ok_or_else(|| Error::SizeMismatch {
            r#type: resolved.r#type.clone(),
            expected: T::WIDTH as u64,
            actual: resolved.bytes.len() as u64,
        })
    }

    /// Reinterprets the cell's bytes as an arbitrary `T`, resolving pointers against `heap`
    /// first. This is how a packed struct captured with [`ValueCell::capture_native`] is read
    /// back.
    ///
    /// # Errors
    /// Returns `SizeMismatch` if the size of the cell's type is not the size of `T`.
    ///
    /// # Safety
    /// Every bit pattern the cell can hold must be a valid `T`. Pointers inside the returned
    /// value point into `heap` and must not be dereferenced after the heap is dropped or grown.
    pub unsafe fn reinterpret<T: Copy>(&self, heap: &VirtualHeap) -> Result<T> {
        let resolved = self.resolve_pointer(heap)?;
        resolved.check_native_width(size_of::<T>())?;

        if resolved.bytes.len() != size_of::<T>() {
            return Err(Error::SizeMismatch {
                r#type: resolved.r#type,
                expected: size_of::<T>() as u64,
                actual: resolved.bytes.len() as u64,
            });
        }

        // SAFETY: There are exactly `size_of::<T>()` initialized bytes, the read is unaligned,
        // and the caller guarantees they form a valid `T`
        Ok(unsafe { resolved.bytes.as_ptr().cast::<T>().read_unaligned() })
    }

    fn check_native_width(&self, width: usize) -> Result<()> {
        let size = self.r#type.size_of();

        if size != width as u64 {
            return Err(Error::SizeMismatch {
                r#type: self.r#type.clone(),
                expected: width as u64,
                actual: size,
            });
        }

        Ok(())
    }
}

fn check_size(r#type: &TypeDescriptor, bytes: &[u8]) -> Result<()> {
    if r#type.size_of() != bytes.len() as u64 {
        return Err(Error::SizeMismatch {
            r#type: r#type.clone(),
            expected: r#type.size_of(),
            actual: bytes.len() as u64,
        });
    }

    Ok(())
}

fn split_field<'a>(field: &TypeDescriptor, bytes: &'a [u8]) -> Result<(&'a [u8], &'a [u8])> {
    u64_to_usize(field.size_of())
        .and_then(|size| bytes.split_at_checked(size))
        .ok_or_else(|| Error::SizeMismatch {
            r#type: field.clone(),
            expected: field.size_of(),
            actual: bytes.len() as u64,
        })
}

fn read_address(r#type: &TypeDescriptor, bytes: &[u8]) -> Result<usize> {
    usize::from_le_slice(bytes).ok_or_else(|| Error::SizeMismatch {
        r#type: r#type.clone(),
        expected: POINTER_WIDTH,
        actual: bytes.len() as u64,
    })
}

pub(crate) fn u64_to_usize(value: u64) -> Option<usize> {
    usize::try_from(value).ok()
}

#[cfg(test)]
mod tests {
    use super::ValueCell;
    use crate::{
        errors::Error,
        heap::VirtualHeap,
        types::{POINTER_WIDTH, TypeDescriptor, primitives},
    };

    fn members() -> Vec<ValueCell> {
        vec![
            ValueCell::from(-7i16),
            ValueCell::from(2.5f64),
            ValueCell::from_struct([ValueCell::from(true), ValueCell::from(9u32)]),
        ]
    }

    #[test]
    fn natives_are_little_endian() {
        let cell = ValueCell::from(0x0102_0304u32);

        assert_eq!(&primitives::u32(), cell.r#type());
        assert_eq!(&[4, 3, 2, 1], cell.bytes());
        assert_eq!(&[1], ValueCell::from(true).bytes());
        assert_eq!(&primitives::f32(), ValueCell::from(1.0f32).r#type());
    }

    #[test]
    fn struct_fields_project_back_to_members() {
        let members = members();
        let cell = ValueCell::from_struct(members.clone());
        let expected_size: u64 = members.iter().map(|x| x.r#type().size_of()).sum();

        assert_eq!(expected_size, cell.r#type().size_of());
        assert_eq!(expected_size, cell.bytes().len() as u64);

        for (index, member) in members.iter().enumerate() {
            let field = cell.field(index).unwrap();

            assert_eq!(member.r#type(), field.r#type());
            assert_eq!(member.bytes(), field.bytes());
        }
    }

    #[test]
    fn field_past_the_end_fails() {
        let cell = ValueCell::from_struct(members());

        assert_eq!(
            Error::IndexOutOfRange {
                index: 3,
                field_count: 3
            },
            cell.field(3).unwrap_err()
        );
    }

    #[test]
    fn field_of_scalar_is_the_scalar() {
        let cell = ValueCell::from(5u8);

        assert_eq!(cell, cell.field(4).unwrap());
    }

    #[test]
    fn from_raw_resegments_nested_structs() {
        let flat = ValueCell::from_struct(members());
        let rebuilt = ValueCell::from_raw(flat.r#type().clone(), flat.bytes()).unwrap();

        assert_eq!(flat, rebuilt);
        assert_eq!(
            9,
            rebuilt
                .field(2)
                .unwrap()
                .field(1)
                .unwrap()
                .as_native::<u32>(&VirtualHeap::new())
                .unwrap()
        );
    }

    #[test]
    fn from_raw_rejects_wrong_length() {
        let error = ValueCell::from_raw(primitives::i32(), &[1, 2, 3]).unwrap_err();

        assert_eq!(
            Error::SizeMismatch {
                r#type: primitives::i32(),
                expected: 4,
                actual: 3
            },
            error
        );
    }

    #[test]
    fn as_native_checks_width() {
        let heap = VirtualHeap::new();
        let cell = ValueCell::from(300u16);

        assert_eq!(300, cell.as_native::<u16>(&heap).unwrap());
        assert!(matches!(
            cell.as_native::<u32>(&heap).unwrap_err(),
            Error::SizeMismatch { .. }
        ));
        assert!(ValueCell::from(true).as_native::<bool>(&heap).unwrap());
    }

    #[test]
    fn resolve_pointer_adds_heap_base() {
        let mut heap = VirtualHeap::new();
        heap.append(&[0xAA; 3]);
        let cell = heap.register_cell(&ValueCell::from(42i64));

        let resolved = cell.resolve_pointer(&heap).unwrap();

        assert!(resolved.r#type().is_relocated());
        assert_eq!(
            heap.base_address() + 3,
            resolved.as_native::<usize>(&heap).unwrap()
        );
        assert_eq!(resolved, resolved.resolve_pointer(&heap).unwrap());
    }

    #[test]
    fn resolve_pointer_recurses_into_structs() {
        let mut heap = VirtualHeap::new();
        let pointer = heap.register_cell(&ValueCell::from(1u8));
        let cell = ValueCell::from_struct([ValueCell::from(3u32), pointer]);

        let once = cell.resolve_pointer(&heap).unwrap();
        let twice = once.resolve_pointer(&heap).unwrap();

        assert_eq!(once, twice);
        assert!(once.field(1).unwrap().r#type().is_relocated());
        assert_eq!(
            heap.base_address(),
            once.field(1).unwrap().as_native::<usize>(&heap).unwrap()
        );
    }

    #[test]
    fn resolve_pointer_rejects_short_pointers() {
        let cell = ValueCell {
            r#type: primitives::str(),
            bytes: vec![0; 2],
        };

        assert_eq!(
            Error::SizeMismatch {
                r#type: primitives::str(),
                expected: POINTER_WIDTH,
                actual: 2
            },
            cell.resolve_pointer(&VirtualHeap::new()).unwrap_err()
        );
    }

    #[test]
    fn reinterpret_reads_packed_layout() {
        #[repr(C, packed)]
        #[derive(Clone, Copy)]
        struct Pair {
            small: u8,
            large: u32,
        }

        let cell = ValueCell::from_struct([ValueCell::from(7u8), ValueCell::from(70_000u32)]);
        // SAFETY: Any bit pattern is a valid `Pair`
        let pair: Pair = unsafe { cell.reinterpret(&VirtualHeap::new()) }.unwrap();
        let (small, large) = (pair.small, pair.large);

        assert_eq!((7, 70_000), (small, large));
    }

    #[test]
    fn capture_copies_pointees_into_the_heap() {
        let value = 0x1122_3344u32;
        let address = std::ptr::from_ref(&value).expose_provenance();
        let r#type = TypeDescriptor::struct_of([primitives::u32().pointer_to(), primitives::u8()]);
        let mut bytes = address.to_le_bytes().to_vec();
        bytes.push(6);
        let mut heap = VirtualHeap::new();

        // SAFETY: The only pointer refers to `value`, which is alive
        let cell = unsafe { ValueCell::capture(r#type, &bytes, &mut heap) }.unwrap();

        assert_eq!(&[0x44, 0x33, 0x22, 0x11], heap.as_bytes());
        assert_eq!(&0usize.to_le_bytes(), cell.field(0).unwrap().bytes());
        assert_eq!(6, cell.field(1).unwrap().as_native::<u8>(&heap).unwrap());
    }
}
