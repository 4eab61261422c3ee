pub mod primitives;

use std::{ffi::c_void, sync::Arc};

use crate::errors::{Error, Result};

/// Width in bytes of every pointer-typed value, regardless of what it points at.
#[allow(clippy::cast_possible_truncation)]
pub const POINTER_WIDTH: u64 = size_of::<usize>() as u64;

pub trait RepresentedAs {
    fn representation() -> TypeDescriptor;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BasicType {
    signed: bool,
    floating: bool,
    width: u64,
}

impl BasicType {
    #[must_use]
    pub const fn integer(signed: bool, width: u64) -> Self {
        Self {
            signed,
            floating: false,
            width,
        }
    }

    #[must_use]
    pub const fn float(width: u64) -> Self {
        Self {
            signed: true,
            floating: true,
            width,
        }
    }

    #[must_use]
    pub const fn is_signed(&self) -> bool {
        self.signed
    }

    #[must_use]
    pub const fn is_floating(&self) -> bool {
        self.floating
    }

    #[must_use]
    pub const fn width(&self) -> u64 {
        self.width
    }

    // Pointers to these are captured as NUL-terminated strings.
    pub(crate) const fn is_byte_string_element(&self) -> bool {
        !self.signed && !self.floating && self.width == 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructType {
    fields: Arc<[TypeDescriptor]>,
}

impl StructType {
    pub(crate) fn new(fields: impl IntoIterator<Item = TypeDescriptor>) -> Self {
        Self {
            fields: fields.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn fields(&self) -> &[TypeDescriptor] {
        &self.fields
    }

    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Byte offset of the field at `index` within the packed layout.
    ///
    /// # Errors
    /// Returns `IndexOutOfRange` if the struct has no field at `index`.
    pub fn field_offset(&self, index: usize) -> Result<u64> {
        if index >= self.fields.len() {
            return Err(Error::IndexOutOfRange {
                index,
                field_count: self.fields.len(),
            });
        }

        Ok(self.fields[..index]
            .iter()
            .fold(0, |offset, field| offset.saturating_add(field.size_of())))
    }

    fn size(&self) -> u64 {
        self.fields
            .iter()
            .fold(0, |size, field| size.saturating_add(field.size_of()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Basic(BasicType),
    Struct(StructType),
}

/// Describes the shape of a value and how many pointer levels sit on top of it.
///
/// Equality is structural: two descriptors are equal when their shapes and indirection depths
/// match, whether or not either of them has been relocated.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    shape: Shape,
    indirection_depth: u64,
    relocated: bool,
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.indirection_depth == other.indirection_depth && self.shape == other.shape
    }
}

impl Eq for TypeDescriptor {}

impl TypeDescriptor {
    #[must_use]
    pub const fn basic(signed: bool, width: u64) -> Self {
        Self::from_shape(Shape::Basic(BasicType::integer(signed, width)), 0)
    }

    #[must_use]
    pub const fn float(width: u64) -> Self {
        Self::from_shape(Shape::Basic(BasicType::float(width)), 0)
    }

    #[must_use]
    pub fn struct_of(fields: impl IntoIterator<Item = Self>) -> Self {
        Self::from_shape(Shape::Struct(StructType::new(fields)), 0)
    }

    pub(crate) const fn from_shape(shape: Shape, indirection_depth: u64) -> Self {
        Self {
            shape,
            indirection_depth,
            relocated: false,
        }
    }

    /// Adds a level of indirection. The depth saturates instead of wrapping back to a value type.
    #[must_use]
    pub fn pointer_to(&self) -> Self {
        Self::from_shape(self.shape.clone(), self.indirection_depth.saturating_add(1))
    }

    /// # Errors
    /// Returns `TypeMismatch` if the type is not a pointer.
    pub fn deref(&self) -> Result<Self> {
        if self.indirection_depth == 0 {
            return Err(Error::TypeMismatch {
                actual: self.clone(),
                reason: "only pointers can be dereferenced",
            });
        }

        Ok(Self::from_shape(
            self.shape.clone(),
            self.indirection_depth - 1,
        ))
    }

    #[must_use]
    pub fn size_of(&self) -> u64 {
        if self.indirection_depth > 0 {
            return POINTER_WIDTH;
        }

        match &self.shape {
            Shape::Basic(basic) => basic.width,
            Shape::Struct(r#struct) => r#struct.size(),
        }
    }

    #[must_use]
    pub fn structural_equals(&self, other: &Self) -> bool {
        self == other
    }

    #[must_use]
    pub const fn shape(&self) -> &Shape {
        &self.shape
    }

    #[must_use]
    pub const fn indirection_depth(&self) -> u64 {
        self.indirection_depth
    }

    #[must_use]
    pub const fn is_pointer(&self) -> bool {
        self.indirection_depth > 0
    }

    #[must_use]
    pub const fn is_relocated(&self) -> bool {
        self.relocated
    }

    /// The scalar this descriptor is built from, if any, ignoring indirection.
    #[must_use]
    pub const fn as_basic(&self) -> Option<&BasicType> {
        match &self.shape {
            Shape::Basic(basic) => Some(basic),
            Shape::Struct(_) => None,
        }
    }

    /// The struct layout of a struct value. Pointers to structs are not structs themselves.
    #[must_use]
    pub const fn as_struct(&self) -> Option<&StructType> {
        match (&self.shape, self.indirection_depth) {
            (Shape::Struct(r#struct), 0) => Some(r#struct),
            _ => None,
        }
    }

    pub(crate) fn relocated(&self) -> Self {
        Self {
            relocated: true,
            ..self.clone()
        }
    }

    pub(crate) const fn is_byte_string_element(&self) -> bool {
        match &self.shape {
            Shape::Basic(basic) => self.indirection_depth == 0 && basic.is_byte_string_element(),
            Shape::Struct(_) => false,
        }
    }
}

macro_rules! represent_natives {
    ($($native:ty => $descriptor:ident),* $(,)?) => {
        $(
            impl RepresentedAs for $native {
                fn representation() -> TypeDescriptor {
                    primitives::$descriptor()
                }
            }
        )*
    };
}

represent_natives!(
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
    bool => bool,
);

impl RepresentedAs for c_void {
    fn representation() -> TypeDescriptor {
        TypeDescriptor::basic(false, 0)
    }
}

impl<T: RepresentedAs> RepresentedAs for *const T {
    fn representation() -> TypeDescriptor {
        T::representation().pointer_to()
    }
}

impl<T: RepresentedAs> RepresentedAs for *mut T {
    fn representation() -> TypeDescriptor {
        T::representation().pointer_to()
    }
}

impl<T: RepresentedAs, const N: usize> RepresentedAs for [T; N] {
    fn representation() -> TypeDescriptor {
        TypeDescriptor::struct_of(std::iter::repeat_n(T::representation(), N))
    }
}

#[cfg(test)]
mod tests {
    use super::{POINTER_WIDTH, RepresentedAs, TypeDescriptor, primitives};
    use crate::errors::Error;

    fn nested() -> TypeDescriptor {
        TypeDescriptor::struct_of([
            primitives::i32(),
            primitives::f32(),
            TypeDescriptor::struct_of([primitives::str(), primitives::i32()]),
        ])
    }

    #[test]
    fn struct_size_is_packed_sum_of_fields() {
        assert_eq!(4 + 4 + POINTER_WIDTH + 4, nested().size_of());
    }

    #[test]
    fn pointers_are_pointer_width_regardless_of_pointee() {
        assert_eq!(POINTER_WIDTH, nested().pointer_to().size_of());
        assert_eq!(POINTER_WIDTH, primitives::voidptr().size_of());
        assert_eq!(
            POINTER_WIDTH,
            primitives::u8().pointer_to().pointer_to().size_of()
        );
    }

    #[test]
    fn deref_undoes_pointer_to() {
        let pointer = nested().pointer_to().pointer_to();

        assert_eq!(2, pointer.indirection_depth());
        assert_eq!(nested(), pointer.deref().unwrap().deref().unwrap());
    }

    #[test]
    fn deref_of_value_type_fails() {
        let error = primitives::u64().deref().unwrap_err();

        assert!(matches!(error, Error::TypeMismatch { .. }));
    }

    #[test]
    fn equality_ignores_relocation() {
        let pointer = primitives::str();

        assert_eq!(pointer, pointer.relocated());
        assert!(pointer.structural_equals(&pointer.relocated()));
        assert!(pointer.relocated().is_relocated());
    }

    #[test]
    fn equality_is_structural() {
        assert_ne!(primitives::i32(), primitives::u32());
        assert_ne!(primitives::f32(), primitives::i32());
        assert_ne!(primitives::u8(), primitives::str());
        assert_ne!(
            TypeDescriptor::struct_of([primitives::i32(), primitives::u8()]),
            TypeDescriptor::struct_of([primitives::u8(), primitives::i32()])
        );
        assert_eq!(nested(), nested());
    }

    #[test]
    fn field_offsets_are_prefix_sums() {
        let r#type = nested();
        let r#struct = r#type.as_struct().unwrap();

        assert_eq!(0, r#struct.field_offset(0).unwrap());
        assert_eq!(4, r#struct.field_offset(1).unwrap());
        assert_eq!(8, r#struct.field_offset(2).unwrap());
        assert_eq!(
            Error::IndexOutOfRange {
                index: 3,
                field_count: 3
            },
            r#struct.field_offset(3).unwrap_err()
        );
    }

    #[test]
    fn pointer_to_saturates_instead_of_wrapping() {
        let deepest = TypeDescriptor::from_shape(primitives::u8().shape().clone(), u64::MAX);
        let pointer = deepest.pointer_to();

        assert_eq!(u64::MAX, pointer.indirection_depth());
        assert_eq!(POINTER_WIDTH, pointer.size_of());
    }

    #[test]
    fn pointer_to_struct_is_not_a_struct() {
        assert!(nested().pointer_to().as_struct().is_none());
    }

    #[test]
    fn arrays_are_represented_as_structs() {
        let r#type = <[u16; 3]>::representation();

        assert_eq!(6, r#type.size_of());
        assert_eq!(3, r#type.as_struct().unwrap().field_count());
    }

    #[test]
    fn raw_pointers_add_indirection() {
        assert_eq!(primitives::u8().pointer_to(), <*const u8>::representation());
        assert_eq!(
            primitives::i64().pointer_to().pointer_to(),
            <*mut *const i64>::representation()
        );
        assert_eq!(primitives::voidptr(), <*const std::ffi::c_void>::representation());
    }
}
