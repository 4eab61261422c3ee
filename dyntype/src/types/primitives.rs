//! Named descriptors for the fixed-width scalars and the two common pointer shapes.

use super::{BasicType, Shape, TypeDescriptor};

macro_rules! declare_integer_primitives {
    ($($bitcount:literal),*) => {
        paste::paste! {
            $(
                #[must_use]
                pub const fn [<i $bitcount>]() -> TypeDescriptor {
                    TypeDescriptor::basic(true, $bitcount / 8)
                }

                #[must_use]
                pub const fn [<u $bitcount>]() -> TypeDescriptor {
                    TypeDescriptor::basic(false, $bitcount / 8)
                }
            )*
        }
    };
}

declare_integer_primitives!(8, 16, 32, 64);

#[must_use]
pub const fn f32() -> TypeDescriptor {
    TypeDescriptor::float(4)
}

#[must_use]
pub const fn f64() -> TypeDescriptor {
    TypeDescriptor::float(8)
}

/// Booleans share their descriptor with `u8`.
#[must_use]
pub const fn bool() -> TypeDescriptor {
    u8()
}

/// A pointer to a NUL-terminated byte string.
#[must_use]
pub const fn str() -> TypeDescriptor {
    TypeDescriptor::from_shape(Shape::Basic(BasicType::integer(false, 1)), 1)
}

/// A pointer to bytes of unknown shape.
#[must_use]
pub const fn voidptr() -> TypeDescriptor {
    TypeDescriptor::from_shape(Shape::Basic(BasicType::integer(false, 0)), 1)
}
