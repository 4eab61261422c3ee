//! Native Rust types that a cell's bytes can be decoded into.

mod sealed {
    pub trait Sealed {}
}

pub trait Native: sealed::Sealed + Sized {
    const WIDTH: usize;

    /// Decodes little-endian bytes, returning `None` if there are not exactly `WIDTH` of them.
    fn from_le_slice(bytes: &[u8]) -> Option<Self>;
}

macro_rules! declare_native {
    ($($native:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $native {}

            impl Native for $native {
                const WIDTH: usize = size_of::<$native>();

                fn from_le_slice(bytes: &[u8]) -> Option<Self> {
                    bytes.try_into().ok().map(<$native>::from_le_bytes)
                }
            }
        )*
    };
}

declare_native!(i8, u8, i16, u16, i32, u32, i64, u64, isize, usize, f32, f64);

impl sealed::Sealed for bool {}

impl Native for bool {
    const WIDTH: usize = 1;

    fn from_le_slice(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [byte] => Some(*byte != 0),
            _ => None,
        }
    }
}

impl<T> sealed::Sealed for *const T {}

impl<T> Native for *const T {
    const WIDTH: usize = size_of::<usize>();

    fn from_le_slice(bytes: &[u8]) -> Option<Self> {
        usize::from_le_slice(bytes).map(std::ptr::with_exposed_provenance)
    }
}

impl<T> sealed::Sealed for *mut T {}

impl<T> Native for *mut T {
    const WIDTH: usize = size_of::<usize>();

    fn from_le_slice(bytes: &[u8]) -> Option<Self> {
        usize::from_le_slice(bytes).map(std::ptr::with_exposed_provenance_mut)
    }
}
