extern crate self as dyntype;

pub mod arith;
pub mod codec;
pub mod errors;
pub mod heap;
pub mod render;
pub mod types;
pub mod value;

pub use dyntype_proc_macros::native_struct;
pub use errors::{Error, Result};
pub use heap::VirtualHeap;
pub use types::{RepresentedAs, TypeDescriptor};
pub use value::ValueCell;
