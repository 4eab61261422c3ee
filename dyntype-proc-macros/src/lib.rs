use proc_macro::TokenStream;

use crate::items::structs::native_struct_inner;

mod items;
mod types;

/// Implements `dyntype::types::RepresentedAs` for a `#[repr(C, packed)]` struct, describing its
/// fields in declaration order.
#[proc_macro_attribute]
pub fn native_struct(attr: TokenStream, item: TokenStream) -> TokenStream {
    native_struct_inner(attr, item)
}
