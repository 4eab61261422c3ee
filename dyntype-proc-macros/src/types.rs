use proc_macro2::TokenStream;
use quote::quote;
use syn::Type;

pub fn rust_to_descriptor(ty: &Type) -> TokenStream {
    match ty {
        Type::Paren(inner) => rust_to_descriptor(&inner.elem),
        Type::Group(inner) => rust_to_descriptor(&inner.elem),
        // `c_char` is signed on some targets, but C strings are captured as unsigned bytes
        Type::Ptr(pointer) if is_c_char(&pointer.elem) => {
            quote! { ::dyntype::types::primitives::str() }
        }
        Type::Reference(_) => panic!("References are not supported, use raw pointers instead"),
        Type::Slice(_) => panic!("Slices are unsized, use a fixed-size array instead"),
        Type::BareFn(_) | Type::TraitObject(_) | Type::ImplTrait(_) | Type::Never(_) => {
            panic!("Type `{}` cannot be described", quote! { #ty })
        }
        _ => quote! { <#ty as ::dyntype::types::RepresentedAs>::representation() },
    }
}

fn is_c_char(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "c_char"),
        _ => false,
    }
}
