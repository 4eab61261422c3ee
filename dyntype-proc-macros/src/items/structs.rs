use proc_macro::TokenStream;
use quote::quote;
use syn::{Fields, ItemStruct, parse_macro_input, token::Paren};

use crate::types::rust_to_descriptor;

/// # Panics
/// Will panic if the struct is not `#[repr(C, packed)]` or does not have named fields, since the
/// descriptor could not describe its layout otherwise.
pub fn native_struct_inner(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let item = parse_macro_input!(item as ItemStruct);

    let mut is_repr_c = false;
    let mut is_packed = false;

    for attr in &item.attrs {
        if !attr.path().is_ident("repr") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("C") {
                is_repr_c = true;
            } else if meta.path.is_ident("packed") {
                is_packed = true;
            }

            if meta.input.peek(Paren) {
                let content;
                syn::parenthesized!(content in meta.input);
                content.parse::<proc_macro2::TokenStream>()?;
            }

            Ok(())
        })
        .unwrap();
    }

    assert!(
        is_repr_c && is_packed,
        "To be described by a type descriptor, structs must have #[repr(C, packed)]"
    );

    let Fields::Named(fields) = &item.fields else {
        panic!("Only structs with named fields are supported");
    };

    let field_types: Vec<_> = fields
        .named
        .iter()
        .map(|field| rust_to_descriptor(&field.ty))
        .collect();

    let name = &item.ident;
    let (impl_generics, ty_generics, where_clause) = item.generics.split_for_impl();

    quote! {
        #item

        impl #impl_generics ::dyntype::types::RepresentedAs for #name #ty_generics #where_clause {
            fn representation() -> ::dyntype::types::TypeDescriptor {
                ::dyntype::types::TypeDescriptor::struct_of([
                    #(#field_types),*
                ])
            }
        }
    }
    .into()
}
