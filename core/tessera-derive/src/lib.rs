//! Tessera Derive — procedural macros for the Tessera table engine.
//!
//! Provides `#[derive(Record)]`, which turns a struct into a row literal for
//! store construction.

use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr, parse_macro_input};

/// Derive `IntoRow` for a struct with named fields.
///
/// # Example
///
/// ```ignore
/// #[derive(Record)]
/// pub struct Trade {
///     pub ts: i64,
///     #[tessera(rename = "sym")]
///     pub symbol: String,
///     pub price: Option<f64>,
///     #[tessera(skip)]
///     pub scratch: Vec<u8>,
/// }
/// ```
///
/// Every non-skipped field becomes one column, in declaration order. Field
/// types need `Into<ScalarValue>`.
#[proc_macro_derive(Record, attributes(tessera))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

struct FieldAttrs {
    rename: Option<String>,
    skip: bool,
}

fn field_attrs(field: &syn::Field) -> syn::Result<FieldAttrs> {
    let mut attrs = FieldAttrs {
        rename: None,
        skip: false,
    };
    for attr in &field.attrs {
        if !attr.path().is_ident("tessera") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let name: LitStr = meta.value()?.parse()?;
                attrs.rename = Some(name.value());
                Ok(())
            } else if meta.path.is_ident("skip") {
                attrs.skip = true;
                Ok(())
            } else {
                Err(meta.error("unsupported tessera attribute; expected `rename = \"...\"` or `skip`"))
            }
        })?;
    }
    Ok(attrs)
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Record can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Record can only be derived for structs",
            ));
        }
    };

    let mut pushes = Vec::with_capacity(fields.len());
    for field in fields {
        let attrs = field_attrs(field)?;
        if attrs.skip {
            continue;
        }
        let Some(ident) = &field.ident else {
            continue;
        };
        let column = attrs.rename.unwrap_or_else(|| ident.to_string());
        pushes.push(quote! {
            row.push(#column, self.#ident);
        });
    }
    let capacity = pushes.len();

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics ::tessera_core::storage::IntoRow for #name #ty_generics #where_clause {
            fn into_row(self) -> ::tessera_core::storage::Row {
                let mut row = ::tessera_core::storage::Row::with_capacity(#capacity);
                #(#pushes)*
                row
            }
        }
    })
}
