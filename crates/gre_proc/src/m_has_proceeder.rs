use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, spanned::Spanned, Data, DeriveInput, Fields, Member};

pub fn has_proceeder_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match proceeder_member(&input) {
        Ok(member) => {
            let name = &input.ident;
            let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
            quote! {
                impl #impl_generics ::gre::resource::HasProceeder for #name #ty_generics #where_clause {
                    #[inline]
                    fn proceeder(&self) -> &::gre::resource::EventProceeder {
                        &self.#member
                    }
                }
            }
            .into()
        }
        Err(error) => error.to_compile_error().into(),
    }
}

fn proceeder_member(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let data = match &input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                input.span(),
                "HasProceeder can only be derived on structs",
            ))
        }
    };

    let members: Vec<(Member, bool, bool)> = match &data.fields {
        Fields::Named(fields) => fields
            .named
            .iter()
            .map(|field| {
                let ident = field.ident.clone().expect("named fields have identifiers");
                let by_name = ident == "proceeder";
                let marked = field.attrs.iter().any(|a| a.path.is_ident("proceeder"));
                (Member::Named(ident), marked, by_name)
            })
            .collect(),
        Fields::Unnamed(fields) => fields
            .unnamed
            .iter()
            .enumerate()
            .map(|(index, field)| {
                let marked = field.attrs.iter().any(|a| a.path.is_ident("proceeder"));
                (Member::Unnamed(index.into()), marked, false)
            })
            .collect(),
        Fields::Unit => vec![],
    };

    let marked: Vec<_> = members.iter().filter(|(_, marked, _)| *marked).collect();
    if marked.len() > 1 {
        return Err(syn::Error::new(
            input.span(),
            "only one field can be marked with #[proceeder]",
        ));
    }

    marked
        .first()
        .copied()
        .or_else(|| members.iter().find(|(_, _, by_name)| *by_name))
        .map(|(member, _, _)| quote!(#member))
        .ok_or_else(|| {
            syn::Error::new(
                input.span(),
                "no proceeder field: name it `proceeder` or mark it with #[proceeder]",
            )
        })
}
