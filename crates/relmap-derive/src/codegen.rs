use darling::FromDeriveInput;
use heck::ToSnakeCase;
use quote::{format_ident, quote};
use syn::DeriveInput;

use crate::opts::EntityOpts;
use crate::parts::{gen_field, lit};

pub fn expand(input: DeriveInput) -> Result<proc_macro2::TokenStream, darling::Error> {
    let opts = EntityOpts::from_derive_input(&input)?;

    // guard: no generics
    if !opts.generics.params.is_empty() {
        return Err(darling::Error::unsupported_shape("generic type parameters are not supported"));
    }

    let ident = &opts.ident;
    let rust_name = ident.to_string();
    let entity_name_lit = lit(opts.name.as_deref().unwrap_or(&rust_name));

    // Hierarchy roots default to a snake_case table; subtypes share their parent's.
    let table = match (&opts.table, &opts.extends, opts.embeddable) {
        (Some(_), _, true) => {
            return Err(darling::Error::custom("embeddables have no table").with_span(ident));
        }
        (Some(table), _, false) => Some(table.clone()),
        (None, None, false) => Some(rust_name.to_snake_case()),
        _ => None,
    };
    if let Some(table) = &table {
        relmap_core::model::ident::validate_ident(table)
            .map_err(|e| darling::Error::custom(e.to_string()).with_span(ident))?;
    }
    let table_tokens = match &table {
        Some(t) => {
            let t = lit(t);
            quote! { Some(#t) }
        }
        None => quote! { None },
    };
    let extends_tokens = match &opts.extends {
        Some(parent) => {
            let parent = lit(parent);
            quote! { Some(#parent) }
        }
        None => quote! { None },
    };
    let kind = if opts.embeddable {
        quote! { ::relmap::core::model::entity::TypeKind::Embeddable }
    } else {
        quote! { ::relmap::core::model::entity::TypeKind::Entity }
    };

    let fields = match &opts.data {
        darling::ast::Data::Struct(s) => s,
        _ => unreachable!("supports(struct_named) enforces named fields"),
    };

    let mut errors = darling::Error::accumulator();
    let mut field_inits = Vec::new();
    for f in fields.iter().filter(|f| !f.transient) {
        if let Some(init) = errors.handle(gen_field(f)) {
            field_inits.push(init);
        }
    }
    errors.finish()?;

    let fields_sym = format_ident!("__{}_FIELDS", rust_name.to_uppercase());
    let model_sym = format_ident!("__{}_MODEL", rust_name.to_uppercase());

    let ts = quote! {
        #[doc(hidden)]
        #[allow(non_upper_case_globals)]
        const #fields_sym: &[::relmap::core::model::entity::FieldModel] = &[
            #( #field_inits ),*
        ];

        #[doc(hidden)]
        #[allow(non_upper_case_globals)]
        const #model_sym: ::relmap::core::model::entity::EntityModel =
            ::relmap::core::model::entity::EntityModel {
                entity_name: #entity_name_lit,
                rust_name:   stringify!(#ident),
                table_name:  #table_tokens,
                extends:     #extends_tokens,
                kind:        #kind,
                fields:      #fields_sym,
            };

        #[automatically_derived]
        impl ::relmap::core::model::entity::Entity for #ident {
            const MODEL: &'static ::relmap::core::model::entity::EntityModel = &#model_sym;
        }
    };

    Ok(ts)
}
