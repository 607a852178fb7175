use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote};
use relmap_core::model::jdbc::JdbcType;

use crate::opts::FieldOpts;
use crate::util::{infer_jdbc_type, option_inner_ty};

/// Tokens for a `JdbcType` constant.
pub fn jdbc_tokens(ty: JdbcType) -> TokenStream {
    match ty {
        JdbcType::Array(element) => {
            let inner = jdbc_tokens(*element);
            quote! { ::relmap::core::model::jdbc::JdbcType::Array(&#inner) }
        }
        scalar => {
            let variant = format_ident!("{}", format!("{scalar:?}"));
            quote! { ::relmap::core::model::jdbc::JdbcType::#variant }
        }
    }
}

/// A JDBC type name becomes a basic element, anything else a domain type.
fn element_tokens(spec: &str) -> TokenStream {
    match JdbcType::from_name(spec) {
        Some(ty) => {
            let ty = jdbc_tokens(ty);
            quote! { ::relmap::core::model::entity::ElementModel::Basic(#ty) }
        }
        None => {
            let name = lit(spec);
            quote! { ::relmap::core::model::entity::ElementModel::Domain(#name) }
        }
    }
}

fn option_lit(value: Option<&str>) -> TokenStream {
    match value {
        Some(v) => {
            let v = lit(v);
            quote! { Some(#v) }
        }
        None => quote! { None },
    }
}

/// `FieldModel` initializer for one persistent field.
pub fn gen_field(f: &FieldOpts) -> Result<TokenStream, darling::Error> {
    let fid = f.ident.as_ref().expect("named field");
    let name = fid.to_string();
    let name_lit = lit(&name);

    let plural = [("list", &f.list), ("set", &f.set), ("bag", &f.bag)]
        .into_iter()
        .filter_map(|(kind, element)| element.as_deref().map(|e| (kind, e)))
        .collect::<Vec<_>>();
    let is_map = f.map_key.is_some() || f.map_value.is_some();
    let shapes = usize::from(f.to_one.is_some())
        + usize::from(f.embedded.is_some())
        + plural.len()
        + usize::from(is_map);
    if shapes > 1 {
        return Err(darling::Error::custom(
            "use at most one of `to_one`, `embedded`, `list`, `set`, `bag`, `map_key`/`map_value`",
        )
        .with_span(fid));
    }
    if f.id && shapes > 0 {
        return Err(darling::Error::custom("`id` fields must be basic columns").with_span(fid));
    }

    if let Some(target) = &f.to_one {
        let target = lit(target);
        let column = option_lit(f.column.as_deref());
        return Ok(quote! {
            ::relmap::core::model::entity::FieldModel::ToOne(
                ::relmap::core::model::entity::ReferenceField {
                    name: #name_lit,
                    target: #target,
                    column: #column,
                }
            )
        });
    }

    if let Some(target) = &f.embedded {
        let target = lit(target);
        return Ok(quote! {
            ::relmap::core::model::entity::FieldModel::Embedded(
                ::relmap::core::model::entity::EmbeddedField {
                    name: #name_lit,
                    target: #target,
                }
            )
        });
    }

    if let Some((kind, element)) = plural.first() {
        let kind = format_ident!("{}", heck::AsUpperCamelCase(kind).to_string());
        let element = element_tokens(element);
        return Ok(quote! {
            ::relmap::core::model::entity::FieldModel::Plural(
                ::relmap::core::model::entity::CollectionField {
                    name: #name_lit,
                    kind: ::relmap::core::model::entity::CollectionKind::#kind,
                    element: #element,
                }
            )
        });
    }

    if is_map {
        let (Some(key), Some(value)) = (&f.map_key, &f.map_value) else {
            return Err(
                darling::Error::custom("map attributes need both `map_key` and `map_value`")
                    .with_span(fid),
            );
        };
        let key = element_tokens(key);
        let value = element_tokens(value);
        return Ok(quote! {
            ::relmap::core::model::entity::FieldModel::Map(
                ::relmap::core::model::entity::MapField {
                    name: #name_lit,
                    key: #key,
                    value: #value,
                }
            )
        });
    }

    let nullable = option_inner_ty(&f.ty).is_some();
    let inner_ty = option_inner_ty(&f.ty).unwrap_or(&f.ty);
    let jdbc_type = match &f.jdbc_type {
        Some(type_name) => JdbcType::from_name(type_name).ok_or_else(|| {
            darling::Error::custom(format!("unknown jdbc_type `{type_name}`")).with_span(fid)
        })?,
        None => infer_jdbc_type(inner_ty).ok_or_else(|| {
            darling::Error::custom(concat!(
                "cannot infer a column type; ",
                "add `#[relmap(jdbc_type = \"..\")]` or an association attribute",
            ))
            .with_span(&f.ty)
        })?,
    };
    let jdbc_type = jdbc_tokens(jdbc_type);

    let column = f.column.clone().unwrap_or_else(|| name.clone());
    let column_lit = lit(&column);
    let id_lit = syn::LitBool::new(f.id, Span::call_site());
    let nullable_lit = syn::LitBool::new(nullable, Span::call_site());

    Ok(quote! {
        ::relmap::core::model::entity::FieldModel::Column(
            ::relmap::core::model::entity::ColumnField {
                name: #name_lit,
                id: #id_lit,
                column: #column_lit,
                jdbc_type: #jdbc_type,
                ty_name: stringify!(#inner_ty),
                nullable: #nullable_lit,
            }
        )
    })
}

pub fn lit(s: &str) -> syn::LitStr {
    syn::LitStr::new(s, Span::call_site())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jdbc_tokens() {
        let tokens = jdbc_tokens(JdbcType::Array(&JdbcType::BigInt)).to_string();
        assert!(tokens.contains("Array"));
        assert!(tokens.contains("BigInt"));
        assert!(jdbc_tokens(JdbcType::Varchar).to_string().ends_with("Varchar"));
    }

    #[test]
    fn test_element_tokens() {
        assert!(element_tokens("varchar").to_string().contains("Basic"));
        assert!(element_tokens("LineItem").to_string().contains("Domain"));
    }
}
