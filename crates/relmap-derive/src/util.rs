use relmap_core::model::jdbc::JdbcType;

fn single_generic_arg<'a>(ty: &'a syn::Type, wrapper: &str) -> Option<&'a syn::Type> {
    if let syn::Type::Path(tp) = ty {
        let seg = tp.path.segments.last()?;
        if seg.ident == wrapper {
            if let syn::PathArguments::AngleBracketed(args) = &seg.arguments {
                for ga in &args.args {
                    if let syn::GenericArgument::Type(inner) = ga {
                        return Some(inner);
                    }
                }
            }
        }
    }
    None
}

pub fn option_inner_ty(ty: &syn::Type) -> Option<&syn::Type> {
    single_generic_arg(ty, "Option")
}

pub fn vec_inner_ty(ty: &syn::Type) -> Option<&syn::Type> {
    single_generic_arg(ty, "Vec")
}

fn last_ident(ty: &syn::Type) -> Option<String> {
    match ty {
        syn::Type::Path(tp) => tp.path.segments.last().map(|s| s.ident.to_string()),
        syn::Type::Reference(r) => last_ident(&r.elem),
        _ => None,
    }
}

fn scalar_type(ty: &syn::Type) -> Option<&'static JdbcType> {
    let ty: &'static JdbcType = match last_ident(ty)?.as_str() {
        "bool" => &JdbcType::Boolean,
        "i8" | "u8" | "i16" => &JdbcType::SmallInt,
        "u16" | "i32" => &JdbcType::Integer,
        "u32" | "i64" | "u64" | "isize" | "usize" => &JdbcType::BigInt,
        "f32" => &JdbcType::Real,
        "f64" => &JdbcType::Double,
        "char" => &JdbcType::Char,
        "String" | "str" => &JdbcType::Varchar,
        "Decimal" => &JdbcType::Decimal,
        "NaiveDate" => &JdbcType::Date,
        "NaiveTime" => &JdbcType::Time,
        "NaiveDateTime" | "DateTime" => &JdbcType::Timestamp,
        "Uuid" => &JdbcType::Uuid,
        "Value" => &JdbcType::Json,
        _ => return None,
    };
    Some(ty)
}

/// Infer the column type of a (non-`Option`) Rust type.
pub fn infer_jdbc_type(ty: &syn::Type) -> Option<JdbcType> {
    if let Some(inner) = vec_inner_ty(ty) {
        if last_ident(inner).as_deref() == Some("u8") {
            return Some(JdbcType::Binary);
        }
        return scalar_type(inner).map(JdbcType::Array);
    }
    scalar_type(ty).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(src: &str) -> syn::Type {
        syn::parse_str(src).unwrap()
    }

    #[test]
    fn test_infer_jdbc_type() {
        assert_eq!(infer_jdbc_type(&ty("i64")), Some(JdbcType::BigInt));
        assert_eq!(infer_jdbc_type(&ty("String")), Some(JdbcType::Varchar));
        assert_eq!(infer_jdbc_type(&ty("Vec<u8>")), Some(JdbcType::Binary));
        assert_eq!(
            infer_jdbc_type(&ty("Vec<String>")),
            Some(JdbcType::Array(&JdbcType::Varchar))
        );
        assert_eq!(infer_jdbc_type(&ty("chrono::NaiveDate")), Some(JdbcType::Date));
        assert_eq!(infer_jdbc_type(&ty("MyType")), None);
    }

    #[test]
    fn test_option_inner_ty() {
        let t = ty("Option<i32>");
        assert!(option_inner_ty(&t).is_some());
        assert!(option_inner_ty(&ty("i32")).is_none());
    }
}
