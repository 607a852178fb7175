use darling::{ast, FromDeriveInput, FromField};

#[derive(Debug, FromField)]
#[darling(attributes(relmap))]
pub struct FieldOpts {
    pub ident: Option<syn::Ident>,
    pub ty: syn::Type,

    /// Part of the identifier
    #[darling(default)]
    pub id: bool,

    #[darling(default)]
    pub column: Option<String>,

    /// Overrides the type inferred from the Rust type, e.g. `"TEXT"`
    #[darling(default)]
    pub jdbc_type: Option<String>,

    /// Target entity name of a to-one association
    #[darling(default)]
    pub to_one: Option<String>,

    /// Target embeddable name
    #[darling(default)]
    pub embedded: Option<String>,

    /// Element of a plural attribute: a JDBC type name or a domain type name
    #[darling(default)]
    pub list: Option<String>,

    #[darling(default)]
    pub set: Option<String>,

    #[darling(default)]
    pub bag: Option<String>,

    #[darling(default)]
    pub map_key: Option<String>,

    #[darling(default)]
    pub map_value: Option<String>,

    /// Not persistent
    #[darling(default)]
    pub transient: bool,
}

#[derive(Debug, FromDeriveInput)]
#[darling(attributes(relmap), supports(struct_named))]
pub struct EntityOpts {
    pub ident: syn::Ident,
    pub generics: syn::Generics,

    #[darling(default)]
    pub name: Option<String>,

    #[darling(default)]
    pub table: Option<String>,

    #[darling(default)]
    pub extends: Option<String>,

    #[darling(default)]
    pub embeddable: bool,

    pub data: ast::Data<darling::util::Ignored, FieldOpts>,
}
