use proc_macro::TokenStream;
use syn::parse_macro_input;
use syn::DeriveInput;

mod codegen;
mod opts;
mod parts;
mod util;

/// Generate a static `EntityModel` for a struct.
///
/// ```ignore
/// #[derive(Entity)]
/// #[relmap(name = "Order", table = "orders")]
/// struct Order {
///     #[relmap(id)]
///     id: i64,
///     status: String,
///     #[relmap(to_one = "Customer")]
///     customer: Option<Customer>,
///     #[relmap(list = "LineItem")]
///     lines: Vec<LineItem>,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(relmap))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match codegen::expand(input) {
        Ok(ts) => ts.into(),
        Err(e) => e.write_errors().into(),
    }
}
