mod completion_schema;
mod schema_extraction;

use proc_macro::TokenStream;

/// Attaches a cached response schema to a struct.
///
/// The struct must also derive `schemars::JsonSchema` and `serde::Deserialize`.
/// Doc comments on the struct and its fields are copied into the generated
/// schema as `title`/`description` metadata so the generation service sees them.
///
/// ```ignore
/// #[derive(Deserialize, JsonSchema)]
/// #[completion_schema(name = "Itinerary")]
/// pub struct Itinerary { /* ... */ }
/// ```
#[proc_macro_attribute]
pub fn completion_schema(attr: TokenStream, item: TokenStream) -> TokenStream {
    completion_schema::completion_schema(attr, item)
}
