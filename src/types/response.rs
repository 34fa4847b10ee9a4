use std::any::{type_name, TypeId};

use serde_json::Value;

use crate::{
    error::{PlannerError, Result},
    schemas::{
        validation::{parse_json_payload, validate_structured_payload},
        CompletionSchema, SchemaHandle,
    },
};

/// Turn raw service text into `T`, or fail with `SchemaViolation`.
///
/// The text is parsed as JSON, checked against `T`'s JSON Schema, then
/// deserialized. Nothing partial is ever returned.
pub fn parse_structured_text<T>(text: &str) -> Result<T>
where
    T: CompletionSchema,
{
    let schema = T::schema();
    let payload = parse_json_payload(text, schema)?;
    validate_structured_payload(schema, &payload)?;
    deserialize_structured_response::<T>(&payload, schema)
}

pub fn deserialize_structured_response<T>(payload: &Value, schema: &SchemaHandle) -> Result<T>
where
    T: CompletionSchema,
{
    ensure_schema_matches::<T>(schema)?;

    serde_path_to_error::deserialize(payload).map_err(|err| {
        let path = err.path().to_string();
        let location = if path.is_empty() || path == "." {
            "<root>".to_string()
        } else {
            path
        };
        PlannerError::SchemaViolation(format!(
            "failed to deserialize `{}` at {}: {}",
            schema.schema_name(),
            location,
            err.inner()
        ))
    })
}

fn ensure_schema_matches<T: 'static>(schema: &SchemaHandle) -> Result<()> {
    if schema.type_id() != TypeId::of::<T>() {
        return Err(PlannerError::SchemaViolation(format!(
            "schema `{}` does not match target type `{}`",
            schema.schema_name(),
            type_name::<T>(),
        )));
    }
    Ok(())
}
