use crate::{
    error::{PlannerError, Result},
    schemas::SchemaHandle,
};
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;
use tracing::debug;

const MAX_SCHEMA_ERRORS: usize = 3;

/// Removes a Markdown code fence some models wrap around JSON output.
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // drop the info string (`json`, `JSON`, ...) on the opening fence line
    match body.split_once('\n') {
        Some((info, inner)) if !info.trim_start().starts_with(['{', '[']) => inner.trim(),
        Some(_) => body.trim(),
        None => {
            let inline = body.trim();
            let rest = inline.trim_start_matches(|c: char| c.is_ascii_alphabetic());
            if rest.trim_start().starts_with(['{', '[']) {
                rest.trim()
            } else {
                inline
            }
        }
    }
}

/// Parse raw service text into a JSON document.
pub(crate) fn parse_json_payload(text: &str, schema: &SchemaHandle) -> Result<Value> {
    let body = strip_code_fence(text);
    serde_json::from_str(body).map_err(|err| {
        debug!(
            target: "wanderplan::schema",
            schema = schema.schema_name(),
            error = %err,
            "response is not valid JSON"
        );
        PlannerError::SchemaViolation(format!(
            "`{}` response is not valid JSON: {}",
            schema.schema_name(),
            err
        ))
    })
}

/// Validate a structured payload against a schema
pub(crate) fn validate_structured_payload(schema: &SchemaHandle, payload: &Value) -> Result<()> {
    let validator = JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(schema.schema_json())
        .map_err(|err| {
            PlannerError::SchemaViolation(format!(
                "Failed to prepare `{}` schema for validation: {}",
                schema.schema_name(),
                err
            ))
        })?;

    if let Err(errors) = validator.validate(payload) {
        let mut details = Vec::new();
        let mut truncated = false;

        for (idx, error) in errors.enumerate() {
            if idx == MAX_SCHEMA_ERRORS {
                truncated = true;
                break;
            }
            let mut path = error.instance_path.to_string();
            if path.is_empty() {
                path = "<root>".to_string();
            }
            details.push(format!("{}: {}", path, error));
        }

        let mut detail_str = if details.is_empty() {
            "structured payload failed schema validation".to_string()
        } else {
            details.join("; ")
        };

        if truncated {
            detail_str.push_str("; additional errors truncated");
        }

        debug!(
            target: "wanderplan::schema",
            schema = schema.schema_name(),
            error = %detail_str,
            payload = %payload
        );

        return Err(PlannerError::SchemaViolation(format!(
            "payload does not match `{}` schema: {}",
            schema.schema_name(),
            detail_str
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence_variants() {
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```{\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn test_inline_fence_with_info_string() {
        assert_eq!(strip_code_fence("```json{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```JSON [1, 2]```"), "[1, 2]");
    }

    #[test]
    fn test_unterminated_fence_left_alone() {
        assert_eq!(strip_code_fence("```json\n{}"), "```json\n{}");
    }
}
