//! JSON Schema sanitizer for tool declarations.
//!
//! Some completion APIs reject decorative JSON Schema keywords that schema
//! generators like to emit. Tool parameter schemas are run through
//! [`sanitize_schema`] before being sent to the model:
//!
//! - `additionalProperties` is stripped at every nesting depth
//! - `title` is stripped at the root only (the tool name serves as the title;
//!   nested titles are harmless and kept)
//!
//! Everything else (`required`, `type`, `enum`, `description`, defaults) is
//! preserved. The transform is idempotent.

use serde_json::Value;

/// Return a cleaned copy of a tool parameter schema.
///
/// Non-object input is returned unchanged.
pub fn sanitize_schema(schema: &Value) -> Value {
    sanitize_value(schema, true)
}

fn sanitize_value(value: &Value, is_root: bool) -> Value {
    match value {
        Value::Object(map) => {
            let mut clean = serde_json::Map::with_capacity(map.len());
            for (key, val) in map {
                if key == "additionalProperties" {
                    continue;
                }
                if is_root && key == "title" {
                    continue;
                }

                let cleaned = if key == "properties" {
                    // Property names are user data, not schema keywords; only
                    // their values are schemas.
                    match val {
                        Value::Object(props) => Value::Object(
                            props
                                .iter()
                                .map(|(name, prop)| (name.clone(), sanitize_value(prop, false)))
                                .collect(),
                        ),
                        other => sanitize_value(other, false),
                    }
                } else {
                    sanitize_value(val, false)
                };
                clean.insert(key.clone(), cleaned);
            }
            Value::Object(clean)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|i| sanitize_value(i, false)).collect())
        }
        other => other.clone(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strips_additional_properties_at_depth() {
        let schema = json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "filters": {
                    "type": "object",
                    "additionalProperties": false,
                    "properties": {
                        "region": {"type": "string"}
                    }
                },
                "rows": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "additionalProperties": true
                    }
                }
            }
        });

        let clean = sanitize_schema(&schema);
        assert!(clean.get("additionalProperties").is_none());
        assert!(
            clean["properties"]["filters"]
                .get("additionalProperties")
                .is_none()
        );
        assert!(
            clean["properties"]["rows"]["items"]
                .get("additionalProperties")
                .is_none()
        );
    }

    #[test]
    fn test_strips_title_at_root_only() {
        let schema = json!({
            "title": "RunQueryParams",
            "type": "object",
            "properties": {
                "sql": {"type": "string", "title": "SQL"}
            }
        });

        let clean = sanitize_schema(&schema);
        assert!(clean.get("title").is_none());
        assert_eq!(clean["properties"]["sql"]["title"], "SQL");
    }

    #[test]
    fn test_preserves_required_type_enum() {
        let schema = json!({
            "type": "object",
            "required": ["kind"],
            "properties": {
                "kind": {
                    "type": "string",
                    "enum": ["line", "bar", "pie"],
                    "description": "Chart kind",
                    "default": "line"
                }
            }
        });

        let clean = sanitize_schema(&schema);
        assert_eq!(clean["required"], json!(["kind"]));
        assert_eq!(clean["properties"]["kind"]["enum"], json!(["line", "bar", "pie"]));
        assert_eq!(clean["properties"]["kind"]["description"], "Chart kind");
        assert_eq!(clean["properties"]["kind"]["default"], "line");
    }

    #[test]
    fn test_idempotent() {
        let schema = json!({
            "title": "T",
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "a": {"type": "object", "additionalProperties": false}
            }
        });

        let once = sanitize_schema(&schema);
        let twice = sanitize_schema(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_non_object_passthrough() {
        assert_eq!(sanitize_schema(&json!("string")), json!("string"));
        assert_eq!(sanitize_schema(&json!(7)), json!(7));
        assert_eq!(sanitize_schema(&json!(null)), json!(null));
    }

    #[test]
    fn test_property_named_title_survives() {
        // "title" as a property NAME is user data, not a schema keyword.
        let schema = json!({
            "type": "object",
            "properties": {
                "title": {"type": "string"}
            }
        });

        let clean = sanitize_schema(&schema);
        assert_eq!(clean["properties"]["title"]["type"], "string");
    }
}
