//! Dynamic ingestion payloads and their validation pass.
//!
//! Entities arrive as JSON mappings produced by per-language extractors.
//! Unknown keys are ignored, every field is optional at parse time, and a
//! single validation pass reports all missing or malformed fields at once.
//! Structured fields (`parameters`, `calls`, ...) are accepted either as
//! native JSON values or as strings containing JSON, because older
//! extractors serialized them before handing them over.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result, ValidationIssues};
use crate::models::{
    CallRef, CodeEntity, EntityKind, Language, ParameterInfo, ReturnInfo, TypeRef, EMBEDDING_DIMS,
};

/// Accept `null`, a native JSON value, or a string containing JSON.
fn json_or_string<'de, T, D>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    T: DeserializeOwned,
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => serde_json::from_str(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
        Some(other) => serde_json::from_value(other)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Raw entity payload as received from an extractor, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fqn: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line_start: Option<i64>,
    #[serde(default)]
    pub line_end: Option<i64>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default, deserialize_with = "json_or_string")]
    pub parameters: Option<Vec<ParameterInfo>>,
    #[serde(default, deserialize_with = "json_or_string")]
    pub returns: Option<ReturnInfo>,
    #[serde(default, deserialize_with = "json_or_string")]
    pub extends: Option<Vec<TypeRef>>,
    #[serde(default, deserialize_with = "json_or_string")]
    pub implements: Option<Vec<TypeRef>>,
    #[serde(default, deserialize_with = "json_or_string")]
    pub calls: Option<Vec<CallRef>>,
    #[serde(default, deserialize_with = "json_or_string")]
    pub api_endpoints: Option<Vec<String>>,
    #[serde(default, deserialize_with = "json_or_string")]
    pub db_tables: Option<Vec<String>>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl EntityPayload {
    /// Parse a JSON mapping into a payload. Unknown keys are ignored;
    /// type mismatches surface as a [`Error::Validation`].
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| {
            Error::Validation(ValidationIssues {
                missing: Vec::new(),
                invalid: vec![e.to_string()],
            })
        })
    }

    /// Run the validation pass and produce a [`CodeEntity`] ready to persist.
    ///
    /// All missing required fields and all malformed values are reported
    /// together in one [`Error::Validation`]; nothing is written on failure.
    pub fn validate(self) -> Result<CodeEntity> {
        let mut issues = ValidationIssues::default();

        let id = take_required(self.id, "id", &mut issues);
        let name = take_required(self.name, "name", &mut issues);
        let fqn = take_required(self.fqn, "fqn", &mut issues);
        let kind = take_required(self.kind, "kind", &mut issues);
        let content = take_required(self.content, "content", &mut issues);
        let file = take_required(self.file, "file", &mut issues);

        let line_start = match self.line_start {
            Some(n) if n >= 0 => n,
            Some(n) => {
                issues
                    .invalid
                    .push(format!("line_start: must be non-negative, got {}", n));
                0
            }
            None => {
                issues.missing.push("line_start".to_string());
                0
            }
        };

        // line_end falls back to line_start when absent.
        let line_end = match self.line_end {
            Some(n) if n >= line_start => n,
            Some(n) => {
                issues.invalid.push(format!(
                    "line_end: must be >= line_start ({}), got {}",
                    line_start, n
                ));
                line_start
            }
            None => line_start,
        };

        if let Some(ref vector) = self.embedding {
            if vector.len() != EMBEDDING_DIMS {
                issues.invalid.push(format!(
                    "embedding: expected {} components, got {}",
                    EMBEDDING_DIMS,
                    vector.len()
                ));
            }
        }

        if !issues.is_empty() {
            return Err(Error::Validation(issues));
        }

        Ok(CodeEntity {
            id,
            name,
            fqn,
            kind: EntityKind::parse(&kind),
            content,
            signature: self.signature.unwrap_or_default(),
            file,
            line_start,
            line_end,
            language: self.language.map(|l| Language::parse(&l)).unwrap_or_default(),
            parameters: self.parameters,
            returns: self.returns,
            extends: self.extends,
            implements: self.implements,
            calls: self.calls,
            api_endpoints: self.api_endpoints,
            db_tables: self.db_tables,
            embedding: self.embedding,
        })
    }
}

/// Pull a required string out of the payload, recording an issue when it is
/// absent or blank.
fn take_required(
    value: Option<String>,
    field: &str,
    issues: &mut ValidationIssues,
) -> String {
    match value {
        Some(s) if !s.trim().is_empty() => s,
        _ => {
            issues.missing.push(field.to_string());
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_payload() -> serde_json::Value {
        json!({
            "id": "func_test.py_calculate_42",
            "name": "calculate",
            "fqn": "test.py::calculate",
            "kind": "function",
            "content": "def calculate(x, y):\n    return x + y",
            "signature": "def calculate(x, y):",
            "file": "test.py",
            "line_start": 42,
            "line_end": 43,
            "language": "python"
        })
    }

    #[test]
    fn test_valid_payload_passes() {
        let entity = EntityPayload::from_value(valid_payload())
            .unwrap()
            .validate()
            .unwrap();
        assert_eq!(entity.id, "func_test.py_calculate_42");
        assert_eq!(entity.kind, EntityKind::Function);
        assert_eq!(entity.language, Language::Python);
        assert_eq!(entity.line_end, 43);
        assert!(entity.embedding.is_none());
    }

    #[test]
    fn test_all_missing_fields_reported() {
        let err = EntityPayload::from_value(json!({"id": "only_id"}))
            .unwrap()
            .validate()
            .unwrap_err();
        match err {
            Error::Validation(issues) => {
                for field in ["name", "fqn", "kind", "content", "file", "line_start"] {
                    assert!(
                        issues.missing.iter().any(|m| m == field),
                        "expected {} in {:?}",
                        field,
                        issues.missing
                    );
                }
                assert!(!issues.missing.iter().any(|m| m == "id"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_required_field_counts_as_missing() {
        let mut payload = valid_payload();
        payload["name"] = json!("   ");
        let err = EntityPayload::from_value(payload)
            .unwrap()
            .validate()
            .unwrap_err();
        match err {
            Error::Validation(issues) => assert!(issues.missing.iter().any(|m| m == "name")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let mut payload = valid_payload();
        payload["totally_unknown"] = json!({"nested": true});
        assert!(EntityPayload::from_value(payload)
            .unwrap()
            .validate()
            .is_ok());
    }

    #[test]
    fn test_structured_fields_as_json_strings() {
        let mut payload = valid_payload();
        payload["parameters"] =
            json!("[{\"name\": \"x\", \"type_name\": \"int\", \"optional\": false}]");
        payload["returns"] = json!("{\"type_name\": \"int\", \"nullable\": false}");
        payload["calls"] =
            json!("[{\"target_id\": \"api_get\", \"target_name\": \"api.get\", \"line\": 16}]");

        let entity = EntityPayload::from_value(payload)
            .unwrap()
            .validate()
            .unwrap();
        let params = entity.parameters.unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, "x");
        assert_eq!(entity.returns.unwrap().type_name, "int");
        assert_eq!(entity.calls.unwrap()[0].target_name, "api.get");
    }

    #[test]
    fn test_structured_fields_as_native_json() {
        let mut payload = valid_payload();
        payload["api_endpoints"] = json!(["/api/users", "/api/users/{id}"]);
        payload["extends"] = json!([{"name": "Parent", "kind": "class", "generics": []}]);

        let entity = EntityPayload::from_value(payload)
            .unwrap()
            .validate()
            .unwrap();
        assert_eq!(entity.api_endpoints.unwrap().len(), 2);
        assert_eq!(entity.extends.unwrap()[0].name, "Parent");
    }

    #[test]
    fn test_wrong_length_embedding_rejected() {
        let mut payload = valid_payload();
        payload["embedding"] = json!([0.1, 0.2, 0.3]);
        let err = EntityPayload::from_value(payload)
            .unwrap()
            .validate()
            .unwrap_err();
        match err {
            Error::Validation(issues) => {
                assert!(issues.invalid.iter().any(|m| m.starts_with("embedding")))
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_line_end_defaults_to_line_start() {
        let mut payload = valid_payload();
        payload.as_object_mut().unwrap().remove("line_end");
        let entity = EntityPayload::from_value(payload)
            .unwrap()
            .validate()
            .unwrap();
        assert_eq!(entity.line_end, 42);
    }

    #[test]
    fn test_line_end_before_line_start_rejected() {
        let mut payload = valid_payload();
        payload["line_end"] = json!(7);
        let err = EntityPayload::from_value(payload)
            .unwrap()
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
