use crate::schema::{FieldDescriptor, FieldKind, FieldSchema};
use serde_json::{Map, Value};
use std::collections::HashSet;
use thiserror::Error;

/// Longest accepted free-text answer, in characters.
pub const MAX_TEXT_LEN: usize = 10_000;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("submission must be a JSON object")]
    NotAnObject,
    #[error("{field}: this field is required")]
    MissingRequired { field: String },
    #[error("{field}: unknown field")]
    UnknownField { field: String },
    #[error("{field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("{field}: attachments are only accepted on file fields")]
    NotAFileField { field: String },
}

impl ValidationError {
    fn invalid(field: &FieldDescriptor, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.id.clone(),
            reason: reason.into(),
        }
    }
}

/// Validate a submitted payload against a form schema.
///
/// `attached` holds the field ids that received an uploaded file. On success the
/// returned map contains only answered, non-file fields, with values
/// normalised (trimmed strings, numbers parsed).
pub fn validate_submission(
    schema: &FieldSchema,
    data: &Value,
    attached: &HashSet<String>,
) -> Result<Map<String, Value>, Vec<ValidationError>> {
    let Some(object) = data.as_object() else {
        return Err(vec![ValidationError::NotAnObject]);
    };

    let mut errors: Vec<ValidationError> = object
        .keys()
        .filter(|key| schema.field(key).is_none())
        .map(|key| ValidationError::UnknownField { field: key.clone() })
        .collect();

    errors.extend(validate_attachments(schema, attached));

    let mut normalized = Map::new();
    for field in schema.fields() {
        if field.kind == FieldKind::File {
            continue;
        }
        let value = object.get(&field.id).unwrap_or(&Value::Null);
        if is_blank(value) {
            if field.required {
                errors.push(ValidationError::MissingRequired {
                    field: field.id.clone(),
                });
            }
            continue;
        }
        match normalize_value(field, value) {
            Ok(v) => {
                normalized.insert(field.id.clone(), v);
            }
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        Ok(normalized)
    } else {
        Err(errors)
    }
}

fn validate_attachments(schema: &FieldSchema, attached: &HashSet<String>) -> Vec<ValidationError> {
    let mut errors: Vec<ValidationError> = attached
        .iter()
        .filter_map(|id| match schema.field(id) {
            None => Some(ValidationError::UnknownField { field: id.clone() }),
            Some(f) if f.kind != FieldKind::File => {
                Some(ValidationError::NotAFileField { field: id.clone() })
            }
            Some(_) => None,
        })
        .collect();

    errors.extend(
        schema
            .file_fields()
            .filter(|f| f.required && !attached.contains(&f.id))
            .map(|f| ValidationError::MissingRequired { field: f.id.clone() }),
    );
    errors
}

/// Null, whitespace-only strings, empty arrays and unchecked boxes count as
/// "no answer".
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Bool(b) => !b,
        _ => false,
    }
}

fn normalize_value(field: &FieldDescriptor, value: &Value) -> Result<Value, ValidationError> {
    match field.kind {
        FieldKind::Text | FieldKind::Textarea => {
            let text = expect_str(field, value)?;
            if text.chars().count() > MAX_TEXT_LEN {
                return Err(ValidationError::invalid(
                    field,
                    format!("must be at most {MAX_TEXT_LEN} characters"),
                ));
            }
            Ok(Value::String(text.to_string()))
        }
        FieldKind::Email => {
            let text = expect_str(field, value)?;
            if !looks_like_email(text) {
                return Err(ValidationError::invalid(field, "must be a valid email address"));
            }
            Ok(Value::String(text.to_string()))
        }
        FieldKind::Number => {
            if let Value::Number(n) = value {
                if n.as_f64().is_some_and(f64::is_finite) {
                    return Ok(value.clone());
                }
            }
            value
                .as_str()
                .and_then(|s| s.trim().parse::<f64>().ok())
                .filter(|n| n.is_finite())
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| ValidationError::invalid(field, "must be a number"))
        }
        FieldKind::Date => {
            let text = expect_str(field, value)?;
            chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map_err(|_| ValidationError::invalid(field, "must be a date (YYYY-MM-DD)"))?;
            Ok(Value::String(text.to_string()))
        }
        FieldKind::Select | FieldKind::Radio => {
            let text = expect_str(field, value)?;
            if !field.options.iter().any(|o| o == text) {
                return Err(ValidationError::invalid(field, "is not one of the allowed options"));
            }
            Ok(Value::String(text.to_string()))
        }
        FieldKind::Checkbox => match value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::Array(items) => {
                let mut picked = Vec::with_capacity(items.len());
                for item in items {
                    let choice = item
                        .as_str()
                        .filter(|c| field.options.iter().any(|o| o == c))
                        .ok_or_else(|| {
                            ValidationError::invalid(
                                field,
                                "contains an option that is not allowed",
                            )
                        })?;
                    if !picked.contains(&choice) {
                        picked.push(choice);
                    }
                }
                Ok(Value::Array(
                    picked.into_iter().map(|c| Value::String(c.to_string())).collect(),
                ))
            }
            _ => Err(ValidationError::invalid(
                field,
                "must be true/false or a list of options",
            )),
        },
        FieldKind::File => Err(ValidationError::invalid(field, "must be uploaded as a file")),
    }
}

fn expect_str<'a>(field: &FieldDescriptor, value: &'a Value) -> Result<&'a str, ValidationError> {
    value
        .as_str()
        .map(str::trim)
        .ok_or_else(|| ValidationError::invalid(field, "must be text"))
}

fn looks_like_email(text: &str) -> bool {
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains('@')
        && !text.contains(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use serde_json::json;

    fn none() -> HashSet<String> {
        HashSet::new()
    }

    fn files(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_valid_contact_submission_is_normalized() {
        let data = json!({
            "name": "  Ada Lovelace ",
            "email": "ada@example.com",
            "topic": "sales",
            "message": ""
        });
        let out = validate_submission(&testing::contact_schema(), &data, &none()).unwrap();
        assert_eq!(out["name"], "Ada Lovelace");
        assert_eq!(out["topic"], "sales");
        assert!(!out.contains_key("message"), "blank optional answers are dropped");
    }

    #[test]
    fn test_missing_required_fields_are_all_reported() {
        let errors =
            validate_submission(&testing::contact_schema(), &json!({"name": " "}), &none())
                .unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::MissingRequired { field: "name".into() },
                ValidationError::MissingRequired { field: "email".into() },
            ]
        );
    }

    #[test]
    fn test_rejects_non_object_and_unknown_keys() {
        let schema = testing::contact_schema();
        assert_eq!(
            validate_submission(&schema, &json!(["a"]), &none()).unwrap_err(),
            vec![ValidationError::NotAnObject]
        );

        let errors = validate_submission(
            &schema,
            &json!({"name": "A", "email": "a@b.co", "admin": true}),
            &none(),
        )
        .unwrap_err();
        assert_eq!(errors, vec![ValidationError::UnknownField { field: "admin".into() }]);
    }

    #[test]
    fn test_email_and_select_rules() {
        let schema = testing::contact_schema();
        let errors = validate_submission(
            &schema,
            &json!({"name": "A", "email": "not-an-email", "topic": "billing"}),
            &none(),
        )
        .unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| matches!(e, ValidationError::InvalidValue { .. })));
    }

    #[test]
    fn test_survey_kinds() {
        let schema = testing::survey_schema();
        let data = json!({
            "age": "42",
            "start": "2026-03-01",
            "plan": "pro",
            "extras": ["beta", "beta", "newsletter"],
            "terms": true
        });
        let out = validate_submission(&schema, &data, &files(&["id_scan"])).unwrap();
        assert_eq!(out["age"], json!(42.0));
        assert_eq!(out["extras"], json!(["beta", "newsletter"]));
        assert_eq!(out["terms"], json!(true));
    }

    #[test]
    fn test_survey_rejects_bad_values() {
        let schema = testing::survey_schema();
        let data = json!({
            "age": "forty",
            "start": "03/01/2026",
            "extras": ["vip"],
            "terms": false
        });
        let errors = validate_submission(&schema, &data, &none()).unwrap_err();
        let fields: Vec<String> = errors
            .iter()
            .map(|e| match e {
                ValidationError::MissingRequired { field }
                | ValidationError::InvalidValue { field, .. } => field.clone(),
                other => panic!("unexpected error {other:?}"),
            })
            .collect();
        assert!(fields.contains(&"age".to_string()));
        assert!(fields.contains(&"start".to_string()));
        assert!(fields.contains(&"extras".to_string()));
        assert!(fields.contains(&"terms".to_string()), "unchecked required box");
        assert!(fields.contains(&"id_scan".to_string()), "required upload missing");
    }

    #[test]
    fn test_attachments_only_on_file_fields() {
        let schema = testing::contact_schema();
        let data = json!({"name": "A", "email": "a@b.co"});
        assert!(validate_submission(&schema, &data, &files(&["resume"])).is_ok());

        let errors = validate_submission(&schema, &data, &files(&["name", "ghost"])).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.contains(&ValidationError::NotAFileField { field: "name".into() }));
        assert!(errors.contains(&ValidationError::UnknownField { field: "ghost".into() }));
    }

    #[test]
    fn test_text_length_cap() {
        let schema = testing::contact_schema();
        let data = json!({"name": "A", "email": "a@b.co", "message": "x".repeat(MAX_TEXT_LEN + 1)});
        assert!(validate_submission(&schema, &data, &none()).is_err());
    }
}
