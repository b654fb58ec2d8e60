use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

/// Hard cap on fields per form or template.
pub const MAX_FIELDS: usize = 100;

static FIELD_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("field id regex should compile")
});

/// Input widget a field renders as, which also decides how its value is checked.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Textarea,
    Email,
    Number,
    Date,
    Select,
    Radio,
    Checkbox,
    File,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Textarea => "textarea",
            Self::Email => "email",
            Self::Number => "number",
            Self::Date => "date",
            Self::Select => "select",
            Self::Radio => "radio",
            Self::Checkbox => "checkbox",
            Self::File => "file",
        }
    }

    /// Kinds whose answers must be one of the declared options.
    pub fn has_options(&self) -> bool {
        matches!(self, Self::Select | Self::Radio)
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a form's field list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl FieldDescriptor {
    pub fn new(id: impl Into<String>, kind: FieldKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            required: false,
            placeholder: None,
            help_text: None,
            options: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchemaError {
    #[error("too many fields: {count} (max {MAX_FIELDS})")]
    TooManyFields { count: usize },
    #[error("invalid field id: {id:?}")]
    InvalidFieldId { id: String },
    #[error("duplicate field id: {id}")]
    DuplicateFieldId { id: String },
    #[error("field {id} has an empty label")]
    EmptyLabel { id: String },
    #[error("field {id} needs at least one option")]
    MissingOptions { id: String },
    #[error("field {id} has an empty option")]
    EmptyOption { id: String },
    #[error("unknown field: {id}")]
    UnknownField { id: String },
    #[error("field index {index} out of range")]
    IndexOutOfRange { index: usize },
    #[error("field order must list every field exactly once")]
    IncompleteOrder,
}

/// Ordered list of field descriptors owned by a template or a form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct FieldSchema {
    fields: Vec<FieldDescriptor>,
}

impl FieldSchema {
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self { fields }
    }

    /// Parse the JSON column representation.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.fields).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<FieldDescriptor> {
        self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, id: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn file_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.kind == FieldKind::File)
    }

    /// Check structural rules: ids, labels, option lists and size.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.fields.len() > MAX_FIELDS {
            return Err(SchemaError::TooManyFields {
                count: self.fields.len(),
            });
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !FIELD_ID_RE.is_match(&field.id) {
                return Err(SchemaError::InvalidFieldId {
                    id: field.id.clone(),
                });
            }
            if !seen.insert(field.id.as_str()) {
                return Err(SchemaError::DuplicateFieldId {
                    id: field.id.clone(),
                });
            }
            if field.label.trim().is_empty() {
                return Err(SchemaError::EmptyLabel {
                    id: field.id.clone(),
                });
            }
            if field.kind.has_options() && field.options.is_empty() {
                return Err(SchemaError::MissingOptions {
                    id: field.id.clone(),
                });
            }
            if field.options.iter().any(|o| o.trim().is_empty()) {
                return Err(SchemaError::EmptyOption {
                    id: field.id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Append a field, rejecting an id that already exists.
    pub fn add_field(&mut self, field: FieldDescriptor) -> Result<(), SchemaError> {
        if self.field(&field.id).is_some() {
            return Err(SchemaError::DuplicateFieldId { id: field.id });
        }
        self.fields.push(field);
        Ok(())
    }

    pub fn remove_field(&mut self, id: &str) -> Result<FieldDescriptor, SchemaError> {
        let index = self
            .fields
            .iter()
            .position(|f| f.id == id)
            .ok_or_else(|| SchemaError::UnknownField { id: id.to_string() })?;
        Ok(self.fields.remove(index))
    }

    /// Move the field at `from` so it ends up at index `to`, shifting the
    /// fields in between (drag-and-drop semantics).
    pub fn move_field(&mut self, from: usize, to: usize) -> Result<(), SchemaError> {
        let len = self.fields.len();
        if from >= len {
            return Err(SchemaError::IndexOutOfRange { index: from });
        }
        if to >= len {
            return Err(SchemaError::IndexOutOfRange { index: to });
        }
        if from != to {
            let field = self.fields.remove(from);
            self.fields.insert(to, field);
        }
        Ok(())
    }

    /// Rearrange fields to follow `order`, which must be a permutation of the
    /// current ids.
    pub fn reorder<S: AsRef<str>>(&mut self, order: &[S]) -> Result<(), SchemaError> {
        if order.len() != self.fields.len() {
            return Err(SchemaError::IncompleteOrder);
        }

        let mut seen = HashSet::new();
        for id in order {
            let id = id.as_ref();
            if self.field(id).is_none() {
                return Err(SchemaError::UnknownField { id: id.to_string() });
            }
            if !seen.insert(id) {
                return Err(SchemaError::IncompleteOrder);
            }
        }

        let mut remaining = std::mem::take(&mut self.fields);
        self.fields = order
            .iter()
            .filter_map(|id| {
                let pos = remaining.iter().position(|f| f.id == id.as_ref())?;
                Some(remaining.swap_remove(pos))
            })
            .collect();
        Ok(())
    }
}

impl From<Vec<FieldDescriptor>> for FieldSchema {
    fn from(fields: Vec<FieldDescriptor>) -> Self {
        Self::new(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn ids(schema: &FieldSchema) -> Vec<&str> {
        schema.fields().iter().map(|f| f.id.as_str()).collect()
    }

    #[test]
    fn test_contact_schema_is_valid() {
        testing::contact_schema().validate().unwrap();
    }

    #[test]
    fn test_json_shape_uses_type_key() {
        let schema = FieldSchema::new(vec![FieldDescriptor::new("name", FieldKind::Text, "Name")]);
        let json: serde_json::Value = serde_json::from_str(&schema.to_json()).unwrap();
        assert_eq!(json[0]["type"], "text");
        assert_eq!(json[0]["required"], false);
        assert!(json[0].get("options").is_none());

        let back = FieldSchema::from_json(&schema.to_json()).unwrap();
        assert_eq!(back, schema);
    }

    #[test]
    fn test_validate_rejects_bad_ids() {
        let schema =
            FieldSchema::new(vec![FieldDescriptor::new("has space", FieldKind::Text, "X")]);
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::InvalidFieldId { .. })
        ));

        let schema = FieldSchema::new(vec![
            FieldDescriptor::new("a", FieldKind::Text, "A"),
            FieldDescriptor::new("a", FieldKind::Email, "Also A"),
        ]);
        assert_eq!(
            schema.validate(),
            Err(SchemaError::DuplicateFieldId { id: "a".into() })
        );
    }

    #[test]
    fn test_validate_requires_options_for_choice_fields() {
        let schema = FieldSchema::new(vec![FieldDescriptor::new("pick", FieldKind::Radio, "Pick")]);
        assert_eq!(
            schema.validate(),
            Err(SchemaError::MissingOptions { id: "pick".into() })
        );

        let schema = FieldSchema::new(vec![
            FieldDescriptor::new("pick", FieldKind::Select, "Pick").with_options(["a", " "]),
        ]);
        assert_eq!(
            schema.validate(),
            Err(SchemaError::EmptyOption { id: "pick".into() })
        );
    }

    #[test]
    fn test_validate_rejects_blank_label_and_too_many_fields() {
        let schema = FieldSchema::new(vec![FieldDescriptor::new("a", FieldKind::Text, "  ")]);
        assert_eq!(
            schema.validate(),
            Err(SchemaError::EmptyLabel { id: "a".into() })
        );

        let fields = (0..=MAX_FIELDS)
            .map(|i| FieldDescriptor::new(format!("f{i}"), FieldKind::Text, "F"))
            .collect();
        assert!(matches!(
            FieldSchema::new(fields).validate(),
            Err(SchemaError::TooManyFields { .. })
        ));
    }

    #[test]
    fn test_move_field_forward_and_back() {
        let mut schema = testing::contact_schema();
        assert_eq!(ids(&schema), ["name", "email", "topic", "message", "resume"]);

        schema.move_field(0, 3).unwrap();
        assert_eq!(ids(&schema), ["email", "topic", "message", "name", "resume"]);

        schema.move_field(4, 0).unwrap();
        assert_eq!(ids(&schema), ["resume", "email", "topic", "message", "name"]);

        assert_eq!(
            schema.move_field(5, 0),
            Err(SchemaError::IndexOutOfRange { index: 5 })
        );
    }

    #[test]
    fn test_reorder_permutation() {
        let mut schema = testing::contact_schema();
        schema
            .reorder(&["message", "resume", "topic", "email", "name"])
            .unwrap();
        assert_eq!(ids(&schema), ["message", "resume", "topic", "email", "name"]);
    }

    #[test]
    fn test_reorder_rejects_partial_or_unknown_and_keeps_order() {
        let mut schema = testing::contact_schema();
        let before = schema.clone();

        assert_eq!(
            schema.reorder(&["name", "email"]),
            Err(SchemaError::IncompleteOrder)
        );
        assert_eq!(schema, before);

        assert_eq!(
            schema.reorder(&["name", "email", "topic", "message", "nope"]),
            Err(SchemaError::UnknownField { id: "nope".into() })
        );
        assert_eq!(schema, before);

        assert_eq!(
            schema.reorder(&["name", "name", "topic", "message", "resume"]),
            Err(SchemaError::IncompleteOrder)
        );
        assert_eq!(schema, before);
    }

    #[test]
    fn test_add_and_remove_field() {
        let mut schema = testing::contact_schema();
        assert!(schema
            .add_field(FieldDescriptor::new("name", FieldKind::Text, "Dup"))
            .is_err());
        schema
            .add_field(FieldDescriptor::new("phone", FieldKind::Text, "Phone"))
            .unwrap();
        assert_eq!(schema.len(), 6);

        let removed = schema.remove_field("topic").unwrap();
        assert_eq!(removed.kind, FieldKind::Select);
        assert!(schema.field("topic").is_none());
        assert!(schema.remove_field("topic").is_err());
    }
}
