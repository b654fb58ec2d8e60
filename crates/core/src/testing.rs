use crate::schema::{FieldDescriptor, FieldKind, FieldSchema};

/// Five-field contact form: required name + email, a topic select, an optional
/// message and an optional resume upload.
pub fn contact_schema() -> FieldSchema {
    FieldSchema::new(vec![
        FieldDescriptor::new("name", FieldKind::Text, "Full name").required(),
        FieldDescriptor::new("email", FieldKind::Email, "Email").required(),
        FieldDescriptor::new("topic", FieldKind::Select, "Topic")
            .with_options(["sales", "support", "other"]),
        FieldDescriptor::new("message", FieldKind::Textarea, "Message"),
        FieldDescriptor::new("resume", FieldKind::File, "Resume"),
    ])
}

/// Schema exercising every non-text kind.
pub fn survey_schema() -> FieldSchema {
    FieldSchema::new(vec![
        FieldDescriptor::new("age", FieldKind::Number, "Age").required(),
        FieldDescriptor::new("start", FieldKind::Date, "Start date"),
        FieldDescriptor::new("plan", FieldKind::Radio, "Plan").with_options(["free", "pro"]),
        FieldDescriptor::new("extras", FieldKind::Checkbox, "Extras")
            .with_options(["newsletter", "beta"]),
        FieldDescriptor::new("terms", FieldKind::Checkbox, "I agree").required(),
        FieldDescriptor::new("id_scan", FieldKind::File, "ID scan").required(),
    ])
}
