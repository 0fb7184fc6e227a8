use crate::values::FieldType;

/// Errors raised by field-level operations.
///
/// Both variants are surfaced to the caller of the mutation; nothing at the
/// field level retries or swallows them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    /// A raw value could not be coerced to the field's declared type.
    #[error(
        "cannot convert {field_name}'s value '{raw_value}' ({representation}) to {target}: {reason}"
    )]
    Conversion {
        field_name: String,
        raw_value: String,
        representation: &'static str,
        target: FieldType,
        reason: String,
    },

    /// A lookup operation was requested on a field without a lookup binding.
    #[error("field {field_name} is not a lookup field")]
    NotLookup { field_name: String },
}

impl FieldError {
    pub fn field_name(&self) -> &str {
        match self {
            FieldError::Conversion { field_name, .. } | FieldError::NotLookup { field_name } => {
                field_name
            }
        }
    }
}
