use webdoc_core::FieldError;

/// Errors raised while building or parsing descriptors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    /// Malformed descriptor JSON.
    #[error("invalid descriptor: {message}")]
    Invalid { message: String },

    #[error("duplicate field '{field_name}' in {document_type}")]
    DuplicateField {
        document_type: String,
        field_name: String,
    },

    /// A lookup or logic rule references a field the document does not have.
    #[error("field '{field_name}' depends on unknown field '{dependency}'")]
    UnknownDependency {
        field_name: String,
        dependency: String,
    },

    #[error("lookup of field '{field_name}' cannot depend on the field itself")]
    SelfDependency { field_name: String },

    /// A lookup descriptor was attached to a field that is not lookup-typed.
    #[error("field '{field_name}' of type {field_type} cannot have a lookup")]
    LookupOnPlainField {
        field_name: String,
        field_type: String,
    },

    #[error("unsupported attribute value type '{value_type}' for attribute '{attribute}'")]
    UnsupportedAttributeValueType {
        attribute: String,
        value_type: String,
    },

    #[error("attribute set {attribute_set_id} could not be loaded: {message}")]
    AttributeSetUnavailable {
        attribute_set_id: i64,
        message: String,
    },
}

/// Errors raised by document-level operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error(transparent)]
    Field(#[from] FieldError),

    #[error("document {document} has no field '{field_name}'")]
    UnknownField {
        document: String,
        field_name: String,
    },
}
