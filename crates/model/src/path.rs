use std::fmt;

/// Identity of one document instance: its document type and its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath {
    document_type: String,
    document_id: String,
}

impl DocumentPath {
    pub fn new(document_type: impl Into<String>, document_id: impl Into<String>) -> Self {
        DocumentPath {
            document_type: document_type.into(),
            document_id: document_id.into(),
        }
    }

    pub fn document_type(&self) -> &str {
        &self.document_type
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.document_type, self.document_id)
    }
}
