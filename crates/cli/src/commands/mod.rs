pub(crate) mod apply;
pub(crate) mod check;
pub(crate) mod lookup;

use std::path::Path;
use std::process;
use std::sync::Arc;

use webdoc_model::{Document, DocumentDescriptor};

use crate::{report_error, OutputFormat};

/// Read a JSON file, exiting with an error report on failure.
pub(crate) fn read_json(path: &Path, output: OutputFormat, quiet: bool) -> serde_json::Value {
    let content = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            let msg = format!("error parsing JSON in '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

pub(crate) fn load_descriptor(
    path: &Path,
    output: OutputFormat,
    quiet: bool,
) -> Arc<DocumentDescriptor> {
    let json = read_json(path, output, quiet);
    match DocumentDescriptor::from_json(&json) {
        Ok(d) => Arc::new(d),
        Err(e) => {
            let msg = format!("descriptor error in '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

/// Create a document and, when a values file is given, load it.
pub(crate) fn load_document(
    descriptor: Arc<DocumentDescriptor>,
    document_id: &str,
    values: Option<&Path>,
    output: OutputFormat,
    quiet: bool,
) -> Document {
    let mut document = Document::new(descriptor, document_id);
    let Some(path) = values else {
        return document;
    };
    let json = read_json(path, output, quiet);
    let Some(values) = json.as_object() else {
        let msg = format!("'{}' must contain a JSON object of field values", path.display());
        report_error(&msg, output, quiet);
        process::exit(1);
    };
    if let Err(e) = document.load_json(values) {
        let msg = format!("error loading '{}': {}", path.display(), e);
        report_error(&msg, output, quiet);
        process::exit(1);
    }
    document
}
