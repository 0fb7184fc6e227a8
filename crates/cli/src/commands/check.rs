use std::path::Path;

use webdoc_model::{DocumentDescriptor, FieldDescriptor};

use super::load_descriptor;
use crate::OutputFormat;

pub(crate) fn cmd_check(path: &Path, output: OutputFormat, quiet: bool) {
    let descriptor = load_descriptor(path, output, quiet);
    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&summary_json(&descriptor))
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", json);
        }
        OutputFormat::Text => {
            println!(
                "{} ({}): {} field(s)",
                descriptor.document_type(),
                descriptor.caption(),
                descriptor.fields().len()
            );
            for field in descriptor.fields() {
                let notes = field_notes(field);
                if notes.is_empty() {
                    println!("  {}  {}", field.field_name(), field.field_type());
                } else {
                    println!(
                        "  {}  {}  {}",
                        field.field_name(),
                        field.field_type(),
                        notes.join(", ")
                    );
                }
            }
        }
    }
}

fn field_notes(field: &FieldDescriptor) -> Vec<String> {
    let mut notes = Vec::new();
    if field.is_key() {
        notes.push("key".to_string());
    }
    match field.mandatory_logic().as_constant() {
        Some(true) => notes.push("mandatory".to_string()),
        Some(false) => {}
        None => notes.push("conditionally mandatory".to_string()),
    }
    if let Some(lookup) = field.lookup() {
        if lookup.depends_on().is_empty() {
            notes.push("lookup".to_string());
        } else {
            let triggers: Vec<&str> = lookup.depends_on().iter().map(String::as_str).collect();
            notes.push(format!("lookup depends on {}", triggers.join(", ")));
        }
    }
    notes
}

fn summary_json(descriptor: &DocumentDescriptor) -> serde_json::Value {
    let fields: Vec<serde_json::Value> = descriptor
        .fields()
        .iter()
        .map(|f| {
            serde_json::json!({
                "name": f.field_name(),
                "caption": f.caption(),
                "type": f.field_type(),
                "key": f.is_key(),
                "lookup": f.lookup().is_some(),
                "depends_on": f.lookup().map(|l| l.depends_on().iter().collect::<Vec<_>>()).unwrap_or_default(),
            })
        })
        .collect();
    serde_json::json!({
        "document_type": descriptor.document_type(),
        "caption": descriptor.caption(),
        "fields": fields,
    })
}
