use std::path::Path;
use std::process;

use webdoc_core::RawValue;
use webdoc_model::{ChangesCollector, Document, DocumentChangesCollector, Reason};

use super::{load_descriptor, load_document, read_json};
use crate::config::Config;
use crate::{report_error, OutputFormat};

pub(crate) struct ApplyOptions<'a> {
    pub descriptor: &'a Path,
    pub document: Option<&'a Path>,
    pub changes: &'a Path,
    pub document_id: &'a str,
    pub config: &'a Config,
    pub output: OutputFormat,
    pub quiet: bool,
}

pub(crate) fn cmd_apply(opts: ApplyOptions<'_>) {
    let output = opts.output;
    let quiet = opts.quiet;
    let descriptor = load_descriptor(opts.descriptor, output, quiet);
    let mut document = load_document(descriptor, opts.document_id, opts.document, output, quiet);

    let batch = match parse_changes(&read_json(opts.changes, output, quiet)) {
        Ok(b) => b,
        Err(msg) => {
            let msg = format!("invalid changes in '{}': {}", opts.changes.display(), msg);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let source = opts.changes.display().to_string();
    let reason = Reason::new(move || format!("changes from {}", source));
    let mut collector = DocumentChangesCollector::new();

    if opts.config.reject_batch_on_error {
        if let Err(e) = document.process_value_changes(batch, &reason, &mut collector) {
            report_error(&format!("change rejected: {}", e), output, quiet);
            process::exit(1);
        }
    } else {
        for (field_name, raw) in batch {
            if let Err(e) = document.process_value_change(&field_name, &raw, &reason, &mut collector)
            {
                tracing::warn!(field = %field_name, error = %e, "change skipped");
            }
        }
    }

    if !quiet {
        print_result(&document, &collector, output);
    }
}

/// Changes are either a JSON object (applied in key order) or a list of
/// `{"field": .., "value": ..}` entries (applied in list order).
fn parse_changes(json: &serde_json::Value) -> Result<Vec<(String, RawValue)>, String> {
    match json {
        serde_json::Value::Object(map) => Ok(map
            .iter()
            .map(|(name, v)| (name.clone(), RawValue::from_json(v)))
            .collect()),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| {
                let field = item
                    .get("field")
                    .and_then(|f| f.as_str())
                    .ok_or_else(|| format!("entry {} has no 'field' name", item))?;
                let value = item.get("value").unwrap_or(&serde_json::Value::Null);
                Ok((field.to_string(), RawValue::from_json(value)))
            })
            .collect(),
        other => Err(format!("expected an object or a list, got {}", other)),
    }
}

fn print_result(document: &Document, collector: &DocumentChangesCollector, output: OutputFormat) {
    match output {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "document": document.path().to_string(),
                "valid": document.is_valid(),
                "invalid_fields": document.invalid_fields(),
                "changes": collector.to_json(),
                "values": document.to_json_values(),
            });
            let pretty = serde_json::to_string_pretty(&json)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => {
            println!("Document {}", document.path());
            println!();
            println!("Changes:");
            if collector.is_empty() {
                println!("  (none)");
            }
            for changes in collector.document_changes_by_path().values() {
                for (field_name, field_changes) in changes.fields() {
                    let kinds: Vec<&str> = field_changes.kinds().map(|k| k.name()).collect();
                    println!("  {}: {}", field_name, kinds.join(", "));
                }
            }
            println!();
            println!("Values:");
            for field in document.fields() {
                println!("  {} = {}", field.field_name(), field.display_string());
            }
            println!();
            let invalid = document.invalid_fields();
            if invalid.is_empty() {
                println!("Document is valid");
            } else {
                println!("Invalid fields: {}", invalid.join(", "));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_form_keeps_order() {
        let batch = parse_changes(&serde_json::json!([
            { "field": "B", "value": 1 },
            { "field": "A", "value": "x" },
            { "field": "C" }
        ]))
        .unwrap();
        let names: Vec<&str> = batch.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "C"]);
        assert_eq!(batch[2].1, RawValue::Null);
    }

    #[test]
    fn rejects_other_shapes() {
        assert!(parse_changes(&serde_json::json!("Qty")).is_err());
        assert!(parse_changes(&serde_json::json!([{ "value": 1 }])).is_err());
    }
}
