use std::path::Path;
use std::process;

use webdoc_core::LookupValue;

use super::{load_descriptor, load_document};
use crate::{report_error, OutputFormat};

pub(crate) struct LookupOptions<'a> {
    pub descriptor: &'a Path,
    pub document: Option<&'a Path>,
    pub field: &'a str,
    pub query: Option<&'a str>,
    pub page_length: usize,
    pub output: OutputFormat,
    pub quiet: bool,
}

pub(crate) fn cmd_lookup(opts: LookupOptions<'_>) {
    let output = opts.output;
    let quiet = opts.quiet;
    let descriptor = load_descriptor(opts.descriptor, output, quiet);
    let mut document = load_document(descriptor, "1", opts.document, output, quiet);

    let values = match document.lookup_values(opts.field, opts.query, opts.page_length) {
        Ok(v) => v,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    };

    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = values.iter().map(LookupValue::to_json).collect();
            let pretty = serde_json::to_string_pretty(&json)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => {
            if values.is_empty() {
                println!("No candidates for {}", opts.field);
            }
            for value in &values {
                println!("{}\t{}", value.key(), value.display_name());
            }
        }
    }
}
