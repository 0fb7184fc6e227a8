//! Optional TOML configuration for `webdoc`.
//!
//! ```toml
//! log_level = "debug"
//! lookup_page_length = 25
//! reject_batch_on_error = false
//! ```

use std::path::Path;

use serde::Deserialize;
use webdoc_core::DEFAULT_PAGE_LENGTH;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Config {
    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: String,
    /// Default number of candidates returned by `lookup`.
    pub lookup_page_length: usize,
    /// Apply a change batch all-or-nothing. When false, failing changes are
    /// logged and skipped.
    pub reject_batch_on_error: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: "warn".to_string(),
            lookup_page_length: DEFAULT_PAGE_LENGTH,
            reject_batch_on_error: true,
        }
    }
}

/// Read and parse a config file. Returns a human-readable error string on
/// failure.
pub(crate) fn read_config(path: &Path) -> Result<Config, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
    parse_config(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}

fn parse_config(content: &str) -> Result<Config, String> {
    let config: Config = toml::from_str(content).map_err(|e| e.to_string())?;
    if config.lookup_page_length == 0 {
        return Err("lookup_page_length must be at least 1".to_string());
    }
    Ok(config)
}
