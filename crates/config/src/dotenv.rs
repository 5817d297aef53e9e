//! Minimal `.env` support (KEY=VALUE lines).
//!
//! Values are returned as a map instead of being written into the process
//! environment; real environment variables always win over file entries.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Parse `.env` file contents.
///
/// Blank lines and `#` comments are skipped, an optional `export ` prefix is
/// accepted, and surrounding quotes are stripped from values.
pub fn parse(contents: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            let value = value.trim().trim_matches('"').trim_matches('\'');
            vars.insert(key.to_string(), value.to_string());
        }
    }
    vars
}

/// Read the first `.env` file found among `candidates`.
pub fn load_first(candidates: &[PathBuf]) -> HashMap<String, String> {
    for path in candidates {
        if let Some(vars) = load(path) {
            tracing::debug!(path = %path.display(), count = vars.len(), "Loaded .env file");
            return vars;
        }
    }
    HashMap::new()
}

fn load(path: &Path) -> Option<HashMap<String, String>> {
    std::fs::read_to_string(path).ok().map(|c| parse(&c))
}
