//! `unitypilot config` - Configuration inspection.

use std::path::Path;

use unitypilot_config::AppConfig;

/// Print the effective configuration with secrets redacted.
pub fn show(config: &AppConfig) {
    for (key, value) in config.summary() {
        println!("{key:<24} {value}");
    }
}

pub fn show_default() {
    print!("{}", AppConfig::default_toml());
}

pub fn path(explicit: Option<&Path>) {
    match explicit {
        Some(path) => println!("{}", path.display()),
        None => println!("{}", AppConfig::config_dir().join("config.toml").display()),
    }
}
