//! `unitypilot secret` - Generate a cookie-signing key.

use unitypilot_config::SecretKeyManager;

pub fn run() {
    println!("{}", SecretKeyManager::generate_secret_key());
}
