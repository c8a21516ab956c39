//! Credential source backed by the process environment.
//!
//! The bundle comes from `QW_CREDENTIALS` (inline JSON) or, failing that, from
//! the file named by `QW_CREDENTIALS_FILE`. Individually named settings are
//! read as `QW_<PROVIDER_ID>_API_KEY`.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use quotewarden_market_data::CredentialSource;
use tracing::warn;

use crate::config::{Config, ENV_PREFIX};

pub struct EnvCredentialSource {
    bundle_json: Option<String>,
    bundle_file: Option<PathBuf>,
}

impl EnvCredentialSource {
    pub fn new(bundle_json: Option<String>, bundle_file: Option<PathBuf>) -> Self {
        Self {
            bundle_json,
            bundle_file,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.credentials_json.clone(), config.credentials_file.clone())
    }
}

fn parse_bundle(raw: &str, origin: &str) -> Option<HashMap<String, String>> {
    match serde_json::from_str::<HashMap<String, String>>(raw) {
        Ok(bundle) => Some(bundle),
        Err(e) => {
            warn!("Ignoring credential bundle from {}: {}", origin, e);
            None
        }
    }
}

impl CredentialSource for EnvCredentialSource {
    fn load_bundle(&self) -> Option<HashMap<String, String>> {
        if let Some(raw) = &self.bundle_json {
            return parse_bundle(raw, "QW_CREDENTIALS");
        }
        let path = self.bundle_file.as_ref()?;
        match fs::read_to_string(path) {
            Ok(raw) => parse_bundle(&raw, &path.display().to_string()),
            Err(e) => {
                warn!("Cannot read credential file {}: {}", path.display(), e);
                None
            }
        }
    }

    fn setting(&self, name: &str) -> Option<String> {
        std::env::var(format!("{}{}", ENV_PREFIX, name)).ok()
    }
}
