//! Provider credential resolution.
//!
//! The resolver reads a named credential bundle (a flat `provider -> key` map)
//! once and caches it for the life of the process. When the host provides no
//! bundle, each provider falls back to an individually named setting
//! (`<PROVIDER_ID>_API_KEY`). Empty values and well-known example keys count as
//! "not configured", which disables the provider instead of producing an error.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, warn};

/// Prefixes (case-insensitive) that mark a value copied from an example config.
const PLACEHOLDER_PREFIXES: &[&str] = &[
    "your_",
    "your-",
    "<your",
    "example",
    "changeme",
    "change_me",
    "replace_me",
    "placeholder",
    "xxx",
];

/// Where credentials come from. Implemented by the host (environment, files, secret managers).
pub trait CredentialSource: Send + Sync {
    /// The named credential bundle, if the host provides one.
    fn load_bundle(&self) -> Option<HashMap<String, String>>;

    /// An individually named setting, consulted only when there is no bundle.
    fn setting(&self, name: &str) -> Option<String>;
}

/// Name of the individually named setting for a provider.
pub fn setting_name(provider_id: &str) -> String {
    format!("{}_API_KEY", provider_id.to_ascii_uppercase())
}

/// Whether a credential value is empty or an example placeholder.
pub fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return true;
    }
    let lower = trimmed.to_ascii_lowercase();
    PLACEHOLDER_PREFIXES.iter().any(|p| lower.starts_with(p))
}

#[derive(Default)]
struct CredentialCache {
    bundle: Option<HashMap<String, String>>,
    resolved: HashMap<String, Option<String>>,
}

/// Cached, process-wide view of provider credentials.
pub struct CredentialResolver {
    source: Arc<dyn CredentialSource>,
    cache: Mutex<Option<CredentialCache>>,
}

impl CredentialResolver {
    pub fn new(source: Arc<dyn CredentialSource>) -> Self {
        Self {
            source,
            cache: Mutex::new(None),
        }
    }

    fn lock_cache(&self) -> MutexGuard<'_, Option<CredentialCache>> {
        self.cache.lock().unwrap_or_else(|poisoned| {
            warn!("Credential cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// API key for a provider, or `None` when it is missing or a placeholder.
    pub fn get_key(&self, provider_id: &str) -> Option<String> {
        let id = provider_id.to_ascii_uppercase();
        let mut guard = self.lock_cache();
        let cache = guard.get_or_insert_with(|| {
            let bundle = self.source.load_bundle().map(|b| {
                b.into_iter()
                    .map(|(k, v)| (k.trim().to_ascii_uppercase(), v))
                    .collect::<HashMap<_, _>>()
            });
            debug!(
                "Credential bundle {}",
                if bundle.is_some() { "loaded" } else { "absent, using individual settings" }
            );
            CredentialCache {
                bundle,
                resolved: HashMap::new(),
            }
        });

        if let Some(resolved) = cache.resolved.get(&id) {
            return resolved.clone();
        }

        let setting = setting_name(&id);
        let raw = match &cache.bundle {
            Some(bundle) => bundle.get(&id).or_else(|| bundle.get(&setting)).cloned(),
            None => self.source.setting(&setting),
        };

        let value = match raw {
            Some(v) if is_placeholder(&v) => {
                debug!("Credential for {} is a placeholder, treating as unconfigured", id);
                None
            }
            Some(v) => Some(v.trim().to_string()),
            None => None,
        };

        cache.resolved.insert(id, value.clone());
        value
    }

    pub fn is_configured(&self, provider_id: &str) -> bool {
        self.get_key(provider_id).is_some()
    }

    /// Drop the cache; the next lookup re-reads the source.
    pub fn reset(&self) {
        *self.lock_cache() = None;
    }
}
