use serde::Serialize;

use super::types::ProviderId;
use crate::provider::RateLimit;

/// Commercial tier of a provider, which drives its default quota.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuotaClass {
    /// No key required; informal quota
    Keyless,
    /// Free key tier with a tight daily/minute quota
    FreeTier,
    /// Paid or generous tier
    Tiered,
}

/// Registry-facing description of one provider.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDescriptor {
    pub id: ProviderId,
    /// Position in the fallback chain; lower runs first
    pub priority: u8,
    pub has_credentials: bool,
    pub quota_class: QuotaClass,
    #[serde(skip)]
    pub rate_limit: RateLimit,
    pub enabled: bool,
}

impl ProviderDescriptor {
    /// A provider takes part in resolution only when enabled and credentialed.
    pub fn is_usable(&self) -> bool {
        self.enabled && self.has_credentials
    }
}
