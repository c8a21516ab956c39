//! Market data models
//!
//! - `types` - Provider id alias and ticker normalization
//! - `quote` - Price observations and daily historical points
//! - `descriptor` - Provider descriptors used by the registry

mod descriptor;
mod quote;
mod types;

pub use descriptor::{ProviderDescriptor, QuotaClass};
pub use quote::{HistoricalPoint, PriceObservation};
pub use types::{normalize_symbol, ProviderId};
