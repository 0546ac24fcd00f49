mod clock;

pub use clock::MonotonicClock;

#[cfg(feature = "sha2")]
use crate::{
    config::ForwarderConfig,
    forwarder::{Forwarder, InertMetrics},
    platform::sha::Sha256Hasher,
    store::ReferenceContentStore,
};

#[cfg(feature = "sha2")]
pub type DefaultForwarder =
    Forwarder<ReferenceContentStore, MonotonicClock, Sha256Hasher, InertMetrics>;

#[cfg(feature = "sha2")]
impl DefaultForwarder {
    pub fn from_config(config: &ForwarderConfig) -> Self {
        let content_store = ReferenceContentStore::new(
            config.content_store_capacity,
            config.content_store_retention_ms,
        );
        Forwarder::with_config(
            config,
            content_store,
            MonotonicClock::new(),
            Sha256Hasher::new(),
            InertMetrics,
        )
    }
}

#[cfg(feature = "sha2")]
impl Default for DefaultForwarder {
    fn default() -> Self {
        Self::from_config(&ForwarderConfig::default())
    }
}
