use super::Registry;
use arc_swap::ArcSwap;
use std::sync::Arc;

/// A [`Registry`] that can be replaced at runtime without disturbing in-flight readers.
///
/// Readers take a [`snapshot`](Self::snapshot) and keep using it for the whole call; writers
/// [`publish`](Self::publish) a fully built registry which becomes visible atomically. A registry
/// is never mutated in place, so a reader can never observe a half-built index.
#[derive(Debug, Clone)]
pub struct SharedRegistry {
    current: Arc<ArcSwap<Registry>>,
}

impl SharedRegistry {
    pub fn new(registry: Registry) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(registry)),
        }
    }

    /// Returns the registry currently published.
    pub fn snapshot(&self) -> Arc<Registry> {
        self.current.load_full()
    }

    /// Replaces the published registry, returning the previous one.
    pub fn publish(&self, registry: Registry) -> Arc<Registry> {
        let previous = self.current.swap(Arc::new(registry));
        tracing::info!(
            services = self.current.load().services.len(),
            "published new schema registry"
        );
        previous
    }
}

impl From<Registry> for SharedRegistry {
    fn from(registry: Registry) -> Self {
        Self::new(registry)
    }
}
