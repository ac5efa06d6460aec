use crate::error::StoreError;
use crate::models::Listing;
use crate::store::SeenStore;
use std::collections::HashSet;
use tracing::{error, info, warn};

/// Result of filtering one document's listings
#[derive(Debug, Default)]
pub struct Detection {
    /// First sightings, in document order
    pub new: Vec<Listing>,
    /// Set when the updated seen-set could not be written
    pub persist_error: Option<StoreError>,
}

/// Keeps the seen-set and decides which listings are first sightings
pub struct ChangeDetector {
    store: SeenStore,
    seen: HashSet<String>,
}

impl ChangeDetector {
    /// Load the persisted seen-set. An unreadable file counts as no history.
    pub async fn open(store: SeenStore) -> Self {
        let seen = match store.load().await {
            Ok(seen) => seen,
            Err(e) => {
                warn!("{e}; starting with an empty seen-set, old listings may be re-reported");
                HashSet::new()
            }
        };
        info!("Loaded {} seen listings from {}", seen.len(), store.path().display());
        Self { store, seen }
    }

    pub fn with_seen(store: SeenStore, seen: HashSet<String>) -> Self {
        Self { store, seen }
    }

    pub fn seen(&self) -> &HashSet<String> {
        &self.seen
    }

    /// Keep the candidates not seen before and record them as seen.
    ///
    /// The store is rewritten only when something new turned up. A failed
    /// write keeps the ids in memory and is reported on the `Detection`.
    pub async fn detect(&mut self, candidates: Vec<Listing>) -> Detection {
        let new: Vec<Listing> = candidates
            .into_iter()
            .filter(|listing| self.seen.insert(listing.id.clone()))
            .collect();

        if new.is_empty() {
            return Detection::default();
        }

        let persist_error = match self.store.save(&self.seen).await {
            Ok(()) => None,
            Err(e) => {
                error!(
                    "{e}; {} new listings are only remembered in memory and will be re-reported after a restart",
                    new.len()
                );
                Some(e)
            }
        };

        Detection { new, persist_error }
    }
}
