use anyhow::{Context, Result};
use parking_lot::Mutex;

use crate::cache::SharedIsrcCache;
use crate::client::SharedCatalog;
use crate::config::Config;
use crate::state::{LikedTrackIndex, SharedStore, TrackId};

/// Keeps the liked-track identity store eventually consistent with the
/// remote liked collection.
///
/// A pass rebuilds the whole index from the remote collection, resolving
/// unknown ISRCs through batched lookups, and swaps it in atomically with a
/// single change notification. A failed pass leaves the store untouched; the
/// next scheduled pass retries from scratch.
pub struct Reconciler {
    store: SharedStore,
    cache: SharedIsrcCache,
    catalog: SharedCatalog,
    batch_size: usize,
    reconcile_duration: std::time::Duration,
}

impl Reconciler {
    pub fn new(
        store: SharedStore,
        cache: SharedIsrcCache,
        catalog: SharedCatalog,
        config: &Config,
    ) -> Self {
        Self {
            store,
            cache,
            catalog,
            batch_size: config.lookup_batch_size,
            reconcile_duration: config.reconcile_duration(),
        }
    }

    /// Starts the reconciliation loop: one pass immediately, then one every
    /// `reconcile_duration`. A pass always runs to completion before the
    /// next one is scheduled, so passes never overlap.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::task::spawn(async move {
            loop {
                if let Err(err) = self.run_pass().await {
                    tracing::error!("Failed to reconcile the liked collection: {err:#}");
                }
                tokio::time::sleep(self.reconcile_duration).await;
            }
        })
    }

    /// Runs one reconciliation pass.
    pub async fn run_pass(&self) -> Result<()> {
        let liked = self
            .catalog
            .list_liked_tracks()
            .await
            .context("list the liked collection")?;
        tracing::info!("reconciling {} liked tracks", liked.len());

        let (index, unknown) = self.partition(liked);

        // all batches go out concurrently; each result is merged as it
        // completes, and the pass joins on all of them before the swap
        let index = Mutex::new(index);
        let lookups = unknown.chunks(self.batch_size).map(|batch| {
            let index = &index;
            async move {
                let resolved = self
                    .catalog
                    .batch_lookup(batch)
                    .await
                    .context("batched ISRC lookup")?;
                let mut index = index.lock();
                for track in resolved {
                    if let Some(isrc) = track.isrc {
                        self.cache.put(&track.id, &isrc);
                        index.insert(track.id, isrc);
                    }
                }
                Ok::<(), anyhow::Error>(())
            }
        });
        futures::future::try_join_all(lookups).await?;

        self.store.replace_all(index.into_inner());
        self.store.bus().publish();

        // one durable write per pass, off the async workers
        let cache = std::sync::Arc::clone(&self.cache);
        tokio::task::spawn_blocking(move || cache.flush())
            .await
            .context("flush the ISRC cache")?;
        Ok(())
    }

    /// Splits the liked collection into the new index seeded from the durable
    /// cache and the list of ids still needing a remote lookup. Local tracks
    /// are excluded entirely.
    fn partition(&self, liked: Vec<TrackId>) -> (LikedTrackIndex, Vec<TrackId>) {
        let mut index = LikedTrackIndex::new();
        let mut unknown = Vec::new();
        for track_id in liked {
            if let Some(isrc) = self.cache.get(&track_id) {
                index.insert(track_id, isrc);
            } else if !track_id.is_local() {
                unknown.push(track_id);
            }
        }
        (index, unknown)
    }
}
