use std::sync::Arc;

use crate::client::SharedCatalog;
use crate::state::{Isrc, SharedStore, TrackId};

/// The host's user-notification surface (toasts or similar)
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

pub type SharedNotifier = Arc<dyn Notifier>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// What a toggle did to the local store
pub enum ToggleOutcome {
    Liked,
    Unliked,
    /// The track had no resolved ISRC so the local index was left alone
    SkippedUnresolved,
}

/// Adds or removes one track from the liked collection, updating the local
/// store optimistically.
///
/// The user is notified before the remote call resolves, and a failed remote
/// call never rolls back the local mutation: the store may drift from the
/// server until the next reconciliation pass corrects it.
pub struct LikeService {
    store: SharedStore,
    catalog: SharedCatalog,
    notifier: SharedNotifier,
}

impl LikeService {
    pub fn new(store: SharedStore, catalog: SharedCatalog, notifier: SharedNotifier) -> Self {
        Self {
            store,
            catalog,
            notifier,
        }
    }

    pub async fn toggle(&self, track_id: &TrackId, known_isrc: Option<&Isrc>) -> ToggleOutcome {
        if self.store.contains_track(track_id) {
            self.unlike(track_id).await
        } else {
            self.like(track_id, known_isrc).await
        }
    }

    async fn unlike(&self, track_id: &TrackId) -> ToggleOutcome {
        self.notifier.notify("Removed from Liked Songs");
        if let Err(err) = self
            .catalog
            .remove_from_liked(std::slice::from_ref(track_id))
            .await
        {
            // not retried; the next reconciliation pass repairs any drift
            tracing::error!("Failed to remove track {track_id} from the liked collection: {err:#}");
        }
        self.store.delete(track_id);
        ToggleOutcome::Unliked
    }

    async fn like(&self, track_id: &TrackId, known_isrc: Option<&Isrc>) -> ToggleOutcome {
        self.notifier.notify("Added to Liked Songs");
        if let Err(err) = self
            .catalog
            .add_to_liked(std::slice::from_ref(track_id))
            .await
        {
            tracing::error!("Failed to add track {track_id} to the liked collection: {err:#}");
        }
        match known_isrc {
            Some(isrc) => {
                self.store.set(track_id.clone(), isrc.clone());
                ToggleOutcome::Liked
            }
            None => {
                // a track must be resolved before it can be indexed as liked
                tracing::error!("Track {track_id} has no resolved ISRC, skipping the local update");
                ToggleOutcome::SkippedUnresolved
            }
        }
    }
}
