use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::event::ChangeBus;

use super::model::{Isrc, LikedTrackIndex, TrackId};

pub type SharedStore = Arc<LikedStore>;

#[derive(Default)]
struct Index {
    tracks: LikedTrackIndex,
    // derived: the ISRCs of all liked tracks, recomputed from `tracks`
    // after every mutation
    isrcs: HashSet<Isrc>,
}

impl Index {
    fn recompute_isrcs(&mut self) {
        self.isrcs = self.tracks.values().cloned().collect();
    }
}

/// The liked-track identity store: `track id -> ISRC` for every track in the
/// user's liked collection, plus the derived set of liked ISRCs.
///
/// `set`/`delete`/`replace_all` are the only mutation entry points; the inner
/// index is never handed out, so every mutation goes through the derived-set
/// recompute and (for `set`/`delete`) a bus publish.
pub struct LikedStore {
    index: RwLock<Index>,
    bus: Arc<ChangeBus>,
}

impl LikedStore {
    pub fn new(bus: Arc<ChangeBus>) -> SharedStore {
        Arc::new(Self {
            index: RwLock::new(Index::default()),
            bus,
        })
    }

    pub fn bus(&self) -> &Arc<ChangeBus> {
        &self.bus
    }

    /// Inserts or overwrites one mapping and publishes one change notification.
    pub fn set(&self, track_id: TrackId, isrc: Isrc) {
        {
            let mut index = self.index.write();
            index.tracks.insert(track_id, isrc);
            index.recompute_isrcs();
        }
        self.bus.publish();
    }

    /// Removes one mapping. A notification is published whether or not the
    /// track was present: subscribers react to the attempted mutation.
    pub fn delete(&self, track_id: &TrackId) {
        {
            let mut index = self.index.write();
            index.tracks.remove(track_id);
            index.recompute_isrcs();
        }
        self.bus.publish();
    }

    /// Atomically swaps the whole index for `tracks`.
    ///
    /// Does not publish: a bulk reconciliation coalesces into a single
    /// downstream update, so the caller publishes exactly once afterwards.
    pub fn replace_all(&self, tracks: LikedTrackIndex) {
        let mut index = self.index.write();
        index.tracks = tracks;
        index.recompute_isrcs();
    }

    pub fn contains_track(&self, track_id: &TrackId) -> bool {
        self.index.read().tracks.contains_key(track_id)
    }

    pub fn contains_isrc(&self, isrc: &Isrc) -> bool {
        self.index.read().isrcs.contains(isrc)
    }

    pub fn len(&self) -> usize {
        self.index.read().tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().tracks.is_empty()
    }
}
