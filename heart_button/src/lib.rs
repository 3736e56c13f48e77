//! The liked-track identity core behind an "old style" like button.
//!
//! This crate keeps a local `track id -> ISRC` index of the user's liked
//! collection, reconciled against the remote catalog on a fixed interval,
//! and derives from it the two booleans a like button renders: whether a
//! track is liked, and whether a different release of the same recording
//! already is. The host application supplies the rendering shell, the
//! catalog credentials and the notification surface; this crate supplies
//! the state, the reconciliation and the toggle semantics.

pub mod cache;
pub mod client;
pub mod config;
pub mod event;
pub mod reconciler;
pub mod state;
pub mod toggle;
pub mod view;

mod utils;

use std::sync::Arc;

use cache::{MemoCache, SharedIsrcCache};
use client::SharedCatalog;
use config::Config;
use event::ChangeBus;
use reconciler::Reconciler;
use state::{LikedStore, SharedStore, TrackId};
use toggle::{LikeService, SharedNotifier};
use view::{LikeButtonModel, ViewContext};

/// One UI session of the like-button core: the shared store, the running
/// reconciler and the wiring every button instance shares.
///
/// Construct it once the host's API surface is ready; construction spawns
/// the reconciliation loop, so it must happen within a tokio runtime.
/// Dropping the session stops the loop.
pub struct Session {
    ctx: ViewContext,
    reconciler: tokio::task::JoinHandle<()>,
}

impl Session {
    pub fn new(
        catalog: SharedCatalog,
        cache: SharedIsrcCache,
        notifier: SharedNotifier,
        config: &Config,
    ) -> Self {
        let bus = ChangeBus::new();
        let store = LikedStore::new(bus);
        let service = Arc::new(LikeService::new(
            Arc::clone(&store),
            Arc::clone(&catalog),
            notifier,
        ));
        let reconciler = Reconciler::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            Arc::clone(&catalog),
            config,
        )
        .spawn();

        Self {
            ctx: ViewContext {
                store,
                cache,
                memo: Arc::new(MemoCache::default()),
                catalog,
                service,
                debounce_duration: config.debounce_duration(),
            },
            reconciler,
        }
    }

    /// Builds the reactive view-model for one mounted button instance.
    pub fn render(&self, track_id: TrackId) -> LikeButtonModel {
        LikeButtonModel::new(&self.ctx, track_id)
    }

    pub fn store(&self) -> &SharedStore {
        &self.ctx.store
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.reconciler.abort();
    }
}
