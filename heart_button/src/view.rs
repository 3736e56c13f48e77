use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::cache::{MemoCache, SharedIsrcCache};
use crate::client::SharedCatalog;
use crate::event::{Debouncer, Subscription};
use crate::state::{Isrc, LikedStore, SharedStore, TrackId};
use crate::toggle::{LikeService, ToggleOutcome};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// The boolean UI state of one like button
pub struct LikeState {
    /// The track itself is in the liked collection
    pub is_liked: bool,
    /// Some liked track shares this track's recording
    pub is_duplicate_liked: bool,
}

#[derive(Clone)]
/// Wiring shared by every button instance of one UI session
pub struct ViewContext {
    pub store: SharedStore,
    pub cache: SharedIsrcCache,
    pub memo: Arc<MemoCache>,
    pub catalog: SharedCatalog,
    pub service: Arc<LikeService>,
    pub debounce_duration: Duration,
}

fn compute_state(store: &LikedStore, track_id: &TrackId, isrc: Option<&Isrc>) -> LikeState {
    LikeState {
        is_liked: store.contains_track(track_id),
        is_duplicate_liked: isrc.is_some_and(|isrc| store.contains_isrc(isrc)),
    }
}

/// The reactive per-track view-model handed to the UI layer.
///
/// Construction resolves the track's ISRC (memo, then durable cache, then a
/// single remote lookup) and subscribes a debounced refresh on the change
/// bus. Dropping the model unsubscribes and cancels any in-flight lookup
/// and any pending debounced refresh before they can mutate state.
pub struct LikeButtonModel {
    track_id: TrackId,
    isrc: Arc<Mutex<Option<Isrc>>>,
    state: Arc<Mutex<LikeState>>,
    service: Arc<LikeService>,
    cancelled: Arc<AtomicBool>,
    _subscription: Subscription,
}

impl LikeButtonModel {
    pub fn new(ctx: &ViewContext, track_id: TrackId) -> Self {
        let isrc = ctx.memo.get(&track_id).or_else(|| {
            let isrc = ctx.cache.get(&track_id);
            if let Some(ref isrc) = isrc {
                ctx.memo.put(&track_id, isrc);
            }
            isrc
        });
        let needs_lookup = isrc.is_none() && !track_id.is_local();

        let isrc = Arc::new(Mutex::new(isrc));
        let state = Arc::new(Mutex::new(compute_state(
            &ctx.store,
            &track_id,
            isrc.lock().as_ref(),
        )));

        let cancelled = Arc::new(AtomicBool::new(false));
        let debouncer = Debouncer::new(ctx.debounce_duration, {
            let store = Arc::clone(&ctx.store);
            let track_id = track_id.clone();
            let isrc = Arc::clone(&isrc);
            let state = Arc::clone(&state);
            let cancelled = Arc::clone(&cancelled);
            move || {
                // a timer armed before the instance was dropped must not
                // refresh its state afterwards
                if cancelled.load(Ordering::SeqCst) {
                    return;
                }
                let current_isrc = isrc.lock().clone();
                *state.lock() = compute_state(&store, &track_id, current_isrc.as_ref());
            }
        });
        let subscription = ctx.store.bus().subscribe(move || debouncer.call());

        let model = Self {
            track_id,
            isrc,
            state,
            service: Arc::clone(&ctx.service),
            cancelled,
            _subscription: subscription,
        };
        if needs_lookup {
            model.spawn_resolve(ctx);
        }
        model
    }

    pub fn track_id(&self) -> &TrackId {
        &self.track_id
    }

    pub fn state(&self) -> LikeState {
        *self.state.lock()
    }

    /// Flips the track's liked state, see [`LikeService::toggle`]
    pub async fn toggle(&self) -> ToggleOutcome {
        let isrc = self.isrc.lock().clone();
        self.service.toggle(&self.track_id, isrc.as_ref()).await
    }

    /// Resolves the ISRC through a single-track lookup, independently of the
    /// reconciler's batch path, so a just-displayed unseen track gets an
    /// answer without waiting for the next pass.
    fn spawn_resolve(&self, ctx: &ViewContext) {
        let track_id = self.track_id.clone();
        let isrc_slot = Arc::clone(&self.isrc);
        let state = Arc::clone(&self.state);
        let cancelled = Arc::clone(&self.cancelled);
        let store = Arc::clone(&ctx.store);
        let cache = Arc::clone(&ctx.cache);
        let memo = Arc::clone(&ctx.memo);
        let catalog = Arc::clone(&ctx.catalog);
        tokio::task::spawn(async move {
            let resolved = match catalog.lookup_track(&track_id).await {
                Ok(resolved) => resolved,
                Err(err) => {
                    tracing::error!("Failed to look up track {track_id}: {err:#}");
                    return;
                }
            };
            // the instance may have been dropped while the lookup was in
            // flight; never mutate state past that point
            if cancelled.load(Ordering::SeqCst) {
                return;
            }
            let Some(isrc) = resolved.isrc else {
                tracing::info!("Track {track_id} has no ISRC in the catalog");
                return;
            };
            memo.put(&track_id, &isrc);
            cache.put(&track_id, &isrc);
            *isrc_slot.lock() = Some(isrc.clone());
            *state.lock() = compute_state(&store, &track_id, Some(&isrc));
            if let Err(err) = tokio::task::spawn_blocking(move || cache.flush()).await {
                tracing::error!("Failed to flush the ISRC cache: {err:#}");
            }
        });
    }
}

impl Drop for LikeButtonModel {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::Result;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::cache::{IsrcCache, MemoCache};
    use crate::client::CatalogApi;
    use crate::event::ChangeBus;
    use crate::state::{Isrc, LikedStore, ResolvedTrack, TrackId};
    use crate::toggle::{LikeService, Notifier};

    use super::{LikeButtonModel, ViewContext};

    fn isrc(s: &str) -> Isrc {
        Isrc::new(s).unwrap()
    }

    #[derive(Default)]
    struct LookupCatalog {
        isrcs: Mutex<HashMap<TrackId, Isrc>>,
    }

    #[async_trait]
    impl CatalogApi for LookupCatalog {
        async fn list_liked_tracks(&self) -> Result<Vec<TrackId>> {
            Ok(vec![])
        }

        async fn batch_lookup(&self, _ids: &[TrackId]) -> Result<Vec<ResolvedTrack>> {
            Ok(vec![])
        }

        async fn lookup_track(&self, id: &TrackId) -> Result<ResolvedTrack> {
            Ok(ResolvedTrack {
                id: id.clone(),
                isrc: self.isrcs.lock().get(id).cloned(),
            })
        }

        async fn add_to_liked(&self, _ids: &[TrackId]) -> Result<()> {
            Ok(())
        }

        async fn remove_from_liked(&self, _ids: &[TrackId]) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct MapCache {
        entries: Mutex<HashMap<TrackId, Isrc>>,
    }

    impl IsrcCache for MapCache {
        fn get(&self, track_id: &TrackId) -> Option<Isrc> {
            self.entries.lock().get(track_id).cloned()
        }

        fn put(&self, track_id: &TrackId, isrc: &Isrc) {
            let mut entries = self.entries.lock();
            entries.entry(track_id.clone()).or_insert_with(|| isrc.clone());
        }
    }

    struct NullNotifier;

    impl Notifier for NullNotifier {
        fn notify(&self, _message: &str) {}
    }

    fn context() -> (ViewContext, Arc<LookupCatalog>, Arc<MapCache>) {
        let bus = ChangeBus::new();
        let store = LikedStore::new(bus);
        let catalog = Arc::new(LookupCatalog::default());
        let cache = Arc::new(MapCache::default());
        let service = Arc::new(LikeService::new(
            Arc::clone(&store),
            catalog.clone(),
            Arc::new(NullNotifier),
        ));
        let ctx = ViewContext {
            store,
            cache: cache.clone(),
            memo: Arc::new(MemoCache::default()),
            catalog: catalog.clone(),
            service,
            debounce_duration: Duration::from_millis(50),
        };
        (ctx, catalog, cache)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_set_refreshes_every_instance_after_the_debounce() {
        let (ctx, _catalog, _cache) = context();
        // two instances sharing one recording, ISRCs already memoized
        ctx.memo.put(&TrackId::new("t2"), &isrc("ISRC-B"));
        ctx.memo.put(&TrackId::new("t3"), &isrc("ISRC-B"));
        let t2 = LikeButtonModel::new(&ctx, TrackId::new("t2"));
        let t3 = LikeButtonModel::new(&ctx, TrackId::new("t3"));
        assert!(!t2.state().is_duplicate_liked);
        assert!(!t3.state().is_duplicate_liked);

        ctx.store.set(TrackId::new("t2"), isrc("ISRC-B"));

        tokio::time::advance(Duration::from_millis(51)).await;
        settle().await;
        assert!(t2.state().is_liked);
        assert!(t2.state().is_duplicate_liked);
        assert!(!t3.state().is_liked);
        assert!(t3.state().is_duplicate_liked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_state_reads_the_durable_cache() {
        let (ctx, _catalog, cache) = context();
        cache.put(&TrackId::new("t1"), &isrc("ISRC-A"));
        ctx.store.set(TrackId::new("t1"), isrc("ISRC-A"));

        let model = LikeButtonModel::new(&ctx, TrackId::new("t1"));
        assert!(model.state().is_liked);
        assert!(model.state().is_duplicate_liked);
        // the durable-cache hit was memoized for the session
        assert_eq!(ctx.memo.get(&TrackId::new("t1")), Some(isrc("ISRC-A")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unseen_track_resolves_through_a_single_lookup() {
        let (ctx, catalog, cache) = context();
        catalog
            .isrcs
            .lock()
            .insert(TrackId::new("t1"), isrc("ISRC-A"));
        ctx.store.set(TrackId::new("other"), isrc("ISRC-A"));

        let model = LikeButtonModel::new(&ctx, TrackId::new("t1"));
        assert!(!model.state().is_duplicate_liked);

        settle().await;
        // resolution wrote through both caches and recomputed the state
        assert_eq!(ctx.memo.get(&TrackId::new("t1")), Some(isrc("ISRC-A")));
        assert_eq!(cache.get(&TrackId::new("t1")), Some(isrc("ISRC-A")));
        assert!(model.state().is_duplicate_liked);
        assert!(!model.state().is_liked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_the_model_unsubscribes() {
        let (ctx, _catalog, _cache) = context();
        ctx.memo.put(&TrackId::new("t1"), &isrc("ISRC-A"));
        let bus = Arc::clone(ctx.store.bus());
        assert_eq!(bus.subscriber_count(), 0);

        let model = LikeButtonModel::new(&ctx, TrackId::new("t1"));
        assert_eq!(bus.subscriber_count(), 1);

        drop(model);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_state_refresh_after_the_model_is_dropped() {
        let (ctx, _catalog, _cache) = context();
        ctx.memo.put(&TrackId::new("t1"), &isrc("ISRC-A"));
        let model = LikeButtonModel::new(&ctx, TrackId::new("t1"));
        let state = Arc::clone(&model.state);
        assert!(!state.lock().is_liked);

        // arm the debounce timer, then drop before it fires
        ctx.store.set(TrackId::new("t1"), isrc("ISRC-A"));
        drop(model);

        tokio::time::advance(Duration::from_millis(51)).await;
        settle().await;
        assert!(!state.lock().is_liked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_through_the_model_updates_its_own_state() {
        let (ctx, _catalog, _cache) = context();
        ctx.memo.put(&TrackId::new("t1"), &isrc("ISRC-A"));
        let model = LikeButtonModel::new(&ctx, TrackId::new("t1"));

        model.toggle().await;
        tokio::time::advance(Duration::from_millis(51)).await;
        settle().await;
        assert!(model.state().is_liked);

        model.toggle().await;
        tokio::time::advance(Duration::from_millis(51)).await;
        settle().await;
        assert!(!model.state().is_liked);
    }
}
