use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

type Handler = Arc<dyn Fn() + Send + Sync>;

/// The process-wide "liked tracks changed" publish point.
///
/// Publishing carries no payload: handlers re-read the current state from
/// the store themselves. Handlers are kept in a keyed registry, so each one
/// is invoked at most once per publish; no ordering across handlers is
/// guaranteed.
#[derive(Default)]
pub struct ChangeBus {
    handlers: Mutex<HashMap<u64, Handler>>,
    next_id: AtomicU64,
}

impl ChangeBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a handler, returning a guard that removes it on drop.
    pub fn subscribe(self: &Arc<Self>, handler: impl Fn() + Send + Sync + 'static) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.lock().insert(id, Arc::new(handler));
        Subscription {
            bus: Arc::downgrade(self),
            id,
        }
    }

    /// Invokes every currently subscribed handler synchronously, once each.
    pub fn publish(&self) {
        // handlers are cloned out of the lock so they may subscribe or
        // unsubscribe without deadlocking
        let handlers = self
            .handlers
            .lock()
            .values()
            .cloned()
            .collect::<Vec<_>>();
        for handler in handlers {
            handler();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.lock().len()
    }

    fn remove(&self, id: u64) {
        self.handlers.lock().remove(&id);
    }
}

/// A live bus registration. Dropping it (or calling [`Subscription::unsubscribe`])
/// removes the handler; removing an already removed handler is a no-op.
pub struct Subscription {
    bus: Weak<ChangeBus>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.id);
        }
    }
}

struct DebounceState {
    deadline: Option<tokio::time::Instant>,
    task_running: bool,
}

/// Trailing-edge coalescing: a burst of [`Debouncer::call`]s collapses into
/// one callback invocation once the window elapses without a new call.
///
/// Must be used within a tokio runtime; the timer runs as a spawned task.
pub struct Debouncer {
    window: Duration,
    callback: Handler,
    state: Arc<Mutex<DebounceState>>,
}

impl Debouncer {
    pub fn new(window: Duration, callback: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            window,
            callback: Arc::new(callback),
            state: Arc::new(Mutex::new(DebounceState {
                deadline: None,
                task_running: false,
            })),
        }
    }

    pub fn call(&self) {
        let mut state = self.state.lock();
        state.deadline = Some(tokio::time::Instant::now() + self.window);
        if state.task_running {
            return;
        }
        state.task_running = true;
        drop(state);

        let state = Arc::clone(&self.state);
        let callback = Arc::clone(&self.callback);
        tokio::task::spawn(async move {
            loop {
                let Some(deadline) = state.lock().deadline else {
                    break;
                };
                tokio::time::sleep_until(deadline).await;

                let mut guard = state.lock();
                let now = tokio::time::Instant::now();
                // a new call may have extended the window while we slept
                if guard.deadline.is_some_and(|deadline| deadline > now) {
                    continue;
                }
                guard.deadline = None;
                guard.task_running = false;
                drop(guard);
                callback();
                break;
            }
        });
    }
}
