//! Latest-value broadcast of batch state and progress.
//!
//! The bus holds one current [`ProcessingState`] and one current
//! [`ProgressSample`]. Observers see the latest value plus later updates;
//! missed intermediate values are not buffered. Every [`StateBus::reset_flow`]
//! opens a new generation and clears both slots. Publishers handed out for an
//! older generation become inert, so a late emission from a replaced batch
//! cannot overwrite the new batch's state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, trace};

use clipfy_models::{ProcessingState, ProgressSample};

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u64,
    value: Option<T>,
}

impl<T> Slot<T> {
    fn empty(generation: u64) -> Self {
        Self {
            generation,
            value: None,
        }
    }
}

/// Event delivered synchronously to listeners for every accepted update.
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    /// A new batch started; both slots were cleared
    Reset { generation: u64 },
    State(ProcessingState),
    Progress(ProgressSample),
}

type Listener = Arc<dyn Fn(&BusEvent) + Send + Sync>;

struct BusInner {
    generation: AtomicU64,
    state: watch::Sender<Slot<ProcessingState>>,
    progress: watch::Sender<Slot<ProgressSample>>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener: AtomicU64,
    // Serializes reset, accept and notify so listeners see events in slot order.
    ordering: Mutex<()>,
}

impl BusInner {
    fn ordered(&self) -> std::sync::MutexGuard<'_, ()> {
        match self.ordering.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn notify(&self, event: &BusEvent) {
        let listeners: Vec<Listener> = match self.listeners.lock() {
            Ok(guard) => guard.iter().map(|(_, l)| l.clone()).collect(),
            Err(poisoned) => poisoned.into_inner().iter().map(|(_, l)| l.clone()).collect(),
        };
        for listener in listeners {
            listener(event);
        }
    }
}

/// Shared broadcast of the current batch's state and progress.
#[derive(Clone)]
pub struct StateBus {
    inner: Arc<BusInner>,
}

impl Default for StateBus {
    fn default() -> Self {
        Self::new()
    }
}

impl StateBus {
    pub fn new() -> Self {
        let (state, _) = watch::channel(Slot::empty(0));
        let (progress, _) = watch::channel(Slot::empty(0));
        Self {
            inner: Arc::new(BusInner {
                generation: AtomicU64::new(0),
                state,
                progress,
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(0),
                ordering: Mutex::new(()),
            }),
        }
    }

    /// Start a new generation: clear both slots and return its publisher.
    pub fn reset_flow(&self) -> BatchPublisher {
        let _ordered = self.inner.ordered();
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.state.send_replace(Slot::empty(generation));
        self.inner.progress.send_replace(Slot::empty(generation));
        debug!(generation, "State bus reset");
        self.inner.notify(&BusEvent::Reset { generation });
        BatchPublisher {
            inner: self.inner.clone(),
            generation,
        }
    }

    /// Current generation (0 before the first reset).
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Latest state, if any was published since the last reset.
    pub fn current_state(&self) -> Option<ProcessingState> {
        self.inner.state.borrow().value.clone()
    }

    /// Latest progress sample, if any was published since the last reset.
    pub fn current_progress(&self) -> Option<ProgressSample> {
        self.inner.progress.borrow().value
    }

    pub fn subscribe_state(&self) -> Subscription<ProcessingState> {
        Subscription {
            rx: self.inner.state.subscribe(),
        }
    }

    pub fn subscribe_progress(&self) -> Subscription<ProgressSample> {
        Subscription {
            rx: self.inner.progress.subscribe(),
        }
    }

    /// Register a callback invoked for every accepted update, in emission order.
    ///
    /// Callbacks run synchronously on the emitting task and must not publish
    /// to the bus themselves.
    pub fn listen<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        let mut guard = match self.inner.listeners.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push((id, Arc::new(listener)));
        ListenerHandle {
            inner: Arc::downgrade(&self.inner),
            id,
        }
    }
}

impl std::fmt::Debug for StateBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateBus")
            .field("generation", &self.generation())
            .field("state", &self.current_state())
            .field("progress", &self.current_progress())
            .finish()
    }
}

/// Registration returned by [`StateBus::listen`].
pub struct ListenerHandle {
    inner: std::sync::Weak<BusInner>,
    id: u64,
}

impl ListenerHandle {
    /// Stop receiving events.
    pub fn unsubscribe(self) {
        if let Some(inner) = self.inner.upgrade() {
            let mut guard = match inner.listeners.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.retain(|(id, _)| *id != self.id);
        }
    }
}

/// Write side of the bus for one batch generation.
#[derive(Clone)]
pub struct BatchPublisher {
    inner: Arc<BusInner>,
    generation: u64,
}

impl BatchPublisher {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a newer batch has reset the bus since this publisher was issued.
    pub fn is_stale(&self) -> bool {
        self.inner.generation.load(Ordering::SeqCst) != self.generation
    }

    /// Replace the current state. Returns `false` if the publisher is stale.
    pub fn emit_state(&self, state: ProcessingState) -> bool {
        let _ordered = self.inner.ordered();
        let accepted = replace_if_current(&self.inner.state, self.generation, state.clone());
        if accepted {
            self.inner.notify(&BusEvent::State(state));
        } else {
            trace!(generation = self.generation, "Dropped stale state emission");
        }
        accepted
    }

    /// Replace the current progress sample. Returns `false` if the publisher is stale.
    pub fn emit_progress(&self, sample: ProgressSample) -> bool {
        let _ordered = self.inner.ordered();
        let accepted = replace_if_current(&self.inner.progress, self.generation, sample);
        if accepted {
            self.inner.notify(&BusEvent::Progress(sample));
        }
        accepted
    }
}

impl std::fmt::Debug for BatchPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchPublisher")
            .field("generation", &self.generation)
            .finish()
    }
}

fn replace_if_current<T>(tx: &watch::Sender<Slot<T>>, generation: u64, value: T) -> bool {
    let mut value = Some(value);
    tx.send_if_modified(|slot| {
        if slot.generation == generation {
            slot.value = value.take();
            true
        } else {
            false
        }
    })
}

/// Read side of one bus slot.
pub struct Subscription<T> {
    rx: watch::Receiver<Slot<T>>,
}

impl<T: Clone> Subscription<T> {
    /// Latest value, marking it seen.
    pub fn latest(&mut self) -> Option<T> {
        self.rx.borrow_and_update().value.clone()
    }

    /// Wait for the slot to change. Returns `false` once the bus is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Wait until the slot holds a value matching `predicate`.
    pub async fn wait_for<F>(&mut self, mut predicate: F) -> Option<T>
    where
        F: FnMut(&T) -> bool,
    {
        self.rx
            .wait_for(|slot| slot.value.as_ref().map(&mut predicate).unwrap_or(false))
            .await
            .ok()
            .and_then(|slot| slot.value.clone())
    }
}
