//! Offline effect queue.
//!
//! Decides, per emitted effect, whether to commit now or to merge it into
//! the persisted outbox batch for later. All decisions come from the pure
//! [`OutboxState`] machine in offline-core; this module performs the I/O
//! it asks for (commit, persist, timers) and reports outcomes.
//!
//! One async mutex guards the outbox across every read-modify-write,
//! commit calls included, so merges and flushes never interleave.

use crate::settings::{RehydrateHook, Settings};
use crate::storage::Storage;
use crate::tools::{now_millis, Tools};
use offline_first_core::{
    Action, BatchError, Event, FixedInterval, OutboxEvent, OutboxState, QueuedEffect, RetryPolicy,
};
use offline_first_types::{Effect, NetworkStatus, StorageError, UpdateMap};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;

/// Storage key of the persisted outbox batch.
pub const OUTBOX_KEY: &str = "offline-first:outbox";

const EVENT_CAPACITY: usize = 64;

/// What happened to an emitted effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Written to the remote store.
    Committed,
    /// Held in the outbox for a later flush.
    Queued,
    /// Dropped by the retry policy.
    Discarded,
}

impl Disposition {
    fn of(event: &OutboxEvent) -> Self {
        match event {
            OutboxEvent::Committed | OutboxEvent::Flushed { .. } => Disposition::Committed,
            OutboxEvent::Queued { .. } | OutboxEvent::CommitFailed { .. } => Disposition::Queued,
            OutboxEvent::Discarded { .. } => Disposition::Discarded,
        }
    }
}

/// Queue errors. Only surfaced by explicit maintenance calls, never to an
/// action caller.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The storage backend failed.
    #[error("outbox storage failed: {0}")]
    Storage(#[from] StorageError),

    /// The persisted batch could not be encoded.
    #[error(transparent)]
    Batch(#[from] BatchError),
}

/// The offline effect queue.
///
/// Cheap to clone; clones share one outbox.
#[derive(Clone)]
pub struct OfflineQueue {
    inner: Arc<Inner>,
}

struct Inner {
    tools: Arc<dyn Tools>,
    storage: Arc<dyn Storage>,
    policy: Arc<dyn RetryPolicy>,
    on_rehydrate: Option<RehydrateHook>,
    online: AtomicBool,
    watching: AtomicBool,
    outbox: Mutex<Outbox>,
    events: broadcast::Sender<OutboxEvent>,
}

#[derive(Default)]
struct Outbox {
    state: OutboxState,
    batch: QueuedEffect,
    hydrated: bool,
    retry: Option<JoinHandle<()>>,
}

impl OfflineQueue {
    /// A queue with the default retry policy. Starts offline.
    pub fn new(tools: Arc<dyn Tools>, storage: Arc<dyn Storage>) -> Self {
        Self::build(tools, storage, Arc::new(FixedInterval::default()), None)
    }

    /// A queue using the capabilities, policy and hook from `settings`.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::build(
            Arc::clone(&settings.tools),
            Arc::clone(&settings.storage),
            Arc::clone(&settings.retry_policy),
            settings.on_rehydrate.clone(),
        )
    }

    fn build(
        tools: Arc<dyn Tools>,
        storage: Arc<dyn Storage>,
        policy: Arc<dyn RetryPolicy>,
        on_rehydrate: Option<RehydrateHook>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                tools,
                storage,
                policy,
                on_rehydrate,
                online: AtomicBool::new(false),
                watching: AtomicBool::new(false),
                outbox: Mutex::new(Outbox::default()),
                events,
            }),
        }
    }

    /// Last connectivity reported to the queue.
    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Outcomes as they happen. Lagging receivers miss old events.
    pub fn subscribe(&self) -> broadcast::Receiver<OutboxEvent> {
        self.inner.events.subscribe()
    }

    /// Copy of the queued batch.
    pub async fn snapshot(&self) -> QueuedEffect {
        self.inner.outbox.lock().await.batch.clone()
    }

    /// Current outbox state.
    pub async fn state(&self) -> OutboxState {
        self.inner.outbox.lock().await.state
    }

    /// Read the persisted batch back, once.
    ///
    /// Runs automatically before the first effect is handled; calling it
    /// early just moves the storage read (and the rehydrate hook) forward.
    pub async fn hydrate(&self) -> Result<(), QueueError> {
        let mut outbox = self.inner.outbox.lock().await;
        self.ensure_hydrated(&mut outbox).await
    }

    /// Hand an effect to the queue.
    ///
    /// Never fails: commit and storage errors are logged and the effect
    /// stays queued.
    pub async fn submit(&self, effect: Effect) -> Disposition {
        let updates = effect.into_updates();
        if updates.is_empty() {
            tracing::debug!("Effect has no updates, nothing to commit");
            return Disposition::Committed;
        }

        let mut outbox = self.inner.outbox.lock().await;
        if let Err(e) = self.ensure_hydrated(&mut outbox).await {
            tracing::error!("Outbox hydration failed, holding effect in memory: {}", e);
        }
        let online = self.is_online();
        self.drive(&mut outbox, Event::EffectEmitted { online }, Some(updates))
            .await
            .unwrap_or(Disposition::Queued)
    }

    /// Record a connectivity transition. Going online flushes the outbox.
    pub async fn set_network(&self, status: NetworkStatus) {
        let was_online = self.inner.online.swap(status.online, Ordering::SeqCst);
        if was_online != status.online {
            tracing::info!(
                "Network {}",
                if status.online { "online" } else { "offline" }
            );
        }

        let mut outbox = self.inner.outbox.lock().await;
        if let Err(e) = self.ensure_hydrated(&mut outbox).await {
            tracing::error!("Outbox hydration failed: {}", e);
        }
        self.drive(&mut outbox, Event::NetworkChanged(status), None)
            .await;
    }

    /// Register with the tools' connectivity watcher. Idempotent.
    ///
    /// The registration lives as long as the process; once the queue is
    /// dropped, reports are ignored.
    pub fn watch_network(&self) {
        if self.inner.watching.swap(true, Ordering::SeqCst) {
            return;
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<NetworkStatus>();
        self.inner
            .tools
            .detect_network_changes(Arc::new(move |status: NetworkStatus| {
                let _ = tx.send(status);
            }));

        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            while let Some(status) = rx.recv().await {
                let Some(queue) = Self::upgrade(&weak) else {
                    break;
                };
                queue.set_network(status).await;
            }
        });
    }

    /// Drop the outbox without committing it.
    pub async fn clear(&self) -> Result<(), QueueError> {
        let mut outbox = self.inner.outbox.lock().await;
        self.ensure_hydrated(&mut outbox).await?;
        if let Some(handle) = outbox.retry.take() {
            handle.abort();
        }
        let dropped = outbox.batch.len();
        outbox.batch = QueuedEffect::default();
        outbox.state = OutboxState::Idle;
        self.inner.storage.remove_item(OUTBOX_KEY).await?;
        tracing::info!("Outbox cleared ({} paths dropped)", dropped);
        Ok(())
    }

    /// Stop the retry timer. The batch stays persisted for the next run.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.inner.outbox.lock().await.retry.take() {
            handle.abort();
        }
    }

    fn upgrade(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    async fn ensure_hydrated(&self, outbox: &mut Outbox) -> Result<(), QueueError> {
        if outbox.hydrated {
            return Ok(());
        }

        let restored = match self.inner.storage.get_item(OUTBOX_KEY).await? {
            None => None,
            Some(text) => match QueuedEffect::from_json(&text) {
                Ok(batch) => Some(batch),
                Err(e) => {
                    tracing::error!("Discarding unreadable persisted outbox: {}", e);
                    self.inner.storage.remove_item(OUTBOX_KEY).await?;
                    None
                }
            },
        };
        outbox.hydrated = true;

        if let Some(mut batch) = restored.filter(|b| !b.is_empty()) {
            // Anything held in memory while storage was unreadable is newer.
            let pending = std::mem::take(&mut outbox.batch);
            batch.merge_updates(pending.updates);
            batch.attempts = batch
                .attempts
                .max(pending.attempts)
                .max(outbox.state.attempts());
            let attempts = batch.attempts;
            tracing::info!(
                "Rehydrated outbox: {} paths, {} failed attempts",
                batch.len(),
                attempts
            );
            outbox.batch = batch;

            if outbox.state == OutboxState::Idle {
                self.drive(outbox, Event::Hydrated { attempts }, None).await;
                if self.is_online() {
                    self.drive(outbox, Event::NetworkChanged(NetworkStatus::ONLINE), None)
                        .await;
                }
            } else {
                // The machine's count is what the next transition persists.
                if let OutboxState::Queued { .. } = outbox.state {
                    outbox.state = OutboxState::Queued { attempts };
                }
                self.persist(outbox).await;
            }
        } else if !outbox.batch.is_empty() {
            self.persist(outbox).await;
        }

        if let Some(hook) = &self.inner.on_rehydrate {
            hook();
        }
        Ok(())
    }

    /// Feed `event` to the state machine and execute what it asks for,
    /// including follow-up commit results. Returns the disposition of the
    /// last reported outcome.
    async fn drive(
        &self,
        outbox: &mut Outbox,
        event: Event,
        mut pending: Option<UpdateMap>,
    ) -> Option<Disposition> {
        let mut events = VecDeque::from([event]);
        let mut disposition = None;

        while let Some(event) = events.pop_front() {
            let (state, actions) = outbox.state.on_event(event, self.inner.policy.as_ref());
            outbox.state = state;

            for action in actions {
                match action {
                    Action::CommitEffect => {
                        let updates = pending.clone().unwrap_or_default();
                        events.push_back(self.commit(&updates).await);
                    }
                    Action::MergeEffect => {
                        if let Some(updates) = pending.take() {
                            if outbox.batch.is_empty() {
                                outbox.batch = QueuedEffect::new(now_millis());
                            }
                            outbox.batch.merge_updates(updates);
                        }
                    }
                    Action::FlushBatch => {
                        tracing::debug!("Flushing outbox ({} paths)", outbox.batch.len());
                        events.push_back(self.commit(&outbox.batch.updates).await);
                    }
                    Action::Persist { attempts } => {
                        outbox.batch.attempts = attempts;
                        self.persist(outbox).await;
                    }
                    Action::ClearPersisted => {
                        outbox.batch = QueuedEffect::default();
                        if let Err(e) = self.inner.storage.remove_item(OUTBOX_KEY).await {
                            tracing::error!("Failed to clear persisted outbox: {}", e);
                        }
                    }
                    Action::ScheduleRetry { delay } => self.arm_retry(outbox, delay),
                    Action::CancelRetry => {
                        if let Some(handle) = outbox.retry.take() {
                            handle.abort();
                        }
                    }
                    Action::Emit(outcome) => {
                        log_outcome(&outcome);
                        disposition = Some(Disposition::of(&outcome));
                        let _ = self.inner.events.send(outcome);
                    }
                }
            }
        }
        disposition
    }

    async fn commit(&self, updates: &UpdateMap) -> Event {
        match self.inner.tools.commit(updates).await {
            Ok(()) => Event::CommitSucceeded,
            Err(error) => Event::CommitFailed { error },
        }
    }

    async fn persist(&self, outbox: &Outbox) {
        if !outbox.hydrated {
            tracing::warn!("Outbox not hydrated yet, keeping batch in memory only");
            return;
        }
        let result = match outbox.batch.to_json() {
            Ok(text) => self
                .inner
                .storage
                .set_item(OUTBOX_KEY, &text)
                .await
                .map_err(QueueError::from),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            tracing::error!("Failed to persist outbox: {}", e);
        }
    }

    fn arm_retry(&self, outbox: &mut Outbox, delay: Duration) {
        if let Some(handle) = outbox.retry.take() {
            handle.abort();
        }
        tracing::debug!("Retry armed in {:?}", delay);

        let weak = Arc::downgrade(&self.inner);
        outbox.retry = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(queue) = Self::upgrade(&weak) {
                queue.fire_retry().await;
            }
        }));
    }

    async fn fire_retry(&self) {
        let mut outbox = self.inner.outbox.lock().await;
        // Detach rather than abort: this task is the one running.
        outbox.retry.take();
        let online = self.is_online();
        self.drive(&mut outbox, Event::RetryTimer { online }, None)
            .await;
    }
}

fn log_outcome(outcome: &OutboxEvent) {
    match outcome {
        OutboxEvent::Committed => tracing::debug!("Effect committed"),
        OutboxEvent::Queued { attempts } => {
            tracing::info!("Effect queued (attempts: {})", attempts)
        }
        OutboxEvent::Flushed { attempts } => {
            tracing::info!("Outbox flushed after {} failed attempts", attempts)
        }
        OutboxEvent::CommitFailed { attempts, error } => {
            tracing::warn!("Commit failed (attempts: {}): {}", attempts, error)
        }
        OutboxEvent::Discarded { attempts, error } => {
            tracing::error!("Outbox discarded after {} attempts: {}", attempts, error)
        }
    }
}

impl fmt::Debug for OfflineQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OfflineQueue")
            .field("online", &self.is_online())
            .finish_non_exhaustive()
    }
}
