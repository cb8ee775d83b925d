//! Public façade: queues batches FIFO behind a single serial runner, owns
//! the cross-batch `Throttle` and `ObserverSet`, and maps
//! [`engine::CompletionCode`] plus the façade-only rejections (already
//! throttled, already updating, empty id list, bad data callback) onto one
//! [`CompletionCode`] surfaced to every caller.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use ceu_events::{Event, Observer, ObserverSet};
use ceu_types::{CrxUpdateItem, SessionId};

use crate::context::{Collaborators, Operation, UpdateContext};
use crate::engine::{self, UpdateEngine};
use crate::traits::{CancelFlag, DataSource};

/// Outcome reported to a batch's completion callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionCode {
    None,
    UpdateInProgress,
    UpdateCanceled,
    RetryLater,
    UpdateCheckError,
    CrxNotFound,
    InvalidArgument,
    BadCrxDataCallback,
}

impl From<engine::CompletionCode> for CompletionCode {
    fn from(value: engine::CompletionCode) -> Self {
        match value {
            engine::CompletionCode::None => Self::None,
            engine::CompletionCode::UpdateCheckError => Self::UpdateCheckError,
            engine::CompletionCode::CrxNotFound => Self::CrxNotFound,
        }
    }
}

/// Cancels the batch this handle was returned for. A no-op handle (returned
/// when a call was rejected before it was ever queued) cancels nothing.
#[derive(Clone)]
pub struct CancelHandle {
    flag: Option<CancelFlag>,
}

impl CancelHandle {
    fn noop() -> Self {
        Self { flag: None }
    }

    pub fn cancel(&self) {
        if let Some(flag) = &self.flag {
            flag.cancel();
        }
    }
}

type StateCallback = Arc<dyn Fn(&CrxUpdateItem) + Send + Sync>;
type CompletionCallback = Box<dyn FnOnce(CompletionCode) + Send>;

struct Job {
    ids: Vec<String>,
    operation: Operation,
    is_foreground: bool,
    data_source: Arc<dyn DataSource>,
    state_cb: Option<StateCallback>,
    cancel: CancelFlag,
    on_complete: CompletionCallback,
}

struct Inner {
    collaborators: Arc<Collaborators>,
    cache: crate::cache::CrxCache,
    cache_root: PathBuf,
    work_dir: PathBuf,
    observers: ObserverSet,
    throttle: crate::throttle::Throttle,
    queue: Mutex<VecDeque<Job>>,
    notify: tokio::sync::Notify,
    in_flight: Mutex<HashSet<String>>,
}

/// Entry point for `update`/`install`/`check_for_update`/`send_ping`.
///
/// One dedicated worker task drains the queue FIFO, one batch at a time;
/// `update`/`install`/`check_for_update` only ever enqueue, so callers never
/// block waiting for a prior batch.
#[derive(Clone)]
pub struct UpdateClient {
    inner: Arc<Inner>,
}

impl UpdateClient {
    #[must_use]
    pub fn new(collaborators: Arc<Collaborators>, cache_root: PathBuf, work_dir: PathBuf) -> Self {
        let inner = Arc::new(Inner {
            cache: crate::cache::CrxCache::new(cache_root.clone()),
            collaborators,
            cache_root,
            work_dir,
            observers: ObserverSet::new(),
            throttle: crate::throttle::Throttle::new(),
            queue: Mutex::new(VecDeque::new()),
            notify: tokio::sync::Notify::new(),
            in_flight: Mutex::new(HashSet::new()),
        });

        tokio::spawn(Self::worker_loop(inner.clone()));

        Self { inner }
    }

    /// Check-and-update every id in `ids`, falling through to install if the
    /// check says `ok`.
    pub fn update(
        &self,
        ids: Vec<String>,
        data_source: Arc<dyn DataSource>,
        state_cb: Option<StateCallback>,
        is_foreground: bool,
        on_complete: impl FnOnce(CompletionCode) + Send + 'static,
    ) -> CancelHandle {
        self.enqueue(
            ids,
            Operation::Update,
            is_foreground,
            data_source,
            state_cb,
            on_complete,
        )
    }

    /// Install a single id unconditionally, bypassing the throttle. Rejects
    /// immediately with `UpdateInProgress` if `id` is already mid-batch.
    pub fn install(
        &self,
        id: String,
        data_source: Arc<dyn DataSource>,
        state_cb: Option<StateCallback>,
        on_complete: impl FnOnce(CompletionCode) + Send + 'static,
    ) -> CancelHandle {
        if self.is_updating(&id) {
            on_complete(CompletionCode::UpdateInProgress);
            return CancelHandle::noop();
        }
        self.enqueue(
            vec![id],
            Operation::Install,
            true,
            data_source,
            state_cb,
            on_complete,
        )
    }

    /// Run the check phase only; never reaches `DOWNLOADING`.
    pub fn check_for_update(
        &self,
        id: String,
        data_source: Arc<dyn DataSource>,
        state_cb: Option<StateCallback>,
        is_foreground: bool,
        on_complete: impl FnOnce(CompletionCode) + Send + 'static,
    ) -> CancelHandle {
        self.enqueue(
            vec![id],
            Operation::CheckForUpdate,
            is_foreground,
            data_source,
            state_cb,
            on_complete,
        )
    }

    /// Flush a single event directly to the ping manager, outside any batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the ping manager cannot persist or send it.
    pub async fn send_ping(&self, component_id: &str, event: Event) -> ceu_errors::Result<()> {
        let session_id = SessionId::new_v4();
        self.inner
            .collaborators
            .ping_manager
            .send_ping(session_id, component_id, vec![event])
            .await
    }

    /// Cancels every batch still sitting in the queue (not yet picked up by
    /// the worker); an in-flight batch keeps running and finishes normally.
    pub fn stop(&self) {
        let mut queue = self.inner.queue.lock().expect("queue lock poisoned");
        while let Some(job) = queue.pop_front() {
            (job.on_complete)(CompletionCode::UpdateCanceled);
        }
    }

    pub fn add_observer(&self, observer: Arc<dyn Observer>) {
        self.inner.observers.add(observer);
    }

    pub fn remove_observer(&self, observer: &Arc<dyn Observer>) {
        self.inner.observers.remove(observer);
    }

    #[must_use]
    pub fn is_updating(&self, id: &str) -> bool {
        self.inner
            .in_flight
            .lock()
            .expect("in-flight lock poisoned")
            .contains(id)
    }

    fn enqueue(
        &self,
        ids: Vec<String>,
        operation: Operation,
        is_foreground: bool,
        data_source: Arc<dyn DataSource>,
        state_cb: Option<StateCallback>,
        on_complete: impl FnOnce(CompletionCode) + Send + 'static,
    ) -> CancelHandle {
        if ids.is_empty() {
            on_complete(CompletionCode::InvalidArgument);
            return CancelHandle::noop();
        }

        if !matches!(operation, Operation::Install) && self.inner.throttle.is_throttled() {
            on_complete(CompletionCode::RetryLater);
            return CancelHandle::noop();
        }

        let cancel = CancelFlag::new();
        let job = Job {
            ids,
            operation,
            is_foreground,
            data_source,
            state_cb,
            cancel: cancel.clone(),
            on_complete: Box::new(on_complete),
        };

        self.inner
            .queue
            .lock()
            .expect("queue lock poisoned")
            .push_back(job);
        self.inner.notify.notify_one();

        CancelHandle { flag: Some(cancel) }
    }

    async fn worker_loop(inner: Arc<Inner>) {
        loop {
            let job = inner.queue.lock().expect("queue lock poisoned").pop_front();
            let Some(job) = job else {
                inner.notify.notified().await;
                continue;
            };

            {
                let mut in_flight = inner.in_flight.lock().expect("in-flight lock poisoned");
                for id in &job.ids {
                    in_flight.insert(id.clone());
                }
            }

            let ids = job.ids.clone();
            Self::run_job(&inner, job).await;

            {
                let mut in_flight = inner.in_flight.lock().expect("in-flight lock poisoned");
                for id in &ids {
                    in_flight.remove(id);
                }
            }
        }
    }

    async fn run_job(inner: &Arc<Inner>, job: Job) {
        let session_id = SessionId::new_v4();
        let work_dir = inner.work_dir.join(session_id.to_string());

        let mut context = UpdateContext::new(
            session_id,
            job.operation,
            job.is_foreground,
            job.ids.clone(),
            inner.collaborators.clone(),
            inner.cache.clone(),
            inner.cache_root.clone(),
            work_dir.clone(),
            job.cancel.clone(),
        );

        let observers = &inner.observers;
        let state_cb = job.state_cb.clone();
        let mut emit = move |item: &CrxUpdateItem| {
            observers.notify(item);
            if let Some(cb) = &state_cb {
                cb(item);
            }
        };

        let outcome = UpdateEngine::run(&mut context, job.data_source.as_ref(), &mut emit).await;

        let completion = match outcome {
            Ok(batch) => {
                inner.throttle.record(batch.retry_after_sec);
                CompletionCode::from(batch.completion)
            }
            Err(_bad_data_callback) => CompletionCode::BadCrxDataCallback,
        };

        for id in &job.ids {
            if let Some(component) = context.components.get(id) {
                if !component.events.is_empty() {
                    let _ = inner
                        .collaborators
                        .ping_manager
                        .send_ping(session_id, id, component.events.clone())
                        .await;
                }
            }
        }

        let _ = tokio::fs::remove_dir_all(&work_dir).await;

        (job.on_complete)(completion);
    }
}
