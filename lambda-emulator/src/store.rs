//! Per-function invocation stores.
//!
//! A [`FunctionStore`] mirrors a single Lambda execution environment: invocations queue up in
//! `pending`, at most one of them is checked out to the runtime client as `active`, and finished
//! ones are kept in a bounded `history` for inspection and replay.
//! All mutations of one store go through one mutex. Different functions never share a lock.

use crate::error::StoreError;
use crate::invocation::{
    ErrorDetail, InvocationHeaders, InvocationOutcome, InvocationRecord, InvocationStatus, InvocationSummary,
};
use hyper::body::Bytes;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Function name used when the runtime client does not prefix its requests with one.
pub const DEFAULT_FUNCTION_NAME: &str = "function";

/// Settings shared by all stores of a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// How many terminal records to keep per function
    pub history_limit: usize,
    /// Used to stamp the deadline header when an invocation is handed out
    pub function_timeout: Duration,
    /// Region part of the invoked function ARN
    pub region: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            history_limit: 20,
            function_timeout: Duration::from_secs(900),
            region: "us-east-1".to_owned(),
        }
    }
}

/// Lifecycle of the emulated execution environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RuntimeState {
    /// The runtime client has not asked for work yet
    Uninitialized,
    Ready,
    Executing,
    /// The runtime client reported an init error. Sticky until restart.
    InitFailed,
}

#[derive(Default)]
struct StoreInner {
    pending: VecDeque<InvocationRecord>,
    active: Option<InvocationRecord>,
    /// Most recent first
    history: VecDeque<Arc<InvocationRecord>>,
    /// Completion channels of all non-terminal records, keyed by id
    completions: HashMap<String, watch::Sender<Option<InvocationOutcome>>>,
    initialized: bool,
    init_error: Option<ErrorDetail>,
}

impl StoreInner {
    /// Status of a record that is not the active one, if the store knows about it.
    fn status_of(&self, id: &str) -> Option<InvocationStatus> {
        if let Some(record) = self.pending.iter().find(|r| r.id == id) {
            return Some(record.status);
        }
        self.history.iter().find(|r| r.id == id).map(|r| r.status)
    }

    fn state(&self) -> RuntimeState {
        if self.init_error.is_some() {
            RuntimeState::InitFailed
        } else if self.active.is_some() {
            RuntimeState::Executing
        } else if self.initialized {
            RuntimeState::Ready
        } else {
            RuntimeState::Uninitialized
        }
    }
}

/// Queue, active slot and history of invocations for one function.
pub struct FunctionStore {
    name: String,
    function_arn: String,
    settings: StoreSettings,
    timeout: chrono::Duration,
    inner: Mutex<StoreInner>,
    /// Woken on every change that may unblock a dequeue
    changed: Notify,
}

impl FunctionStore {
    pub fn new(name: impl Into<String>, settings: StoreSettings) -> Self {
        let name = name.into();
        let function_arn = format!("arn:aws:lambda:{}:123456789012:function:{}", settings.region, name);
        let timeout = chrono::Duration::from_std(settings.function_timeout).unwrap_or_else(|_| chrono::Duration::zero());

        Self {
            name,
            function_arn,
            settings,
            timeout,
            inner: Mutex::new(StoreInner::default()),
            changed: Notify::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function_arn(&self) -> &str {
        &self.function_arn
    }

    /// A panic while holding the lock cannot leave the queues half-updated,
    /// so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a new queued invocation and returns its id.
    pub fn enqueue(&self, input: impl Into<Bytes>, headers: InvocationHeaders) -> String {
        self.enqueue_with_receiver(input.into(), headers).0
    }

    fn enqueue_with_receiver(
        &self,
        input: Bytes,
        headers: InvocationHeaders,
    ) -> (String, watch::Receiver<Option<InvocationOutcome>>) {
        let mut record = InvocationRecord::new(input, headers);
        if record.headers.invoked_function_arn.is_none() {
            record.headers.invoked_function_arn = Some(self.function_arn.clone());
        }
        let id = record.id.clone();
        let (sender, receiver) = watch::channel(None);

        {
            let mut inner = self.lock();
            inner.completions.insert(id.clone(), sender);
            inner.pending.push_back(record);
        }
        self.changed.notify_waiters();

        debug!("{}: queued invocation {id}", self.name);
        (id, receiver)
    }

    /// Enqueues the input and waits for its result.
    /// Fails straight away if the function has already reported an init error.
    pub async fn invoke(
        &self,
        input: impl Into<Bytes>,
        headers: InvocationHeaders,
    ) -> Result<InvocationOutcome, StoreError> {
        if let Some(init_error) = self.init_error() {
            return Err(init_failed(&init_error));
        }

        let (id, receiver) = self.enqueue_with_receiver(input.into(), headers);
        wait_for_outcome(&id, receiver).await
    }

    /// Waits until there is a queued invocation and no other one is executing, then checks it out.
    ///
    /// Returns `Ok(None)` without touching the queue if `cancel` fires first.
    /// Returns the init error once one has been recorded.
    pub async fn dequeue_next(&self, cancel: &CancellationToken) -> Result<Option<InvocationRecord>, StoreError> {
        loop {
            // register for wake-ups before looking at the state so none are lost
            let changed = self.changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();

            {
                let mut guard = self.lock();
                let inner = &mut *guard;
                inner.initialized = true;

                if let Some(init_error) = &inner.init_error {
                    return Err(init_failed(init_error));
                }

                if inner.active.is_none() {
                    if let Some(mut record) = inner.pending.pop_front() {
                        record.start(self.timeout);
                        inner.active = Some(record.clone());
                        info!("{}: executing invocation {}", self.name, record.id);
                        return Ok(Some(record));
                    }
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("{}: dequeue cancelled", self.name);
                    return Ok(None);
                }
                _ = &mut changed => {}
            }
        }
    }

    /// Completes the active invocation with its output.
    pub fn resolve(&self, id: &str, output: impl Into<Bytes>) -> Result<(), StoreError> {
        self.complete(id, InvocationOutcome::Succeeded(output.into()))
    }

    /// Completes the active invocation with an error.
    pub fn reject(&self, id: &str, error: ErrorDetail) -> Result<(), StoreError> {
        self.complete(id, InvocationOutcome::Failed(error))
    }

    fn complete(&self, id: &str, outcome: InvocationOutcome) -> Result<(), StoreError> {
        {
            let mut guard = self.lock();
            let inner = &mut *guard;

            let is_active = inner.active.as_ref().is_some_and(|r| r.id == id);
            if !is_active {
                return Err(match inner.status_of(id) {
                    Some(status) => StoreError::NotActive {
                        id: id.to_owned(),
                        status: status.to_string(),
                    },
                    None => StoreError::UnknownInvocation(id.to_owned()),
                });
            }

            // checked above
            let Some(mut record) = inner.active.take() else {
                return Err(StoreError::UnknownInvocation(id.to_owned()));
            };
            record.complete(outcome.clone());
            info!("{}: invocation {id} {}", self.name, record.status);

            inner.history.push_front(Arc::new(record));
            inner.history.truncate(self.settings.history_limit);

            if let Some(sender) = inner.completions.remove(id) {
                sender.send_replace(Some(outcome));
            }
        }

        // the active slot is free again
        self.changed.notify_waiters();
        Ok(())
    }

    /// Waits until the invocation reaches a terminal state.
    pub async fn await_result(&self, id: &str) -> Result<InvocationOutcome, StoreError> {
        let receiver = {
            let inner = self.lock();
            match inner.completions.get(id) {
                Some(sender) => sender.subscribe(),
                None => {
                    return inner
                        .history
                        .iter()
                        .find(|r| r.id == id)
                        .and_then(|r| r.outcome.clone())
                        .ok_or_else(|| StoreError::UnknownInvocation(id.to_owned()));
                }
            }
        };

        wait_for_outcome(id, receiver).await
    }

    /// Drops all queued invocations. Their awaiting callers get [StoreError::UnknownInvocation].
    pub fn clear_queued(&self) -> usize {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let dropped = inner.pending.len();
        for record in inner.pending.drain(..) {
            inner.completions.remove(&record.id);
        }
        info!("{}: cleared {dropped} queued invocations", self.name);
        dropped
    }

    /// Drops the history of terminal invocations.
    pub fn clear_executed(&self) -> usize {
        let mut inner = self.lock();
        let dropped = inner.history.len();
        inner.history.clear();
        info!("{}: cleared {dropped} executed invocations", self.name);
        dropped
    }

    /// Queues a copy of a finished invocation and returns the id of the copy.
    pub fn requeue(&self, id: &str) -> Result<String, StoreError> {
        let (input, headers) = {
            let inner = self.lock();
            match inner.history.iter().find(|r| r.id == id) {
                Some(record) => (record.input.clone(), record.caller_headers.clone()),
                None => {
                    let status = match &inner.active {
                        Some(active) if active.id == id => Some(active.status),
                        _ => inner.status_of(id),
                    };
                    return Err(match status {
                        Some(status) => StoreError::NotActive {
                            id: id.to_owned(),
                            status: status.to_string(),
                        },
                        None => StoreError::UnknownInvocation(id.to_owned()),
                    });
                }
            }
        };

        Ok(self.enqueue(input, headers))
    }

    /// Marks the function as failed to initialize. Blocked and future dequeues return the error.
    pub fn record_init_error(&self, error: ErrorDetail) {
        warn!("{}: init error: {}: {}", self.name, error.error_type, error.error_message);
        self.lock().init_error = Some(error);
        self.changed.notify_waiters();
    }

    pub fn init_error(&self) -> Option<ErrorDetail> {
        self.lock().init_error.clone()
    }

    pub fn state(&self) -> RuntimeState {
        self.lock().state()
    }

    /// Trace id of the invocation currently checked out to the runtime client.
    pub fn active_trace_id(&self) -> Option<String> {
        self.lock().active.as_ref().map(|r| r.trace_id().to_owned())
    }

    pub fn active(&self) -> Option<InvocationRecord> {
        self.lock().active.clone()
    }

    pub fn pending_ids(&self) -> Vec<String> {
        self.lock().pending.iter().map(|r| r.id.clone()).collect()
    }

    /// Terminal records, most recent first.
    pub fn history(&self) -> Vec<Arc<InvocationRecord>> {
        self.lock().history.iter().cloned().collect()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let inner = self.lock();

        StoreSnapshot {
            function_name: self.name.clone(),
            function_arn: self.function_arn.clone(),
            state: inner.state(),
            init_error: inner.init_error.clone(),
            pending: inner.pending.iter().map(InvocationRecord::summary).collect(),
            active: inner.active.as_ref().map(InvocationRecord::summary),
            history: inner.history.iter().map(|r| r.summary()).collect(),
        }
    }
}

fn init_failed(error: &ErrorDetail) -> StoreError {
    StoreError::InitFailed(format!("{}: {}", error.error_type, error.error_message))
}

async fn wait_for_outcome(
    id: &str,
    mut receiver: watch::Receiver<Option<InvocationOutcome>>,
) -> Result<InvocationOutcome, StoreError> {
    match receiver.wait_for(Option::is_some).await {
        Ok(outcome) => (*outcome)
            .clone()
            .ok_or_else(|| StoreError::UnknownInvocation(id.to_owned())),
        // the record was cleared before it completed
        Err(_) => Err(StoreError::UnknownInvocation(id.to_owned())),
    }
}

/// Serializable view of a store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub function_name: String,
    pub function_arn: String,
    pub state: RuntimeState,
    pub init_error: Option<ErrorDetail>,
    pub pending: Vec<InvocationSummary>,
    pub active: Option<InvocationSummary>,
    pub history: Vec<InvocationSummary>,
}

/// All function stores of the process, keyed by function name.
/// Stores are created the first time a name is referenced and live until the process exits.
#[derive(Clone, Default)]
pub struct StoreRegistry {
    stores: Arc<Mutex<HashMap<String, Arc<FunctionStore>>>>,
    settings: StoreSettings,
}

impl StoreRegistry {
    pub fn new(settings: StoreSettings) -> Self {
        Self {
            stores: Arc::default(),
            settings,
        }
    }

    pub fn get_or_create(&self, function_name: &str) -> Arc<FunctionStore> {
        let mut stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        stores
            .entry(function_name.to_owned())
            .or_insert_with(|| {
                debug!("Creating store for {function_name}");
                Arc::new(FunctionStore::new(function_name, self.settings.clone()))
            })
            .clone()
    }

    pub fn get(&self, function_name: &str) -> Option<Arc<FunctionStore>> {
        self.stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(function_name)
            .cloned()
    }

    /// Names of all functions referenced so far, sorted.
    pub fn function_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn store() -> FunctionStore {
        FunctionStore::new("test-fn", StoreSettings::default())
    }

    async fn next(store: &FunctionStore) -> InvocationRecord {
        store
            .dequeue_next(&CancellationToken::new())
            .await
            .expect("dequeue failed")
            .expect("dequeue was cancelled")
    }

    #[tokio::test]
    async fn huge_function_timeout_still_checks_out() {
        let settings = StoreSettings {
            function_timeout: Duration::from_secs(9_223_372_036_854_775),
            ..StoreSettings::default()
        };
        let store = FunctionStore::new("slow-fn", settings);
        let id = store.enqueue("{}", InvocationHeaders::default());

        let record = next(&store).await;
        assert_eq!(record.id, id);
        assert!(record.headers.deadline_ms.is_some());
        assert_eq!(store.active().map(|r| r.id), Some(id));
    }

    #[tokio::test]
    async fn snapshot_state_matches_its_lists() {
        let store = store();
        store.enqueue("1", InvocationHeaders::default());
        store.enqueue("2", InvocationHeaders::default());
        next(&store).await;

        let snapshot = store.snapshot();
        assert_eq!(snapshot.state, RuntimeState::Executing);
        assert!(snapshot.active.is_some());
        assert_eq!(snapshot.pending.len(), 1);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["state"], "Executing");
        assert!(json["active"]["createdAt"].is_string());
    }

    proptest! {
        #[test]
        fn dequeues_in_enqueue_order(count in 1usize..30) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = store();
                let ids: Vec<String> = (0..count)
                    .map(|i| store.enqueue(format!("{{\"n\":{i}}}"), InvocationHeaders::default()))
                    .collect();

                let mut dequeued = Vec::new();
                for _ in 0..count {
                    let record = next(&store).await;
                    store.resolve(&record.id, "null").unwrap();
                    dequeued.push(record.id);
                }

                assert_eq!(dequeued, ids);
            });
        }
    }

    #[tokio::test]
    async fn only_one_invocation_executes_at_a_time() {
        let store = Arc::new(store());
        let first = store.enqueue("1", InvocationHeaders::default());
        let second = store.enqueue("2", InvocationHeaders::default());

        let record = next(&store).await;
        assert_eq!(record.id, first);
        assert_eq!(record.status, InvocationStatus::Executing);
        assert_eq!(store.state(), RuntimeState::Executing);

        let blocked = {
            let store = store.clone();
            tokio::spawn(async move { next(&store).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!blocked.is_finished(), "second dequeue must wait for the active invocation");
        assert_eq!(store.pending_ids(), vec![second.clone()]);

        store.resolve(&first, "\"done\"").unwrap();
        let record = tokio::time::timeout(Duration::from_secs(1), blocked).await.unwrap().unwrap();
        assert_eq!(record.id, second);
    }

    #[tokio::test]
    async fn resolve_of_non_active_id_changes_nothing() {
        let store = store();
        let active = store.enqueue("1", InvocationHeaders::default());
        let queued = store.enqueue("2", InvocationHeaders::default());
        next(&store).await;

        assert_eq!(
            store.resolve("no-such-id", "x"),
            Err(StoreError::UnknownInvocation("no-such-id".to_owned()))
        );
        assert!(matches!(
            store.reject(&queued, ErrorDetail::new("E", "m")),
            Err(StoreError::NotActive { .. })
        ));
        assert_eq!(store.active().map(|r| r.id), Some(active.clone()));
        assert_eq!(store.pending_ids(), vec![queued]);
        assert!(store.history().is_empty());

        store.resolve(&active, "1").unwrap();
        let err = store.resolve(&active, "2").unwrap_err();
        assert_eq!(
            err,
            StoreError::NotActive {
                id: active.clone(),
                status: "succeeded".to_owned()
            }
        );
        assert_eq!(store.history().len(), 1);
        assert_eq!(
            store.history()[0].outcome,
            Some(InvocationOutcome::Succeeded(Bytes::from_static(b"1")))
        );
    }

    #[tokio::test]
    async fn cancelled_dequeue_leaves_queue_untouched() {
        let store = Arc::new(store());
        let active = store.enqueue("1", InvocationHeaders::default());
        let queued = store.enqueue("2", InvocationHeaders::default());
        next(&store).await;

        let cancel = CancellationToken::new();
        let blocked = {
            let store = store.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { store.dequeue_next(&cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), blocked).await.unwrap().unwrap();
        assert!(matches!(result, Ok(None)));
        assert_eq!(store.pending_ids(), vec![queued]);
        assert_eq!(store.active().map(|r| r.id), Some(active));
    }

    #[tokio::test]
    async fn awaiters_get_their_own_results() {
        let store = Arc::new(store());
        let a = store.enqueue("a", InvocationHeaders::default());
        let b = store.enqueue("b", InvocationHeaders::default());

        let wait_a = {
            let (store, a) = (store.clone(), a.clone());
            tokio::spawn(async move { store.await_result(&a).await })
        };
        let wait_b = {
            let (store, b) = (store.clone(), b.clone());
            tokio::spawn(async move { store.await_result(&b).await })
        };

        let record = next(&store).await;
        store.resolve(&record.id, "\"A\"").unwrap();
        let record = next(&store).await;
        store.reject(&record.id, ErrorDetail::new("Boom", "b failed")).unwrap();

        assert_eq!(
            wait_a.await.unwrap().unwrap(),
            InvocationOutcome::Succeeded(Bytes::from_static(b"\"A\""))
        );
        assert_eq!(
            wait_b.await.unwrap().unwrap(),
            InvocationOutcome::Failed(ErrorDetail::new("Boom", "b failed"))
        );

        // already terminal: answered from history
        assert!(matches!(store.await_result(&a).await, Ok(InvocationOutcome::Succeeded(_))));
        assert!(matches!(
            store.await_result("unknown").await,
            Err(StoreError::UnknownInvocation(_))
        ));
    }

    #[tokio::test]
    async fn invoke_returns_the_result() {
        let store = Arc::new(store());
        let runtime = {
            let store = store.clone();
            tokio::spawn(async move {
                let record = next(&store).await;
                store.resolve(&record.id, record.input.clone()).unwrap();
            })
        };

        let outcome = store.invoke("{\"echo\":1}", InvocationHeaders::default()).await.unwrap();
        runtime.await.unwrap();
        assert_eq!(outcome, InvocationOutcome::Succeeded(Bytes::from_static(b"{\"echo\":1}")));
    }

    #[tokio::test]
    async fn clearing_never_touches_the_active_invocation() {
        let store = store();
        let done = store.enqueue("1", InvocationHeaders::default());
        next(&store).await;
        store.resolve(&done, "1").unwrap();

        let active = store.enqueue("2", InvocationHeaders::default());
        let queued = store.enqueue("3", InvocationHeaders::default());
        next(&store).await;

        assert_eq!(store.clear_queued(), 1);
        assert_eq!(store.clear_executed(), 1);
        assert!(store.pending_ids().is_empty());
        assert!(store.history().is_empty());
        assert_eq!(store.active().map(|r| r.id), Some(active.clone()));

        // the cleared invocation can no longer be awaited
        assert!(matches!(
            store.await_result(&queued).await,
            Err(StoreError::UnknownInvocation(_))
        ));
        store.resolve(&active, "2").unwrap();
    }

    #[tokio::test]
    async fn history_is_bounded_and_most_recent_first() {
        let settings = StoreSettings {
            history_limit: 2,
            ..Default::default()
        };
        let store = FunctionStore::new("bounded", settings);

        let mut ids = Vec::new();
        for i in 0..3 {
            let id = store.enqueue(i.to_string(), InvocationHeaders::default());
            next(&store).await;
            store.resolve(&id, "null").unwrap();
            ids.push(id);
        }

        let history: Vec<String> = store.history().iter().map(|r| r.id.clone()).collect();
        assert_eq!(history, vec![ids[2].clone(), ids[1].clone()]);
    }

    #[tokio::test]
    async fn init_error_is_sticky_and_wakes_dequeuers() {
        let store = Arc::new(store());
        let blocked = {
            let store = store.clone();
            tokio::spawn(async move { store.dequeue_next(&CancellationToken::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.state(), RuntimeState::Ready);

        store.record_init_error(ErrorDetail::new("Runtime.Init", "missing env var"));

        let result = tokio::time::timeout(Duration::from_secs(1), blocked).await.unwrap().unwrap();
        assert!(matches!(result, Err(StoreError::InitFailed(_))));

        store.enqueue("1", InvocationHeaders::default());
        assert!(matches!(
            store.dequeue_next(&CancellationToken::new()).await,
            Err(StoreError::InitFailed(_))
        ));
        assert!(matches!(
            store.invoke("1", InvocationHeaders::default()).await,
            Err(StoreError::InitFailed(_))
        ));
        assert_eq!(store.state(), RuntimeState::InitFailed);
    }

    #[tokio::test]
    async fn requeue_replays_a_finished_invocation() {
        let store = store();
        let headers = InvocationHeaders::default().with_trace_id("Root=1-replay");
        let id = store.enqueue("{\"replay\":true}", headers);
        next(&store).await;
        store.reject(&id, ErrorDetail::new("E", "m")).unwrap();

        let copy = store.requeue(&id).unwrap();
        assert_ne!(copy, id);

        let record = next(&store).await;
        assert_eq!(record.id, copy);
        assert_eq!(record.input, Bytes::from_static(b"{\"replay\":true}"));
        assert_eq!(record.trace_id(), "Root=1-replay");

        assert!(matches!(store.requeue(&copy), Err(StoreError::NotActive { .. })));
        assert!(matches!(store.requeue("nope"), Err(StoreError::UnknownInvocation(_))));
    }

    #[test]
    fn registry_creates_stores_once() {
        let registry = StoreRegistry::default();
        assert!(registry.get("b").is_none());

        let b = registry.get_or_create("b");
        let a = registry.get_or_create("a");
        assert!(Arc::ptr_eq(&b, &registry.get_or_create("b")));
        assert_eq!(registry.function_names(), vec!["a".to_owned(), "b".to_owned()]);
        assert_eq!(a.function_arn(), "arn:aws:lambda:us-east-1:123456789012:function:a");
        assert_eq!(a.state(), RuntimeState::Uninitialized);
    }
}
