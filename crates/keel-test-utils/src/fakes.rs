//! Store and queue doubles with call recording and failure injection.
//!
//! Both fakes delegate to the in-memory implementations from `keel-core`, so
//! unscripted calls behave like a real backend. Injected failures take
//! precedence and are consumed in order.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use keel_core::database::{
    DatabaseClient, InMemoryClient, Object, ObjectQueryResult, Query, QueryOptions,
    WritePrecondition,
};
use keel_core::error::{Error, Result};
use keel_core::queue::{EnqueueOptions, InMemoryQueue, Message, QueueClient, QueueClientConfig};
use keel_core::resource_id::ResourceId;

/// Builds the error an injected failure returns.
pub type ErrorFactory = Box<dyn Fn() -> Error + Send + Sync>;

/// Kinds of store calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseCall {
    /// [`DatabaseClient::get`].
    Get,
    /// [`DatabaseClient::save`].
    Save,
    /// [`DatabaseClient::delete`].
    Delete,
    /// [`DatabaseClient::query`].
    Query,
}

/// Record of a store call.
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseOp {
    /// A read.
    Get {
        /// Identifier read.
        id: ResourceId,
    },
    /// A save.
    Save {
        /// Identifier written.
        id: ResourceId,
        /// Body written.
        data: serde_json::Value,
        /// Precondition used.
        precondition: WritePrecondition,
    },
    /// A delete.
    Delete {
        /// Identifier deleted.
        id: ResourceId,
        /// Precondition used.
        precondition: WritePrecondition,
    },
    /// A query.
    Query {
        /// Root scope searched.
        root_scope: ResourceId,
    },
}

impl DatabaseOp {
    /// The kind of call recorded.
    pub const fn call(&self) -> DatabaseCall {
        match self {
            Self::Get { .. } => DatabaseCall::Get,
            Self::Save { .. } => DatabaseCall::Save,
            Self::Delete { .. } => DatabaseCall::Delete,
            Self::Query { .. } => DatabaseCall::Query,
        }
    }
}

struct Failures<K> {
    next: HashMap<K, VecDeque<ErrorFactory>>,
    always: HashMap<K, ErrorFactory>,
}

impl<K> Default for Failures<K> {
    fn default() -> Self {
        Self {
            next: HashMap::new(),
            always: HashMap::new(),
        }
    }
}

impl<K: std::hash::Hash + Eq> Failures<K> {
    fn take(&mut self, kind: &K) -> Option<Error> {
        if let Some(factory) = self.next.get_mut(kind).and_then(VecDeque::pop_front) {
            return Some(factory());
        }
        self.always.get(kind).map(|factory| factory())
    }

    fn clear(&mut self) {
        self.next.clear();
        self.always.clear();
    }
}

/// Store double.
///
/// ```rust
/// use keel_core::error::Error;
/// use keel_test_utils::{DatabaseCall, FakeDatabaseClient};
///
/// let db = FakeDatabaseClient::new();
/// db.fail_next(DatabaseCall::Save, || Error::store_unavailable("down"));
/// ```
#[derive(Clone, Default)]
pub struct FakeDatabaseClient {
    inner: InMemoryClient,
    operations: Arc<Mutex<Vec<DatabaseOp>>>,
    failures: Arc<Mutex<Failures<DatabaseCall>>>,
}

impl std::fmt::Debug for FakeDatabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeDatabaseClient")
            .field("inner", &self.inner)
            .field("operations", &self.operations)
            .finish_non_exhaustive()
    }
}

impl FakeDatabaseClient {
    /// Creates an empty fake store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The backing in-memory store, for seeding and inspection.
    pub fn inner(&self) -> &InMemoryClient {
        &self.inner
    }

    /// Fails the next call of `call` with the produced error.
    pub fn fail_next(&self, call: DatabaseCall, error: impl Fn() -> Error + Send + Sync + 'static) {
        self.failures
            .lock()
            .expect("lock")
            .next
            .entry(call)
            .or_default()
            .push_back(Box::new(error));
    }

    /// Fails every call of `call` until cleared.
    pub fn fail_always(
        &self,
        call: DatabaseCall,
        error: impl Fn() -> Error + Send + Sync + 'static,
    ) {
        self.failures
            .lock()
            .expect("lock")
            .always
            .insert(call, Box::new(error));
    }

    /// Clears injected failures.
    pub fn clear_failures(&self) {
        self.failures.lock().expect("lock").clear();
    }

    /// All recorded calls, in order.
    pub fn operations(&self) -> Vec<DatabaseOp> {
        self.operations.lock().expect("lock").clone()
    }

    /// Number of recorded calls of the given kind.
    pub fn count(&self, call: DatabaseCall) -> usize {
        self.operations
            .lock()
            .expect("lock")
            .iter()
            .filter(|op| op.call() == call)
            .count()
    }

    /// Clears recorded calls.
    pub fn clear_operations(&self) {
        self.operations.lock().expect("lock").clear();
    }

    fn record(&self, op: DatabaseOp) -> Result<()> {
        let call = op.call();
        self.operations.lock().expect("lock").push(op);
        match self.failures.lock().expect("lock").take(&call) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DatabaseClient for FakeDatabaseClient {
    async fn get(&self, id: &ResourceId) -> Result<Object> {
        self.record(DatabaseOp::Get { id: id.clone() })?;
        self.inner.get(id).await
    }

    async fn save(&self, object: &mut Object, precondition: WritePrecondition) -> Result<()> {
        self.record(DatabaseOp::Save {
            id: object.metadata.id.clone(),
            data: object.data.clone(),
            precondition: precondition.clone(),
        })?;
        self.inner.save(object, precondition).await
    }

    async fn delete(&self, id: &ResourceId, precondition: WritePrecondition) -> Result<()> {
        self.record(DatabaseOp::Delete {
            id: id.clone(),
            precondition: precondition.clone(),
        })?;
        self.inner.delete(id, precondition).await
    }

    async fn query(&self, query: &Query, options: &QueryOptions) -> Result<ObjectQueryResult> {
        self.record(DatabaseOp::Query {
            root_scope: query.root_scope.clone(),
        })?;
        self.inner.query(query, options).await
    }
}

/// Kinds of queue calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueCall {
    /// [`QueueClient::enqueue`].
    Enqueue,
    /// [`QueueClient::dequeue`].
    Dequeue,
    /// [`QueueClient::finish_message`].
    Finish,
    /// [`QueueClient::extend_message`].
    Extend,
}

/// Queue double.
#[derive(Clone)]
pub struct FakeQueueClient {
    inner: Arc<InMemoryQueue>,
    calls: Arc<Mutex<Vec<QueueCall>>>,
    enqueued: Arc<Mutex<Vec<Message>>>,
    failures: Arc<Mutex<Failures<QueueCall>>>,
}

impl std::fmt::Debug for FakeQueueClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeQueueClient")
            .field("inner", &self.inner)
            .field("calls", &self.calls)
            .finish_non_exhaustive()
    }
}

impl Default for FakeQueueClient {
    fn default() -> Self {
        Self::new("fake")
    }
}

impl FakeQueueClient {
    /// Creates an empty fake queue.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(InMemoryQueue::new(name)),
            calls: Arc::default(),
            enqueued: Arc::default(),
            failures: Arc::default(),
        }
    }

    /// The backing in-memory queue.
    pub fn inner(&self) -> &InMemoryQueue {
        &self.inner
    }

    /// Fails the next call of `call` with the produced error.
    pub fn fail_next(&self, call: QueueCall, error: impl Fn() -> Error + Send + Sync + 'static) {
        self.failures
            .lock()
            .expect("lock")
            .next
            .entry(call)
            .or_default()
            .push_back(Box::new(error));
    }

    /// Fails every call of `call` until cleared.
    pub fn fail_always(&self, call: QueueCall, error: impl Fn() -> Error + Send + Sync + 'static) {
        self.failures
            .lock()
            .expect("lock")
            .always
            .insert(call, Box::new(error));
    }

    /// Clears injected failures.
    pub fn clear_failures(&self) {
        self.failures.lock().expect("lock").clear();
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<QueueCall> {
        self.calls.lock().expect("lock").clone()
    }

    /// Number of recorded calls of the given kind.
    pub fn count(&self, call: QueueCall) -> usize {
        self.calls
            .lock()
            .expect("lock")
            .iter()
            .filter(|c| **c == call)
            .count()
    }

    /// Messages accepted by `enqueue`, in order.
    pub fn enqueued(&self) -> Vec<Message> {
        self.enqueued.lock().expect("lock").clone()
    }

    fn record(&self, call: QueueCall) -> Result<()> {
        self.calls.lock().expect("lock").push(call);
        match self.failures.lock().expect("lock").take(&call) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl QueueClient for FakeQueueClient {
    async fn enqueue(&self, message: Message, options: EnqueueOptions) -> Result<()> {
        self.record(QueueCall::Enqueue)?;
        self.enqueued.lock().expect("lock").push(message.clone());
        self.inner.enqueue(message, options).await
    }

    async fn dequeue(&self, config: &QueueClientConfig) -> Result<Message> {
        self.record(QueueCall::Dequeue)?;
        self.inner.dequeue(config).await
    }

    async fn finish_message(&self, message: &Message) -> Result<()> {
        self.record(QueueCall::Finish)?;
        self.inner.finish_message(message).await
    }

    async fn extend_message(&self, message: &mut Message) -> Result<()> {
        self.record(QueueCall::Extend)?;
        self.inner.extend_message(message).await
    }

    fn queue_name(&self) -> &str {
        self.inner.queue_name()
    }
}
