//! # Mock Store & Testing Guide
//!
//! The `MockStore<T>` type hands out a real [`StoreClient<T>`] whose requests are answered from
//! a queue of expectations instead of an in-memory map. It lets you script exactly which
//! calls a piece of code is allowed to make, in which order, and what each call returns.
//!
//! ## When to use Mocks vs Real Stores
//!
//! | Feature | MockStore | StoreActor |
//! |---------|-----------|------------|
//! | **State** | None (scripted replies) | Real records and versions |
//! | **Call sequence** | Strictly checked | Not checked |
//! | **Error Injection** | Easy (`return_err`) | Hard |
//! | **Use Case** | "this pass issues no write", error paths | End-to-end scenarios |
//!
//! ## Example
//!
//! ```rust
//! use mirror_store::mock::MockStore;
//! use mirror_store::{StoreEntity, StoreError};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Note { name: String, version: Option<String> }
//!
//! impl StoreEntity for Note {
//!     type Key = String;
//!     fn key(&self) -> String { self.name.clone() }
//!     fn resource_version(&self) -> Option<&str> { self.version.as_deref() }
//!     fn set_resource_version(&mut self, v: String) { self.version = Some(v); }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut mock = MockStore::<Note>::new();
//!     mock.expect_get("a".to_string()).return_not_found();
//!     mock.expect_create().return_echo();
//!
//!     let client = mock.client();
//!     let missing = client.get("a".to_string()).await;
//!     assert!(matches!(missing, Err(StoreError::NotFound(_))));
//!     client.create(Note { name: "a".into(), version: None }).await.unwrap();
//!
//!     mock.verify();
//!     assert_eq!(mock.writes().len(), 1);
//! }
//! ```
//!
//! ## Unexpected Calls
//!
//! A request that does not match the next expectation is recorded and its reply channel is
//! dropped, so the caller sees [`StoreError::ActorDropped`]. [`MockStore::verify`] panics with
//! every recorded mismatch as well as any expectation that was never consumed.

use crate::client::StoreClient;
use crate::entity::StoreEntity;
use crate::error::StoreError;
use crate::message::StoreRequest;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};

// =============================================================================
// EXPECTATION BUILDER API
// =============================================================================

/// Reply to a scripted write.
enum WriteReply {
    Echo,
    Err(StoreError),
}

/// Represents an expected request to the mock store.
enum Expectation<T: StoreEntity> {
    Get {
        key: T::Key,
        response: Result<T, StoreError>,
    },
    List {
        response: Result<Vec<T>, StoreError>,
    },
    Create {
        reply: WriteReply,
    },
    Update {
        key: T::Key,
        reply: WriteReply,
    },
    Delete {
        key: T::Key,
        response: Result<(), StoreError>,
    },
}

/// A write the code under test submitted to the mock.
#[derive(Debug, Clone)]
pub enum Captured<T: StoreEntity> {
    Created(T),
    Updated(T),
    Deleted(T::Key),
}

type Queue<T> = Arc<Mutex<VecDeque<Expectation<T>>>>;

/// A mock store with expectation tracking for fluent testing.
pub struct MockStore<T: StoreEntity> {
    client: StoreClient<T>,
    expectations: Queue<T>,
    writes: Arc<Mutex<Vec<Captured<T>>>>,
    unexpected: Arc<Mutex<Vec<String>>>,
    _handle: tokio::task::JoinHandle<()>,
}

impl<T: StoreEntity> Default for MockStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: StoreEntity> MockStore<T> {
    /// Creates a new mock store with no expectations.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new() -> Self {
        let (sender, mut receiver) = mpsc::channel::<StoreRequest<T>>(100);
        let (events, _) = broadcast::channel(16);
        let expectations: Queue<T> = Arc::new(Mutex::new(VecDeque::new()));
        let writes = Arc::new(Mutex::new(Vec::new()));
        let unexpected = Arc::new(Mutex::new(Vec::new()));

        let exps = expectations.clone();
        let captured = writes.clone();
        let mismatches = unexpected.clone();

        // Spawn background task to answer requests
        let handle = tokio::spawn(async move {
            while let Some(request) = receiver.recv().await {
                let expectation = exps.lock().unwrap().pop_front();

                match (request, expectation) {
                    (StoreRequest::Get { key, respond_to }, Some(Expectation::Get { key: want, response }))
                        if key == want =>
                    {
                        let _ = respond_to.send(response);
                    }
                    (StoreRequest::List { respond_to }, Some(Expectation::List { response })) => {
                        let _ = respond_to.send(response);
                    }
                    (StoreRequest::Create { item, respond_to }, Some(Expectation::Create { reply })) => {
                        captured.lock().unwrap().push(Captured::Created(item.clone()));
                        let _ = respond_to.send(match reply {
                            WriteReply::Echo => Ok(item),
                            WriteReply::Err(e) => Err(e),
                        });
                    }
                    (StoreRequest::Update { item, respond_to }, Some(Expectation::Update { key: want, reply }))
                        if item.key() == want =>
                    {
                        captured.lock().unwrap().push(Captured::Updated(item.clone()));
                        let _ = respond_to.send(match reply {
                            WriteReply::Echo => Ok(item),
                            WriteReply::Err(e) => Err(e),
                        });
                    }
                    (StoreRequest::Delete { key, respond_to }, Some(Expectation::Delete { key: want, response }))
                        if key == want =>
                    {
                        captured.lock().unwrap().push(Captured::Deleted(key));
                        let _ = respond_to.send(response);
                    }
                    (request, expectation) => {
                        let got = describe_request(&request);
                        let want = expectation
                            .as_ref()
                            .map(describe_expectation)
                            .unwrap_or_else(|| "nothing".to_string());
                        mismatches
                            .lock()
                            .unwrap()
                            .push(format!("got {got}, expected {want}"));
                        // Dropping the request closes its reply channel.
                    }
                }
            }
        });

        Self {
            client: StoreClient::new(sender, events),
            expectations,
            writes,
            unexpected,
            _handle: handle,
        }
    }

    /// Returns the client for use in tests.
    pub fn client(&self) -> StoreClient<T> {
        self.client.clone()
    }

    /// Expects a `get` of `key`.
    pub fn expect_get(&mut self, key: T::Key) -> GetExpectationBuilder<T> {
        GetExpectationBuilder {
            key,
            expectations: self.expectations.clone(),
        }
    }

    /// Expects a `list`.
    pub fn expect_list(&mut self) -> ListExpectationBuilder<T> {
        ListExpectationBuilder {
            expectations: self.expectations.clone(),
        }
    }

    /// Expects a `create` of any record.
    pub fn expect_create(&mut self) -> WriteExpectationBuilder<T> {
        WriteExpectationBuilder {
            key: None,
            expectations: self.expectations.clone(),
        }
    }

    /// Expects an `update` of the record stored under `key`.
    pub fn expect_update(&mut self, key: T::Key) -> WriteExpectationBuilder<T> {
        WriteExpectationBuilder {
            key: Some(key),
            expectations: self.expectations.clone(),
        }
    }

    /// Expects a `delete` of `key`.
    pub fn expect_delete(&mut self, key: T::Key) -> DeleteExpectationBuilder<T> {
        DeleteExpectationBuilder {
            key,
            expectations: self.expectations.clone(),
        }
    }

    /// Writes submitted so far, in order.
    pub fn writes(&self) -> Vec<Captured<T>> {
        self.writes.lock().unwrap().clone()
    }

    /// Verifies that all expectations were met and no unexpected call was made.
    pub fn verify(&self) {
        let mismatches = self.unexpected.lock().unwrap();
        if !mismatches.is_empty() {
            panic!("Unexpected store calls: {}", mismatches.join("; "));
        }
        let exps = self.expectations.lock().unwrap();
        if !exps.is_empty() {
            panic!("Not all expectations were met. {} remaining", exps.len());
        }
    }
}

fn describe_request<T: StoreEntity>(request: &StoreRequest<T>) -> String {
    match request {
        StoreRequest::Get { key, .. } => format!("get({key})"),
        StoreRequest::List { .. } => "list()".to_string(),
        StoreRequest::Create { item, .. } => format!("create({})", item.key()),
        StoreRequest::Update { item, .. } => format!("update({})", item.key()),
        StoreRequest::Delete { key, .. } => format!("delete({key})"),
    }
}

fn describe_expectation<T: StoreEntity>(expectation: &Expectation<T>) -> String {
    match expectation {
        Expectation::Get { key, .. } => format!("get({key})"),
        Expectation::List { .. } => "list()".to_string(),
        Expectation::Create { .. } => "create(..)".to_string(),
        Expectation::Update { key, .. } => format!("update({key})"),
        Expectation::Delete { key, .. } => format!("delete({key})"),
    }
}

/// Builder for `get` expectations.
pub struct GetExpectationBuilder<T: StoreEntity> {
    key: T::Key,
    expectations: Queue<T>,
}

impl<T: StoreEntity> GetExpectationBuilder<T> {
    /// Replies with `item`.
    pub fn return_ok(self, item: T) {
        self.push(Ok(item));
    }

    /// Replies with [`StoreError::NotFound`].
    pub fn return_not_found(self) {
        let err = StoreError::NotFound(self.key.to_string());
        self.push(Err(err));
    }

    /// Replies with `error`.
    pub fn return_err(self, error: StoreError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<T, StoreError>) {
        self.expectations.lock().unwrap().push_back(Expectation::Get {
            key: self.key,
            response,
        });
    }
}

/// Builder for `list` expectations.
pub struct ListExpectationBuilder<T: StoreEntity> {
    expectations: Queue<T>,
}

impl<T: StoreEntity> ListExpectationBuilder<T> {
    pub fn return_ok(self, items: Vec<T>) {
        self.expectations
            .lock()
            .unwrap()
            .push_back(Expectation::List { response: Ok(items) });
    }

    pub fn return_err(self, error: StoreError) {
        self.expectations
            .lock()
            .unwrap()
            .push_back(Expectation::List {
                response: Err(error),
            });
    }
}

/// Builder for `create` and `update` expectations.
pub struct WriteExpectationBuilder<T: StoreEntity> {
    key: Option<T::Key>,
    expectations: Queue<T>,
}

impl<T: StoreEntity> WriteExpectationBuilder<T> {
    /// Replies with the submitted record unchanged.
    pub fn return_echo(self) {
        self.push(WriteReply::Echo);
    }

    /// Replies with `error`.
    pub fn return_err(self, error: StoreError) {
        self.push(WriteReply::Err(error));
    }

    fn push(self, reply: WriteReply) {
        let expectation = match self.key {
            Some(key) => Expectation::Update { key, reply },
            None => Expectation::Create { reply },
        };
        self.expectations.lock().unwrap().push_back(expectation);
    }
}

/// Builder for `delete` expectations.
pub struct DeleteExpectationBuilder<T: StoreEntity> {
    key: T::Key,
    expectations: Queue<T>,
}

impl<T: StoreEntity> DeleteExpectationBuilder<T> {
    pub fn return_ok(self) {
        self.push(Ok(()));
    }

    /// Replies with [`StoreError::NotFound`].
    pub fn return_not_found(self) {
        let err = StoreError::NotFound(self.key.to_string());
        self.push(Err(err));
    }

    pub fn return_err(self, error: StoreError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<(), StoreError>) {
        self.expectations.lock().unwrap().push_back(Expectation::Delete {
            key: self.key,
            response,
        });
    }
}
