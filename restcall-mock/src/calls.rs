// Simulated calls
// BehaviorCall wraps a reference implementation (or a canned reply) and makes
// it behave like a real invocation: it sleeps the drawn delay on the network
// executor, then delivers exactly one outcome. Cancellation during the delay
// suppresses the reference implementation entirely, so its side effects are
// never observed after a cancel.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use restcall_client::{deliver, Callback, CallbackExecutor};
use restcall_core::{
    classify, CallError, Converter, Headers, JsonConverter, NetworkFailure, Outcome, Response,
};
use serde::de::DeserializeOwned;
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::behavior::NetworkBehavior;

/// What the reference implementation produced for one invocation.
#[derive(Debug, Clone)]
pub enum MockReply<T> {
    /// A plain success value.
    Success(T),
    /// An explicit HTTP error; classified exactly like a live response.
    Http { status: u16, body: Bytes },
    /// An explicit connectivity failure.
    Failure(NetworkFailure),
}

impl<T> MockReply<T> {
    pub fn http(status: u16, body: impl Into<Bytes>) -> Self {
        MockReply::Http {
            status,
            body: body.into(),
        }
    }
}

/// The reference implementation surface wrapped by a [`BehaviorCall`].
#[async_trait]
pub trait MockResponder<T>: Send + Sync {
    async fn respond(&self) -> MockReply<T>;
}

/// Responder that replays one canned reply per invocation.
#[derive(Debug, Clone)]
pub struct CannedResponder<T: Clone>(pub MockReply<T>);

#[async_trait]
impl<T> MockResponder<T> for CannedResponder<T>
where
    T: Clone + Send + Sync,
{
    async fn respond(&self) -> MockReply<T> {
        self.0.clone()
    }
}

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const COMPLETED: u8 = 2;
const CANCELED: u8 = 3;

#[derive(Debug)]
struct MockPhase {
    phase: AtomicU8,
    cancel: watch::Sender<bool>,
}

impl MockPhase {
    fn new() -> Self {
        let (cancel, _) = watch::channel(false);
        MockPhase {
            phase: AtomicU8::new(IDLE),
            cancel,
        }
    }
}

/// One simulated invocation, with the same handle contract as a live call:
/// at-most-once execution, cooperative cancellation, [`BehaviorCall::fork`]
/// for re-invocation.
pub struct BehaviorCall<T, E> {
    behavior: Arc<NetworkBehavior>,
    responder: Arc<dyn MockResponder<T>>,
    converter: Arc<dyn Converter>,
    callback_executor: Option<Arc<dyn CallbackExecutor>>,
    phase: Arc<MockPhase>,
    _marker: PhantomData<fn() -> E>,
}

impl<T, E> BehaviorCall<T, E>
where
    T: DeserializeOwned + Send + 'static,
    E: DeserializeOwned + Send + 'static,
{
    pub fn new(behavior: Arc<NetworkBehavior>, responder: Arc<dyn MockResponder<T>>) -> Self {
        BehaviorCall {
            behavior,
            responder,
            converter: Arc::new(JsonConverter::new()),
            callback_executor: None,
            phase: Arc::new(MockPhase::new()),
            _marker: PhantomData,
        }
    }

    /// Converter used to classify explicit HTTP error replies.
    pub fn with_converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_callback_executor(mut self, executor: Arc<dyn CallbackExecutor>) -> Self {
        self.callback_executor = Some(executor);
        self
    }

    pub fn is_executed(&self) -> bool {
        self.phase.phase.load(Ordering::Acquire) != IDLE
    }

    pub fn is_canceled(&self) -> bool {
        self.phase.phase.load(Ordering::Acquire) == CANCELED
    }

    pub fn cancel(&self) {
        loop {
            let current = self.phase.phase.load(Ordering::Acquire);
            if current == COMPLETED || current == CANCELED {
                return;
            }
            if self
                .phase
                .phase
                .compare_exchange(current, CANCELED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                // send_replace so the signal lands even when the running
                // task has not subscribed yet
                self.phase.cancel.send_replace(true);
                return;
            }
        }
    }

    /// A fresh handle over the same behavior and responder; no execution
    /// state carries over.
    pub fn fork(&self) -> BehaviorCall<T, E> {
        BehaviorCall {
            behavior: Arc::clone(&self.behavior),
            responder: Arc::clone(&self.responder),
            converter: Arc::clone(&self.converter),
            callback_executor: self.callback_executor.clone(),
            phase: Arc::new(MockPhase::new()),
            _marker: PhantomData,
        }
    }

    /// Run inline and return the outcome as a value or typed error.
    ///
    /// # Panics
    /// Panics if this handle has already executed.
    pub async fn execute(&self) -> Result<T, CallError<T, E>> {
        if !self.start() {
            return Err(CallError::Network(NetworkFailure::canceled(
                "canceled before execution",
            )));
        }
        self.run().await.into_result()
    }

    /// Submit to the ambient runtime; exactly one callback method fires on
    /// the callback executor (or inline on the network task).
    ///
    /// # Panics
    /// Panics if this handle has already executed.
    pub fn enqueue(&self, callback: Box<dyn Callback<T, E>>) {
        let executor = self.callback_executor.clone();
        if !self.start() {
            dispatch(
                executor,
                callback,
                Outcome::NetworkError(NetworkFailure::canceled("canceled before execution")),
            );
            return;
        }
        let task = self.detach();
        Handle::current().spawn(async move {
            let outcome = task.run().await;
            dispatch(executor, callback, outcome);
        });
    }

    fn start(&self) -> bool {
        match self.phase.phase.compare_exchange(
            IDLE,
            RUNNING,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => true,
            Err(CANCELED) => false,
            Err(_) => panic!("simulated call already executed; fork() a fresh handle to re-invoke"),
        }
    }

    async fn run(&self) -> Outcome<T, E> {
        let mut cancel_rx = self.phase.cancel.subscribe();
        let outcome = if *cancel_rx.borrow() {
            Outcome::NetworkError(NetworkFailure::canceled("canceled"))
        } else {
            // Both draws happen up front; changing the knobs afterwards
            // affects the next invocation only.
            let failed = self.behavior.calculate_is_failure();
            let delay = if failed {
                self.behavior.calculate_failure_delay()
            } else {
                self.behavior.calculate_delay()
            };
            tokio::select! {
                _ = cancel_rx.changed() => {
                    Outcome::NetworkError(NetworkFailure::canceled("canceled during simulated delay"))
                }
                _ = tokio::time::sleep(delay) => {
                    if failed {
                        Outcome::NetworkError(self.behavior.failure())
                    } else {
                        self.reply_outcome().await
                    }
                }
            }
        };

        match self.phase.phase.compare_exchange(
            RUNNING,
            COMPLETED,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => outcome,
            Err(_) => Outcome::NetworkError(NetworkFailure::canceled("canceled")),
        }
    }

    async fn reply_outcome(&self) -> Outcome<T, E> {
        match self.responder.respond().await {
            MockReply::Success(value) => Outcome::Success(value),
            MockReply::Http { status, body } => match StatusCode::from_u16(status) {
                Ok(code) => classify(
                    &Response::new(code, Headers::new(), body),
                    self.converter.as_ref(),
                ),
                Err(_) => Outcome::UnexpectedError(anyhow!(
                    "simulated reply carries invalid status {status}"
                )),
            },
            MockReply::Failure(failure) => Outcome::NetworkError(failure),
        }
    }

    fn detach(&self) -> BehaviorCall<T, E> {
        BehaviorCall {
            behavior: Arc::clone(&self.behavior),
            responder: Arc::clone(&self.responder),
            converter: Arc::clone(&self.converter),
            callback_executor: self.callback_executor.clone(),
            phase: Arc::clone(&self.phase),
            _marker: PhantomData,
        }
    }
}

fn dispatch<T, E>(
    executor: Option<Arc<dyn CallbackExecutor>>,
    callback: Box<dyn Callback<T, E>>,
    outcome: Outcome<T, E>,
) where
    T: Send + 'static,
    E: Send + 'static,
{
    match executor {
        Some(executor) => executor.execute(Box::new(move || deliver(callback, outcome))),
        None => deliver(callback, outcome),
    }
}
