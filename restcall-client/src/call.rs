// Call handles
// One handle per invocation. The phase machine is monotonic
// (idle -> running -> completed | canceled); the compare-exchange at
// finalization is what guarantees at-most-once delivery and keeps a
// cancellation from being shadowed by a stale success.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use restcall_core::{
    ArgValue, CallError, InvocationMode, MethodDescriptor, NetworkFailure, Outcome,
};
use serde::de::DeserializeOwned;
use tokio::sync::watch;

use crate::callback::{deliver, Callback};
use crate::client::RestClient;
use crate::executor::CallbackExecutor;

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const COMPLETED: u8 = 2;
const CANCELED: u8 = 3;

#[derive(Debug)]
pub(crate) struct CallPhase {
    phase: AtomicU8,
    cancel: watch::Sender<bool>,
}

impl CallPhase {
    fn new() -> Self {
        let (cancel, _) = watch::channel(false);
        CallPhase {
            phase: AtomicU8::new(IDLE),
            cancel,
        }
    }
}

/// A single pending invocation of one method.
///
/// The handle executes at most once: `execute`/`enqueue` a second time
/// panics. To re-invoke, [`Call::fork`] a fresh handle — it shares only the
/// immutable descriptor and arguments, never this handle's execution state.
#[derive(Debug)]
pub struct Call<T, E> {
    client: RestClient,
    descriptor: Arc<MethodDescriptor>,
    args: Arc<Vec<ArgValue>>,
    phase: Arc<CallPhase>,
    _marker: PhantomData<fn() -> (T, E)>,
}

impl<T, E> Call<T, E>
where
    T: DeserializeOwned + Send + 'static,
    E: DeserializeOwned + Send + 'static,
{
    pub(crate) fn new(
        client: RestClient,
        descriptor: Arc<MethodDescriptor>,
        args: Vec<ArgValue>,
    ) -> Self {
        Call {
            client,
            descriptor,
            args: Arc::new(args),
            phase: Arc::new(CallPhase::new()),
            _marker: PhantomData,
        }
    }

    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    /// Whether execution has ever been started on this handle.
    pub fn is_executed(&self) -> bool {
        self.phase.phase.load(Ordering::Acquire) != IDLE
    }

    pub fn is_canceled(&self) -> bool {
        self.phase.phase.load(Ordering::Acquire) == CANCELED
    }

    /// Cancel this invocation.
    ///
    /// Before execution starts this prevents it from ever running; while
    /// running it interrupts the transport wait (best effort). After the
    /// outcome has been finalized this is a no-op.
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

    /// A fresh handle for the same method and arguments, with no execution
    /// state carried over.
    pub fn fork(&self) -> Call<T, E> {
        Call {
            client: self.client.clone(),
            descriptor: Arc::clone(&self.descriptor),
            args: Arc::clone(&self.args),
            phase: Arc::new(CallPhase::new()),
            _marker: PhantomData,
        }
    }

    /// Run a blocking-mode method inline on the caller's task and return its
    /// outcome as a value or a typed error.
    ///
    /// # Panics
    /// Panics if the method was declared dispatched, or if this handle has
    /// already executed.
    pub async fn execute(&self) -> Result<T, CallError<T, E>> {
        if self.descriptor.mode() != InvocationMode::Blocking {
            panic!(
                "{}: dispatched method invoked with execute(); use enqueue()",
                self.descriptor.name()
            );
        }
        if !self.start() {
            return Err(CallError::Network(NetworkFailure::canceled(
                "canceled before execution",
            )));
        }
        self.run().await.into_result()
    }

    /// Submit a dispatched-mode method to the network executor; exactly one
    /// callback method fires on the callback executor when it completes.
    ///
    /// Must be called inside a tokio runtime unless the client was built
    /// with an explicit network handle.
    ///
    /// # Panics
    /// Panics if the method was declared blocking, or if this handle has
    /// already executed.
    pub fn enqueue(&self, callback: Box<dyn Callback<T, E>>) {
        if self.descriptor.mode() != InvocationMode::Dispatched {
            panic!(
                "{}: blocking method invoked with enqueue(); use execute()",
                self.descriptor.name()
            );
        }
        let executor = self.client.callback_executor();
        if !self.start() {
            dispatch(
                executor,
                callback,
                Outcome::NetworkError(NetworkFailure::canceled("canceled before execution")),
            );
            return;
        }

        let task = self.detach();
        self.client.network_handle().spawn(async move {
            let outcome = task.run().await;
            dispatch(executor, callback, outcome);
        });
    }

    /// Transition idle -> running. Returns false when the handle was
    /// canceled before it ever started.
    fn start(&self) -> bool {
        match self.phase.phase.compare_exchange(
            IDLE,
            RUNNING,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => true,
            Err(CANCELED) => false,
            Err(_) => panic!(
                "{}: call handle already executed; fork() a fresh handle to re-invoke",
                self.descriptor.name()
            ),
        }
    }

    /// The strictly ordered pipeline: build -> transport -> classify, with
    /// the cancel signal racing the transport wait.
    async fn run(&self) -> Outcome<T, E> {
        let mut cancel_rx = self.phase.cancel.subscribe();
        let outcome = if *cancel_rx.borrow() {
            Outcome::NetworkError(NetworkFailure::canceled("canceled"))
        } else {
            tokio::select! {
                _ = cancel_rx.changed() => {
                    Outcome::NetworkError(NetworkFailure::canceled("canceled during transport"))
                }
                outcome = self.client.round_trip::<T, E>(&self.descriptor, &self.args) => outcome,
            }
        };

        // The winner of this exchange decides delivery: a cancellation that
        // landed first replaces the computed outcome; afterwards cancel() is
        // a no-op.
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

    /// A shallow handle over the same shared state, for the spawned task.
    fn detach(&self) -> Call<T, E> {
        Call {
            client: self.client.clone(),
            descriptor: Arc::clone(&self.descriptor),
            args: Arc::clone(&self.args),
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
