use std::panic::{catch_unwind, AssertUnwindSafe};

use restcall_core::{ConvertError, NetworkFailure, Outcome};
use tracing::error;

/// Receives the outcome of one dispatched invocation. Contains a method for
/// each possible outcome; one and only one method is invoked per invocation.
///
/// Every method takes `self: Box<Self>`, so firing twice is unrepresentable.
pub trait Callback<T, E>: Send {
    fn on_success(self: Box<Self>, value: T);

    /// The session expired or the account is unauthorized (HTTP 401).
    fn on_unauthorized(self: Box<Self>, error: Option<E>);

    /// The server rejected the request (4xx other than 401). The payload is
    /// decoded with the method's success type.
    fn on_client_error(self: Box<Self>, body: Option<T>, status: u16);

    /// The server failed (5xx), or a successful status carried a missing or
    /// undecodable body; `cause` holds the decode failure in that case.
    fn on_server_error(
        self: Box<Self>,
        error: Option<E>,
        status: u16,
        cause: Option<ConvertError>,
    );

    /// The server was never reached, or the call was canceled
    /// (`failure.is_canceled()`).
    fn on_network_error(self: Box<Self>, failure: NetworkFailure);

    /// The engine hit a failure outside the response contract.
    fn on_unexpected_error(self: Box<Self>, cause: anyhow::Error);
}

/// Invoke the callback method matching `outcome`.
///
/// A panic raised by the callback itself is caught and routed to the error
/// log; it never re-enters the dispatch pipeline and never produces a second
/// outcome.
pub fn deliver<T, E>(callback: Box<dyn Callback<T, E>>, outcome: Outcome<T, E>) {
    let case = outcome.case();
    let result = catch_unwind(AssertUnwindSafe(move || match outcome {
        Outcome::Success(value) => callback.on_success(value),
        Outcome::Unauthorized(error) => callback.on_unauthorized(error),
        Outcome::ClientError { body, status } => callback.on_client_error(body, status),
        Outcome::ServerError {
            error,
            status,
            cause,
        } => callback.on_server_error(error, status, cause),
        Outcome::NetworkError(failure) => callback.on_network_error(failure),
        Outcome::UnexpectedError(cause) => callback.on_unexpected_error(cause),
    }));
    if result.is_err() {
        error!(case, "callback panicked; failure isolated from the dispatch pipeline");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        fired: Arc<AtomicUsize>,
        last: Arc<std::sync::Mutex<String>>,
    }

    impl Counting {
        fn record(self: Box<Self>, case: &str) {
            self.fired.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = case.to_string();
        }
    }

    impl Callback<u32, String> for Counting {
        fn on_success(self: Box<Self>, _value: u32) {
            self.record("success");
        }
        fn on_unauthorized(self: Box<Self>, _error: Option<String>) {
            self.record("unauthorized");
        }
        fn on_client_error(self: Box<Self>, _body: Option<u32>, _status: u16) {
            self.record("client_error");
        }
        fn on_server_error(
            self: Box<Self>,
            _error: Option<String>,
            _status: u16,
            _cause: Option<ConvertError>,
        ) {
            self.record("server_error");
        }
        fn on_network_error(self: Box<Self>, _failure: NetworkFailure) {
            self.record("network_error");
        }
        fn on_unexpected_error(self: Box<Self>, _cause: anyhow::Error) {
            self.record("unexpected_error");
        }
    }

    #[test]
    fn test_each_case_routes_to_its_method() {
        let outcomes: Vec<Outcome<u32, String>> = vec![
            Outcome::Success(1),
            Outcome::Unauthorized(None),
            Outcome::ClientError {
                body: None,
                status: 404,
            },
            Outcome::ServerError {
                error: None,
                status: 500,
                cause: None,
            },
            Outcome::NetworkError(NetworkFailure::io("down")),
            Outcome::UnexpectedError(anyhow::anyhow!("boom")),
        ];

        for outcome in outcomes {
            let fired = Arc::new(AtomicUsize::new(0));
            let last = Arc::new(std::sync::Mutex::new(String::new()));
            let expected = outcome.case();
            deliver(
                Box::new(Counting {
                    fired: Arc::clone(&fired),
                    last: Arc::clone(&last),
                }),
                outcome,
            );
            assert_eq!(fired.load(Ordering::SeqCst), 1);
            assert_eq!(&*last.lock().unwrap(), expected);
        }
    }

    struct Panicking;

    impl Callback<u32, String> for Panicking {
        fn on_success(self: Box<Self>, _value: u32) {
            panic!("user callback bug");
        }
        fn on_unauthorized(self: Box<Self>, _error: Option<String>) {}
        fn on_client_error(self: Box<Self>, _body: Option<u32>, _status: u16) {}
        fn on_server_error(
            self: Box<Self>,
            _error: Option<String>,
            _status: u16,
            _cause: Option<ConvertError>,
        ) {
        }
        fn on_network_error(self: Box<Self>, _failure: NetworkFailure) {}
        fn on_unexpected_error(self: Box<Self>, _cause: anyhow::Error) {}
    }

    #[test]
    fn test_callback_panic_is_isolated() {
        // Must not unwind out of deliver.
        deliver(Box::new(Panicking), Outcome::Success(1));
    }
}
