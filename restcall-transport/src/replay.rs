// Canned-response transport for tests and offline demos. Responses are
// served in FIFO order and every executed request is recorded for later
// inspection.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use restcall_core::{Request, Response};

use crate::transport::{HttpTransport, TransportError};

#[derive(Debug, Default)]
pub struct ReplayTransport {
    inner: Mutex<ReplayInner>,
}

#[derive(Debug, Default)]
struct ReplayInner {
    queue: VecDeque<Result<Response, TransportError>>,
    requests: Vec<Request>,
}

impl ReplayTransport {
    pub fn new() -> Self {
        ReplayTransport::default()
    }

    /// Queue a canned response.
    pub fn push_response(&self, response: Response) {
        self.lock().queue.push_back(Ok(response));
    }

    /// Queue a canned transport failure.
    pub fn push_error(&self, error: TransportError) {
        self.lock().queue.push_back(Err(error));
    }

    /// Requests executed so far, in order.
    pub fn recorded(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }

    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ReplayInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl HttpTransport for ReplayTransport {
    async fn execute(&self, request: Request) -> Result<Response, TransportError> {
        let mut inner = self.lock();
        inner.requests.push(request);
        inner
            .queue
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Io("replay queue exhausted".to_string())))
    }
}
