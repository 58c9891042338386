// Dispatch-layer integration tests: at-most-once delivery, callback
// isolation, executor affinity, cancellation, and memoization, all against
// the canned replay transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;
use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use restcall_client::{
    Callback, CallbackExecutor, ClientConfig, QueueExecutor, RequestInterceptor, RestClient,
};
use restcall_core::{
    ArgValue, CallError, ConvertError, Headers, MethodSpec, NetworkFailure, ParameterBinding,
    Request, Response,
};
use restcall_transport::{HttpTransport, ReplayTransport, TransportError};
use serde::Deserialize;

#[derive(Debug, PartialEq, Deserialize)]
struct Item {
    name: String,
}

#[derive(Debug, PartialEq, Deserialize)]
struct ApiError {
    reason: String,
}

#[derive(Clone, Default)]
struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
    fired: Arc<AtomicUsize>,
    thread: Arc<Mutex<Option<ThreadId>>>,
}

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn fired(&self) -> usize {
        self.fired.load(Ordering::SeqCst)
    }

    fn thread(&self) -> Option<ThreadId> {
        *self.thread.lock().unwrap()
    }
}

struct RecordingCallback {
    recorder: Recorder,
}

impl RecordingCallback {
    fn new(recorder: &Recorder) -> Box<Self> {
        Box::new(RecordingCallback {
            recorder: recorder.clone(),
        })
    }

    fn record(self: Box<Self>, event: String) {
        self.recorder.fired.fetch_add(1, Ordering::SeqCst);
        *self.recorder.thread.lock().unwrap() = Some(std::thread::current().id());
        self.recorder.events.lock().unwrap().push(event);
    }
}

impl Callback<Item, ApiError> for RecordingCallback {
    fn on_success(self: Box<Self>, value: Item) {
        self.record(format!("success:{}", value.name));
    }
    fn on_unauthorized(self: Box<Self>, error: Option<ApiError>) {
        self.record(format!(
            "unauthorized:{}",
            error.map(|e| e.reason).unwrap_or_default()
        ));
    }
    fn on_client_error(self: Box<Self>, body: Option<Item>, status: u16) {
        self.record(format!(
            "client_error:{}:{}",
            status,
            body.map(|b| b.name).unwrap_or_default()
        ));
    }
    fn on_server_error(
        self: Box<Self>,
        _error: Option<ApiError>,
        status: u16,
        _cause: Option<ConvertError>,
    ) {
        self.record(format!("server_error:{}", status));
    }
    fn on_network_error(self: Box<Self>, failure: NetworkFailure) {
        self.record(format!("network_error:{}:{}", failure.kind, failure.message));
    }
    fn on_unexpected_error(self: Box<Self>, cause: anyhow::Error) {
        self.record(format!("unexpected_error:{}", cause));
    }
}

fn client_with(
    transport: Arc<dyn HttpTransport>,
    executor: Option<Arc<dyn CallbackExecutor>>,
) -> RestClient {
    let mut builder = RestClient::builder("http://x/").transport(transport);
    if let Some(executor) = executor {
        builder = builder.callback_executor(executor);
    }
    builder.build().expect("client should build")
}

fn get_item_blocking(client: &RestClient) -> restcall_client::Call<Item, ApiError> {
    let descriptor = client.descriptor("ItemService.get", || {
        MethodSpec::get("ItemService.get", "/items/{id}")
            .blocking()
            .param(ParameterBinding::path("id"))
    });
    client.new_call(descriptor, vec![ArgValue::text("42")])
}

fn get_item_dispatched(client: &RestClient) -> restcall_client::Call<Item, ApiError> {
    let descriptor = client.descriptor("ItemService.get_async", || {
        MethodSpec::get("ItemService.get_async", "/items/{id}")
            .dispatched()
            .param(ParameterBinding::path("id"))
    });
    client.new_call(descriptor, vec![ArgValue::text("42")])
}

fn ok_item(name: &str) -> Response {
    Response::new(
        StatusCode::OK,
        Headers::new(),
        format!(r#"{{"name":"{name}"}}"#),
    )
}

#[tokio::test]
async fn test_blocking_success_end_to_end() {
    let transport = Arc::new(ReplayTransport::new());
    transport.push_response(ok_item("a"));
    let client = client_with(transport.clone(), None);

    let item = get_item_blocking(&client).execute().await.unwrap();
    assert_eq!(item, Item { name: "a".into() });

    let recorded = transport.recorded();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].url, "http://x/items/42");
}

#[tokio::test]
async fn test_blocking_client_error_carries_payload() {
    let transport = Arc::new(ReplayTransport::new());
    transport.push_response(Response::new(
        StatusCode::NOT_FOUND,
        Headers::new(),
        r#"{"name":"missing"}"#,
    ));
    let client = client_with(transport, None);

    match get_item_blocking(&client).execute().await {
        Err(CallError::Client { body, status: 404 }) => {
            assert_eq!(body, Some(Item { name: "missing".into() }));
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn test_blocking_network_failure_is_typed() {
    let transport = Arc::new(ReplayTransport::new());
    transport.push_error(TransportError::Connect("refused".into()));
    let client = client_with(transport, None);

    match get_item_blocking(&client).execute().await {
        Err(CallError::Network(failure)) => {
            assert!(!failure.is_canceled());
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_network_error_delivers_on_callback_executor() {
    let transport = Arc::new(ReplayTransport::new());
    transport.push_error(TransportError::Connect("refused".into()));
    let (executor, queue) = QueueExecutor::new();
    let client = client_with(transport, Some(Arc::new(executor)));

    let recorder = Recorder::default();
    get_item_dispatched(&client).enqueue(RecordingCallback::new(&recorder));

    assert!(queue.run_one(Duration::from_secs(5)), "callback never arrived");
    let events = recorder.events();
    assert_eq!(events.len(), 1);
    // Connectivity failures arrive as network errors, never as unexpected
    // errors.
    assert!(events[0].starts_with("network_error:connect"), "{events:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_exactly_one_callback_per_invocation() {
    let transport = Arc::new(ReplayTransport::new());
    let (executor, queue) = QueueExecutor::new();
    let client = client_with(transport.clone(), Some(Arc::new(executor)));

    let statuses = [200u16, 401, 404, 500, 204];
    for status in statuses {
        transport.push_response(Response::new(
            StatusCode::from_u16(status).unwrap(),
            Headers::new(),
            if status == 204 { "".to_string() } else { r#"{"name":"a"}"#.to_string() },
        ));
    }

    for _ in statuses {
        let recorder = Recorder::default();
        get_item_dispatched(&client).enqueue(RecordingCallback::new(&recorder));
        assert!(queue.run_one(Duration::from_secs(5)));
        assert_eq!(recorder.fired(), 1, "exactly one callback per invocation");
    }

    // Nothing left over.
    assert_eq!(queue.drain(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_callback_runs_on_the_draining_thread() {
    let transport = Arc::new(ReplayTransport::new());
    transport.push_response(ok_item("a"));
    let (executor, queue) = QueueExecutor::new();
    let client = client_with(transport, Some(Arc::new(executor)));

    let recorder = Recorder::default();
    get_item_dispatched(&client).enqueue(RecordingCallback::new(&recorder));

    let drainer = std::thread::spawn(move || {
        assert!(queue.run_one(Duration::from_secs(5)));
        std::thread::current().id()
    });
    let drainer_thread = drainer.join().unwrap();
    assert_eq!(recorder.thread(), Some(drainer_thread));
}

struct PanickingCallback;

impl Callback<Item, ApiError> for PanickingCallback {
    fn on_success(self: Box<Self>, _value: Item) {
        panic!("user callback bug");
    }
    fn on_unauthorized(self: Box<Self>, _error: Option<ApiError>) {}
    fn on_client_error(self: Box<Self>, _body: Option<Item>, _status: u16) {}
    fn on_server_error(
        self: Box<Self>,
        _error: Option<ApiError>,
        _status: u16,
        _cause: Option<ConvertError>,
    ) {
    }
    fn on_network_error(self: Box<Self>, _failure: NetworkFailure) {}
    fn on_unexpected_error(self: Box<Self>, _cause: anyhow::Error) {}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_callback_panic_does_not_poison_later_invocations() {
    let transport = Arc::new(ReplayTransport::new());
    transport.push_response(ok_item("a"));
    transport.push_response(ok_item("b"));
    let (executor, queue) = QueueExecutor::new();
    let client = client_with(transport, Some(Arc::new(executor)));

    get_item_dispatched(&client).enqueue(Box::new(PanickingCallback));
    assert!(queue.run_one(Duration::from_secs(5)));

    let recorder = Recorder::default();
    get_item_dispatched(&client).enqueue(RecordingCallback::new(&recorder));
    assert!(queue.run_one(Duration::from_secs(5)));
    assert_eq!(recorder.events(), vec!["success:b".to_string()]);
}

#[tokio::test]
#[should_panic(expected = "already executed")]
async fn test_double_execute_panics() {
    let transport = Arc::new(ReplayTransport::new());
    transport.push_response(ok_item("a"));
    transport.push_response(ok_item("b"));
    let client = client_with(transport, None);

    let call = get_item_blocking(&client);
    let _ = call.execute().await;
    let _ = call.execute().await;
}

#[tokio::test]
#[should_panic(expected = "use enqueue()")]
async fn test_execute_on_dispatched_method_panics() {
    let client = client_with(Arc::new(ReplayTransport::new()), None);
    let descriptor = client.descriptor("ItemService.watch", || {
        MethodSpec::get("ItemService.watch", "/items")
            .dispatched()
    });
    let call: restcall_client::Call<Item, ApiError> = client.new_call(descriptor, vec![]);
    let _ = call.execute().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[should_panic(expected = "use execute()")]
async fn test_enqueue_on_blocking_method_panics() {
    let client = client_with(Arc::new(ReplayTransport::new()), None);
    let call = get_item_blocking(&client);
    call.enqueue(Box::new(PanickingCallback));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_before_start_never_executes() {
    let transport = Arc::new(ReplayTransport::new());
    transport.push_response(ok_item("a"));
    let (executor, queue) = QueueExecutor::new();
    let client = client_with(transport.clone(), Some(Arc::new(executor)));

    let call = get_item_dispatched(&client);
    call.cancel();
    let recorder = Recorder::default();
    call.enqueue(RecordingCallback::new(&recorder));

    assert!(queue.run_one(Duration::from_secs(5)));
    let events = recorder.events();
    assert!(events[0].starts_with("network_error:canceled"), "{events:?}");
    // The transport never saw the request.
    assert!(transport.recorded().is_empty());
}

/// Transport that never resolves, for exercising mid-flight cancellation.
struct PendingTransport;

#[async_trait]
impl HttpTransport for PendingTransport {
    async fn execute(&self, _request: Request) -> Result<Response, TransportError> {
        std::future::pending().await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_mid_flight_interrupts_the_wait() {
    let (executor, queue) = QueueExecutor::new();
    let client = client_with(Arc::new(PendingTransport), Some(Arc::new(executor)));

    let call = get_item_dispatched(&client);
    let recorder = Recorder::default();
    call.enqueue(RecordingCallback::new(&recorder));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(call.is_executed());
    call.cancel();

    assert!(queue.run_one(Duration::from_secs(5)), "cancellation never delivered");
    let events = recorder.events();
    assert_eq!(events.len(), 1);
    assert!(events[0].starts_with("network_error:canceled"), "{events:?}");
}

#[tokio::test]
async fn test_fork_shares_nothing_mutable() {
    let transport = Arc::new(ReplayTransport::new());
    transport.push_response(ok_item("a"));
    transport.push_response(ok_item("b"));
    let client = client_with(transport, None);

    let call = get_item_blocking(&client);
    let first = call.execute().await.unwrap();
    assert_eq!(first.name, "a");

    // The fork carries no executed/canceled state from the original.
    let fork = call.fork();
    call.cancel();
    assert!(!fork.is_canceled());
    let second = fork.execute().await.unwrap();
    assert_eq!(second.name, "b");
}

#[tokio::test]
async fn test_descriptor_memoization_via_client() {
    let client = client_with(Arc::new(ReplayTransport::new()), None);
    let compiles = AtomicUsize::new(0);
    let spec = || {
        MethodSpec::get("ItemService.get", "/items/{id}")
            .blocking()
            .param(ParameterBinding::path("id"))
    };

    let first = client.descriptor("ItemService.get", || {
        compiles.fetch_add(1, Ordering::SeqCst);
        spec()
    });
    let second = client.descriptor("ItemService.get", || {
        compiles.fetch_add(1, Ordering::SeqCst);
        spec()
    });
    assert_eq!(compiles.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_malformed_method_fails_on_every_use() {
    let client = client_with(Arc::new(ReplayTransport::new()), None);
    let broken = || MethodSpec::get("ItemService.broken", "/items/{id}").blocking();

    assert!(client.try_descriptor("ItemService.broken", broken).is_err());
    assert!(client.try_descriptor("ItemService.broken", broken).is_err());
}

struct AuthInterceptor;

impl RequestInterceptor for AuthInterceptor {
    fn intercept(&self, request: &mut Request) {
        request.append_header("Authorization", "Bearer token");
    }
}

#[tokio::test]
async fn test_interceptor_applies_to_every_request() {
    let transport = Arc::new(ReplayTransport::new());
    transport.push_response(ok_item("a"));
    let client = RestClient::builder("http://x/")
        .transport(transport.clone())
        .interceptor(Arc::new(AuthInterceptor))
        .build()
        .unwrap();

    let _ = get_item_blocking(&client).execute().await.unwrap();
    let recorded = transport.recorded();
    assert_eq!(
        recorded[0].headers.first("Authorization"),
        Some("Bearer token")
    );
}

#[test]
fn test_default_config() {
    let config = ClientConfig::default();
    assert_eq!(config.timeout_ms, 30000);
    assert!(RestClient::new(config).is_ok());
}
