// restcall client
// Owns the collaborators of one generated client: base URL, transport,
// converter, descriptor registry, executors, and interceptors. Service
// structs resolve their descriptors through `descriptor()` and mint call
// handles with `new_call()`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use restcall_core::{
    build_request, classify, ArgValue, Converter, JsonConverter, MethodDescriptor, MethodError,
    MethodRegistry, MethodSpec, Outcome, Request,
};
use restcall_transport::{HttpTransport, ReqwestTransport};
use serde::de::DeserializeOwned;
use tokio::runtime::Handle;
use tracing::{debug, trace};

use crate::call::Call;
use crate::executor::CallbackExecutor;

/// Mutates every outgoing request after binding and before the transport,
/// e.g. to attach an authorization header or a tracking query parameter.
pub trait RequestInterceptor: Send + Sync {
    fn intercept(&self, request: &mut Request);
}

/// Client configuration for the default transport stack.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every method path is resolved against.
    pub base_url: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_ms: 30000,
        }
    }
}

struct ClientInner {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    converter: Arc<dyn Converter>,
    registry: MethodRegistry,
    network: Option<Handle>,
    callback_executor: Option<Arc<dyn CallbackExecutor>>,
    interceptors: Vec<Arc<dyn RequestInterceptor>>,
}

/// One generated client. Cheap to clone; all state is shared and immutable
/// apart from the memoized descriptor registry.
#[derive(Clone)]
pub struct RestClient {
    inner: Arc<ClientInner>,
}

impl RestClient {
    /// Create a client with the default JSON converter and reqwest
    /// transport.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(Duration::from_millis(config.timeout_ms))
            .context("Failed to build HTTP transport")?;
        Self::builder(config.base_url)
            .transport(Arc::new(transport))
            .build()
    }

    pub fn builder(base_url: impl Into<String>) -> RestClientBuilder {
        RestClientBuilder {
            base_url: base_url.into(),
            transport: None,
            converter: None,
            network: None,
            callback_executor: None,
            interceptors: Vec::new(),
        }
    }

    /// Resolve a memoized descriptor, compiling `spec` on first use.
    ///
    /// # Panics
    /// A malformed method declaration is a programming error and panics with
    /// the compiler diagnostic, at the first use of the method.
    pub fn descriptor<F>(&self, key: &'static str, spec: F) -> Arc<MethodDescriptor>
    where
        F: FnOnce() -> MethodSpec,
    {
        match self.try_descriptor(key, spec) {
            Ok(descriptor) => descriptor,
            Err(err) => panic!("{err}"),
        }
    }

    /// Fallible variant of [`RestClient::descriptor`].
    pub fn try_descriptor<F>(
        &self,
        key: &'static str,
        spec: F,
    ) -> Result<Arc<MethodDescriptor>, MethodError>
    where
        F: FnOnce() -> MethodSpec,
    {
        self.inner.registry.resolve(key, spec)
    }

    /// Mint a call handle binding `args` to `descriptor`.
    pub fn new_call<T, E>(&self, descriptor: Arc<MethodDescriptor>, args: Vec<ArgValue>) -> Call<T, E>
    where
        T: DeserializeOwned + Send + 'static,
        E: DeserializeOwned + Send + 'static,
    {
        Call::new(self.clone(), descriptor, args)
    }

    /// The strictly ordered per-invocation pipeline: bind arguments, execute
    /// on the transport with timing capture, classify. Never returns an
    /// error; every failure becomes an outcome case.
    pub(crate) async fn round_trip<T, E>(
        &self,
        descriptor: &MethodDescriptor,
        args: &[ArgValue],
    ) -> Outcome<T, E>
    where
        T: DeserializeOwned,
        E: DeserializeOwned,
    {
        let inner = &self.inner;
        let mut request =
            match build_request(descriptor, &inner.base_url, args, inner.converter.as_ref()) {
                Ok(request) => request,
                Err(err) => return Outcome::UnexpectedError(anyhow::Error::new(err)),
            };
        for interceptor in &inner.interceptors {
            interceptor.intercept(&mut request);
        }

        debug!(method = descriptor.name(), url = %request.url, "dispatching request");
        let started = Instant::now();
        match inner.transport.execute(request).await {
            Ok(mut response) => {
                response.elapsed = started.elapsed();
                trace!(
                    method = descriptor.name(),
                    status = response.status.as_u16(),
                    elapsed_ms = response.elapsed.as_millis() as u64,
                    "response received"
                );
                classify(&response, inner.converter.as_ref())
            }
            Err(err) if err.is_connectivity() => Outcome::NetworkError(err.into_failure()),
            Err(err) => Outcome::UnexpectedError(anyhow::Error::new(err)),
        }
    }

    pub(crate) fn callback_executor(&self) -> Option<Arc<dyn CallbackExecutor>> {
        self.inner.callback_executor.clone()
    }

    /// The runtime the network work is spawned on.
    ///
    /// # Panics
    /// Panics when no handle was configured and the caller is outside a
    /// tokio runtime.
    pub(crate) fn network_handle(&self) -> Handle {
        self.inner
            .network
            .clone()
            .unwrap_or_else(Handle::current)
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.inner.base_url)
            .field("cached_methods", &self.inner.registry.len())
            .finish()
    }
}

/// Builder for clients with custom collaborators.
pub struct RestClientBuilder {
    base_url: String,
    transport: Option<Arc<dyn HttpTransport>>,
    converter: Option<Arc<dyn Converter>>,
    network: Option<Handle>,
    callback_executor: Option<Arc<dyn CallbackExecutor>>,
    interceptors: Vec<Arc<dyn RequestInterceptor>>,
}

impl RestClientBuilder {
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Runtime handle for network work; defaults to the ambient runtime at
    /// enqueue time.
    pub fn network_handle(mut self, handle: Handle) -> Self {
        self.network = Some(handle);
        self
    }

    /// Executor outcomes are delivered on; defaults to inline delivery on
    /// the network task.
    pub fn callback_executor(mut self, executor: Arc<dyn CallbackExecutor>) -> Self {
        self.callback_executor = Some(executor);
        self
    }

    pub fn interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn build(self) -> Result<RestClient> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(
                ReqwestTransport::new(Duration::from_millis(30000))
                    .context("Failed to build HTTP transport")?,
            ),
        };
        Ok(RestClient {
            inner: Arc::new(ClientInner {
                base_url: self.base_url,
                transport,
                converter: self
                    .converter
                    .unwrap_or_else(|| Arc::new(JsonConverter::new())),
                registry: MethodRegistry::new(),
                network: self.network,
                callback_executor: self.callback_executor,
                interceptors: self.interceptors,
            }),
        })
    }
}
