// restcall client dispatch layer
// Implements the concurrency contract of the engine:
// - blocking methods run inline on the caller's task and return a typed result
// - dispatched methods run on the network executor and deliver exactly one
//   callback method on the callback executor
// - call handles execute at most once, cancel cooperatively, and fork cleanly

pub mod call;
pub mod callback;
pub mod client;
pub mod executor;

pub use call::Call;
pub use callback::{deliver, Callback};
pub use client::{ClientConfig, RequestInterceptor, RestClient, RestClientBuilder};
pub use executor::{CallbackExecutor, InlineExecutor, QueueExecutor, TaskQueue, TokioExecutor};
