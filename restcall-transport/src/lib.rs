// restcall transport layer
// The HttpTransport trait plus the reqwest-backed production transport and a
// canned replay transport for tests and offline demos.

pub mod http_client;
pub mod replay;
pub mod transport;

pub use http_client::ReqwestTransport;
pub use replay::ReplayTransport;
pub use transport::{HttpTransport, TransportError};
