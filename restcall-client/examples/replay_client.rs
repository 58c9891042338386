// Hand-written service struct over a canned transport, runnable offline.

use std::sync::Arc;

use http::StatusCode;
use restcall_client::{Call, RestClient};
use restcall_core::{ArgValue, Headers, MethodSpec, ParameterBinding, Response};
use restcall_transport::ReplayTransport;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Item {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    reason: String,
}

/// One struct per service interface; each method resolves its own compiled
/// descriptor and mints a call handle.
struct ItemService {
    client: RestClient,
}

impl ItemService {
    fn new(client: RestClient) -> Self {
        ItemService { client }
    }

    fn get_item(&self, id: &str) -> Call<Item, ApiError> {
        let descriptor = self.client.descriptor("ItemService.get_item", || {
            MethodSpec::get("ItemService.get_item", "/items/{id}")
                .blocking()
                .param(ParameterBinding::path("id"))
        });
        self.client
            .new_call(descriptor, vec![ArgValue::text(id)])
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .init();

    let transport = Arc::new(ReplayTransport::new());
    transport.push_response(Response::new(
        StatusCode::OK,
        Headers::new(),
        r#"{"name":"a"}"#,
    ));
    transport.push_response(Response::new(
        StatusCode::NOT_FOUND,
        Headers::new(),
        r#"{"name":"missing"}"#,
    ));

    let client = RestClient::builder("http://items.example")
        .transport(transport)
        .build()?;
    let service = ItemService::new(client);

    let item = service.get_item("42").execute().await;
    println!("first call: {item:?}");

    let missing = service.get_item("43").execute().await;
    println!("second call: {missing:?}");

    Ok(())
}
