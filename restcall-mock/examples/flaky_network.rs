// Simulating a flaky link: half the calls fail, delays fluctuate.

use std::sync::Arc;
use std::time::Duration;

use restcall_mock::{BehaviorCall, CannedResponder, MockReply, NetworkBehavior};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
struct Quote {
    text: String,
}

#[tokio::main]
async fn main() {
    let behavior = Arc::new(NetworkBehavior::new());
    behavior.set_delay(Duration::from_millis(50));
    behavior.set_variance_percent(40);
    behavior.set_failure_percent(50);

    let call: BehaviorCall<Quote, serde_json::Value> = BehaviorCall::new(
        Arc::clone(&behavior),
        Arc::new(CannedResponder(MockReply::Success(Quote {
            text: "the network is reliable".into(),
        }))),
    );

    for attempt in 1..=10 {
        match call.fork().execute().await {
            Ok(quote) => println!("attempt {attempt}: ok: {}", quote.text),
            Err(err) => println!("attempt {attempt}: {err}"),
        }
    }
}
