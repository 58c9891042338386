// restcall network behavior simulator
// Lets dependents exercise their outcome handling without a live network:
// randomized latency, randomized failures, and simulated calls that honor
// the engine's handle contract (at-most-once, cancelable, forkable).

pub mod behavior;
pub mod calls;

pub use behavior::NetworkBehavior;
pub use calls::{BehaviorCall, CannedResponder, MockReply, MockResponder};
