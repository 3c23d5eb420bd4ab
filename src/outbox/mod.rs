pub mod relay;

pub use relay::{Relay, RelayConfig};

/// Topic exchange every outbox event is published to.
pub const EVENTS_EXCHANGE: &str = "payments.events";

/// Routing keys emitted by the payment flow.
pub mod events {
    pub const PAYMENT_CREATED: &str = "payment.created";
    pub const PAYMENT_COMPLETED: &str = "payment.completed";
    pub const PAYMENT_FAILED: &str = "payment.failed";
    pub const REFUND_CREATED: &str = "refund.created";
}
