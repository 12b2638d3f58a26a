pub mod events;
pub mod tracker;

pub use events::{PaymentEvent, TierChanged};
pub use tracker::{MAX_PAYMENT_FAILURES, SubscriptionStatus, SubscriptionTracker};
