use crate::core::UserId;
use crate::entitlement::{EntitlementResolver, SubscriptionTier};
use serde::{Deserialize, Serialize};

/// Inbound notifications from the payment processor. These are the only
/// inputs that may change a `SubscriptionStatus`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PaymentEvent {
    Succeeded {
        user: UserId,
        tier: SubscriptionTier,
        amount_cents: u64,
    },
    Failed {
        user: UserId,
        reason: String,
    },
    Canceled {
        user: UserId,
    },
}

impl PaymentEvent {
    pub fn user(&self) -> UserId {
        match self {
            PaymentEvent::Succeeded { user, .. }
            | PaymentEvent::Failed { user, .. }
            | PaymentEvent::Canceled { user } => *user,
        }
    }
}

/// Emitted by the tracker whenever a payment event lands a user on a
/// different tier than before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierChanged {
    pub user: UserId,
    pub old_tier: SubscriptionTier,
    pub new_tier: SubscriptionTier,
}

impl TierChanged {
    /// True when this change gains remote access the old tier did not have.
    /// This is the migration trigger.
    pub fn crosses_remote_boundary_up(&self, resolver: &EntitlementResolver) -> bool {
        !resolver.resolve(self.old_tier).has_remote_access
            && resolver.resolve(self.new_tier).has_remote_access
    }
}
