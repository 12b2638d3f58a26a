//! Subscription tiers and the entitlement resolver.
//!
//! Tiers are a closed, ordered enumeration; the quota table below is the one
//! place a new tier is added, and every other match over `SubscriptionTier`
//! is compiler-checked for exhaustiveness.

use crate::core::RecordKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Essential,
    Plus,
    Premium,
}

impl SubscriptionTier {
    pub const ALL: [SubscriptionTier; 4] = [
        SubscriptionTier::Free,
        SubscriptionTier::Essential,
        SubscriptionTier::Plus,
        SubscriptionTier::Premium,
    ];

    /// Parse a tier name from the payment processor. Unknown names resolve to
    /// `Free`: fail-safe, never fail-open to a paid capability.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "essential" => SubscriptionTier::Essential,
            "plus" => SubscriptionTier::Plus,
            "premium" => SubscriptionTier::Premium,
            _ => SubscriptionTier::Free,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Essential => "essential",
            SubscriptionTier::Plus => "plus",
            SubscriptionTier::Premium => "premium",
        }
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Quotas
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quota {
    Bounded(usize),
    Unbounded,
}

impl Quota {
    pub fn cap(&self) -> Option<usize> {
        match self {
            Quota::Bounded(n) => Some(*n),
            Quota::Unbounded => None,
        }
    }

    /// Non-strict ordering used by the monotonicity check.
    fn at_least(&self, other: &Quota) -> bool {
        match (self, other) {
            (Quota::Unbounded, _) => true,
            (Quota::Bounded(_), Quota::Unbounded) => false,
            (Quota::Bounded(a), Quota::Bounded(b)) => a >= b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotas {
    pub schedules: Quota,
    pub entries: Quota,
    pub routines: Quota,
}

impl Quotas {
    pub fn bounded(schedules: usize, entries: usize, routines: usize) -> Self {
        Self {
            schedules: Quota::Bounded(schedules),
            entries: Quota::Bounded(entries),
            routines: Quota::Bounded(routines),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            schedules: Quota::Unbounded,
            entries: Quota::Unbounded,
            routines: Quota::Unbounded,
        }
    }

    pub fn for_kind(&self, kind: RecordKind) -> Quota {
        match kind {
            RecordKind::Schedule => self.schedules,
            RecordKind::Entry => self.entries,
            RecordKind::Routine => self.routines,
        }
    }

    fn at_least(&self, other: &Quotas) -> bool {
        self.schedules.at_least(&other.schedules)
            && self.entries.at_least(&other.entries)
            && self.routines.at_least(&other.routines)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entitlement {
    pub has_remote_access: bool,
    pub quotas: Quotas,
}

fn default_entitlement(tier: SubscriptionTier) -> Entitlement {
    match tier {
        SubscriptionTier::Free => Entitlement {
            has_remote_access: false,
            quotas: Quotas::bounded(3, 30, 3),
        },
        SubscriptionTier::Essential => Entitlement {
            has_remote_access: true,
            quotas: Quotas::bounded(10, 100, 10),
        },
        SubscriptionTier::Plus => Entitlement {
            has_remote_access: true,
            quotas: Quotas::bounded(25, 500, 25),
        },
        SubscriptionTier::Premium => Entitlement {
            has_remote_access: true,
            quotas: Quotas::unbounded(),
        },
    }
}

/// Pure tier-to-capability mapping. No error path: every tier resolves, and
/// anything unparseable already collapsed to `Free` upstream.
#[derive(Debug, Clone, Default)]
pub struct EntitlementResolver {
    quota_overrides: HashMap<SubscriptionTier, Quotas>,
}

impl EntitlementResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overrides(quota_overrides: HashMap<SubscriptionTier, Quotas>) -> Self {
        Self { quota_overrides }
    }

    pub fn resolve(&self, tier: SubscriptionTier) -> Entitlement {
        let mut entitlement = default_entitlement(tier);
        if let Some(quotas) = self.quota_overrides.get(&tier) {
            entitlement.quotas = *quotas;
        }
        entitlement
    }
}
