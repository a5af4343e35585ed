//! Creator wallet model.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Earnings account of a creator receiving royalties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatorWallet {
    pub creator_id: String,
    /// Credits available for payout
    pub balance: i64,
    /// Credits requested for payout but not yet paid
    pub pending_payouts: i64,
    /// Lifetime royalty income
    pub total_earnings: i64,
    pub updated_at: DateTime<Utc>,
}

impl CreatorWallet {
    pub fn new(creator_id: impl Into<String>) -> Self {
        Self {
            creator_id: creator_id.into(),
            balance: 0,
            pending_payouts: 0,
            total_earnings: 0,
            updated_at: Utc::now(),
        }
    }

    /// Add net royalty earnings.
    pub fn credit(&mut self, amount: i64) {
        self.balance += amount;
        self.total_earnings += amount;
        self.updated_at = Utc::now();
    }
}
