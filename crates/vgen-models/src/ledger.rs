//! Credit ledger data models.
//!
//! Every change to a credit balance is recorded as an immutable ledger entry.
//! A user's balance is the sum of their completed entries; pending debits
//! reduce what is available to spend but not the balance itself.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account that platform fee entries are attributed to.
pub const PLATFORM_ACCOUNT_ID: &str = "platform";

/// Kind of balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryType {
    /// Credits bought by the user
    Purchase,
    /// Charge for a generation job (negative amount)
    Debit,
    /// Creator share of a job's price
    Royalty,
    /// Platform cut taken from the royalty
    Fee,
    /// Compensation for a debit that must not stand
    Refund,
}

impl LedgerEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Debit => "debit",
            Self::Royalty => "royalty",
            Self::Fee => "fee",
            Self::Refund => "refund",
        }
    }

    /// Returns a human-readable label for the entry type.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Purchase => "Credit Purchase",
            Self::Debit => "Video Generation",
            Self::Royalty => "Creator Royalty",
            Self::Fee => "Platform Fee",
            Self::Refund => "Refund",
        }
    }
}

/// Settlement state of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryStatus {
    Pending,
    Completed,
    Failed,
}

impl LedgerEntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// A single credit ledger record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreditLedgerEntry {
    /// Unique identifier for this entry (UUID)
    pub id: String,

    /// Account the entry belongs to (user, creator or platform)
    pub user_id: String,

    /// Signed amount in integer credits
    pub amount: i64,

    #[serde(rename = "type")]
    pub entry_type: LedgerEntryType,

    /// Job that caused this entry (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_job_id: Option<String>,

    pub status: LedgerEntryStatus,

    /// Human-readable description of the operation
    pub description: String,

    /// Additional metadata (e.g., price breakdown, royalty rate)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CreditLedgerEntry {
    /// Create a new entry with a fresh id.
    pub fn new(
        user_id: impl Into<String>,
        amount: i64,
        entry_type: LedgerEntryType,
        status: LedgerEntryStatus,
        description: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            amount,
            entry_type,
            related_job_id: None,
            status,
            description: description.into(),
            metadata: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Pending debit reserving `price` credits for a job.
    pub fn pending_debit(user_id: impl Into<String>, job_id: impl Into<String>, price: i64) -> Self {
        Self::new(
            user_id,
            -price.abs(),
            LedgerEntryType::Debit,
            LedgerEntryStatus::Pending,
            LedgerEntryType::Debit.label(),
        )
        .with_job_id(job_id)
    }

    /// Set the related job ID.
    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.related_job_id = Some(job_id.into());
        self
    }

    /// Set metadata.
    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status == LedgerEntryStatus::Completed
    }

    pub fn is_pending_debit(&self) -> bool {
        self.entry_type == LedgerEntryType::Debit && self.status == LedgerEntryStatus::Pending
    }

    pub fn is_for_job(&self, job_id: &str) -> bool {
        self.related_job_id.as_deref() == Some(job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_debit_is_negative() {
        let entry = CreditLedgerEntry::pending_debit("user-1", "job-1", 100);
        assert_eq!(entry.amount, -100);
        assert!(entry.is_pending_debit());
        assert!(entry.is_for_job("job-1"));
        assert!(!entry.is_completed());
    }

    #[test]
    fn test_entry_serializes_type_field() {
        let entry = CreditLedgerEntry::new(
            PLATFORM_ACCOUNT_ID,
            2,
            LedgerEntryType::Fee,
            LedgerEntryStatus::Completed,
            "Platform Fee",
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "fee");
        assert_eq!(json["status"], "completed");
        assert!(json.get("related_job_id").is_none());
    }
}
