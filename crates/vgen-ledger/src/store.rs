//! Ledger and wallet store contracts.
//!
//! The relational store behind these traits is an external collaborator. The
//! only atomic primitive required is a versioned conditional insert, which is
//! what the balance check plus pending debit relies on.

use async_trait::async_trait;
use serde::Serialize;
use vgen_models::{CreatorWallet, CreditLedgerEntry, LedgerEntryStatus};

use crate::error::LedgerResult;

/// Balance view of one account at a given version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    /// Account version; bumped by every write to the account's entries
    pub version: u64,
    /// Sum of completed entries
    pub balance: i64,
    /// Sum of pending debits (zero or negative)
    pub pending_debits: i64,
}

impl AccountSnapshot {
    /// Credits that can still be reserved.
    pub fn available(&self) -> i64 {
        self.balance + self.pending_debits
    }

    /// Build a snapshot from an account's entries.
    pub fn from_entries<'a>(version: u64, entries: impl IntoIterator<Item = &'a CreditLedgerEntry>) -> Self {
        let mut snapshot = Self {
            version,
            ..Self::default()
        };
        for entry in entries {
            if entry.is_completed() {
                snapshot.balance += entry.amount;
            } else if entry.is_pending_debit() {
                snapshot.pending_debits += entry.amount;
            }
        }
        snapshot
    }
}

/// Row-level access to credit ledger entries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Current balance view and version of an account.
    async fn snapshot(&self, account_id: &str) -> LedgerResult<AccountSnapshot>;

    /// Insert `entry` only if the account is still at `expected_version`.
    ///
    /// Returns the new version, or `PreconditionFailed` if another writer
    /// got there first.
    async fn insert_if_version(&self, expected_version: u64, entry: CreditLedgerEntry) -> LedgerResult<u64>;

    /// Unconditional insert.
    async fn insert(&self, entry: CreditLedgerEntry) -> LedgerResult<()>;

    /// Change an entry's status.
    async fn update_status(&self, entry_id: &str, status: LedgerEntryStatus) -> LedgerResult<()>;

    /// All entries tagged with a job, in insertion order.
    async fn entries_for_job(&self, job_id: &str) -> LedgerResult<Vec<CreditLedgerEntry>>;

    /// All entries of an account, in insertion order.
    async fn entries_for_account(&self, account_id: &str) -> LedgerResult<Vec<CreditLedgerEntry>>;
}

/// Creator wallet persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn get(&self, creator_id: &str) -> LedgerResult<Option<CreatorWallet>>;

    /// Add net royalty earnings, creating the wallet if needed.
    async fn credit(&self, creator_id: &str, amount: i64) -> LedgerResult<CreatorWallet>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgen_models::LedgerEntryType;

    #[test]
    fn test_snapshot_counts_completed_and_pending_debits() {
        let purchase = CreditLedgerEntry::new(
            "u1",
            100,
            LedgerEntryType::Purchase,
            LedgerEntryStatus::Completed,
            "Credit Purchase",
        );
        let pending = CreditLedgerEntry::pending_debit("u1", "job-1", 30);
        let mut failed = CreditLedgerEntry::pending_debit("u1", "job-2", 50);
        failed.status = LedgerEntryStatus::Failed;

        let snapshot = AccountSnapshot::from_entries(3, [&purchase, &pending, &failed]);
        assert_eq!(snapshot.balance, 100);
        assert_eq!(snapshot.pending_debits, -30);
        assert_eq!(snapshot.available(), 70);
        assert_eq!(snapshot.version, 3);
    }
}
