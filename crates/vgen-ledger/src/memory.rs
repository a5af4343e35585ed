//! In-memory ledger and wallet stores.
//!
//! Each store keeps its state behind one async mutex, so every operation is
//! atomic with respect to the others.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use vgen_models::{CreatorWallet, CreditLedgerEntry, LedgerEntryStatus};

use crate::error::{LedgerError, LedgerResult};
use crate::store::{AccountSnapshot, LedgerStore, WalletStore};

#[derive(Debug, Default)]
struct LedgerState {
    entries: Vec<CreditLedgerEntry>,
    versions: HashMap<String, u64>,
}

impl LedgerState {
    fn version(&self, account_id: &str) -> u64 {
        self.versions.get(account_id).copied().unwrap_or(0)
    }

    fn bump(&mut self, account_id: &str) -> u64 {
        let version = self.versions.entry(account_id.to_string()).or_insert(0);
        *version += 1;
        *version
    }

    fn snapshot(&self, account_id: &str) -> AccountSnapshot {
        AccountSnapshot::from_entries(
            self.version(account_id),
            self.entries.iter().filter(|e| e.user_id == account_id),
        )
    }
}

/// Ledger store backed by a vector of entries.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: Mutex<LedgerState>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries across all accounts.
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn snapshot(&self, account_id: &str) -> LedgerResult<AccountSnapshot> {
        Ok(self.state.lock().await.snapshot(account_id))
    }

    async fn insert_if_version(&self, expected_version: u64, entry: CreditLedgerEntry) -> LedgerResult<u64> {
        let mut state = self.state.lock().await;
        let current = state.version(&entry.user_id);
        if current != expected_version {
            return Err(LedgerError::PreconditionFailed(format!(
                "account {} at version {}, expected {}",
                entry.user_id, current, expected_version
            )));
        }
        let version = state.bump(&entry.user_id);
        state.entries.push(entry);
        Ok(version)
    }

    async fn insert(&self, entry: CreditLedgerEntry) -> LedgerResult<()> {
        let mut state = self.state.lock().await;
        state.bump(&entry.user_id);
        state.entries.push(entry);
        Ok(())
    }

    async fn update_status(&self, entry_id: &str, status: LedgerEntryStatus) -> LedgerResult<()> {
        let mut state = self.state.lock().await;
        let entry = state
            .entries
            .iter_mut()
            .find(|e| e.id == entry_id)
            .ok_or_else(|| LedgerError::not_found(entry_id))?;
        entry.status = status;
        entry.updated_at = Utc::now();
        let account = entry.user_id.clone();
        state.bump(&account);
        Ok(())
    }

    async fn entries_for_job(&self, job_id: &str) -> LedgerResult<Vec<CreditLedgerEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.is_for_job(job_id))
            .cloned()
            .collect())
    }

    async fn entries_for_account(&self, account_id: &str) -> LedgerResult<Vec<CreditLedgerEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.user_id == account_id)
            .cloned()
            .collect())
    }
}

/// Wallet store backed by a map.
#[derive(Debug, Default)]
pub struct InMemoryWalletStore {
    wallets: Mutex<HashMap<String, CreatorWallet>>,
}

impl InMemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalletStore for InMemoryWalletStore {
    async fn get(&self, creator_id: &str) -> LedgerResult<Option<CreatorWallet>> {
        Ok(self.wallets.lock().await.get(creator_id).cloned())
    }

    async fn credit(&self, creator_id: &str, amount: i64) -> LedgerResult<CreatorWallet> {
        let mut wallets = self.wallets.lock().await;
        let wallet = wallets
            .entry(creator_id.to_string())
            .or_insert_with(|| CreatorWallet::new(creator_id));
        wallet.credit(amount);
        Ok(wallet.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgen_models::LedgerEntryType;

    fn purchase(user: &str, amount: i64) -> CreditLedgerEntry {
        CreditLedgerEntry::new(
            user,
            amount,
            LedgerEntryType::Purchase,
            LedgerEntryStatus::Completed,
            "Credit Purchase",
        )
    }

    #[tokio::test]
    async fn test_conditional_insert_rejects_stale_version() {
        let store = InMemoryLedgerStore::new();
        store.insert(purchase("u1", 100)).await.unwrap();

        let snapshot = store.snapshot("u1").await.unwrap();
        assert_eq!(snapshot.version, 1);

        let debit = CreditLedgerEntry::pending_debit("u1", "job-1", 40);
        assert_eq!(store.insert_if_version(1, debit).await.unwrap(), 2);

        let stale = CreditLedgerEntry::pending_debit("u1", "job-2", 40);
        let err = store.insert_if_version(1, stale).await.unwrap_err();
        assert!(err.is_precondition_failed());

        let snapshot = store.snapshot("u1").await.unwrap();
        assert_eq!(snapshot.available(), 60);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_update_status_and_queries() {
        let store = InMemoryLedgerStore::new();
        store.insert(purchase("u1", 50)).await.unwrap();
        let debit = CreditLedgerEntry::pending_debit("u1", "job-1", 20);
        let debit_id = debit.id.clone();
        store.insert(debit).await.unwrap();

        store
            .update_status(&debit_id, LedgerEntryStatus::Completed)
            .await
            .unwrap();
        let snapshot = store.snapshot("u1").await.unwrap();
        assert_eq!(snapshot.balance, 30);
        assert_eq!(snapshot.pending_debits, 0);

        assert_eq!(store.entries_for_job("job-1").await.unwrap().len(), 1);
        assert_eq!(store.entries_for_account("u1").await.unwrap().len(), 2);
        assert!(store
            .update_status("missing", LedgerEntryStatus::Failed)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_wallet_credit_accumulates() {
        let wallets = InMemoryWalletStore::new();
        assert!(wallets.get("c1").await.unwrap().is_none());
        wallets.credit("c1", 9).await.unwrap();
        let wallet = wallets.credit("c1", 1).await.unwrap();
        assert_eq!(wallet.balance, 10);
        assert_eq!(wallet.total_earnings, 10);
    }
}
