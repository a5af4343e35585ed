//! Credit settlement for generation jobs.
//!
//! Settlement is a saga over two stores with no shared transaction:
//! reserve (pending debit) -> complete debit -> credit creator royalty, and on
//! royalty failure a compensating refund equal to the debit.
//!
//! # Key Features
//! - Atomic balance check plus pending debit using optimistic versioning
//! - At-most-once settlement and refund per job, keyed on the job's ledger entries
//! - Royalty minus platform fee posted to the creator wallet

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, error, info, warn};
use vgen_models::{
    CreatorWallet, CreditLedgerEntry, LedgerEntryStatus, LedgerEntryType, VideoJob,
    BPS_DENOMINATOR, PLATFORM_ACCOUNT_ID, PLATFORM_FEE_BPS,
};

use crate::error::{LedgerError, LedgerResult};
use crate::metrics;
use crate::store::{AccountSnapshot, LedgerStore, WalletStore};

// =============================================================================
// Constants
// =============================================================================

/// Maximum retries for the reservation (optimistic locking).
const MAX_RESERVE_RETRIES: u32 = 5;

/// Base delay for linear backoff on retry (milliseconds).
const RETRY_BASE_DELAY_MS: u64 = 50;

// =============================================================================
// Types
// =============================================================================

/// What to settle for a completed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementRequest {
    pub job_id: String,
    pub user_id: String,
    pub total_price: i64,
    pub creator_id: Option<String>,
    /// Royalty rate in basis points of the total price
    pub royalty_bps: u32,
}

impl SettlementRequest {
    pub fn for_job(job: &VideoJob) -> Self {
        Self {
            job_id: job.id.to_string(),
            user_id: job.user_id.clone(),
            total_price: job.total_price,
            creator_id: job.creator_id.clone(),
            royalty_bps: job.royalty_bps,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementStatus {
    /// Debit completed (and royalty posted, if any) by this call
    Settled,
    /// A previous call already settled the job; nothing changed
    AlreadySettled,
    /// The job's debit was refunded; nothing is charged
    AlreadyRefunded,
}

/// Result of a settlement call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementOutcome {
    pub status: SettlementStatus,
    /// User balance after settlement
    pub user_balance: i64,
    /// Creator lifetime earnings after settlement (0 without a creator)
    pub creator_earnings: i64,
    /// Net royalty credited by this call
    pub royalty_amount: i64,
    /// Platform fee recorded by this call
    pub platform_fee: i64,
}

impl SettlementOutcome {
    pub fn success(&self) -> bool {
        self.status != SettlementStatus::AlreadyRefunded
    }
}

/// Result of a refund call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundOutcome {
    Refunded { amount: i64 },
    AlreadyRefunded,
    /// No debit was ever recorded for the job
    NothingToRefund,
}

/// Gross royalty and platform fee for a price.
///
/// The royalty is floored; the fee is rounded up so any non-zero royalty
/// carries a non-zero fee. Integer arithmetic only.
pub fn royalty_split(total_price: i64, royalty_bps: u32, fee_bps: u32) -> (i64, i64) {
    let royalty = total_price.max(0) * i64::from(royalty_bps) / BPS_DENOMINATOR;
    let fee_numerator = royalty * i64::from(fee_bps);
    let fee = (fee_numerator + BPS_DENOMINATOR - 1) / BPS_DENOMINATOR;
    (royalty, fee.min(royalty))
}

// =============================================================================
// Settlement Service
// =============================================================================

/// Debits users and credits creators for generation jobs.
pub struct CreditSettlement {
    ledger: Arc<dyn LedgerStore>,
    wallets: Arc<dyn WalletStore>,
    in_flight: Mutex<HashSet<String>>,
}

/// Removes a job from the in-flight set when dropped.
struct JobGuard<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    job_id: String,
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|p| p.into_inner());
        in_flight.remove(&self.job_id);
    }
}

impl CreditSettlement {
    pub fn new(ledger: Arc<dyn LedgerStore>, wallets: Arc<dyn WalletStore>) -> Self {
        Self {
            ledger,
            wallets,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerStore> {
        &self.ledger
    }

    fn begin(&self, job_id: &str) -> LedgerResult<JobGuard<'_>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|p| p.into_inner());
        if !in_flight.insert(job_id.to_string()) {
            return Err(LedgerError::InProgress(job_id.to_string()));
        }
        Ok(JobGuard {
            in_flight: &self.in_flight,
            job_id: job_id.to_string(),
        })
    }

    /// Atomically check the available balance and record a pending debit.
    ///
    /// Uses the account version as an optimistic lock so two concurrent
    /// reservations never both pass the balance check against a stale read.
    pub async fn reserve(
        &self,
        user_id: &str,
        job_id: &str,
        price: i64,
        metadata: Option<HashMap<String, String>>,
    ) -> LedgerResult<CreditLedgerEntry> {
        if price < 0 {
            return Err(LedgerError::InvalidAmount(price));
        }

        let mut last_error = None;

        for attempt in 0..MAX_RESERVE_RETRIES {
            let snapshot = self.ledger.snapshot(user_id).await?;
            let available = snapshot.available();

            if available < price {
                info!(
                    user_id = %user_id,
                    job_id = %job_id,
                    required = price,
                    available,
                    "Insufficient credits"
                );
                metrics::record_reservation("insufficient");
                return Err(LedgerError::InsufficientCredits {
                    required: price,
                    available,
                });
            }

            let mut entry = CreditLedgerEntry::pending_debit(user_id, job_id, price);
            if let Some(meta) = metadata.clone() {
                entry = entry.with_metadata(meta);
            }

            match self.ledger.insert_if_version(snapshot.version, entry.clone()).await {
                Ok(_) => {
                    info!(
                        user_id = %user_id,
                        job_id = %job_id,
                        credits = price,
                        available_after = available - price,
                        "Reserved credits"
                    );
                    metrics::record_reservation("reserved");
                    return Ok(entry);
                }
                Err(e) if e.is_precondition_failed() => {
                    debug!(
                        user_id = %user_id,
                        attempt = attempt + 1,
                        "Reservation precondition failed, retrying"
                    );
                    metrics::record_reserve_retry();
                    last_error = Some(e);
                    let delay = Duration::from_millis(RETRY_BASE_DELAY_MS * (attempt as u64 + 1));
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "Failed to reserve credits");
                    return Err(e);
                }
            }
        }

        warn!(
            user_id = %user_id,
            retries = MAX_RESERVE_RETRIES,
            error = ?last_error,
            "Reservation failed after retries"
        );
        metrics::record_reservation("contention");
        Err(LedgerError::Contention(
            "failed to reserve credits due to concurrent updates".to_string(),
        ))
    }

    /// Settle a completed job. Calling it again for the same job is a no-op.
    pub async fn settle(&self, request: &SettlementRequest) -> LedgerResult<SettlementOutcome> {
        let _guard = self.begin(&request.job_id)?;

        let entries = self.ledger.entries_for_job(&request.job_id).await?;

        if entries.iter().any(|e| e.entry_type == LedgerEntryType::Refund) {
            debug!(job_id = %request.job_id, "Job already refunded, skipping settlement");
            return self
                .outcome(request, SettlementStatus::AlreadyRefunded, 0, 0)
                .await;
        }

        let existing = entries.iter().find(|e| {
            e.entry_type == LedgerEntryType::Debit
                && e.user_id == request.user_id
                && e.status != LedgerEntryStatus::Failed
        });

        let debit = match existing {
            Some(debit) if debit.is_completed() => {
                debug!(job_id = %request.job_id, "Job already settled");
                return self
                    .outcome(request, SettlementStatus::AlreadySettled, 0, 0)
                    .await;
            }
            Some(debit) => debit.clone(),
            None => {
                self.reserve(&request.user_id, &request.job_id, request.total_price, None)
                    .await?
            }
        };

        // Debit step
        self.ledger
            .update_status(&debit.id, LedgerEntryStatus::Completed)
            .await?;

        // Royalty step
        let (royalty, fee) = match &request.creator_id {
            Some(creator_id) => {
                let (gross, fee) = royalty_split(request.total_price, request.royalty_bps, PLATFORM_FEE_BPS);
                if gross > 0 {
                    if let Err(e) = self.post_royalty(request, creator_id, gross, fee).await {
                        return Err(self.roll_back(request, e).await);
                    }
                    (gross - fee, fee)
                } else {
                    (0, 0)
                }
            }
            None => (0, 0),
        };

        info!(
            job_id = %request.job_id,
            user_id = %request.user_id,
            debit = request.total_price,
            royalty,
            fee,
            "Settled job"
        );
        metrics::record_settlement("settled");

        self.outcome(request, SettlementStatus::Settled, royalty, fee)
            .await
    }

    /// Record the royalty and fee entries, then credit the creator wallet.
    ///
    /// The wallet is credited last so a failure anywhere leaves it untouched;
    /// entries already written are voided before the error is returned.
    async fn post_royalty(
        &self,
        request: &SettlementRequest,
        creator_id: &str,
        gross: i64,
        fee: i64,
    ) -> LedgerResult<CreatorWallet> {
        let net = gross - fee;

        let mut meta = HashMap::new();
        meta.insert("gross_royalty".to_string(), gross.to_string());
        meta.insert("royalty_bps".to_string(), request.royalty_bps.to_string());
        meta.insert("user_id".to_string(), request.user_id.clone());

        let royalty_entry = CreditLedgerEntry::new(
            creator_id,
            net,
            LedgerEntryType::Royalty,
            LedgerEntryStatus::Completed,
            LedgerEntryType::Royalty.label(),
        )
        .with_job_id(&request.job_id)
        .with_metadata(meta);

        let mut fee_meta = HashMap::new();
        fee_meta.insert("fee_bps".to_string(), PLATFORM_FEE_BPS.to_string());
        fee_meta.insert("creator_id".to_string(), creator_id.to_string());

        let fee_entry = CreditLedgerEntry::new(
            PLATFORM_ACCOUNT_ID,
            fee,
            LedgerEntryType::Fee,
            LedgerEntryStatus::Completed,
            LedgerEntryType::Fee.label(),
        )
        .with_job_id(&request.job_id)
        .with_metadata(fee_meta);

        let mut written = Vec::with_capacity(2);
        let result = async {
            for entry in [royalty_entry, fee_entry] {
                let id = entry.id.clone();
                self.ledger.insert(entry).await?;
                written.push(id);
            }
            self.wallets.credit(creator_id, net).await
        }
        .await;

        if result.is_err() {
            self.void_entries(&request.job_id, &written).await;
        }
        result
    }

    /// Mark entries of a failed royalty step as `Failed` so they no longer count.
    async fn void_entries(&self, job_id: &str, entry_ids: &[String]) {
        for entry_id in entry_ids {
            if let Err(e) = self
                .ledger
                .update_status(entry_id, LedgerEntryStatus::Failed)
                .await
            {
                error!(
                    job_id = %job_id,
                    entry_id = %entry_id,
                    error = %e,
                    "Failed to void royalty step entry"
                );
            }
        }
    }

    /// Compensate a failed royalty step with a refund equal to the debit.
    async fn roll_back(&self, request: &SettlementRequest, cause: LedgerError) -> LedgerError {
        warn!(
            job_id = %request.job_id,
            user_id = %request.user_id,
            error = %cause,
            "Royalty posting failed, refunding debit"
        );
        metrics::record_settlement("rolled_back");

        match self
            .refund_locked(&request.job_id, &request.user_id, "settlement rolled back")
            .await
        {
            Ok(_) => LedgerError::RolledBack {
                job_id: request.job_id.clone(),
                reason: cause.to_string(),
            },
            Err(e) => {
                error!(
                    job_id = %request.job_id,
                    user_id = %request.user_id,
                    error = %e,
                    "Compensating refund failed"
                );
                e
            }
        }
    }

    async fn outcome(
        &self,
        request: &SettlementRequest,
        status: SettlementStatus,
        royalty_amount: i64,
        platform_fee: i64,
    ) -> LedgerResult<SettlementOutcome> {
        let user_balance = self.ledger.snapshot(&request.user_id).await?.balance;
        let creator_earnings = match &request.creator_id {
            Some(creator_id) => self
                .wallets
                .get(creator_id)
                .await?
                .map(|w| w.total_earnings)
                .unwrap_or(0),
            None => 0,
        };
        Ok(SettlementOutcome {
            status,
            user_balance,
            creator_earnings,
            royalty_amount,
            platform_fee,
        })
    }

    /// Refund a job's debit. At most one refund is ever issued per job.
    pub async fn refund(&self, job_id: &str, user_id: &str, reason: &str) -> LedgerResult<RefundOutcome> {
        let _guard = self.begin(job_id)?;
        self.refund_locked(job_id, user_id, reason).await
    }

    async fn refund_locked(&self, job_id: &str, user_id: &str, reason: &str) -> LedgerResult<RefundOutcome> {
        let entries = self.ledger.entries_for_job(job_id).await?;

        if entries.iter().any(|e| e.entry_type == LedgerEntryType::Refund) {
            debug!(job_id = %job_id, "Refund already issued");
            return Ok(RefundOutcome::AlreadyRefunded);
        }

        let Some(debit) = entries.iter().find(|e| {
            e.entry_type == LedgerEntryType::Debit
                && e.user_id == user_id
                && e.status != LedgerEntryStatus::Failed
        }) else {
            return Ok(RefundOutcome::NothingToRefund);
        };

        let amount = -debit.amount;
        let refund = CreditLedgerEntry::new(
            user_id,
            amount,
            LedgerEntryType::Refund,
            LedgerEntryStatus::Completed,
            format!("Refund: {}", reason),
        )
        .with_job_id(job_id);

        // Refund first so the account never shows the debit without its refund.
        self.ledger.insert(refund).await?;
        if debit.status == LedgerEntryStatus::Pending {
            self.ledger
                .update_status(&debit.id, LedgerEntryStatus::Completed)
                .await?;
        }

        info!(job_id = %job_id, user_id = %user_id, amount, reason, "Refunded debit");
        metrics::record_refund();
        Ok(RefundOutcome::Refunded { amount })
    }

    /// Record purchased credits.
    pub async fn purchase(&self, user_id: &str, amount: i64) -> LedgerResult<CreditLedgerEntry> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let entry = CreditLedgerEntry::new(
            user_id,
            amount,
            LedgerEntryType::Purchase,
            LedgerEntryStatus::Completed,
            LedgerEntryType::Purchase.label(),
        );
        self.ledger.insert(entry.clone()).await?;
        info!(user_id = %user_id, amount, "Recorded credit purchase");
        Ok(entry)
    }

    pub async fn balance(&self, user_id: &str) -> LedgerResult<AccountSnapshot> {
        self.ledger.snapshot(user_id).await
    }

    /// Creator wallet, or an empty one if the creator has no earnings yet.
    pub async fn wallet(&self, creator_id: &str) -> LedgerResult<CreatorWallet> {
        Ok(self
            .wallets
            .get(creator_id)
            .await?
            .unwrap_or_else(|| CreatorWallet::new(creator_id)))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryLedgerStore, InMemoryWalletStore};
    use crate::store::{MockLedgerStore, MockWalletStore};

    fn settlement() -> (CreditSettlement, Arc<InMemoryLedgerStore>, Arc<InMemoryWalletStore>) {
        let ledger = Arc::new(InMemoryLedgerStore::new());
        let wallets = Arc::new(InMemoryWalletStore::new());
        (
            CreditSettlement::new(ledger.clone(), wallets.clone()),
            ledger,
            wallets,
        )
    }

    fn request(job_id: &str, creator: Option<&str>) -> SettlementRequest {
        SettlementRequest {
            job_id: job_id.to_string(),
            user_id: "user-1".to_string(),
            total_price: 100,
            creator_id: creator.map(str::to_string),
            royalty_bps: 1000,
        }
    }

    fn sum_for_user(entries: &[CreditLedgerEntry], user: &str) -> i64 {
        entries
            .iter()
            .filter(|e| e.user_id == user && e.is_completed())
            .map(|e| e.amount)
            .sum()
    }

    #[test]
    fn test_royalty_split() {
        assert_eq!(royalty_split(100, 1000, 250), (10, 1));
        assert_eq!(royalty_split(1000, 1000, 250), (100, 3));
        assert_eq!(royalty_split(4000, 1000, 250), (400, 10));
        assert_eq!(royalty_split(5, 1000, 250), (0, 0));
        assert_eq!(royalty_split(100, 0, 250), (0, 0));
    }

    #[tokio::test]
    async fn test_settle_with_creator() {
        let (settlement, ledger, wallets) = settlement();
        settlement.purchase("user-1", 200).await.unwrap();
        settlement.reserve("user-1", "job-1", 100, None).await.unwrap();

        let outcome = settlement.settle(&request("job-1", Some("creator-1"))).await.unwrap();
        assert_eq!(outcome.status, SettlementStatus::Settled);
        assert_eq!(outcome.user_balance, 100);
        assert_eq!(outcome.royalty_amount, 9);
        assert_eq!(outcome.platform_fee, 1);
        assert_eq!(outcome.creator_earnings, 9);

        let job_entries = ledger.entries_for_job("job-1").await.unwrap();
        let count = |t: LedgerEntryType| job_entries.iter().filter(|e| e.entry_type == t).count();
        assert_eq!(count(LedgerEntryType::Debit), 1);
        assert_eq!(count(LedgerEntryType::Royalty), 1);
        assert_eq!(count(LedgerEntryType::Fee), 1);
        assert!(job_entries.iter().all(|e| e.is_completed()));

        assert_eq!(ledger.snapshot(PLATFORM_ACCOUNT_ID).await.unwrap().balance, 1);
        assert_eq!(wallets.get("creator-1").await.unwrap().unwrap().balance, 9);
    }

    #[tokio::test]
    async fn test_settle_twice_is_noop() {
        let (settlement, ledger, wallets) = settlement();
        settlement.purchase("user-1", 200).await.unwrap();

        settlement.settle(&request("job-1", Some("creator-1"))).await.unwrap();
        let entries_before = ledger.len().await;

        let second = settlement.settle(&request("job-1", Some("creator-1"))).await.unwrap();
        assert_eq!(second.status, SettlementStatus::AlreadySettled);
        assert_eq!(second.user_balance, 100);
        assert_eq!(ledger.len().await, entries_before);
        assert_eq!(wallets.get("creator-1").await.unwrap().unwrap().total_earnings, 9);
    }

    #[tokio::test]
    async fn test_settle_without_creator() {
        let (settlement, ledger, _) = settlement();
        settlement.purchase("user-1", 100).await.unwrap();
        let outcome = settlement.settle(&request("job-1", None)).await.unwrap();
        assert_eq!(outcome.user_balance, 0);
        assert_eq!(ledger.entries_for_job("job-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_credits_writes_nothing() {
        let (settlement, ledger, _) = settlement();
        settlement.purchase("user-1", 40).await.unwrap();

        let err = settlement
            .reserve("user-1", "job-1", 100, None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientCredits {
                required: 100,
                available: 40
            }
        );
        assert!(ledger.entries_for_job("job-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pending_debits_reduce_available() {
        let (settlement, _, _) = settlement();
        settlement.purchase("user-1", 150).await.unwrap();
        settlement.reserve("user-1", "job-1", 100, None).await.unwrap();

        let err = settlement.reserve("user-1", "job-2", 100, None).await.unwrap_err();
        assert!(err.is_insufficient_credits());

        let snapshot = settlement.balance("user-1").await.unwrap();
        assert_eq!(snapshot.balance, 150);
        assert_eq!(snapshot.available(), 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_reservations_never_overdraw() {
        let (settlement, _, _) = settlement();
        settlement.purchase("user-1", 150).await.unwrap();

        let (a, b) = tokio::join!(
            settlement.reserve("user-1", "job-a", 100, None),
            settlement.reserve("user-1", "job-b", 100, None),
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        assert!(settlement.balance("user-1").await.unwrap().available() >= 0);
    }

    #[tokio::test]
    async fn test_wallet_failure_rolls_back_debit() {
        let ledger = Arc::new(InMemoryLedgerStore::new());
        let mut wallets = MockWalletStore::new();
        wallets
            .expect_credit()
            .times(1)
            .returning(|_, _| Err(LedgerError::wallet_unavailable("connection refused")));
        wallets.expect_get().returning(|_| Ok(None));
        let settlement = CreditSettlement::new(ledger.clone(), Arc::new(wallets));

        settlement.purchase("user-1", 200).await.unwrap();
        settlement.reserve("user-1", "job-1", 100, None).await.unwrap();

        let err = settlement
            .settle(&request("job-1", Some("creator-1")))
            .await
            .unwrap_err();
        assert!(err.is_rolled_back());

        let job_entries = ledger.entries_for_job("job-1").await.unwrap();
        assert_eq!(sum_for_user(&job_entries, "user-1"), 0);
        assert!(job_entries
            .iter()
            .filter(|e| e.entry_type == LedgerEntryType::Royalty)
            .all(|e| e.status == LedgerEntryStatus::Failed));
        assert_eq!(settlement.balance("user-1").await.unwrap().balance, 200);
        assert_eq!(settlement.balance("creator-1").await.unwrap().balance, 0);
        assert_eq!(settlement.balance(PLATFORM_ACCOUNT_ID).await.unwrap().balance, 0);

        // The refunded job can be neither settled nor refunded again.
        let again = settlement.settle(&request("job-1", Some("creator-1"))).await.unwrap();
        assert_eq!(again.status, SettlementStatus::AlreadyRefunded);
        assert!(!again.success());
        assert_eq!(
            settlement.refund("job-1", "user-1", "retry").await.unwrap(),
            RefundOutcome::AlreadyRefunded
        );
    }

    /// In-memory ledger that cannot record platform fee entries.
    struct FeeRejectingLedger(InMemoryLedgerStore);

    #[async_trait::async_trait]
    impl LedgerStore for FeeRejectingLedger {
        async fn snapshot(&self, account_id: &str) -> LedgerResult<AccountSnapshot> {
            self.0.snapshot(account_id).await
        }

        async fn insert_if_version(&self, expected_version: u64, entry: CreditLedgerEntry) -> LedgerResult<u64> {
            self.0.insert_if_version(expected_version, entry).await
        }

        async fn insert(&self, entry: CreditLedgerEntry) -> LedgerResult<()> {
            if entry.entry_type == LedgerEntryType::Fee {
                return Err(LedgerError::storage("fee table unavailable"));
            }
            self.0.insert(entry).await
        }

        async fn update_status(&self, entry_id: &str, status: LedgerEntryStatus) -> LedgerResult<()> {
            self.0.update_status(entry_id, status).await
        }

        async fn entries_for_job(&self, job_id: &str) -> LedgerResult<Vec<CreditLedgerEntry>> {
            self.0.entries_for_job(job_id).await
        }

        async fn entries_for_account(&self, account_id: &str) -> LedgerResult<Vec<CreditLedgerEntry>> {
            self.0.entries_for_account(account_id).await
        }
    }

    #[tokio::test]
    async fn test_fee_entry_failure_leaves_creator_unpaid() {
        let ledger = Arc::new(FeeRejectingLedger(InMemoryLedgerStore::new()));
        let wallets = Arc::new(InMemoryWalletStore::new());
        let settlement = CreditSettlement::new(ledger.clone(), wallets.clone());

        settlement.purchase("user-1", 200).await.unwrap();
        settlement.reserve("user-1", "job-1", 100, None).await.unwrap();

        let err = settlement
            .settle(&request("job-1", Some("creator-1")))
            .await
            .unwrap_err();
        assert!(err.is_rolled_back());

        assert_eq!(settlement.balance("user-1").await.unwrap().balance, 200);
        assert!(wallets.get("creator-1").await.unwrap().is_none());
        assert_eq!(settlement.balance("creator-1").await.unwrap().balance, 0);

        let royalties: Vec<_> = ledger
            .entries_for_job("job-1")
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.entry_type == LedgerEntryType::Royalty)
            .collect();
        assert_eq!(royalties.len(), 1);
        assert_eq!(royalties[0].status, LedgerEntryStatus::Failed);
    }

    #[tokio::test]
    async fn test_refund_pending_debit() {
        let (settlement, ledger, _) = settlement();
        settlement.purchase("user-1", 120).await.unwrap();
        settlement.reserve("user-1", "job-1", 100, None).await.unwrap();

        let outcome = settlement.refund("job-1", "user-1", "no scenes").await.unwrap();
        assert_eq!(outcome, RefundOutcome::Refunded { amount: 100 });

        let snapshot = settlement.balance("user-1").await.unwrap();
        assert_eq!(snapshot.balance, 120);
        assert_eq!(snapshot.available(), 120);
        assert_eq!(
            sum_for_user(&ledger.entries_for_job("job-1").await.unwrap(), "user-1"),
            0
        );

        assert_eq!(
            settlement.refund("job-1", "user-1", "again").await.unwrap(),
            RefundOutcome::AlreadyRefunded
        );
    }

    #[tokio::test]
    async fn test_refund_without_debit() {
        let (settlement, ledger, _) = settlement();
        assert_eq!(
            settlement.refund("job-x", "user-1", "cancelled").await.unwrap(),
            RefundOutcome::NothingToRefund
        );
        assert!(ledger.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reserve_retries_on_precondition_failure() {
        let mut ledger = MockLedgerStore::new();
        ledger.expect_snapshot().times(2).returning(|_| {
            Ok(AccountSnapshot {
                version: 1,
                balance: 100,
                pending_debits: 0,
            })
        });
        let mut calls = 0;
        ledger
            .expect_insert_if_version()
            .times(2)
            .returning(move |_, _| {
                calls += 1;
                if calls == 1 {
                    Err(LedgerError::PreconditionFailed("stale".into()))
                } else {
                    Ok(2)
                }
            });

        let settlement = CreditSettlement::new(Arc::new(ledger), Arc::new(InMemoryWalletStore::new()));
        let entry = settlement.reserve("user-1", "job-1", 60, None).await.unwrap();
        assert_eq!(entry.amount, -60);
        assert!(entry.is_pending_debit());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reserve_gives_up_after_retries() {
        let mut ledger = MockLedgerStore::new();
        ledger
            .expect_snapshot()
            .returning(|_| Ok(AccountSnapshot { version: 1, balance: 100, pending_debits: 0 }));
        ledger
            .expect_insert_if_version()
            .times(5)
            .returning(|_, _| Err(LedgerError::PreconditionFailed("stale".into())));

        let settlement = CreditSettlement::new(Arc::new(ledger), Arc::new(InMemoryWalletStore::new()));
        let err = settlement.reserve("user-1", "job-1", 60, None).await.unwrap_err();
        assert!(matches!(err, LedgerError::Contention(_)));
    }

    #[tokio::test]
    async fn test_purchase_rejects_non_positive() {
        let (settlement, _, _) = settlement();
        assert_eq!(
            settlement.purchase("user-1", 0).await.unwrap_err(),
            LedgerError::InvalidAmount(0)
        );
    }
}
