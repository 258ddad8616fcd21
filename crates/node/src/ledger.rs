//! A staged ledger taking part in two-phase commits.
//!
//! `prepare` reserves an entry and checks the account would not go
//! negative, `commit` makes it permanent, `abort` drops the reservation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::RwLock;
use two_phase::{PhaseActions, PhaseResult};

/// A movement on one account, identified by a caller-chosen reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub reference: String,
    pub account: String,
    /// Positive credits the account, negative debits it.
    pub amount: i64,
}

/// Phase payload: the entry plus the orchestrator's context on abort.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerPhaseData {
    #[serde(flatten)]
    pub entry: LedgerEntry,
    #[serde(default)]
    pub ctx: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommittedEntry {
    #[serde(flatten)]
    pub entry: LedgerEntry,
    pub committed_at: DateTime<Utc>,
}

#[derive(Default)]
struct Book {
    staged: HashMap<String, LedgerEntry>,
    committed: Vec<CommittedEntry>,
}

impl Book {
    fn committed_balance(&self, account: &str) -> i128 {
        self.committed
            .iter()
            .filter(|c| c.entry.account == account)
            .map(|c| i128::from(c.entry.amount))
            .sum()
    }

    /// Sums of the staged debits and staged credits on `account`.
    fn staged_totals(&self, account: &str) -> (i128, i128) {
        self.staged
            .values()
            .filter(|e| e.account == account)
            .map(|e| i128::from(e.amount))
            .fold((0, 0), |(debits, credits), amount| {
                if amount < 0 {
                    (debits + amount, credits)
                } else {
                    (debits, credits + amount)
                }
            })
    }

    fn is_known(&self, reference: &str) -> bool {
        self.staged.contains_key(reference)
            || self.committed.iter().any(|c| c.entry.reference == reference)
    }
}

#[derive(Default)]
pub struct StagedLedger {
    book: RwLock<Book>,
}

impl StagedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commits `entry` directly, bypassing the protocol.
    pub async fn seed(&self, entry: LedgerEntry) {
        self.book.write().await.committed.push(CommittedEntry {
            entry,
            committed_at: Utc::now(),
        });
    }

    /// Committed balance, saturating at the `i64` bounds.
    pub async fn balance(&self, account: &str) -> i64 {
        let balance = self.book.read().await.committed_balance(account);
        i64::try_from(balance).unwrap_or(if balance < 0 { i64::MIN } else { i64::MAX })
    }

    pub async fn committed(&self) -> Vec<CommittedEntry> {
        self.book.read().await.committed.clone()
    }

    /// Staged entries, ordered by reference.
    pub async fn staged(&self) -> Vec<LedgerEntry> {
        let mut staged: Vec<_> = self.book.read().await.staged.values().cloned().collect();
        staged.sort_by(|a, b| a.reference.cmp(&b.reference));
        staged
    }
}

fn refusal(entry: &LedgerEntry, reason: &str) -> PhaseResult {
    PhaseResult::failed().with_ctx(json!({
        "reference": entry.reference,
        "account": entry.account,
        "reason": reason,
    }))
}

#[async_trait]
impl PhaseActions for StagedLedger {
    type Data = LedgerPhaseData;

    async fn prepare(&self, data: LedgerPhaseData) -> PhaseResult {
        let entry = data.entry;
        let mut book = self.book.write().await;

        if entry.amount == 0 {
            return refusal(&entry, "zero amount");
        }
        if book.is_known(&entry.reference) {
            return refusal(&entry, "duplicate reference");
        }

        // Every outcome of the staged entries must keep the balance in range.
        let committed = book.committed_balance(&entry.account);
        let (debits, credits) = book.staged_totals(&entry.account);
        let amount = i128::from(entry.amount);
        let lowest = committed + debits + amount.min(0);
        let highest = committed + credits + amount.max(0);
        if highest > i128::from(i64::MAX) || lowest < i128::from(i64::MIN) {
            return refusal(&entry, "amount out of range");
        }
        if amount < 0 && lowest < 0 {
            return refusal(&entry, "insufficient funds");
        }

        tracing::debug!(reference = %entry.reference, "entry staged");
        book.staged.insert(entry.reference.clone(), entry);
        PhaseResult::ok()
    }

    async fn commit(&self, data: LedgerPhaseData) -> PhaseResult {
        let mut book = self.book.write().await;
        let Some(entry) = book.staged.remove(&data.entry.reference) else {
            return refusal(&data.entry, "nothing staged");
        };

        metrics::counter!("ledger_entries_committed_total").increment(1);
        book.committed.push(CommittedEntry {
            entry,
            committed_at: Utc::now(),
        });
        PhaseResult::ok()
    }

    async fn abort(&self, data: LedgerPhaseData) -> PhaseResult {
        let dropped = self
            .book
            .write()
            .await
            .staged
            .remove(&data.entry.reference)
            .is_some();
        tracing::info!(
            reference = %data.entry.reference,
            dropped,
            ctx = ?data.ctx,
            "transaction aborted"
        );
        PhaseResult::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(reference: &str, account: &str, amount: i64) -> LedgerPhaseData {
        LedgerPhaseData {
            entry: LedgerEntry {
                reference: reference.to_string(),
                account: account.to_string(),
                amount,
            },
            ctx: None,
        }
    }

    #[tokio::test]
    async fn test_prepare_then_commit_applies_entry() {
        let ledger = StagedLedger::new();

        assert!(ledger.prepare(data("t1", "alice", 100)).await.success);
        assert_eq!(ledger.staged().await.len(), 1);
        assert_eq!(ledger.balance("alice").await, 0);

        assert!(ledger.commit(data("t1", "alice", 100)).await.success);
        assert!(ledger.staged().await.is_empty());
        assert_eq!(ledger.balance("alice").await, 100);
    }

    #[tokio::test]
    async fn test_abort_discards_staged_entry() {
        let ledger = StagedLedger::new();
        ledger.prepare(data("t1", "alice", 100)).await;

        assert!(ledger.abort(data("t1", "alice", 100)).await.success);
        assert!(ledger.staged().await.is_empty());
        assert!(ledger.committed().await.is_empty());
    }

    #[tokio::test]
    async fn test_abort_without_prepare_succeeds() {
        let ledger = StagedLedger::new();
        assert!(ledger.abort(data("t1", "alice", 100)).await.success);
    }

    #[tokio::test]
    async fn test_debit_beyond_balance_is_refused() {
        let ledger = StagedLedger::new();
        ledger
            .seed(LedgerEntry {
                reference: "seed".to_string(),
                account: "alice".to_string(),
                amount: 50,
            })
            .await;

        let result = ledger.prepare(data("t1", "alice", -80)).await;
        assert!(!result.success);
        assert_eq!(result.ctx.unwrap()["reason"], "insufficient funds");
    }

    #[tokio::test]
    async fn test_staged_debits_reserve_funds() {
        let ledger = StagedLedger::new();
        ledger
            .seed(LedgerEntry {
                reference: "seed".to_string(),
                account: "alice".to_string(),
                amount: 100,
            })
            .await;

        assert!(ledger.prepare(data("t1", "alice", -60)).await.success);
        assert!(!ledger.prepare(data("t2", "alice", -60)).await.success);
    }

    #[tokio::test]
    async fn test_credit_past_i64_range_is_refused() {
        let ledger = StagedLedger::new();
        assert!(ledger.prepare(data("t1", "x", i64::MAX)).await.success);
        assert!(ledger.commit(data("t1", "x", i64::MAX)).await.success);

        let result = ledger.prepare(data("t2", "x", i64::MAX)).await;
        assert!(!result.success);
        assert_eq!(result.ctx.unwrap()["reason"], "amount out of range");
        assert_eq!(ledger.balance("x").await, i64::MAX);

        // Staged credits count too, even before they commit.
        let ledger = StagedLedger::new();
        assert!(ledger.prepare(data("t1", "y", i64::MAX - 1)).await.success);
        let result = ledger.prepare(data("t2", "y", 2)).await;
        assert_eq!(result.ctx.unwrap()["reason"], "amount out of range");
        assert!(ledger.prepare(data("t3", "y", 1)).await.success);
    }

    #[tokio::test]
    async fn test_balance_saturates_for_seeded_overflow() {
        let ledger = StagedLedger::new();
        for reference in ["s1", "s2"] {
            ledger
                .seed(LedgerEntry {
                    reference: reference.to_string(),
                    account: "x".to_string(),
                    amount: i64::MAX,
                })
                .await;
        }
        assert_eq!(ledger.balance("x").await, i64::MAX);
    }

    #[tokio::test]
    async fn test_duplicate_reference_is_refused() {
        let ledger = StagedLedger::new();
        ledger.prepare(data("t1", "alice", 10)).await;
        ledger.commit(data("t1", "alice", 10)).await;

        let result = ledger.prepare(data("t1", "alice", 10)).await;
        assert_eq!(result.ctx.unwrap()["reason"], "duplicate reference");
    }

    #[tokio::test]
    async fn test_commit_without_prepare_fails() {
        let ledger = StagedLedger::new();
        let result = ledger.commit(data("t1", "alice", 10)).await;
        assert!(!result.success);
        assert_eq!(result.ctx.unwrap()["reason"], "nothing staged");
    }

    #[test]
    fn test_phase_data_carries_ctx() {
        let data: LedgerPhaseData = serde_json::from_value(json!({
            "reference": "t1",
            "account": "alice",
            "amount": 5,
            "ctx": "Server error"
        }))
        .unwrap();
        assert_eq!(data.entry.account, "alice");
        assert_eq!(data.ctx, Some(json!("Server error")));
    }
}
