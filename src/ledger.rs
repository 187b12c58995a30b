//! Append-only transaction ledger.
//!
//! The ledger is the source of truth for audit; an account's `coin_balance`
//! is a materialized projection of it and must always reconcile:
//! `coin_balance = initial + Σ(Deposit, EscrowRelease) − Σ(Withdraw, EscrowLock)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction-tagged kinds of balance-affecting entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    /// Funds entering the account (external payment, refund).
    Deposit,
    /// Funds leaving the account (stake increase).
    Withdraw,
    /// Funds committed to a task's escrow at creation.
    EscrowLock,
    /// Escrowed funds released to the fulfiller on completion.
    EscrowRelease,
}

impl EntryKind {
    /// True if this kind adds to the balance.
    pub fn is_credit(&self) -> bool {
        matches!(self, EntryKind::Deposit | EntryKind::EscrowRelease)
    }
}

/// A single immutable ledger entry. Never updated or deleted once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: String,
    pub kind: EntryKind,
    /// Strictly positive; direction is carried by `kind`.
    pub amount: u64,
    pub task_ref: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

/// Append-only record of every balance-affecting event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    entries: Vec<Transaction>,
}

impl Ledger {
    pub fn new() -> Self {
        Ledger { entries: Vec::new() }
    }

    /// Append an entry. Always called in the same atomic unit as the balance
    /// mutation it documents, never independently.
    pub fn append(
        &mut self,
        user_id: &str,
        kind: EntryKind,
        amount: u64,
        task_ref: Option<Uuid>,
        description: impl Into<String>,
    ) -> &Transaction {
        self.entries.push(Transaction {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            kind,
            amount,
            task_ref,
            timestamp: Utc::now(),
            description: description.into(),
        });
        self.entries.last().expect("entry just pushed")
    }

    pub fn entries(&self) -> &[Transaction] {
        &self.entries
    }

    pub fn entries_for(&self, user_id: &str) -> Vec<&Transaction> {
        self.entries.iter().filter(|t| t.user_id == user_id).collect()
    }

    /// Replay a user's full history to a balance, from `initial`.
    ///
    /// Returns None if the history would drive the balance negative at any
    /// point, which would mean a committed operation overdrew the account.
    pub fn reconciled_balance(&self, user_id: &str, initial: u64) -> Option<u64> {
        let mut balance = initial;
        for entry in self.entries.iter().filter(|t| t.user_id == user_id) {
            if entry.kind.is_credit() {
                balance = balance.checked_add(entry.amount)?;
            } else {
                balance = balance.checked_sub(entry.amount)?;
            }
        }
        Some(balance)
    }
}
