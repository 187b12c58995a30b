pub mod account;
pub mod duel;
pub mod escrow;
pub mod task;

pub use account::{Account, Essences};
pub use duel::{Duel, DuelKind, DuelStatus, DuelUpdate, Side};
pub use escrow::{CompletionOutcome, TaskPatch};
pub use task::{Task, TaskMeta, TaskStatus};

use crate::ledger::Ledger;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Core domain state: all accounts, tasks, duels, and the ledger.
///
/// Mutated only through the operations in `escrow` and `duel`; the engine
/// serializes those mutations behind its state lock.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct State {
    /// All accounts indexed by user id
    pub accounts: HashMap<String, Account>,

    /// All tasks indexed by task id
    pub tasks: HashMap<Uuid, Task>,

    /// All duels indexed by duel id
    pub duels: HashMap<Uuid, Duel>,

    /// Append-only audit record of every balance mutation
    pub ledger: Ledger,
}

impl State {
    /// Create empty state
    pub fn new() -> Self {
        State::default()
    }

    /// Get or create an account (returns mutable reference)
    pub fn get_or_create_account(&mut self, user_id: &str) -> &mut Account {
        self.accounts.entry(user_id.to_string()).or_default()
    }

    /// Get account (returns Option)
    pub fn get_account(&self, user_id: &str) -> Option<&Account> {
        self.accounts.get(user_id)
    }

    /// Get account mutably (returns Option)
    pub fn get_account_mut(&mut self, user_id: &str) -> Option<&mut Account> {
        self.accounts.get_mut(user_id)
    }

    /// All tasks created by a user
    pub fn tasks_by(&self, user_id: &str) -> Vec<&Task> {
        self.tasks.values().filter(|t| t.creator == user_id).collect()
    }

    /// All duels a user participates in
    pub fn duels_of(&self, user_id: &str) -> Vec<&Duel> {
        self.duels.values().filter(|d| d.involves(user_id)).collect()
    }
}
