use crate::error::{Error, Result};
use crate::rewards::Essence;
use serde::{Deserialize, Serialize};

/// Per-user crafting resource counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Essences {
    pub focus: u64,
    pub creativity: u64,
    pub discipline: u64,
}

/// Account aggregate: coin balance plus gamification counters.
///
/// Invariants:
/// - `coin_balance` is never observed negative by a committed operation
/// - `xp` and essence counters are monotonic
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    /// Spendable coins held by the account
    pub coin_balance: u64,

    /// Experience points, only ever increasing
    pub xp: u64,

    /// Crafting resources granted on task completion
    pub essences: Essences,
}

impl Account {
    /// Create a new account with zero balance and counters
    pub fn new() -> Self {
        Account {
            coin_balance: 0,
            xp: 0,
            essences: Essences::default(),
        }
    }

    /// Create an account with an initial coin balance
    pub fn with_balance(coin_balance: u64) -> Self {
        Account {
            coin_balance,
            ..Account::new()
        }
    }

    /// Add coins to the balance (deposit, escrow release, refund).
    ///
    /// Returns the new balance.
    pub fn credit(&mut self, amount: u64) -> u64 {
        self.coin_balance = self.coin_balance.saturating_add(amount);
        self.coin_balance
    }

    /// Conditionally remove coins: the balance check and the decrement are
    /// one step, so a committed debit can never overdraw.
    pub fn debit(&mut self, amount: u64) -> Result<u64> {
        if self.coin_balance < amount {
            return Err(Error::InsufficientFunds {
                have: self.coin_balance,
                need: amount,
            });
        }
        self.coin_balance -= amount;
        Ok(self.coin_balance)
    }

    pub fn has_sufficient_balance(&self, amount: u64) -> bool {
        self.coin_balance >= amount
    }

    /// Grant experience points
    pub fn grant_xp(&mut self, amount: u64) {
        self.xp = self.xp.saturating_add(amount);
    }

    /// Increment the counter for a drawn essence
    pub fn grant_essence(&mut self, essence: Essence) {
        match essence {
            Essence::Focus => self.essences.focus += 1,
            Essence::Creativity => self.essences.creativity += 1,
            Essence::Discipline => self.essences.discipline += 1,
        }
    }

    pub fn balance(&self) -> u64 {
        self.coin_balance
    }
}

impl Default for Account {
    fn default() -> Self {
        Account::new()
    }
}
