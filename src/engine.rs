//! Engine facade: the stable operation surface of the economy core.
//!
//! Every entry point receives an already-authenticated caller id and performs
//! only authorization checks. Mutating operations hold the state write lock
//! for their whole validate-and-apply step, making each check-and-mutate
//! indivisible with respect to concurrent callers on the same entity. Events
//! are emitted after the mutation commits and are strictly best-effort.

use crate::error::{Error, Result};
use crate::events::{EventSink, NoOpSink, DUEL_CHANNEL, TASK_CHANNEL};
use crate::ledger::Transaction;
use crate::state::{
    duel, escrow, Account, CompletionOutcome, Duel, DuelKind, DuelUpdate, State, Task, TaskMeta,
    TaskPatch,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::{Arc, RwLock};
use tracing::warn;
use uuid::Uuid;

pub struct Engine {
    state: Arc<RwLock<State>>,
    events: Arc<dyn EventSink>,
}

impl Engine {
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        Engine {
            state: Arc::new(RwLock::new(State::new())),
            events,
        }
    }

    /// Engine with a discarding sink, for callers that do not broadcast.
    pub fn without_events() -> Self {
        Engine::new(Arc::new(NoOpSink))
    }

    /// Engine over previously persisted state.
    pub fn with_state(state: State, events: Arc<dyn EventSink>) -> Self {
        Engine {
            state: Arc::new(RwLock::new(state)),
            events,
        }
    }

    /// Snapshot of the current state, for persistence.
    pub fn snapshot(&self) -> State {
        self.state.read().expect("state lock poisoned").clone()
    }

    /// Fire-and-forget publication: failures are logged and discarded.
    fn emit(&self, channel: &str, payload: Value) {
        if let Err(e) = self.events.publish(channel, &payload) {
            warn!(channel, error = %e, "Event publish failed, continuing");
        }
    }

    // ---- deposits -------------------------------------------------------

    /// Record a verified external payment: credit the account and append a
    /// deposit entry. Verification happens upstream.
    pub fn deposit(&self, user_id: &str, amount: u64, description: &str) -> Result<u64> {
        let mut state = self.state.write().expect("state lock poisoned");
        escrow::deposit(&mut state, user_id, amount, description)
    }

    // ---- task lifecycle -------------------------------------------------

    pub fn create_task(
        &self,
        creator: &str,
        coins: u64,
        meta: TaskMeta,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<Task> {
        let task = {
            let mut state = self.state.write().expect("state lock poisoned");
            escrow::create_task(&mut state, creator, coins, meta, deadline)?
        };
        self.emit(
            TASK_CHANNEL,
            json!({"event": "created", "task_id": task.id, "creator": task.creator, "coins": task.coins}),
        );
        Ok(task)
    }

    pub fn apply_for_task(&self, task_id: Uuid, user_id: &str) -> Result<Task> {
        let task = {
            let mut state = self.state.write().expect("state lock poisoned");
            escrow::apply_for_task(&mut state, task_id, user_id)?
        };
        self.emit(
            TASK_CHANNEL,
            json!({"event": "applied", "task_id": task_id, "applicant": user_id}),
        );
        Ok(task)
    }

    pub fn assign_task(&self, task_id: Uuid, caller: &str, assignee: &str) -> Result<Task> {
        let task = {
            let mut state = self.state.write().expect("state lock poisoned");
            escrow::assign_task(&mut state, task_id, caller, assignee)?
        };
        self.emit(
            TASK_CHANNEL,
            json!({"event": "assigned", "task_id": task_id, "assignee": assignee}),
        );
        Ok(task)
    }

    /// Complete a task, then forward the completion to the duel state machine
    /// as a progress increment for the fulfiller's task-sprint duels. The two
    /// state machines only meet here, through the completion outcome value.
    pub fn complete_task(&self, task_id: Uuid, caller: &str) -> Result<Task> {
        let (outcome, duel_updates) = {
            let mut state = self.state.write().expect("state lock poisoned");
            let outcome =
                escrow::complete_task(&mut state, task_id, caller, &mut rand::thread_rng())?;
            let updates =
                duel::increment_progress(&mut state, &outcome.fulfiller, DuelKind::TaskSprint, 1)?;
            (outcome, updates)
        };
        self.emit_completion(&outcome);
        for (d, update) in &duel_updates {
            self.emit_duel_update(d, *update);
        }
        Ok(outcome.task)
    }

    fn emit_completion(&self, outcome: &CompletionOutcome) {
        self.emit(
            TASK_CHANNEL,
            json!({
                "event": "completed",
                "task_id": outcome.task.id,
                "fulfiller": outcome.fulfiller,
                "payout": outcome.payout,
                "xp": outcome.fulfiller_xp,
                "essence": outcome.essence,
            }),
        );
    }

    fn emit_duel_update(&self, d: &Duel, update: DuelUpdate) {
        match update {
            DuelUpdate::Won => self.emit(
                DUEL_CHANNEL,
                json!({"event": "completed", "duel_id": d.id, "winner": d.winner}),
            ),
            DuelUpdate::Progressed => self.emit(
                DUEL_CHANNEL,
                json!({
                    "event": "progress",
                    "duel_id": d.id,
                    "challenger_progress": d.challenger_progress,
                    "opponent_progress": d.opponent_progress,
                }),
            ),
            DuelUpdate::NoOp => {}
        }
    }

    pub fn update_task(&self, task_id: Uuid, caller: &str, patch: TaskPatch) -> Result<Task> {
        let task = {
            let mut state = self.state.write().expect("state lock poisoned");
            escrow::update_task(&mut state, task_id, caller, patch)?
        };
        self.emit(
            TASK_CHANNEL,
            json!({"event": "updated", "task_id": task_id, "coins": task.coins}),
        );
        Ok(task)
    }

    pub fn delete_task(&self, task_id: Uuid, caller: &str) -> Result<Task> {
        let task = {
            let mut state = self.state.write().expect("state lock poisoned");
            escrow::delete_task(&mut state, task_id, caller)?
        };
        self.emit(
            TASK_CHANNEL,
            json!({"event": "deleted", "task_id": task_id, "refund": task.coins}),
        );
        Ok(task)
    }

    // ---- duels ----------------------------------------------------------

    pub fn create_duel(
        &self,
        challenger: &str,
        opponent: &str,
        kind: DuelKind,
        target: u64,
        is_shadow: bool,
        baseline: Option<u64>,
    ) -> Result<Duel> {
        let d = {
            let mut state = self.state.write().expect("state lock poisoned");
            duel::create_duel(&mut state, challenger, opponent, kind, target, is_shadow, baseline)?
        };
        self.emit(
            DUEL_CHANNEL,
            json!({
                "event": "challenged",
                "duel_id": d.id,
                "challenger": d.challenger,
                "opponent": d.opponent,
                "target": d.target,
                "shadow": d.is_shadow,
            }),
        );
        Ok(d)
    }

    pub fn respond_to_duel(&self, duel_id: Uuid, opponent: &str, accept: bool) -> Result<Duel> {
        let d = {
            let mut state = self.state.write().expect("state lock poisoned");
            duel::respond_to_duel(&mut state, duel_id, opponent, accept)?
        };
        let event = if accept { "accepted" } else { "rejected" };
        self.emit(DUEL_CHANNEL, json!({"event": event, "duel_id": duel_id}));
        Ok(d)
    }

    pub fn cancel_duel(&self, duel_id: Uuid, challenger: &str) -> Result<Duel> {
        let d = {
            let mut state = self.state.write().expect("state lock poisoned");
            duel::cancel_duel(&mut state, duel_id, challenger)?
        };
        self.emit(DUEL_CHANNEL, json!({"event": "cancelled", "duel_id": duel_id}));
        Ok(d)
    }

    /// Client-driven update carrying the caller's absolute progress value.
    pub fn update_progress(&self, duel_id: Uuid, user_id: &str, progress: u64) -> Result<Duel> {
        let (d, update) = {
            let mut state = self.state.write().expect("state lock poisoned");
            duel::update_progress(&mut state, duel_id, user_id, progress)?
        };
        self.emit_duel_update(&d, update);
        Ok(d)
    }

    /// Integration entry point for progress-relevant events from any
    /// subsystem: bumps the user's progress in every active duel of `kind`.
    pub fn increment_duel_progress(
        &self,
        user_id: &str,
        kind: DuelKind,
        amount: u64,
    ) -> Result<Vec<Duel>> {
        let updates = {
            let mut state = self.state.write().expect("state lock poisoned");
            duel::increment_progress(&mut state, user_id, kind, amount)?
        };
        for (d, update) in &updates {
            self.emit_duel_update(d, *update);
        }
        Ok(updates.into_iter().map(|(d, _)| d).collect())
    }

    // ---- read surface ---------------------------------------------------

    pub fn account(&self, user_id: &str) -> Result<Account> {
        let state = self.state.read().expect("state lock poisoned");
        state
            .get_account(user_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Account {} does not exist", user_id)))
    }

    pub fn task(&self, task_id: Uuid) -> Result<Task> {
        let state = self.state.read().expect("state lock poisoned");
        state
            .tasks
            .get(&task_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Task {} does not exist", task_id)))
    }

    pub fn duel(&self, duel_id: Uuid) -> Result<Duel> {
        let state = self.state.read().expect("state lock poisoned");
        state
            .duels
            .get(&duel_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Duel {} does not exist", duel_id)))
    }

    pub fn tasks_by(&self, user_id: &str) -> Vec<Task> {
        let state = self.state.read().expect("state lock poisoned");
        state.tasks_by(user_id).into_iter().cloned().collect()
    }

    pub fn duels_of(&self, user_id: &str) -> Vec<Duel> {
        let state = self.state.read().expect("state lock poisoned");
        state.duels_of(user_id).into_iter().cloned().collect()
    }

    pub fn ledger_for(&self, user_id: &str) -> Vec<Transaction> {
        let state = self.state.read().expect("state lock poisoned");
        state.ledger.entries_for(user_id).into_iter().cloned().collect()
    }

    /// Replay the user's ledger history against their materialized balance.
    /// True when they agree, which every committed operation must preserve.
    pub fn reconcile(&self, user_id: &str) -> bool {
        let state = self.state.read().expect("state lock poisoned");
        let balance = state.get_account(user_id).map(|a| a.balance()).unwrap_or(0);
        state.ledger.reconciled_balance(user_id, 0) == Some(balance)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::without_events()
    }
}
