//! Task lifecycle operations: escrow lock, release, and refund.
//!
//! Each operation validates its preconditions against the current state and
//! then applies the balance, ledger, and status mutations as one unit. The
//! engine holds the state write lock for the whole call, which makes every
//! check-and-mutate here indivisible with respect to concurrent callers.

use crate::error::{Error, Result};
use crate::ledger::EntryKind;
use crate::rewards::{self, Essence};
use crate::state::task::{Task, TaskMeta, TaskStatus};
use crate::state::State;
use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, info};
use uuid::Uuid;

/// Everything a completed task produced, for event emission and the duel
/// progress hook. Returned instead of calling into the duel module directly,
/// so the two state machines stay decoupled.
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub task: Task,
    pub fulfiller: String,
    pub payout: u64,
    pub fulfiller_xp: u64,
    pub essence: Essence,
    pub creator_xp: u64,
}

/// Non-monetary and monetary fields a creator may change on an open task.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub coins: Option<u64>,
    pub title: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub attachments: Option<Vec<String>>,
    pub deadline: Option<Option<DateTime<Utc>>>,
}

/// Credit an account from an upstream deposit source (payment gateway).
///
/// Payment verification happens upstream; this only records the result.
pub fn deposit(state: &mut State, user_id: &str, amount: u64, description: &str) -> Result<u64> {
    if amount == 0 {
        return Err(Error::Validation("Deposit amount must be greater than zero".to_string()));
    }
    let account = state.get_or_create_account(user_id);
    let balance = account.credit(amount);
    state
        .ledger
        .append(user_id, EntryKind::Deposit, amount, None, description);
    info!(user_id, amount, balance, "Deposit credited");
    Ok(balance)
}

/// Create an open task, debiting the creator and locking the reward in escrow.
///
/// The balance check and the debit are a single step against the locked
/// state, so two concurrent creates can never jointly overdraw.
pub fn create_task(
    state: &mut State,
    creator: &str,
    coins: u64,
    meta: TaskMeta,
    deadline: Option<DateTime<Utc>>,
) -> Result<Task> {
    if coins == 0 {
        return Err(Error::Validation("Task reward must be greater than zero".to_string()));
    }
    state.get_or_create_account(creator).debit(coins)?;

    let task = Task::open(creator.to_string(), coins, meta, deadline);
    state.ledger.append(
        creator,
        EntryKind::EscrowLock,
        coins,
        Some(task.id),
        "escrow lock on task creation",
    );
    info!(task_id = %task.id, creator, coins, "Task created, reward escrowed");
    state.tasks.insert(task.id, task.clone());
    Ok(task)
}

/// Register interest in fulfilling an open task. No balance effect.
pub fn apply_for_task(state: &mut State, task_id: Uuid, user_id: &str) -> Result<Task> {
    let task = state
        .tasks
        .get_mut(&task_id)
        .ok_or_else(|| Error::NotFound(format!("Task {} does not exist", task_id)))?;
    if !task.is_open() {
        return Err(Error::InvalidStateTransition(format!(
            "Task {} is not open for applications",
            task_id
        )));
    }
    if user_id == task.creator {
        return Err(Error::Validation(
            "Creator cannot apply to their own task".to_string(),
        ));
    }
    if task.has_applicant(user_id) {
        return Err(Error::DuplicateApplication(format!(
            "{} has already applied to task {}",
            user_id, task_id
        )));
    }
    task.applicants.push(user_id.to_string());
    info!(task_id = %task_id, user_id, "Application recorded");
    Ok(task.clone())
}

/// Creator assigns the task to a fulfiller: Open -> InProgress.
pub fn assign_task(
    state: &mut State,
    task_id: Uuid,
    caller: &str,
    assignee: &str,
) -> Result<Task> {
    let task = state
        .tasks
        .get_mut(&task_id)
        .ok_or_else(|| Error::NotFound(format!("Task {} does not exist", task_id)))?;
    if task.creator != caller {
        return Err(Error::Authorization(format!(
            "{} is not the creator of task {}",
            caller, task_id
        )));
    }
    if !task.status.can_transition_to(TaskStatus::InProgress) {
        return Err(Error::InvalidStateTransition(format!(
            "Task {} cannot be assigned in its current status",
            task_id
        )));
    }
    if !task.has_applicant(assignee) {
        // Permissive: assignment outside the applicant list is allowed.
        debug!(task_id = %task_id, assignee, "Assigning a user who never applied");
    }
    task.assigned_to = Some(assignee.to_string());
    task.status = TaskStatus::InProgress;
    info!(task_id = %task_id, assignee, "Task assigned");
    Ok(task.clone())
}

/// Complete a task: release escrow to the fulfiller and grant rewards.
///
/// The status transition is keyed on the allowed-transition table before any
/// credit happens, so two racing completions yield exactly one payout.
pub fn complete_task<R: Rng>(
    state: &mut State,
    task_id: Uuid,
    caller: &str,
    rng: &mut R,
) -> Result<CompletionOutcome> {
    let task = state
        .tasks
        .get_mut(&task_id)
        .ok_or_else(|| Error::NotFound(format!("Task {} does not exist", task_id)))?;
    let fulfiller = task.assigned_to.clone().ok_or_else(|| {
        Error::InvalidStateTransition(format!("Task {} has no assigned fulfiller", task_id))
    })?;
    if caller != task.creator && caller != fulfiller {
        return Err(Error::Authorization(format!(
            "{} is neither creator nor fulfiller of task {}",
            caller, task_id
        )));
    }
    if !task.status.can_transition_to(TaskStatus::Completed) {
        return Err(Error::InvalidStateTransition(format!(
            "Task {} cannot be completed from its current status",
            task_id
        )));
    }
    task.status = TaskStatus::Completed;
    let task = task.clone();
    let payout = task.coins;

    state.get_or_create_account(&fulfiller).credit(payout);
    state.ledger.append(
        &fulfiller,
        EntryKind::EscrowRelease,
        payout,
        Some(task_id),
        "escrow release on task completion",
    );

    let fulfiller_xp = rewards::xp_for_completion(payout as i64);
    let essence = rewards::draw_essence(rng);
    let account = state.get_or_create_account(&fulfiller);
    account.grant_xp(fulfiller_xp);
    account.grant_essence(essence);

    let creator_xp = rewards::CREATOR_XP_BONUS;
    state.get_or_create_account(&task.creator).grant_xp(creator_xp);

    info!(
        task_id = %task_id,
        fulfiller,
        payout,
        fulfiller_xp,
        ?essence,
        "Task completed, escrow released"
    );
    Ok(CompletionOutcome {
        task,
        fulfiller,
        payout,
        fulfiller_xp,
        essence,
        creator_xp,
    })
}

/// Update an open task. A coin change adjusts the stake: increases debit the
/// creator (requiring sufficient balance), decreases refund the difference.
/// Non-monetary fields update freely.
pub fn update_task(
    state: &mut State,
    task_id: Uuid,
    caller: &str,
    patch: TaskPatch,
) -> Result<Task> {
    // Validate the stake change against the balance before touching anything.
    {
        let task = state
            .tasks
            .get(&task_id)
            .ok_or_else(|| Error::NotFound(format!("Task {} does not exist", task_id)))?;
        if task.creator != caller {
            return Err(Error::Authorization(format!(
                "{} is not the creator of task {}",
                caller, task_id
            )));
        }
        if task.status.is_terminal() {
            return Err(Error::InvalidStateTransition(format!(
                "Task {} is no longer editable",
                task_id
            )));
        }
        if let Some(new_coins) = patch.coins {
            if new_coins == 0 {
                return Err(Error::Validation(
                    "Task reward must be greater than zero".to_string(),
                ));
            }
            if new_coins > task.coins {
                let diff = new_coins - task.coins;
                let account = state
                    .get_account(caller)
                    .ok_or_else(|| Error::NotFound(format!("Account {} does not exist", caller)))?;
                if !account.has_sufficient_balance(diff) {
                    return Err(Error::InsufficientFunds {
                        have: account.balance(),
                        need: diff,
                    });
                }
            }
        }
    }

    if let Some(new_coins) = patch.coins {
        let old_coins = state.tasks.get(&task_id).expect("validated above").coins;
        if new_coins > old_coins {
            let diff = new_coins - old_coins;
            state
                .get_account_mut(caller)
                .expect("validated above")
                .debit(diff)?;
            state.ledger.append(
                caller,
                EntryKind::Withdraw,
                diff,
                Some(task_id),
                "stake increase on task update",
            );
            info!(task_id = %task_id, diff, "Task stake increased");
        } else if new_coins < old_coins {
            let diff = old_coins - new_coins;
            state.get_or_create_account(caller).credit(diff);
            state.ledger.append(
                caller,
                EntryKind::Deposit,
                diff,
                Some(task_id),
                "partial refund on task update",
            );
            info!(task_id = %task_id, diff, "Task stake decreased, difference refunded");
        }
        state.tasks.get_mut(&task_id).expect("validated above").coins = new_coins;
    }

    let task = state.tasks.get_mut(&task_id).expect("validated above");
    if let Some(title) = patch.title {
        task.meta.title = title;
    }
    if let Some(category) = patch.category {
        task.meta.category = category;
    }
    if let Some(description) = patch.description {
        task.meta.description = description;
    }
    if let Some(attachments) = patch.attachments {
        task.meta.attachments = attachments;
    }
    if let Some(deadline) = patch.deadline {
        task.deadline = deadline;
    }
    Ok(task.clone())
}

/// Delete (cancel) a task, refunding the current escrow to the creator.
///
/// The refund is the task's current `coins`, which already reflects any
/// prior stake adjustments, so nothing is double-counted.
pub fn delete_task(state: &mut State, task_id: Uuid, caller: &str) -> Result<Task> {
    let task = state
        .tasks
        .get_mut(&task_id)
        .ok_or_else(|| Error::NotFound(format!("Task {} does not exist", task_id)))?;
    if task.creator != caller {
        return Err(Error::Authorization(format!(
            "{} is not the creator of task {}",
            caller, task_id
        )));
    }
    if !task.status.can_transition_to(TaskStatus::Cancelled) {
        return Err(Error::InvalidStateTransition(format!(
            "Task {} cannot be deleted from its current status",
            task_id
        )));
    }
    task.status = TaskStatus::Cancelled;
    let task = task.clone();

    state.get_or_create_account(caller).credit(task.coins);
    state.ledger.append(
        caller,
        EntryKind::Deposit,
        task.coins,
        Some(task_id),
        "escrow refund on task deletion",
    );
    info!(task_id = %task_id, refund = task.coins, "Task deleted, escrow refunded");
    Ok(task)
}
