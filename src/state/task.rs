use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Task status lifecycle.
///
/// Forward-only: `Open → InProgress → Completed`, or `Open → Cancelled`.
/// `Completed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Accepting applicants; escrow is locked.
    Open,
    /// Assigned to a fulfiller.
    InProgress,
    /// Escrow released to the fulfiller. Terminal.
    Completed,
    /// Deleted by the creator; escrow refunded. Terminal.
    Cancelled,
}

impl TaskStatus {
    /// Closed allowed-transition table. Any pair not listed is rejected.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Open, TaskStatus::InProgress)
                | (TaskStatus::Open, TaskStatus::Cancelled)
                | (TaskStatus::InProgress, TaskStatus::Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }
}

/// Descriptive metadata, opaque to the engine. Updates freely with no
/// side effects.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskMeta {
    pub title: String,
    pub category: String,
    pub description: String,
    pub attachments: Vec<String>,
}

/// Task aggregate: a posted job with coins held in escrow.
///
/// Invariants:
/// - `coins > 0`, matching an uncancelled escrow-lock ledger entry while the
///   task is Open or InProgress
/// - `applicants` is an ordered set (no duplicates)
/// - `deadline` is descriptive only; nothing in the engine enforces expiry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub creator: String,
    /// Escrowed reward, reflecting any stake adjustments
    pub coins: u64,
    pub status: TaskStatus,
    pub assigned_to: Option<String>,
    pub applicants: Vec<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub meta: TaskMeta,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn open(creator: String, coins: u64, meta: TaskMeta, deadline: Option<DateTime<Utc>>) -> Self {
        Task {
            id: Uuid::new_v4(),
            creator,
            coins,
            status: TaskStatus::Open,
            assigned_to: None,
            applicants: Vec::new(),
            deadline,
            meta,
            created_at: Utc::now(),
        }
    }

    pub fn has_applicant(&self, user_id: &str) -> bool {
        self.applicants.iter().any(|a| a == user_id)
    }

    pub fn is_open(&self) -> bool {
        self.status == TaskStatus::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table_forward_only() {
        assert!(TaskStatus::Open.can_transition_to(TaskStatus::InProgress));
        assert!(TaskStatus::Open.can_transition_to(TaskStatus::Cancelled));
        assert!(TaskStatus::InProgress.can_transition_to(TaskStatus::Completed));

        assert!(!TaskStatus::InProgress.can_transition_to(TaskStatus::Open));
        assert!(!TaskStatus::InProgress.can_transition_to(TaskStatus::Cancelled));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Open));
        assert!(!TaskStatus::Cancelled.can_transition_to(TaskStatus::Open));
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Open.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_open_task() {
        let task = Task::open("alice".to_string(), 30, TaskMeta::default(), None);
        assert!(task.is_open());
        assert_eq!(task.coins, 30);
        assert!(task.assigned_to.is_none());
        assert!(task.applicants.is_empty());
    }
}
