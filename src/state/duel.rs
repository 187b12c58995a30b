//! Duel aggregate and state machine.
//!
//! A duel is a head-to-head race toward a numeric target, or a "shadow"
//! race against the challenger's own historical baseline. Progress arrives
//! both from explicit user updates and from completion events forwarded by
//! the engine; the first participant to reach the target wins, and a
//! decided duel ignores all later progress.

use crate::error::{Error, Result};
use crate::state::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Competitive metric a duel races on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuelKind {
    TaskSprint,
    HabitStreak,
    StudyDuel,
}

/// Duel status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuelStatus {
    /// Challenge issued, awaiting the opponent's response.
    Pending,
    /// Both sides racing; progress updates accepted.
    Active,
    /// Target reached; winner recorded. Terminal.
    Completed,
    /// Opponent declined. Terminal.
    Rejected,
    /// Challenger withdrew before a response. Terminal.
    Cancelled,
}

impl DuelStatus {
    /// Closed allowed-transition table. Any pair not listed is rejected.
    pub fn can_transition_to(self, next: DuelStatus) -> bool {
        matches!(
            (self, next),
            (DuelStatus::Pending, DuelStatus::Active)
                | (DuelStatus::Pending, DuelStatus::Rejected)
                | (DuelStatus::Pending, DuelStatus::Cancelled)
                | (DuelStatus::Active, DuelStatus::Completed)
        )
    }
}

/// Which side of the duel a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Challenger,
    Opponent,
}

/// Duel aggregate.
///
/// Invariants:
/// - At most one Pending|Active duel per unordered pair of users per kind
/// - Once Completed, `winner` is set and progress fields are frozen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Duel {
    pub id: Uuid,
    pub challenger: String,
    pub opponent: String,
    pub kind: DuelKind,
    pub status: DuelStatus,
    pub challenger_progress: u64,
    pub opponent_progress: u64,
    pub target: u64,
    pub winner: Option<String>,
    /// Self-vs-self race against a recorded historical baseline
    pub is_shadow: bool,
    pub shadow_baseline: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Duel {
    /// Create a pending challenge between two distinct users.
    pub fn challenge(challenger: String, opponent: String, kind: DuelKind, target: u64) -> Self {
        Duel {
            id: Uuid::new_v4(),
            challenger,
            opponent,
            kind,
            status: DuelStatus::Pending,
            challenger_progress: 0,
            opponent_progress: 0,
            target,
            winner: None,
            is_shadow: false,
            shadow_baseline: None,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }

    /// Create a shadow duel: active immediately, opponent is the challenger
    /// themselves, with the historical baseline recorded.
    pub fn shadow(challenger: String, kind: DuelKind, target: u64, baseline: u64) -> Self {
        Duel {
            opponent: challenger.clone(),
            status: DuelStatus::Active,
            is_shadow: true,
            shadow_baseline: Some(baseline),
            started_at: Some(Utc::now()),
            ..Duel::challenge(challenger, String::new(), kind, target)
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == DuelStatus::Active
    }

    pub fn is_open(&self) -> bool {
        matches!(self.status, DuelStatus::Pending | DuelStatus::Active)
    }

    pub fn side_of(&self, user_id: &str) -> Option<Side> {
        if user_id == self.challenger {
            Some(Side::Challenger)
        } else if user_id == self.opponent {
            Some(Side::Opponent)
        } else {
            None
        }
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.side_of(user_id).is_some()
    }

    /// True if this duel pairs the same two users, regardless of who
    /// challenged whom.
    pub fn pairs(&self, a: &str, b: &str) -> bool {
        (self.challenger == a && self.opponent == b)
            || (self.challenger == b && self.opponent == a)
    }

    pub fn progress_of(&self, side: Side) -> u64 {
        match side {
            Side::Challenger => self.challenger_progress,
            Side::Opponent => self.opponent_progress,
        }
    }

    /// Set a participant's progress to an absolute value, completing the duel
    /// if the target is reached.
    ///
    /// Idempotent once decided: any call on a non-active duel is a no-op, so
    /// a late-arriving update can never overturn a decided duel. Returns true
    /// if this call completed the duel.
    pub fn record_progress(&mut self, user_id: &str, new_progress: u64) -> Result<bool> {
        if !self.is_active() {
            return Ok(false);
        }
        let side = self.side_of(user_id).ok_or_else(|| {
            Error::Authorization(format!("{} is not a participant in duel {}", user_id, self.id))
        })?;
        match side {
            Side::Challenger => self.challenger_progress = new_progress,
            Side::Opponent => self.opponent_progress = new_progress,
        }
        if new_progress >= self.target {
            // First writer to cross the target wins; no tie-break.
            self.status = DuelStatus::Completed;
            self.winner = Some(user_id.to_string());
            self.ended_at = Some(Utc::now());
            return Ok(true);
        }
        Ok(false)
    }
}

/// Outcome of a duel mutation, for event emission by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuelUpdate {
    Progressed,
    Won,
    NoOp,
}

/// Create a duel (pending challenge, or immediately-active shadow duel).
///
/// `baseline` is only meaningful for shadow duels.
pub fn create_duel(
    state: &mut State,
    challenger: &str,
    opponent: &str,
    kind: DuelKind,
    target: u64,
    is_shadow: bool,
    baseline: Option<u64>,
) -> Result<Duel> {
    if target == 0 {
        return Err(Error::Validation("Duel target must be greater than zero".to_string()));
    }
    if !is_shadow && opponent.is_empty() {
        return Err(Error::Validation(
            "A challenge requires an opponent".to_string(),
        ));
    }
    if !is_shadow && challenger == opponent {
        return Err(Error::Validation(
            "Challenger and opponent must be different users".to_string(),
        ));
    }
    let pair_opponent = if is_shadow { challenger } else { opponent };
    if state
        .duels
        .values()
        .any(|d| d.kind == kind && d.is_open() && d.pairs(challenger, pair_opponent))
    {
        return Err(Error::Validation(format!(
            "An open duel of this kind already exists between {} and {}",
            challenger, pair_opponent
        )));
    }

    let duel = if is_shadow {
        Duel::shadow(challenger.to_string(), kind, target, baseline.unwrap_or(0))
    } else {
        Duel::challenge(challenger.to_string(), opponent.to_string(), kind, target)
    };
    info!(duel_id = %duel.id, challenger, is_shadow, target, "Duel created");
    state.duels.insert(duel.id, duel.clone());
    Ok(duel)
}

/// Opponent accepts or rejects a pending challenge.
pub fn respond_to_duel(
    state: &mut State,
    duel_id: Uuid,
    opponent: &str,
    accept: bool,
) -> Result<Duel> {
    let duel = state
        .duels
        .get_mut(&duel_id)
        .ok_or_else(|| Error::NotFound(format!("Duel {} does not exist", duel_id)))?;
    if duel.opponent != opponent {
        return Err(Error::Authorization(format!(
            "{} is not the challenged opponent of duel {}",
            opponent, duel_id
        )));
    }
    let next = if accept { DuelStatus::Active } else { DuelStatus::Rejected };
    if !duel.status.can_transition_to(next) {
        return Err(Error::InvalidStateTransition(format!(
            "Duel {} is not awaiting a response",
            duel_id
        )));
    }
    duel.status = next;
    if accept {
        duel.started_at = Some(Utc::now());
    }
    info!(duel_id = %duel_id, accept, "Duel response recorded");
    Ok(duel.clone())
}

/// Challenger withdraws a pending challenge.
pub fn cancel_duel(state: &mut State, duel_id: Uuid, challenger: &str) -> Result<Duel> {
    let duel = state
        .duels
        .get_mut(&duel_id)
        .ok_or_else(|| Error::NotFound(format!("Duel {} does not exist", duel_id)))?;
    if duel.challenger != challenger {
        return Err(Error::Authorization(format!(
            "{} is not the challenger of duel {}",
            challenger, duel_id
        )));
    }
    if !duel.status.can_transition_to(DuelStatus::Cancelled) {
        return Err(Error::InvalidStateTransition(format!(
            "Duel {} can no longer be cancelled",
            duel_id
        )));
    }
    duel.status = DuelStatus::Cancelled;
    duel.ended_at = Some(Utc::now());
    info!(duel_id = %duel_id, "Duel cancelled");
    Ok(duel.clone())
}

/// Explicit client-driven progress update with an absolute value.
pub fn update_progress(
    state: &mut State,
    duel_id: Uuid,
    user_id: &str,
    progress: u64,
) -> Result<(Duel, DuelUpdate)> {
    let duel = state
        .duels
        .get_mut(&duel_id)
        .ok_or_else(|| Error::NotFound(format!("Duel {} does not exist", duel_id)))?;
    if !duel.involves(user_id) {
        return Err(Error::Authorization(format!(
            "{} is not a participant in duel {}",
            user_id, duel_id
        )));
    }
    if !duel.is_active() {
        return Err(Error::InvalidStateTransition(format!(
            "Duel {} is not active",
            duel_id
        )));
    }
    let won = duel.record_progress(user_id, progress)?;
    let update = if won { DuelUpdate::Won } else { DuelUpdate::Progressed };
    info!(duel_id = %duel_id, user_id, progress, won, "Duel progress updated");
    Ok((duel.clone(), update))
}

/// Integration entry point: bump the user's progress by `amount` in every
/// active duel of the given kind they participate in.
///
/// This is the seam through which task completions (or habit check-ins) move
/// duel progress without the duel module depending on escrow internals. The
/// read-modify-write here is serialized by the engine's state lock.
pub fn increment_progress(
    state: &mut State,
    user_id: &str,
    kind: DuelKind,
    amount: u64,
) -> Result<Vec<(Duel, DuelUpdate)>> {
    let ids: Vec<Uuid> = state
        .duels
        .values()
        .filter(|d| d.kind == kind && d.is_active() && d.involves(user_id))
        .map(|d| d.id)
        .collect();

    let mut updated = Vec::new();
    for id in ids {
        let duel = state.duels.get_mut(&id).expect("duel id collected above");
        let side = duel.side_of(user_id).expect("participant filter above");
        let current = duel.progress_of(side);
        let won = duel.record_progress(user_id, current.saturating_add(amount))?;
        let update = if won { DuelUpdate::Won } else { DuelUpdate::Progressed };
        info!(duel_id = %id, user_id, amount, won, "Duel progress incremented");
        updated.push((duel.clone(), update));
    }
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_duel(state: &mut State) -> Uuid {
        let duel = create_duel(state, "alice", "bob", DuelKind::TaskSprint, 10, false, None).unwrap();
        respond_to_duel(state, duel.id, "bob", true).unwrap();
        duel.id
    }

    #[test]
    fn test_challenge_starts_pending() {
        let mut state = State::new();
        let duel =
            create_duel(&mut state, "alice", "bob", DuelKind::TaskSprint, 10, false, None).unwrap();
        assert_eq!(duel.status, DuelStatus::Pending);
        assert!(duel.started_at.is_none());
    }

    #[test]
    fn test_shadow_starts_active_against_self() {
        let mut state = State::new();
        let duel =
            create_duel(&mut state, "alice", "", DuelKind::HabitStreak, 7, true, Some(4)).unwrap();
        assert_eq!(duel.status, DuelStatus::Active);
        assert_eq!(duel.opponent, "alice");
        assert_eq!(duel.shadow_baseline, Some(4));
        assert!(duel.started_at.is_some());
    }

    #[test]
    fn test_challenge_without_opponent_rejected() {
        let mut state = State::new();
        let result = create_duel(&mut state, "alice", "", DuelKind::TaskSprint, 10, false, None);
        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(state.duels.is_empty());
    }

    #[test]
    fn test_self_challenge_rejected() {
        let mut state = State::new();
        let result =
            create_duel(&mut state, "alice", "alice", DuelKind::TaskSprint, 10, false, None);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_duplicate_pair_rejected_regardless_of_direction() {
        let mut state = State::new();
        create_duel(&mut state, "alice", "bob", DuelKind::TaskSprint, 10, false, None).unwrap();

        let same = create_duel(&mut state, "alice", "bob", DuelKind::TaskSprint, 5, false, None);
        assert!(same.is_err());
        let reversed = create_duel(&mut state, "bob", "alice", DuelKind::TaskSprint, 5, false, None);
        assert!(reversed.is_err());

        // A different kind is a different race
        let other_kind =
            create_duel(&mut state, "alice", "bob", DuelKind::StudyDuel, 5, false, None);
        assert!(other_kind.is_ok());
    }

    #[test]
    fn test_respond_accept() {
        let mut state = State::new();
        let duel =
            create_duel(&mut state, "alice", "bob", DuelKind::TaskSprint, 10, false, None).unwrap();
        let duel = respond_to_duel(&mut state, duel.id, "bob", true).unwrap();
        assert_eq!(duel.status, DuelStatus::Active);
        assert!(duel.started_at.is_some());
    }

    #[test]
    fn test_respond_reject_is_terminal() {
        let mut state = State::new();
        let duel =
            create_duel(&mut state, "alice", "bob", DuelKind::TaskSprint, 10, false, None).unwrap();
        respond_to_duel(&mut state, duel.id, "bob", false).unwrap();

        let again = respond_to_duel(&mut state, duel.id, "bob", true);
        assert!(matches!(again, Err(Error::InvalidStateTransition(_))));
    }

    #[test]
    fn test_respond_requires_opponent() {
        let mut state = State::new();
        let duel =
            create_duel(&mut state, "alice", "bob", DuelKind::TaskSprint, 10, false, None).unwrap();
        let result = respond_to_duel(&mut state, duel.id, "carol", true);
        assert!(matches!(result, Err(Error::Authorization(_))));
    }

    #[test]
    fn test_cancel_pending() {
        let mut state = State::new();
        let duel =
            create_duel(&mut state, "alice", "bob", DuelKind::TaskSprint, 10, false, None).unwrap();
        let duel = cancel_duel(&mut state, duel.id, "alice").unwrap();
        assert_eq!(duel.status, DuelStatus::Cancelled);
    }

    #[test]
    fn test_cancel_active_rejected() {
        let mut state = State::new();
        let id = active_duel(&mut state);
        let result = cancel_duel(&mut state, id, "alice");
        assert!(matches!(result, Err(Error::InvalidStateTransition(_))));
    }

    #[test]
    fn test_progress_on_pending_rejected() {
        let mut state = State::new();
        let duel =
            create_duel(&mut state, "alice", "bob", DuelKind::TaskSprint, 10, false, None).unwrap();
        let result = update_progress(&mut state, duel.id, "alice", 3);
        assert!(matches!(result, Err(Error::InvalidStateTransition(_))));
    }

    #[test]
    fn test_single_winner_and_frozen_progress() {
        let mut state = State::new();
        let id = active_duel(&mut state);

        // Challenger jumps 0 -> 12 in one update, past target 10
        let (duel, update) = update_progress(&mut state, id, "alice", 12).unwrap();
        assert_eq!(update, DuelUpdate::Won);
        assert_eq!(duel.status, DuelStatus::Completed);
        assert_eq!(duel.winner.as_deref(), Some("alice"));
        assert_eq!(duel.opponent_progress, 0);

        // Late update on the decided duel is rejected at the entry point
        let late = update_progress(&mut state, id, "bob", 20);
        assert!(matches!(late, Err(Error::InvalidStateTransition(_))));
        let duel = state.duels.get(&id).unwrap();
        assert_eq!(duel.winner.as_deref(), Some("alice"));
        assert_eq!(duel.opponent_progress, 0);
    }

    #[test]
    fn test_record_progress_noop_once_decided() {
        let mut duel = Duel::shadow("alice".to_string(), DuelKind::StudyDuel, 5, 2);
        assert!(duel.record_progress("alice", 5).unwrap());
        // Idempotent: the decided duel ignores further writes
        assert!(!duel.record_progress("alice", 100).unwrap());
        assert_eq!(duel.challenger_progress, 5);
    }

    #[test]
    fn test_increment_progress_targets_matching_kind_only() {
        let mut state = State::new();
        let sprint = active_duel(&mut state);
        let study =
            create_duel(&mut state, "alice", "carol", DuelKind::StudyDuel, 10, false, None).unwrap();
        respond_to_duel(&mut state, study.id, "carol", true).unwrap();

        let updated = increment_progress(&mut state, "alice", DuelKind::TaskSprint, 1).unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].0.id, sprint);
        assert_eq!(state.duels.get(&sprint).unwrap().challenger_progress, 1);
        assert_eq!(state.duels.get(&study.id).unwrap().challenger_progress, 0);
    }

    #[test]
    fn test_increment_progress_can_decide_duel() {
        let mut state = State::new();
        let id = active_duel(&mut state);
        for _ in 0..9 {
            increment_progress(&mut state, "bob", DuelKind::TaskSprint, 1).unwrap();
        }
        let updated = increment_progress(&mut state, "bob", DuelKind::TaskSprint, 1).unwrap();
        assert_eq!(updated[0].1, DuelUpdate::Won);
        let duel = state.duels.get(&id).unwrap();
        assert_eq!(duel.status, DuelStatus::Completed);
        assert_eq!(duel.winner.as_deref(), Some("bob"));
    }
}
