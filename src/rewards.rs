//! Reward calculator: pure XP and essence-draw functions.
//!
//! No persistence and no side effects of its own. Callers apply the results
//! to the fulfiller's account in the same atomic unit as the completion.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Fixed XP granted to a task's creator when the task is completed.
pub const CREATOR_XP_BONUS: u64 = 10;

/// One of the three crafting resource counters granted on task completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Essence {
    Focus,
    Creativity,
    Discipline,
}

/// XP granted to the fulfiller for completing a task worth `coins`.
///
/// `max(10, 10 + coins / 10)` with floor division; negative or nonsensical
/// input falls back to the base grant of 10.
pub fn xp_for_completion(coins: i64) -> u64 {
    if coins < 0 {
        return 10;
    }
    10u64.max(10 + (coins as u64) / 10)
}

/// Draw one essence uniformly at random.
pub fn draw_essence<R: Rng>(rng: &mut R) -> Essence {
    match rng.gen_range(0..3) {
        0 => Essence::Focus,
        1 => Essence::Creativity,
        _ => Essence::Discipline,
    }
}
