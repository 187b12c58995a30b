pub mod snapshot;

pub use snapshot::FileStorage;

use crate::error::Result;
use crate::state::State;

/// Storage abstraction for state snapshots.
///
/// The in-state ledger is the append-only audit record; storage only needs
/// to persist the whole state atomically (crash-safe) and load it back.
pub trait Storage {
    /// Load the latest state snapshot.
    ///
    /// Returns `None` if no snapshot exists (fresh state).
    fn load_state(&self) -> Result<Option<State>>;

    /// Persist a state snapshot atomically (write to temp file, fsync, rename)
    fn persist_state(&mut self, state: &State) -> Result<()>;
}
