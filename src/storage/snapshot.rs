use crate::config::Config;
use crate::error::{Error, Result};
use crate::state::State;
use crate::storage::Storage;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;

/// File-based snapshot storage.
///
/// Files:
/// - `state.bin`: State snapshot (bincode serialized)
/// - `state.bin.tmp`: Temporary file for atomic snapshot writes
/// - `state.json`: Pretty-printed export for debugging (best-effort)
pub struct FileStorage {
    state_path: PathBuf,
    state_tmp_path: PathBuf,
    state_json_path: PathBuf,
}

impl FileStorage {
    /// Create a new FileStorage with paths from config
    pub fn new(config: &Config) -> Self {
        FileStorage {
            state_path: config.get_state_path(),
            state_tmp_path: config.get_state_path().with_extension("bin.tmp"),
            state_json_path: config.get_state_json_path(),
        }
    }

    /// Create FileStorage with a custom snapshot path (for testing)
    pub fn with_path(state_path: PathBuf) -> Self {
        let state_tmp_path = state_path.with_extension("bin.tmp");
        let state_json_path = state_path.with_extension("json");
        FileStorage {
            state_path,
            state_tmp_path,
            state_json_path,
        }
    }

    /// Ensure the data directory exists
    fn ensure_dir(&self) -> Result<()> {
        if let Some(parent) = self.state_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Storage(format!("Failed to create data directory: {}", e)))?;
        }
        Ok(())
    }
}

impl Storage for FileStorage {
    fn load_state(&self) -> Result<Option<State>> {
        if !self.state_path.exists() {
            return Ok(None);
        }

        let mut file = File::open(&self.state_path)
            .map_err(|e| Error::Storage(format!("Failed to open state file: {}", e)))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| Error::Storage(format!("Failed to read state file: {}", e)))?;

        let state: State = bincode::deserialize(&data)
            .map_err(|e| Error::Storage(format!("Failed to deserialize state: {}", e)))?;

        Ok(Some(state))
    }

    fn persist_state(&mut self, state: &State) -> Result<()> {
        self.ensure_dir()?;

        let state_bytes = bincode::serialize(state)
            .map_err(|e| Error::Storage(format!("Failed to serialize state: {}", e)))?;

        // Write to temporary file
        let mut file = File::create(&self.state_tmp_path)
            .map_err(|e| Error::Storage(format!("Failed to create temp state file: {}", e)))?;
        file.write_all(&state_bytes)
            .map_err(|e| Error::Storage(format!("Failed to write state: {}", e)))?;

        // Fsync before rename (crash safety)
        file.sync_all()
            .map_err(|e| Error::Storage(format!("Failed to fsync temp state file: {}", e)))?;
        drop(file);

        // Atomic rename (crash-safe snapshot)
        fs::rename(&self.state_tmp_path, &self.state_path)
            .map_err(|e| Error::Storage(format!("Failed to rename temp state file: {}", e)))?;

        // Fsync parent directory (ensure rename is persisted)
        if let Some(parent) = self.state_path.parent() {
            let parent_file = File::open(parent)
                .map_err(|e| Error::Storage(format!("Failed to open parent directory: {}", e)))?;
            parent_file
                .sync_all()
                .map_err(|e| Error::Storage(format!("Failed to fsync parent directory: {}", e)))?;
        }

        // Debug export, best-effort: the binary snapshot is authoritative
        if let Ok(json) = serde_json::to_string_pretty(state) {
            let _ = fs::write(&self.state_json_path, json);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{escrow, Account, TaskMeta};
    use tempfile::TempDir;

    fn create_test_storage() -> (FileStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let state_path = temp_dir.path().join("state.bin");
        let storage = FileStorage::with_path(state_path);
        (storage, temp_dir)
    }

    #[test]
    fn test_load_state_none() {
        let (storage, _temp_dir) = create_test_storage();
        let loaded = storage.load_state().unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_persist_and_load_state() {
        let (mut storage, _temp_dir) = create_test_storage();

        let mut state = State::new();
        state
            .accounts
            .insert("alice".to_string(), Account::with_balance(1000));

        storage.persist_state(&state).unwrap();

        let loaded = storage.load_state().unwrap().unwrap();
        assert_eq!(loaded.accounts.len(), 1);
        assert_eq!(loaded.get_account("alice").unwrap().balance(), 1000);
    }

    #[test]
    fn test_round_trip_preserves_tasks_and_ledger() {
        let (mut storage, _temp_dir) = create_test_storage();

        let mut state = State::new();
        escrow::deposit(&mut state, "alice", 100, "purchase").unwrap();
        let task = escrow::create_task(&mut state, "alice", 30, TaskMeta::default(), None).unwrap();

        storage.persist_state(&state).unwrap();
        let loaded = storage.load_state().unwrap().unwrap();

        assert_eq!(loaded.tasks.get(&task.id).unwrap().coins, 30);
        assert_eq!(loaded.ledger.entries().len(), 2);
        assert_eq!(
            loaded.ledger.reconciled_balance("alice", 0),
            Some(loaded.get_account("alice").unwrap().balance())
        );
    }

    #[test]
    fn test_persist_overwrites_previous_snapshot() {
        let (mut storage, _temp_dir) = create_test_storage();

        let mut state = State::new();
        state
            .accounts
            .insert("alice".to_string(), Account::with_balance(10));
        storage.persist_state(&state).unwrap();

        state.get_or_create_account("alice").credit(5);
        storage.persist_state(&state).unwrap();

        let loaded = storage.load_state().unwrap().unwrap();
        assert_eq!(loaded.get_account("alice").unwrap().balance(), 15);
    }
}
