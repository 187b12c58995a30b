use std::env;
use std::path::PathBuf;

/// Configuration for the quest-engine CLI tool.
///
/// Single-process defaults; collaborators embedding the library construct
/// the engine directly and ignore this.
#[derive(Debug, Clone)]
pub struct Config {
    /// Data directory path (default: `.quest-engine/` in current directory)
    pub data_dir: PathBuf,

    /// Output format: "human" (default) or "json"
    pub output_format: String,

    /// Log filter directive for tracing (default: "info")
    pub log_level: String,
}

impl Config {
    /// Create a new config with defaults
    pub fn new() -> Self {
        let data_dir = env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".quest-engine");

        Config {
            data_dir,
            output_format: "human".to_string(),
            log_level: "info".to_string(),
        }
    }

    /// Create config with custom data directory
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Config {
            data_dir,
            ..Config::new()
        }
    }

    pub fn get_data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    pub fn set_data_dir(&mut self, dir: PathBuf) {
        self.data_dir = dir;
    }

    pub fn set_output_format(&mut self, format: String) {
        self.output_format = format;
    }

    /// Get state snapshot path
    pub fn get_state_path(&self) -> PathBuf {
        self.data_dir.join("state.bin")
    }

    /// Get state JSON path (for debugging)
    pub fn get_state_json_path(&self) -> PathBuf {
        self.data_dir.join("state.json")
    }

    /// Load config from environment variables
    ///
    /// Environment variables:
    /// - `QUEST_ENGINE_DATA_DIR`: override data directory
    /// - `QUEST_ENGINE_OUTPUT_FORMAT`: "human" or "json"
    /// - `QUEST_ENGINE_LOG`: tracing filter directive
    pub fn from_env() -> Self {
        let mut config = Config::new();

        if let Ok(dir) = env::var("QUEST_ENGINE_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Ok(format) = env::var("QUEST_ENGINE_OUTPUT_FORMAT") {
            config.output_format = format;
        }

        if let Ok(level) = env::var("QUEST_ENGINE_LOG") {
            config.log_level = level;
        }

        config
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::new();
        assert_eq!(config.output_format, "human");
        assert_eq!(config.log_level, "info");
        assert!(config.data_dir.ends_with(".quest-engine"));
    }

    #[test]
    fn test_config_paths() {
        let config = Config::new();
        assert!(config.get_state_path().ends_with("state.bin"));
        assert!(config.get_state_json_path().ends_with("state.json"));
    }

    #[test]
    fn test_with_data_dir() {
        let config = Config::with_data_dir(PathBuf::from("/tmp/qe"));
        assert_eq!(config.get_data_dir(), &PathBuf::from("/tmp/qe"));
    }
}
