//! Event broadcaster seam.
//!
//! The sink is an injected dependency of the engine, not a global handle.
//! Publication is best-effort and fire-and-forget: a failed publish is
//! logged and discarded, never surfaced to the caller and never retried.
//! No correctness property of the engine depends on delivery.

use serde_json::Value;
use std::sync::Mutex;
use thiserror::Error;

pub const TASK_CHANNEL: &str = "tasks";
pub const DUEL_CHANNEL: &str = "duels";

#[derive(Error, Debug)]
#[error("Event publish failed: {0}")]
pub struct SinkError(pub String);

/// Best-effort, at-most-once publication of state-change notifications.
pub trait EventSink: Send + Sync {
    fn publish(&self, channel: &str, payload: &Value) -> Result<(), SinkError>;
}

/// Discards everything. Default sink.
#[derive(Debug, Default)]
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn publish(&self, _channel: &str, _payload: &Value) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Collects published events in memory, for tests and local inspection.
#[derive(Debug, Default)]
pub struct MemorySink {
    published: Mutex<Vec<(String, Value)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        MemorySink::default()
    }

    pub fn drain(&self) -> Vec<(String, Value)> {
        let mut published = self.published.lock().expect("sink lock poisoned");
        std::mem::take(&mut *published)
    }

    pub fn count(&self) -> usize {
        self.published.lock().expect("sink lock poisoned").len()
    }
}

impl EventSink for MemorySink {
    fn publish(&self, channel: &str, payload: &Value) -> Result<(), SinkError> {
        self.published
            .lock()
            .map_err(|e| SinkError(e.to_string()))?
            .push((channel.to_string(), payload.clone()));
        Ok(())
    }
}

/// Sink that always fails, for exercising the fire-and-forget path in tests.
#[derive(Debug, Default)]
pub struct FailingSink;

impl EventSink for FailingSink {
    fn publish(&self, _channel: &str, _payload: &Value) -> Result<(), SinkError> {
        Err(SinkError("sink unavailable".to_string()))
    }
}
