pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod ledger;
pub mod logger;
pub mod rewards;
pub mod state;
pub mod storage;
