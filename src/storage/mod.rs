//! Storage abstractions for the pipeline.
//!
//! - [`LocalStorage`]: per-report files (pending text, top artifacts, archives)
//! - [`RankingStore`]: per-server ranking tables
//! - [`GearStore`]: per-server gear snapshots
//!
//! Both per-server stores are created lazily on first write and opened
//! otherwise.

pub mod gear;
pub mod local;
pub mod ranking;
mod sqlite;

use serde_json::Value;

use crate::error::Result;
use crate::models::{AggregatedBatch, PlayerRef};

// Re-export for convenience
pub use gear::SqliteGearStore;
pub use local::{ARCHIVE_EXTENSION, LocalStorage};
pub use ranking::SqliteRankingStore;

/// Backend holding one ranking store per server.
pub trait RankingStore: Send + Sync {
    /// Open the server's store, creating it with the ranking schema if absent.
    fn open_or_create(&self, server: &str) -> Result<Box<dyn RankingWriter>>;
}

/// Handle on one server's ranking store.
pub trait RankingWriter: Send {
    /// Insert every table's rows in a single transaction.
    fn bulk_insert(&mut self, batch: &AggregatedBatch) -> Result<usize>;
}

/// Backend holding one gear store per server.
pub trait GearStore: Send + Sync {
    /// Open the server's store, creating it with the gear schema if absent.
    fn open_or_create(&self, server: &str) -> Result<Box<dyn GearWriter>>;
}

/// Handle on one server's gear store.
pub trait GearWriter: Send {
    /// Insert or replace a player's gear snapshot.
    fn upsert(&mut self, player: &PlayerRef, snapshot: &Value) -> Result<()>;
}
