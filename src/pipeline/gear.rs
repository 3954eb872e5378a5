// src/pipeline/gear.rs

//! Player collection and gear snapshot generation.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{AppError, Result};
use crate::models::{AggregatedBatch, PlayerRef, TopData, TopRow};
use crate::services::GearParser;
use crate::storage::GearStore;
use crate::utils::log;

fn players_of<'a>(
    rows: impl Iterator<Item = &'a TopRow>,
    server: &str,
    players: &mut BTreeSet<PlayerRef>,
) {
    for row in rows {
        if let Some(name) = row.player_name() {
            players.insert(PlayerRef::new(name, server));
        }
    }
}

/// Every distinct player named in a server's aggregated batch.
pub fn collect_players(batch: &AggregatedBatch, server: &str) -> BTreeSet<PlayerRef> {
    let mut players = BTreeSet::new();
    for (_, rows) in batch.tables() {
        players_of(rows.iter(), server, &mut players);
    }
    players
}

/// Every distinct player named in one report's top data.
pub fn collect_from_top(data: &TopData, server: &str) -> BTreeSet<PlayerRef> {
    let mut players = BTreeSet::new();
    for (_, rows) in data.tables() {
        players_of(rows.iter(), server, &mut players);
    }
    players
}

/// Outcome of one server's gear pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GearSummary {
    pub players: usize,
    pub saved: usize,
    pub failed: usize,
}

/// Parse and store the gear snapshot of each player of one server.
///
/// The store is opened first; if that fails the pass is skipped. Player
/// failures are logged and counted. SQLite work runs on the blocking pool.
pub async fn build_gear(
    store: &Arc<dyn GearStore>,
    parser: &dyn GearParser,
    server: &str,
    players: &BTreeSet<PlayerRef>,
) -> Result<GearSummary> {
    if players.is_empty() {
        return Ok(GearSummary::default());
    }

    let start = Instant::now();
    let opener = Arc::clone(store);
    let owned_server = server.to_string();
    let mut writer = tokio::task::spawn_blocking(move || opener.open_or_create(&owned_server))
        .await
        .map_err(|e| AppError::persistence(server, e))?
        .map_err(|e| AppError::persistence(server, e))?;

    let mut summary = GearSummary {
        players: players.len(),
        ..GearSummary::default()
    };

    let mut snapshots = Vec::with_capacity(players.len());
    for player in players {
        match parser.parse(player).await {
            Ok(snapshot) => snapshots.push((player.clone(), snapshot)),
            Err(e) => {
                summary.failed += 1;
                log::warn(&format!("Gear skipped | {player} | {e}"));
            }
        }
    }

    let failures = tokio::task::spawn_blocking(move || {
        snapshots
            .into_iter()
            .filter_map(|(player, snapshot)| {
                writer.upsert(&player, &snapshot).err().map(|e| (player, e))
            })
            .collect::<Vec<_>>()
    })
    .await
    .map_err(|e| AppError::persistence(server, e))?;

    for (player, e) in &failures {
        log::warn(&format!("Gear not saved | {player} | {e}"));
    }
    summary.failed += failures.len();
    summary.saved = summary.players - summary.failed;

    log::info(&format!(
        "{} | Saved gear | {} | {}/{} players",
        log::elapsed(start),
        server,
        summary.saved,
        summary.players
    ));
    Ok(summary)
}
