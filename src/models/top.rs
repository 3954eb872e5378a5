//! Ranking ("top") data structures.
//!
//! A report's top artifact is nested as `{boss: {mode: [row, ...]}}`. Each
//! `(boss, mode)` pair maps to one ranking table per server.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::ReportId;

/// Metric fields every row must carry.
pub const REQUIRED_FIELDS: [&str; 3] = ["u", "d", "t"];

/// Player name aliases, in lookup order.
pub const PLAYER_FIELDS: [&str; 3] = ["player", "name", "n"];

/// Ranking table name for a boss and difficulty mode.
pub fn table_name(boss_name: &str, mode: &str) -> String {
    format!("{boss_name}--{mode}")
}

/// One ranking row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct TopRow(pub Map<String, Value>);

impl TopRow {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// First required field that is missing or empty.
    ///
    /// Zero is a legitimate metric value and never reported.
    pub fn invalid_field(&self) -> Option<&'static str> {
        REQUIRED_FIELDS.into_iter().find(|key| match self.0.get(*key) {
            Some(value) => !is_truthy(value) && !is_literal_zero(value),
            None => true,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.invalid_field().is_none()
    }

    /// Player name from the first non-empty alias field.
    pub fn player_name(&self) -> Option<&str> {
        PLAYER_FIELDS.iter().find_map(|key| match self.0.get(*key) {
            Some(Value::String(name)) if !name.is_empty() => Some(name.as_str()),
            _ => None,
        })
    }

    /// Numeric value of a metric field.
    pub fn metric(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }
}

impl fmt::Display for TopRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.0.clone()))
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// `false` compares equal to zero in the log parser's output, so it counts too.
fn is_literal_zero(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Bool(b) => !b,
        _ => false,
    }
}

/// Top data of a single report, as written by the top builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct TopData(pub BTreeMap<String, BTreeMap<String, Vec<TopRow>>>);

impl TopData {
    /// Iterate `(table_name, rows)` over every boss and mode.
    pub fn tables(&self) -> impl Iterator<Item = (String, &[TopRow])> + '_ {
        self.0.iter().flat_map(|(boss, modes)| {
            modes
                .iter()
                .map(move |(mode, rows)| (table_name(boss, mode), rows.as_slice()))
        })
    }

    pub fn row_count(&self) -> usize {
        self.tables().map(|(_, rows)| rows.len()).sum()
    }
}

/// Merged rows of every valid report of one server, keyed by table name.
///
/// Each row remembers the report it came from so a store can replace a
/// report's rows instead of appending them twice.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregatedBatch {
    tables: BTreeMap<String, Vec<TopRow>>,
    owners: BTreeMap<String, Vec<usize>>,
    reports: Vec<ReportId>,
}

impl AggregatedBatch {
    pub fn new() -> Self {
        Self::default()
    }

    fn report_index(&mut self, report: &ReportId) -> usize {
        match self.reports.iter().position(|r| r == report) {
            Some(index) => index,
            None => {
                self.reports.push(report.clone());
                self.reports.len() - 1
            }
        }
    }

    /// Append a report's rows to a table, keeping their order.
    pub fn extend(
        &mut self,
        report: &ReportId,
        table: impl Into<String>,
        rows: impl IntoIterator<Item = TopRow>,
    ) {
        let index = self.report_index(report);
        let table = table.into();
        let target = self.tables.entry(table.clone()).or_default();
        let before = target.len();
        target.extend(rows);
        let added = target.len() - before;
        self.owners
            .entry(table)
            .or_default()
            .extend(std::iter::repeat_n(index, added));
    }

    /// Append every table of a report.
    pub fn add_report(&mut self, report: &ReportId, data: &TopData) {
        self.report_index(report);
        for (table, rows) in data.tables() {
            self.extend(report, table, rows.iter().cloned());
        }
    }

    pub fn get(&self, table: &str) -> Option<&[TopRow]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    pub fn tables(&self) -> impl Iterator<Item = (&str, &[TopRow])> {
        self.tables
            .iter()
            .map(|(name, rows)| (name.as_str(), rows.as_slice()))
    }

    /// Reports that contributed to the batch, in merge order.
    pub fn reports(&self) -> &[ReportId] {
        &self.reports
    }

    /// Every row with its table and source report, table by table.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ReportId, &TopRow)> {
        self.tables.iter().flat_map(move |(name, rows)| {
            let owners = self.owners.get(name).map(Vec::as_slice).unwrap_or_default();
            rows.iter()
                .zip(owners)
                .map(move |(row, index)| (name.as_str(), &self.reports[*index], row))
        })
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn row_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }
}

/// A player on a server, the key of a gear snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerRef {
    pub name: String,
    pub server: String,
}

impl PlayerRef {
    pub fn new(name: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            server: server.into(),
        }
    }
}

impl fmt::Display for PlayerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.server)
    }
}
