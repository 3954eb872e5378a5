//! Report identifiers.
//!
//! Uploaded reports are named `YY-MM-DD--HH-MM--Author--Server`. The file
//! stem of the pending raw-text file is the report id, and every derived
//! artifact (top JSON, archive) is named after it. Names that do not follow
//! the pattern are still valid ids; they belong to the default server.

use std::fmt;
use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use serde::Serialize;

use crate::error::{AppError, Result};

const SEPARATOR: &str = "--";

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?P<date>\d{2}-\d{2}-\d{2})--(?P<time>\d{2}-\d{2})--(?P<author>[^-/\\]+(?:-[^-/\\]+)*)(?:--(?P<server>[^/\\]+))?$",
        )
        .expect("report name pattern is valid")
    })
}

/// Metadata encoded in a report name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ReportNameInfo {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub author: String,
    pub server: String,
}

/// Identifier of one uploaded report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub struct ReportId {
    raw: String,
    server: String,
    info: Option<ReportNameInfo>,
}

impl ReportId {
    /// Parse a report name.
    ///
    /// Names without a server segment belong to `default_server`.
    pub fn parse(name: &str, default_server: &str) -> Result<Self> {
        let caps = name_pattern()
            .captures(name)
            .ok_or_else(|| AppError::report_name(name, "expected YY-MM-DD--HH-MM--Author--Server"))?;

        let date = NaiveDate::parse_from_str(&caps["date"], "%y-%m-%d")
            .map_err(|e| AppError::report_name(name, format!("bad date: {e}")))?;
        let time = NaiveTime::parse_from_str(&caps["time"], "%H-%M")
            .map_err(|e| AppError::report_name(name, format!("bad time: {e}")))?;
        let server = caps
            .name("server")
            .map_or(default_server, |m| m.as_str())
            .to_string();

        Ok(Self {
            raw: name.to_string(),
            server: server.clone(),
            info: Some(ReportNameInfo {
                date,
                time,
                author: caps["author"].to_string(),
                server,
            }),
        })
    }

    /// Parse a report name, falling back to an opaque id on `default_server`.
    pub fn parse_lenient(name: &str, default_server: &str) -> Self {
        Self::parse(name, default_server).unwrap_or_else(|_| Self {
            raw: name.to_string(),
            server: default_server.to_string(),
            info: None,
        })
    }

    /// Whether the name follows the `YY-MM-DD--HH-MM--Author--Server` pattern.
    pub fn is_structured(&self) -> bool {
        self.info.is_some()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn info(&self) -> Option<&ReportNameInfo> {
        self.info.as_ref()
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    /// The identifier the same report would have under another server.
    ///
    /// Unstructured ids have no server segment and are returned unchanged.
    pub fn with_server(&self, server: &str) -> Self {
        let Some(info) = &self.info else {
            return self.clone();
        };
        let raw = [
            info.date.format("%y-%m-%d").to_string(),
            info.time.format("%H-%M").to_string(),
            info.author.clone(),
            server.to_string(),
        ]
        .join(SEPARATOR);

        Self {
            raw,
            server: server.to_string(),
            info: Some(ReportNameInfo {
                server: server.to_string(),
                ..info.clone()
            }),
        }
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl AsRef<str> for ReportId {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl From<ReportId> for String {
    fn from(id: ReportId) -> Self {
        id.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_name() {
        let id = ReportId::parse("24-03-17--21-05--Safiyah--Lordaeron", "Unknown").unwrap();
        assert_eq!(id.server(), "Lordaeron");
        assert_eq!(id.info().unwrap().author, "Safiyah");
        assert_eq!(id.info().unwrap().date, NaiveDate::from_ymd_opt(2024, 3, 17).unwrap());
        assert_eq!(id.info().unwrap().time, NaiveTime::from_hms_opt(21, 5, 0).unwrap());
        assert_eq!(id.to_string(), "24-03-17--21-05--Safiyah--Lordaeron");
    }

    #[test]
    fn test_parse_without_server_uses_default() {
        let id = ReportId::parse("24-03-17--21-05--Safiyah", "Unknown").unwrap();
        assert_eq!(id.server(), "Unknown");
    }

    #[test]
    fn test_parse_hyphenated_author_and_spaced_server() {
        let id = ReportId::parse("24-03-17--21-05--Jean-Luc--Icecrown Citadel", "Unknown").unwrap();
        assert_eq!(id.info().unwrap().author, "Jean-Luc");
        assert_eq!(id.server(), "Icecrown Citadel");
    }

    #[test]
    fn test_parse_rejects_bad_names() {
        assert!(ReportId::parse("notes", "Unknown").is_err());
        assert!(ReportId::parse("24-13-40--21-05--Safiyah--Alpha", "Unknown").is_err());
        assert!(ReportId::parse("24-03-17--25-05--Safiyah--Alpha", "Unknown").is_err());
        assert!(ReportId::parse("24-03-17--21-05----Alpha", "Unknown").is_err());
    }

    #[test]
    fn test_lenient_parse_keeps_unstructured_names() {
        let bad_date = ReportId::parse_lenient("24-02-30--20-00--A--Alpha", "Unknown");
        assert_eq!(bad_date.as_str(), "24-02-30--20-00--A--Alpha");
        assert_eq!(bad_date.server(), "Unknown");
        assert!(!bad_date.is_structured());

        let free = ReportId::parse_lenient("raid-log--Alpha", "Unknown");
        assert_eq!(free.server(), "Unknown");
        assert_eq!(free.with_server("Alpha"), free);

        let good = ReportId::parse_lenient("24-03-17--21-05--Safiyah--Alpha", "Unknown");
        assert!(good.is_structured());
        assert_eq!(good.server(), "Alpha");
    }

    #[test]
    fn test_with_server_replaces_only_server_segment() {
        let id = ReportId::parse("24-03-17--21-05--Alpha--Alpha", "Unknown").unwrap();
        let alias = id.with_server("Unknown");
        assert_eq!(alias.as_str(), "24-03-17--21-05--Alpha--Unknown");
        assert_eq!(alias.server(), "Unknown");
        assert_eq!(alias.info().unwrap().author, "Alpha");
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = ReportId::parse("24-03-17--21-05--Safiyah--Alpha", "Unknown").unwrap();
        assert_eq!(
            serde_json::to_string(&id).unwrap(),
            "\"24-03-17--21-05--Safiyah--Alpha\""
        );
    }
}
