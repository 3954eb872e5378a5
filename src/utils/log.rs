// src/utils/log.rs

//! Structured log helpers on top of the `log` facade.
//!
//! Pipeline stages log one line per report in the form
//! `{elapsed} | {report_id} | {message}` so a batch can be followed per
//! report and per stage in the uploads log.

use std::time::Instant;

/// Log a debug message
pub fn debug(message: &str) {
    ::log::debug!("{}", message);
}

/// Log an info message
pub fn info(message: &str) {
    ::log::info!("{}", message);
}

/// Log a warning message
pub fn warn(message: &str) {
    ::log::warn!("{}", message);
}

/// Log an error message
pub fn error(message: &str) {
    ::log::error!("{}", message);
}

/// Log a step in a process
pub fn step(step_num: usize, total: usize, message: &str) {
    ::log::info!("[STEP {}/{}] {}", step_num, total, message);
}

/// Log a header
pub fn header(title: &str) {
    let border = "═".repeat(60);
    ::log::info!("{}", border);
    ::log::info!("  {}", title);
    ::log::info!("{}", border);
}

/// Log a sub-item (indented)
pub fn sub_item(message: &str) {
    ::log::info!("    {}", message);
}

/// Log a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    ::log::info!("[SUMMARY] {}", title);
    for (key, value) in items {
        ::log::info!("    {}: {}", key, value);
    }
}

/// Milliseconds since `start`, right-aligned for log columns.
pub fn elapsed(start: Instant) -> String {
    format_ms(start.elapsed().as_secs_f64() * 1000.0)
}

fn format_ms(ms: f64) -> String {
    format!("{:>9.1}ms", ms)
}

/// Prefix a per-report message with elapsed time and the padded report id.
pub fn report_line(start: Instant, report_id: &str, message: &str) -> String {
    format!("{} | {:50} | {}", elapsed(start), report_id, message)
}
