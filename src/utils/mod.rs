//! Utility functions and helpers.

pub mod log;

/// Worker pool size for the parallel stages.
///
/// `debug` forces a single worker. An explicit `configured` size wins over
/// the automatic one, which is the available parallelism minus one.
pub fn worker_count(configured: Option<usize>, debug: bool) -> usize {
    if debug {
        return 1;
    }
    if let Some(n) = configured {
        return n.max(1);
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_sub(1)
        .max(1)
}

/// Substitute `{key}` placeholders in every argument of a command template.
pub fn render_template(template: &[String], values: &[(&str, &str)]) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            values.iter().fold(arg.clone(), |acc, (key, value)| {
                acc.replace(&format!("{{{key}}}"), value)
            })
        })
        .collect()
}
