// src/config/duration.rs

//! Duration strings like `"5m"`, `"250ms"` or `"1h30m"`.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::errors::{Result, RunSourceError};

static WHOLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+(?:ms|s|m|h))+$").expect("valid regex"));
static GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)(ms|s|m|h)").expect("valid regex"));

/// Parse a duration made of one or more `<integer><unit>` groups.
///
/// Units: `ms`, `s`, `m`, `h`. Surrounding whitespace is ignored, units are
/// case-insensitive, and a total of zero is rejected.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    if s.is_empty() {
        return Err(RunSourceError::InvalidDuration("empty duration string".to_string()));
    }
    if !WHOLE.is_match(&s) {
        return Err(RunSourceError::InvalidDuration(format!(
            "'{s}' is not a duration; expected e.g. 250ms, 30s, 5m, 1h30m"
        )));
    }

    let mut total = Duration::ZERO;
    for caps in GROUP.captures_iter(&s) {
        let value: u64 = caps[1]
            .parse()
            .map_err(|e| RunSourceError::InvalidDuration(format!("'{}': {e}", &caps[1])))?;
        let part = match &caps[2] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.saturating_mul(60)),
            _ => Duration::from_secs(value.saturating_mul(60 * 60)),
        };
        total = total.saturating_add(part);
    }

    if total.is_zero() {
        return Err(RunSourceError::InvalidDuration(format!("'{s}' must be greater than zero")));
    }
    Ok(total)
}
