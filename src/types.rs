use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// What the graph builder does with a dependency record that names a
/// resource key it does not know.
///
/// - `Fail`: abort the build with `SchedulerError::UnknownReference`
///   (default).
/// - `Ignore`: drop the dangling edge and log a warning.
///
/// A key can be "unknown" either because no such resource exists or because
/// the active filter excluded it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnknownReferencePolicy {
    #[default]
    Fail,
    Ignore,
}

impl FromStr for UnknownReferencePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail" => Ok(UnknownReferencePolicy::Fail),
            "ignore" => Ok(UnknownReferencePolicy::Ignore),
            other => Err(format!(
                "invalid unknown_reference_policy: {other} (expected \"fail\" or \"ignore\")"
            )),
        }
    }
}

/// Parse a duration string such as `"250ms"`, `"3s"`, `"5m"` or `"1h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;

    let secs_per_unit = match unit_part.trim().to_lowercase().as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        unit => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{}' is too large", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!(
            " Ignore ".parse::<UnknownReferencePolicy>(),
            Ok(UnknownReferencePolicy::Ignore)
        );
        assert!("drop".parse::<UnknownReferencePolicy>().is_err());
        assert_eq!(UnknownReferencePolicy::default(), UnknownReferencePolicy::Fail);
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("3s"), Ok(Duration::from_secs(3)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("5d").is_err());
        assert!(parse_duration("").is_err());
        assert_eq!(parse_duration("3h"), Ok(Duration::from_secs(10_800)));
        assert!(parse_duration("99999999999999999h").is_err());
        assert!(parse_duration("999999999999999999m").is_err());
    }
}
