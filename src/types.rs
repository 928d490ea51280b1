use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Result of one host's probe session. Produced exactly once per
/// launched prober, consumed exactly once by the fleet checker.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub host: String,
    pub success: bool,
}

/// Aggregate record of one fleet check, optionally written as JSON.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CheckSummary {
    pub hosts_checked: usize,
    pub any_up: bool,
    pub duration_ms: u64,
    pub timestamp: String,
}

impl CheckSummary {
    pub fn new(hosts_checked: usize, any_up: bool, duration_ms: u64) -> Self {
        Self {
            hosts_checked,
            any_up,
            duration_ms,
            timestamp: now_rfc3339(),
        }
    }
}

fn now_rfc3339() -> String {
    // RFC3339 UTC timestamp; falls back to the epoch if formatting fails.
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
