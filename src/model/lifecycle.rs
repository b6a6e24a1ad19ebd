//! Status shared by roaming agreements and infrastructure contracts.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleStatus {
    Pending,
    Active,
    Suspended,
    Terminated,
    Expired,
}

impl LifecycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStatus::Pending => "PENDING",
            LifecycleStatus::Active => "ACTIVE",
            LifecycleStatus::Suspended => "SUSPENDED",
            LifecycleStatus::Terminated => "TERMINATED",
            LifecycleStatus::Expired => "EXPIRED",
        }
    }

    /// No command is accepted once a record reaches a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleStatus::Terminated | LifecycleStatus::Expired)
    }
}

impl std::fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Longest accepted agreement or contract duration, in days.
pub const MAX_DURATION_DAYS: u32 = 36_500;

/// `now > created + duration_days`. An end beyond the representable range never
/// elapses.
pub fn is_past_duration(created: DateTime<Utc>, duration_days: u32, now: DateTime<Utc>) -> bool {
    Duration::try_days(i64::from(duration_days))
        .and_then(|d| created.checked_add_signed(d))
        .map_or(false, |end| now > end)
}

/// Shared duration rule for agreement and contract terms.
pub fn check_duration(duration_days: u32) -> Result<(), String> {
    if duration_days == 0 {
        Err("duration must be > 0 days".to_string())
    } else if duration_days > MAX_DURATION_DAYS {
        Err(format!(
            "duration {} exceeds {} days",
            duration_days, MAX_DURATION_DAYS
        ))
    } else {
        Ok(())
    }
}

/// Status as observed at `now`: a non-terminal record whose duration has elapsed
/// reads as EXPIRED whatever its stored status says.
pub fn observed_status(
    stored: LifecycleStatus,
    created: DateTime<Utc>,
    duration_days: u32,
    now: DateTime<Utc>,
) -> LifecycleStatus {
    if !stored.is_terminal() && is_past_duration(created, duration_days, now) {
        LifecycleStatus::Expired
    } else {
        stored
    }
}

/// Next timestamp for a strictly increasing field: `now`, or one millisecond past
/// the previous value if the clock has not moved forward.
pub fn strictly_after(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match previous {
        Some(prev) if now <= prev => prev + Duration::milliseconds(1),
        _ => now,
    }
}
