//! Retention policy: pure decision function over backup ages.
//!
//! Each tier (daily/weekly/monthly/yearly) defines an independent window
//! reaching back from "now". A backup is retained if it falls inside any
//! enabled window; the tiers combine with logical OR, not a generational
//! intersection. A tier with count 0 is disabled and never retains on
//! its own.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    pub keep_daily: u32,
    pub keep_weekly: u32,
    pub keep_monthly: u32,
    pub keep_yearly: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            keep_daily: 7,
            keep_weekly: 4,
            keep_monthly: 12,
            keep_yearly: 7,
        }
    }
}

impl RetentionPolicy {
    /// Whether a backup completed at `backup_date` should be kept as of
    /// `now`. Stateless; callers pass the clock in for testability.
    pub fn should_retain(&self, backup_date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        if self.keep_daily > 0 && backup_date >= now - Duration::days(i64::from(self.keep_daily)) {
            return true;
        }
        if self.keep_weekly > 0
            && backup_date >= now - Duration::days(i64::from(self.keep_weekly) * 7)
        {
            return true;
        }
        if self.keep_monthly > 0 {
            if let Some(cutoff) = now.checked_sub_months(Months::new(self.keep_monthly)) {
                if backup_date >= cutoff {
                    return true;
                }
            }
        }
        if self.keep_yearly > 0 {
            if let Some(cutoff) = now.checked_sub_months(Months::new(self.keep_yearly * 12)) {
                if backup_date >= cutoff {
                    return true;
                }
            }
        }
        false
    }
}
