//! Healed selectors as they live in the cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::element::ElementFingerprint;

/// A selector that is known to have worked, plus its track record.
///
/// A fresh entry counts as one successful attempt, so it starts at a
/// success rate of 1.0 and degrades as lookups fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSelector {
    pub selector: String,
    #[serde(default)]
    pub fingerprint: Option<ElementFingerprint>,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default = "one")]
    pub successes: u64,
    #[serde(default = "one")]
    pub attempts: u64,
}

fn one() -> u64 {
    1
}

impl CachedSelector {
    pub fn new(selector: impl Into<String>, fingerprint: Option<ElementFingerprint>) -> Self {
        let now = Utc::now();
        Self {
            selector: selector.into(),
            fingerprint,
            created_at: now,
            last_used: now,
            usage_count: 0,
            successes: 1,
            attempts: 1,
        }
    }

    pub fn record_usage(&mut self, success: bool) {
        self.usage_count += 1;
        self.attempts += 1;
        if success {
            self.successes += 1;
        }
        self.last_used = Utc::now();
    }

    pub fn current_success_rate(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        self.successes as f64 / self.attempts as f64
    }
}
