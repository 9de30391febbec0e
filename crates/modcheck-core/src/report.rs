//! Result of a single lifecycle run

use crate::error::LifecycleError;
use crate::lifecycle::LifecycleState;
use crate::provider::ResourceRecord;
use chrono::{DateTime, Utc};

/// Everything a run observed, consumed once by the caller
#[derive(Debug)]
pub struct RunReport {
    /// Generated resource name
    pub run_name: String,

    /// Identifier derived from the module output, if extraction succeeded
    pub identifier: Option<String>,

    /// Records matching the identifier, if verification found any
    pub records: Vec<ResourceRecord>,

    /// States reached, in order
    pub history: Vec<LifecycleState>,

    /// First forward-path failure (apply, output, extraction, verification)
    pub failure: Option<LifecycleError>,

    /// Teardown failure, reported independently of `failure`
    pub teardown_error: Option<LifecycleError>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn new(run_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_name: run_name.into(),
            identifier: None,
            records: Vec::new(),
            history: vec![LifecycleState::Init],
            failure: None,
            teardown_error: None,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn passed(&self) -> bool {
        self.failure.is_none() && self.teardown_error.is_none()
    }

    /// Last state reached
    pub fn state(&self) -> LifecycleState {
        self.history.last().copied().unwrap_or(LifecycleState::Init)
    }

    /// Whether the run got through `state` on its forward path
    pub fn reached(&self, state: LifecycleState) -> bool {
        self.history.contains(&state)
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// Human-readable causes of failure, forward failure first
    pub fn causes(&self) -> Vec<String> {
        self.failure
            .iter()
            .chain(self.teardown_error.iter())
            .map(|e| e.to_string())
            .collect()
    }

    pub(crate) fn enter(&mut self, state: LifecycleState) {
        self.history.push(state);
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Utc::now();
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verdict = if self.passed() { "PASS" } else { "FAIL" };
        write!(f, "{} {}", verdict, self.run_name)?;
        if let Some(identifier) = &self.identifier
            && identifier != &self.run_name
        {
            write!(f, " (identifier {})", identifier)?;
        }
        for cause in self.causes() {
            write!(f, "\n  - {}", cause)?;
        }
        Ok(())
    }
}
