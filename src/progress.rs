//! Progress reporting for long-running pipeline phases.
//!
//! Callers that don't care pass [`NoProgress`]. A UI can poll a shared
//! [`ProgressStatus`] from another task.

use log::info;
use std::sync::Mutex;

pub trait ProgressSink: Send + Sync {
    /// Announces the phase now running, e.g. `"reading logs"`.
    fn set_phase(&self, phase: &str);
    /// Completion of the current phase in `[0, 100]`.
    fn set_percentage(&self, percentage: f64);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn set_phase(&self, _phase: &str) {}
    fn set_percentage(&self, _percentage: f64) {}
}

/// Writes phase changes and progress to the `log` facade at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn set_phase(&self, phase: &str) {
        info!("Phase: {}", phase);
    }

    fn set_percentage(&self, percentage: f64) {
        info!("Progress: {:.1}%", percentage);
    }
}

#[derive(Debug, Default)]
struct StatusInner {
    phase: Option<String>,
    percentage: f64,
}

/// Thread-safe snapshot of the most recent phase and percentage.
#[derive(Debug, Default)]
pub struct ProgressStatus {
    inner: Mutex<StatusInner>,
}

impl ProgressStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// The phase last announced, or `None` before the first phase starts.
    pub fn phase(&self) -> Option<String> {
        self.inner
            .lock()
            .map(|inner| inner.phase.clone())
            .unwrap_or_default()
    }

    pub fn percentage(&self) -> f64 {
        self.inner.lock().map(|inner| inner.percentage).unwrap_or(0.0)
    }
}

impl ProgressSink for ProgressStatus {
    fn set_phase(&self, phase: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.phase = Some(phase.to_string());
            inner.percentage = 0.0;
        }
    }

    fn set_percentage(&self, percentage: f64) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.percentage = percentage.clamp(0.0, 100.0);
        }
    }
}
