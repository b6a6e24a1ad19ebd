//! Migration run context.
//!
//! Carries the run id, deadline and cancellation flag through a run, and
//! produces the log context for the run and for each region in it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::logging::structured::LogContext;
use crate::model::RegionLabel;

use super::aggregate::TimeWindow;

#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub window: TimeWindow,
    cancel: Arc<AtomicBool>,
}

impl RunContext {
    pub fn new(
        run_id: &str,
        started_at: DateTime<Utc>,
        deadline: DateTime<Utc>,
        window: TimeWindow,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            run_id: run_id.to_string(),
            started_at,
            deadline,
            window,
            cancel,
        }
    }

    /// A context that is never cancelled and never times out.
    pub fn detached(run_id: &str, window: TimeWindow) -> Self {
        Self::new(
            run_id,
            window.end,
            DateTime::<Utc>::MAX_UTC,
            window,
            Arc::new(AtomicBool::new(false)),
        )
    }

    /// Checked between items; a run never stops mid-item.
    pub fn should_stop(&self, now: DateTime<Utc>) -> bool {
        self.cancel.load(Ordering::SeqCst) || now >= self.deadline
    }

    pub fn log_context(&self) -> LogContext {
        LogContext::new(&self.run_id)
    }

    pub fn region_context(&self, region: &RegionLabel) -> LogContext {
        self.log_context().with_item(&region.to_string())
    }
}
