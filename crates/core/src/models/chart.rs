use serde::{Deserialize, Serialize};

use super::summary::DailyPoint;

/// One paginated window over the daily series, plus its period summary.
///
/// The core computes all the numbers — the frontend only renders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartWindow {
    /// The visible slice, chronological (oldest first)
    pub points: Vec<DailyPoint>,

    /// Sum of net P&L across the window
    pub period_pnl: f64,

    /// period_pnl / daily_basis at the window start × 100 — return relative
    /// to the capital at the start of this visible window, not all-time
    pub period_roi_percent: f64,

    /// User-facing page cursor: 0 is always the most recent window
    pub page_index: usize,

    /// Total number of windows the series splits into
    pub total_chunks: usize,
}

impl ChartWindow {
    /// An older window exists behind this one.
    #[must_use]
    pub fn has_older(&self) -> bool {
        self.page_index + 1 < self.total_chunks
    }

    /// A more recent window exists in front of this one.
    #[must_use]
    pub fn has_newer(&self) -> bool {
        self.page_index > 0
    }
}
