use crate::models::chart::ChartWindow;
use crate::models::summary::DailyPoint;

use super::aggregation_service::MIN_ROI_BASIS;

/// Default number of dates per chart page.
pub const DEFAULT_PAGE_SIZE: usize = 30;

/// Paginates the daily series into fixed-size windows and holds the only
/// piece of UI-facing state: the current page cursor.
///
/// The series is chunked from the oldest side, so the newest window may be
/// short. Pages are user-facing and inverted: page 0 is always the latest
/// window; higher pages walk back in time.
pub struct ChartService {
    page_index: usize,
    page_size: usize,
}

impl ChartService {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_index: 0,
            page_size: page_size.max(1),
        }
    }

    #[must_use]
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Jump back to the latest window (e.g. after new data arrives).
    pub fn reset(&mut self) {
        self.page_index = 0;
    }

    /// Step one window back in time. No-op when already at the oldest.
    pub fn older_page(&mut self, series: &[DailyPoint]) -> ChartWindow {
        let total = total_chunks(series.len(), self.page_size);
        if self.page_index + 1 < total {
            self.page_index += 1;
        }
        self.window(series)
    }

    /// Step one window toward the present. No-op when already at the latest.
    pub fn newer_page(&mut self, series: &[DailyPoint]) -> ChartWindow {
        self.page_index = self.page_index.saturating_sub(1);
        self.window(series)
    }

    /// Window at the current cursor, re-clamped against the series — the
    /// series may have shrunk since the cursor last moved.
    pub fn window(&mut self, series: &[DailyPoint]) -> ChartWindow {
        let total = total_chunks(series.len(), self.page_size);
        if total > 0 && self.page_index >= total {
            self.page_index = total - 1;
        }
        Self::window_for(series, self.page_index, self.page_size)
    }

    /// Cut the window for a user-facing page index.
    ///
    /// Page 0 selects the chunk holding the most recent dates; the index is
    /// clamped so it can never address past either end of the series.
    pub fn window_for(series: &[DailyPoint], page_index: usize, page_size: usize) -> ChartWindow {
        let page_size = page_size.max(1);
        let total = total_chunks(series.len(), page_size);
        if total == 0 {
            return ChartWindow {
                points: Vec::new(),
                period_pnl: 0.0,
                period_roi_percent: 0.0,
                page_index: 0,
                total_chunks: 0,
            };
        }

        let page_index = page_index.min(total - 1);
        // Chunk 0 holds the oldest dates; invert so page 0 is the newest.
        let chunk = total - 1 - page_index;
        let start = chunk * page_size;
        let end = (start + page_size).min(series.len());
        let points = series[start..end].to_vec();

        let period_pnl: f64 = points.iter().map(|p| p.net_pnl).sum();
        // Period return is measured against the capital at the window start.
        let period_roi_percent = match points.first() {
            Some(first) if first.daily_basis.abs() > MIN_ROI_BASIS => {
                period_pnl / first.daily_basis * 100.0
            }
            _ => 0.0,
        };

        ChartWindow {
            points,
            period_pnl,
            period_roi_percent,
            page_index,
            total_chunks: total,
        }
    }
}

fn total_chunks(len: usize, page_size: usize) -> usize {
    len.div_ceil(page_size)
}

impl Default for ChartService {
    fn default() -> Self {
        Self::new()
    }
}
