//! Resume planning: where to continue sampling a source, and whether to at all

use chainseries_core::{Height, SamplingWindow, Series};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("No persisted data and no creation height to start from")]
    MissingCreationHeight,
}

/// Computes the next sampling window from persisted state
#[derive(Debug, Clone, Copy)]
pub struct ResumePlanner {
    stride: u64,
    freshness_threshold: u64,
}

impl ResumePlanner {
    /// A zero stride is treated as 1
    pub fn new(stride: u64, freshness_threshold: u64) -> Self {
        Self {
            stride: stride.max(1),
            freshness_threshold,
        }
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn freshness_threshold(&self) -> u64 {
        self.freshness_threshold
    }

    /// Window to sample next, or `None` when the series is fresh or nothing is left.
    ///
    /// An empty series starts at `creation_height`, which must then be known.
    /// Otherwise sampling resumes right after the last persisted height.
    pub fn plan(
        &self,
        persisted: &Series,
        creation_height: Option<Height>,
        current_height: Height,
        requested_end: Option<Height>,
    ) -> Result<Option<SamplingWindow>, PlanError> {
        let end = requested_end.unwrap_or(current_height);

        let start = match persisted.last_height() {
            None => creation_height.ok_or(PlanError::MissingCreationHeight)?,
            Some(last) => {
                if end.saturating_sub(last) < self.freshness_threshold {
                    return Ok(None);
                }
                match last.checked_add(1) {
                    Some(start) => start,
                    None => return Ok(None),
                }
            }
        };

        Ok(SamplingWindow::new(start, end, self.stride))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainseries_core::Sample;
    use chrono::Utc;

    fn persisted(heights: &[Height]) -> Series {
        heights
            .iter()
            .map(|h| Sample::new(*h, Utc::now()))
            .collect()
    }

    #[test]
    fn test_empty_series_starts_at_creation() {
        let planner = ResumePlanner::new(50, 50);
        let window = planner.plan(&Series::new(), Some(100), 210, None).unwrap().unwrap();
        assert_eq!(window, SamplingWindow { start: 100, end: 210, stride: 50 });
        assert_eq!(window.heights().collect::<Vec<_>>(), vec![100, 150, 200]);
    }

    #[test]
    fn test_empty_series_needs_creation_height() {
        let planner = ResumePlanner::new(50, 50);
        assert_eq!(
            planner.plan(&Series::new(), None, 210, None),
            Err(PlanError::MissingCreationHeight)
        );
    }

    #[test]
    fn test_creation_after_head_is_nothing_to_do() {
        let planner = ResumePlanner::new(10, 10);
        assert_eq!(planner.plan(&Series::new(), Some(500), 400, None), Ok(None));
    }

    #[test]
    fn test_resumes_after_last_persisted() {
        let planner = ResumePlanner::new(50, 50);
        let window = planner
            .plan(&persisted(&[100, 150, 200]), Some(100), 400, None)
            .unwrap()
            .unwrap();
        assert_eq!(window.start, 201);
        assert_eq!(window.end, 400);
    }

    #[test]
    fn test_fresh_series_is_skipped() {
        let planner = ResumePlanner::new(50, 100);
        // 290 - 200 < 100
        assert_eq!(planner.plan(&persisted(&[200]), Some(0), 290, None), Ok(None));
        // 300 - 200 == threshold samples again
        assert!(planner.plan(&persisted(&[200]), Some(0), 300, None).unwrap().is_some());
    }

    #[test]
    fn test_requested_end_overrides_head() {
        let planner = ResumePlanner::new(10, 1);
        let window = planner
            .plan(&persisted(&[100]), None, 10_000, Some(150))
            .unwrap()
            .unwrap();
        assert_eq!((window.start, window.end), (101, 150));

        // Requested end below what is persisted
        assert_eq!(planner.plan(&persisted(&[100]), None, 10_000, Some(90)), Ok(None));
    }

    #[test]
    fn test_zero_threshold_still_requires_progress() {
        let planner = ResumePlanner::new(1, 0);
        assert_eq!(planner.plan(&persisted(&[100]), None, 100, None), Ok(None));
        let window = planner.plan(&persisted(&[100]), None, 101, None).unwrap().unwrap();
        assert_eq!((window.start, window.end), (101, 101));
    }
}
