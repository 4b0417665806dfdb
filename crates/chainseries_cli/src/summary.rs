//! End-of-run table of per-source results

use chainseries_sampler::SourceOutcome;
use chainseries_warehouse::PublishOutcome;

#[derive(Debug, Clone, PartialEq, Eq)]
struct SummaryRow {
    source: String,
    step: &'static str,
    status: &'static str,
    detail: String,
}

/// Collected and published results of one pass
#[derive(Debug, Default)]
pub struct RunSummary {
    rows: Vec<SummaryRow>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_collect(&mut self, source: &str, outcome: &SourceOutcome) {
        let (status, detail) = match outcome {
            Ok(report) => match report.window {
                None => (
                    "fresh",
                    format!(
                        "up to date at block {}",
                        report
                            .series
                            .last_height()
                            .map(|h| h.to_string())
                            .unwrap_or_else(|| "-".to_string())
                    ),
                ),
                Some(window) => (
                    "ok",
                    format!(
                        "{} new rows from blocks {}..={} via {} ({} total)",
                        report.new_rows,
                        window.start,
                        window.end,
                        report.endpoint,
                        report.series.len()
                    ),
                ),
            },
            Err(e) => ("FAILED", e.to_string()),
        };
        self.push(source, "collect", status, detail);
    }

    pub fn record_publish(&mut self, source: &str, table: &str, outcome: &PublishOutcome) {
        let (status, detail) = match outcome {
            PublishOutcome::Published { rows } => ("ok", format!("{} rows appended to {}", rows, table)),
            PublishOutcome::UpToDate => ("fresh", format!("{} already up to date", table)),
            PublishOutcome::Failed {
                reason,
                published_rows,
            } => (
                "FAILED",
                format!("{} ({} rows appended to {})", reason, published_rows, table),
            ),
        };
        self.push(source, "publish", status, detail);
    }

    pub fn record_failure(&mut self, source: &str, step: &'static str, reason: String) {
        self.push(source, step, "FAILED", reason);
    }

    fn push(&mut self, source: &str, step: &'static str, status: &'static str, detail: String) {
        self.rows.push(SummaryRow {
            source: source.to_string(),
            step,
            status,
            detail,
        });
    }

    /// Number of failed steps; any failure makes the run exit non-zero
    pub fn failures(&self) -> usize {
        self.rows.iter().filter(|r| r.status == "FAILED").count()
    }

    pub fn render(&self) -> String {
        let width = self
            .rows
            .iter()
            .map(|r| r.source.len())
            .max()
            .unwrap_or(0)
            .max("SOURCE".len());

        let mut out = format!("{:<width$}  {:<7}  {:<6}  DETAIL\n", "SOURCE", "STEP", "STATUS");
        for row in &self.rows {
            out.push_str(&format!(
                "{:<width$}  {:<7}  {:<6}  {}\n",
                row.source, row.step, row.status, row.detail
            ));
        }
        out.push_str(&format!(
            "{} steps, {} failed\n",
            self.rows.len(),
            self.failures()
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainseries_core::{SamplingWindow, Series};
    use chainseries_sampler::{SourceError, SourceReport};

    fn report(window: Option<SamplingWindow>) -> SourceReport {
        SourceReport {
            source: "lp_eth_pool".to_string(),
            endpoint: "rpc.example".to_string(),
            window,
            new_rows: 3,
            series: Series::new(),
        }
    }

    #[test]
    fn test_counts_failures() {
        let mut summary = RunSummary::new();
        summary.record_collect("lp_eth_pool", &Ok(report(SamplingWindow::new(100, 200, 50))));
        summary.record_collect("slp_eth", &Err(SourceError::TaskFailed("panicked".to_string())));
        summary.record_publish(
            "lp_eth_pool",
            "lp_eth_pool_eth",
            &PublishOutcome::Failed {
                reason: "HTTP 500".to_string(),
                published_rows: 0,
            },
        );
        summary.record_publish("vault", "vault_eth", &PublishOutcome::UpToDate);

        assert_eq!(summary.failures(), 2);
    }

    #[test]
    fn test_render() {
        let mut summary = RunSummary::new();
        summary.record_collect("lp_eth_pool", &Ok(report(SamplingWindow::new(100, 200, 50))));
        summary.record_collect("vault", &Ok(report(None)));

        let table = summary.render();
        assert!(table.starts_with("SOURCE"));
        assert!(table.contains("3 new rows from blocks 100..=200 via rpc.example"));
        assert!(table.contains("up to date at block -"));
        assert!(table.ends_with("2 steps, 0 failed\n"));
    }
}
