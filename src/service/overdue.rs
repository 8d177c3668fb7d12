use super::JourneyService;
use crate::error::JourneyResult;
use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Overdue journeys found.
    pub checked: usize,
    /// New overdue alerts written.
    pub created: usize,
    /// Journeys skipped because of a store error.
    pub failed: usize,
}

impl JourneyService {
    /// Raises one overdue alert per started journey past its expected end.
    /// Journey status is left alone. A failure on one journey is logged and
    /// the sweep moves on.
    pub async fn run_overdue_sweep(&self) -> JourneyResult<SweepReport> {
        let now = self.clock.now();
        let overdue = self.store.overdue_journeys(now).await?;

        let mut report = SweepReport {
            checked: overdue.len(),
            ..SweepReport::default()
        };

        for journey in &overdue {
            match self.store.insert_overdue_alert(journey, now).await {
                Ok(Some(alert)) => {
                    info!(
                        "Overdue alert {} for journey {} (child {}, expected end {:?})",
                        alert.id, journey.id, journey.child_id, journey.expected_end_time
                    );
                    report.created += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Overdue check failed for journey {}: {}", journey.id, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Checked {} overdue journeys. Triggered {} new SOS alerts ({} failed).",
            report.checked, report.created, report.failed
        );
        Ok(report)
    }
}
