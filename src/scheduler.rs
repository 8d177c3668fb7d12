use crate::config::AppConfig;
use crate::service::JourneyService;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct SweepSchedule {
    pub interval: Duration,
    pub max_failures: u32,
    pub cooldown: Duration,
}

impl From<&AppConfig> for SweepSchedule {
    fn from(config: &AppConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.sweep_interval_secs.max(1)),
            max_failures: config.sweep_max_failures.max(1),
            cooldown: Duration::from_secs(config.sweep_cooldown_secs),
        }
    }
}

/// Shutdown channel flipped to true once `signal` resolves. If the listener
/// fails the sender is kept alive, so sweeps carry on until the process exits.
pub fn shutdown_on<F>(signal: F) -> watch::Receiver<bool>
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match signal.await {
            Ok(()) => {
                info!("Shutdown requested");
                let _ = tx.send(true);
            }
            Err(e) => {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        }
    });
    rx
}

/// Runs the overdue sweep on a fixed interval until `shutdown` flips to true.
/// After `max_failures` consecutive failed runs it backs off for `cooldown`.
pub async fn run_overdue_sweeps(
    service: Arc<JourneyService>,
    schedule: SweepSchedule,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        "Overdue sweep scheduled every {}s",
        schedule.interval.as_secs()
    );

    let mut ticker = tokio::time::interval(schedule.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut consecutive_failures = 0;

    loop {
        // Circuit Breaker Check
        if consecutive_failures >= schedule.max_failures {
            warn!(
                "Circuit breaker tripped ({} consecutive sweep failures)! Sleeping for {} seconds...",
                consecutive_failures,
                schedule.cooldown.as_secs()
            );
            tokio::select! {
                _ = tokio::time::sleep(schedule.cooldown) => {}
                _ = shutdown.changed() => {}
            }
            consecutive_failures = 0;
            info!("Circuit breaker reset. Resuming sweeps.");
        }

        if *shutdown.borrow() {
            info!("Overdue sweep shutting down");
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    warn!("Shutdown channel closed, stopping overdue sweep");
                    break;
                }
                continue;
            }
        }

        match service.run_overdue_sweep().await {
            Ok(report) if report.failed > 0 => {
                // Partial failures are logged per journey; the run itself counts.
                consecutive_failures = 0;
                warn!("{} journeys could not be checked", report.failed);
            }
            Ok(_) => consecutive_failures = 0,
            Err(e) => {
                consecutive_failures += 1;
                error!(
                    "Overdue sweep failed: {}. Incrementing failure count ({} / {})",
                    e, consecutive_failures, schedule.max_failures
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::db::{JourneyStore, MemoryStore};
    use crate::documents::LocalDocumentStore;
    use crate::models::{JourneyStatus, NewJourney, NewUser, Role};
    use chrono::NaiveDate;

    #[tokio::test(start_paused = true)]
    async fn sweeps_until_shutdown() {
        let now = NaiveDate::from_ymd_opt(2026, 2, 9)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let store = Arc::new(MemoryStore::new());
        let parent = store
            .insert_user(
                &NewUser {
                    name: "Priya".into(),
                    email: "priya@example.com".into(),
                    password_hash: "x".into(),
                    role: Role::Parent,
                    parent_id: None,
                },
                now,
            )
            .await
            .unwrap();
        let child = store
            .insert_user(
                &NewUser {
                    name: "Chintu".into(),
                    email: "chintu@example.com".into(),
                    password_hash: "x".into(),
                    role: Role::Child,
                    parent_id: Some(parent.id),
                },
                now,
            )
            .await
            .unwrap();
        store
            .insert_journey(
                &NewJourney {
                    child_id: child.id,
                    parent_id: parent.id,
                    start_location: "Home".into(),
                    end_location: "School".into(),
                    status: JourneyStatus::Started,
                    started_at: Some(now - chrono::Duration::minutes(45)),
                    expected_end_time: Some(now - chrono::Duration::minutes(15)),
                    duration_minutes: Some(30),
                },
                now,
            )
            .await
            .unwrap();

        let service = Arc::new(JourneyService::new(
            store.clone(),
            Arc::new(FixedClock::new(now)),
            Arc::new(LocalDocumentStore::new(std::env::temp_dir())),
        ));
        let (tx, rx) = watch::channel(false);
        let schedule = SweepSchedule {
            interval: Duration::from_secs(60),
            max_failures: 3,
            cooldown: Duration::from_secs(300),
        };
        let handle = tokio::spawn(run_overdue_sweeps(service, schedule, rx));

        tokio::time::sleep(Duration::from_secs(150)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(store.count_alerts(None).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_follows_the_signal() {
        let mut rx = shutdown_on(async { Ok(()) });
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_signal_listener_keeps_sweeps_running() {
        let mut rx = shutdown_on(async {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "no signal handler"))
        });

        // A dropped sender would resolve `changed` with an error right away.
        let waited = tokio::time::timeout(Duration::from_secs(3600), rx.changed()).await;
        assert!(waited.is_err());
        assert!(!*rx.borrow());
    }
}
