//! Time-driven order progression.
//!
//! Orders move `created → processing → completed` purely by age. A single
//! background task applies both steps on every tick using the admin pool.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use digital_distributor_core::{AutoProgression, DbRole};

use crate::db::{RepositoryError, RolePools, orders};

/// Apply every progression step as of `now`.
///
/// Returns the number of orders moved by each step, in step order. Both
/// updates share one transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a connection or update fails.
pub async fn advance_order_statuses(
    pools: &RolePools,
    progression: &AutoProgression,
    now: DateTime<Utc>,
) -> Result<[u64; 2], RepositoryError> {
    let mut tx = pools.begin_as(DbRole::Admin, None).await?;

    let [to_processing, to_completed] = progression.steps(now);
    let moved = [
        orders::advance(&mut tx, &to_processing).await?,
        orders::advance(&mut tx, &to_completed).await?,
    ];

    tx.commit().await?;
    Ok(moved)
}

/// Spawn the updater loop. It runs until `shutdown` is cancelled.
///
/// Failures are logged and retried on the next tick.
pub fn spawn_order_status_updater(
    pools: RolePools,
    progression: AutoProgression,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    info!(interval_secs = every.as_secs(), "Starting order status updater");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    info!("Order status updater stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match advance_order_statuses(&pools, &progression, Utc::now()).await {
                        Ok([processing, completed]) => {
                            debug!(processing, completed, "Order statuses advanced");
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to advance order statuses");
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;

    #[tokio::test]
    async fn test_updater_stops_on_cancel() {
        // Port 1 refuses connections, so every tick fails fast and is logged.
        let config = ApiConfig::for_tests("postgres://127.0.0.1:1/shop");
        let pools = RolePools::connect_lazy(&config.database).unwrap();
        let shutdown = CancellationToken::new();

        let handle = spawn_order_status_updater(
            pools,
            AutoProgression::default(),
            Duration::from_millis(10),
            shutdown.clone(),
        );

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(15), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_advance_reports_unreachable_database() {
        let config = ApiConfig::for_tests("postgres://127.0.0.1:1/shop");
        let pools = RolePools::connect_lazy(&config.database).unwrap();

        let result = advance_order_statuses(&pools, &AutoProgression::default(), Utc::now()).await;
        assert!(matches!(result, Err(RepositoryError::Database(_))));
    }
}
