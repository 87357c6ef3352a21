//! Sync queue reconciliation job.
//!
//! Retries remote calls that failed while the backend was unreachable.

use std::sync::Arc;

use domain::services::RegistrationStore;
use tracing::info;

use super::scheduler::{Job, JobFrequency};

pub struct ReconcileJob {
    store: Arc<RegistrationStore>,
    interval_secs: u64,
}

impl ReconcileJob {
    pub fn new(store: Arc<RegistrationStore>, interval_secs: u64) -> Self {
        Self {
            store,
            interval_secs,
        }
    }
}

#[async_trait::async_trait]
impl Job for ReconcileJob {
    fn name(&self) -> &'static str {
        "reconcile_pending_sync"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(self.interval_secs)
    }

    async fn execute(&self) -> Result<(), String> {
        let report = self.store.reconcile().await;
        if report.synced > 0 {
            info!(synced = report.synced, "Delivered queued remote calls");
        }
        if report.failed > 0 {
            return Err(format!(
                "{} queued remote calls still failing",
                report.failed
            ));
        }
        Ok(())
    }
}
