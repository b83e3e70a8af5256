use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::tasks::processor::TicketProcessor;

/// Registers the repeating poll job. Cycles never overlap: the processor
/// serializes them, so a slow cycle delays the next tick instead of racing it.
pub async fn configure_poll_job(
    interval: Duration,
    processor: Arc<TicketProcessor>,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;
    let job = Job::new_repeated_async(interval, move |_id, _l| {
        let processor = processor.clone();
        Box::pin(async move {
            tracing::info!(target: "scheduler", "poll job triggered");
            match processor.run_cycle(None).await {
                Ok(stats) => tracing::info!(target: "scheduler", %stats, "poll cycle finished"),
                Err(err) => tracing::error!(target: "scheduler", error = %err, "poll cycle failed"),
            }
        })
    })?;
    scheduler.add(job).await?;
    tracing::info!(target: "scheduler", interval_secs = interval.as_secs(), "poll job registered");
    scheduler.start().await?;
    Ok(scheduler)
}
