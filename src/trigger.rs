//! The scheduled trigger: submits a new job on a fixed interval instead of waiting
//! for an HTTP request, for unattended operation alongside (or instead of) the API.
use crate::orchestrator::Orchestrator;
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Run the interval loop until a shutdown signal (Ctrl-C) arrives.
pub async fn run(orchestrator: Arc<Orchestrator>, period: Duration) {
    let mut ticker = interval(period);
    // The first tick fires immediately; skip it so the first job is submitted one
    // full interval after startup, not at t=0.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let job_id = orchestrator.submit().await;
                info!("scheduled trigger submitted job {job_id}");
            }
            () = wait_for_shutdown() => {
                info!("scheduled trigger stopping");
                break;
            }
        }
    }
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::DataSource;

    #[tokio::test(start_paused = true)]
    async fn submits_a_job_on_each_tick() {
        let orchestrator = Orchestrator::new(DataSource::LocalTest, 1, 30);

        let handle = tokio::spawn(run(Arc::clone(&orchestrator), Duration::from_secs(60)));
        tokio::time::advance(Duration::from_secs(61)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(orchestrator.list().await.len(), 1);
        handle.abort();
    }
}
