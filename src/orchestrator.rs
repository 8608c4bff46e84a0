//! Runs the input-bundle -> MILP -> schedule -> sink pipeline as background jobs,
//! behind a bounded worker pool and a job table queried for status.
//!
//! Grounded on the original job manager's `ThreadPoolExecutor` + status-dict design:
//! a job's timeout is not enforced by cancelling the running task, it is detected the
//! next time its status is read (see `JobTable::status`).
use crate::domain::{InputBundle, RULE_TIMEKEY_FORMAT};
use crate::error::PlannerError;
use crate::milp;
use crate::schedule;
use crate::source::DataSource;
use chrono::Local;
use log::{error, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use uuid::Uuid;

/// The lifecycle state of one submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Timeout,
}

/// The outcome of a completed job, suitable for returning over the HTTP API.
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub bottleneck_time_min: f64,
    pub record_count: usize,
}

#[derive(Debug, Clone)]
struct JobRecord {
    status: JobStatus,
    start_time: Option<Instant>,
    result: Option<JobResult>,
    error: Option<String>,
}

impl JobRecord {
    fn pending() -> Self {
        Self {
            status: JobStatus::Pending,
            start_time: None,
            result: None,
            error: None,
        }
    }
}

/// A job's status and outcome as reported to a caller.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusView {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub result: Option<JobResult>,
    pub error: Option<String>,
}

/// Runs submitted jobs on a bounded pool of concurrent workers, and answers status
/// queries against a shared job table.
pub struct Orchestrator {
    jobs: Mutex<HashMap<Uuid, JobRecord>>,
    semaphore: Arc<Semaphore>,
    data_source: Arc<DataSource>,
    timeout: Duration,
}

impl Orchestrator {
    #[must_use]
    pub fn new(data_source: DataSource, workers: usize, timeout_sec: u64) -> Arc<Self> {
        Arc::new(Self {
            jobs: Mutex::new(HashMap::new()),
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
            data_source: Arc::new(data_source),
            timeout: Duration::from_secs(timeout_sec),
        })
    }

    /// Submit a new job, returning its ID immediately. The pipeline runs in the
    /// background; poll `status` to observe its outcome.
    pub async fn submit(self: &Arc<Self>) -> Uuid {
        let job_id = Uuid::new_v4();
        self.jobs.lock().await.insert(job_id, JobRecord::pending());

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run(job_id).await;
        });

        job_id
    }

    async fn run(self: Arc<Self>, job_id: Uuid) {
        let _permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore is never closed");

        {
            let mut jobs = self.jobs.lock().await;
            if let Some(record) = jobs.get_mut(&job_id) {
                record.status = JobStatus::Running;
                record.start_time = Some(Instant::now());
            }
        }

        let outcome = self.execute(job_id).await;

        let mut jobs = self.jobs.lock().await;
        let Some(record) = jobs.get_mut(&job_id) else {
            return;
        };
        // A status read may already have flagged this job as timed out; don't let a
        // late-arriving result or error overwrite that.
        if record.status == JobStatus::Timeout {
            return;
        }
        match outcome {
            Ok(result) => {
                info!("job {job_id} completed: {} rows", result.record_count);
                record.status = JobStatus::Completed;
                record.result = Some(result);
            }
            Err(e) => {
                error!("job {job_id} failed: {e}");
                record.status = JobStatus::Failed;
                record.error = Some(e.to_string());
            }
        }
    }

    async fn execute(&self, job_id: Uuid) -> Result<JobResult, PlannerError> {
        let bundle: InputBundle = self.data_source.fetch_inputs().await?;
        let timeout_sec = self.timeout.as_secs();

        let solve_bundle = bundle.clone();
        let solution =
            tokio::task::spawn_blocking(move || milp::solve(&solve_bundle, timeout_sec))
                .await
                .map_err(|e| PlannerError::SolverError(e.to_string()))??;

        if !solution.is_success() {
            return Err(PlannerError::Infeasible);
        }

        let sched = schedule::reconstruct(&bundle, &solution);
        let record_count = sched
            .rows
            .iter()
            .filter(|r| r.quantity > 0.0)
            .count();
        let bottleneck_time_min = sched.bottleneck_time.value();

        let rule_timekey = Local::now().format(RULE_TIMEKEY_FORMAT).to_string();
        // A failed upload doesn't invalidate the schedule already computed above: the
        // job still lands `Completed` and its result stays readable via `status`.
        if let Err(e) = self.data_source.upload_results(&sched, &rule_timekey).await {
            warn!("job {job_id} computed a schedule but the sink rejected it: {e}");
        }

        Ok(JobResult {
            bottleneck_time_min,
            record_count,
        })
    }

    /// Look up a job's current status, applying the timeout-on-read check for any
    /// job still marked `Running`.
    pub async fn status(&self, job_id: Uuid) -> Option<JobStatusView> {
        let mut jobs = self.jobs.lock().await;
        let record = jobs.get_mut(&job_id)?;

        if record.status == JobStatus::Running {
            if let Some(start) = record.start_time {
                if start.elapsed() > self.timeout {
                    record.status = JobStatus::Timeout;
                    record.error = Some(format!(
                        "job exceeded time limit of {}s",
                        self.timeout.as_secs()
                    ));
                }
            }
        }

        Some(JobStatusView {
            job_id,
            status: record.status,
            result: record.result.clone(),
            error: record.error.clone(),
        })
    }

    /// List every job's current status, newest submissions last.
    pub async fn list(&self) -> Vec<JobStatusView> {
        let jobs = self.jobs.lock().await;
        let mut ids: Vec<Uuid> = jobs.keys().copied().collect();
        drop(jobs);
        ids.sort();
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(view) = self.status(id).await {
                out.push(view);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::csv_source::CsvSourceConfig;

    #[tokio::test]
    async fn unknown_job_id_reports_no_status() {
        let orchestrator = Orchestrator::new(
            DataSource::Dev(CsvSourceConfig {
                dir: std::path::PathBuf::from("/nonexistent"),
            }),
            2,
            30,
        );
        assert!(orchestrator.status(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn submitting_a_job_with_an_unreadable_source_eventually_fails() {
        let orchestrator = Orchestrator::new(
            DataSource::Dev(CsvSourceConfig {
                dir: std::path::PathBuf::from("/nonexistent"),
            }),
            2,
            30,
        );
        let job_id = orchestrator.submit().await;

        let mut view = orchestrator.status(job_id).await.unwrap();
        for _ in 0..50 {
            if view.status != JobStatus::Pending && view.status != JobStatus::Running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            view = orchestrator.status(job_id).await.unwrap();
        }
        assert_eq!(view.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn local_test_mode_job_completes_without_contacting_a_sink() {
        let orchestrator = Orchestrator::new(DataSource::LocalTest, 2, 30);
        let job_id = orchestrator.submit().await;

        let mut view = orchestrator.status(job_id).await.unwrap();
        for _ in 0..50 {
            if view.status != JobStatus::Pending && view.status != JobStatus::Running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            view = orchestrator.status(job_id).await.unwrap();
        }
        assert_eq!(view.status, JobStatus::Completed);
        let result = view.result.unwrap();
        assert!(result.record_count > 0);
    }

    /// Seed a bundle directory whose inputs are readable but whose destination has
    /// no write permission, so `fetch_inputs` succeeds and `upload_results` fails.
    fn seed_unwritable_bundle_dir() -> tempfile::TempDir {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path();
        fs::write(path.join("demand.csv"), "product_id,quantity\nProduct_A,100\n").unwrap();
        fs::write(
            path.join("operations.csv"),
            "operation_id,sequence\nOP10,0\nOP20,1\n",
        )
        .unwrap();
        fs::write(
            path.join("equipment_master.csv"),
            "model_id,unit_id\nModel_X,Unit_1\n",
        )
        .unwrap();
        fs::write(
            path.join("process_standard.csv"),
            "product_id,operation_id,model_id,cycle_time_sec\n\
             Product_A,OP10,Model_X,60\nProduct_A,OP20,Model_X,60\n",
        )
        .unwrap();
        fs::write(
            path.join("wip.csv"),
            "product_id,operation_id,quantity\nProduct_A,OP10,100\nProduct_A,OP20,0\n",
        )
        .unwrap();
        fs::write(
            path.join("equipment_wip.csv"),
            "unit_id,product_id,operation_id,end_offset_sec\n",
        )
        .unwrap();
        fs::write(
            path.join("tool_master.csv"),
            "product_id,operation_id,tool_count\n",
        )
        .unwrap();
        fs::write(
            path.join("changeover.toml"),
            "product_switch_sec = 1800\nop_switch_sec = 1800\n",
        )
        .unwrap();
        fs::write(path.join("shift.toml"), "available_time_sec = 86400\n").unwrap();

        // Drop write permission on the directory itself so `write_schedule`'s
        // create-file calls fail, while the input files above remain readable.
        let mut perms = fs::metadata(path).unwrap().permissions();
        perms.set_mode(0o500);
        fs::set_permissions(path, perms).unwrap();

        dir
    }

    #[tokio::test]
    async fn sink_failure_still_completes_the_job_with_its_schedule() {
        let dir = seed_unwritable_bundle_dir();
        let orchestrator = Orchestrator::new(
            DataSource::Dev(CsvSourceConfig {
                dir: dir.path().to_path_buf(),
            }),
            2,
            30,
        );
        let job_id = orchestrator.submit().await;

        let mut view = orchestrator.status(job_id).await.unwrap();
        for _ in 0..50 {
            if view.status != JobStatus::Pending && view.status != JobStatus::Running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            view = orchestrator.status(job_id).await.unwrap();
        }

        // Restore write permission so the tempdir can clean itself up.
        {
            use std::fs;
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(dir.path()).unwrap().permissions();
            perms.set_mode(0o700);
            fs::set_permissions(dir.path(), perms).unwrap();
        }

        assert_eq!(view.status, JobStatus::Completed);
        let result = view.result.unwrap();
        assert!(result.record_count > 0);
    }
}
