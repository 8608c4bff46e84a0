//! The data-source boundary: a bundle is either an in-memory fixture, read from flat
//! CSV files, or read from the live tabular backend, selected by `Settings::system_mode`.
pub mod csv_source;
pub mod rest_source;

use crate::domain::{InputBundle, Schedule};
use crate::error::PlannerError;
use csv_source::CsvSourceConfig;
use rest_source::{RestSource, RestSourceConfig};

/// Which backend a run's data crosses.
#[derive(Debug, Clone)]
pub enum DataSource {
    /// A fixed, in-memory fixture bundle, for local-test mode. No sink is contacted.
    LocalTest,
    /// A directory of flat CSV files, for `dev` mode (local development and CI).
    Dev(CsvSourceConfig),
    /// The live tabular backend, for `prod` mode.
    Live(RestSourceConfig),
}

impl DataSource {
    /// Read the input bundle for this run.
    pub async fn fetch_inputs(&self) -> Result<InputBundle, PlannerError> {
        match self {
            Self::LocalTest => Ok(crate::fixture::local_test_bundle()),
            Self::Dev(config) => {
                let config = config.clone();
                tokio::task::spawn_blocking(move || csv_source::read_bundle(&config))
                    .await
                    .map_err(|e| PlannerError::SourceUnavailable(e.into()))?
            }
            Self::Live(config) => RestSource::new(config)?.fetch_inputs().await,
        }
    }

    /// Persist the reconstructed schedule. `rule_timekey` tags the run and is only
    /// used by the `dev` and `prod` backends; local-test mode contacts no sink.
    pub async fn upload_results(
        &self,
        schedule: &Schedule,
        rule_timekey: &str,
    ) -> Result<(), PlannerError> {
        match self {
            Self::LocalTest => Ok(()),
            Self::Dev(config) => {
                let config = config.clone();
                let schedule = schedule.clone();
                tokio::task::spawn_blocking(move || csv_source::write_schedule(&config, &schedule))
                    .await
                    .map_err(|e| PlannerError::SinkFailure(e.into()))?
            }
            Self::Live(config) => {
                RestSource::new(config)?
                    .upload_results(schedule, rule_timekey)
                    .await
            }
        }
    }
}
