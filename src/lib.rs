//! Common functionality for fabplan: a production demand-splitting and scheduling
//! engine for manufacturing lines.
#![warn(missing_docs)]

use dirs::config_dir;
use std::path::PathBuf;

pub mod api;
pub mod changeover;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fixture;
pub mod id;
pub mod input;
pub mod log;
pub mod milp;
pub mod orchestrator;
pub mod output;
pub mod schedule;
pub mod settings;
pub mod source;
pub mod trigger;
pub mod units;

/// Get config dir for program.
///
/// In the unlikely event this path cannot be retrieved, the CWD will be returned.
pub fn get_config_dir() -> PathBuf {
    let Some(mut config_dir) = config_dir() else {
        return PathBuf::default();
    };

    config_dir.push("fabplan");
    config_dir
}
