//! The module responsible for the log file directory.
use anyhow::Result;
use std::fs;
use std::path::PathBuf;

/// The directory name, under the program's config directory, where log files go.
const LOG_DIRECTORY_NAME: &str = "logs";

/// Get (creating if necessary) the directory log files are written to.
pub fn get_log_dir() -> Result<PathBuf> {
    let path = crate::get_config_dir().join(LOG_DIRECTORY_NAME);
    fs::create_dir_all(&path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_dir_is_created() {
        let path = get_log_dir().unwrap();
        assert!(path.is_dir());
    }
}
