// src/infra/paths.rs — Config location
//
// DESIGNLOOP_HOME overrides everything. Otherwise config lives in
// ~/.designloop/.

use std::path::PathBuf;

fn designloop_home() -> Option<PathBuf> {
    std::env::var_os("DESIGNLOOP_HOME").map(PathBuf::from)
}

/// Home directory, or the current directory when none can be determined.
pub fn dirs_home() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// $DESIGNLOOP_HOME/ or ~/.designloop/
pub fn config_dir() -> PathBuf {
    designloop_home().unwrap_or_else(|| dirs_home().join(".designloop"))
}

pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}
