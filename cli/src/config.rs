use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

/// Environment variable that overrides the data file location.
pub const DATA_ENV: &str = "PANTRY_DATA";

const ALIAS_FILE: &str = "cleanup_aliases.json";

pub struct Config {
    pub data_path: PathBuf,
    pub data_dir: PathBuf,
}

impl Config {
    /// Resolve the data file: `--data`, then `PANTRY_DATA`, then the
    /// platform data directory.
    pub fn load(data_override: Option<PathBuf>) -> Result<Self> {
        let data_path = match data_override.or_else(env_override) {
            Some(path) => path,
            None => {
                let proj_dirs = ProjectDirs::from("", "", "pantry")
                    .context("Could not determine home directory")?;
                proj_dirs.data_dir().join("storage_data.json")
            }
        };

        let data_dir = match data_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        Ok(Config {
            data_path,
            data_dir,
        })
    }

    /// Alias table picked up by `cleanup` when `--aliases` is not given.
    pub fn alias_file(&self) -> Option<PathBuf> {
        let path = self.data_dir.join(ALIAS_FILE);
        path.is_file().then_some(path)
    }
}

fn env_override() -> Option<PathBuf> {
    std::env::var_os(DATA_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
