use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

use plate_core::mfds::DEFAULT_BASE_URL;

pub const SERVICE_KEY_ENV: &str = "PLATE_MFDS_SERVICE_KEY";
pub const BASE_URL_ENV: &str = "PLATE_MFDS_URL";
pub const USER_ID_ENV: &str = "PLATE_USER_ID";
pub const DEFAULT_USER_ID: &str = "local";

pub struct Config {
    pub db_path: PathBuf,
    pub mfds_url: String,
    pub mfds_service_key: Option<String>,
    pub user_id: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "plate").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        Ok(Self::from_env(data_dir.join("plate.db"), |key| {
            std::env::var(key).ok()
        }))
    }

    /// Build from a database path and an env lookup. Blank values count as unset.
    fn from_env(db_path: PathBuf, var: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Config {
            db_path,
            mfds_url: var(BASE_URL_ENV).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            mfds_service_key: var(SERVICE_KEY_ENV),
            user_id: var(USER_ID_ENV).unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_env(PathBuf::from("/tmp/plate.db"), |k| vars.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]);
        assert_eq!(c.mfds_url, DEFAULT_BASE_URL);
        assert!(c.mfds_service_key.is_none());
        assert_eq!(c.user_id, DEFAULT_USER_ID);
    }

    #[test]
    fn test_env_overrides() {
        let c = config(&[
            (SERVICE_KEY_ENV, " abc123 "),
            (BASE_URL_ENV, "http://localhost:9000/mfds"),
            (USER_ID_ENV, "jisoo"),
        ]);
        assert_eq!(c.mfds_service_key.as_deref(), Some("abc123"));
        assert_eq!(c.mfds_url, "http://localhost:9000/mfds");
        assert_eq!(c.user_id, "jisoo");
    }

    #[test]
    fn test_blank_values_are_unset() {
        let c = config(&[(SERVICE_KEY_ENV, "  "), (USER_ID_ENV, "")]);
        assert!(c.mfds_service_key.is_none());
        assert_eq!(c.user_id, DEFAULT_USER_ID);
    }

    #[test]
    fn test_db_path_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plate.db");
        let c = Config::from_env(path.clone(), |_| None);
        assert_eq!(c.db_path, path);
    }
}
