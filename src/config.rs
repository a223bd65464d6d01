use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{PaddockError, api::DEFAULT_BASE_URL, store::DEFAULT_STATUS_POLL_INTERVAL};

const CONFIG_DIR_NAME: &str = "paddock";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub status_poll_interval_s: u64,
    pub auto_select_first_meeting: bool,
    pub season_year: Option<i32>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            status_poll_interval_s: DEFAULT_STATUS_POLL_INTERVAL.as_secs(),
            auto_select_first_meeting: true,
            season_year: None,
        }
    }
}

impl AppConfig {
    pub fn default_path() -> Result<PathBuf, PaddockError> {
        Ok(dirs::config_dir()
            .ok_or(PaddockError::NoConfigDir)?
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME))
    }

    /// Config from the user's config directory, `None` when there is no file yet.
    pub fn from_local_file() -> Result<Option<Self>, PaddockError> {
        match Self::default_path() {
            Ok(path) => Self::load(&path),
            Err(PaddockError::NoConfigDir) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn load(config_path: &Path) -> Result<Option<Self>, PaddockError> {
        if !config_path.exists() {
            return Ok(None);
        }
        let file = std::fs::File::open(config_path)
            .map_err(|e| PaddockError::ConfigIOError { source: e })?;
        serde_json::from_reader(file)
            .map(Some)
            .map_err(|e| PaddockError::ConfigSerializeError { source: e })
    }

    pub fn save_to(&self, config_path: &Path) -> Result<(), PaddockError> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PaddockError::ConfigIOError { source: e })?;
        }

        let file = std::fs::File::create(config_path)
            .map_err(|e| PaddockError::ConfigIOError { source: e })?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| PaddockError::ConfigSerializeError { source: e })
    }
}
