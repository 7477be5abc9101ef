use std::error::Error;
use std::path::{Path, PathBuf};
use std::{env, fs, io};

use apguard_core::RejectListConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Firmware {
    /// Snapshots that may wait in the firmware queue before exports fail
    pub queue_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub logger: Logger,
    #[serde(default)]
    pub reject_list: RejectListConfig,
    pub firmware: Firmware,
    pub scenario: Option<Scenario>,
}

impl Settings {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        let mut base: toml::Table = toml::from_str(include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../",
            "configs/default.toml"
        )))?;

        let run_mode = env::var("RUN_MODE").unwrap_or("development".into());
        let overlay_path = Path::new("configs").join(format!("{run_mode}.toml"));
        if overlay_path.is_file() {
            let overlay: toml::Table = toml::from_str(&fs::read_to_string(&overlay_path)?)?;
            Self::merge(&mut base, overlay);
        }

        let mut settings: Settings = toml::Value::Table(base).try_into()?;

        if let Some(scenario) = &mut settings.scenario {
            scenario.path = Self::normalize_path(&scenario.path)?
                .to_string_lossy()
                .to_string();
        }
        settings.reject_list.validate()?;

        Ok(settings)
    }

    /// Overlays `right` onto `left`, descending into tables present in both.
    pub fn merge(left: &mut toml::Table, right: toml::Table) {
        for (key, value) in right {
            match (left.get_mut(&key), value) {
                (Some(toml::Value::Table(inner)), toml::Value::Table(overlay)) => {
                    Self::merge(inner, overlay)
                }
                (_, value) => {
                    left.insert(key, value);
                }
            }
        }
    }

    fn normalize_path(path: &str) -> io::Result<PathBuf> {
        let path_buf = PathBuf::from(path);

        Ok(if path_buf.is_absolute() {
            path_buf
        } else {
            env::current_dir()?.join(&path_buf)
        })
    }
}
