//! Small JSON record of what must survive a restart.

use std::path::Path;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::calendar::WeekParity;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub is_single_week_now: bool,
    /// Timestamp of the newest relayed form submission.
    #[serde(default)]
    pub last_seen_submission: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub parity_flipped_on: Option<NaiveDate>,
}

impl PersistedState {
    pub fn new(parity: WeekParity) -> Self {
        Self {
            is_single_week_now: parity.is_single(),
            last_seen_submission: None,
            parity_flipped_on: None,
        }
    }

    pub fn parity(&self) -> WeekParity {
        WeekParity::from_is_single(self.is_single_week_now)
    }

    /// Reads the state file, or `None` if it does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Reads the state file, seeding a fresh state from `seed` when missing.
    pub fn load_or_seed<P: AsRef<Path>>(path: P, seed: Option<WeekParity>) -> Result<Self> {
        let path = path.as_ref();
        match (Self::load(path)?, seed) {
            (Some(state), _) => Ok(state),
            (None, Some(parity)) => {
                info!(path = %path.display(), %parity, "no state file, starting fresh");
                Ok(Self::new(parity))
            }
            (None, None) => Err(Error::Config(format!(
                "no state file at {} and no start_parity configured",
                path.display()
            ))),
        }
    }

    /// Writes the state next to `path` and renames it into place.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}
