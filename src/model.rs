use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(skip_serializing, default)]
    pub password: Option<String>,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub user_agent: String,
    /// Response cache location; `None` disables caching.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default, with = "humantime_serde")]
    pub cache_max_age: Option<Duration>,
}

/// Per-request caps on the number of items in each analytics dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLimits {
    pub max_dx: usize,
    pub max_org_units: usize,
    pub max_periods: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_dx: 50,
            max_org_units: 50,
            max_periods: 1,
        }
    }
}

/// Normalized analytics selectors. Periods are already expanded and levels
/// already numeric.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    pub data_elements: Vec<String>,
    pub data_element_groups: Vec<String>,
    pub indicators: Vec<String>,
    pub indicator_groups: Vec<String>,
    pub periods: Vec<String>,
    pub org_units: Vec<String>,
    pub org_unit_groups: Vec<String>,
    pub org_unit_levels: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFile {
    pub path: PathBuf,
    pub rows: usize,
}

/// What a job produced, printed at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub job: String,
    pub output_dir: PathBuf,
    pub outputs: Vec<OutputFile>,
    pub client: ClientConfig,
}
