//! Runtime settings: file locations and the advisor endpoint.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use log::debug;

use crate::error::{Error, Result};

pub const DEFAULT_DATA_PATH: &str = "data/synthetic_dataset.csv";
pub const DEFAULT_MODEL_PATH: &str = "model/insurance_model.msgpack";
pub const DEFAULT_ENCODERS_PATH: &str = "model/label_encoders.msgpack";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434/api/generate";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub data_path: PathBuf,
    pub model_path: PathBuf,
    pub encoders_path: PathBuf,
    pub advisor: AdvisorSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvisorSettings {
    pub url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for AdvisorSettings {
    fn default() -> Self {
        AdvisorSettings {
            url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            encoders_path: PathBuf::from(DEFAULT_ENCODERS_PATH),
            advisor: AdvisorSettings::default(),
        }
    }
}

impl Settings {
    /// Defaults overridden by the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();
        if let Some(v) = lookup("INSURANCE_DATA_PATH") {
            settings.data_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("INSURANCE_MODEL_PATH") {
            settings.model_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("INSURANCE_ENCODERS_PATH") {
            settings.encoders_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("OLLAMA_URL") {
            settings.advisor.url = v;
        }
        if let Some(v) = lookup("OLLAMA_MODEL") {
            settings.advisor.model = v;
        }
        if let Some(v) = lookup("OLLAMA_TIMEOUT_SECS") {
            let secs: u64 = v
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("OLLAMA_TIMEOUT_SECS must be whole seconds, got '{v}'")))?;
            settings.advisor.timeout = Duration::from_secs(secs);
        }
        Ok(settings)
    }
}
