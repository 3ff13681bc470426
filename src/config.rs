use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::sites::Company;

/// Application settings: an optional `config.yaml` next to the binary,
/// overridable field-by-field through `HS_*` environment variables
/// (e.g. `HS_CMS__BASE_URL`, `HS_CMS__PASSWORD`).
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Remembered run name per company, so a push pass can find what
    /// the last scrape pass wrote without retyping it.
    #[serde(default)]
    pub file_names: HashMap<String, String>,
    #[serde(default)]
    pub cms: CmsSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CmsSettings {
    #[serde(default = "default_cms_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
    #[serde(default = "default_push_timeout_secs")]
    pub push_timeout_secs: u64,
    #[serde(default = "default_refresh_every")]
    pub refresh_every: usize,
}

impl Default for CmsSettings {
    fn default() -> Self {
        Self {
            base_url: default_cms_base_url(),
            username: String::new(),
            password: String::new(),
            settle_secs: default_settle_secs(),
            push_timeout_secs: default_push_timeout_secs(),
            refresh_every: default_refresh_every(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_cms_base_url() -> String {
    "https://igetaway.co.uk/admin".to_string()
}

fn default_settle_secs() -> u64 {
    1
}

fn default_push_timeout_secs() -> u64 {
    120
}

fn default_refresh_every() -> usize {
    150
}

impl Settings {
    pub fn load() -> Result<Self> {
        config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("HS").separator("__"))
            .build()
            .context("cannot read configuration")?
            .try_deserialize()
            .context("configuration is invalid")
    }

    /// The run name to use for a company: an explicit label wins, then
    /// the remembered name from config, then a generated
    /// `<company>-<YYYY-MM-DD>` for today.
    pub fn run_name(&self, company: Company, label: Option<&str>) -> String {
        if let Some(label) = label {
            return label.to_string();
        }
        if let Some(remembered) = self.file_names.get(company.as_str()) {
            return remembered.clone();
        }
        generate_run_name(company)
    }
}

pub fn generate_run_name(company: Company) -> String {
    format!(
        "{}-{}",
        company.as_str(),
        chrono::Local::now().format("%Y-%m-%d")
    )
}
