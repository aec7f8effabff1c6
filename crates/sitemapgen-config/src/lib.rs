//! Daemon and per-site configuration, loaded from TOML.
//!
//! Shape and loading style follow `obsidian-config::config`: a `Deserialize`
//! struct with `#[serde(default = "...")]` defaults, loaded with
//! `toml::from_str`, errors reported through a small `thiserror` enum.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error("unknown site id: {0}")]
    UnknownSite(String),
}

#[derive(Deserialize, Debug, Clone)]
pub struct DaemonConfig {
    #[serde(default = "defaults::data_root")]
    pub data_root: String,
    #[serde(default = "defaults::run_dir")]
    pub run_dir: String,
    #[serde(default = "defaults::app_name")]
    pub app_name: String,
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
    #[serde(default = "defaults::ring_capacity")]
    pub ring_capacity: usize,
    #[serde(default = "defaults::send_wait_ms")]
    pub send_wait_ms: i64,
    #[serde(default = "defaults::retrieve_period_secs")]
    pub retrieve_period_secs: u64,
    #[serde(default = "defaults::scheduler_workers")]
    pub scheduler_workers: usize,
    pub sites: Vec<SiteConfig>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SiteConfig {
    pub site_id: String,
    pub physical_path: String,
    #[serde(default)]
    pub host_url: Option<String>,
    #[serde(default = "defaults::max_url_in_memory")]
    pub max_url_in_memory: usize,
    #[serde(default = "defaults::max_url_in_disk")]
    pub max_url_in_disk: usize,
    #[serde(default = "defaults::max_url_life_days")]
    pub max_url_life_days: i64,
    #[serde(default = "defaults::max_obsoleted")]
    pub max_obsoleted: usize,
    #[serde(default = "defaults::max_temp_bytes")]
    pub max_temp_bytes: u64,
    #[serde(default = "defaults::backup_duration_secs")]
    pub backup_duration_secs: i64,
    #[serde(default = "defaults::sitemap_duration_secs")]
    pub sitemap_duration_secs: i64,
    #[serde(default = "defaults::news_expire_secs")]
    pub news_expire_secs: i64,
    #[serde(default = "defaults::news_max_urls")]
    pub news_max_urls: usize,
    #[serde(default)]
    pub included_query_fields: Vec<String>,
    #[serde(default)]
    pub url_replacements: Vec<UrlReplacement>,
    #[serde(default)]
    pub include_patterns: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default)]
    pub ping_url_templates: Vec<String>,
    #[serde(default = "defaults::update_robots")]
    pub update_robots: bool,
    /// Access log file or directory to parse incrementally (`spec.md` 4.K).
    /// `None` disables the log-parser provider for this site.
    #[serde(default)]
    pub log_path: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct UrlReplacement {
    pub find: String,
    pub replace: String,
}

mod defaults {
    pub fn data_root() -> String {
        "/var/lib/sitemapgen".into()
    }
    pub fn run_dir() -> String {
        "/var/run/sitemapgen".into()
    }
    pub fn app_name() -> String {
        "sitemapgen".into()
    }
    pub fn log_level() -> String {
        "info".into()
    }
    pub fn ring_capacity() -> usize {
        1000
    }
    pub fn send_wait_ms() -> i64 {
        100
    }
    pub fn retrieve_period_secs() -> u64 {
        60
    }
    pub fn scheduler_workers() -> usize {
        4
    }
    pub fn max_url_in_memory() -> usize {
        1000
    }
    pub fn max_url_in_disk() -> usize {
        50_000
    }
    pub fn max_url_life_days() -> i64 {
        90
    }
    pub fn max_obsoleted() -> usize {
        2000
    }
    pub fn max_temp_bytes() -> u64 {
        8 * 1024 * 1024
    }
    pub fn backup_duration_secs() -> i64 {
        600
    }
    pub fn sitemap_duration_secs() -> i64 {
        3600
    }
    pub fn news_expire_secs() -> i64 {
        2 * 24 * 3600
    }
    pub fn news_max_urls() -> usize {
        1000
    }
    pub fn update_robots() -> bool {
        true
    }
}

impl DaemonConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config: DaemonConfig = toml::from_str(&text)?;
        Ok(config)
    }

    pub fn site(&self, site_id: &str) -> Result<&SiteConfig, ConfigError> {
        self.sites
            .iter()
            .find(|s| s.site_id == site_id)
            .ok_or_else(|| ConfigError::UnknownSite(site_id.to_string()))
    }

    pub fn retrieve_period(&self) -> Duration {
        Duration::from_secs(self.retrieve_period_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in_missing_fields() {
        let toml_text = r#"
            [[sites]]
            site_id = "site-1"
            physical_path = "/var/www/site1"
        "#;
        let config: DaemonConfig = toml::from_str(toml_text).unwrap();
        assert_eq!(config.ring_capacity, 1000);
        assert_eq!(config.sites[0].max_url_in_memory, 1000);
        assert_eq!(config.sites[0].max_url_life_days, 90);
    }

    #[test]
    fn site_lookup() {
        let toml_text = r#"
            [[sites]]
            site_id = "a"
            physical_path = "/p"
        "#;
        let config: DaemonConfig = toml::from_str(toml_text).unwrap();
        assert!(config.site("a").is_ok());
        assert!(config.site("missing").is_err());
    }
}
