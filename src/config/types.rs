use crate::model::SourceId;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Main configuration structure for Biblio-Ripple
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    /// Per-source overrides keyed by source id (`[sources.arxiv]`)
    #[serde(default)]
    pub sources: BTreeMap<SourceId, SourceOverrides>,
}

impl Config {
    /// Resolves the effective settings for one source
    ///
    /// Keys missing from the `[sources.<id>]` table fall back to the
    /// source's defaults.
    pub fn source(&self, id: SourceId) -> SourceConfig {
        let defaults = SourceConfig::defaults_for(id);
        match self.sources.get(&id) {
            Some(overrides) => SourceConfig {
                id,
                enabled: overrides.enabled.unwrap_or(defaults.enabled),
                page_size: overrides.page_size.unwrap_or(defaults.page_size),
                min_interval_ms: overrides
                    .min_interval_ms
                    .unwrap_or(defaults.min_interval_ms),
                base_url: overrides.base_url.clone(),
            },
            None => defaults,
        }
    }

    /// Returns the ids of every enabled source, in report order
    pub fn enabled_sources(&self) -> Vec<SourceId> {
        SourceId::ALL
            .into_iter()
            .filter(|id| self.source(*id).enabled)
            .collect()
    }
}

/// Crawl engine tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Attempts per request before giving up, including the first
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Backoff before the second attempt (milliseconds)
    #[serde(rename = "base-delay-ms")]
    pub base_delay_ms: u64,

    /// Upper bound for a single backoff wait (milliseconds)
    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,

    /// HTTP request timeout (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,
}

impl CrawlerConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            request_timeout_secs: 30,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the markdown summary file
    #[serde(rename = "summary-path")]
    pub summary_path: String,
}

/// A `[sources.<id>]` table as written in the file; every key is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SourceOverrides {
    pub enabled: Option<bool>,
    pub page_size: Option<u32>,
    pub min_interval_ms: Option<u64>,
    pub base_url: Option<String>,
}

/// Effective settings for one source after defaults are applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub id: SourceId,
    pub enabled: bool,
    /// Results requested per search page
    pub page_size: u32,
    /// Minimum spacing between two requests to the source (milliseconds)
    pub min_interval_ms: u64,
    /// Replaces the public site root, e.g. for a mirror or a test server
    pub base_url: Option<String>,
}

impl SourceConfig {
    /// Returns the built-in settings for a source
    pub fn defaults_for(id: SourceId) -> Self {
        let page_size = match id {
            SourceId::Acm | SourceId::Arxiv => 50,
            SourceId::Ieee | SourceId::ScienceDirect => 25,
            SourceId::SpringerLink => 20,
        };

        Self {
            id,
            enabled: true,
            page_size,
            min_interval_ms: 1000,
            base_url: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}
