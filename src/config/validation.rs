use crate::config::types::{Config, CrawlerConfig, OutputConfig, SourceOverrides, UserAgentConfig};
use crate::model::SourceId;
use crate::ConfigError;
use url::Url;

const MAX_ATTEMPTS_LIMIT: u32 = 10;
const MAX_PAGE_SIZE: u32 = 200;
const MAX_MIN_INTERVAL_MS: u64 = 60_000;
const MAX_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    for (id, overrides) in &config.sources {
        validate_source_overrides(*id, overrides)?;
    }
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > MAX_ATTEMPTS_LIMIT {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and {}, got {}",
            MAX_ATTEMPTS_LIMIT, config.max_attempts
        )));
    }

    if config.base_delay_ms < 1 {
        return Err(ConfigError::Validation(format!(
            "base_delay_ms must be >= 1ms, got {}ms",
            config.base_delay_ms
        )));
    }

    if config.max_delay_ms < config.base_delay_ms {
        return Err(ConfigError::Validation(format!(
            "max_delay_ms ({}ms) must be >= base_delay_ms ({}ms)",
            config.max_delay_ms, config.base_delay_ms
        )));
    }

    if config.request_timeout_secs < 1 || config.request_timeout_secs > MAX_REQUEST_TIMEOUT_SECS {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be between 1 and {}, got {}",
            MAX_REQUEST_TIMEOUT_SECS, config.request_timeout_secs
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.summary_path.is_empty() {
        return Err(ConfigError::Validation(
            "summary_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates one `[sources.<id>]` table
fn validate_source_overrides(id: SourceId, overrides: &SourceOverrides) -> Result<(), ConfigError> {
    if let Some(page_size) = overrides.page_size {
        if page_size < 1 || page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Validation(format!(
                "sources.{}: page_size must be between 1 and {}, got {}",
                id.as_str(),
                MAX_PAGE_SIZE,
                page_size
            )));
        }
    }

    if let Some(interval) = overrides.min_interval_ms {
        if interval > MAX_MIN_INTERVAL_MS {
            return Err(ConfigError::Validation(format!(
                "sources.{}: min_interval_ms must be <= {}ms, got {}ms",
                id.as_str(),
                MAX_MIN_INTERVAL_MS,
                interval
            )));
        }
    }

    if let Some(base_url) = &overrides.base_url {
        let url = Url::parse(base_url).map_err(|e| {
            ConfigError::InvalidUrl(format!(
                "sources.{}: invalid base_url '{}': {}",
                id.as_str(),
                base_url,
                e
            ))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "sources.{}: base_url '{}' must use http or https",
                id.as_str(),
                base_url
            )));
        }
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
