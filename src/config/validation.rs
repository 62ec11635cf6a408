use crate::config::types::{
    Config, CrawlerConfig, DownloadConfig, RendererConfig, RetryConfig, SUPPORTED_FORMATS,
};
use crate::extract::Platform;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
///
/// Seeds are checked separately by [`resolve_seeds`], since commands such as
/// `--stats` run without any.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_retry_config(&config.retry)?;
    validate_download_config(&config.download)?;
    validate_renderer_config(&config.renderer)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 64 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 64, got {}",
            config.workers
        )));
    }

    if config.queue_capacity < 1 {
        return Err(ConfigError::Validation(format!(
            "queue-capacity must be >= 1, got {}",
            config.queue_capacity
        )));
    }

    if config.checkpoint_interval_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "checkpoint-interval-secs must be >= 1, got {}",
            config.checkpoint_interval_secs
        )));
    }

    Ok(())
}

/// Validates retry configuration
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.download_max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "download-max-attempts must be >= 1, got {}",
            config.download_max_attempts
        )));
    }

    if config.render_max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "render-max-attempts must be >= 1, got {}",
            config.render_max_attempts
        )));
    }

    if config.render_max_attempts > config.download_max_attempts {
        return Err(ConfigError::Validation(format!(
            "render-max-attempts ({}) must not exceed download-max-attempts ({})",
            config.render_max_attempts, config.download_max_attempts
        )));
    }

    if config.base_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "base-delay-ms ({}) must not exceed max-delay-ms ({})",
            config.base_delay_ms, config.max_delay_ms
        )));
    }

    if config.jitter_percent > 100 {
        return Err(ConfigError::Validation(format!(
            "jitter-percent must be between 0 and 100, got {}",
            config.jitter_percent
        )));
    }

    Ok(())
}

/// Validates download configuration
fn validate_download_config(config: &DownloadConfig) -> Result<(), ConfigError> {
    if !SUPPORTED_FORMATS.contains(&config.format.as_str()) {
        return Err(ConfigError::Validation(format!(
            "format must be one of {}, got '{}'",
            SUPPORTED_FORMATS.join(", "),
            config.format
        )));
    }

    if config.quality.trim().is_empty() {
        return Err(ConfigError::Validation(
            "quality cannot be empty".to_string(),
        ));
    }

    if config.output_dir.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates renderer configuration
fn validate_renderer_config(config: &RendererConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Turns the configured URLs and keywords into seed page URLs
///
/// Every seed must belong to the configured platform; a run never mixes
/// platforms.
pub fn resolve_seeds(config: &Config) -> Result<Vec<String>, ConfigError> {
    let platform = config.platform;
    let mut seeds = Vec::new();

    for seed in &config.seeds.urls {
        let url = Url::parse(seed.trim())
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "Seed URL '{}' must use HTTP or HTTPS",
                seed
            )));
        }

        match Platform::from_url(url.as_str()) {
            Some(found) if found == platform => seeds.push(url.to_string()),
            Some(found) => {
                return Err(ConfigError::Validation(format!(
                    "Seed URL '{}' belongs to {}, but this run crawls {}",
                    seed, found, platform
                )))
            }
            None => {
                return Err(ConfigError::Validation(format!(
                    "Seed URL '{}' is not a {} URL",
                    seed, platform
                )))
            }
        }
    }

    if !config.seeds.keywords.is_empty() && !platform.supports_keywords() {
        return Err(ConfigError::Validation(format!(
            "Keyword search is not supported for {}",
            platform
        )));
    }

    for keyword in &config.seeds.keywords {
        if keyword.trim().is_empty() {
            continue;
        }
        if let Some(url) = platform.search_url(keyword) {
            seeds.push(url);
        }
    }

    if seeds.is_empty() {
        return Err(ConfigError::Validation(
            "At least one seed URL or keyword is required".to_string(),
        ));
    }

    Ok(seeds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn youtube() -> Config {
        Config::for_platform(Platform::YouTube)
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&youtube()).is_ok());
        assert!(validate(&Config::for_platform(Platform::SoundCloud)).is_ok());
    }

    #[test]
    fn test_worker_range() {
        let mut config = youtube();
        config.crawler.workers = 0;
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));

        config.crawler.workers = 65;
        assert!(validate(&config).is_err());

        config.crawler.workers = 64;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_queue_capacity() {
        let mut config = youtube();
        config.crawler.queue_capacity = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_attempt_limits() {
        let mut config = youtube();
        config.retry.download_max_attempts = 0;
        assert!(validate(&config).is_err());

        let mut config = youtube();
        config.retry.render_max_attempts = 5;
        config.retry.download_max_attempts = 3;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_delay_ordering() {
        let mut config = youtube();
        config.retry.base_delay_ms = 10_000;
        config.retry.max_delay_ms = 1_000;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_jitter_percent_range() {
        let mut config = youtube();
        config.retry.jitter_percent = 100;
        assert!(validate(&config).is_ok());
        config.retry.jitter_percent = 150;
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_format() {
        let mut config = youtube();
        config.download.format = "ogg".to_string();
        assert!(validate(&config).is_err());

        config.download.format = "flac".to_string();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_resolve_url_seeds() {
        let mut config = youtube();
        config.seeds.urls = vec!["https://www.youtube.com/@artist".to_string()];
        assert_eq!(
            resolve_seeds(&config).unwrap(),
            vec!["https://www.youtube.com/@artist"]
        );
    }

    #[test]
    fn test_resolve_keyword_seeds() {
        let mut config = youtube();
        config.seeds.keywords = vec!["lofi beats".to_string(), " ".to_string()];
        assert_eq!(
            resolve_seeds(&config).unwrap(),
            vec!["https://youtube.com/results?search_query=lofi%20beats"]
        );
    }

    #[test]
    fn test_mixed_platform_seeds_rejected() {
        let mut config = youtube();
        config.seeds.urls = vec![
            "https://youtube.com/@artist".to_string(),
            "https://soundcloud.com/artist".to_string(),
        ];
        assert!(matches!(
            resolve_seeds(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_off_platform_seed_rejected() {
        let mut config = Config::for_platform(Platform::SoundCloud);
        config.seeds.urls = vec!["https://example.com/".to_string()];
        assert!(resolve_seeds(&config).is_err());
    }

    #[test]
    fn test_keywords_need_search_support() {
        let mut config = Config::for_platform(Platform::SoundCloud);
        config.seeds.keywords = vec!["ambient".to_string()];
        assert!(resolve_seeds(&config).is_err());
    }

    #[test]
    fn test_seed_must_be_url() {
        let mut config = youtube();
        config.seeds.urls = vec!["not a url".to_string()];
        assert!(matches!(
            resolve_seeds(&config),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_no_seeds() {
        assert!(resolve_seeds(&youtube()).is_err());
    }
}
