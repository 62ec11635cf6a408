use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use media_ripple::config::load_config;
///
/// let config = load_config(Path::new("ripple.toml")).unwrap();
/// println!("Max depth: {}", config.crawler.max_depth);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(hash_str(&content))
}

/// Hashes the effective configuration, after CLI overrides are applied
///
/// This is the value recorded on each run row, so two runs with the same
/// settings share a hash however the settings were supplied.
pub fn compute_effective_hash(config: &Config) -> Result<String, ConfigError> {
    let serialized = toml::to_string(config)?;
    Ok(hash_str(&serialized))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

fn hash_str(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Platform;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
platform = "soundcloud"

[seeds]
urls = ["https://soundcloud.com/discover"]

[crawler]
max-depth = 3
workers = 4
queue-capacity = 16
skip-known-failures = true

[retry]
base-delay-ms = 500
download-max-attempts = 5

[download]
output-dir = "/tmp/music"
format = "flac"

[renderer]
scroll-count = 3
headless = false

[output]
database-path = "./sc.db"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.platform, Platform::SoundCloud);
        assert_eq!(config.seeds.urls.len(), 1);
        assert_eq!(config.crawler.max_depth, 3);
        assert_eq!(config.crawler.workers, 4);
        assert!(config.crawler.skip_known_failures);
        assert_eq!(config.retry.base_delay_ms, 500);
        assert_eq!(config.retry.max_delay_ms, 30_000);
        assert_eq!(config.retry.download_max_attempts, 5);
        assert_eq!(config.download.format, "flac");
        assert_eq!(config.download.quality, "192");
        assert!(!config.renderer.headless);
        assert_eq!(config.output.database_path.as_deref(), Some("./sc.db"));
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config(r#"platform = "youtube""#).unwrap();
        assert_eq!(config.platform, Platform::YouTube);
        assert_eq!(config.crawler.max_depth, 2);
        assert!(config.seeds.urls.is_empty());
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/ripple.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_unknown_platform() {
        assert!(parse_config(r#"platform = "vimeo""#).is_err());
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
platform = "youtube"

[crawler]
workers = 0
"#;
        let result = parse_config(config_content);
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_effective_hash_tracks_settings() {
        let base = Config::for_platform(Platform::YouTube);
        let mut deeper = base.clone();
        deeper.crawler.max_depth = 5;

        let a = compute_effective_hash(&base).unwrap();
        let b = compute_effective_hash(&base).unwrap();
        let c = compute_effective_hash(&deeper).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_load_config_with_hash() {
        let file = create_temp_config("platform = \"youtube\"\n");
        let (config, hash) = load_config_with_hash(file.path()).unwrap();
        assert_eq!(config.platform, Platform::YouTube);
        assert_eq!(hash.len(), 64);
    }
}
