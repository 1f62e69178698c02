use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// The format is chosen from the file extension: `.toml` or `.json`.
///
/// # Arguments
///
/// * `path` - Path to the configuration file
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
/// use loco_mirror::config::load_config;
///
/// let config = load_config(Path::new("site.toml")).unwrap();
/// println!("Mirroring: {}", config.page);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let config: Config = match extension.as_deref() {
        Some("toml") => toml::from_str(&content)?,
        Some("json") => serde_json::from_str(&content)?,
        _ => {
            return Err(ConfigError::UnsupportedFormat(format!(
                "{} (expected .toml or .json)",
                path.display()
            )))
        }
    };

    validate(&config)?;

    Ok(config)
}

/// Builds a validated configuration from a command-line target
///
/// A target with a URL scheme yields the default configuration for that page;
/// anything else is loaded as a configuration file.
pub fn load_target(target: &str) -> Result<Config, ConfigError> {
    if looks_like_url(target) {
        let config = Config::from_url(target);
        validate(&config)?;
        return Ok(config);
    }

    let path = Path::new(target);
    if !path.is_file() {
        return Err(ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Config file {} does not exist", target),
        )));
    }
    load_config(path)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so that runs can be matched to the configuration that
/// produced them.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

fn looks_like_url(target: &str) -> bool {
    let lower = target.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn create_temp_config(content: &str, suffix: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_toml() {
        let config_content = r#"
page = "https://example.webflow.io/"
name = "example"

[site]
cache-scripts = false

[pages.about]
no-links = true
"#;

        let file = create_temp_config(config_content, ".toml");
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.page, "https://example.webflow.io/");
        assert_eq!(config.site.cache_scripts, Some(false));
        assert_eq!(config.pages["about"].no_links, Some(true));
    }

    #[test]
    fn test_load_valid_json() {
        let config_content = r#"{
            "page": "https://example.webflow.io/",
            "site": { "meta": [{ "name": "robots", "content": "noindex" }] }
        }"#;

        let file = create_temp_config(config_content, ".json");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.site.meta.len(), 1);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = create_temp_config("page: x", ".yaml");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{", ".toml");
        assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_type_mismatch_fails_at_load() {
        let config_content = r#"
page = "https://example.com/"

[pages.blog]
meta = "not-a-list"
"#;
        let file = create_temp_config(config_content, ".toml");
        assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
page = "https://example.com/"

[site]
path = "somewhere.html"
"#;

        let file = create_temp_config(config_content, ".toml");
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_load_target_url() {
        let config = load_target("https://example.com/").unwrap();
        assert_eq!(config.page, "https://example.com/");
    }

    #[test]
    fn test_load_target_missing_file() {
        assert!(matches!(
            load_target("does-not-exist.toml"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content", ".toml");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1", ".toml");
        let file2 = create_temp_config("content 2", ".toml");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
