use crate::config::types::{Config, ConfigLayer, ReadinessKind, RenderConfig};
use crate::url::is_safe_relative_path;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_page(&config.page)?;
    validate_assets_dir(&config.assets_dir)?;
    validate_render_config(&config.render)?;

    for pattern in &config.asset_hosts {
        validate_domain_pattern(pattern)?;
    }

    validate_layer("[site]", &config.site, false)?;
    for (host, layer) in &config.domains {
        validate_domain_pattern(host)?;
        validate_layer(&format!("[domains.\"{}\"]", host), layer, false)?;
    }
    for (token, layer) in &config.pages {
        if token.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Page token cannot be empty".to_string(),
            ));
        }
        validate_layer(&format!("[pages.\"{}\"]", token), layer, true)?;
    }

    Ok(())
}

/// Validates the starting page URL
fn validate_page(page: &str) -> Result<(), ConfigError> {
    let url = Url::parse(page)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid page URL '{}': {}", page, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Page URL '{}' must use HTTP or HTTPS",
            page
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "Page URL '{}' has no host",
            page
        )));
    }

    Ok(())
}

fn validate_assets_dir(dir: &str) -> Result<(), ConfigError> {
    if !is_safe_relative_path(std::path::Path::new(dir)) {
        return Err(ConfigError::Validation(format!(
            "assets-dir must be a relative path inside the output directory, got '{}'",
            dir
        )));
    }
    Ok(())
}

/// Validates browser rendering configuration
fn validate_render_config(config: &RenderConfig) -> Result<(), ConfigError> {
    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "render timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.poll_ms < 50 {
        return Err(ConfigError::Validation(format!(
            "render poll-ms must be >= 50ms, got {}ms",
            config.poll_ms
        )));
    }

    if config.readiness == ReadinessKind::Selector
        && config.marker.as_deref().map_or(true, |m| m.trim().is_empty())
    {
        return Err(ConfigError::Validation(
            "render readiness \"selector\" requires a marker selector".to_string(),
        ));
    }

    if config.window_width == 0 || config.window_height == 0 {
        return Err(ConfigError::Validation(
            "render window size must be non-zero".to_string(),
        ));
    }

    Ok(())
}

/// Validates one configuration layer
fn validate_layer(name: &str, layer: &ConfigLayer, is_page: bool) -> Result<(), ConfigError> {
    match (&layer.path, is_page) {
        (Some(_), false) => {
            return Err(ConfigError::Validation(format!(
                "'path' has no effect in {} and is only allowed in page tables",
                name
            )));
        }
        (Some(path), true) if !is_safe_relative_path(path) => {
            return Err(ConfigError::Validation(format!(
                "'path' in {} must be a relative path without '..', got '{}'",
                name,
                path.display()
            )));
        }
        _ => {}
    }

    for selector in &layer.remove_selectors {
        if scraper::Selector::parse(selector).is_err() {
            return Err(ConfigError::InvalidPattern(format!(
                "Invalid CSS selector '{}' in {}",
                selector, name
            )));
        }
    }

    for script in &layer.cleanup.scripts {
        if script.src.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "cleanup script in {} has an empty src",
                name
            )));
        }
    }

    for tag in layer.inject.head.keys().chain(layer.inject.body.keys()) {
        if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ConfigError::Validation(format!(
                "Invalid injected tag name '{}' in {}",
                tag, name
            )));
        }
    }

    for meta in &layer.meta {
        if meta.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Empty meta entry in {}",
                name
            )));
        }
    }

    Ok(())
}

/// Validates a host pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    if pattern == "*" {
        return Ok(());
    }

    let domain = pattern.strip_prefix("*.").unwrap_or(pattern);

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.is_empty()
        || domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
        || domain.contains("..")
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' is not a valid host name",
            domain
        )));
    }

    Ok(())
}
