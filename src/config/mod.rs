//! Configuration module for Loco-Mirror
//!
//! This module handles loading, parsing, and validating TOML or JSON
//! configuration files, and resolving the layered configuration into one
//! `EffectiveConfig` per page.
//!
//! # Example
//!
//! ```no_run
//! use loco_mirror::config::{load_config, ConfigResolver};
//! use std::path::Path;
//! use url::Url;
//!
//! let config = load_config(Path::new("site.toml")).unwrap();
//! let resolver = ConfigResolver::new(&config);
//! let effective = resolver.resolve(&Url::parse(&config.page).unwrap());
//! println!("Caching scripts: {}", effective.cache_scripts);
//! ```

mod parser;
mod resolve;
mod types;
mod validation;

// Re-export types
pub use types::{
    AttributeMap, CleanupConfig, Config, ConfigLayer, InjectConfig, ReadinessKind, RenderConfig,
    ScriptRef,
};

pub use resolve::{ConfigResolver, EffectiveConfig, InjectedTag, DEFAULT_REMOVE_SELECTORS};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, load_target};
pub use validation::validate;
