//! Configuration structures for the cache and the editor.
//!
//! Both structures deserialize with defaults for every missing field, so a
//! JSON file only needs the keys it overrides:
//!
//! ```rust
//! use ontodia::config::EditorConfig;
//!
//! let config = EditorConfig::from_json_str(r#"{ "disable_halo": true }"#).unwrap();
//! assert!(config.disable_halo);
//! assert!(config.validate_on_change);
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::vocabulary::{DEFAULT_STORAGE_URI, LABEL_POSTFIXES, LABEL_URIS};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Prefix of generated graph IRIs when `add` gets no prefix hint
    pub default_graph_prefix: String,
    /// Label predicates, most preferred first
    pub label_predicates: Vec<String>,
    /// Case-insensitive predicate fragments accepted as fallback labels
    pub label_postfixes: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_graph_prefix: DEFAULT_STORAGE_URI.to_string(),
            label_predicates: LABEL_URIS.iter().map(|iri| (*iri).to_string()).collect(),
            label_postfixes: LABEL_POSTFIXES.iter().map(|postfix| (*postfix).to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// When set, selection changes never close dialogs on their own.
    pub disable_halo: bool,
    /// Re-run validation for touched entities after each authoring change
    pub validate_on_change: bool,
    pub cache: CacheConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self { disable_halo: false, validate_on_change: true, cache: CacheConfig::default() }
    }
}

impl EditorConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_vocabulary() {
        let config = CacheConfig::default();
        assert_eq!(config.label_predicates.len(), LABEL_URIS.len());
        assert_eq!(config.label_postfixes[0], "prefLabel");
        assert_eq!(config.default_graph_prefix, DEFAULT_STORAGE_URI);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EditorConfig::from_json_str(
            r#"{ "cache": { "label_postfixes": ["caption"] } }"#,
        )
        .unwrap();
        assert_eq!(config.cache.label_postfixes, vec!["caption".to_string()]);
        assert_eq!(config.cache.label_predicates.len(), LABEL_URIS.len());
        assert!(config.validate_on_change);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = EditorConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
