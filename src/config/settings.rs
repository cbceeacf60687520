//! TOML-based configuration for nlsql.
//!
//! Supports a config file (nlsql.toml) with environment variable expansion
//! in paths.
//!
//! Example configuration:
//! ```toml
//! [matcher]
//! top_k = 5
//! min_similarity = 0.3
//!
//! [matcher.categories.JOIN]
//! top_k = 8
//!
//! [matcher.categories.LIMIT]
//! min_similarity = 0.5
//!
//! [retrieval]
//! timeout_ms = 5000
//!
//! [embedding]
//! dimension = 256
//!
//! [store]
//! path = "${HOME}/.local/share/nlsql/catalog.db"
//!
//! [compiler]
//! dialect = "postgres"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::component::Category;
use crate::sql::Dialect;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub matcher: MatcherSettings,
    pub retrieval: RetrievalSettings,
    pub embedding: EmbeddingSettings,
    pub store: StoreSettings,
    pub compiler: CompilerSettings,
}

/// Retrieval limits applied by the semantic matcher.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MatcherSettings {
    /// Candidates kept per category.
    pub top_k: usize,

    /// Similarity floor (0.0 to 1.0); weaker candidates are dropped.
    pub min_similarity: f32,

    /// Per-category overrides, keyed by category name (`TABLE`, `GROUP_BY`, ...).
    pub categories: BTreeMap<Category, CategorySettings>,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_similarity: 0.3,
            categories: BTreeMap::new(),
        }
    }
}

impl MatcherSettings {
    pub fn top_k_for(&self, category: Category) -> usize {
        self.categories
            .get(&category)
            .and_then(|c| c.top_k)
            .unwrap_or(self.top_k)
    }

    pub fn min_similarity_for(&self, category: Category) -> f32 {
        self.categories
            .get(&category)
            .and_then(|c| c.min_similarity)
            .unwrap_or(self.min_similarity)
    }
}

/// Override of the matcher limits for one category.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CategorySettings {
    pub top_k: Option<usize>,
    pub min_similarity: Option<f32>,
}

/// Retrieval client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Per-call timeout for embedding and store requests.
    pub timeout_ms: u64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { timeout_ms: 5000 }
    }
}

impl RetrievalSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Embedding gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Vector length of the built-in hashing embedder.
    pub dimension: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { dimension: 256 }
    }
}

/// Vector store configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Catalogue database path (supports ${ENV_VAR} expansion).
    pub path: Option<String>,
}

impl StoreSettings {
    /// The configured path with environment variables expanded, if any.
    pub fn resolved_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.path
            .as_deref()
            .map(|p| expand_env_vars(p).map(PathBuf::from))
            .transpose()
    }
}

/// SQL compiler configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CompilerSettings {
    pub dialect: Dialect,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `NLSQL_CONFIG`
    /// 2. `./nlsql.toml`
    /// 3. `<config dir>/nlsql/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("NLSQL_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("nlsql.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("nlsql").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        check_limits("matcher", self.matcher.top_k, self.matcher.min_similarity)?;
        for (category, overrides) in &self.matcher.categories {
            let scope = format!("matcher.categories.{}", category);
            check_limits(
                &scope,
                overrides.top_k.unwrap_or(self.matcher.top_k),
                overrides
                    .min_similarity
                    .unwrap_or(self.matcher.min_similarity),
            )?;
        }
        if self.embedding.dimension == 0 {
            return Err(SettingsError::InvalidConfig(
                "embedding.dimension must be positive".into(),
            ));
        }
        if self.retrieval.timeout_ms == 0 {
            return Err(SettingsError::InvalidConfig(
                "retrieval.timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn check_limits(scope: &str, top_k: usize, min_similarity: f32) -> Result<(), SettingsError> {
    if top_k == 0 {
        return Err(SettingsError::InvalidConfig(format!(
            "{}.top_k must be positive",
            scope
        )));
    }
    if !(0.0..=1.0).contains(&min_similarity) {
        return Err(SettingsError::InvalidConfig(format!(
            "{}.min_similarity must be within [0, 1], got {}",
            scope, min_similarity
        )));
    }
    Ok(())
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        if chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let var_name: String = chars.by_ref().take_while(|&ch| ch != '}').collect();
            let value =
                env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
            result.push_str(&value);
        } else {
            // $VAR ends at the first non-alphanumeric, non-underscore char
            let mut var_name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                var_name.push(ch);
            }
            if var_name.is_empty() {
                result.push('$');
            } else {
                let value = env::var(&var_name)
                    .map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
                result.push_str(&value);
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars_braces() {
        env::set_var("NLSQL_TEST_VAR", "hello");
        assert_eq!(expand_env_vars("${NLSQL_TEST_VAR}").unwrap(), "hello");
        assert_eq!(
            expand_env_vars("prefix_${NLSQL_TEST_VAR}_suffix").unwrap(),
            "prefix_hello_suffix"
        );
        env::remove_var("NLSQL_TEST_VAR");
    }

    #[test]
    fn test_expand_env_vars_no_braces() {
        env::set_var("NLSQL_TEST_VAR2", "world");
        assert_eq!(expand_env_vars("$NLSQL_TEST_VAR2").unwrap(), "world");
        assert_eq!(expand_env_vars("$NLSQL_TEST_VAR2!").unwrap(), "world!");
        assert_eq!(expand_env_vars("cost $").unwrap(), "cost $");
        env::remove_var("NLSQL_TEST_VAR2");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("${NONEXISTENT_VAR_12345}");
        assert!(matches!(result, Err(SettingsError::MissingEnvVar(v)) if v == "NONEXISTENT_VAR_12345"));
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[matcher]
top_k = 7
min_similarity = 0.25

[matcher.categories.JOIN]
top_k = 10

[matcher.categories.group_by]
min_similarity = 0.6

[retrieval]
timeout_ms = 1500

[embedding]
dimension = 128

[store]
path = "/tmp/catalog.db"

[compiler]
dialect = "tsql"
"#;

        let settings = Settings::from_toml(toml).unwrap();

        assert_eq!(settings.matcher.top_k, 7);
        assert_eq!(settings.matcher.top_k_for(Category::Join), 10);
        assert_eq!(settings.matcher.top_k_for(Category::Table), 7);
        assert_eq!(settings.matcher.min_similarity_for(Category::GroupBy), 0.6);
        assert_eq!(settings.matcher.min_similarity_for(Category::Filter), 0.25);
        assert_eq!(settings.retrieval.timeout(), Duration::from_millis(1500));
        assert_eq!(settings.embedding.dimension, 128);
        assert_eq!(
            settings.store.resolved_path().unwrap(),
            Some(PathBuf::from("/tmp/catalog.db"))
        );
        assert_eq!(settings.compiler.dialect, Dialect::TSql);
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();

        assert_eq!(settings.matcher.top_k, 5);
        assert_eq!(settings.matcher.min_similarity, 0.3);
        assert_eq!(settings.retrieval.timeout_ms, 5000);
        assert_eq!(settings.compiler.dialect, Dialect::DuckDb);
        assert!(settings.store.path.is_none());
        settings.validate().unwrap();
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings = Settings::from_toml("[compiler]\ndialect = \"mysql\"\n").unwrap();
        assert_eq!(settings.compiler.dialect, Dialect::MySql);
        assert_eq!(settings.matcher.top_k, 5);
    }

    #[test]
    fn test_invalid_limits_rejected() {
        let err = Settings::from_toml("[matcher]\nmin_similarity = 1.5\n").unwrap_err();
        assert!(matches!(err, SettingsError::InvalidConfig(_)));

        let err = Settings::from_toml("[matcher.categories.TABLE]\ntop_k = 0\n").unwrap_err();
        assert!(matches!(err, SettingsError::InvalidConfig(msg) if msg.contains("TABLE")));
    }

    #[test]
    fn test_unknown_dialect_is_parse_error() {
        let err = Settings::from_toml("[compiler]\ndialect = \"oracle\"\n").unwrap_err();
        assert!(matches!(err, SettingsError::ParseError(_)));
    }
}
