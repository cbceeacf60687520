//! Configuration module for nlsql.
//!
//! Handles the settings file, environment variable expansion and defaults.

mod settings;

pub use settings::{
    expand_env_vars, CategorySettings, CompilerSettings, EmbeddingSettings, MatcherSettings,
    RetrievalSettings, Settings, SettingsError, StoreSettings,
};
