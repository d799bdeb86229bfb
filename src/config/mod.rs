//! Configuration management.

mod policy;

pub use policy::KnowledgePolicy;

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the knowledge file, relative to the working directory.
pub const DEFAULT_DATA_FILE: &str = "knowledge.json";

/// Default prefix that turns a chat message into a recall trigger.
pub const DEFAULT_RECALL_PREFIX: &str = "호시노야 ";

/// Default inactivity timeout for a pending multi-delete selection.
pub const DEFAULT_SELECTION_TIMEOUT: Duration = Duration::from_secs(120);

/// Main configuration for guildlore.
#[derive(Debug, Clone)]
pub struct GuildloreConfig {
    /// Path to the knowledge JSON file.
    pub data_file: PathBuf,
    /// Default knowledge and delete privileges.
    pub policy: KnowledgePolicy,
    /// How long a multi-delete selection stays open without activity.
    pub selection_timeout: Duration,
    /// Prefix that marks a chat message as a recall trigger.
    pub recall_prefix: String,
    /// Interval for periodic reloads; `None` disables them.
    pub reload_interval: Option<Duration>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Knowledge file path.
    pub data_file: Option<String>,
    /// Selection timeout in seconds.
    pub selection_timeout_secs: Option<u64>,
    /// Recall prefix.
    pub recall_prefix: Option<String>,
    /// Reload interval in seconds; 0 disables.
    pub reload_interval_secs: Option<u64>,
    /// Keyword to canned response; replaces the built-in table when present.
    pub default_knowledge: Option<BTreeMap<String, String>>,
    /// Users allowed to delete anyone's records.
    pub privileged_users: Option<Vec<String>>,
    /// Extra keywords that can never be taught.
    pub protected_keywords: Option<Vec<String>>,
}

impl Default for GuildloreConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            policy: KnowledgePolicy::default(),
            selection_timeout: DEFAULT_SELECTION_TIMEOUT,
            recall_prefix: DEFAULT_RECALL_PREFIX.to_string(),
            reload_interval: None,
        }
    }
}

impl GuildloreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::PersistenceFailure {
                operation: "read_config_file".to_string(),
                cause: format!("{}: {e}", path.display()),
            })?;

        Self::parse(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration TOML.
    pub fn parse(contents: &str) -> crate::Result<Self> {
        let file: ConfigFile = toml::from_str(contents)
            .map_err(|e| crate::Error::InvalidInput(format!("config file: {e}")))?;

        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/guildlore/` on macOS)
    /// 2. XDG config dir (`~/.config/guildlore/` for Unix compatibility)
    ///
    /// Returns default configuration if no config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let platform_config = base_dirs.config_dir().join("guildlore").join("config.toml");
        if platform_config.exists() {
            if let Ok(config) = Self::load_from_file(&platform_config) {
                return config;
            }
        }

        let xdg_config = base_dirs
            .home_dir()
            .join(".config")
            .join("guildlore")
            .join("config.toml");
        if xdg_config.exists() {
            if let Ok(config) = Self::load_from_file(&xdg_config) {
                return config;
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to `GuildloreConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(data_file) = file.data_file {
            config.data_file = PathBuf::from(data_file);
        }
        if let Some(secs) = file.selection_timeout_secs {
            config.selection_timeout = Duration::from_secs(secs);
        }
        if let Some(prefix) = file.recall_prefix {
            config.recall_prefix = prefix;
        }
        if let Some(secs) = file.reload_interval_secs {
            config.reload_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }

        let mut policy = file
            .default_knowledge
            .map_or_else(KnowledgePolicy::default, |table| {
                KnowledgePolicy::new(table, config.policy.privileged_users().cloned())
            });
        if let Some(users) = file.privileged_users {
            policy = KnowledgePolicy::new(policy.default_knowledge().clone(), users);
        }
        if let Some(keywords) = file.protected_keywords {
            policy = policy.with_protected_keywords(keywords);
        }
        config.policy = policy;

        config
    }

    /// Applies `GUILDLORE_DATA_FILE` if set.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var("GUILDLORE_DATA_FILE") {
            if !path.trim().is_empty() {
                self.data_file = PathBuf::from(path);
            }
        }
        self
    }

    /// Sets the knowledge file path.
    #[must_use]
    pub fn with_data_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_file = path.into();
        self
    }
}
