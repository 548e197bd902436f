//! Twin configuration.
//!
//! # Security
//!
//! - Config file permission validation on Unix systems
//! - Rejects world-readable files containing API keys
//! - Warns about API keys stored in config files

use serde::{Deserialize, Serialize};
use tracing::warn;
use twin_llm::{LlmConfig, ProviderKind};
use twin_memory::{EmbeddingConfig, StoreConfig};

use crate::category::CategoryOverrides;
use crate::learning::LearningConfig;
use crate::persona::Persona;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TwinConfig {
    pub persona: Persona,
    pub llm: LlmSection,
    pub embedding: EmbeddingConfig,
    pub store: StoreConfig,
    /// Per-category tuning overrides
    pub categories: CategoryOverrides,
    pub learning: LearningConfig,
    pub server: ServerConfig,
}

/// Generation providers. The first entry for a kind wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_provider")]
    pub default_provider: ProviderKind,

    #[serde(default = "default_providers")]
    pub providers: Vec<LlmConfig>,
}

fn default_provider() -> ProviderKind {
    ProviderKind::Gemini
}

fn default_providers() -> Vec<LlmConfig> {
    vec![LlmConfig::new(ProviderKind::Gemini, "gemini-1.5-flash")]
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            providers: default_providers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".into(),
            port: 8080,
            cors_origins: Vec::new(),
        }
    }
}

impl TwinConfig {
    /// Load configuration from a TOML file.
    ///
    /// On Unix systems the file must be a regular file, must not be
    /// world-writable, and must not be world-readable if it holds an API key.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        #[cfg(unix)]
        validate_config_file_permissions(path)?;

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;

        if config.has_inline_api_keys() {
            warn!(
                "API key found in config file '{}'. For better security, use environment \
                 variables instead (OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY, \
                 TWIN_STORE_API_KEY).",
                path.display()
            );
        }

        Ok(config)
    }

    /// Parse configuration without touching the filesystem.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn has_inline_api_keys(&self) -> bool {
        self.llm.providers.iter().any(|p| p.api_key.is_some())
            || self.embedding.api_key.is_some()
            || self.store.api_key.is_some()
    }
}

#[cfg(unix)]
fn validate_config_file_permissions(path: &std::path::Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::symlink_metadata(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;

    if !metadata.is_file() {
        anyhow::bail!(
            "Config path '{}' is not a regular file. Symlinks and directories are not allowed.",
            path.display()
        );
    }

    let permission_bits = metadata.permissions().mode() & 0o777;

    if permission_bits & 0o002 != 0 {
        anyhow::bail!(
            "Config file '{}' is world-writable (mode {:04o}). Fix with: chmod o-w {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    let content = std::fs::read_to_string(path).unwrap_or_default();
    let has_api_key = content.lines().any(|line| {
        let line = line.trim_start();
        !line.starts_with('#') && line.starts_with("api_key")
    });

    if has_api_key && permission_bits & 0o004 != 0 {
        anyhow::bail!(
            "Config file '{}' contains an API key but is world-readable (mode {:04o}). \
             Fix with: chmod 600 {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    if has_api_key && permission_bits & 0o040 != 0 {
        warn!(
            "Config file '{}' contains an API key and is group-readable (mode {:04o}). \
             Consider restricting access with: chmod 600 {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    Ok(())
}
