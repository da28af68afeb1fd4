//! Engine configuration.
//!
//! The source set is configuration-driven: each entry becomes one retrieval
//! adapter at startup, so adding a backend to a deployment never touches
//! orchestrator logic.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::completion::{DEFAULT_COMPLETION_MODEL, DEFAULT_OLLAMA_URL};
use crate::embedding::DEFAULT_EMBEDDING_MODEL;
use crate::retrieval::primary::DEFAULT_SIMILARITY_THRESHOLD;
use crate::strategy::StrategyProfiles;
use crate::synthesis::SynthesisConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
    /// When set, orchestrator-internal failures fall back to a single-source
    /// path instead of propagating
    #[serde(default = "default_true")]
    pub fallback_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub base_url: String,
    pub embedding_model: String,
    pub completion_model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            completion_model: DEFAULT_COMPLETION_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Per-source timeout applied unless a source overrides it
    pub timeout_ms: u64,
    /// Similarity threshold for primary-store queries
    pub similarity_threshold: f64,
    #[serde(default)]
    pub profiles: StrategyProfiles,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            profiles: StrategyProfiles::default(),
        }
    }
}

/// Kind of backend a source entry wires up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Partition of the primary structured store
    Primary,
    /// Externally hosted top-k index
    Hosted,
}

/// One configured knowledge backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub kind: SourceKind,
    /// Partition name; required for primary sources
    #[serde(default)]
    pub partition: Option<String>,
    /// Service URL; required for hosted sources
    #[serde(default)]
    pub url: Option<String>,
    /// Static tie-break weight, higher wins
    #[serde(default)]
    pub priority: u32,
    /// Per-source timeout override
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_true() -> bool {
    true
}

fn default_sources() -> Vec<SourceConfig> {
    ["knowledge", "issues", "commits"]
        .iter()
        .map(|partition| SourceConfig {
            name: partition.to_string(),
            kind: SourceKind::Primary,
            partition: Some(partition.to_string()),
            url: None,
            priority: 0,
            timeout_ms: None,
        })
        .collect()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ollama: OllamaConfig::default(),
            store: StoreConfig::default(),
            retrieval: RetrievalConfig::default(),
            synthesis: SynthesisConfig::default(),
            sources: default_sources(),
            fallback_enabled: true,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the default path, creating it if missing
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = EngineConfig::default();
            config.save()?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).context("Failed to read config file")?;

        let config: EngineConfig =
            toml::from_str(&contents).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, toml_string).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;

        Ok(home.join(".answersmith").join("config.toml"))
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            anyhow::bail!("At least one source must be configured");
        }
        if self.retrieval.timeout_ms == 0 {
            anyhow::bail!("retrieval.timeout_ms must be positive");
        }

        for source in &self.sources {
            match source.kind {
                SourceKind::Primary if source.partition.is_none() => {
                    anyhow::bail!("Primary source '{}' is missing a partition", source.name)
                }
                SourceKind::Hosted if source.url.is_none() => {
                    anyhow::bail!("Hosted source '{}' is missing a url", source.name)
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Effective timeout for one source entry
    pub fn source_timeout(&self, source: &SourceConfig) -> Duration {
        Duration::from_millis(source.timeout_ms.unwrap_or(self.retrieval.timeout_ms))
    }
}
