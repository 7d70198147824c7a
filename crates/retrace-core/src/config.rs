use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, RetraceError};

/// Top-level configuration for the Retrace engine.
///
/// Loaded from `~/.retrace/config.toml` by default. Each section
/// corresponds to one pipeline layer; every field has a default so a
/// partial (or missing) file always produces a usable configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetraceConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

impl RetraceConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RetraceConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file does not
    /// exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| RetraceError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite store.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// REST API port.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.retrace/data".to_string(),
            log_level: "info".to_string(),
            port: 3040,
        }
    }
}

/// Content-to-passage chunking parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Hard cap on words per passage.
    pub max_words_per_passage: usize,
    /// Fraction of `max_words_per_passage` after which a paragraph break
    /// closes the current passage early.
    pub sibling_merge_threshold: f64,
    /// Hard cap on passages kept per page.
    pub max_passages_per_page: usize,
    /// Passages below this quality are dropped.
    pub min_passage_quality: f64,
    /// Inputs shorter than this many chars are rejected outright.
    pub min_chars: usize,
    /// Inputs with fewer words than this are rejected outright.
    pub min_words: usize,
    /// Page content is truncated to this many chars before chunking.
    pub max_content_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_words_per_passage: 200,
            sibling_merge_threshold: 0.8,
            max_passages_per_page: 30,
            min_passage_quality: 0.3,
            min_chars: 200,
            min_words: 10,
            max_content_chars: 10_000,
        }
    }
}

/// Embedding backend selection and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Backend name: "mock" or "onnx".
    pub backend: String,
    /// Directory holding `model.onnx` + `tokenizer.json` for the onnx
    /// backend.
    pub model_dir: String,
    /// Per-call embedding deadline.
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: "mock".to_string(),
            model_dir: String::new(),
            timeout_secs: 30,
        }
    }
}

/// Ranking, fusion, and cache parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Primary semantic selection threshold.
    pub min_similarity: f64,
    /// Looser floor used only when the primary threshold selects nothing.
    pub fallback_floor: f64,
    /// Coefficient on `ln(strong_matches)` for pages with multiple
    /// strong passages.
    pub multi_passage_boost: f64,
    /// RRF rank constant.
    pub rrf_k: f64,
    /// Default semantic weight in weighted RRF.
    pub alpha: f64,
    /// Each ranker produces `k * search_multiplier` candidates for fusion.
    pub search_multiplier: usize,
    /// Bounded query-result cache capacity.
    pub cache_size: usize,
    /// Query-result cache TTL, seconds.
    pub cache_ttl_secs: u64,
    /// Whole-search deadline, seconds.
    pub timeout_secs: u64,
    pub recency_weight: f64,
    pub frequency_weight: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_similarity: 0.70,
            fallback_floor: 0.45,
            multi_passage_boost: 0.10,
            rrf_k: 60.0,
            alpha: 0.7,
            search_multiplier: 3,
            cache_size: 100,
            cache_ttl_secs: 300,
            timeout_secs: 5,
            recency_weight: 0.15,
            frequency_weight: 0.15,
        }
    }
}
