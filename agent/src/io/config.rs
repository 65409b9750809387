//! Agent configuration stored in `~/.agent.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::decision::DEFAULT_AFFIRMATIONS;

/// File name of the per-user config under the home directory.
pub const CONFIG_FILE_NAME: &str = ".agent.toml";

/// Attempt budget used when the configured value is not positive.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Agent configuration (TOML).
///
/// Every section is optional; missing fields take the defaults below.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    pub llm: LlmConfig,
    pub embeddings: EmbeddingsConfig,
    pub vector: VectorConfig,
    pub chunker: ChunkerConfig,
    pub auto_index: AutoIndexConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "granite-code:3b".to_string(),
            base_url: "http://localhost:11434".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmbeddingsConfig {
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            model: "all-minilm".to_string(),
            base_url: "http://localhost:11434".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VectorConfig {
    pub base_url: String,
    /// Document corpus fed by `agent index`.
    pub collection: String,
    /// Transcripts of past sessions.
    pub command_collection: String,
    /// Files picked up by the auto-indexer.
    pub auto_index_collection: String,
    pub timeout_secs: u64,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            collection: "documents".to_string(),
            command_collection: "command_history".to_string(),
            auto_index_collection: "auto_indexed".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Window size in characters.
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AutoIndexConfig {
    pub enabled: bool,
    /// Extension allow-list (with leading dot). Empty tracks every extension.
    pub extensions: Vec<String>,
    /// Files larger than this many bytes are skipped.
    pub max_file_size: u64,
    pub exclude_patterns: Vec<String>,
}

impl Default for AutoIndexConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            extensions: [".txt", ".md", ".py", ".js", ".go", ".json", ".yaml", ".yml"]
                .map(String::from)
                .to_vec(),
            max_file_size: 1024 * 1024,
            exclude_patterns: [".git/*", "node_modules/*", "*.log", "tmp/*", "temp/*", "*.tmp"]
                .map(String::from)
                .to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChatConfig {
    /// Attempt budget per request; values `<= 0` fall back to 3.
    pub max_attempts: i64,
    pub max_output_lines: usize,
    pub truncate_output: bool,
    /// Documents retrieved as context for the first model call.
    pub max_documents: usize,
    /// Past sessions retrieved as context for the first model call.
    pub max_history: usize,
    /// Substrings that make a goal-check reply count as "achieved".
    pub goal_affirmations: Vec<String>,
    /// Enable the built-in evaluator shortcuts (time, IP address).
    pub shortcuts: bool,
    /// Append evaluation diagnostics to this file when set.
    pub debug_log: Option<PathBuf>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_attempts: i64::from(DEFAULT_MAX_ATTEMPTS),
            max_output_lines: 50,
            truncate_output: true,
            max_documents: 5,
            max_history: 3,
            goal_affirmations: DEFAULT_AFFIRMATIONS.map(String::from).to_vec(),
            shortcuts: true,
            debug_log: None,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("llm.base_url", &self.llm.base_url),
            ("embeddings.base_url", &self.embeddings.base_url),
            ("vector.base_url", &self.vector.base_url),
        ] {
            if url.trim().is_empty() {
                return Err(anyhow!("{name} must not be empty"));
            }
        }
        if self.llm.model.trim().is_empty() {
            return Err(anyhow!("llm.model must not be empty"));
        }
        if self.embeddings.model.trim().is_empty() {
            return Err(anyhow!("embeddings.model must not be empty"));
        }
        for (name, secs) in [
            ("llm.timeout_secs", self.llm.timeout_secs),
            ("embeddings.timeout_secs", self.embeddings.timeout_secs),
            ("vector.timeout_secs", self.vector.timeout_secs),
        ] {
            if secs == 0 {
                return Err(anyhow!("{name} must be > 0"));
            }
        }
        if self.chunker.chunk_size == 0 {
            return Err(anyhow!("chunker.chunk_size must be > 0"));
        }
        if self.chunker.chunk_overlap >= self.chunker.chunk_size {
            return Err(anyhow!("chunker.chunk_overlap must be < chunker.chunk_size"));
        }
        if self.auto_index.max_file_size == 0 {
            return Err(anyhow!("auto_index.max_file_size must be > 0"));
        }
        Ok(())
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl EmbeddingsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl VectorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Immutable per-session settings resolved from the config file and CLI flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub auto_approve: bool,
    pub auto_index: bool,
    pub no_history: bool,
    /// Always `>= 1`.
    pub max_attempts: u32,
    pub max_output_lines: usize,
    pub truncate_output: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_chat(&ChatConfig::default())
    }
}

impl SessionConfig {
    /// Session settings from the `[chat]` section with every flag off.
    pub fn from_chat(chat: &ChatConfig) -> Self {
        Self {
            auto_approve: false,
            auto_index: false,
            no_history: false,
            max_attempts: resolve_max_attempts(chat.max_attempts),
            max_output_lines: chat.max_output_lines,
            truncate_output: chat.truncate_output,
        }
    }
}

/// Clamp a configured attempt budget to the valid range.
pub fn resolve_max_attempts(configured: i64) -> u32 {
    if configured <= 0 {
        return DEFAULT_MAX_ATTEMPTS;
    }
    u32::try_from(configured).unwrap_or(u32::MAX)
}

/// Location of the per-user config file.
pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("resolve home directory")?;
    Ok(home.join(CONFIG_FILE_NAME))
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AgentConfig::default());
        assert_eq!(cfg.vector.command_collection, "command_history");
        assert_eq!(cfg.auto_index.max_file_size, 1_048_576);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("agent.toml");
        fs::write(
            &path,
            "[llm]\nmodel = \"llama3\"\n\n[chat]\nmax_attempts = 5\ntruncate_output = false\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.llm.model, "llama3");
        assert_eq!(cfg.llm.base_url, "http://localhost:11434");
        assert_eq!(cfg.chat.max_attempts, 5);
        assert!(!cfg.chat.truncate_output);
        assert_eq!(cfg.chat.max_output_lines, 50);
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk() {
        let mut cfg = AgentConfig::default();
        cfg.chunker.chunk_overlap = cfg.chunker.chunk_size;
        let err = cfg.validate().expect_err("invalid");
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn rejects_malformed_toml() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("agent.toml");
        fs::write(&path, "[chat\nmax_attempts = ").expect("write");
        let err = load_config(&path).expect_err("parse error");
        assert!(format!("{err:#}").contains("parse"));
    }

    #[test]
    fn non_positive_attempts_fall_back_to_default() {
        assert_eq!(resolve_max_attempts(0), 3);
        assert_eq!(resolve_max_attempts(-4), 3);
        assert_eq!(resolve_max_attempts(1), 1);
        assert_eq!(resolve_max_attempts(7), 7);

        let chat = ChatConfig {
            max_attempts: 0,
            ..ChatConfig::default()
        };
        assert_eq!(SessionConfig::from_chat(&chat).max_attempts, 3);
    }
}
