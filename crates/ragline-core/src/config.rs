//! Layered configuration and path helpers.
//!
//! Figment merges built-in defaults, `ragline.toml`, `ragline.<env>.toml`
//! (from `RUST_ENV`) and `RAGLINE_*` env vars (`__` separates nested keys,
//! e.g. `RAGLINE_RETRIEVAL__K=8`). The result is extracted into [`Settings`].

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkingConfig;
use crate::error::Error;
use crate::types::RetrievalMode;

pub const ENV_PREFIX: &str = "RAGLINE_";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    pub data: DataConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub rerank: RerankConfig,
    pub answer: AnswerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataConfig {
    pub artifact_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalConfig {
    pub mode: RetrievalMode,
    pub k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    pub model_dir: String,
    pub max_len: usize,
    pub fake: bool,
    pub fake_dim: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RerankKind {
    CrossEncoder,
    TermOverlap,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RerankConfig {
    pub enabled: bool,
    pub kind: RerankKind,
    pub model_dir: String,
    pub max_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerConfig {
    /// Extractive QA model directory. Without one, every answer is generated.
    pub reader_model_dir: Option<String>,
    pub max_len: usize,
    pub ollama_url: String,
    pub ollama_model: String,
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data: DataConfig { artifact_dir: "retrievers".to_string() },
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig { mode: RetrievalMode::Hybrid, k: 4 },
            embedding: EmbeddingConfig {
                model_dir: "models/all-MiniLM-L6-v2".to_string(),
                max_len: 256,
                fake: false,
                fake_dim: 384,
            },
            rerank: RerankConfig {
                enabled: false,
                kind: RerankKind::CrossEncoder,
                model_dir: "models/ms-marco-MiniLM-L-6-v2".to_string(),
                max_len: 512,
            },
            answer: AnswerConfig {
                reader_model_dir: None,
                max_len: 384,
                ollama_url: "http://127.0.0.1:11434".to_string(),
                ollama_model: "llama3.2".to_string(),
                timeout_secs: 120,
            },
        }
    }
}

impl Settings {
    /// Load from the working directory using `RUST_ENV` (default `dev`).
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name, None)
    }

    /// Load with an explicit base directory, environment and optional extra file.
    pub fn load_from(base: &Path, env_name: &str, extra: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(base.join("ragline.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(base.join("ragline.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base.join("ragline.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base.join("ragline.test.toml"))),
            _ => {}
        }
        if let Some(path) = extra {
            if !path.exists() {
                return Err(Error::NotFound(format!("config file {}", path.display())).into());
            }
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let settings: Settings = figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.retrieval.k == 0 {
            return Err(Error::InvalidConfig("retrieval.k must be at least 1".into()));
        }
        if self.embedding.fake && self.embedding.fake_dim == 0 {
            return Err(Error::InvalidConfig("embedding.fake_dim must be at least 1".into()));
        }
        self.chunking.validate()
    }

    pub fn artifact_dir(&self) -> PathBuf {
        expand_path(&self.data.artifact_dir)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
