//! Domain types shared by the lexical and dense engines.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A contiguous span of source text, independently indexed.
///
/// - `position`: index in the ingestion-ordered chunk list
/// - `source`: where the text came from (file path, or `<inline>`)
/// - `text`: the payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub position: usize,
    pub source: String,
    pub text: String,
}

/// Which ranker produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Dense,
    Lexical,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Dense => "dense",
            SourceKind::Lexical => "lexical",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A passage returned by any retriever, normalized to a common shape.
///
/// `score` is ranker-specific but higher is always better. `position` points
/// back into the chunk list the passage was indexed from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedDoc {
    pub text: String,
    pub source: SourceKind,
    pub score: f32,
    pub position: usize,
}

impl RetrievedDoc {
    /// Text used for deduplication: trimmed and lower-cased.
    pub fn normalized_text(&self) -> String {
        self.text.trim().to_lowercase()
    }
}

/// Retrieval strategy selector.
///
/// `Exact` is flat nearest-neighbour search over embeddings, `Lexical` is
/// BM25, `Hybrid` is both merged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(try_from = "String", into = "String")]
pub enum RetrievalMode {
    Exact,
    Lexical,
    #[default]
    Hybrid,
}

impl RetrievalMode {
    pub fn uses_dense(&self) -> bool {
        matches!(self, RetrievalMode::Exact | RetrievalMode::Hybrid)
    }

    pub fn uses_lexical(&self) -> bool {
        matches!(self, RetrievalMode::Lexical | RetrievalMode::Hybrid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMode::Exact => "exact",
            RetrievalMode::Lexical => "lexical",
            RetrievalMode::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" | "dense" | "faiss" => Ok(RetrievalMode::Exact),
            "lexical" | "bm25" => Ok(RetrievalMode::Lexical),
            "hybrid" => Ok(RetrievalMode::Hybrid),
            other => Err(Error::InvalidConfig(format!(
                "unknown retrieval mode '{other}' (expected exact, lexical or hybrid)"
            ))),
        }
    }
}

impl TryFrom<String> for RetrievalMode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RetrievalMode> for String {
    fn from(mode: RetrievalMode) -> Self {
        mode.as_str().to_string()
    }
}
