use anyhow::Result;
use tracing::debug;

use ragline_core::error::Error;
use ragline_core::fusion::{merge_and_dedupe, tag_source};
use ragline_core::traits::{Embedder, Retriever};
use ragline_core::types::{RetrievalMode, RetrievedDoc, SourceKind};
use ragline_text::LexicalIndex;
use ragline_vector::VectorStore;

use crate::artifacts::ArtifactPaths;

/// Dense top-k then lexical top-k, tagged and deduplicated by text.
/// Not truncated: up to `2k` documents come back.
pub struct HybridRetriever<D, L> {
    dense: D,
    lexical: L,
}

impl<D: Retriever, L: Retriever> HybridRetriever<D, L> {
    pub fn new(dense: D, lexical: L) -> Self { Self { dense, lexical } }
}

impl<D: Retriever, L: Retriever> Retriever for HybridRetriever<D, L> {
    fn retrieve(&self, question: &str, k: usize) -> Result<Vec<RetrievedDoc>> {
        let mut dense_docs = self.dense.retrieve(question, k)?;
        let mut lexical_docs = self.lexical.retrieve(question, k)?;
        tag_source(&mut dense_docs, SourceKind::Dense);
        tag_source(&mut lexical_docs, SourceKind::Lexical);
        let (n_dense, n_lexical) = (dense_docs.len(), lexical_docs.len());
        let merged = merge_and_dedupe(dense_docs, lexical_docs);
        debug!(n_dense, n_lexical, merged = merged.len(), "hybrid merge");
        Ok(merged)
    }
}

/// The indexes opened for a query; a mode may only use what is present.
pub struct RetrieverSet<D, L> {
    pub dense: Option<D>,
    pub lexical: Option<L>,
}

impl<D: Retriever, L: Retriever> RetrieverSet<D, L> {
    pub fn new(dense: Option<D>, lexical: Option<L>) -> Self { Self { dense, lexical } }

    fn dense(&self) -> Result<&D> {
        self.dense.as_ref().ok_or_else(|| Error::NotFound("dense index was not opened".into()).into())
    }

    fn lexical(&self) -> Result<&L> {
        self.lexical.as_ref().ok_or_else(|| Error::NotFound("lexical index was not opened".into()).into())
    }

    pub fn retrieve(&self, mode: RetrievalMode, question: &str, k: usize) -> Result<Vec<RetrievedDoc>> {
        match mode {
            RetrievalMode::Exact => {
                let mut docs = self.dense()?.retrieve(question, k)?;
                tag_source(&mut docs, SourceKind::Dense);
                Ok(docs)
            }
            RetrievalMode::Lexical => {
                let mut docs = self.lexical()?.retrieve(question, k)?;
                tag_source(&mut docs, SourceKind::Lexical);
                Ok(docs)
            }
            RetrievalMode::Hybrid => HybridRetriever::new(self.dense()?, self.lexical()?).retrieve(question, k),
        }
    }
}

/// Retrievers backed by the on-disk artifacts.
pub type DiskRetrievers<E> = RetrieverSet<VectorStore<E>, LexicalIndex>;

impl<E: Embedder> DiskRetrievers<E> {
    /// Open from disk the indexes that `mode` reads.
    pub fn open(paths: &ArtifactPaths, mode: RetrievalMode, embedder: Option<E>) -> Result<Self> {
        let dense = if mode.uses_dense() {
            let embedder = embedder.ok_or_else(|| Error::InvalidConfig(format!("mode '{}' needs an embedder", mode)))?;
            Some(VectorStore::open(&paths.vectorstore, embedder)?)
        } else {
            None
        };
        let lexical = if mode.uses_lexical() { Some(LexicalIndex::open(&paths.lexical)?) } else { None };
        Ok(Self { dense, lexical })
    }
}
