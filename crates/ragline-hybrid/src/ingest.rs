use anyhow::Result;
use serde::Serialize;
use tracing::info;

use ragline_core::error::Error;
use ragline_core::traits::Embedder;
use ragline_core::types::{Chunk, RetrievalMode};
use ragline_text::LexicalIndexWriter;
use ragline_vector::VectorStoreWriter;

use crate::artifacts::ArtifactPaths;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub chunks: usize,
    pub dense_rows: Option<usize>,
    pub lexical_docs: Option<usize>,
}

/// Rebuild the indexes `mode` needs from `chunks`. Each touched index is
/// replaced whole; the other is left as it was.
pub fn ingest(
    chunks: &[Chunk],
    mode: RetrievalMode,
    paths: &ArtifactPaths,
    embedder: Option<&dyn Embedder>,
    show_progress: bool,
) -> Result<IngestReport> {
    let mut report = IngestReport { chunks: chunks.len(), ..Default::default() };
    if mode.uses_dense() {
        let embedder = embedder.ok_or_else(|| Error::InvalidConfig(format!("mode '{}' needs an embedder", mode)))?;
        let rows = VectorStoreWriter::new(&paths.vectorstore).with_progress(show_progress).write(chunks, embedder)?;
        report.dense_rows = Some(rows);
    }
    if mode.uses_lexical() {
        let docs = LexicalIndexWriter::new(paths.lexical.clone()).write(chunks)?;
        report.lexical_docs = Some(docs);
    }
    info!(mode = %mode, chunks = chunks.len(), root = %paths.root.display(), "ingest complete");
    Ok(report)
}
