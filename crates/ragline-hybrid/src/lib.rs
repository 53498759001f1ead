//! Query-time fusion and the end-to-end RAG pipeline.
//!
//! Ingestion rebuilds the dense and/or lexical index for a mode. At query
//! time a [`RetrieverSet`] serves `exact`, `lexical` or `hybrid` retrieval,
//! and [`run_rag_pipeline`] reranks, builds the context and answers.

pub mod artifacts;
pub mod ingest;
pub mod pipeline;
pub mod retrieve;

pub use artifacts::ArtifactPaths;
pub use ingest::{ingest, IngestReport};
pub use pipeline::{retrieve_passages, retriever_k, run_rag_pipeline, RagAnswer, RagRequest};
pub use retrieve::{DiskRetrievers, HybridRetriever, RetrieverSet};
