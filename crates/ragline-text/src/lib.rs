//! ragline-text
//!
//! Lexical (BM25) retrieval backed by tantivy. The persisted form is a
//! tantivy index plus a parallel JSON chunk list; both are rewritten whole on
//! every ingest.

pub mod index;
pub mod tantivy_utils;

pub use index::{LexicalIndex, LexicalIndexWriter, LexicalPaths};
pub use tantivy_utils::tokenize;
