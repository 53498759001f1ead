//! Dense retrieval over a LanceDB table of chunk embeddings.
//!
//! [`VectorStoreWriter`] rebuilds the table from chunks, [`VectorStore`]
//! answers nearest-neighbour queries with cosine distance and no ANN index,
//! so results are exact.

pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use search::VectorStore;
pub use writer::VectorStoreWriter;
