use anyhow::Result;
use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use ragline_core::error::Error;
use ragline_core::traits::Embedder;
use ragline_core::types::Chunk;

use crate::schema::{build_chunk_schema, TABLE_NAME};
use crate::table::open_db;

const EMBED_BATCH: usize = 64;
const INSERT_BATCH: usize = 1000;

/// Writes a fresh `chunks` table. Any previous store in the directory is removed.
pub struct VectorStoreWriter {
	dir: PathBuf,
	show_progress: bool,
}

impl VectorStoreWriter {
	pub fn new(dir: &Path) -> Self { Self { dir: dir.to_path_buf(), show_progress: false } }

	pub fn with_progress(mut self, show: bool) -> Self { self.show_progress = show; self }

	/// Embed every chunk, then persist text and vectors together.
	pub fn write(&self, chunks: &[Chunk], embedder: &dyn Embedder) -> Result<usize> {
		let embeddings = self.embed_all(chunks, embedder)?;
		let rt = tokio::runtime::Runtime::new()?;
		rt.block_on(self.write_embedded(chunks, &embeddings, embedder.dim()))
	}

	fn embed_all(&self, chunks: &[Chunk], embedder: &dyn Embedder) -> Result<Vec<Vec<f32>>> {
		let pb = if self.show_progress { ProgressBar::new(chunks.len() as u64) } else { ProgressBar::hidden() };
		pb.set_style(
			ProgressStyle::default_bar()
				.template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")?
				.progress_chars("#>-"),
		);
		pb.set_message("embedding");
		let mut out = Vec::with_capacity(chunks.len());
		for batch in chunks.chunks(EMBED_BATCH) {
			let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
			let vectors = embedder.embed_batch(&texts)?;
			if vectors.len() != texts.len() {
				return Err(Error::Operation(format!("embedder returned {} vectors for {} texts", vectors.len(), texts.len())).into());
			}
			out.extend(vectors);
			pb.inc(batch.len() as u64);
		}
		pb.finish_with_message("embedded");
		Ok(out)
	}

	pub async fn write_embedded(&self, chunks: &[Chunk], embeddings: &[Vec<f32>], dim: usize) -> Result<usize> {
		if chunks.len() != embeddings.len() {
			return Err(Error::Operation(format!("{} chunks but {} embeddings", chunks.len(), embeddings.len())).into());
		}
		if let Some(bad) = embeddings.iter().find(|v| v.len() != dim) {
			return Err(Error::Operation(format!("embedding has {} dims, expected {}", bad.len(), dim)).into());
		}
		if self.dir.exists() { std::fs::remove_dir_all(&self.dir)?; }
		std::fs::create_dir_all(&self.dir)?;
		let db = open_db(&self.dir.to_string_lossy()).await?;
		let schema = build_chunk_schema(dim as i32);

		let empty = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
		db.create_table(TABLE_NAME, Box::new(empty)).execute().await?;
		for (i, (batch_chunks, batch_vecs)) in chunks.chunks(INSERT_BATCH).zip(embeddings.chunks(INSERT_BATCH)).enumerate() {
			let record_batch = to_record_batch(batch_chunks, batch_vecs, dim as i32)?;
			insert_batch(&db, record_batch).await?;
			info!(batch = i, rows = batch_chunks.len(), "vector rows inserted");
		}
		info!(rows = chunks.len(), dir = %self.dir.display(), "vector store written");
		Ok(chunks.len())
	}
}

async fn insert_batch(db: &Connection, record_batch: RecordBatch) -> Result<()> {
	let schema = record_batch.schema();
	let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
	db.open_table(TABLE_NAME).execute().await?.add(reader).execute().await?;
	Ok(())
}

fn to_record_batch(chunks: &[Chunk], embeddings: &[Vec<f32>], dim: i32) -> Result<RecordBatch> {
	let schema = build_chunk_schema(dim);
	let mut positions = Vec::with_capacity(chunks.len());
	let mut sources = Vec::with_capacity(chunks.len());
	let mut texts = Vec::with_capacity(chunks.len());
	for c in chunks {
		positions.push(i32::try_from(c.position).map_err(|_| Error::Operation(format!("chunk position {} overflows", c.position)))?);
		sources.push(c.source.clone());
		texts.push(c.text.clone());
	}
	let vectors: Vec<Option<Vec<Option<f32>>>> = embeddings.iter().map(|v| Some(v.iter().map(|&x| Some(x)).collect())).collect();
	let record_batch = RecordBatch::try_new(schema, vec![
		Arc::new(Int32Array::from(positions)),
		Arc::new(StringArray::from(sources)),
		Arc::new(StringArray::from(texts)),
		Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), dim)),
	])?;
	Ok(record_batch)
}
