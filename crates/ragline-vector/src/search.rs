use anyhow::Result;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};
use std::path::Path;
use tokio::runtime::Runtime;
use tracing::debug;

use ragline_core::error::Error;
use ragline_core::fusion::select_by_scores;
use ragline_core::traits::{Embedder, Retriever};
use ragline_core::types::{RetrievedDoc, SourceKind};

use crate::schema::{vector_dim, DISTANCE_COLUMN, POSITION_COLUMN, TABLE_NAME, TEXT_COLUMN};
use crate::table::{float_column, int_column, open_db, string_column};

/// Read side of the dense index: exact cosine kNN over the stored vectors.
pub struct VectorStore<E: Embedder> {
	table: Table,
	embedder: E,
	rows: usize,
	rt: Runtime,
}

impl<E: Embedder> VectorStore<E> {
	pub fn open(dir: &Path, embedder: E) -> Result<Self> {
		if !dir.exists() {
			return Err(Error::NotFound(format!("vector store {}", dir.display())).into());
		}
		let rt = Runtime::new()?;
		let (table, rows, dim) = rt.block_on(async {
			let db = open_db(&dir.to_string_lossy()).await?;
			let names = db.table_names().execute().await?;
			if !names.iter().any(|n| n == TABLE_NAME) {
				return Err(anyhow::Error::from(Error::NotFound(format!("table '{}' in {}", TABLE_NAME, dir.display()))));
			}
			let table = db.open_table(TABLE_NAME).execute().await?;
			let rows = table.count_rows(None).await?;
			let dim = vector_dim(&table.schema().await?);
			Ok((table, rows, dim))
		})?;
		if dim != Some(embedder.dim()) {
			return Err(Error::InvalidConfig(format!(
				"vector store holds {:?}-dim vectors but the embedder produces {}",
				dim,
				embedder.dim()
			))
			.into());
		}
		Ok(Self { rt, table, embedder, rows })
	}

	pub fn len(&self) -> usize { self.rows }

	pub fn is_empty(&self) -> bool { self.rows == 0 }

	pub fn embedder(&self) -> &E { &self.embedder }

	/// Nearest `k` rows to `q_vec`; score is `1 - cosine distance`.
	pub fn search_vec(&self, q_vec: &[f32], k: usize) -> Result<Vec<RetrievedDoc>> {
		if k == 0 || self.rows == 0 { return Ok(vec![]); }
		let limit = k.min(self.rows);
		let hits = self.rt.block_on(async {
			let mut stream = self
				.table
				.vector_search(q_vec.to_vec())?
				.distance_type(DistanceType::Cosine)
				.limit(limit)
				.execute()
				.await?;
			let mut hits = Vec::with_capacity(limit);
			while let Some(batch) = stream.try_next().await? {
				let positions = int_column(&batch, POSITION_COLUMN)?;
				let texts = string_column(&batch, TEXT_COLUMN)?;
				let distances = float_column(&batch, DISTANCE_COLUMN)?;
				for i in 0..batch.num_rows() {
					hits.push(RetrievedDoc {
						text: texts.value(i).to_string(),
						source: SourceKind::Dense,
						score: 1.0 - distances.value(i),
						position: positions.value(i).max(0) as usize,
					});
				}
			}
			Ok::<_, anyhow::Error>(hits)
		})?;
		Ok(rank_hits(hits, k))
	}
}

/// Best `k` hits by score; ties keep chunk order and `NaN` scores sink.
fn rank_hits(mut hits: Vec<RetrievedDoc>, k: usize) -> Vec<RetrievedDoc> {
	hits.sort_by_key(|h| h.position);
	let scores: Vec<f32> = hits.iter().map(|h| h.score).collect();
	select_by_scores(hits, &scores, k)
}

impl<E: Embedder> Retriever for VectorStore<E> {
	fn retrieve(&self, question: &str, k: usize) -> Result<Vec<RetrievedDoc>> {
		if k == 0 || self.rows == 0 { return Ok(vec![]); }
		let q_vec = self
			.embedder
			.embed_batch(&[question.to_string()])?
			.into_iter()
			.next()
			.ok_or_else(|| Error::Operation("embedder returned no vector for the question".into()))?;
		let hits = self.search_vec(&q_vec, k)?;
		debug!(k, hits = hits.len(), "dense retrieval");
		Ok(hits)
	}
}
