use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info};

use ragline_core::error::Error;
use ragline_core::fusion::top_k;
use ragline_core::traits::Retriever;
use ragline_core::types::{Chunk, RetrievedDoc, SourceKind};

use crate::tantivy_utils::{build_schema, register_tokenizer, tokenize, POSITION_FIELD, TEXT_FIELD};

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// On-disk layout of the lexical artifacts under one directory.
#[derive(Debug, Clone)]
pub struct LexicalPaths {
	pub index_dir: PathBuf,
	pub chunks_file: PathBuf,
}

impl LexicalPaths {
	pub fn under(dir: &Path) -> Self {
		Self { index_dir: dir.join("index"), chunks_file: dir.join("chunks.json") }
	}
}

/// Builds a fresh lexical index and its parallel chunk list.
pub struct LexicalIndexWriter {
	paths: LexicalPaths,
}

impl LexicalIndexWriter {
	pub fn new(paths: LexicalPaths) -> Self { Self { paths } }

	/// Replace whatever is on disk with an index over `chunks`.
	pub fn write(&self, chunks: &[Chunk]) -> Result<usize> {
		let index_dir = &self.paths.index_dir;
		if index_dir.exists() { std::fs::remove_dir_all(index_dir)?; }
		std::fs::create_dir_all(index_dir)?;
		let schema = build_schema();
		let index = Index::create_in_dir(index_dir, schema.clone())?;
		register_tokenizer(&index);
		let position_field = schema.get_field(POSITION_FIELD)?;
		let text_field = schema.get_field(TEXT_FIELD)?;

		let mut index_writer: IndexWriter = index.writer(WRITER_HEAP_BYTES)?;
		for (i, c) in chunks.iter().enumerate() {
			index_writer.add_document(doc!(
				position_field => i as u64,
				text_field => c.text.clone(),
			))?;
		}
		index_writer.commit()?;

		let json = serde_json::to_string_pretty(chunks)?;
		std::fs::write(&self.paths.chunks_file, json)
			.with_context(|| format!("writing chunk list {}", self.paths.chunks_file.display()))?;
		info!(docs = chunks.len(), dir = %index_dir.display(), "lexical index written");
		Ok(chunks.len())
	}
}

/// Read side: BM25 over the persisted index, text from the chunk list.
pub struct LexicalIndex {
	reader: IndexReader,
	position_field: Field,
	text_field: Field,
	chunks: Vec<Chunk>,
}

impl LexicalIndex {
	pub fn open(paths: &LexicalPaths) -> Result<Self> {
		if !paths.index_dir.exists() {
			return Err(Error::NotFound(format!("lexical index {}", paths.index_dir.display())).into());
		}
		if !paths.chunks_file.exists() {
			return Err(Error::NotFound(format!("chunk list {}", paths.chunks_file.display())).into());
		}
		let index = Index::open_in_dir(&paths.index_dir)?;
		register_tokenizer(&index);
		let schema = index.schema();
		let position_field = schema.get_field(POSITION_FIELD)?;
		let text_field = schema.get_field(TEXT_FIELD)?;
		let reader: IndexReader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;

		let raw = std::fs::read_to_string(&paths.chunks_file)?;
		let chunks: Vec<Chunk> = serde_json::from_str(&raw)
			.with_context(|| format!("parsing chunk list {}", paths.chunks_file.display()))?;

		let this = Self { reader, position_field, text_field, chunks };
		let num_docs = this.reader.searcher().num_docs() as usize;
		if num_docs != this.chunks.len() {
			return Err(Error::Operation(format!(
				"lexical index has {} docs but chunk list has {} entries",
				num_docs,
				this.chunks.len()
			))
			.into());
		}
		Ok(this)
	}

	pub fn len(&self) -> usize { self.chunks.len() }

	pub fn is_empty(&self) -> bool { self.chunks.is_empty() }

	/// BM25 score for every chunk, in chunk order. Non-matching chunks score 0.
	pub fn scores(&self, question: &str) -> Result<Vec<f32>> {
		let mut scores = vec![0.0f32; self.chunks.len()];
		let terms = tokenize(question);
		if terms.is_empty() || self.chunks.is_empty() { return Ok(scores); }

		let clauses: Vec<(Occur, Box<dyn Query>)> = terms
			.iter()
			.map(|t| {
				let term = Term::from_field_text(self.text_field, t);
				let q: Box<dyn Query> = Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs));
				(Occur::Should, q)
			})
			.collect();
		let query = BooleanQuery::new(clauses);

		let searcher = self.reader.searcher();
		let top_docs = searcher.search(&query, &TopDocs::with_limit(self.chunks.len()))?;
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			let position = doc
				.get_first(self.position_field)
				.and_then(|v| v.as_u64())
				.ok_or_else(|| Error::Operation("lexical doc without position".into()))? as usize;
			if let Some(slot) = scores.get_mut(position) { *slot = score; }
		}
		Ok(scores)
	}
}

impl Retriever for LexicalIndex {
	fn retrieve(&self, question: &str, k: usize) -> Result<Vec<RetrievedDoc>> {
		if k == 0 { return Ok(vec![]); }
		let scores = self.scores(question)?;
		let picked = top_k(&scores, k);
		debug!(k, hits = picked.len(), "lexical retrieval");
		Ok(picked
			.into_iter()
			.map(|i| RetrievedDoc {
				text: self.chunks[i].text.clone(),
				source: SourceKind::Lexical,
				score: scores[i],
				position: i,
			})
			.collect())
	}
}
