use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use text_splitter::{ChunkConfig, TextSplitter};
use tracing::{debug, info};

use crate::error::Error;
use crate::types::Chunk;

/// Source label for text ingested from a string rather than a file.
pub const INLINE_SOURCE: &str = "<inline>";

/// Fixed-size splitting parameters, both measured in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 500, chunk_overlap: 50 }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be greater than zero".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Splits text into overlapping chunks.
///
/// Splitting is recursive over semantic levels (paragraphs, lines, words,
/// characters): the coarsest level whose pieces fit `chunk_size` wins and
/// neighbours are merged back up to the limit.
pub struct Chunker {
    splitter: TextSplitter<text_splitter::Characters>,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        let chunk_config = ChunkConfig::new(config.chunk_size)
            .with_overlap(config.chunk_overlap)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?
            .with_trim(true);
        Ok(Self { splitter: TextSplitter::new(chunk_config) })
    }

    /// Chunk a single string. Positions start at zero.
    pub fn chunk_text(&self, text: &str, source: &str) -> Vec<Chunk> {
        self.splitter
            .chunks(text)
            .filter(|c| !c.trim().is_empty())
            .enumerate()
            .map(|(position, c)| Chunk { position, source: source.to_string(), text: c.to_string() })
            .collect()
    }

    /// Chunk every `.txt` file under `data_dir`, in sorted path order.
    ///
    /// Files are chunked independently; positions run across the whole set.
    pub fn chunk_directory(&self, data_dir: &Path) -> Result<Vec<Chunk>> {
        if !data_dir.is_dir() {
            return Err(Error::NotFound(format!("data directory {}", data_dir.display())).into());
        }
        let files = list_txt_files(data_dir);
        if files.is_empty() {
            info!(dir = %data_dir.display(), "no .txt files found");
            return Ok(vec![]);
        }
        let mut all_chunks = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            let content = read_file_content(file_path)?;
            let chunks = self.chunk_text(&content, &file_path.to_string_lossy());
            debug!(file = %file_path.display(), n = chunks.len(), "chunked file {}/{}", file_index + 1, files.len());
            all_chunks.extend(chunks);
        }
        renumber(&mut all_chunks);
        info!(files = files.len(), chunks = all_chunks.len(), "chunked directory");
        Ok(all_chunks)
    }
}

/// Reassign positions so they match list order.
pub fn renumber(chunks: &mut [Chunk]) {
    for (i, c) in chunks.iter_mut().enumerate() {
        c.position = i;
    }
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
    }
}

fn list_txt_files(root: &Path) -> Vec<PathBuf> {
    let mut txt_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("txt"))
        .map(|e| e.path().to_path_buf())
        .collect();
    txt_files.sort();
    txt_files
}
