//! Sentence embeddings for chunk and query text.
//!
//! [`BertEmbedder`] runs a local MiniLM/BERT checkpoint through candle with
//! masked mean pooling. [`FakeEmbedder`] hashes tokens into a fixed-size
//! vector and stands in for the model in tests and offline runs.

use anyhow::Result;
use candle_core::Device;
use candle_transformers::models::bert::BertModel;
use std::path::Path;
use std::time::Instant;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use ragline_core::config::{expand_path, EmbeddingConfig};
use ragline_core::traits::Embedder;

pub mod device;
pub mod model;
pub mod pool;
pub mod tokenize;

pub use device::select_device;
pub use model::{HeadConfig, ModelFiles};
pub use pool::masked_mean_l2;

pub const FAKE_EMBEDDINGS_ENV: &str = "RAGLINE_USE_FAKE_EMBEDDINGS";
const BATCH_SIZE: usize = 32;

pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
}

impl BertEmbedder {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        let files = ModelFiles::resolve(model_dir)?;
        info!(dir = %files.dir.display(), "loading embedding model");
        let tokenizer = files.tokenizer()?;
        let config = files.bert_config()?;
        let dim = files.head_config()?.hidden_size;
        let vb = files.var_builder(&device)?;
        let model = BertModel::load(vb, &config)?;
        Ok(Self { model, tokenizer, device, dim, max_len })
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch = tokenize::encode_texts(&self.tokenizer, texts, self.max_len, &self.device)?;
        let hidden = self.model.forward(&batch.input_ids, &batch.token_type_ids, Some(&batch.attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &batch.attention_mask)?;
        Ok(pooled.to_device(&Device::Cpu)?.to_vec2()?)
    }
}

impl Embedder for BertEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(BATCH_SIZE) {
            out.extend(self.embed_chunk(chunk)?);
        }
        debug!(n = texts.len(), ms = start.elapsed().as_millis() as u64, "embedded batch");
        Ok(out)
    }
}

/// Deterministic bag-of-words hashing embedder.
pub struct FakeEmbedder {
    dim: usize,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for token in text.split_whitespace() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            v[idx] += 0.5 + ((h >> 32) as u32) as f32 / u32::MAX as f32;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v { *x /= norm; }
        }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn max_len(&self) -> usize { usize::MAX }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

pub fn fake_requested_by_env() -> bool {
    std::env::var(FAKE_EMBEDDINGS_ENV)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Embedder chosen by configuration, with the env switch forcing the fake.
pub fn embedder_from_config(cfg: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    if cfg.fake || fake_requested_by_env() {
        warn!(dim = cfg.fake_dim, "using FakeEmbedder");
        return Ok(Box::new(FakeEmbedder::new(cfg.fake_dim)));
    }
    Ok(Box::new(BertEmbedder::load(&expand_path(&cfg.model_dir), cfg.max_len)?))
}
