use anyhow::Result;
use candle_core::{Device, IndexOp};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::BertModel;
use std::collections::HashSet;
use std::path::Path;
use tokenizers::Tokenizer;
use tracing::info;

use ragline_core::traits::Reranker;
use ragline_embed::{select_device, tokenize, ModelFiles};

const BATCH_SIZE: usize = 16;

/// Weights from `*ForSequenceClassification` checkpoints sit under `bert.`;
/// bare encoder exports do not.
pub(crate) fn encoder_root<'a>(vb: &VarBuilder<'a>) -> VarBuilder<'a> {
    if vb.contains_tensor("bert.embeddings.word_embeddings.weight") { vb.pp("bert") } else { vb.clone() }
}

/// BERT cross-encoder: `[CLS] question [SEP] passage [SEP]` through the
/// encoder, pooler and classifier. Logit 0 is the relevance score.
pub struct CrossEncoderReranker {
    model: BertModel,
    pooler: Linear,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
}

impl CrossEncoderReranker {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        let files = ModelFiles::resolve(model_dir)?;
        info!(dir = %files.dir.display(), "loading cross-encoder");
        let tokenizer = files.tokenizer()?;
        let config = files.bert_config()?;
        let head = files.head_config()?;
        let vb = files.var_builder(&device)?;
        let root = encoder_root(&vb);
        let model = BertModel::load(root.clone(), &config)?;
        let pooler = candle_nn::linear(head.hidden_size, head.hidden_size, root.pp("pooler").pp("dense"))?;
        let classifier = candle_nn::linear(head.hidden_size, head.num_labels(), vb.pp("classifier"))?;
        Ok(Self { model, pooler, classifier, tokenizer, device, max_len })
    }

    fn score_batch(&self, question: &str, passages: &[&str]) -> Result<Vec<f32>> {
        let batch = tokenize::encode_pairs(&self.tokenizer, question, passages, self.max_len, &self.device)?;
        let hidden = self.model.forward(&batch.input_ids, &batch.token_type_ids, Some(&batch.attention_mask))?;
        let cls = hidden.i((.., 0))?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        let logits = self.classifier.forward(&pooled)?;
        Ok(logits.i((.., 0))?.to_device(&Device::Cpu)?.to_vec1::<f32>()?)
    }
}

impl Reranker for CrossEncoderReranker {
    fn score(&self, question: &str, passages: &[&str]) -> Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(passages.len());
        for chunk in passages.chunks(BATCH_SIZE) {
            scores.extend(self.score_batch(question, chunk)?);
        }
        Ok(scores)
    }
}

/// Model-free relevance: share of distinct question words found in the passage.
#[derive(Debug, Default, Clone, Copy)]
pub struct TermOverlapReranker;

impl TermOverlapReranker {
    fn terms(text: &str) -> HashSet<String> {
        text.split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| !w.is_empty())
            .collect()
    }
}

impl Reranker for TermOverlapReranker {
    fn score(&self, question: &str, passages: &[&str]) -> Result<Vec<f32>> {
        let query = Self::terms(question);
        if query.is_empty() { return Ok(vec![0.0; passages.len()]); }
        Ok(passages
            .iter()
            .map(|p| {
                let words = Self::terms(p);
                query.iter().filter(|t| words.contains(*t)).count() as f32 / query.len() as f32
            })
            .collect())
    }
}
