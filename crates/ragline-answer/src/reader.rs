use anyhow::Result;
use candle_core::{Device, IndexOp, Tensor};
use candle_nn::{Linear, Module};
use candle_transformers::models::bert::BertModel;
use std::path::Path;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use ragline_core::error::Error;
use ragline_core::traits::AnswerModel;
use ragline_embed::tokenize::{encode_pair, Row};
use ragline_embed::{select_device, ModelFiles};

use crate::rerank::encoder_root;

pub const MAX_ANSWER_TOKENS: usize = 30;

/// Best `(start, end, score)` with `start <= end`, both inside `allowed`,
/// and at most `max_tokens` tokens long. Score is `start + end` logit.
pub fn best_span(start_logits: &[f32], end_logits: &[f32], allowed: &[bool], max_tokens: usize) -> Option<(usize, usize, f32)> {
    let n = start_logits.len().min(end_logits.len()).min(allowed.len());
    let mut best: Option<(usize, usize, f32)> = None;
    for s in (0..n).filter(|&i| allowed[i]) {
        for e in (s..n.min(s + max_tokens)).filter(|&i| allowed[i]) {
            let score = start_logits[s] + end_logits[e];
            if best.map_or(true, |(_, _, b)| score > b) {
                best = Some((s, e, score));
            }
        }
    }
    best
}

/// Extractive QA over a BERT encoder with a span head (`qa_outputs`).
pub struct ExtractiveReader {
    model: BertModel,
    qa_outputs: Linear,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
}

impl ExtractiveReader {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        let files = ModelFiles::resolve(model_dir)?;
        info!(dir = %files.dir.display(), "loading extractive reader");
        let tokenizer = files.tokenizer()?;
        let config = files.bert_config()?;
        let head = files.head_config()?;
        let vb = files.var_builder(&device)?;
        let model = BertModel::load(encoder_root(&vb), &config)?;
        let qa_outputs = candle_nn::linear(head.hidden_size, 2, vb.pp("qa_outputs"))?;
        Ok(Self { model, qa_outputs, tokenizer, device, max_len })
    }

    fn span_logits(&self, row: &Row) -> Result<(Vec<f32>, Vec<f32>)> {
        let t = row.len();
        let ids = Tensor::from_slice(row.ids.as_slice(), (1, t), &self.device)?;
        let type_ids = Tensor::from_slice(row.type_ids.as_slice(), (1, t), &self.device)?;
        let mask = Tensor::from_slice(row.mask.as_slice(), (1, t), &self.device)?;
        let hidden = self.model.forward(&ids, &type_ids, Some(&mask))?;
        let logits = self.qa_outputs.forward(&hidden)?.to_device(&Device::Cpu)?;
        let start = logits.i((0, .., 0))?.to_vec1::<f32>()?;
        let end = logits.i((0, .., 1))?.to_vec1::<f32>()?;
        Ok((start, end))
    }
}

impl AnswerModel for ExtractiveReader {
    fn extract(&self, question: &str, context: &str) -> Result<String> {
        if context.trim().is_empty() {
            return Err(Error::Operation("no context to extract an answer from".into()).into());
        }
        let enc = encode_pair(&self.tokenizer, question, context)?;
        let row = Row::from_encoding(&enc, self.max_len);
        let (start, end) = self.span_logits(&row)?;

        // Only context tokens that survived truncation can bound an answer.
        let seq_ids = enc.get_sequence_ids();
        let mut allowed: Vec<bool> = seq_ids.iter().take(row.len()).map(|s| *s == Some(1)).collect();
        if row.len() < seq_ids.len() {
            if let Some(last) = allowed.last_mut() { *last = false; }
        }
        let (s, e, score) = best_span(&start, &end, &allowed, MAX_ANSWER_TOKENS)
            .ok_or_else(|| Error::Operation("no valid answer span in context".into()))?;

        let offsets = enc.get_offsets();
        let (begin, finish) = (offsets[s].0, offsets[e].1);
        let answer = context
            .get(begin..finish)
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| Error::Operation(format!("answer span {}..{} not in context", begin, finish)))?;
        debug!(start = s, end = e, score, "extracted span");
        Ok(answer.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_span_respects_order_mask_and_length() {
        let start = [9.0, 0.1, 2.0, 0.0, 0.0];
        let end = [9.0, 0.0, 0.5, 3.0, 0.2];
        let allowed = [false, true, true, true, true];
        assert_eq!(best_span(&start, &end, &allowed, 30).map(|(s, e, _)| (s, e)), Some((2, 3)));
        assert_eq!(best_span(&start, &end, &allowed, 1).map(|(s, e, _)| (s, e)), Some((3, 3)));
    }

    #[test]
    fn best_span_none_without_allowed_tokens() {
        assert!(best_span(&[1.0, 2.0], &[1.0, 2.0], &[false, false], 30).is_none());
        assert!(best_span(&[], &[], &[], 30).is_none());
    }
}
