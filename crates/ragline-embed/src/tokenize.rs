use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::{EncodeInput, Encoding, Tokenizer};

/// Token ids, attention mask and segment ids for one sequence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub ids: Vec<u32>,
    pub mask: Vec<u32>,
    pub type_ids: Vec<u32>,
}

impl Row {
    /// Copy out of an encoding, capped at `max_len` tokens. The final token
    /// (the closing separator) survives truncation.
    pub fn from_encoding(enc: &Encoding, max_len: usize) -> Self {
        Self {
            ids: keep_last(enc.get_ids(), max_len),
            mask: keep_last(enc.get_attention_mask(), max_len),
            type_ids: keep_last(enc.get_type_ids(), max_len),
        }
    }

    pub fn len(&self) -> usize { self.ids.len() }

    pub fn is_empty(&self) -> bool { self.ids.is_empty() }
}

pub fn keep_last(values: &[u32], max_len: usize) -> Vec<u32> {
    if max_len == 0 { return Vec::new(); }
    if values.len() <= max_len { return values.to_vec(); }
    let mut out = values[..max_len - 1].to_vec();
    if let Some(last) = values.last() { out.push(*last); }
    out
}

/// Batched model inputs, padded to the longest row.
pub struct Batch {
    pub input_ids: Tensor,
    pub attention_mask: Tensor,
    pub token_type_ids: Tensor,
}

pub fn pad_id(tokenizer: &Tokenizer) -> u32 {
    tokenizer.get_padding().map(|p| p.pad_id).unwrap_or(0)
}

pub fn to_batch(rows: &[Row], pad_id: u32, device: &Device) -> Result<Batch> {
    let width = rows.iter().map(Row::len).max().unwrap_or(0);
    let n = rows.len();
    let mut ids = Vec::with_capacity(n * width);
    let mut mask = Vec::with_capacity(n * width);
    let mut type_ids = Vec::with_capacity(n * width);
    for row in rows {
        let pad = width - row.len();
        ids.extend_from_slice(&row.ids);
        ids.extend(std::iter::repeat(pad_id).take(pad));
        mask.extend_from_slice(&row.mask);
        mask.extend(std::iter::repeat(0).take(pad));
        type_ids.extend_from_slice(&row.type_ids);
        type_ids.extend(std::iter::repeat(0).take(pad));
    }
    Ok(Batch {
        input_ids: Tensor::from_vec(ids, (n, width), device)?,
        attention_mask: Tensor::from_vec(mask, (n, width), device)?,
        token_type_ids: Tensor::from_vec(type_ids, (n, width), device)?,
    })
}

pub fn encode_texts(tokenizer: &Tokenizer, texts: &[String], max_len: usize, device: &Device) -> Result<Batch> {
    let mut rows = Vec::with_capacity(texts.len());
    for text in texts {
        let enc = tokenizer
            .encode(text.as_str(), true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        rows.push(Row::from_encoding(&enc, max_len));
    }
    to_batch(&rows, pad_id(tokenizer), device)
}

/// Encode `(question, passage)` pairs for cross-encoders.
pub fn encode_pairs(tokenizer: &Tokenizer, question: &str, passages: &[&str], max_len: usize, device: &Device) -> Result<Batch> {
    let mut rows = Vec::with_capacity(passages.len());
    for passage in passages {
        let enc = encode_pair(tokenizer, question, passage)?;
        rows.push(Row::from_encoding(&enc, max_len));
    }
    to_batch(&rows, pad_id(tokenizer), device)
}

pub fn encode_pair(tokenizer: &Tokenizer, first: &str, second: &str) -> Result<Encoding> {
    let input: EncodeInput = (first, second).into();
    tokenizer.encode(input, true).map_err(|e| anyhow!("Tokenization failed: {}", e))
}
