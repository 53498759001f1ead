//! Loading a local BERT-family checkpoint: `config.json`, `tokenizer.json`
//! and either `model.safetensors` or `pytorch_model.bin`.

use anyhow::{anyhow, Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::Config as BertConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;
use tracing::info;

use ragline_core::error::Error;

#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub dir: PathBuf,
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelFiles {
    pub fn resolve(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::NotFound(format!("model directory {}", dir.display())).into());
        }
        let config = dir.join("config.json");
        let tokenizer = dir.join("tokenizer.json");
        for p in [&config, &tokenizer] {
            if !p.exists() {
                return Err(Error::NotFound(format!("{}", p.display())).into());
            }
        }
        let weights = ["model.safetensors", "pytorch_model.bin"]
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.exists())
            .ok_or_else(|| Error::NotFound(format!("weights (model.safetensors or pytorch_model.bin) in {}", dir.display())))?;
        Ok(Self { dir: dir.to_path_buf(), config, tokenizer, weights })
    }

    pub fn bert_config(&self) -> Result<BertConfig> {
        let raw = std::fs::read_to_string(&self.config)?;
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", self.config.display()))
    }

    /// Head-related fields that the candle config keeps private.
    pub fn head_config(&self) -> Result<HeadConfig> {
        let raw = std::fs::read_to_string(&self.config)?;
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", self.config.display()))
    }

    pub fn tokenizer(&self) -> Result<Tokenizer> {
        Tokenizer::from_file(&self.tokenizer)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", self.tokenizer.display(), e))
    }

    pub fn var_builder(&self, device: &Device) -> Result<VarBuilder<'static>> {
        info!(weights = %self.weights.display(), "loading weights");
        let is_safetensors = self.weights.extension().is_some_and(|e| e == "safetensors");
        if is_safetensors {
            // SAFETY: the file is not modified while mapped.
            let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[self.weights.clone()], DType::F32, device)? };
            Ok(vb)
        } else {
            let weights = candle_core::pickle::read_all(&self.weights)?;
            let weights_map: HashMap<String, Tensor> = weights.into_iter().collect();
            Ok(VarBuilder::from_tensors(weights_map, DType::F32, device))
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeadConfig {
    pub hidden_size: usize,
    #[serde(default)]
    pub id2label: Option<HashMap<String, String>>,
}

impl HeadConfig {
    pub fn num_labels(&self) -> usize {
        self.id2label.as_ref().map(|m| m.len()).filter(|n| *n > 0).unwrap_or(1)
    }
}
