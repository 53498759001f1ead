//! Reranking and the answer step.
//!
//! The answer step tries extractive QA first. Any failure there falls back to
//! a generative call with the grounded prompt from [`prompt::build_prompt`].

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use ragline_core::config::{expand_path, AnswerConfig, RerankConfig, RerankKind};
use ragline_core::traits::{AnswerModel, Reranker};

pub mod generator;
pub mod prompt;
pub mod reader;
pub mod rerank;

pub use generator::OllamaGenerator;
pub use prompt::build_prompt;
pub use reader::ExtractiveReader;
pub use rerank::{CrossEncoderReranker, TermOverlapReranker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerStrategy {
    Extractive,
    Generative,
}

/// Extractive reader paired with a generative model. Without a reader,
/// `extract` reports `Unsupported` and the caller falls through to `generate`.
pub struct ReaderWithFallback<R, G> {
    reader: Option<R>,
    generator: G,
}

impl<R: AnswerModel, G: AnswerModel> ReaderWithFallback<R, G> {
    pub fn new(reader: Option<R>, generator: G) -> Self { Self { reader, generator } }
}

impl<R: AnswerModel, G: AnswerModel> AnswerModel for ReaderWithFallback<R, G> {
    fn extract(&self, question: &str, context: &str) -> Result<String> {
        match &self.reader {
            Some(r) => r.extract(question, context),
            None => Err(ragline_core::error::Error::Unsupported("extractive question answering").into()),
        }
    }

    fn generate(&self, prompt: &str) -> Result<String> {
        self.generator.generate(prompt)
    }
}

/// Extract, and on any error generate from the prompt instead. No retry.
pub fn answer<A: AnswerModel + ?Sized>(model: &A, question: &str, context: &str) -> Result<(String, AnswerStrategy)> {
    match model.extract(question, context) {
        Ok(ans) => Ok((ans, AnswerStrategy::Extractive)),
        Err(e) => {
            warn!(error = %e, "extractive answer failed, falling back to generation");
            let prompt = build_prompt(context, question);
            Ok((model.generate(&prompt)?, AnswerStrategy::Generative))
        }
    }
}

pub fn answer_model_from_config(cfg: &AnswerConfig) -> Result<ReaderWithFallback<ExtractiveReader, OllamaGenerator>> {
    let reader = match &cfg.reader_model_dir {
        Some(dir) => Some(ExtractiveReader::load(&expand_path(dir), cfg.max_len)?),
        None => None,
    };
    let generator = OllamaGenerator::new(&cfg.ollama_url, &cfg.ollama_model, Duration::from_secs(cfg.timeout_secs))?;
    info!(reader = reader.is_some(), model = %cfg.ollama_model, "answer model ready");
    Ok(ReaderWithFallback::new(reader, generator))
}

pub fn reranker_from_config(cfg: &RerankConfig) -> Result<Box<dyn Reranker>> {
    Ok(match cfg.kind {
        RerankKind::CrossEncoder => Box::new(CrossEncoderReranker::load(&expand_path(&cfg.model_dir), cfg.max_len)?),
        RerankKind::TermOverlap => Box::new(TermOverlapReranker),
    })
}
