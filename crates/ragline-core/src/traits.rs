use crate::error::Error;
use crate::types::RetrievedDoc;

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Anything that can return the top `k` passages for a question.
pub trait Retriever {
    fn retrieve(&self, question: &str, k: usize) -> anyhow::Result<Vec<RetrievedDoc>>;
}

/// Pairwise relevance model: one score per passage, higher is better.
pub trait Reranker {
    fn score(&self, question: &str, passages: &[&str]) -> anyhow::Result<Vec<f32>>;
}

/// The answer step. A model may support extractive QA, free-form
/// generation, or both; unsupported capabilities return `Error::Unsupported`.
pub trait AnswerModel {
    fn extract(&self, _question: &str, _context: &str) -> anyhow::Result<String> {
        Err(Error::Unsupported("extractive question answering").into())
    }

    fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
        Err(Error::Unsupported("prompt generation").into())
    }
}

impl<T: Retriever + ?Sized> Retriever for Box<T> {
    fn retrieve(&self, question: &str, k: usize) -> anyhow::Result<Vec<RetrievedDoc>> {
        (**self).retrieve(question, k)
    }
}

impl<T: Retriever + ?Sized> Retriever for &T {
    fn retrieve(&self, question: &str, k: usize) -> anyhow::Result<Vec<RetrievedDoc>> {
        (**self).retrieve(question, k)
    }
}

impl<T: Embedder + ?Sized> Embedder for Box<T> {
    fn dim(&self) -> usize { (**self).dim() }
    fn max_len(&self) -> usize { (**self).max_len() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> { (**self).embed_batch(texts) }
}
