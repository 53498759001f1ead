use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use ragline_answer::{answer, AnswerStrategy};
use ragline_core::error::Error;
use ragline_core::fusion::{join_context, select_by_scores};
use ragline_core::traits::{AnswerModel, Reranker, Retriever};
use ragline_core::types::{RetrievalMode, RetrievedDoc};

use crate::retrieve::RetrieverSet;

/// Floor on the candidate pool handed to a reranker.
pub const RERANK_POOL_MIN: usize = 10;

#[derive(Debug, Clone)]
pub struct RagRequest {
    pub mode: RetrievalMode,
    pub k: usize,
    pub question: String,
    pub rerank: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    pub strategy: AnswerStrategy,
    pub passages: Vec<RetrievedDoc>,
}

/// Candidate count to retrieve: widened to `max(10, 2k)` whenever a
/// reranker is supplied, whether or not this request reranks.
pub fn retriever_k(k: usize, has_reranker: bool) -> usize {
    if has_reranker { RERANK_POOL_MIN.max(k.saturating_mul(2)) } else { k }
}

/// Retrieve by mode, optionally rerank down to `k`, and return the passages
/// that would ground an answer. Without a rerank the widened pool is
/// returned untruncated.
pub fn retrieve_passages<D, L>(
    request: &RagRequest,
    retrievers: &RetrieverSet<D, L>,
    reranker: Option<&dyn Reranker>,
) -> Result<Vec<RetrievedDoc>>
where
    D: Retriever,
    L: Retriever,
{
    if request.rerank && reranker.is_none() {
        return Err(Error::RerankerMissing.into());
    }
    let pool = retriever_k(request.k, reranker.is_some());
    let docs = retrievers.retrieve(request.mode, &request.question, pool)?;
    debug!(mode = %request.mode, pool, hits = docs.len(), "retrieved candidates");

    let Some(reranker) = reranker.filter(|_| request.rerank) else { return Ok(docs) };
    let passages: Vec<&str> = docs.iter().map(|d| d.text.as_str()).collect();
    let scores = reranker.score(&request.question, &passages)?;
    if scores.len() != docs.len() {
        return Err(Error::Operation(format!("reranker returned {} scores for {} passages", scores.len(), docs.len())).into());
    }
    Ok(select_by_scores(docs, &scores, request.k))
}

pub fn run_rag_pipeline<D, L, A>(
    request: &RagRequest,
    retrievers: &RetrieverSet<D, L>,
    answer_model: &A,
    reranker: Option<&dyn Reranker>,
) -> Result<RagAnswer>
where
    D: Retriever,
    L: Retriever,
    A: AnswerModel + ?Sized,
{
    let passages = retrieve_passages(request, retrievers, reranker)?;
    let context = join_context(&passages);
    let (answer, strategy) = answer(answer_model, &request.question, &context)?;
    info!(strategy = ?strategy, passages = passages.len(), "answered");
    Ok(RagAnswer { answer, strategy, passages })
}
