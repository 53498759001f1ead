use std::cell::{Cell, RefCell};

use ragline_answer::AnswerStrategy;
use ragline_core::error::Error;
use ragline_core::traits::{AnswerModel, Reranker, Retriever};
use ragline_core::types::{RetrievalMode, RetrievedDoc, SourceKind};
use ragline_hybrid::{run_rag_pipeline, HybridRetriever, RagRequest, RetrieverSet};

/// Returns a fixed ranking, truncated to `k`, and remembers the `k` it saw.
struct StaticRetriever {
    texts: Vec<&'static str>,
    source: SourceKind,
    asked_k: Cell<usize>,
}

impl StaticRetriever {
    fn new(texts: &[&'static str], source: SourceKind) -> Self {
        Self { texts: texts.to_vec(), source, asked_k: Cell::new(0) }
    }
}

impl Retriever for StaticRetriever {
    fn retrieve(&self, _question: &str, k: usize) -> anyhow::Result<Vec<RetrievedDoc>> {
        self.asked_k.set(k);
        Ok(self
            .texts
            .iter()
            .take(k)
            .enumerate()
            .map(|(i, t)| RetrievedDoc { text: t.to_string(), source: self.source, score: 1.0 / (i + 1) as f32, position: i })
            .collect())
    }
}

/// Scores passages by length, longest first.
struct LengthReranker;

impl Reranker for LengthReranker {
    fn score(&self, _question: &str, passages: &[&str]) -> anyhow::Result<Vec<f32>> {
        Ok(passages.iter().map(|p| p.len() as f32).collect())
    }
}

#[derive(Default)]
struct ScriptedAnswer {
    extract_ok: bool,
    contexts: RefCell<Vec<String>>,
    prompts: RefCell<Vec<String>>,
}

impl AnswerModel for ScriptedAnswer {
    fn extract(&self, _question: &str, context: &str) -> anyhow::Result<String> {
        self.contexts.borrow_mut().push(context.to_string());
        if self.extract_ok { Ok("extracted".into()) } else { anyhow::bail!("reader blew up") }
    }

    fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        Ok("generated".into())
    }
}

fn request(mode: RetrievalMode, k: usize, rerank: bool) -> RagRequest {
    RagRequest { mode, k, question: "how do I purify water".into(), rerank }
}

#[test]
fn hybrid_keeps_dense_first_and_drops_duplicates() {
    let dense = StaticRetriever::new(&["Boil water.", "Use a filter."], SourceKind::Lexical);
    let lexical = StaticRetriever::new(&["  boil WATER.  ", "Add bleach."], SourceKind::Dense);
    let docs = HybridRetriever::new(&dense, &lexical).retrieve("q", 2).unwrap();
    let texts: Vec<&str> = docs.iter().map(|d| d.text.as_str()).collect();
    assert_eq!(texts, vec!["Boil water.", "Use a filter.", "Add bleach."]);
    assert_eq!(docs[0].source, SourceKind::Dense, "retag by producer");
    assert_eq!(docs[2].source, SourceKind::Lexical);
}

#[test]
fn hybrid_result_is_not_truncated_to_k() {
    let set = RetrieverSet::new(
        Some(StaticRetriever::new(&["a", "b", "c"], SourceKind::Dense)),
        Some(StaticRetriever::new(&["d", "e", "f"], SourceKind::Lexical)),
    );
    let docs = set.retrieve(RetrievalMode::Hybrid, "q", 3).unwrap();
    assert_eq!(docs.len(), 6);
}

#[test]
fn extractive_answer_uses_joined_context() {
    let set = RetrieverSet::new(None::<StaticRetriever>, Some(StaticRetriever::new(&["one", "two", "three"], SourceKind::Lexical)));
    let model = ScriptedAnswer { extract_ok: true, ..Default::default() };
    let out = run_rag_pipeline(&request(RetrievalMode::Lexical, 2, false), &set, &model, None).unwrap();
    assert_eq!(out.answer, "extracted");
    assert_eq!(out.strategy, AnswerStrategy::Extractive);
    assert_eq!(model.contexts.borrow()[0], "one\n\ntwo");
    assert!(model.prompts.borrow().is_empty());
    assert_eq!(set.lexical.as_ref().unwrap().asked_k.get(), 2);
}

#[test]
fn failing_reader_falls_back_to_prompt() {
    let set = RetrieverSet::new(Some(StaticRetriever::new(&["Boil for one minute."], SourceKind::Dense)), None::<StaticRetriever>);
    let model = ScriptedAnswer::default();
    let out = run_rag_pipeline(&request(RetrievalMode::Exact, 4, false), &set, &model, None).unwrap();
    assert_eq!(out.strategy, AnswerStrategy::Generative);
    assert_eq!(out.answer, "generated");
    let prompt = &model.prompts.borrow()[0];
    assert!(prompt.contains("Boil for one minute."));
    assert!(prompt.contains("how do I purify water"));
}

#[test]
fn rerank_widens_pool_then_keeps_k_best() {
    let texts = ["aa", "a", "aaaa", "aaa", "b", "c", "d", "e", "f", "g", "h", "i"];
    let set = RetrieverSet::new(None::<StaticRetriever>, Some(StaticRetriever::new(&texts, SourceKind::Lexical)));
    let model = ScriptedAnswer { extract_ok: true, ..Default::default() };
    let out = run_rag_pipeline(&request(RetrievalMode::Lexical, 2, true), &set, &model, Some(&LengthReranker)).unwrap();

    assert_eq!(set.lexical.as_ref().unwrap().asked_k.get(), 10);
    let kept: Vec<&str> = out.passages.iter().map(|d| d.text.as_str()).collect();
    assert_eq!(kept, vec!["aaaa", "aaa"]);
    assert_eq!(out.passages[0].score, 4.0);
}

#[test]
fn rerank_without_reranker_is_an_error() {
    let set = RetrieverSet::new(None::<StaticRetriever>, Some(StaticRetriever::new(&["x"], SourceKind::Lexical)));
    let model = ScriptedAnswer { extract_ok: true, ..Default::default() };
    let err = run_rag_pipeline(&request(RetrievalMode::Lexical, 2, true), &set, &model, None).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::RerankerMissing)));
}

#[test]
fn supplied_reranker_widens_pool_even_when_not_requested() {
    let set = RetrieverSet::new(None::<StaticRetriever>, Some(StaticRetriever::new(&["x", "yyy", "zz"], SourceKind::Lexical)));
    let model = ScriptedAnswer { extract_ok: true, ..Default::default() };
    let out = run_rag_pipeline(&request(RetrievalMode::Lexical, 2, false), &set, &model, Some(&LengthReranker)).unwrap();
    assert_eq!(set.lexical.as_ref().unwrap().asked_k.get(), 10);
    let kept: Vec<&str> = out.passages.iter().map(|d| d.text.as_str()).collect();
    assert_eq!(kept, vec!["x", "yyy", "zz"], "retrieval order, not rerank order, and not cut to k");
    assert_eq!(model.contexts.borrow()[0], "x\n\nyyy\n\nzz");
}

#[test]
fn no_reranker_keeps_the_requested_k() {
    let set = RetrieverSet::new(None::<StaticRetriever>, Some(StaticRetriever::new(&["x", "y", "z"], SourceKind::Lexical)));
    let model = ScriptedAnswer { extract_ok: true, ..Default::default() };
    let out = run_rag_pipeline(&request(RetrievalMode::Lexical, 2, false), &set, &model, None).unwrap();
    assert_eq!(set.lexical.as_ref().unwrap().asked_k.get(), 2);
    assert_eq!(out.passages.len(), 2);
}

#[test]
fn mode_needing_an_unopened_index_is_not_found() {
    let set = RetrieverSet::new(None::<StaticRetriever>, Some(StaticRetriever::new(&["x"], SourceKind::Lexical)));
    let err = set.retrieve(RetrievalMode::Hybrid, "q", 1).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NotFound(_))));
}
