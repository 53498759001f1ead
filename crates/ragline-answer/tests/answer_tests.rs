use std::cell::RefCell;
use std::time::Duration;

use proptest::prelude::*;
use serde_json::json;
use tokio::runtime::Runtime;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use ragline_answer::reader::best_span;
use ragline_answer::{answer, AnswerStrategy, OllamaGenerator, ReaderWithFallback};
use ragline_core::traits::AnswerModel;

struct FixedReader(Result<&'static str, &'static str>);

impl AnswerModel for FixedReader {
    fn extract(&self, _q: &str, _ctx: &str) -> anyhow::Result<String> {
        self.0.map(str::to_string).map_err(|e| anyhow::anyhow!(e))
    }
}

#[derive(Default)]
struct RecordingGenerator {
    prompts: RefCell<Vec<String>>,
}

impl AnswerModel for RecordingGenerator {
    fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        Ok("generated".to_string())
    }
}

#[test]
fn extractive_answer_wins_when_reader_succeeds() {
    let model = ReaderWithFallback::new(Some(FixedReader(Ok("one minute"))), RecordingGenerator::default());
    let (ans, strategy) = answer(&model, "How long?", "Boil for one minute.").unwrap();
    assert_eq!(ans, "one minute");
    assert_eq!(strategy, AnswerStrategy::Extractive);
}

#[test]
fn reader_failure_falls_back_to_prompted_generation() {
    let generator = RecordingGenerator::default();
    let model = ReaderWithFallback::new(Some(FixedReader(Err("no span"))), generator);
    let (ans, strategy) = answer(&model, "How long?", "Boil for one minute.").unwrap();
    assert_eq!(ans, "generated");
    assert_eq!(strategy, AnswerStrategy::Generative);
}

#[test]
fn missing_reader_goes_straight_to_generation() {
    let generator = RecordingGenerator::default();
    let model: ReaderWithFallback<FixedReader, _> = ReaderWithFallback::new(None, generator);
    let (_, strategy) = answer(&model, "Q?", "ctx").unwrap();
    assert_eq!(strategy, AnswerStrategy::Generative);
}

#[test]
fn generator_error_propagates_after_fallback() {
    struct Broken;
    impl AnswerModel for Broken {}
    let err = answer(&Broken, "Q?", "ctx").unwrap_err();
    assert!(err.to_string().contains("Unsupported"));
}

fn mock_ollama(rt: &Runtime, status: u16, body: serde_json::Value, expected: serde_json::Value) -> MockServer {
    rt.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(expected))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;
        server
    })
}

#[test]
fn ollama_generator_posts_non_streaming_request() {
    let rt = Runtime::new().unwrap();
    let server = mock_ollama(
        &rt,
        200,
        json!({"model": "llama3.2", "response": "  Boil it for a minute. ", "done": true}),
        json!({"model": "llama3.2", "prompt": "PROMPT TEXT", "stream": false}),
    );

    let generator = OllamaGenerator::new(&format!("{}/", server.uri()), "llama3.2", Duration::from_secs(5)).unwrap();
    let out = generator.generate("PROMPT TEXT").unwrap();
    assert_eq!(out, "Boil it for a minute.");
    rt.block_on(server.verify());
}

#[test]
fn ollama_generator_reports_http_errors() {
    let rt = Runtime::new().unwrap();
    let server = mock_ollama(&rt, 404, json!({"error": "model not found"}), json!({"model": "missing"}));

    let generator = OllamaGenerator::new(&server.uri(), "missing", Duration::from_secs(5)).unwrap();
    let err = generator.generate("hi").unwrap_err().to_string();
    assert!(err.contains("404"), "{}", err);
    assert!(err.contains("model not found"), "{}", err);
}

#[test]
fn ollama_generator_rejects_malformed_bodies() {
    let rt = Runtime::new().unwrap();
    let server = mock_ollama(&rt, 200, json!({"done": true}), json!({"stream": false}));

    let generator = OllamaGenerator::new(&server.uri(), "llama3.2", Duration::from_secs(5)).unwrap();
    let err = generator.generate("hi").unwrap_err().to_string();
    assert!(err.contains("parse"), "{}", err);
}

proptest! {
    #[test]
    fn best_span_is_ordered_short_and_allowed(
        logits in proptest::collection::vec((-10.0f32..10.0, -10.0f32..10.0, any::<bool>()), 0..40),
        max_tokens in 1usize..8,
    ) {
        let start: Vec<f32> = logits.iter().map(|l| l.0).collect();
        let end: Vec<f32> = logits.iter().map(|l| l.1).collect();
        let allowed: Vec<bool> = logits.iter().map(|l| l.2).collect();
        match best_span(&start, &end, &allowed, max_tokens) {
            Some((s, e, _)) => {
                prop_assert!(s <= e);
                prop_assert!(e - s < max_tokens);
                prop_assert!(allowed[s] && allowed[e]);
            }
            None => prop_assert!(!allowed.iter().any(|a| *a)),
        }
    }
}
