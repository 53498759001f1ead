use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ragline_answer::{answer_model_from_config, reranker_from_config};
use ragline_core::chunker::{renumber, Chunker, INLINE_SOURCE};
use ragline_core::config::Settings;
use ragline_core::error::Error;
use ragline_core::traits::Embedder;
use ragline_core::types::{Chunk, RetrievalMode, RetrievedDoc};
use ragline_embed::embedder_from_config;
use ragline_hybrid::{ingest, retrieve_passages, run_rag_pipeline, ArtifactPaths, DiskRetrievers, RagRequest};

#[derive(Parser)]
#[command(name = "ragline", version, about = "Hybrid retrieval and grounded answers over local text")]
struct Cli {
    /// Extra TOML file merged over ragline.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Artifact directory (overrides data.artifact_dir)
    #[arg(long, global = true)]
    artifacts: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk input text and rebuild the indexes for a mode
    Ingest(IngestArgs),
    /// Retrieve passages and answer a question
    Ask(AskArgs),
    /// Print the retrieved passages only
    Search(SearchArgs),
}

#[derive(Args)]
struct IngestArgs {
    /// Inline text to ingest
    text: Option<String>,
    #[arg(long, conflicts_with_all = ["dir", "text"])]
    file: Option<PathBuf>,
    #[arg(long, conflicts_with = "text")]
    dir: Option<PathBuf>,
    #[arg(long)]
    mode: Option<RetrievalMode>,
    #[arg(long)]
    chunk_size: Option<usize>,
    #[arg(long)]
    chunk_overlap: Option<usize>,
}

#[derive(Args)]
struct AskArgs {
    question: String,
    #[arg(long)]
    mode: Option<RetrievalMode>,
    #[arg(short)]
    k: Option<usize>,
    #[arg(long)]
    rerank: bool,
}

#[derive(Args)]
struct SearchArgs {
    question: String,
    #[arg(long)]
    mode: Option<RetrievalMode>,
    #[arg(short)]
    k: Option<usize>,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => {
            let env_name = std::env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
            Settings::load_from(Path::new("."), &env_name, Some(path))?
        }
        None => Settings::load()?,
    };
    if let Some(dir) = &cli.artifacts {
        settings.data.artifact_dir = dir.to_string_lossy().into_owned();
    }
    Ok(settings)
}

fn dense_embedder(settings: &Settings, mode: RetrievalMode) -> Result<Option<Box<dyn Embedder>>> {
    if mode.uses_dense() { Ok(Some(embedder_from_config(&settings.embedding)?)) } else { Ok(None) }
}

fn read_input(chunker: &Chunker, args: &IngestArgs) -> Result<Vec<Chunk>> {
    let mut chunks = match (&args.file, &args.dir, &args.text) {
        (Some(file), _, _) => {
            let text = std::fs::read_to_string(file)
                .map_err(|e| Error::NotFound(format!("{}: {}", file.display(), e)))?;
            chunker.chunk_text(&text, &file.display().to_string())
        }
        (None, Some(dir), _) => chunker.chunk_directory(dir)?,
        (None, None, Some(text)) => chunker.chunk_text(text, INLINE_SOURCE),
        (None, None, None) => {
            return Err(Error::InvalidConfig("give TEXT, --file or --dir to ingest".into()).into());
        }
    };
    renumber(&mut chunks);
    Ok(chunks)
}

fn print_passages(passages: &[RetrievedDoc]) {
    for (i, p) in passages.iter().enumerate() {
        println!("[{}] ({} {:.3}) {}", i + 1, p.source, p.score, p.text);
    }
}

fn run_ingest(mut settings: Settings, args: &IngestArgs) -> Result<()> {
    let mode = args.mode.unwrap_or(settings.retrieval.mode);
    if let Some(size) = args.chunk_size { settings.chunking.chunk_size = size; }
    if let Some(overlap) = args.chunk_overlap { settings.chunking.chunk_overlap = overlap; }
    settings.validate()?;

    let chunker = Chunker::new(settings.chunking.clone())?;
    let chunks = read_input(&chunker, args)?;
    let paths = ArtifactPaths::under(&settings.artifact_dir());
    let embedder = dense_embedder(&settings, mode)?;
    let report = ingest(&chunks, mode, &paths, embedder.as_deref(), true)?;

    println!("Ingested {} chunks into {} ({})", report.chunks, paths.root.display(), mode);
    if let Some(rows) = report.dense_rows { println!("  vectorstore: {} rows", rows); }
    if let Some(docs) = report.lexical_docs { println!("  bm25: {} docs", docs); }
    Ok(())
}

fn open_retrievers(settings: &Settings, mode: RetrievalMode) -> Result<DiskRetrievers<Box<dyn Embedder>>> {
    let paths = ArtifactPaths::under(&settings.artifact_dir());
    DiskRetrievers::open(&paths, mode, dense_embedder(settings, mode)?)
}

fn run_ask(settings: Settings, args: &AskArgs, show_passages: bool) -> Result<()> {
    let request = RagRequest {
        mode: args.mode.unwrap_or(settings.retrieval.mode),
        k: args.k.unwrap_or(settings.retrieval.k),
        question: args.question.clone(),
        rerank: args.rerank || settings.rerank.enabled,
    };
    let retrievers = open_retrievers(&settings, request.mode)?;
    let reranker = if request.rerank { Some(reranker_from_config(&settings.rerank)?) } else { None };
    let answer_model = answer_model_from_config(&settings.answer)?;

    let out = run_rag_pipeline(&request, &retrievers, &answer_model, reranker.as_deref())?;
    info!(strategy = ?out.strategy, "answer ready");
    println!("{}", out.answer);
    if show_passages {
        print_passages(&out.passages);
    }
    Ok(())
}

fn run_search(settings: Settings, args: &SearchArgs) -> Result<()> {
    let request = RagRequest {
        mode: args.mode.unwrap_or(settings.retrieval.mode),
        k: args.k.unwrap_or(settings.retrieval.k),
        question: args.question.clone(),
        rerank: false,
    };
    let retrievers = open_retrievers(&settings, request.mode)?;
    let passages = retrieve_passages(&request, &retrievers, None)?;
    if passages.is_empty() { println!("No passages found."); }
    print_passages(&passages);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let settings = load_settings(&cli)?;
    match &cli.command {
        Command::Ingest(args) => run_ingest(settings, args),
        Command::Ask(args) => run_ask(settings, args, cli.verbose),
        Command::Search(args) => run_search(settings, args),
    }
}
