//! Command-line front-end for `legal-rag`.
//!
//! ```text
//! legal-rag ask hr3684.pdf "What is the maximum grant amount?"
//! legal-rag ask hr3684.pdf "Who administers the program?" --json -k 5
//! legal-rag chunks hr3684.pdf --max-chars 800
//! ```
//!
//! Settings come from an optional TOML file (`--config`), then flags. The
//! API key is read from `OPENAI_API_KEY` unless `--api-key` is given.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use legal_rag::openai::{OpenAIChatModel, OpenAIEmbeddingProvider};
use legal_rag::{AnswerResult, Chunk, Chunker, QaPipeline, RagConfig, SectionChunker, load_document};
use tracing::info;

/// Ask grounded questions about a legal document.
#[derive(Debug, Parser)]
#[command(name = "legal-rag", version, about)]
pub struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML file with pipeline settings.
    #[arg(long, global = true, env = "LEGAL_RAG_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Index a document and answer questions about it, one at a time.
    Ask(AskArgs),
    /// Show how a document is split into chunks, without calling any model.
    Chunks(ChunkArgs),
}

#[derive(Debug, Args)]
pub struct AskArgs {
    /// PDF (or plain text) document to index.
    pub document: PathBuf,

    /// Questions to answer, in order.
    #[arg(required = true)]
    pub questions: Vec<String>,

    /// Number of chunks retrieved per question.
    #[arg(short = 'k', long)]
    pub k: Option<usize>,

    /// Print results as JSON.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub provider: ProviderArgs,
}

#[derive(Debug, Args)]
pub struct ProviderArgs {
    /// API key for the OpenAI-compatible server.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Base URL of an OpenAI-compatible server.
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub base_url: Option<String>,

    /// Embedding model name.
    #[arg(long, default_value = "text-embedding-3-small")]
    pub embedding_model: String,

    /// Request embeddings truncated to this many dimensions.
    #[arg(long)]
    pub embedding_dimensions: Option<usize>,

    /// Chat model name.
    #[arg(long, default_value = "gpt-4o-mini")]
    pub chat_model: String,
}

#[derive(Debug, Args)]
pub struct ChunkArgs {
    /// PDF (or plain text) document to split.
    pub document: PathBuf,

    /// Maximum chunk length in characters.
    #[arg(long)]
    pub max_chars: Option<usize>,

    /// Overlap between adjacent chunks in characters.
    #[arg(long)]
    pub overlap_chars: Option<usize>,

    /// Print chunks as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Read settings from `path`, or use the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<RagConfig> {
    let Some(path) = path else {
        return Ok(RagConfig::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: RagConfig = toml::from_str(&content)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Plain-text rendering of one answer.
pub fn render_answer(result: &AnswerResult) -> String {
    let sources = if result.source_chunk_ids.is_empty() {
        "-".to_string()
    } else {
        result.source_chunk_ids.join(", ")
    };
    format!("Q: {}\nA: {}\nSources: {sources}\n", result.question, result.answer)
}

/// One-line summary of a chunk for `chunks`.
pub fn render_chunk(chunk: &Chunk) -> String {
    let pages = chunk.pages.iter().map(u32::to_string).collect::<Vec<_>>().join(",");
    format!(
        "{:>4}  {:<16} pages {:<8} {:<10} {} chars",
        chunk.ordinal,
        chunk.id,
        pages,
        chunk.section.as_deref().unwrap_or("-"),
        chunk.text.chars().count()
    )
}

/// Execute the parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Ask(args) => {
            if let Some(k) = args.k {
                config.retrieval_k = k;
            }
            if let Some(dims) = args.provider.embedding_dimensions {
                config.embedding_dimension = Some(dims);
            }
            config.validate()?;
            ask(config, args).await
        }
        Command::Chunks(args) => {
            if let Some(max) = args.max_chars {
                config.chunk_max_chars = max;
            }
            if let Some(overlap) = args.overlap_chars {
                config.chunk_overlap_chars = overlap;
            }
            config.validate()?;
            chunks(&config, &args)
        }
    }
}

fn build_pipeline(config: RagConfig, provider: &ProviderArgs) -> Result<QaPipeline> {
    let mut embedder = OpenAIEmbeddingProvider::new(provider.api_key.clone())?
        .with_model(provider.embedding_model.clone());
    let mut model =
        OpenAIChatModel::new(provider.api_key.clone())?.with_model(provider.chat_model.clone());
    if let Some(base_url) = &provider.base_url {
        embedder = embedder.with_base_url(base_url.clone());
        model = model.with_base_url(base_url.clone());
    }
    if let Some(dims) = provider.embedding_dimensions {
        embedder = embedder.with_dimensions(dims);
    }

    Ok(QaPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(embedder))
        .generative_model(Arc::new(model))
        .build()?)
}

async fn ask(config: RagConfig, args: AskArgs) -> Result<()> {
    let pipeline = build_pipeline(config, &args.provider)?;

    let document = load_document(&args.document)?;
    let chunks = pipeline.ingest(&document).await?;
    info!(path = %args.document.display(), chunk_count = chunks.len(), "document indexed");

    answer_questions(&pipeline, &args.questions, args.json, &mut std::io::stdout()).await
}

/// Answer `questions` in order and write the results to `out`, stopping at
/// the first failure.
///
/// Text output is written as each answer arrives. JSON output is one array
/// written at the end; on failure it holds the answers completed before the
/// failing question, and the error is returned after it is written.
pub async fn answer_questions<W: Write>(
    pipeline: &QaPipeline,
    questions: &[String],
    json: bool,
    out: &mut W,
) -> Result<()> {
    let mut results = Vec::with_capacity(questions.len());
    let mut failure = None;

    for question in questions {
        match pipeline.answer(question).await {
            Ok(result) => {
                if !json {
                    writeln!(out, "{}", render_answer(&result))?;
                }
                results.push(result);
            }
            Err(err) => {
                let context = format!("failed to answer {question:?}");
                failure = Some(anyhow::Error::new(err).context(context));
                break;
            }
        }
    }

    if json && (failure.is_none() || !results.is_empty()) {
        writeln!(out, "{}", serde_json::to_string_pretty(&results)?)?;
    }
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn chunks(config: &RagConfig, args: &ChunkArgs) -> Result<()> {
    let document = load_document(&args.document)?;
    let chunker = SectionChunker::new(config.chunk_max_chars, config.chunk_overlap_chars);
    let chunks = chunker.chunk(&document)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&chunks)?);
    } else {
        for chunk in &chunks {
            println!("{}", render_chunk(chunk));
        }
        println!("{} chunks from {} pages", chunks.len(), document.pages.len());
    }
    Ok(())
}
