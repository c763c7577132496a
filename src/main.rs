//! # Sage CLI (`sage`)
//!
//! ## Usage
//!
//! ```bash
//! sage --config ./config/sage.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sage run` | Load (or build) the index, then start the conversation (default) |
//! | `sage index [--rebuild]` | Load or build the index and print a summary |
//! | `sage ask "<question>"` | Answer one question from the corpus |
//! | `sage resources` | Print crisis resources |
//! | `sage strategies "<label>"` | Print coping strategies for a feeling |
//!
//! Logs go to stderr; set `RUST_LOG` to change verbosity (default `sage=info`).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sage::config::{self, Config};
use sage::embedding::{self, EmbeddingProvider};
use sage::index::{self, VectorIndex};
use sage::llm;
use sage::responder::Responder;
use sage::retrieval::RetrievalService;
use sage::session::{Session, Shutdown};
use sage::speech::{self, ConsoleInput};
use sage::{coping, crisis};

/// Sage — a voice-driven mental-health support companion.
///
/// Commands that touch the index or a language model read a TOML
/// configuration file. See `config/sage.example.toml` for every option.
#[derive(Parser)]
#[command(
    name = "sage",
    about = "Sage — a voice-driven mental-health support companion",
    version,
    long_about = "Sage listens, checks every message for crisis language, and replies with \
    short empathetic responses grounded in a locally indexed document corpus. \
    It is not a substitute for professional care."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/sage.toml`.
    #[arg(long, global = true, default_value = "./config/sage.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a conversation.
    ///
    /// Ensures the index exists (building it from the corpus on first run),
    /// greets, then listens until Ctrl-C or end of input.
    Run,

    /// Load or build the document index and print a summary.
    Index {
        /// Delete the persisted index and build it again from the corpus.
        #[arg(long)]
        rebuild: bool,
    },

    /// Answer a single question from the indexed corpus.
    Ask {
        /// The question to answer.
        question: String,
    },

    /// Print crisis support resources. Needs no configuration.
    Resources,

    /// Print coping strategies for a feeling. Needs no configuration.
    Strategies {
        /// A feeling or situation, e.g. "anxiety" or "I feel stressed".
        label: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sage=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Run);

    // Commands that don't require config
    match &command {
        Commands::Resources => {
            println!("{}", crisis::resources());
            return Ok(());
        }
        Commands::Strategies { label } => {
            println!("{}", coping::strategies_for(label));
            return Ok(());
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;
    let embedder: Arc<dyn EmbeddingProvider> =
        embedding::create_provider(&cfg.embedding).context("Failed to create embedding provider")?;

    match command {
        Commands::Index { rebuild } => {
            let index = if rebuild {
                index::rebuild_index(&cfg, embedder.as_ref()).await?
            } else {
                index::ensure_index(&cfg, embedder.as_ref()).await?
            };
            print_summary(&cfg, &index);
        }
        Commands::Ask { question } => {
            let retrieval = retrieval_service(&cfg, embedder).await?;
            let answer = retrieval.query(&question).await;
            println!("{}", answer.text);
            for source in &answer.sources {
                println!("  [{:.3}] {}", source.score, source.source_id);
            }
        }
        Commands::Run => run_session(cfg, embedder).await?,
        Commands::Resources | Commands::Strategies { .. } => {}
    }

    Ok(())
}

async fn retrieval_service(
    cfg: &Config,
    embedder: Arc<dyn EmbeddingProvider>,
) -> anyhow::Result<RetrievalService> {
    let index = index::ensure_index(cfg, embedder.as_ref()).await?;
    let model = llm::create_model(&cfg.llm).context("Failed to create language model")?;
    Ok(RetrievalService::new(
        Arc::new(index),
        embedder,
        model,
        &cfg.retrieval,
    ))
}

async fn run_session(cfg: Config, embedder: Arc<dyn EmbeddingProvider>) -> anyhow::Result<()> {
    let index = index::ensure_index(&cfg, embedder.as_ref()).await?;
    let model = llm::create_model(&cfg.llm).context("Failed to create language model")?;

    let retrieval = Arc::new(RetrievalService::new(
        Arc::new(index),
        embedder,
        model.clone(),
        &cfg.retrieval,
    ));
    let responder = Responder::new(model, &cfg.responder, &cfg.session.assistant_name);
    let output = speech::create_output(&cfg.speech, &cfg.session.assistant_name)
        .context("Failed to create speech output")?;

    let shutdown = Shutdown::new();
    shutdown.listen_for_ctrl_c();

    let mut session = Session::new(
        ConsoleInput::stdin(),
        output,
        retrieval,
        responder,
        cfg.session.clone(),
        shutdown,
    );
    session.run().await;
    Ok(())
}

fn print_summary(cfg: &Config, index: &VectorIndex) {
    let manifest = index.manifest();
    println!("Index: {}", cfg.index.persist_dir.display());
    println!("  documents:  {}", manifest.document_count);
    println!("  chunks:     {}", manifest.chunk_count);
    println!("  model:      {}", manifest.embedding_model);
    println!("  dims:       {}", manifest.dims);
    println!("  max_tokens: {}", manifest.max_tokens);
    println!("  built_at:   {}", manifest.built_at.to_rfc3339());
}
