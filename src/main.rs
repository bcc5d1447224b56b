//! # docchat CLI
//!
//! ```bash
//! docchat --config ./config/docchat.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat serve` | Index the document and start the HTTP server |
//! | `docchat ask "<question>"` | Answer one question from the terminal |
//! | `docchat chunks` | Print chunk boundaries without loading any model |

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docchat::config;
use docchat::context::{read_document, AppContext};
use docchat::{logging, server};
use docchat_core::chunk::{chunk_count, chunk_text};

/// docchat: retrieval-augmented question answering over one document.
#[derive(Parser)]
#[command(name = "docchat", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the document and serve `POST /chat`.
    ///
    /// Binds to `[server].bind`. The document is chunked and embedded
    /// before the listener opens; any failure there aborts startup.
    Serve,

    /// Answer a single question and exit.
    Ask {
        /// The question.
        question: String,

        /// Number of chunks to retrieve (defaults to `[retrieval].top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Print the retrieved chunks before the answer.
        #[arg(long)]
        show_context: bool,
    },

    /// Chunk the document and print each chunk's token span.
    ///
    /// No embedding or generation model is loaded.
    Chunks {
        /// Maximum number of chunks to print.
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;
    logging::init_with_config(&cfg.logging);

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Ask {
            question,
            top_k,
            show_context,
        } => {
            if top_k == Some(0) {
                anyhow::bail!("--top-k must be >= 1");
            }
            let ctx = AppContext::init(&cfg).await?;
            let context = ctx.search(&question, top_k).await?;
            if show_context {
                for (i, item) in context.iter().enumerate() {
                    println!("[{}] {}\n", i + 1, item.content);
                }
            }
            let answer = ctx.answer(&context, &question).await?;
            println!("{}", answer);
        }
        Commands::Chunks { limit } => {
            let text = read_document(&cfg.document.path)?;
            let chunks = chunk_text(&text, cfg.chunking.window, cfg.chunking.overlap)
                .context("Failed to chunk document")?;
            let tokens = text.split_whitespace().count();

            println!(
                "{} tokens, window {}, overlap {} -> {} chunks (expected {})",
                tokens,
                cfg.chunking.window,
                cfg.chunking.overlap,
                chunks.len(),
                chunk_count(tokens, cfg.chunking.window, cfg.chunking.overlap)?
            );
            for chunk in chunks.iter().take(limit.unwrap_or(usize::MAX)) {
                let preview: String = chunk.text.chars().take(60).collect();
                println!(
                    "#{:<4} [{}..{}) {}",
                    chunk.index, chunk.start, chunk.end, preview
                );
            }
        }
    }

    Ok(())
}
