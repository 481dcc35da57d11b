mod commands;

use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use docqa_ai::orchestrator::Orchestrator;
use docqa_core::config::DocQaConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docqa", version)]
#[command(about = "Ask questions about one local document, answered by a local Ollama model")]
struct Cli {
    #[command(flatten)]
    runtime: RuntimeArgs,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Overrides on top of the `DOCQA_*` environment (a `.env` file is loaded first).
#[derive(Args)]
struct RuntimeArgs {
    /// Ollama base URL; must be http://127.0.0.1[:port]
    #[arg(long, env = "DOCQA_OLLAMA_BASE_URL", global = true)]
    ollama_url: Option<String>,

    /// Generation model
    #[arg(long, env = "DOCQA_GENERATION_MODEL", global = true)]
    model: Option<String>,

    /// Use the offline hashing embedder instead of Ollama embeddings
    #[arg(long, global = true)]
    offline_embeddings: bool,

    /// Chunks retrieved per question
    #[arg(long, global = true)]
    top_k: Option<usize>,

    /// Seconds to wait for an answer before giving up
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    #[arg(long, global = true)]
    chunk_overlap: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a document and answer one or more questions about it
    Ask {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(required = true)]
        questions: Vec<String>,

        /// Print answers as JSON
        #[arg(long)]
        json: bool,
    },
    /// Upload a document, then answer questions read line by line from stdin
    Chat {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Check that Ollama is reachable and the configured models are pulled
    Health,
    /// Print the effective configuration
    Config,
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "docqa=debug,docqa_ai=debug,docqa_core=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli.runtime)?;
    tracing::debug!(?config, "effective configuration");

    match cli.command {
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Health => {
            let health = commands::health(&config)?;
            println!("{}", serde_json::to_string_pretty(&health)?);
            Ok(if health.is_ready() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Ask {
            file,
            questions,
            json,
        } => {
            let orch = open_document(&config, &file)?;
            let mut failed = false;
            for question in &questions {
                match commands::ask(&orch, question) {
                    Ok(answer) if json => println!("{}", serde_json::to_string_pretty(&answer)?),
                    Ok(answer) => println!("Q: {question}\n{}\n", commands::render_answer(&answer)),
                    Err(err) if json => {
                        failed = true;
                        println!("{}", serde_json::to_string_pretty(&err)?);
                    }
                    Err(err) => {
                        failed = true;
                        eprintln!("Q: {question}\n{}\n", commands::render_error(&err));
                    }
                }
            }
            Ok(if failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Command::Chat { file } => {
            let orch = open_document(&config, &file)?;
            chat(&orch)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(args: &RuntimeArgs) -> Result<DocQaConfig> {
    resolve_config(args, |key| std::env::var(key).ok())
}

/// Flags win over the environment key they shadow; the merged settings are validated once.
fn resolve_config<F>(args: &RuntimeArgs, env: F) -> Result<DocQaConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut flags: HashMap<&str, String> = HashMap::new();
    if let Some(url) = &args.ollama_url {
        flags.insert("DOCQA_OLLAMA_BASE_URL", url.clone());
    }
    if let Some(model) = &args.model {
        flags.insert("DOCQA_GENERATION_MODEL", model.clone());
    }
    if args.offline_embeddings {
        flags.insert("DOCQA_EMBEDDER", "hashing".to_string());
    }
    if let Some(k) = args.top_k {
        flags.insert("DOCQA_TOP_K", k.to_string());
    }
    if let Some(secs) = args.timeout_secs {
        flags.insert("DOCQA_GENERATION_TIMEOUT_SECS", secs.to_string());
    }
    if let Some(size) = args.chunk_size {
        flags.insert("DOCQA_CHUNK_SIZE", size.to_string());
    }
    if let Some(overlap) = args.chunk_overlap {
        flags.insert("DOCQA_CHUNK_OVERLAP", overlap.to_string());
    }

    DocQaConfig::from_lookup(|key| flags.get(key).cloned().or_else(|| env(key)))
        .context("invalid settings (DOCQA_* environment and flags)")
}

fn open_document(config: &DocQaConfig, path: &Path) -> Result<Orchestrator> {
    let orch = docqa_ai::build_orchestrator(config)?;
    let receipt = commands::upload_file(&orch, path)
        .map_err(|e| anyhow::anyhow!(commands::render_error(&e)))
        .with_context(|| format!("uploading {}", path.display()))?;
    eprintln!(
        "Loaded {} ({} chars, {} chunks)",
        receipt.filename, receipt.text_len, receipt.chunk_count
    );
    Ok(orch)
}

fn chat(orch: &Orchestrator) -> Result<()> {
    eprintln!("Ask a question, or :status, :load <path>, :quit");
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        match line {
            "" => continue,
            ":quit" | ":q" | "exit" => break,
            ":status" => println!("{}", serde_json::to_string_pretty(&orch.status())?),
            _ if line.starts_with(":load ") => {
                let path = PathBuf::from(line.trim_start_matches(":load ").trim());
                match commands::upload_file(orch, &path) {
                    Ok(receipt) => println!(
                        "Loaded {} ({} chunks); the previous document was replaced",
                        receipt.filename, receipt.chunk_count
                    ),
                    Err(err) => println!("{}", commands::render_error(&err)),
                }
            }
            question => match commands::ask(orch, question) {
                Ok(answer) => println!("{}\n", commands::render_answer(&answer)),
                Err(err) => println!("{}\n", commands::render_error(&err)),
            },
        }
    }
    Ok(())
}
