//! Conversational shell agent.
//!
//! Without a subcommand the agent answers one request (`--prompt`) or runs an
//! interactive loop on stdin. `exec` and `index` expose the command executor
//! and the document indexer directly.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use agent::core::decision::GoalMatcher;
use agent::core::shortcuts::ShortcutTable;
use agent::core::types::SessionOutcome;
use agent::evaluator::AiEvaluator;
use agent::exit_codes;
use agent::frontend::{TerminalConsole, run_interactive};
use agent::io::auto_index::{AutoIndexer, ChangeDetector, TrackRules};
use agent::io::config::{AgentConfig, SessionConfig, default_config_path, load_config};
use agent::io::context::ContextProvider;
use agent::io::debug_log::DebugLog;
use agent::io::document_index::{DEFAULT_FORMATS, DocumentIndexer, collect_files};
use agent::io::embeddings::{Embedder, OllamaEmbedder};
use agent::io::executor::{CommandRunner, ShellExecutor};
use agent::io::index_worker::IndexWorker;
use agent::io::llm::{LanguageModel, OllamaClient};
use agent::io::system_info::SystemInfo;
use agent::io::vector_store::{ChromaStore, VectorStore};
use agent::logging;
use agent::session::AgentSession;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "agent",
    version,
    about = "Turn natural-language requests into confirmed shell commands"
)]
struct Cli {
    /// Handle this single request and exit.
    #[arg(short, long)]
    prompt: Option<String>,
    /// Run commands without asking for confirmation.
    #[arg(long)]
    auto_approve: bool,
    /// Index changed files in the working directory after each successful command.
    #[arg(long)]
    auto_index: bool,
    /// Do not retrieve past sessions as context.
    #[arg(long)]
    no_history: bool,
    /// Config file (default: ~/.agent.toml).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Verbose diagnostics on stderr.
    #[arg(long)]
    debug: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a command through the executor and print its output.
    Exec {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        words: Vec<String>,
    },
    /// Chunk, embed and store documents for retrieval.
    Index {
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Descend into subdirectories.
        #[arg(short, long)]
        recursive: bool,
        /// Extensions to index, comma separated.
        #[arg(short, long, value_delimiter = ',')]
        formats: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.debug);
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::ERROR);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match &cli.command {
        Some(Command::Exec { words }) => Ok(cmd_exec(&words.join(" "))),
        Some(Command::Index {
            path,
            recursive,
            formats,
        }) => {
            let cfg = load(cli.config.as_deref())?;
            cmd_index(&cfg, path, *recursive, formats)
        }
        None => {
            let cfg = load(cli.config.as_deref())?;
            cmd_chat(&cli, &cfg)
        }
    }
}

fn load(path: Option<&Path>) -> Result<AgentConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };
    load_config(&path).with_context(|| format!("load config {}", path.display()))
}

fn cmd_exec(command: &str) -> i32 {
    let result = ShellExecutor::new().execute(command);
    print!("{}", result.output);
    if !result.output.is_empty() && !result.output.ends_with('\n') {
        println!();
    }
    match &result.error {
        None => exit_codes::OK,
        Some(err) => {
            eprintln!("Error: {err}");
            exit_codes::ERROR
        }
    }
}

fn cmd_index(cfg: &AgentConfig, path: &Path, recursive: bool, formats: &[String]) -> Result<i32> {
    let formats: Vec<String> = if formats.is_empty() {
        DEFAULT_FORMATS.map(String::from).to_vec()
    } else {
        formats.to_vec()
    };
    let files = collect_files(path, &formats, recursive)?;
    if files.is_empty() {
        println!("No files to index in {}", path.display());
        return Ok(exit_codes::OK);
    }

    let indexer = DocumentIndexer::new(
        Arc::new(OllamaEmbedder::new(&cfg.embeddings)),
        Arc::new(ChromaStore::new(&cfg.vector)),
        cfg.vector.collection.clone(),
        cfg.chunker.chunk_size,
        cfg.chunker.chunk_overlap,
    );
    let summary = indexer.index_files(&files);
    for (file, err) in &summary.failures {
        eprintln!("Failed to index {}: {err}", file.display());
    }
    println!(
        "Indexed {} of {} files ({} chunks)",
        summary.files_indexed,
        files.len(),
        summary.chunks_stored
    );
    Ok(if summary.failures.is_empty() {
        exit_codes::OK
    } else {
        exit_codes::ERROR
    })
}

fn cmd_chat(cli: &Cli, cfg: &AgentConfig) -> Result<i32> {
    let config = SessionConfig {
        auto_approve: cli.auto_approve,
        auto_index: cli.auto_index || cfg.auto_index.enabled,
        no_history: cli.no_history,
        ..SessionConfig::from_chat(&cfg.chat)
    };
    let mut session = build_session(config, cfg)?;

    let stdin = io::stdin();
    let mut console = TerminalConsole::new(stdin.lock(), io::stdout(), &config);
    let code = match &cli.prompt {
        Some(prompt) => {
            let report = session.handle_prompt(prompt, &mut console)?;
            match report.outcome {
                SessionOutcome::Denied { .. } => exit_codes::DENIED,
                SessionOutcome::BudgetExhausted { .. } | SessionOutcome::EvaluatorFailed(_) => {
                    exit_codes::ERROR
                }
                SessionOutcome::NoCommands | SessionOutcome::Finished(_) => exit_codes::OK,
            }
        }
        None => {
            run_interactive(&session, &mut console)?;
            exit_codes::OK
        }
    };
    console.into_output().flush().context("flush stdout")?;
    session.shutdown()?;
    Ok(code)
}

fn build_session(config: SessionConfig, cfg: &AgentConfig) -> Result<AgentSession> {
    let llm: Arc<dyn LanguageModel> = Arc::new(OllamaClient::new(&cfg.llm));
    let embedder: Arc<dyn Embedder> = Arc::new(OllamaEmbedder::new(&cfg.embeddings));
    let store: Arc<dyn VectorStore> = Arc::new(ChromaStore::new(&cfg.vector));
    let runner: Arc<dyn CommandRunner> = Arc::new(ShellExecutor::new());

    let shortcuts = if cfg.chat.shortcuts {
        ShortcutTable::builtin()
    } else {
        ShortcutTable::disabled()
    };
    let debug_log = cfg
        .chat
        .debug_log
        .clone()
        .map_or_else(DebugLog::disabled, DebugLog::to_file);
    let evaluator = AiEvaluator::new(llm.clone())
        .with_matcher(GoalMatcher::new(&cfg.chat.goal_affirmations))
        .with_shortcuts(shortcuts)
        .with_debug_log(debug_log)
        .with_history(
            embedder.clone(),
            store.clone(),
            cfg.vector.command_collection.clone(),
        );

    let context = ContextProvider::new(
        embedder.clone(),
        store.clone(),
        cfg.vector.collection.clone(),
        cfg.vector.command_collection.clone(),
    )
    .with_limits(cfg.chat.max_documents, cfg.chat.max_history);

    let mut session = AgentSession::new(config, llm, runner, Box::new(evaluator))
        .with_system_info(SystemInfo::detect())
        .with_context(context);

    if config.auto_index {
        let root = std::env::current_dir().context("resolve working directory")?;
        let rules = TrackRules::from_config(&cfg.auto_index)?.with_enabled(true);
        let detector = ChangeDetector::new(root, rules);
        if let Err(err) = detector.take_snapshot() {
            warn!(err = %format!("{err:#}"), "initial auto-index snapshot failed");
        }
        let indexer = AutoIndexer::new(
            detector,
            embedder,
            store,
            cfg.vector.auto_index_collection.clone(),
        );
        session = session.with_index_worker(IndexWorker::spawn(Arc::new(indexer))?);
        info!("auto-indexing enabled");
    }
    Ok(session)
}
