//! Main module for the Tome CLI application.
//!
//! This module provides the main function and auxiliary functionalities for
//! the CLI application. It handles command parsing, configuration loading, and
//! initialization, as well as invoking the appropriate functionalities based on
//! the provided command-line arguments.
//!
//! # Examples
//!
//! Asking a single question against a document:
//!
//! ```sh
//! cargo run -- ask "What does chapter one cover?" -d manual.pdf
//! tome ask "What does chapter one cover?" -d manual.pdf
//! ```
//!
//! Initializing the application's configuration:
//!
//! ```sh
//! cargo run -- init
//! tome init
//! ```

use clap::Parser;
use crossterm::style::Stylize;
use once_cell::sync::OnceCell;
use std::io::{self, Write as _};
use std::sync::Arc;
use std::{error::Error, fs};
use tracing::{debug, info};

use tome::agent::RagAgent;
use tome::api::{OpenAiChat, OpenAiEmbedder};
use tome::commands::{Cli, Commands};
use tome::config::{self, TomeConfig};
use tome::config_dir;
use tome::loader::{DocumentLoader, PdfLoader};
use tome::session_store::SessionStore;
use tome::vector_store::VectorStore;

static TRACING: OnceCell<()> = OnceCell::new();

fn main() -> Result<(), Box<dyn Error>> {
    TRACING.get_or_init(|| {
        tracing_subscriber::fmt::init();
    });
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run())
}

/// Main asynchronous function of the Tome CLI application.
///
/// Loads configuration, parses command-line arguments, and executes the
/// appropriate command.
///
/// # Errors
///
/// Returns an error if there is an issue loading the configuration, parsing the
/// command-line arguments, or executing the specified command.
async fn run() -> Result<(), Box<dyn Error>> {
    let config_path = config_dir()?.join("config.yaml");

    debug!("Loading config from: {}", config_path.display());
    let cli = Cli::parse();

    match cli.command {
        Commands::Ask {
            question,
            docs,
            session,
        } => {
            let tome_config = config::load_config(&config_path.to_string_lossy())?;
            debug!("Asking question: {:?}", question);
            let question =
                question.unwrap_or_else(|| "What do these documents cover?".to_string());
            let mut agent = build_agent(&tome_config, session)?;
            if !docs.is_empty() {
                let added = agent.ingest(&PdfLoader, &docs).await?;
                info!("ingested {added} chunks");
            }
            let streaming = tome_config.should_stream.unwrap_or(false);
            let answer = agent.ask(&question).await?;
            if should_print_answer(streaming, &answer) {
                println!("{answer}");
            }
        }
        Commands::Interactive { docs, session } => {
            let tome_config = config::load_config(&config_path.to_string_lossy())?;
            let mut agent = build_agent(&tome_config, session)?;
            if !docs.is_empty() {
                let added = agent.ingest(&PdfLoader, &docs).await?;
                info!("ingested {added} chunks");
            }
            interactive(&mut agent, tome_config.should_stream.unwrap_or(false)).await?;
        }
        Commands::Status { docs, session } => {
            let tome_config = config::load_config(&config_path.to_string_lossy())?;
            status(&tome_config, &docs, session)?;
        }
        Commands::Reset { session } => {
            let tome_config = config::load_config(&config_path.to_string_lossy())?;
            let Some(name) = session.or_else(|| tome_config.session_name.clone()) else {
                return Err("no session named; pass -s or set session_name in config.yaml".into());
            };
            let mut session_store = SessionStore::open(&tome_config.session_db_url, &name)?;
            let removed = session_store.clear()?;
            println!("Cleared {removed} persisted messages from session '{name}'.");
        }
        Commands::Init => {
            debug!("Initializing configuration");
            init()?;
        }
    }

    Ok(())
}

/// Assemble an agent from the configuration: OpenAI-backed embedding and chat
/// capabilities over a fresh vector index, with an optional durable session.
///
/// A session name given on the command line takes precedence over the one in
/// the configuration file; when neither is set the history is in-memory only.
fn build_agent(
    tome_config: &TomeConfig,
    session: Option<String>,
) -> Result<RagAgent, Box<dyn Error>> {
    let store = VectorStore::new(Arc::new(OpenAiEmbedder::new(tome_config)));
    let mut agent = RagAgent::new(Arc::new(OpenAiChat::new(tome_config)), store);

    if let Some(name) = session.or_else(|| tome_config.session_name.clone()) {
        let session_store = SessionStore::open(&tome_config.session_db_url, &name)?;
        agent.attach_session(session_store)?;
    }

    Ok(agent)
}

/// Whether the answer still needs to be written to stdout.
///
/// A streaming backend echoes the real answer token by token, but a turn
/// that fell back never streamed anything, so the fallback must be printed
/// here or the user sees no answer at all.
fn should_print_answer(streaming: bool, answer: &str) -> bool {
    !streaming || answer == tome::agent::FALLBACK_ANSWER
}

/// Report what the given documents would contribute to the index, plus the
/// persisted size of a session. Loads and chunks without embedding, so this
/// makes no API calls.
fn status(
    tome_config: &TomeConfig,
    docs: &[std::path::PathBuf],
    session: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let chunker = tome::chunker::Chunker::default();
    for path in docs {
        match PdfLoader.load(path) {
            Ok(pages) => {
                let chunk_count: usize = pages
                    .iter()
                    .map(|page| chunker.split_text(&page.text).len())
                    .sum();
                println!(
                    "{}: {} pages, {chunk_count} chunks",
                    path.display(),
                    pages.len()
                );
            }
            Err(err) => println!("{}: unusable ({err})", path.display()),
        }
    }

    if let Some(name) = session.or_else(|| tome_config.session_name.clone()) {
        let mut session_store = SessionStore::open(&tome_config.session_db_url, &name)?;
        let history = session_store.load(usize::MAX)?;
        println!("Session '{name}': {} persisted messages.", history.len());
    }

    Ok(())
}

/// Run the interactive REPL: read a line, answer it, repeat.
///
/// `exit` ends the session, `reset` clears the index and history. Empty lines
/// are skipped without invoking the agent.
async fn interactive(agent: &mut RagAgent, streaming: bool) -> Result<(), Box<dyn Error>> {
    let mut stdout = io::stdout();
    println!(
        "{}",
        "Ask a question, or type 'reset' to clear state, 'exit' to quit.".dark_grey()
    );

    loop {
        write!(stdout, "{} ", "You:".green())?;
        stdout.flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") {
            break;
        }
        if line.eq_ignore_ascii_case("reset") {
            agent.reset();
            println!("{}", "Session cleared.".dark_grey());
            continue;
        }

        if streaming {
            write!(stdout, "{} ", "Tome:".blue())?;
            stdout.flush()?;
            // The streaming backend echoes tokens as they arrive, but a
            // failed turn substitutes the fallback without streaming it.
            let answer = agent.ask(line).await?;
            if should_print_answer(true, &answer) {
                println!("{answer}");
            }
        } else {
            let answer = agent.ask(line).await?;
            println!("{} {answer}", "Tome:".blue());
        }
    }

    Ok(())
}

/// Initializes the application's configuration.
///
/// Creates the configuration directory and writes a starter `config.yaml`
/// pointing at a local OpenAI compatible backend.
///
/// # Errors
///
/// Returns an error if there is an issue creating the directory or file, or
/// serializing the configuration to YAML.
fn init() -> Result<(), Box<dyn Error>> {
    let config_dir = config_dir()?;
    info!("Creating config directory: {}", config_dir.display());
    fs::create_dir_all(&config_dir)?;

    let config_path = config_dir.join("config.yaml");
    info!("Creating config file: {}", config_path.display());
    let tome_config = TomeConfig {
        api_base: "http://localhost:5001/v1".to_string(),
        api_key: "CHANGEME".to_string(),
        model: "gpt-4o-mini".to_string(),
        embedding_model: "text-embedding-3-small".to_string(),
        max_response_tokens: 1024,
        stop_words: vec![],
        session_db_url: config_dir.join("tome.db").display().to_string(),
        session_name: None,
        should_stream: Some(false),
    };
    let config_yaml = serde_yaml::to_string(&tome_config)?;
    fs::write(config_path, config_yaml)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tome::agent::FALLBACK_ANSWER;

    #[test]
    fn non_streaming_answers_are_always_printed() {
        assert!(should_print_answer(false, "a real answer"));
        assert!(should_print_answer(false, FALLBACK_ANSWER));
    }

    #[test]
    fn streamed_answers_are_not_printed_twice() {
        assert!(!should_print_answer(true, "a real answer"));
    }

    #[test]
    fn the_fallback_is_printed_even_when_streaming() {
        // A failed turn substitutes the fallback without streaming anything,
        // so suppressing it would leave the user with no answer.
        assert!(should_print_answer(true, FALLBACK_ANSWER));
    }
}
