//! This module defines the command-line interface for the application using `clap`.
//!
//! It provides a `Cli` struct that represents the parsed command-line arguments,
//! and a `Commands` enum that represents the available subcommands and their
//! options.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Represents the parsed command-line arguments.
///
/// This struct is constructed by parsing the command-line arguments using `clap`.
/// It contains a `command` field that holds the parsed subcommand and its options.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, propagate_version = true, color = clap::ColorChoice::Always)]
pub struct Cli {
    /// The parsed subcommand and its options.
    #[command(subcommand)]
    pub command: Commands,
}

/// Represents the available subcommands and their options.
///
/// Each variant of this enum corresponds to a subcommand that the user can invoke
/// from the command line, along with any options specific to that subcommand.
#[derive(Subcommand, Debug)]
#[command(about, long_about = None, color = clap::ColorChoice::Always)]
pub enum Commands {
    /// The 'ask' subcommand: ingest the given documents and answer a single
    /// question against them.
    #[clap(name = "ask", alias = "a")]
    Ask {
        /// The question to be asked. If not provided, a default question is used.
        question: Option<String>,

        /// PDF documents to ingest before answering. May be given repeatedly.
        #[arg(name = "docs", short = 'd')]
        docs: Vec<PathBuf>,

        /// Named session whose history is persisted across invocations.
        #[arg(name = "session", short = 's')]
        session: Option<String>,
    },

    /// The 'interactive' subcommand: a REPL over the same ingested documents.
    ///
    /// This subcommand can be invoked with either 'i' or 'interactive'.
    #[clap(name = "interactive", alias = "i")]
    Interactive {
        /// PDF documents to ingest before the conversation starts.
        #[arg(name = "docs", short = 'd')]
        docs: Vec<PathBuf>,

        /// Named session whose history is persisted across invocations.
        #[arg(name = "session", short = 's')]
        session: Option<String>,
    },

    /// The 'status' subcommand: report what the given documents would
    /// contribute to the index, and how much history a session holds.
    ///
    /// Documents are loaded and chunked but not embedded, so no API calls
    /// are made.
    Status {
        /// PDF documents to inspect.
        #[arg(name = "docs", short = 'd')]
        docs: Vec<PathBuf>,

        /// Named session whose persisted history should be reported.
        #[arg(name = "session", short = 's')]
        session: Option<String>,
    },

    /// The 'reset' subcommand: delete the persisted history of a session.
    Reset {
        /// Named session to clear. Falls back to the configured session name.
        #[arg(name = "session", short = 's')]
        session: Option<String>,
    },

    /// The 'init' subcommand, which takes no arguments and is used for initialization.
    ///
    /// When invoked, this subcommand performs setup and initialization tasks, such
    /// as creating necessary directories and files.
    Init,
}
