//! This module provides functionality for loading and handling the application's configuration.
//!
//! It defines the `TomeConfig` struct, which holds the configuration parameters,
//! and a `load_config` function to load the configuration from a YAML file.
//!
//! # Examples
//!
//! Loading the configuration from a file:
//!
//! ```no_run
//! use tome::config::{TomeConfig, load_config};
//!
//! let config_file_path = "/path/to/config.yaml";
//! let config: TomeConfig = load_config(config_file_path).unwrap();
//! println!("{:?}", config);
//! ```

use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::{error::Error, fs};

/// Represents the application's configuration.
///
/// Holds everything needed to reach an OpenAI compatible backend and to run
/// the retrieval pipeline: API credentials, model names, response budgeting,
/// and the optional durable session settings. Constructed by loading a YAML
/// configuration file using [`load_config`].
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct TomeConfig {
    /// The API key used to authenticate requests to the API.
    pub api_key: String,

    /// The base URL of the API.
    pub api_base: String,

    /// The chat model used for generating answers.
    pub model: String,

    /// The model used for embedding chunks and queries.
    pub embedding_model: String,

    // Maximum tokens the assistant may spend on one answer.
    pub max_response_tokens: u16,

    // Stop words
    pub stop_words: Vec<String>,

    // Session database url (SQLite)
    pub session_db_url: String,

    // Session name; None disables durable history
    pub session_name: Option<String>,

    // Stream chat completions to stdout as they arrive
    pub should_stream: Option<bool>,
}

/// Loads the application's configuration from a YAML file.
///
/// This function reads the file at the given path, parses it as YAML, and
/// constructs a `TomeConfig` struct from it.
///
/// # Parameters
///
/// - `file`: The path to the YAML configuration file.
///
/// # Returns
///
/// - `Ok(TomeConfig)`: The loaded configuration.
/// - `Err(Box<dyn Error>)`: An error occurred while reading the file or parsing the YAML.
pub fn load_config(file: &str) -> Result<TomeConfig, Box<dyn Error>> {
    let content = fs::read_to_string(file)?;
    let config: TomeConfig = serde_yaml::from_str(&content)?;
    Ok(config)
}

/// Open a SQLite connection for the durable session store.
///
/// # Panics
/// Panics if the connection cannot be established.
pub fn establish_connection(db_url: &str) -> SqliteConnection {
    SqliteConnection::establish(db_url).unwrap_or_else(|_| panic!("Error connecting to {}", db_url))
}
