//! # Tome (library root)
//!
//! This crate provides the core plumbing for the **Tome** CLI and library, a
//! retrieval-augmented chat engine over PDF documents:
//! - High-level chat & embedding API bindings (`api`).
//! - Document loading and chunking (`loader`, `chunker`).
//! - Exact-similarity vector search (`vector_store`).
//! - The two-stage conversation pipeline (`agent`, `history`).
//! - CLI parsing & commands (`commands`).
//! - Configuration & DB integration (`config`, `models`, `schema`, `session_store`).
//!
//! In addition, this module exposes a utility for discovering the per-platform
//! configuration directory ([`config_dir`]).
//!
//! ## Modules
//! - [`agent`], [`api`], [`chunker`], [`commands`], [`config`], [`error`],
//!   [`history`], [`loader`], [`models`], [`schema`], [`session_store`],
//!   [`vector_store`]

use directories::ProjectDirs;
use std::error::Error;

pub mod agent;
pub mod api;
pub mod chunker;
pub mod commands;
pub mod config;
pub mod error;
pub mod history;
pub mod loader;
pub mod models;
pub mod schema;
pub mod session_store;
pub mod vector_store;

/// Return the per-platform configuration directory used by Tome.
///
/// This uses [`directories::ProjectDirs`] with the application triple
/// `("com", "tome", "tome")`, so you get the right place on each OS
/// (e.g., `~/Library/Application Support/com.tome.tome` on macOS).
///
/// The directory is **not** created by this function; callers that need it should
/// create it with `fs::create_dir_all`.
///
/// # Errors
/// Returns an error if the platform configuration directory cannot be determined
/// (which is rare but possible in heavily sandboxed environments).
///
/// # Examples
/// ```rust
/// let cfg = tome::config_dir().expect("has a config dir");
/// println!("config at {}", cfg.display());
/// ```
pub fn config_dir() -> Result<std::path::PathBuf, Box<dyn Error>> {
    let proj_dirs =
        ProjectDirs::from("com", "tome", "tome").ok_or("Unable to determine config directory")?;
    let config_dir = proj_dirs.config_dir().to_path_buf();

    Ok(config_dir)
}
