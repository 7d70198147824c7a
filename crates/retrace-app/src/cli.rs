//! CLI argument definitions for the Retrace application.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Retrace — on-device semantic search over your browsing history.
#[derive(Parser, Debug)]
#[command(name = "retrace", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Data directory for the SQLite store.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the local REST API server (default).
    Serve,

    /// Index one page from a file (or stdin) into the store.
    Index {
        /// Canonical url of the page; the dedup key.
        url: String,
        /// Page title.
        #[arg(long, default_value = "")]
        title: String,
        /// File with the extracted plain text. Reads stdin when omitted.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Run a query against the index and print results as JSON.
    Search {
        query: String,
        /// Maximum results.
        #[arg(long, default_value_t = 10)]
        k: usize,
        /// Retrieval mode: semantic, keyword, or hybrid.
        #[arg(long, default_value = "hybrid")]
        mode: String,
    },

    /// Print store statistics as JSON.
    Stats,

    /// Run the offline evaluation harness over the built-in corpus.
    Eval {
        /// Retrieval mode to evaluate.
        #[arg(long, default_value = "hybrid")]
        mode: String,
        /// Cutoff for P@k / R@k / NDCG@k.
        #[arg(long, default_value_t = 10)]
        k: usize,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > RETRACE_CONFIG env var > platform
    /// default (~/.retrace/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("RETRACE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > RETRACE_PORT env var > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Ok(val) = std::env::var("RETRACE_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        config_port
    }

    /// Resolve the data directory, when overridden on the command line.
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// Resolve the log level, when overridden on the command line.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".retrace").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".retrace").join("config.toml");
    }
    PathBuf::from("config.toml")
}

/// Expand a leading `~/` against the platform home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").ok();
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").ok();

        if let Some(home) = home {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}
