//! CLI argument definitions
//!
//! Global CLI options and configuration merging logic.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::Config;

use super::commands::Commands;

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq)]
pub(crate) enum ColorMode {
    /// Auto-detect based on terminal (default)
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

#[derive(Parser)]
#[command(name = "cropcare")]
#[command(about = "Leaf and soil analysis sessions for crop advisory backends", version)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,

    /// Output as JSON
    #[arg(short, long, global = true)]
    pub(crate) json: bool,

    /// Enable debug logging on stderr
    #[arg(long, global = true)]
    pub(crate) debug: bool,

    /// Directory holding the session store
    #[arg(long, global = true, value_name = "DIR")]
    pub(crate) data_dir: Option<PathBuf>,

    /// Keep sessions in memory only (nothing is written to disk)
    #[arg(long, global = true)]
    pub(crate) ephemeral: bool,

    /// Backend base URL; repeat to add fallbacks tried in order
    #[arg(long = "base-url", global = true, value_name = "URL")]
    pub(crate) base_urls: Vec<String>,

    /// Request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub(crate) timeout: Option<u64>,

    /// Number of sessions kept before the oldest are pruned
    #[arg(long, global = true, value_name = "N")]
    pub(crate) max_sessions: Option<usize>,

    /// Never ask to try again after a failed analysis
    #[arg(long, global = true)]
    pub(crate) no_prompt: bool,

    /// Color output mode
    #[arg(long, global = true, value_enum, default_value = "auto")]
    pub(crate) color: ColorMode,

    /// Disable colored output (shorthand for --color=never)
    #[arg(long, global = true)]
    pub(crate) no_color: bool,
}

/// Settings resolved from CLI flags over config file values
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) base_urls: Vec<String>,
    pub(crate) timeout: Duration,
    pub(crate) pest_timeout: Duration,
    pub(crate) max_sessions: usize,
    pub(crate) data_dir: PathBuf,
}

impl Cli {
    /// Merge config file values into CLI (CLI args take precedence)
    pub(crate) fn with_config(mut self, config: &Config) -> Self {
        if !self.no_color && config.no_color {
            self.no_color = true;
        }
        if !self.debug && config.debug {
            self.debug = true;
        }
        self
    }

    pub(crate) fn settings(&self, config: &Config) -> Settings {
        Settings {
            base_urls: if self.base_urls.is_empty() {
                config.base_urls()
            } else {
                self.base_urls.clone()
            },
            timeout: Duration::from_secs(self.timeout.unwrap_or_else(|| config.timeout_secs())),
            pest_timeout: Duration::from_secs(config.pest_timeout_secs()),
            // A cap of zero would prune the session just created
            max_sessions: self
                .max_sessions
                .unwrap_or_else(|| config.max_sessions())
                .max(1),
            data_dir: self.data_dir.clone().unwrap_or_else(|| config.data_dir()),
        }
    }

    pub(crate) fn use_color(&self) -> bool {
        if self.no_color {
            return false;
        }
        match self.color {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => std::io::stdout().is_terminal(),
        }
    }

    /// Asking to try again needs a human on both ends of the terminal
    pub(crate) fn can_prompt(&self) -> bool {
        !self.no_prompt && !self.json && std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
    }
}
