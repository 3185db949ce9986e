//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// lintweave - run lint engines over a folder, once or continuously
#[derive(Parser)]
#[command(name = "lintweave")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Lint every in-scope file of a folder once
    Lint {
        /// Folder to lint
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Only run these engines
        #[arg(short, long = "engine", value_name = "NAME")]
        engines: Vec<String>,
    },

    /// Watch a folder and lint changes until interrupted
    Serve {
        /// Folder to watch
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Poll instead of using native file notifications
        #[arg(long)]
        poll: bool,
    },

    /// Initialize configuration
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },
}
