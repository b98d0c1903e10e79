// src/cli.rs
//! CLI definitions for pkgbridge

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pkgbridge")]
#[command(version)]
#[command(about = "Check and install packages through PackageKit or dnf5daemon", long_about = None)]
pub struct Cli {
    /// Configuration file (default: /etc/pkgbridge/config.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show which package manager backend this host uses
    Detect,

    /// Refresh repository metadata
    Refresh {
        /// Discard cached metadata regardless of its age
        #[arg(short, long)]
        force: bool,
    },

    /// Show which packages are missing and what installing them involves
    Check {
        /// Package names
        #[arg(required = true)]
        packages: Vec<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Install missing packages
    Install {
        /// Package names
        #[arg(required = true)]
        packages: Vec<String>,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}
