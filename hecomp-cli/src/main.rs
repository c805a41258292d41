//! hecomp CLI - XCompress / Cabinet transcoder
//!
//! Compresses game asset files into XCompress containers or LZX cabinets,
//! and decompresses either back to raw form, replacing each file in place.

mod commands;
mod replace;
mod utils;

use clap::{Parser, Subcommand};
use commands::{Operation, cmd_info, cmd_transcode};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hecomp")]
#[command(author, version, about = "XCompress and Cabinet transcoder for game assets")]
#[command(long_about = "
hecomp converts files between raw form and two LZX-based containers:
XCompress and Microsoft Cabinet. Files are rewritten in place.

Examples:
  hecomp xcompress level.arc sound.arc
  hecomp genscompress textures/*.dds
  hecomp decompress level.arc
  hecomp info --json level.arc

Set RUST_LOG=debug for container and block details on stderr.
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress files into XCompress containers
    #[command(alias = "x")]
    Xcompress {
        /// Files to compress
        files: Vec<PathBuf>,
    },

    /// Compress files into LZX cabinets
    #[command(alias = "cab")]
    Genscompress {
        /// Files to compress
        files: Vec<PathBuf>,
    },

    /// Decompress XCompress containers and cabinets
    #[command(alias = "d")]
    Decompress {
        /// Files to decompress
        files: Vec<PathBuf>,
    },

    /// Show container details without modifying files
    #[command(alias = "i")]
    Info {
        /// Files to inspect
        files: Vec<PathBuf>,

        /// Output as JSON (machine-readable)
        #[arg(short, long)]
        json: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut stdout = std::io::stdout().lock();

    let result = match cli.command {
        Commands::Xcompress { files } => {
            cmd_transcode(&mut stdout, &files, Operation::XCompress)
        }
        Commands::Genscompress { files } => {
            cmd_transcode(&mut stdout, &files, Operation::Cabinet)
        }
        Commands::Decompress { files } => {
            cmd_transcode(&mut stdout, &files, Operation::Decompress)
        }
        Commands::Info { files, json } => cmd_info(&mut stdout, &files, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
