use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "dupeindex")]
#[command(about = "Find duplicate files and keep the index current", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan configured paths and rebuild their duplicate sets
    Scan {
        /// Include hidden files and directories
        #[arg(short, long)]
        all: bool,
    },
    /// Drop index entries for files that no longer exist
    Refresh,
    /// List all duplicates recursively
    Tree {
        /// Directory to list
        #[arg(default_value = ".")]
        path: String,
        /// Show hidden files/directories
        #[arg(short, long)]
        all: bool,
    },
    /// Display the number of keys in the hash cache
    CountHashCache,
    /// Print configuration values
    PrintConfig,
    /// Truncate all database tables
    TruncateDb,
}
