use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Offline tools for dm-era metadata
#[derive(Parser, Debug)]
#[command(name = "era", version, about = "dm-era metadata tools")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// List blocks written since an era (XML block list)
    Invalidate {
        /// Threshold era: blocks written in this era or later are listed
        #[arg(short = 'w', long)]
        written_since: Option<u32>,
        /// Read the metadata snapshot instead of the live root
        #[arg(short = 'm', long)]
        metadata_snapshot: bool,
        /// Output file ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<String>,
        /// Metadata device or file
        input: Option<PathBuf>,
    },
    /// Rebuild metadata from an XML description
    Restore {
        /// Input XML description
        #[arg(short = 'i', long)]
        input: Option<PathBuf>,
        /// Output metadata device or file (must exist)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
        /// Suppress progress output
        #[arg(short = 'q', long)]
        quiet: bool,
    },
    /// Dump metadata as an XML description
    Dump {
        /// Dump the metadata snapshot instead of the live root
        #[arg(short = 'm', long)]
        metadata_snapshot: bool,
        /// Output file ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<String>,
        /// Metadata device or file
        input: Option<PathBuf>,
    },
    /// Check metadata for damage
    Check {
        /// Only the exit code, no report
        #[arg(short = 'q', long)]
        quiet: bool,
        /// Validate the superblock and stop
        #[arg(long)]
        super_block_only: bool,
        /// Print a JSON report on stdout
        #[arg(long)]
        json: bool,
        /// Metadata device or file
        input: Option<PathBuf>,
    },
}
