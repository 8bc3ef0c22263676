//! CLI module for finrag.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// finrag - Financial document question answering
///
/// Upload PDF or image reports, index them with a vision model and ask
/// questions about them through a tool-using agent.
#[derive(Parser, Debug)]
#[command(name = "finrag")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "FINRAG_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API used by the chat frontend
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Extract and index a PDF or image file
    Ingest {
        /// Path to the PDF or image
        file: String,

        /// Only process the first N pages of a PDF
        #[arg(long)]
        pages: Option<usize>,
    },

    /// Ask the agent a question about the indexed documents
    Ask {
        /// The question to ask
        question: String,

        /// Print the full message trace as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search the indexed documents without the agent
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// Minimum similarity score
        #[arg(short, long)]
        min_score: Option<f32>,

        /// Show only source, page and summary for each result
        #[arg(long)]
        brief: bool,
    },

    /// List indexed documents
    List,

    /// Remove a document from the index
    Delete {
        /// Source file name as shown by `finrag list`
        source: String,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
