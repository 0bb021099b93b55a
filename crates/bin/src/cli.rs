//! CLI argument definitions for the Docbranch binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use docbranch::{DocId, StoreConfig};

use crate::output::OutputFormat;

/// Output format flag
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Format {
    /// Aligned tables
    Human,
    /// One JSON value per command
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Human => OutputFormat::Human,
            Format::Json => OutputFormat::Json,
        }
    }
}

/// Docbranch document store tool
#[derive(Parser, Debug)]
#[command(name = "docbranch")]
#[command(about = "Docbranch: branch, pull and merge document trees")]
#[command(version)]
pub struct Cli {
    /// Document file to operate on
    #[arg(short, long, default_value = "docbranch.json", env = "DOCBRANCH_FILE")]
    pub file: PathBuf,

    /// Output format
    #[arg(long, default_value = "human", global = true)]
    pub format: Format,

    /// Collection key for documents without a `layoutKey`
    #[arg(long, default_value = "data", env = "DOCBRANCH_LAYOUT_KEY")]
    pub layout_key: String,

    /// Suffix of the per-document annotation collection
    #[arg(long, default_value = "-annotations", env = "DOCBRANCH_ANNOTATIONS_SUFFIX")]
    pub annotations_suffix: String,

    /// Author recorded on documents created by this run
    #[arg(short, long, env = "DOCBRANCH_USER")]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            default_layout_key: self.layout_key.clone(),
            annotations_suffix: self.annotations_suffix.clone(),
            current_user: self.user.clone(),
            ..Default::default()
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List every document in the file
    List,
    /// Show one document's fields
    Show(DocArgs),
    /// Create a new document, optionally as a child of another
    New(NewArgs),
    /// Create a branch of a document
    Branch(DocArgs),
    /// Update a branch from its master
    Pull(DocArgs),
    /// Fold every branch of a master back into it
    Merge(DocArgs),
}

/// A command targeting a single document
#[derive(clap::Args, Debug)]
pub struct DocArgs {
    /// Document id
    pub id: DocId,
}

/// Arguments for the new command
#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Text fields to set, as key=value
    #[arg(short, long = "set", value_parser = parse_assignment)]
    pub fields: Vec<(String, String)>,

    /// Parent document; the new document is added to its layout collection
    #[arg(short, long)]
    pub parent: Option<DocId>,
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{s}'"))
}
