use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use gallery::mutation::Selector;

/// Developer CLI over a local gallery store
#[derive(Parser)]
#[command(name = "gallery")]
#[command(about = "Query and administer a curated media gallery", long_about = None)]
pub struct Cli {
    /// Directory holding gallery.json and config.json
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Settings file (defaults to gallery.toml in the config dir)
    #[arg(long, global = true, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Run queries as an NSFW-capable context
    #[arg(long, global = true)]
    pub nsfw: bool,

    /// Run as an admin (required for add/remove/reload/import/autopost)
    #[arg(long, global = true)]
    pub admin: bool,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show a random entry
    Random,
    /// Show a random entry carrying a tag
    Tag {
        tag: String,
    },
    /// Show an entry by title or id
    Show {
        title_or_id: String,
    },
    /// List entries with their positions
    List,
    /// Pool diagnostics
    Diag {
        /// Number of recent entries to include
        #[arg(short = 'n', long)]
        recent: Option<usize>,
        /// Number of top tags to print
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Suggest titles containing a fragment
    Suggest {
        fragment: String,
    },
    /// Add an entry
    Add {
        title: String,
        url: String,
        /// Comma-separated tags
        #[arg(long, default_value = "")]
        tags: String,
        /// Flag the entry as NSFW
        #[arg(long)]
        mark_nsfw: bool,
        #[arg(long)]
        caption: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        pinned: bool,
    },
    /// Remove an entry by unique title or by listed position
    #[command(group(ArgGroup::new("target").required(true).args(["title", "index"])))]
    Remove {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        index: Option<usize>,
        /// Generation printed by `list`; rejects the removal if the pool changed since
        #[arg(long, requires = "index", conflicts_with = "title")]
        generation: Option<u64>,
    },
    /// Reload entries from disk
    Reload,
    /// Bulk import entries from a JSON array of candidates
    Import {
        file: PathBuf,
    },
    /// Show or set the autopost flag
    Autopost {
        state: Option<Toggle>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

/// Turn `remove` flags into a selector. A generation only applies to an index.
pub fn remove_selector(title: Option<String>, index: Option<usize>, generation: Option<u64>) -> Result<Selector> {
    match (title, index, generation) {
        (Some(_), _, Some(_)) => bail!("--generation only applies to --index"),
        (Some(t), None, None) => Ok(Selector::title(t)),
        (None, Some(position), generation) => Ok(Selector::Index { position, generation }),
        (Some(_), Some(_), None) => bail!("provide either --title or --index, not both"),
        (None, None, _) => bail!("provide --title or --index"),
    }
}
