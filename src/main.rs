mod cli;

use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use gallery::prelude::*;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, Toggle};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::load(cli.settings.as_deref())?;
    if let Some(dir) = cli.data_dir.clone() {
        settings.data_dir = Some(dir);
    }
    let gallery = Gallery::open(&settings).await.context("opening gallery store")?;
    let (nsfw, admin, json) = (cli.nsfw, cli.admin, cli.json);

    match cli.command {
        Commands::Random => print_entry(&gallery.pick_random(nsfw)?, json)?,
        Commands::Tag { tag } => print_entry(&gallery.pick_random_by_tag(&tag, nsfw)?, json)?,
        Commands::Show { title_or_id } => print_entry(&gallery.show(&title_or_id, nsfw)?, json)?,
        Commands::List => {
            let listing = gallery.list(nsfw);
            if json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else if listing.items.is_empty() {
                println!("No gallery entries available yet.");
            } else {
                for item in &listing.items {
                    let e = &item.entry;
                    println!("{}. {} • {} • {}", item.index, e.title, e.media_type, e.first_tag().unwrap_or("-"));
                }
                println!("(generation {})", listing.generation);
            }
        }
        Commands::Diag { recent, top } => {
            let diag = gallery.diagnostics(recent);
            if json {
                println!("{}", serde_json::to_string_pretty(&diag)?);
            } else {
                println!("Total entries: {}", diag.total);
                println!("NSFW entries: {}", diag.nsfw);
                println!("Images: {}", diag.count(MediaType::Image));
                println!("Videos: {}", diag.count(MediaType::Video));
                println!("Top tags:");
                let tags = diag.top_tags(top);
                if tags.is_empty() {
                    println!("  (no tags)");
                }
                for (tag, count) in tags {
                    println!("  {tag}: {count}");
                }
                println!("Last added:");
                for e in &diag.recent {
                    let marker = if e.nsfw && !nsfw { " [nsfw]" } else { "" };
                    println!("  • {}{} ({})", e.title, marker, e.added_at.format("%Y-%m-%d %H:%M UTC"));
                }
            }
        }
        Commands::Suggest { fragment } => {
            for title in gallery.suggest_titles(&fragment, nsfw) {
                println!("{title}");
            }
        }
        Commands::Add { title, url, tags, mark_nsfw, caption, author, pinned } => {
            let mut candidate = NewEntry::new(title, url).tags(tags).nsfw(mark_nsfw).pinned(pinned);
            candidate.caption = caption;
            candidate.author = author;
            let entry = gallery.add(candidate, admin).await?;
            println!("Stored {:?} as {} ({})", entry.title, entry.media_type, entry.id);
        }
        Commands::Remove { title, index, generation } => {
            let selector = cli::remove_selector(title, index, generation)?;
            let removed = gallery.remove(selector, admin).await?;
            println!("Removed {:?} ({})", removed.title, removed.url);
        }
        Commands::Reload => {
            let count = gallery.reload(admin).await?;
            println!("Reloaded {count} entries from disk.");
        }
        Commands::Import { file } => {
            let raw = fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let candidates: Vec<NewEntry> =
                serde_json::from_str(&raw).with_context(|| format!("parsing {}", file.display()))?;
            let report = gallery.import(candidates, admin).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "Added {} new item(s), skipped {} duplicate(s), rejected {}.",
                    report.added.len(),
                    report.duplicates.len(),
                    report.rejected.len()
                );
                for r in &report.rejected {
                    println!("  rejected {:?} ({}): {}", r.title, r.url, r.error);
                }
            }
        }
        Commands::Autopost { state } => {
            let cfg = match state {
                Some(t) => gallery.set_autopost(matches!(t, Toggle::On), admin).await?,
                None => gallery.config().await?,
            };
            println!("Autopost is {}.", if cfg.enabled { "enabled" } else { "disabled" });
        }
    }
    Ok(())
}

fn print_entry(entry: &Entry, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entry)?);
        return Ok(());
    }
    println!("{}", entry.title);
    println!("  {} • {}", entry.media_type, entry.url);
    if !entry.tags.is_empty() {
        println!("  tags: {}", entry.tags.iter().cloned().collect::<Vec<_>>().join(", "));
    }
    if let Some(caption) = &entry.caption {
        println!("  {caption}");
    }
    if let Some(author) = &entry.author {
        println!("  by {author}");
    }
    if entry.pinned {
        println!("  pinned");
    }
    Ok(())
}
