use std::env;
use std::path::PathBuf;

use anyhow::Context;
use rollcall_core::{RollcallConfig, Roster};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn")
    ).init();

    let config = RollcallConfig::load_default();

    println!("Model files:");
    for path in config.model_paths() {
        if path.exists() {
            println!("✓ Found: {}", path.display());
        } else {
            println!("✗ Not found: {}", path.display());
        }
    }

    let Some(roster_path) = env::args_os().nth(1).map(PathBuf::from) else {
        println!("Usage: roster-check <roster.csv>");
        return Ok(());
    };

    let roster = Roster::load(&roster_path)
        .with_context(|| format!("Failed to load roster {}", roster_path.display()))?;

    println!("Roster {}:", roster_path.display());
    println!("  - Entries: {}", roster.len());
    for entry in roster.entries() {
        println!("  - {:>5}  {}", entry.id, entry.name);
    }

    let duplicates = roster.duplicate_ids();
    if !duplicates.is_empty() {
        println!("  - Duplicate ids (first entry wins): {:?}", duplicates);
    }

    Ok(())
}
