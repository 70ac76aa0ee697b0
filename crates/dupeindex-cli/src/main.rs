mod commands;
mod logging;
mod progress;

use std::io::{self, Write};
use std::path::Path;
use std::process;

use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use dupeindex_core::hasher::HashCache;
use dupeindex_core::storage::Database;
use dupeindex_core::{tree, AppConfig, ScanEngine};
use progress::CliReporter;
use tracing::{error, info};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match dupeindex_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    let outcome = match args.command {
        Some(Commands::Scan { all }) => run_scan(&config, all),
        Some(Commands::Refresh) => run_refresh(&config),
        Some(Commands::Tree { path, all }) => run_tree(&config, &path, all),
        Some(Commands::CountHashCache) => run_count_hash_cache(&config),
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:?}", config);
            Ok(())
        }
        Some(Commands::TruncateDb) => run_truncate_db(&config),
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = outcome {
        error!("Error: {}", err);
        process::exit(1);
    }

    Ok(())
}

fn run_scan(config: &AppConfig, include_hidden: bool) -> Result<(), Box<dyn std::error::Error>> {
    if config.root_paths.is_empty() {
        return Err("no root_paths configured".into());
    }
    let engine = ScanEngine::new(config.clone()).with_hidden(include_hidden);
    let reporter = CliReporter::new();
    let result = engine.scan(&reporter)?;

    info!(
        "Scan: {}, Hash: {}, DB: {}",
        format!("{:.2}s", result.scan_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.hash_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.db_write_duration.as_secs_f64()).green(),
    );
    info!(
        "{} duplicate groups, {} files with duplicates, {} bytes wasted",
        format!("{}", result.duplicate_groups).red(),
        format!("{}", result.duplicate_files).red(),
        format!("{}", result.wasted_bytes).red(),
    );

    Ok(())
}

fn run_refresh(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let engine = ScanEngine::new(config.clone());
    let reporter = CliReporter::new();
    let result = engine.refresh(&reporter)?;

    println!("removed {} files from the database", result.removed);
    Ok(())
}

fn run_tree(
    config: &AppConfig,
    path: &str,
    include_hidden: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(&config.db_path)?;
    let entries = tree::duplicates_under(&db, path, include_hidden)?;

    let base = std::fs::canonicalize(path).unwrap_or_else(|_| Path::new(path).to_path_buf());
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for entry in &entries {
        let shown = Path::new(&entry.path)
            .strip_prefix(&base)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| entry.path.clone());
        writeln!(
            out,
            "{} {}",
            shown.bold(),
            format!("({} bytes, {} duplicates)", entry.file_size, entry.duplicates.len()).dimmed()
        )?;
        for dupe in &entry.duplicates {
            writeln!(out, "    {}", dupe.cyan())?;
        }
    }
    Ok(())
}

fn run_count_hash_cache(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("Counting content cache hash...");
    let cache = HashCache::open(&config.hash_cache_path)?;
    info!("Total keys in hash cache: {}", cache.count_keys()?);
    Ok(())
}

fn run_truncate_db(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    if !prompt_confirm(
        "Are you SURE you want to COMPLETELY DELETE the Database?",
        Some(false),
    )? {
        return Ok(());
    }
    let mut db = Database::open(&config.db_path)?;
    db.truncate_all()?;
    println!("All tables truncated");
    Ok(())
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
