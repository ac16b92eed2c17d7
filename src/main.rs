//! `backupfiles`: incremental backup of a directory tree into a tar archive.

use std::path::{Path, PathBuf};
use std::process;

use chrono::DateTime;
use clap::Parser;
use log::LevelFilter;

use tar_backup::walk::THRESHOLD_FORMAT;
use tar_backup::{
    backup, default_destination, list, restore, BackupOptions, Listing, RestoreOptions, Result, Selection,
};

/// Back up files modified after a given time, or restore a backup
#[derive(Parser)]
#[command(name = "backupfiles")]
#[command(author, version, long_about = None)]
struct Cli {
    /// Archive to write (backup) or read (restore, list)
    #[arg(short = 'f', long = "file", value_name = "ARCHIVE")]
    file: PathBuf,

    /// Only back up files modified after this time ("YYYY-MM-DD HH:MM:SS"
    /// in UTC), or after the modification time of this file
    #[arg(short = 't', long = "time", value_name = "DATETIME|FILE")]
    time: Option<String>,

    /// Restore into this directory instead of the archive's name without
    /// its extension
    #[arg(short = 'C', long = "directory", value_name = "DEST", conflicts_with = "dir")]
    directory: Option<PathBuf>,

    /// List the archive contents instead of restoring
    #[arg(short = 'l', long = "list", conflicts_with_all = ["dir", "directory"])]
    list: bool,

    /// Increase log output (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory to back up; restores the archive when omitted
    dir: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(&cli) {
        log::error!("{}", err);
        eprintln!("Error: {}", err);
        process::exit(err.exit_code());
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    if cli.list {
        return run_list(cli);
    }
    match &cli.dir {
        Some(dir) => run_backup(cli, dir),
        None => run_restore(cli),
    }
}

fn run_backup(cli: &Cli, dir: &Path) -> Result<()> {
    let selection = match &cli.time {
        Some(time) => Selection::parse(time)?,
        None => Selection::all(),
    };

    println!("\nSearching for files in:\n{}", dir.display());
    println!("Modified after:\n{}\n", format_threshold(selection.threshold()));

    let options = BackupOptions::new(dir, &cli.file).selection(selection);
    let summary = backup(&options, |line| println!("{}", line))?;

    if summary.is_empty() {
        println!("\nNo files were modified after the given time.");
    }
    for (path, err) in &summary.skipped {
        eprintln!("Skipped {}: {}", path.display(), err);
    }
    println!("\n{} entries written to {}", summary.archived.len(), cli.file.display());
    Ok(())
}

fn run_restore(cli: &Cli) -> Result<()> {
    let destination = cli
        .directory
        .clone()
        .unwrap_or_else(|| default_destination(&cli.file));
    println!("\nRestoring {} into:\n{}\n", cli.file.display(), destination.display());

    let options = RestoreOptions::new(&cli.file, destination);
    let summary = restore(&options, |header| println!("{}", Listing::from_header(header)))?;
    println!(
        "\n{} files and {} directories restored ({} bytes)",
        summary.files, summary.directories, summary.bytes
    );
    Ok(())
}

fn run_list(cli: &Cli) -> Result<()> {
    let headers = list(&cli.file)?;
    for header in &headers {
        println!("{}", Listing::from_header(header));
    }
    println!("\nTotal: {} entries", headers.len());
    Ok(())
}

fn format_threshold(secs: i64) -> String {
    match DateTime::from_timestamp(secs, 0) {
        Some(dt) => dt.format(THRESHOLD_FORMAT).to_string(),
        None => secs.to_string(),
    }
}
