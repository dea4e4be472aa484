//! Serato to Rekordbox library converter
//!
//! Reads Serato crates, the `database V2` key column and Markers2 hot cues,
//! and writes a Rekordbox XML collection with one playlist per crate.

mod config;
mod discover;
mod tags;

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use serato_core::{to_xml_string, ConversionResult, CrateFile, Database, Reconciler, XmlOptions};

use config::Config;
use tags::FileTagReader;

#[derive(Parser)]
#[command(name = "serato2rb")]
#[command(about = "Convert Serato crates, cues and keys to Rekordbox XML")]
struct Cli {
    /// Serato library folder
    #[arg(long, default_value = "~/Music/_Serato_")]
    serato: PathBuf,

    /// Volume root that crate track paths are relative to
    #[arg(long, default_value = "/")]
    volume: PathBuf,

    /// Also write hot cues as memory cues
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    memory: bool,

    /// Serato database file (defaults to `<serato>/database V2`)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Output XML file
    #[arg(short, long, default_value = "Serato_Converted.xml")]
    output: PathBuf,

    /// Write a JSON report of the conversion
    #[arg(long)]
    report: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::new(
        &cli.serato,
        cli.database.as_deref(),
        &cli.volume,
        cli.output,
        cli.report,
        cli.memory,
    )
    .context("Failed to resolve volume root")?;

    info!("Serato library: {:?}", config.serato_dir);
    info!("Volume root: {:?}", config.volume_root);

    let result = run(&config)?;
    print_summary(&config, &result);

    Ok(())
}

/// Convert the library described by `config` and write the outputs
fn run(config: &Config) -> Result<ConversionResult> {
    if !config.serato_dir.is_dir() {
        bail!("Serato library folder not found: {:?}", config.serato_dir);
    }

    let database = Database::open(&config.database_path)
        .with_context(|| format!("Failed to read database {:?}", config.database_path))?;
    info!("Loaded {} tracks from database", database.len());

    let crate_paths = discover::find_crates(&config.serato_dir)
        .with_context(|| format!("Failed to scan {:?}", config.serato_dir))?;
    info!("Found {} crates", crate_paths.len());

    let crates = crate_paths.iter().filter_map(|path| match CrateFile::open(path) {
        Ok(crate_file) => Some(crate_file),
        Err(e) => {
            warn!("Skipping unreadable crate {:?}: {}", path, e);
            None
        }
    });

    let reader = FileTagReader;
    let reconciler = Reconciler::new(&database, &reader, &config.volume_root);
    let result = reconciler.convert(crates);

    let options = XmlOptions {
        copy_to_memory_cues: config.copy_to_memory_cues,
    };
    let xml = to_xml_string(&result, &options)?;
    fs::write(&config.output_path, xml)
        .with_context(|| format!("Failed to write {:?}", config.output_path))?;
    info!("Wrote {:?}", config.output_path);

    if let Some(report_path) = &config.report_path {
        let file = File::create(report_path)
            .with_context(|| format!("Failed to create report {:?}", report_path))?;
        result.write_report(BufWriter::new(file))?;
        info!("Wrote report {:?}", report_path);
    }

    Ok(result)
}

fn print_summary(config: &Config, result: &ConversionResult) {
    println!();
    println!("Converted {} tracks in {} playlists", result.track_count(), result.playlists.len());
    println!("Output: {}", config.output_path.display());

    if !result.failed.is_empty() {
        println!();
        println!("{} tracks could not be converted:", result.failed.len());
        for failed in &result.failed {
            println!("  {} ({})", failed.path, failed.reason);
        }
    }
}
