mod adapter;
mod artifacts;
mod config;
mod error;
mod force_data;
mod generator;
mod geometry;
mod input;
mod locator;
mod navigator;
mod resolver;
mod roster;
mod settings;
mod variant;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use crate::config::ScenarioConfig;
use crate::locator::{MatchMode, TesseractCli, TextLocator};
use crate::settings::{Overrides, Settings};
use crate::variant::GameVariant;

#[derive(Parser, Debug)]
#[command(
    name = "tac-scenario",
    version,
    about = "Generate randomized orders of battle and click them into the scenario editor"
)]
struct Cli {
    /// Debug-level logging (RUST_LOG still wins when set)
    #[arg(long, short, global = true, action = ArgAction::SetTrue)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate rosters from a scenario config and dump them as JSON
    Generate(GenerateArgs),
    /// Generate rosters and enter them through the game's unit editor
    Populate(PopulateArgs),
    /// Run OCR over an image and report where a label was found
    Locate(LocateArgs),
    /// Print the supported game variants and their editor labels
    Variants,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Scenario config YAML
    #[arg(long)]
    config: PathBuf,
    /// Seed for reproducible rosters
    #[arg(long)]
    seed: Option<u64>,
    /// Directory for roster dumps and screenshots (default: $TSG_DEBUG_DIR or ./debug)
    #[arg(long)]
    debug_dir: Option<PathBuf>,
    /// Directory holding per-game force data tables (default: $TSG_FORCE_DATA_DIR or ./force_data)
    #[arg(long)]
    force_data_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    run: RunArgs,
    /// Print the generated rosters as JSON to stdout
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Args, Debug)]
struct PopulateArgs {
    #[command(flatten)]
    run: RunArgs,
    /// Wait before the first capture so the game window can be focused
    #[arg(long)]
    startup_delay_ms: Option<u64>,
    /// Wait after each click for the UI to settle
    #[arg(long)]
    settle_ms: Option<u64>,
    /// Do not keep a PNG of every capture under <debug-dir>/screenshots
    #[arg(long, action = ArgAction::SetTrue)]
    no_screenshots: bool,
    /// Save each clicked capture with the target outlined under <debug-dir>/clicks
    #[arg(long, action = ArgAction::SetTrue)]
    annotate_clicks: bool,
}

#[derive(Args, Debug)]
struct LocateArgs {
    /// Screenshot to scan
    image: PathBuf,
    /// Label text to look for
    text: String,
    /// Report the top N candidates instead of the single best match
    #[arg(long)]
    ranked: Option<usize>,
    /// Print detections as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Generate(args) => command_generate(args),
        Commands::Populate(args) => command_populate(args),
        Commands::Locate(args) => command_locate(args),
        Commands::Variants => command_variants(),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: &Path) -> Result<ScenarioConfig> {
    ScenarioConfig::load(path)
        .with_context(|| format!("failed to load scenario config {}", path.display()))
}

fn command_generate(args: GenerateArgs) -> Result<()> {
    let config = load_config(&args.run.config)?;
    let settings = Settings::resolve(Overrides {
        debug_dir: args.run.debug_dir,
        force_data_dir: args.run.force_data_dir,
        seed: args.run.seed,
        ..Overrides::default()
    });
    let rosters = adapter::generate_rosters(&config, &settings)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rosters)?);
        return Ok(());
    }
    for roster in &rosters {
        println!("{}: {} units", roster.army, roster.unit_count());
        for nation in &roster.nations {
            for wave in &nation.waves {
                for division in &wave.divisions {
                    for group in &division.unit_types {
                        for unit in &group.units {
                            println!(
                                "  {} / {} / {}{} / {}",
                                nation.name,
                                wave.name,
                                division
                                    .name
                                    .as_deref()
                                    .map(|d| format!("{d} / "))
                                    .unwrap_or_default(),
                                group.unit_type,
                                unit.name
                            );
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

fn command_populate(args: PopulateArgs) -> Result<()> {
    let config = load_config(&args.run.config)?;
    let settings = Settings::resolve(Overrides {
        debug_dir: args.run.debug_dir,
        force_data_dir: args.run.force_data_dir,
        settle_ms: args.settle_ms,
        startup_delay_ms: args.startup_delay_ms,
        no_screenshots: args.no_screenshots,
        annotate_clicks: args.annotate_clicks,
        seed: args.run.seed,
    });
    let summary = adapter::generate_and_populate(&config, &settings)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn command_locate(args: LocateArgs) -> Result<()> {
    if args.text.trim().is_empty() {
        bail!("locate text must not be empty");
    }
    let image = image::open(&args.image)
        .with_context(|| format!("failed to open image: {}", args.image.display()))?;
    let mode = match args.ranked {
        Some(0) => bail!("--ranked must be at least 1"),
        Some(n) => MatchMode::Ranked(n),
        None => MatchMode::Best,
    };
    let mut locator = TextLocator::new(TesseractCli::default());
    let detections = locator.locate(&args.text, &image, mode)?;

    if args.json {
        let rows: Vec<_> = detections
            .iter()
            .map(|d| {
                let (x, y) = d.bbox.center();
                json!({
                    "text": d.text,
                    "score": d.score,
                    "center": [x, y],
                    "bbox": d.bbox,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if detections.is_empty() {
        bail!("no text recognized in {}", args.image.display());
    }
    for d in &detections {
        let (x, y) = d.bbox.center();
        println!(
            "{:>3}  ({x}, {y})  {}x{}  {}",
            d.score,
            d.bbox.width(),
            d.bbox.height(),
            d.text
        );
    }
    Ok(())
}

fn command_variants() -> Result<()> {
    let profiles: Vec<_> = GameVariant::ALL.iter().map(|v| v.profile()).collect();
    println!("{}", serde_json::to_string_pretty(&profiles)?);
    Ok(())
}
