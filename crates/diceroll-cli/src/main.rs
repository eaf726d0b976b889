// ABOUTME: Command-line interface for the diceroll die-roll specification library.
// ABOUTME: Provides roll, explain, simulation and preset file commands with optional JSON output.

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use diceroll::preset::{remove_preset, upsert_preset};
use diceroll::{DieRollPreset, DieRoller, FastRng, PresetMetadata, StructuredResult};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "diceroll")]
#[command(about = "A die-roll specification parser and roller for TTRPGs")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Roll a die-roll specification
    Roll {
        /// Specification (e.g., "Attack=d20 + 5 | c19 | dc 15")
        spec: String,

        /// Seed the random source for a reproducible roll
        #[arg(long)]
        seed: Option<u64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Describe a specification without revealing a result
    Explain {
        /// Specification to describe
        spec: String,

        /// Notice appended to the description
        #[arg(long, default_value = "")]
        notice: String,
    },
    /// Simulate rolling an expression many times
    Sim {
        /// Dice expression (e.g., "4d6 best of 2 | min 8")
        expression: String,

        /// Number of trials to run
        #[arg(short, long, default_value = "10000")]
        n: usize,

        /// Seed the random source for a reproducible simulation
        #[arg(long)]
        seed: Option<u64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage a preset file
    Presets {
        #[command(subcommand)]
        command: PresetCommands,
    },
}

#[derive(Subcommand)]
enum PresetCommands {
    /// List the presets in a file
    List { file: PathBuf },
    /// Add or replace a preset, creating the file if needed
    Add {
        file: PathBuf,
        name: String,
        spec: String,

        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Remove a preset by name
    Remove { file: PathBuf, name: String },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Commands) -> diceroll::Result<()> {
    match command {
        Commands::Roll { spec, seed, json } => {
            let rng = seed.map_or_else(FastRng::new, FastRng::with_seed);
            let (title, results) = DieRoller::with_rng(rng).do_roll(&spec)?;
            if json {
                let output = serde_json::json!({ "title": title, "results": results });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_results(&title, &results);
            }
        }
        Commands::Explain { spec, notice } => {
            let (title, result) = DieRoller::new().explain_secret_roll(&spec, &notice)?;
            print_results(&title, std::slice::from_ref(&result));
        }
        Commands::Sim {
            expression,
            n,
            seed,
            json,
        } => {
            let result = match seed {
                Some(seed) => diceroll::simulate_seeded(&expression, n, seed)?,
                None => diceroll::simulate(&expression, n)?,
            };
            if json {
                print_sim_json(&result)?;
            } else {
                print_sim_histogram(&expression, &result);
            }
        }
        Commands::Presets { command } => run_presets(command)?,
    }
    Ok(())
}

fn run_presets(command: PresetCommands) -> diceroll::Result<()> {
    match command {
        PresetCommands::List { file } => {
            let (presets, meta) = diceroll::read_preset_file(&file)?;
            if !meta.comment.is_empty() {
                println!("# {}", meta.comment);
            }
            for preset in presets {
                if preset.description.is_empty() {
                    println!("{}: {}", preset.name, preset.spec);
                } else {
                    println!("{}: {}  ({})", preset.name, preset.spec, preset.description);
                }
            }
        }
        PresetCommands::Add {
            file,
            name,
            spec,
            description,
        } => {
            DieRoller::new().set_specification(&spec)?;
            let (mut presets, meta) = load_or_empty(&file)?;
            upsert_preset(&mut presets, DieRollPreset::new(name, description, spec));
            diceroll::write_preset_file(&file, &presets, &PresetMetadata::now(meta.comment))?;
        }
        PresetCommands::Remove { file, name } => {
            let (mut presets, meta) = diceroll::read_preset_file(&file)?;
            if !remove_preset(&mut presets, &name) {
                eprintln!("No preset named '{}'", name);
                std::process::exit(1);
            }
            diceroll::write_preset_file(&file, &presets, &PresetMetadata::now(meta.comment))?;
        }
    }
    Ok(())
}

fn load_or_empty(file: &Path) -> diceroll::Result<(Vec<DieRollPreset>, PresetMetadata)> {
    if file.exists() {
        diceroll::read_preset_file(file)
    } else {
        Ok((Vec::new(), PresetMetadata::default()))
    }
}

fn print_results(title: &str, results: &[StructuredResult]) {
    if !title.is_empty() {
        println!("{}:", title);
    }
    for result in results {
        println!("{}", result);
    }
}

fn print_sim_json(result: &diceroll::SimResult) -> diceroll::Result<()> {
    use serde_json::json;

    let output = json!({
        "n": result.n,
        "min": result.min,
        "max": result.max,
        "mean": result.mean,
        "std_dev": result.std_dev,
        "median": result.median(),
        "mode": result.mode(),
        "distribution": result.distribution,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_sim_histogram(expression: &str, result: &diceroll::SimResult) {
    println!("{} (n={})", expression, result.n);
    println!();

    let outcomes = result.sorted_outcomes();
    let max_count = outcomes.iter().map(|(_, c)| *c).max().unwrap_or(1);
    let max_bar_width = 40;

    for (value, count) in outcomes {
        let pct = (count as f64 / result.n as f64) * 100.0;
        let bar_width = (count as f64 / max_count as f64 * max_bar_width as f64) as usize;
        let bar: String = "█".repeat(bar_width);

        println!("{:>4}: {:40} {:5.1}%", value, bar, pct);
    }

    println!();
    println!(
        "mean: {:.2}, std: {:.2}, median: {:.1}",
        result.mean,
        result.std_dev,
        result.median()
    );
}
