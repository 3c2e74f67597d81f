use adbreak::ad_config::AdScheduleConfig;
use adbreak::log::TracingLog;
use adbreak::sim::{self, SimOptions, Simulation};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "adbreak", about = "Ad break scheduler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the ad breaks a config file schedules
    Layout {
        /// Ad schedule JSON file
        config: PathBuf,
        /// Treat playback as resuming at this many seconds
        #[arg(long)]
        resume_at: Option<f64>,
    },
    /// Replay a JSON event script against a config
    Simulate {
        /// Ad schedule JSON file
        config: PathBuf,
        /// JSON array of script steps
        script: PathBuf,
        /// Register a bumper controller ahead of the postroll
        #[arg(long)]
        bumper: bool,
        /// Leave commanded breaks loading instead of playing them out
        #[arg(long)]
        manual_play: bool,
    },
}

fn load_config(path: &Path) -> AdScheduleConfig {
    match AdScheduleConfig::load(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Layout { config, resume_at } => {
            let mut config = load_config(&config);
            if let Some(t) = resume_at {
                config.play_ads_after_time = Some(t);
            }
            let breaks = config.ingest();
            if breaks.is_empty() {
                println!("No ad breaks configured.");
                return;
            }
            println!("{:<10} {:>10} {:>6}  STATUS", "KIND", "POSITION", "ADS");
            for b in &breaks {
                let status = if b.is_played() { "skipped" } else { "pending" };
                println!(
                    "{:<10} {:>10} {:>6}  {}",
                    b.kind().to_string(),
                    b.position(),
                    b.ads().len(),
                    status
                );
            }
        }
        Commands::Simulate {
            config,
            script,
            bumper,
            manual_play,
        } => {
            let config = load_config(&config);
            let steps = match sim::load_script(&script) {
                Ok(steps) => steps,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };
            let options = SimOptions {
                with_bumper: bumper,
                auto_play: !manual_play,
            };
            let mut simulation = Simulation::new(config, options, TracingLog);
            simulation.run(&steps);
            match serde_json::to_string_pretty(&simulation.report()) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}
