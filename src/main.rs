use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use coup_ai::config::{Config, DelayConfig};
use coup_ai::{ConfigError, Role, Seat, Settings, Table, Variant};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum VariantArg {
    Standard,
    Reformation,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ExchangeArg {
    Ambassador,
    Inquisitor,
}

/// Plays bot-only matches on a local table and reports who won.
#[derive(Debug, Parser)]
#[command(name = "coup-ai", version)]
struct Args {
    #[arg(long, default_value_t = 10)]
    matches: usize,
    #[arg(long, default_value_t = 4)]
    players: usize,
    /// seats, counted from 0, played by the search player instead of the heuristic one
    #[arg(long, value_delimiter = ',')]
    search_seats: Vec<usize>,
    /// json config file, overridden by COUP_AI_* variables
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum, default_value = "standard")]
    variant: VariantArg,
    #[arg(long, value_enum, default_value = "ambassador")]
    exchange_role: ExchangeArg,
    #[arg(long)]
    depth: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    /// keep the heuristic player's thinking delay
    #[arg(long)]
    realtime: bool,
    /// write one row per match to this file, or `-` for stdout
    #[arg(long)]
    csv: Option<PathBuf>,
    #[arg(long, default_value = "info")]
    log: String,
}

#[derive(Debug, Serialize)]
struct MatchRow {
    index: usize,
    seed: u64,
    players: usize,
    winner: Option<usize>,
    winner_kind: Option<&'static str>,
    steps: usize,
    commands: usize,
    rejected: usize,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "coup-ai failed");
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &Args) -> Result<Config, ConfigError> {
    let mut config = match &args.config {
        Some(path) => Config::from_path(path)?,
        None => Config::from_env()?,
    };
    if let Some(depth) = args.depth {
        config.search.depth = depth;
    }
    if !args.realtime {
        config.policy.delay = DelayConfig::none();
    }
    config.validate()
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(args)?;
    let settings = Settings {
        variant: match args.variant {
            VariantArg::Standard => Variant::Standard,
            VariantArg::Reformation => Variant::Reformation,
        },
        exchange_role: match args.exchange_role {
            ExchangeArg::Ambassador => Role::Ambassador,
            ExchangeArg::Inquisitor => Role::Inquisitor,
        },
        ..Settings::default()
    };

    let mut writer = match &args.csv {
        Some(path) if path.as_os_str() == "-" => Some(csv::Writer::from_writer(Box::new(io::stdout()) as Box<dyn io::Write>)),
        Some(path) => Some(csv::Writer::from_writer(Box::new(File::create(path)?) as Box<dyn io::Write>)),
        None => None,
    };

    let base_seed = args.seed.or(config.policy.seed).unwrap_or_else(rand::random);
    let mut wins = vec![0usize; args.players];

    for index in 0..args.matches {
        let seed = base_seed.wrapping_add(index as u64);
        let seats = (0..args.players)
            .map(|idx| {
                let salt = seed.wrapping_mul(31).wrapping_add(idx as u64);
                if args.search_seats.contains(&idx) {
                    let mut search = config.search.clone();
                    search.seed = Some(search.seed.unwrap_or(0) ^ salt);
                    Seat::search(search)
                } else {
                    let mut policy = config.policy.clone();
                    policy.seed = Some(policy.seed.unwrap_or(0) ^ salt);
                    Seat::heuristic(policy)
                }
            })
            .collect();

        let mut table = Table::new(seats, settings, seed)?;
        let result = table.play();
        if let Some(winner) = result.winner {
            wins[winner] += 1;
        }

        if let Some(writer) = writer.as_mut() {
            writer.serialize(MatchRow {
                index,
                seed,
                players: args.players,
                winner: result.winner,
                winner_kind: result.winner.map(|winner| table.seats()[winner].kind()),
                steps: result.steps,
                commands: result.commands,
                rejected: result.rejected,
            })?;
        }
    }

    if let Some(writer) = writer.as_mut() {
        writer.flush()?;
    }
    for (seat, count) in wins.iter().enumerate() {
        let kind = if args.search_seats.contains(&seat) { "search" } else { "heuristic" };
        info!(seat, kind, wins = count, matches = args.matches, "seat summary");
    }
    Ok(())
}
