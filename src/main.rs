use clap::Parser;
use log::{error, info};
use semilagrange::ForecastConfig;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "stratoflow")]
#[command(about = "Roll out the semi-Lagrangian forecaster on a synthetic global state")]
struct Cli {
    /// TOML config; built-in defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Forecast steps to roll out
    #[arg(long, default_value_t = 4)]
    steps: usize,

    /// Override the ensemble size (enables the variational predictor when > 1)
    #[arg(long)]
    members: Option<usize>,

    /// Write the effective config to this path and exit
    #[arg(long)]
    write_config: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match ForecastConfig::load_from_file(&path.to_string_lossy()) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load config {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => ForecastConfig::default(),
    };
    if let Some(members) = cli.members {
        config.ensemble.members = members;
        config.ensemble.enable = members > 1;
    }

    if let Some(path) = &cli.write_config {
        if let Err(e) = config.save_to_file(&path.to_string_lossy()) {
            error!("Failed to write config {}: {}", path.display(), e);
            std::process::exit(1);
        }
        info!("Config written to {}", path.display());
        return;
    }

    match stratoflow::run(&config, cli.steps) {
        Ok(reports) => {
            let unstable = reports.iter().filter(|r| !r.stats.is_finite()).count();
            if unstable > 0 {
                error!("{} of {} steps produced non-finite values", unstable, reports.len());
                std::process::exit(2);
            }
            info!("Forecast finished after {} steps", reports.len());
        }
        Err(e) => {
            error!("Forecast failed: {}", e);
            std::process::exit(1);
        }
    }
}
