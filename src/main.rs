use clap::Parser;
use greenbro::config::{default_config_path, load_config, Config};
use greenbro::country_normalizer::CountryNormalizer;
use greenbro::csv_manager::open_data_file;
use greenbro::dashboard::{run_dashboard, Dashboard};
use greenbro::error::Result;
use greenbro::project_loader::Dataset;
use greenbro::user_interaction::print_insight;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::prelude::*;

/// Sniff out greenwashing anomalies in carbon credit project data.
#[derive(Parser, Debug)]
#[command(name = "greenbro", version, about)]
struct Args {
    /// A .csv, .xls or .xlsx file. Without one you get a picker over the data directory.
    data_file: Option<PathBuf>,

    /// Config file (default: ~/Desktop/csv_db/greenbro.config)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    // Logs go to stderr so they never tangle with the dashboard.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    println!(
        r#"
   ____ ____  _____ _____ _   _ ____  ____   ___
  / ___|  _ \| ____| ____| \ | | __ )|  _ \ / _ \
 | |  _| |_) |  _| |  _| |  \| |  _ \| |_) | | | |
 | |_| |  _ <| |___| |___| |\  | |_) |  _ <| |_| |
  \____|_| \_\_____|_____|_| \_|____/|_| \_\\___/

        greenwashing anomalies, by BRO v{}
"#,
        env!("CARGO_PKG_VERSION")
    );

    let config_path = args.config.unwrap_or_else(default_config_path);
    match run(args.data_file, &config_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "greenbro stopped");
            print_insight(&format!("Bummer, bro: {}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(data_file: Option<PathBuf>, config_path: &Path) -> Result<()> {
    let config: Config = load_config(config_path)?;

    let registry = config.country_registry()?;
    let world = config.world_countries()?;
    let normalizer = CountryNormalizer::new(Box::new(registry));

    let data_file = match data_file {
        Some(path) => path,
        None => match open_data_file(&config.data_dir()) {
            Some(path) => path,
            None => return Ok(()),
        },
    };

    let dataset = Dataset::load(&data_file)?;
    let mut dashboard = Dashboard::new(dataset, normalizer, &world, config.render_options());
    run_dashboard(&mut dashboard, config_path);
    Ok(())
}
