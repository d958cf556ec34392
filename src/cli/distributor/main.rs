mod commands;
mod config;
mod devnet;
mod types;

use std::fs;
use std::path::PathBuf;

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use commands::{DistributorCommands, Error};
use config::Config;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let matches = App::new("reward-distributor")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Compute worker rewards and settle them in Merkle-committed batches")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("Settings file, defaults to the user config directory")
                .takes_value(true)
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("devnet")
                .alias("run")
                .about("Run distributors against a local in-memory ledger")
                .arg(
                    Arg::with_name("epochs")
                        .long("epochs")
                        .value_name("N")
                        .help("Stop once N epochs are settled")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("compute")
                .about("Compute rewards, batches and proofs from a metrics file")
                .arg(
                    Arg::with_name("input")
                        .help("JSON file with the range, network parameters and worker metrics")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::with_name("batch-size")
                        .long("batch-size")
                        .value_name("SIZE")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("output")
                        .short("o")
                        .long("output")
                        .value_name("FILE")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("verify-proof")
                .about("Check a batch leaf against a Merkle root")
                .arg(Arg::with_name("root").long("root").takes_value(true).required(true))
                .arg(Arg::with_name("leaf").long("leaf").takes_value(true).required(true))
                .arg(
                    Arg::with_name("proof")
                        .long("proof")
                        .help("Comma separated sibling hashes")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("init-config")
                .about("Write the default settings file")
                .arg(Arg::with_name("force").long("force").help("Overwrite an existing file")),
        )
        .get_matches();

    if let Err(e) = run(&matches).await {
        error!(error = %e, "command failed");
        std::process::exit(1);
    }
}

async fn run(matches: &ArgMatches<'_>) -> Result<(), Error> {
    match matches.subcommand() {
        ("init-config", Some(sub)) => {
            let path = config_path(matches, sub).unwrap_or_else(Config::default_path);
            let path = DistributorCommands::init_config(path, sub.is_present("force"))?;
            println!("Wrote default settings to {}", path.display());
        }
        ("verify-proof", Some(sub)) => {
            let valid = DistributorCommands::verify_proof(
                sub.value_of("root").unwrap_or_default(),
                sub.value_of("leaf").unwrap_or_default(),
                sub.value_of("proof").unwrap_or_default(),
            )?;
            if !valid {
                return Err(Error::InvalidInput("proof does not verify against the root".to_string()));
            }
            println!("valid");
        }
        ("compute", Some(sub)) => {
            let mut config = load_config(matches, sub)?;
            if let Some(size) = sub.value_of("batch-size") {
                config.settings.batching.batch_size = size
                    .parse()
                    .map_err(|_| Error::InvalidInput(format!("invalid batch size {size:?}")))?;
                config.settings.check()?;
            }
            let input = PathBuf::from(sub.value_of("input").unwrap_or_default());
            let output = DistributorCommands::new(config).compute_file(&input)?;
            let json = serde_json::to_string_pretty(&output)?;
            match sub.value_of("output") {
                Some(path) => fs::write(path, json)?,
                None => println!("{json}"),
            }
        }
        ("devnet", Some(sub)) => {
            let config = load_config(matches, sub)?;
            let epochs = match sub.value_of("epochs") {
                Some(n) => Some(
                    n.parse::<u64>()
                        .map_err(|_| Error::InvalidInput(format!("invalid epoch count {n:?}")))?,
                ),
                None => None,
            };
            let report = DistributorCommands::new(config).devnet(epochs).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => println!("{}", matches.usage()),
    }
    Ok(())
}

fn config_path(matches: &ArgMatches<'_>, sub: &ArgMatches<'_>) -> Option<PathBuf> {
    sub.value_of("config")
        .or_else(|| matches.value_of("config"))
        .map(PathBuf::from)
}

fn load_config(matches: &ArgMatches<'_>, sub: &ArgMatches<'_>) -> Result<Config, Error> {
    match config_path(matches, sub) {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}
