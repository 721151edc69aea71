//! Parses the command line arguments and runs what they ask for.
//!
//! Basic usage for driving the GPT network for 20 time units with logging on:
//!
//! ```cargo run -- --model gpt --time-max 20 --log```
//!
//! Parameter files can be given several times and are driven concurrently:
//!
//! ```cargo run -- --params params/gpt.json --params params/echo.json```
//!
//! Coupled networks can also be described in JSON:
//!
//! ```cargo run -- --network params/gpt_network.json```

use crate::{
    models,
    session::{run_sessions, SessionRequest},
};
use clap::Parser;
use simhub_core::{Registry, Time};
use std::{
    fs::{create_dir_all, read_to_string, OpenOptions},
    path::PathBuf,
    sync::Arc,
};
use tracing_subscriber::FmtSubscriber;

/// Stores the different command line arguments.
#[derive(Parser)]
#[command(version, about = "Hosts and drives discrete-event simulation models")]
struct Args {
    ///Logging flag. Used to turn logging on or off.
    #[arg(short, long)]
    log: bool,
    ///Prints the names of the registered models
    #[arg(long)]
    list: bool,
    ///Prints a model's metadata as a parameter document
    #[arg(short, long, value_name = "NAME")]
    info: Option<String>,
    ///Drives a registered model with its default parameters
    #[arg(short, long, value_name = "NAME")]
    model: Vec<String>,
    ///Drives the model named by a parameter file
    #[arg(short, long, value_name = "FILE")]
    params: Vec<PathBuf>,
    ///Drives the coupled network described by a network file
    #[arg(short, long, value_name = "FILE")]
    network: Vec<PathBuf>,
    ///Bounds every session, overriding the parameter files
    #[arg(short, long)]
    time_max: Option<Time>,
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Could not open the log file: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Parses command line arguments and runs the requested sessions.
/// Without arguments, the GPT network is driven with its defaults.
pub async fn run_from_arguments() {
    let cli = Args::parse();
    // Capture log flag for turning logging on or off
    if cli.log {
        if let Err(e) = initialize_logging() {
            eprintln!("{e}");
        }
    }

    let registry = Registry::new();
    models::register_all(&registry);
    let registry = Arc::new(registry);

    if cli.list {
        for name in registry.get_model_list() {
            println!("{name}");
        }
        for name in registry.get_catalog_list() {
            println!("{name} (catalog)");
        }
    }
    if let Some(name) = &cli.info {
        println!("{}", registry.get_model_info_json(name));
    }

    let mut requests: Vec<SessionRequest> = cli.model.iter().map(SessionRequest::model).collect();
    for path in &cli.params {
        match read_to_string(path) {
            Ok(document) => requests.push(SessionRequest::parameters(document)),
            Err(e) => eprintln!("Could not read \'{}\': {e}", path.display()),
        }
    }
    for path in &cli.network {
        match read_to_string(path) {
            Ok(document) => requests.push(SessionRequest::network(document)),
            Err(e) => eprintln!("Could not read \'{}\': {e}", path.display()),
        }
    }
    if requests.is_empty()
        && !cli.list
        && cli.info.is_none()
        && cli.params.is_empty()
        && cli.network.is_empty()
    {
        requests.push(SessionRequest::model(models::gpt::NAME));
    }
    if let Some(time_max) = cli.time_max {
        requests = requests
            .into_iter()
            .map(|request| request.time_max(time_max))
            .collect();
    }

    for result in run_sessions(registry.clone(), requests).await {
        match result.map(|report| serde_json::to_string_pretty(&report)) {
            Ok(Ok(report)) => println!("{report}"),
            Ok(Err(e)) => eprintln!("Could not print session report: {e}"),
            Err(e) => eprintln!("Session failed: {e}"),
        }
    }
    registry.shutdown();
}

/// Installs a subscriber writing JSON lines to a log file in `./logs`.
/// Only should be called once, when the process starts.
fn initialize_logging() -> Result<(), LoggingError> {
    let main_path = "./logs";
    create_dir_all(main_path)?;
    let file_path = format!(
        "{}/debug-{}.log",
        main_path,
        chrono::offset::Local::now().format("%y-%m-%d_%H-%M-%S")
    );
    let file = OpenOptions::new()
        .write(true)
        .append(true)
        .create(true)
        .open(file_path)?;
    let subscriber = FmtSubscriber::builder()
        .with_writer(Arc::new(file))
        .json()
        .finish();
    // set the global default so all events/logs go to the same subscriber and
    // subsequently the same file
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn arguments_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_repeated_flags() {
        let args = Args::parse_from([
            "simhub", "-m", "gpt", "--model", "Echo", "-p", "a.json", "--time-max", "7.5", "--list",
            "-n", "net.json",
        ]);
        assert_eq!(args.model, vec!["gpt", "Echo"]);
        assert_eq!(args.params, vec![PathBuf::from("a.json")]);
        assert_eq!(args.network, vec![PathBuf::from("net.json")]);
        assert_eq!(args.time_max, Some(7.5));
        assert!(args.list);
        assert!(!args.log);
        assert!(args.info.is_none());
    }
}
