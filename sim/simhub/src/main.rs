use simhub::cli::run_from_arguments;
use std::env;

/// Without arguments, main drives the GPT network
#[tokio::main]
async fn main() {
    println!("SimHub v{}", env!("CARGO_PKG_VERSION"));
    run_from_arguments().await;
    println!("Done");
}
