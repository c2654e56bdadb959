mod cli;
mod config;
mod controllers;
mod error;
mod logging;
mod model;
mod orchestrator;
mod pipelines;
#[cfg_attr(not(feature = "tui"), allow(dead_code))]
mod state;
mod storage;
mod text_summary;
#[cfg(feature = "tui")]
mod tui;
mod validate;

use clap::Parser;

#[tokio::main]
async fn main() {
    let args = cli::Cli::parse();

    // Blocking workers are not joined on shutdown: a generation still in flight
    // when the user quits must not keep the process alive.
    match cli::run(args).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Fatal error: {e:#}");
            std::process::exit(1);
        }
    }
}
