mod args;
mod logging;
mod op;
mod ops;
mod state;

use args::Args;
use clap::{Parser, Subcommand};
use op::Op;
use ops::{Device, Group, Init, Version};

command_enum! {
    (Init, Init),
    (Version, Version),
    (Device, Device),
    (Group, Group),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // fall back to defaults until `gacl init` has written a config
    let config = state::AppState::load(args.config_path.clone())
        .map(|state| state.config)
        .unwrap_or_default();
    let guards = match logging::init_logging(&config) {
        Ok(guards) => guards,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {:#}", e);
            std::process::exit(1);
        }
    };

    let ctx = op::OpContext::new(args.config_path);

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("Error: {}", e);
            // flush the log writers before exiting
            drop(guards);
            std::process::exit(1);
        }
    }
}
