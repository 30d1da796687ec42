pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gacl")]
#[command(about = "Group-scoped device access control")]
pub struct Args {
    /// Path to the gacl config directory (defaults to ~/.gacl)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
