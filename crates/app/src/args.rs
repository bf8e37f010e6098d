pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sealbatch")]
#[command(about = "Batched encrypted contributions with oracle-reconciled decryption")]
pub struct Args {
    /// Path to the sealbatch config directory (defaults to ~/.sealbatch)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    /// Default log level, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: crate::Command,
}
