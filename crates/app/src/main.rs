// CLI modules
mod args;
mod op;
mod ops;
mod state;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use args::Args;
use op::Op;
use ops::{Init, Round, Version};

command_enum! {
    (Init, Init),
    (Round, Round),
    (Version, Version),
}

/// Initialize logging and the panic handler.
/// Returns a guard that must be kept alive for the duration of the program.
fn init_logging(log_level: tracing::Level) -> tracing_appender::non_blocking::WorkerGuard {
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stdout_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(stdout_layer).init();
    register_panic_logger();

    stdout_guard
}

/// Registers a panic hook that logs panics using the `tracing` crate
fn register_panic_logger() {
    std::panic::set_hook(Box::new(|panic| match panic.location() {
        Some(loc) => {
            tracing::error!(
                message = %panic,
                panic.file = loc.file(),
                panic.line = loc.line(),
                panic.column = loc.column(),
            );
        }
        None => tracing::error!(message = %panic),
    }));
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let guard = init_logging(args.log_level);

    let ctx = op::OpContext::new(args.config_path);

    let code = match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };
    // flush buffered log lines before exiting
    drop(guard);
    std::process::exit(code);
}
