use clap::Parser;
use kanline::cli::commands::Cli;
use kanline::cli::handlers;
use tracing_subscriber::EnvFilter;

fn main() {
    // Logs go to stderr so --json output stays clean; RUST_LOG=kanline=debug for detail
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kanline=warn")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = handlers::dispatch(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
