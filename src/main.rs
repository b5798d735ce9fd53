use clap::Parser;
use tracing_subscriber::EnvFilter;

use jintel_cli::cli;

fn init_tracing() {
    // Logs go to stderr so piped output stays clean.
    let filter = EnvFilter::try_from_env("JINTEL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = cli::Cli::parse();
    match cli::run(cli).await {
        Ok(output) => println!("{output}"),
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(1);
        }
    }
}
