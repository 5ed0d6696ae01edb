use anyhow::Result;
use clap::Parser;
use http_observe::{cli::Cli, server};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber (stderr; `--debug` forces TRACE)
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.debug);

    let config = args.into_config()?;
    server::serve(config).await
}
