use clap::Parser;
use htmlshot::cdp::CdpLauncher;
use htmlshot::cli::Cli;
use htmlshot::server::{self, AppState};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        log::error!("htmlshot failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> htmlshot::Result<()> {
    let config = cli.engine_config()?;
    log::info!(
        "wait timeout {}ms, settle {}ms, sandbox {}",
        config.wait_timeout_ms,
        config.settle_ms,
        config.sandbox
    );

    let state = AppState::new(Arc::new(CdpLauncher), config).with_max_body_bytes(cli.max_body_bytes);
    server::serve(cli.bind, state).await
}
