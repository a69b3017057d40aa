//! Command line and environment configuration for the `htmlshot` binary.

use crate::server::DEFAULT_MAX_BODY_BYTES;
use crate::{EngineConfig, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Render HTML fragments to PNG over HTTP
#[derive(Debug, Parser)]
#[command(name = "htmlshot", version, about)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "HTMLSHOT_BIND", default_value = "0.0.0.0:8787")]
    pub bind: SocketAddr,

    /// Chrome/Chromium binary (auto-detected when omitted)
    #[arg(long, env = "HTMLSHOT_CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,

    /// How long to wait for the wrapper element, in milliseconds
    #[arg(long, env = "HTMLSHOT_WAIT_TIMEOUT_MS", default_value_t = 30000)]
    pub wait_timeout_ms: u64,

    /// Page load timeout, in milliseconds
    #[arg(long, env = "HTMLSHOT_LOAD_TIMEOUT_MS", default_value_t = 30000)]
    pub load_timeout_ms: u64,

    /// Extra delay after load before measuring, in milliseconds
    #[arg(long, env = "HTMLSHOT_SETTLE_MS", default_value_t = 250)]
    pub settle_ms: u64,

    /// Disable the Chrome sandbox (needed in some containers)
    #[arg(long, env = "HTMLSHOT_NO_SANDBOX")]
    pub no_sandbox: bool,

    /// Largest accepted request body, in bytes
    #[arg(long, env = "HTMLSHOT_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,
}

impl Cli {
    /// Build and validate the per-session engine configuration.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let config = EngineConfig {
            timeout_ms: self.load_timeout_ms,
            wait_timeout_ms: self.wait_timeout_ms,
            settle_ms: self.settle_ms,
            chrome_path: self.chrome_path.clone(),
            sandbox: !self.no_sandbox,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }
}
