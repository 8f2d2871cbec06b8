//! sptrace: scripted TCP responder
//!
//! Usage: `sptrace <port> <expect_file> <response_file>`
//!
//! - Loads both script files once (or per connection with `--reload`)
//! - Serves one client at a time, replaying the script to each
//! - Configuration via CLI arguments or TOML file

use sptrace::config::{self, Config};
use sptrace::logging;
use sptrace::server::Server;
use tracing::{error, info};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) if e.is_usage() => {
            eprintln!("{e}");
            println!("{}", config::usage());
            std::process::exit(0);
        }
        Err(e) => return Err(e.into()),
    };

    logging::init(&config.log_level);

    info!(
        host = %config.host,
        port = config.port,
        expect_file = %config.expect_file.display(),
        response_file = %config.response_file.display(),
        reload = config.reload,
        "Starting sptrace"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(config))
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let server = Server::bind(&config).inspect_err(|e| error!(error = %e, "Startup failed"))?;

    tokio::select! {
        result = server.run() => {
            result.inspect_err(|e| error!(error = %e, "Server stopped"))?;
            Ok(())
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("exit now");
            std::process::exit(0);
        }
    }
}
