//! One-shot hello-world server: greets a single client and exits.

use clap::Parser;
use sptrace::{hello, logging};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "hello-server")]
#[command(about = "Send \"Hello World!\" to one client, then exit", long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'l', long, default_value = "127.0.0.1:1234")]
    listen: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    logging::init(&args.log_level);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let listener = TcpListener::bind(&args.listen).await?;
        info!(address = %args.listen, "Waiting for one client");
        hello::serve_once(listener).await?;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
