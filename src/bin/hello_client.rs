//! One-shot hello-world client: prints the server's greeting.

use clap::Parser;
use sptrace::{hello, logging};

#[derive(Parser, Debug)]
#[command(name = "hello-client")]
#[command(about = "Read one message from a hello-server", long_about = None)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:1234")]
    connect: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    logging::init(&args.log_level);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let message = runtime.block_on(hello::fetch(&args.connect))?;
    println!("Message from server: {message}");
    Ok(())
}
