//! TCP server replaying the expect/response script to each client.
//!
//! Clients are served one at a time: accept, run the script to completion,
//! close, accept the next. Further clients wait in the listen backlog.

use crate::config::Config;
use crate::script::{Script, ScriptError};
use crate::session::{self, SessionError, SessionOutcome};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// First pause after a failed accept
const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(10);

/// Longest pause between accept attempts while accept keeps failing
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Where the script for the next connection comes from.
#[derive(Debug)]
enum ScriptSource {
    /// Parsed once at startup.
    Fixed(Script),
    /// Re-read from disk before every connection.
    Reload {
        expect_file: PathBuf,
        response_file: PathBuf,
    },
}

/// Server instance
pub struct Server {
    listener: TcpListener,
    source: ScriptSource,
}

impl Server {
    /// Load the script and bind the listening socket.
    pub fn bind(config: &Config) -> Result<Self, ServerError> {
        let script = Script::load(&config.expect_file, &config.response_file)?;
        info!(lines = script.len(), "Loaded script");

        let source = if config.reload {
            ScriptSource::Reload {
                expect_file: config.expect_file.clone(),
                response_file: config.response_file.clone(),
            }
        } else {
            ScriptSource::Fixed(script)
        };

        let addr = resolve(&config.listen_addr())?;
        let listener = create_listener(addr, config.backlog)
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(Server { listener, source })
    }

    /// Bind with an already-parsed script.
    pub fn with_script(addr: SocketAddr, backlog: u32, script: Script) -> Result<Self, ServerError> {
        let listener =
            create_listener(addr, backlog).map_err(|source| ServerError::Bind { addr, source })?;
        Ok(Server {
            listener,
            source: ScriptSource::Fixed(script),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept and serve clients until a fatal error occurs.
    pub async fn run(&self) -> Result<(), ServerError> {
        info!(address = %self.local_addr()?, "Server listening");
        let mut backoff = ACCEPT_BACKOFF_MIN;

        loop {
            info!("======waiting for client's request======");

            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    backoff = ACCEPT_BACKOFF_MIN;
                    debug!(peer = %addr, "New connection");
                    self.serve(stream, addr).await?;
                }
                Err(e) => {
                    // EMFILE and similar errors persist across retries
                    error!(
                        error = %e,
                        retry_ms = backoff.as_millis() as u64,
                        "Failed to accept connection"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = next_backoff(backoff);
                }
            }
        }
    }

    /// Run the script over one connection, then close it.
    async fn serve(&self, mut stream: TcpStream, addr: SocketAddr) -> Result<(), ServerError> {
        let reloaded;
        let script = match &self.source {
            ScriptSource::Fixed(script) => script,
            ScriptSource::Reload {
                expect_file,
                response_file,
            } => {
                reloaded = Script::load(expect_file, response_file)?;
                &reloaded
            }
        };

        match session::run(script, &mut stream).await {
            Ok(SessionOutcome::Completed { lines }) => {
                info!(peer = %addr, lines, "Script complete, closing connection");
            }
            Ok(SessionOutcome::PeerClosed { line }) => {
                info!(peer = %addr, line = line + 1, "Client disconnected before script completed");
            }
            Err(e) if e.is_fatal() => {
                error!(peer = %addr, error = %e, "Fatal session error");
                return Err(e.into());
            }
            Err(e) => {
                warn!(peer = %addr, error = %e, "Dropping connection");
            }
        }

        Ok(())
    }
}

/// Double the accept retry delay, capped at [`ACCEPT_BACKOFF_MAX`].
fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(ACCEPT_BACKOFF_MAX)
}

fn resolve(listen: &str) -> Result<SocketAddr, ServerError> {
    listen
        .to_socket_addrs()
        .map_err(ServerError::Io)?
        .next()
        .ok_or_else(|| {
            ServerError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("no address for {listen}"),
            ))
        })
}

/// Build a tokio listener through socket2 so the backlog is configurable.
fn create_listener(addr: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog.try_into().unwrap_or(i32::MAX))?;

    TcpListener::from_std(socket.into())
}

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("bind socket error on {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Io(#[from] io::Error),
}
