//! One-shot hello-world server and client.
//!
//! The server accepts a single connection, writes [`HELLO_MESSAGE`] and
//! closes. The client connects, performs one read and returns what it got.

use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

pub const HELLO_MESSAGE: &[u8] = b"Hello World!";

/// Largest message the client reads in its single read.
const CLIENT_BUFFER_SIZE: usize = 39;

/// Accept exactly one client, greet it and close the connection.
pub async fn serve_once(listener: TcpListener) -> io::Result<SocketAddr> {
    let (mut stream, peer) = listener.accept().await?;
    debug!(peer = %peer, "New connection");

    stream.write_all(HELLO_MESSAGE).await?;
    stream.shutdown().await?;
    info!(peer = %peer, "Greeting sent");

    Ok(peer)
}

/// Connect to `addr` and return the first message the server sends.
pub async fn fetch(addr: &str) -> io::Result<String> {
    let mut stream = TcpStream::connect(addr).await?;
    let mut buf = [0u8; CLIENT_BUFFER_SIZE];
    let n = stream.read(&mut buf).await?;
    debug!(bytes = n, "Received greeting");

    Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hello_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_once(listener));

        let message = fetch(&addr.to_string()).await.unwrap();
        assert_eq!(message, "Hello World!");

        let peer = server.await.unwrap().unwrap();
        assert_eq!(peer.ip(), addr.ip());
    }

    #[tokio::test]
    async fn test_server_exits_after_one_client() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_once(listener));

        fetch(&addr.to_string()).await.unwrap();
        server.await.unwrap().unwrap();

        // Listener dropped with the task, nothing accepts anymore
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_without_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert!(fetch(&addr.to_string()).await.is_err());
    }
}
