//! sptrace: a scripted TCP responder
//!
//! Replays an expectation script and a response script to every client:
//! - `null` expectation lines send their response immediately
//! - any other line is a regular expression a client message must match
//!
//! Also ships a one-shot hello-world server/client pair (`hello`).

pub mod config;
pub mod hello;
pub mod logging;
pub mod script;
pub mod server;
pub mod session;
