pub mod amf0;
mod argv;
mod chunk;
pub mod config;
mod connection;
pub mod error;
pub mod handshake;
pub mod logger;
mod message;
mod message_reader;
mod message_writer;
mod recorder;
mod responses;
pub mod server;
mod session;

pub use server::{RtmpServer, ServerPhase};
