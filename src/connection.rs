use std::net::TcpStream;

use tracing::{debug, error, info, trace, warn};

use crate::config::Config;
use crate::error::RtmpError;
use crate::handshake::Handshake;
use crate::message::{
    RtmpMessage, TYPE_COMMAND_AMF0, TYPE_COMMAND_AMF3, TYPE_SET_CHUNK_SIZE, TYPE_USER_CONTROL,
};
use crate::message_reader::RtmpMessageReader;
use crate::message_writer::RtmpMessageWriter;
use crate::recorder::RecorderLauncher;
use crate::session::{Session, SessionOutcome};

/// Drives one accepted client from handshake to close. Errors end the
/// connection, never the server.
pub(crate) fn handle_connection(stream: TcpStream, config: &Config) {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    info!(%peer_addr, "client connected");

    if let Err(error) = serve(stream, config) {
        error!(?error, %peer_addr, "connection ended with error");
    }
    info!(%peer_addr, "client disconnected");
}

fn serve(mut stream: TcpStream, config: &Config) -> Result<(), RtmpError> {
    // A client that never starts the handshake should not pin the thread.
    stream.set_read_timeout(Some(config.handshake_timeout))?;
    Handshake::perform(&mut stream)?;
    stream.set_read_timeout(None)?;
    debug!("handshake complete");

    let write_half = stream.try_clone()?;
    let mut reader = RtmpMessageReader::new(stream);
    let mut writer = RtmpMessageWriter::new(write_half);
    let mut session = Session::new(RecorderLauncher::new(config.recorder.clone()));

    while let Some(message) = reader.next() {
        let message = message?;
        match dispatch(&message, &mut session, &mut writer)? {
            Dispatch::SetChunkSize(size) => reader.set_chunk_size(size),
            Dispatch::Close => return Ok(()),
            Dispatch::Continue => {}
        }
    }
    Ok(())
}

enum Dispatch {
    Continue,
    Close,
    SetChunkSize(usize),
}

fn dispatch<W: std::io::Write>(
    message: &RtmpMessage,
    session: &mut Session<impl crate::recorder::Spawn>,
    writer: &mut RtmpMessageWriter<W>,
) -> Result<Dispatch, RtmpError> {
    match message.type_id {
        TYPE_SET_CHUNK_SIZE => {
            let Some(bytes) = message.payload.first_chunk::<4>() else {
                warn!("malformed set chunk size packet");
                return Ok(Dispatch::Continue);
            };
            // Top bit is reserved.
            let size = u32::from_be_bytes(*bytes) & 0x7FFF_FFFF;
            debug!(size, "client changed chunk size");
            Ok(Dispatch::SetChunkSize(size as usize))
        }
        TYPE_COMMAND_AMF0 => serve_command(session, message.payload.clone(), writer),
        TYPE_COMMAND_AMF3 => {
            // AMF3 command bodies start with a one byte format selector,
            // the rest is plain AMF0 in practice.
            if message.payload.is_empty() {
                warn!("empty AMF3 command packet");
                return Ok(Dispatch::Continue);
            }
            serve_command(session, message.payload.slice(1..), writer)
        }
        TYPE_USER_CONTROL => {
            trace!("ignoring user control message from client");
            Ok(Dispatch::Continue)
        }
        other => {
            trace!(type_id = other, "ignoring message");
            Ok(Dispatch::Continue)
        }
    }
}

fn serve_command<W: std::io::Write>(
    session: &mut Session<impl crate::recorder::Spawn>,
    body: bytes::Bytes,
    writer: &mut RtmpMessageWriter<W>,
) -> Result<Dispatch, RtmpError> {
    match session.serve_invoke(body, writer)? {
        SessionOutcome::Continue => Ok(Dispatch::Continue),
        SessionOutcome::Close => Ok(Dispatch::Close),
    }
}
