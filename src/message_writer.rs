use std::cmp::min;
use std::io::Write;

use crate::error::RtmpError;
use crate::message::{RtmpMessage, TYPE_USER_CONTROL};

// https://rtmp.veriskope.com/docs/spec/#717user-control-message-events
const STREAM_BEGIN_EVENT: u16 = 0;
const STREAM_EOF_EVENT: u16 = 1;

pub(crate) struct RtmpMessageWriter<W: Write> {
    stream: W,
    chunk_size: usize,
}

impl<W: Write> RtmpMessageWriter<W> {
    pub fn new(stream: W) -> Self {
        Self {
            stream,
            chunk_size: 128,
        }
    }

    pub fn write(&mut self, msg: &RtmpMessage) -> Result<(), RtmpError> {
        let mut offset = 0;
        let total_len = msg.payload.len();

        // Protocol control goes on chunk stream 2, command replies on 3,
        // matching what clients send them on.
        // https://rtmp.veriskope.com/docs/spec/#54-protocol-control-messages
        let cs_id: u8 = if msg.type_id <= 0x06 { 2 } else { 3 };

        loop {
            let chunk_len = min(self.chunk_size, total_len - offset);

            if offset == 0 {
                // header type 0
                self.stream.write_all(&[cs_id & 0x3F])?;
                // message header
                self.write_u24_be(msg.timestamp)?;
                self.write_u24_be(total_len as u32)?;
                self.stream.write_all(&[msg.type_id])?;
                self.write_u32_le(msg.stream_id)?;
            } else {
                // header type 3
                self.stream.write_all(&[0xC0 | (cs_id & 0x3F)])?;
            }

            self.stream
                .write_all(&msg.payload[offset..offset + chunk_len])?;

            offset += chunk_len;
            if offset >= total_len {
                break;
            }
        }

        self.stream.flush()?;
        Ok(())
    }

    fn write_u24_be(&mut self, val: u32) -> Result<(), RtmpError> {
        let bytes = val.to_be_bytes();
        self.stream.write_all(&bytes[1..4])?;
        Ok(())
    }

    fn write_u32_le(&mut self, val: u32) -> Result<(), RtmpError> {
        self.stream.write_all(&val.to_le_bytes())?;
        Ok(())
    }
}

fn send_user_control<W: Write>(
    writer: &mut RtmpMessageWriter<W>,
    event_type: u16,
    stream_id: u32,
) -> Result<(), RtmpError> {
    let mut payload = Vec::with_capacity(6);
    payload.extend_from_slice(&event_type.to_be_bytes());
    payload.extend_from_slice(&stream_id.to_be_bytes());

    let message = RtmpMessage {
        timestamp: 0,
        type_id: TYPE_USER_CONTROL,
        stream_id: 0,
        payload: payload.into(),
    };
    writer.write(&message)
}

pub(crate) fn send_stream_begin<W: Write>(
    writer: &mut RtmpMessageWriter<W>,
    stream_id: u32,
) -> Result<(), RtmpError> {
    send_user_control(writer, STREAM_BEGIN_EVENT, stream_id)
}

pub(crate) fn send_stream_eof<W: Write>(
    writer: &mut RtmpMessageWriter<W>,
    stream_id: u32,
) -> Result<(), RtmpError> {
    send_user_control(writer, STREAM_EOF_EVENT, stream_id)
}
