use bytes::Bytes;

// Message type ids the dispatcher cares about, everything else is ignored.
// https://rtmp.veriskope.com/docs/spec/#54-protocol-control-messages
pub(crate) const TYPE_SET_CHUNK_SIZE: u8 = 0x01;
pub(crate) const TYPE_USER_CONTROL: u8 = 0x04;
pub(crate) const TYPE_COMMAND_AMF3: u8 = 0x11;
pub(crate) const TYPE_COMMAND_AMF0: u8 = 0x14;

#[derive(Debug, Clone)]
pub(crate) struct RtmpMessage {
    pub timestamp: u32,
    pub type_id: u8,
    pub stream_id: u32,
    pub payload: Bytes,
}
