use bytes::{BufMut, Bytes, BytesMut};

use crate::amf0::*;

/// Encode a sequence of AMF0 values, e.g. the payload of a Command message.
pub fn encode_amf0_values(amf_values: &[AmfValue]) -> Result<Bytes, AmfError> {
    let encoder = Amf0EncoderState::new(BytesMut::new());
    encoder.encode_values(amf_values)
}

struct Amf0EncoderState {
    buf: BytesMut,
}

impl Amf0EncoderState {
    fn new(buf: BytesMut) -> Self {
        Self { buf }
    }

    fn encode_values(mut self, amf_values: &[AmfValue]) -> Result<Bytes, AmfError> {
        for value in amf_values {
            self.encode_value(value)?;
        }
        Ok(self.buf.freeze())
    }

    fn encode_value(&mut self, value: &AmfValue) -> Result<(), AmfError> {
        match value {
            AmfValue::Number(n) => self.put_number(*n),
            AmfValue::Boolean(b) => self.put_bool(*b),
            AmfValue::String(s) => self.put_string(s)?,
            AmfValue::Object(object) => self.put_object(object)?,
            AmfValue::Null => self.put_null(),
        };
        Ok(())
    }

    fn put_number(&mut self, n: f64) {
        self.buf.put_u8(NUMBER);
        self.buf.put_f64(n);
    }

    fn put_bool(&mut self, b: bool) {
        self.buf.put_u8(BOOLEAN);
        self.buf.put_u8(b.into());
    }

    fn put_string(&mut self, s: &str) -> Result<(), AmfError> {
        if s.len() > u16::MAX as usize {
            return Err(AmfError::StringTooLong(s.len()));
        }
        self.buf.put_u8(STRING);
        self.buf.put_u16(s.len() as u16);
        self.buf.put_slice(s.as_bytes());
        Ok(())
    }

    fn put_object(&mut self, object: &AmfObject) -> Result<(), AmfError> {
        self.buf.put_u8(OBJECT);
        for property in &object.properties {
            // Array-style entries have no name on the wire inside an object,
            // an empty key keeps the payload well formed.
            let key = property.name.as_deref().unwrap_or("");
            if key.len() > u16::MAX as usize {
                return Err(AmfError::StringTooLong(key.len()));
            }
            self.buf.put_u16(key.len() as u16);
            self.buf.put_slice(key.as_bytes());
            self.encode_value(&property.value)?;
        }
        self.put_object_end();
        Ok(())
    }

    fn put_null(&mut self) {
        self.buf.put_u8(NULL);
    }

    fn put_object_end(&mut self) {
        self.buf.put_u8(0x00);
        self.buf.put_u8(0x00);
        self.buf.put_u8(0x09);
    }
}
