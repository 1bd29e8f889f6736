use bytes::{Buf, Bytes};

use crate::amf0::*;

const OBJECT_END_MARKER: [u8; 3] = [0x00, 0x00, 0x09];

/// Decode a complete AMF0 payload into an ordered object.
///
/// `amf_bytes` must hold whole AMF0 values, e.g. the payload of a Command
/// message. Top-level values become unnamed positional properties; named
/// properties only appear inside nested objects.
pub fn decode_amf0_values(amf_bytes: Bytes) -> Result<AmfObject, AmfError> {
    let decoder = Amf0DecoderState::new(amf_bytes);
    decoder.decode_buf()
}

struct Amf0DecoderState {
    buf: Bytes,
}

impl Amf0DecoderState {
    fn new(amf_bytes: Bytes) -> Self {
        Self { buf: amf_bytes }
    }

    fn decode_buf(mut self) -> Result<AmfObject, AmfError> {
        let mut object = AmfObject::default();
        while self.buf.has_remaining() {
            let value = self.decode_value()?;
            object.properties.push(AmfProperty::unnamed(value));
        }
        Ok(object)
    }

    fn decode_value(&mut self) -> Result<AmfValue, AmfError> {
        if self.buf.is_empty() {
            return Err(AmfError::InsufficientData);
        }

        let marker = self.buf.get_u8();

        let amf_value = match marker {
            NUMBER => AmfValue::Number(self.decode_number()?),
            BOOLEAN => AmfValue::Boolean(self.decode_boolean()?),
            STRING => AmfValue::String(self.decode_string()?),
            OBJECT => AmfValue::Object(self.decode_object()?),
            NULL | UNDEFINED => AmfValue::Null,
            // The associated count is advisory, the payload is key/value
            // pairs like a plain object.
            ECMA_ARRAY => {
                if self.buf.remaining() < 4 {
                    return Err(AmfError::InsufficientData);
                }
                let _array_size = self.buf.get_u32();
                AmfValue::Object(self.decode_object()?)
            }
            STRICT_ARRAY => AmfValue::Object(self.decode_strict_array()?),
            LONG_STRING => AmfValue::String(self.decode_long_string()?),
            _ => return Err(AmfError::UnknownType(marker)),
        };
        Ok(amf_value)
    }

    fn decode_number(&mut self) -> Result<f64, AmfError> {
        if self.buf.remaining() < 8 {
            return Err(AmfError::InsufficientData);
        }
        Ok(self.buf.get_f64())
    }

    fn decode_boolean(&mut self) -> Result<bool, AmfError> {
        if self.buf.remaining() < 1 {
            return Err(AmfError::InsufficientData);
        }
        Ok(self.buf.get_u8() != 0)
    }

    fn decode_string(&mut self) -> Result<String, AmfError> {
        if self.buf.remaining() < 2 {
            return Err(AmfError::InsufficientData);
        }
        let size = self.buf.get_u16() as usize;
        self.take_string(size)
    }

    fn decode_long_string(&mut self) -> Result<String, AmfError> {
        if self.buf.remaining() < 4 {
            return Err(AmfError::InsufficientData);
        }
        let size = self.buf.get_u32() as usize;
        self.take_string(size)
    }

    fn take_string(&mut self, size: usize) -> Result<String, AmfError> {
        if self.buf.remaining() < size {
            return Err(AmfError::InsufficientData);
        }
        let string_bytes = self.buf.split_to(size);
        String::from_utf8(string_bytes.to_vec()).map_err(|_| AmfError::InvalidUtf8)
    }

    fn decode_object(&mut self) -> Result<AmfObject, AmfError> {
        let mut object = AmfObject::default();

        loop {
            if self.buf.remaining() < 3 {
                return Err(AmfError::InsufficientData);
            }
            if self.buf[..3] == OBJECT_END_MARKER {
                self.buf.advance(3);
                return Ok(object);
            }
            let key_size = self.buf.get_u16() as usize;
            let key = self.take_string(key_size)?;
            let value = self.decode_value()?;
            object.properties.push(AmfProperty::named(key, value));
        }
    }

    fn decode_strict_array(&mut self) -> Result<AmfObject, AmfError> {
        if self.buf.remaining() < 4 {
            return Err(AmfError::InsufficientData);
        }
        let size = self.buf.get_u32() as usize;
        let mut object = AmfObject::default();

        for _ in 0..size {
            let value = self.decode_value()?;
            object.properties.push(AmfProperty::unnamed(value));
        }

        Ok(object)
    }
}
