use thiserror::Error;

mod decoding;
mod encoding;

pub use decoding::decode_amf0_values;
pub use encoding::encode_amf0_values;

// AMF0 type markers, https://rtmp.veriskope.com/pdf/amf0-file-format-specification.pdf
pub const STRING: u8 = 0x02;
pub(crate) const NUMBER: u8 = 0x00;
pub(crate) const BOOLEAN: u8 = 0x01;
pub(crate) const OBJECT: u8 = 0x03;
pub(crate) const NULL: u8 = 0x05;
pub(crate) const UNDEFINED: u8 = 0x06;
pub(crate) const ECMA_ARRAY: u8 = 0x08;
pub(crate) const STRICT_ARRAY: u8 = 0x0A;
pub(crate) const LONG_STRING: u8 = 0x0C;

#[derive(Debug, Clone, PartialEq)]
pub enum AmfValue {
    Number(f64),
    Boolean(bool),
    String(String),
    Object(AmfObject),
    Null,
}

/// A single entry of an [`AmfObject`]. Array-style entries carry no name.
#[derive(Debug, Clone, PartialEq)]
pub struct AmfProperty {
    pub name: Option<String>,
    pub value: AmfValue,
}

impl AmfProperty {
    pub fn named(name: impl Into<String>, value: AmfValue) -> Self {
        Self {
            name: Some(name.into()),
            value,
        }
    }

    pub fn unnamed(value: AmfValue) -> Self {
        Self { name: None, value }
    }
}

/// Ordered sequence of properties. Order mirrors wire order and is
/// semantically meaningful, so this is not a map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmfObject {
    pub properties: Vec<AmfProperty>,
}

impl AmfObject {
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn value_at(&self, index: usize) -> Option<&AmfValue> {
        self.properties.get(index).map(|p| &p.value)
    }

    pub fn value_at_mut(&mut self, index: usize) -> Option<&mut AmfValue> {
        self.properties.get_mut(index).map(|p| &mut p.value)
    }

    pub fn string_at(&self, index: usize) -> Option<&str> {
        match self.value_at(index) {
            Some(AmfValue::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn number_at(&self, index: usize) -> Option<f64> {
        match self.value_at(index) {
            Some(AmfValue::Number(n)) => Some(*n),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum AmfError {
    #[error("Insufficient data")]
    InsufficientData,

    #[error("Invalid UTF-8 in string")]
    InvalidUtf8,

    #[error("Unknown AMF0 type marker: {0:#04x}")]
    UnknownType(u8),

    #[error("String too long: {0} bytes")]
    StringTooLong(usize),
}
