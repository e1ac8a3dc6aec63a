//! [`AttrValue`]: the tagged value carried by one attribute-record item.

use fsarc_dtyp::Error;

/// Wire type tag for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AttrType {
    U8 = 1,
    U16 = 2,
    U32 = 3,
    U64 = 4,
    Bytes = 5,
    String = 6,
}

impl AttrType {
    pub const fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            1 => AttrType::U8,
            2 => AttrType::U16,
            3 => AttrType::U32,
            4 => AttrType::U64,
            5 => AttrType::Bytes,
            6 => AttrType::String,
            _ => return None,
        })
    }
}

/// A single typed value stored in an [`crate::AttributeRecord`].
///
/// Integers are always little-endian on the wire, fixed width. Strings are
/// NUL-terminated byte sequences; binary values carry an explicit length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Bytes(Vec<u8>),
    String(String),
}

impl AttrValue {
    pub fn attr_type(&self) -> AttrType {
        match self {
            AttrValue::U8(_) => AttrType::U8,
            AttrValue::U16(_) => AttrType::U16,
            AttrValue::U32(_) => AttrType::U32,
            AttrValue::U64(_) => AttrType::U64,
            AttrValue::Bytes(_) => AttrType::Bytes,
            AttrValue::String(_) => AttrType::String,
        }
    }

    /// Encodes the value's payload (without the type/section/key/size
    /// prefix) as it appears on the wire.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            AttrValue::U8(v) => vec![*v],
            AttrValue::U16(v) => v.to_le_bytes().to_vec(),
            AttrValue::U32(v) => v.to_le_bytes().to_vec(),
            AttrValue::U64(v) => v.to_le_bytes().to_vec(),
            AttrValue::Bytes(v) => v.clone(),
            AttrValue::String(s) => {
                let mut buf = Vec::with_capacity(s.len() + 1);
                buf.extend_from_slice(s.as_bytes());
                buf.push(0);
                buf
            }
        }
    }

    /// Decodes a value from its wire payload, given the type tag that
    /// preceded it.
    pub fn decode(ty: AttrType, section: u8, key: u16, bytes: &[u8]) -> Result<Self, Error> {
        Ok(match ty {
            AttrType::U8 => {
                let [v] = <[u8; 1]>::try_from(bytes)
                    .map_err(|_| Error::Corrupt(format!("u8 attr has size {}", bytes.len())))?;
                AttrValue::U8(v)
            }
            AttrType::U16 => {
                let arr = <[u8; 2]>::try_from(bytes)
                    .map_err(|_| Error::Corrupt(format!("u16 attr has size {}", bytes.len())))?;
                AttrValue::U16(u16::from_le_bytes(arr))
            }
            AttrType::U32 => {
                let arr = <[u8; 4]>::try_from(bytes)
                    .map_err(|_| Error::Corrupt(format!("u32 attr has size {}", bytes.len())))?;
                AttrValue::U32(u32::from_le_bytes(arr))
            }
            AttrType::U64 => {
                let arr = <[u8; 8]>::try_from(bytes)
                    .map_err(|_| Error::Corrupt(format!("u64 attr has size {}", bytes.len())))?;
                AttrValue::U64(u64::from_le_bytes(arr))
            }
            AttrType::Bytes => AttrValue::Bytes(bytes.to_vec()),
            AttrType::String => {
                let without_nul = bytes.strip_suffix(&[0]).ok_or_else(|| {
                    Error::Corrupt(format!(
                        "string attr (section={section}, key={key}) is not NUL-terminated"
                    ))
                })?;
                let s = std::str::from_utf8(without_nul)
                    .map_err(|e| Error::Corrupt(format!("string attr is not valid utf-8: {e}")))?;
                AttrValue::String(s.to_string())
            }
        })
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self {
            AttrValue::U8(v) => Some(*v),
            _ => None,
        }
    }
    pub fn as_u16(&self) -> Option<u16> {
        match self {
            AttrValue::U16(v) => Some(*v),
            _ => None,
        }
    }
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            AttrValue::U32(v) => Some(*v),
            _ => None,
        }
    }
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            AttrValue::U64(v) => Some(*v),
            _ => None,
        }
    }
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            AttrValue::Bytes(v) => Some(v),
            _ => None,
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(v) => Some(v),
            _ => None,
        }
    }
}
