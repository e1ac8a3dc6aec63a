//! The "dico": an ordered typed key/value bag, used for every header in the
//! archive (main header, per-filesystem header, object header, block
//! header, footers).

mod value;

pub use value::{AttrType, AttrValue};

use fsarc_dtyp::{Error, Section};

#[derive(Debug, Clone)]
struct Item {
    section: u8,
    key: u16,
    value: AttrValue,
}

/// An ordered list of `(section, key) -> value` items.
///
/// A single `(section, key)` pair is unique within one record. Order of
/// insertion is preserved on both `serialize`/`parse` round trips, since
/// some consumers (archinfo) print items in the order they were written.
#[derive(Debug, Clone, Default)]
pub struct AttributeRecord {
    items: Vec<Item>,
}

impl AttributeRecord {
    /// Creates an empty, ordered attribute record.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    fn find(&self, section: u8, key: u16) -> Option<usize> {
        self.items
            .iter()
            .position(|i| i.section == section && i.key == key)
    }

    /// Appends an item. Fails with [`Error::Duplicate`] if `(section, key)`
    /// is already present.
    pub fn add(&mut self, section: Section, key: u16, value: AttrValue) -> Result<(), Error> {
        let section = section.as_u8();
        if self.find(section, key).is_some() {
            return Err(Error::Duplicate { section, key });
        }
        self.items.push(Item {
            section,
            key,
            value,
        });
        Ok(())
    }

    pub fn add_u8(&mut self, section: Section, key: u16, v: u8) -> Result<(), Error> {
        self.add(section, key, AttrValue::U8(v))
    }
    pub fn add_u16(&mut self, section: Section, key: u16, v: u16) -> Result<(), Error> {
        self.add(section, key, AttrValue::U16(v))
    }
    pub fn add_u32(&mut self, section: Section, key: u16, v: u32) -> Result<(), Error> {
        self.add(section, key, AttrValue::U32(v))
    }
    pub fn add_u64(&mut self, section: Section, key: u16, v: u64) -> Result<(), Error> {
        self.add(section, key, AttrValue::U64(v))
    }
    pub fn add_bytes(&mut self, section: Section, key: u16, v: impl Into<Vec<u8>>) -> Result<(), Error> {
        self.add(section, key, AttrValue::Bytes(v.into()))
    }
    pub fn add_string(&mut self, section: Section, key: u16, v: impl Into<String>) -> Result<(), Error> {
        self.add(section, key, AttrValue::String(v.into()))
    }

    /// Returns the value of `(section, key)`, or [`Error::NotFound`].
    pub fn get(&self, section: Section, key: u16) -> Result<&AttrValue, Error> {
        let section = section.as_u8();
        self.find(section, key)
            .map(|i| &self.items[i].value)
            .ok_or(Error::NotFound { section, key })
    }

    /// Like [`Self::get`], but returns `default` instead of an error when
    /// the item is missing. Other errors (wrong type at the call site) are
    /// still the caller's responsibility to check.
    pub fn get_or<'a>(&'a self, section: Section, key: u16, default: &'a AttrValue) -> &'a AttrValue {
        self.get(section, key).unwrap_or(default)
    }

    pub fn get_u8(&self, section: Section, key: u16) -> Result<u8, Error> {
        self.get_typed(section, key, AttrValue::as_u8)
    }
    pub fn get_u16(&self, section: Section, key: u16) -> Result<u16, Error> {
        self.get_typed(section, key, AttrValue::as_u16)
    }
    pub fn get_u32(&self, section: Section, key: u16) -> Result<u32, Error> {
        self.get_typed(section, key, AttrValue::as_u32)
    }
    pub fn get_u64(&self, section: Section, key: u16) -> Result<u64, Error> {
        self.get_typed(section, key, AttrValue::as_u64)
    }
    pub fn get_bytes(&self, section: Section, key: u16) -> Result<&[u8], Error> {
        let section_u8 = section.as_u8();
        match self.get(section, key)?.as_bytes() {
            Some(v) => Ok(v),
            None => Err(Error::WrongType {
                section: section_u8,
                key,
            }),
        }
    }
    pub fn get_string(&self, section: Section, key: u16) -> Result<&str, Error> {
        let section_u8 = section.as_u8();
        match self.get(section, key)?.as_str() {
            Some(v) => Ok(v),
            None => Err(Error::WrongType {
                section: section_u8,
                key,
            }),
        }
    }

    fn get_typed<T>(
        &self,
        section: Section,
        key: u16,
        extract: impl Fn(&AttrValue) -> Option<T>,
    ) -> Result<T, Error> {
        let section_u8 = section.as_u8();
        let value = self.get(section, key)?;
        extract(value).ok_or(Error::WrongType {
            section: section_u8,
            key,
        })
    }

    /// Number of items, optionally restricted to one section.
    pub fn count(&self, section: Option<Section>) -> usize {
        match section {
            Some(s) => self.items.iter().filter(|i| i.section == s.as_u8()).count(),
            None => self.items.len(),
        }
    }

    /// Iterates items in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, u16, &AttrValue)> {
        self.items.iter().map(|i| (i.section, i.key, &i.value))
    }

    /// Serializes to the wire layout: `u16 count` then, per item,
    /// `{ u8 type, u8 section, u16 key, u16 size, size bytes }`, all
    /// little-endian.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(self.items.len() as u16).to_le_bytes());
        for item in &self.items {
            let encoded = item.value.encode();
            buf.push(item.value.attr_type() as u8);
            buf.push(item.section);
            buf.extend_from_slice(&item.key.to_le_bytes());
            buf.extend_from_slice(&(encoded.len() as u16).to_le_bytes());
            buf.extend_from_slice(&encoded);
        }
        buf
    }

    /// Parses the wire layout produced by [`Self::serialize`].
    ///
    /// The caller has already verified the enclosing Fletcher-32 checksum.
    /// Any structural inconsistency (a count the buffer can't hold, or an
    /// item whose declared size overflows the remaining bytes) aborts the
    /// parse with [`Error::Corrupt`].
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        let mut pos = 0usize;
        let count = read_u16(bytes, &mut pos)?;
        let mut record = AttributeRecord::new();
        for _ in 0..count {
            let ty = read_u8(bytes, &mut pos)?;
            let section = read_u8(bytes, &mut pos)?;
            let key = read_u16(bytes, &mut pos)?;
            let size = read_u16(bytes, &mut pos)? as usize;
            let end = pos
                .checked_add(size)
                .filter(|&e| e <= bytes.len())
                .ok_or_else(|| Error::Corrupt("attribute item size overflows buffer".into()))?;
            let data = &bytes[pos..end];
            pos = end;

            let ty = AttrType::from_u8(ty)
                .ok_or_else(|| Error::Corrupt(format!("unknown attribute type tag {ty}")))?;
            let value = AttrValue::decode(ty, section, key, data)?;
            record
                .items
                .push(Item { section, key, value });
        }
        Ok(record)
    }
}

fn read_u8(bytes: &[u8], pos: &mut usize) -> Result<u8, Error> {
    let v = *bytes
        .get(*pos)
        .ok_or_else(|| Error::Corrupt("attribute record truncated".into()))?;
    *pos += 1;
    Ok(v)
}

fn read_u16(bytes: &[u8], pos: &mut usize) -> Result<u16, Error> {
    let end = pos
        .checked_add(2)
        .filter(|&e| e <= bytes.len())
        .ok_or_else(|| Error::Corrupt("attribute record truncated".into()))?;
    let arr: [u8; 2] = bytes[*pos..end].try_into().unwrap();
    *pos = end;
    Ok(u16::from_le_bytes(arr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mixed_items() {
        let mut d = AttributeRecord::new();
        d.add_u32(Section::StdAttr, 1, 42).unwrap();
        d.add_string(Section::StdAttr, 2, "/a/sub/f3").unwrap();
        d.add_bytes(Section::XAttr, 3, vec![1, 2, 3, 4]).unwrap();
        d.add_u64(Section::StdAttr, 4, u64::MAX).unwrap();

        let bytes = d.serialize();
        let parsed = AttributeRecord::parse(&bytes).unwrap();

        assert_eq!(parsed.get_u32(Section::StdAttr, 1).unwrap(), 42);
        assert_eq!(parsed.get_string(Section::StdAttr, 2).unwrap(), "/a/sub/f3");
        assert_eq!(parsed.get_bytes(Section::XAttr, 3).unwrap(), &[1, 2, 3, 4]);
        assert_eq!(parsed.get_u64(Section::StdAttr, 4).unwrap(), u64::MAX);
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let mut d = AttributeRecord::new();
        d.add_u8(Section::StdAttr, 1, 1).unwrap();
        let err = d.add_u8(Section::StdAttr, 1, 2).unwrap_err();
        assert!(matches!(err, Error::Duplicate { .. }));
    }

    #[test]
    fn missing_key_is_not_found() {
        let d = AttributeRecord::new();
        let err = d.get_u32(Section::StdAttr, 99).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn corrupt_count_does_not_panic() {
        // count says 5 items, but there's no data behind it.
        let bytes = [5u8, 0];
        let err = AttributeRecord::parse(&bytes).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }

    #[test]
    fn oversized_item_length_is_corrupt_not_a_panic() {
        let mut bytes = vec![1u8, 0]; // count = 1
        bytes.push(AttrType::Bytes as u8);
        bytes.push(Section::StdAttr as u8);
        bytes.extend_from_slice(&1u16.to_le_bytes()); // key
        bytes.extend_from_slice(&0xffffu16.to_le_bytes()); // size way too big
        let err = AttributeRecord::parse(&bytes).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }
}
