//! Volume path derivation and the minimal attribute records volume
//! headers/footers carry.

use std::path::{Path, PathBuf};

use fsarc_attr::AttributeRecord;
use fsarc_dtyp::{Error, Section};

/// Dico key (within [`Section::StdAttr`]) carrying the volume footer's
/// `last_vol` flag, stored as a `u8` (0/1).
const KEY_LAST_VOL: u16 = 1;

/// Derives the path of volume `vol_num` from the archive's base path
/// (which must end in `.fsa`). Volume 0 is the base path unchanged; volume
/// N in 1..=99 appends a two-digit zero-padded suffix; volume N >= 100
/// appends the natural decimal.
pub fn volume_path(base: &Path, vol_num: u32) -> PathBuf {
    if vol_num == 0 {
        return base.to_path_buf();
    }
    let mut s = base.as_os_str().to_os_string();
    if vol_num < 100 {
        s.push(format!(".{vol_num:02}"));
    } else {
        s.push(format!(".{vol_num}"));
    }
    PathBuf::from(s)
}

/// Builds the (empty) attribute record for a volume header.
pub fn header_attrs() -> AttributeRecord {
    AttributeRecord::new()
}

/// Builds the attribute record for a volume footer.
pub fn footer_attrs(last_vol: bool) -> AttributeRecord {
    let mut attrs = AttributeRecord::new();
    attrs
        .add_u8(Section::StdAttr, KEY_LAST_VOL, last_vol as u8)
        .expect("fresh record has no duplicate keys");
    attrs
}

/// Reads back the `last_vol` flag from a parsed volume-footer record.
pub fn footer_is_last(attrs: &AttributeRecord) -> Result<bool, Error> {
    Ok(attrs.get_u8(Section::StdAttr, KEY_LAST_VOL)? != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_zero_is_the_base_path() {
        assert_eq!(volume_path(Path::new("/tmp/a.fsa"), 0), Path::new("/tmp/a.fsa"));
    }

    #[test]
    fn low_numbered_volumes_are_zero_padded() {
        assert_eq!(volume_path(Path::new("/tmp/a.fsa"), 1), Path::new("/tmp/a.fsa.01"));
        assert_eq!(volume_path(Path::new("/tmp/a.fsa"), 99), Path::new("/tmp/a.fsa.99"));
    }

    #[test]
    fn high_numbered_volumes_use_natural_decimal() {
        assert_eq!(volume_path(Path::new("/tmp/a.fsa"), 100), Path::new("/tmp/a.fsa.100"));
        assert_eq!(volume_path(Path::new("/tmp/a.fsa"), 1234), Path::new("/tmp/a.fsa.1234"));
    }

    #[test]
    fn footer_flag_round_trips() {
        let attrs = footer_attrs(true);
        assert!(footer_is_last(&attrs).unwrap());
        let attrs = footer_attrs(false);
        assert!(!footer_is_last(&attrs).unwrap());
    }
}
