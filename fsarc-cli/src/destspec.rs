//! Parses one `restfs` destination spec:
//! `id=<n>,dest=<dev>[,mkfs=<fs>][,mkfsopt=<str>][,label=<s>][,uuid=<s>]`.

use std::path::PathBuf;

use fsarc_core::FsDestination;

#[derive(Debug, Clone)]
pub struct DestSpec(FsDestination);

impl DestSpec {
    pub fn into_inner(self) -> FsDestination {
        self.0
    }

    /// `clap` value parser: splits on `,` then on the first `=` of each
    /// term. Unknown keys are rejected; `id=` and `dest=` are mandatory.
    pub fn parse(s: &str) -> Result<Self, String> {
        let mut fs_id = None;
        let mut dest = None;
        let mut mkfs = None;
        let mut mkfs_opts = None;
        let mut label = None;
        let mut uuid = None;

        for term in s.split(',') {
            let (key, value) = term
                .split_once('=')
                .ok_or_else(|| format!("'{term}' is not a key=value term"))?;
            match key {
                "id" => {
                    fs_id = Some(value.parse::<u16>().map_err(|e| format!("invalid id '{value}': {e}"))?);
                }
                "dest" => dest = Some(PathBuf::from(value)),
                "mkfs" => mkfs = Some(value.to_string()),
                "mkfsopt" => mkfs_opts = Some(value.to_string()),
                "label" => label = Some(value.to_string()),
                "uuid" => uuid = Some(value.to_string()),
                other => return Err(format!("unknown destination key '{other}'")),
            }
        }

        let fs_id = fs_id.ok_or_else(|| "destination spec is missing 'id='".to_string())?;
        let dest = dest.ok_or_else(|| "destination spec is missing 'dest='".to_string())?;

        Ok(DestSpec(FsDestination {
            fs_id,
            dest,
            mkfs,
            mkfs_opts,
            label,
            uuid,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_spec() {
        let spec = DestSpec::parse("id=0,dest=/dev/sdb1").unwrap().into_inner();
        assert_eq!(spec.fs_id, 0);
        assert_eq!(spec.dest, PathBuf::from("/dev/sdb1"));
        assert!(spec.mkfs.is_none());
    }

    #[test]
    fn parses_every_optional_key() {
        let spec = DestSpec::parse("id=2,dest=/dev/sdc1,mkfs=ext4,mkfsopt=-F,label=root,uuid=abc-123")
            .unwrap()
            .into_inner();
        assert_eq!(spec.fs_id, 2);
        assert_eq!(spec.mkfs.as_deref(), Some("ext4"));
        assert_eq!(spec.mkfs_opts.as_deref(), Some("-F"));
        assert_eq!(spec.label.as_deref(), Some("root"));
        assert_eq!(spec.uuid.as_deref(), Some("abc-123"));
    }

    #[test]
    fn rejects_missing_id() {
        assert!(DestSpec::parse("dest=/dev/sdb1").is_err());
    }

    #[test]
    fn rejects_unknown_key() {
        assert!(DestSpec::parse("id=0,dest=/dev/sdb1,bogus=1").is_err());
    }
}
