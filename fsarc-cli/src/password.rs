//! Resolves `-c <password|->`: a literal password is used as-is, `-`
//! prompts on the terminal instead (twice on save, to catch typos; once on
//! restore).

use std::io;

const SENTINEL: &str = "-";

pub fn resolve_save_password(raw: Option<&str>) -> io::Result<Option<String>> {
    match raw {
        None => Ok(None),
        Some(p) if p != SENTINEL => Ok(Some(p.to_string())),
        Some(_) => {
            let first = rpassword::prompt_password("Archive password: ")?;
            let second = rpassword::prompt_password("Confirm password: ")?;
            if first != second {
                return Err(io::Error::new(io::ErrorKind::InvalidInput, "passwords do not match"));
            }
            Ok(Some(first))
        }
    }
}

pub fn resolve_restore_password(raw: Option<&str>) -> io::Result<Option<String>> {
    match raw {
        None => Ok(None),
        Some(p) if p != SENTINEL => Ok(Some(p.to_string())),
        Some(_) => Ok(Some(rpassword::prompt_password("Archive password: ")?)),
    }
}
