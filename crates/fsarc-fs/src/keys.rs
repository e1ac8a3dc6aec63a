//! Dico keys used in the small attribute record passed to and filled in by
//! [`crate::Adapter::getinfo`]. Distinct from `fsarc_dtyp::keys`, which
//! numbers the `ObJt` object header — this is a different record entirely.

pub const LABEL: u16 = 1;
pub const UUID: u16 = 2;
pub const BLOCK_SIZE: u16 = 3;
/// Comma-separated feature names (`has_journal,extent,...`).
pub const FEATURES: u16 = 4;
/// The exact fs type string to hand `mount -t`, as saved at archive time.
pub const FSTYPE: u16 = 5;
