//! Maps the user-facing `-z` level (1..9) to a concrete codec, codec-level
//! and preferred block size.
//!
//! The exact mapping is this build's choice (recorded in DESIGN.md),
//! trading speed for ratio as the level rises.

use fsarc_dtyp::{DEFAULT_BLOCK_SIZE, Error};

use crate::algo::CompressAlgo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    pub algo: CompressAlgo,
    pub algo_level: u8,
    pub preferred_block_size: usize,
}

pub fn preset_for_level(level: u8) -> Result<Preset, Error> {
    let preset = match level {
        1 => Preset {
            algo: CompressAlgo::Lz4,
            algo_level: 1,
            preferred_block_size: DEFAULT_BLOCK_SIZE,
        },
        2 => Preset {
            algo: CompressAlgo::Lz4,
            algo_level: 1,
            preferred_block_size: DEFAULT_BLOCK_SIZE * 2,
        },
        3 => Preset {
            algo: CompressAlgo::Gzip,
            algo_level: 1,
            preferred_block_size: DEFAULT_BLOCK_SIZE,
        },
        4 => Preset {
            algo: CompressAlgo::Gzip,
            algo_level: 4,
            preferred_block_size: DEFAULT_BLOCK_SIZE,
        },
        5 => Preset {
            algo: CompressAlgo::Gzip,
            algo_level: 6,
            preferred_block_size: DEFAULT_BLOCK_SIZE,
        },
        6 => Preset {
            algo: CompressAlgo::Gzip,
            algo_level: 9,
            preferred_block_size: DEFAULT_BLOCK_SIZE,
        },
        7 => Preset {
            algo: CompressAlgo::Bzip2,
            algo_level: 6,
            preferred_block_size: DEFAULT_BLOCK_SIZE,
        },
        8 => Preset {
            algo: CompressAlgo::Zstd,
            algo_level: 19,
            preferred_block_size: DEFAULT_BLOCK_SIZE,
        },
        9 => Preset {
            algo: CompressAlgo::Lzma,
            algo_level: 9,
            preferred_block_size: DEFAULT_BLOCK_SIZE / 2,
        },
        _ => return Err(Error::InvalidArg(format!("compression level {level} is out of range 1..9"))),
    };
    Ok(preset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_level_has_a_preset() {
        for level in 1..=9u8 {
            preset_for_level(level).unwrap();
        }
    }

    #[test]
    fn out_of_range_level_is_rejected() {
        assert!(preset_for_level(0).is_err());
        assert!(preset_for_level(10).is_err());
    }
}
