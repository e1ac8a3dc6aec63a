//! Compression and encryption for archive data blocks: pluggable codecs
//! behind trait objects, a level-to-preset table, and the encode/decode
//! rules a worker thread applies to one block.

pub mod algo;
pub mod block;
pub mod compress;
pub mod crypto;
pub mod preset;

pub use algo::{CompressAlgo, EncryptAlgo};
pub use block::{DecodedBlock, EncodedBlock, decode_block, encode_block};
pub use compress::{CompressionCodec, codec_for};
pub use crypto::{EncryptionAlgo, algo_for};
pub use preset::{Preset, preset_for_level};
