//! Pluggable compression codecs, dispatched through a trait object so the
//! block encoder doesn't need to match on the algorithm tag itself.

use std::io::{Read, Write};

use fsarc_dtyp::Error;

use crate::algo::CompressAlgo;

/// One compression codec. Implementors are stateless with respect to a
/// single block: `compress`/`decompress` each take a complete buffer.
pub trait CompressionCodec: std::fmt::Debug + Send {
    fn id(&self) -> CompressAlgo;
    fn compress(&self, input: &[u8], level: u8) -> Result<Vec<u8>, Error>;
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, Error>;
    fn clone_box(&self) -> Box<dyn CompressionCodec>;
}

impl Clone for Box<dyn CompressionCodec> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Returns the codec implementing `algo`, usable for both directions.
///
/// `Lzo` is defined for wire compatibility but has no implementation in
/// this build; selecting it here always fails.
pub fn codec_for(algo: CompressAlgo) -> Result<Box<dyn CompressionCodec>, Error> {
    Ok(match algo {
        CompressAlgo::None => Box::new(NoneCodec),
        CompressAlgo::Lz4 => Box::new(Lz4Codec),
        CompressAlgo::Gzip => Box::new(GzipCodec),
        CompressAlgo::Zstd => Box::new(ZstdCodec),
        CompressAlgo::Bzip2 => Box::new(Bzip2Codec),
        CompressAlgo::Lzma => Box::new(LzmaCodec),
        CompressAlgo::Lzo => {
            return Err(Error::UnsupportedFeature {
                required: CompressAlgo::Lzo as u32,
                actual: 0,
            });
        }
    })
}

#[derive(Debug, Clone, Copy)]
struct NoneCodec;

impl CompressionCodec for NoneCodec {
    fn id(&self) -> CompressAlgo {
        CompressAlgo::None
    }
    fn compress(&self, input: &[u8], _level: u8) -> Result<Vec<u8>, Error> {
        Ok(input.to_vec())
    }
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(input.to_vec())
    }
    fn clone_box(&self) -> Box<dyn CompressionCodec> {
        Box::new(*self)
    }
}

#[derive(Debug, Clone, Copy)]
struct Lz4Codec;

impl CompressionCodec for Lz4Codec {
    fn id(&self) -> CompressAlgo {
        CompressAlgo::Lz4
    }
    fn compress(&self, input: &[u8], _level: u8) -> Result<Vec<u8>, Error> {
        Ok(lz4_flex::compress_prepend_size(input))
    }
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, Error> {
        lz4_flex::decompress_size_prepended(input)
            .map_err(|e| Error::Corrupt(format!("lz4 decode failed: {e}")))
    }
    fn clone_box(&self) -> Box<dyn CompressionCodec> {
        Box::new(*self)
    }
}

#[derive(Debug, Clone, Copy)]
struct GzipCodec;

impl CompressionCodec for GzipCodec {
    fn id(&self) -> CompressAlgo {
        CompressAlgo::Gzip
    }
    fn compress(&self, input: &[u8], level: u8) -> Result<Vec<u8>, Error> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::new(level.clamp(1, 9) as u32));
        encoder.write_all(input).map_err(Error::Write)?;
        encoder.finish().map_err(Error::Write)
    }
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, Error> {
        let mut decoder = flate2::read::GzDecoder::new(input);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| Error::Corrupt(format!("gzip decode failed: {e}")))?;
        Ok(out)
    }
    fn clone_box(&self) -> Box<dyn CompressionCodec> {
        Box::new(*self)
    }
}

#[derive(Debug, Clone, Copy)]
struct ZstdCodec;

impl CompressionCodec for ZstdCodec {
    fn id(&self) -> CompressAlgo {
        CompressAlgo::Zstd
    }
    fn compress(&self, input: &[u8], level: u8) -> Result<Vec<u8>, Error> {
        zstd::stream::encode_all(input, level as i32).map_err(Error::Write)
    }
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, Error> {
        zstd::stream::decode_all(input).map_err(|e| Error::Corrupt(format!("zstd decode failed: {e}")))
    }
    fn clone_box(&self) -> Box<dyn CompressionCodec> {
        Box::new(*self)
    }
}

#[derive(Debug, Clone, Copy)]
struct Bzip2Codec;

impl CompressionCodec for Bzip2Codec {
    fn id(&self) -> CompressAlgo {
        CompressAlgo::Bzip2
    }
    fn compress(&self, input: &[u8], level: u8) -> Result<Vec<u8>, Error> {
        let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::new(level.clamp(1, 9) as u32));
        encoder.write_all(input).map_err(Error::Write)?;
        encoder.finish().map_err(Error::Write)
    }
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, Error> {
        let mut decoder = bzip2::read::BzDecoder::new(input);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| Error::Corrupt(format!("bzip2 decode failed: {e}")))?;
        Ok(out)
    }
    fn clone_box(&self) -> Box<dyn CompressionCodec> {
        Box::new(*self)
    }
}

#[derive(Debug, Clone, Copy)]
struct LzmaCodec;

impl CompressionCodec for LzmaCodec {
    fn id(&self) -> CompressAlgo {
        CompressAlgo::Lzma
    }
    fn compress(&self, input: &[u8], level: u8) -> Result<Vec<u8>, Error> {
        let mut encoder = xz2::write::XzEncoder::new(Vec::new(), level.clamp(0, 9) as u32);
        encoder.write_all(input).map_err(Error::Write)?;
        encoder.finish().map_err(Error::Write)
    }
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, Error> {
        let mut decoder = xz2::read::XzDecoder::new(input);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| Error::Corrupt(format!("lzma decode failed: {e}")))?;
        Ok(out)
    }
    fn clone_box(&self) -> Box<dyn CompressionCodec> {
        Box::new(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(algo: CompressAlgo) {
        let codec = codec_for(algo).unwrap();
        let input = b"the quick brown fox jumps over the lazy dog, repeated: ".repeat(50);
        let compressed = codec.compress(&input, 6).unwrap();
        let decompressed = codec.decompress(&compressed).unwrap();
        assert_eq!(decompressed, input);
    }

    #[test]
    fn none_is_identity() {
        round_trip(CompressAlgo::None);
    }
    #[test]
    fn lz4_round_trips() {
        round_trip(CompressAlgo::Lz4);
    }
    #[test]
    fn gzip_round_trips() {
        round_trip(CompressAlgo::Gzip);
    }
    #[test]
    fn zstd_round_trips() {
        round_trip(CompressAlgo::Zstd);
    }
    #[test]
    fn bzip2_round_trips() {
        round_trip(CompressAlgo::Bzip2);
    }
    #[test]
    fn lzma_round_trips() {
        round_trip(CompressAlgo::Lzma);
    }

    #[test]
    fn lzo_has_no_encoder_in_this_build() {
        let err = codec_for(CompressAlgo::Lzo).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFeature { .. }));
    }
}
