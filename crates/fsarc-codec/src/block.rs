//! The encode/decode rules a compression worker applies to one data block:
//! compress, fall back to raw storage if that didn't help, optionally
//! encrypt, checksum the bytes actually written to disk.

use fsarc_dtyp::{Error, fletcher32};

use crate::algo::{CompressAlgo, EncryptAlgo};
use crate::compress::{CompressionCodec, codec_for};
use crate::crypto::EncryptionAlgo;

/// Result of encoding one block for storage.
pub struct EncodedBlock {
    pub compress_algo: CompressAlgo,
    pub encrypt_algo: EncryptAlgo,
    pub archive_bytes: Vec<u8>,
    pub archive_checksum: u32,
}

/// Encodes one block's raw bytes: compress with `codec`, fall back to
/// storing the bytes uncompressed if that didn't shrink them, then
/// optionally encrypt. The block header should mirror the returned
/// `compress_algo`/`encrypt_algo`/`archive_checksum` verbatim.
pub fn encode_block(
    raw: &[u8],
    codec: &dyn CompressionCodec,
    level: u8,
    encrypt: Option<&dyn EncryptionAlgo>,
) -> Result<EncodedBlock, Error> {
    let compressed = codec.compress(raw, level)?;
    let (compress_algo, mut bytes) = if compressed.len() < raw.len() {
        (codec.id(), compressed)
    } else {
        (CompressAlgo::None, raw.to_vec())
    };

    let encrypt_algo = match encrypt {
        Some(enc) => {
            bytes = enc.encrypt(&bytes)?;
            enc.id()
        }
        None => EncryptAlgo::None,
    };

    let archive_checksum = fletcher32(&bytes);
    Ok(EncodedBlock {
        compress_algo,
        encrypt_algo,
        archive_bytes: bytes,
        archive_checksum,
    })
}

/// Outcome of decoding one stored block. `corrupt` mirrors the consumer's
/// "checksum mismatch zeroes the payload and flags the block" rule: the
/// caller is expected to count an error and skip this block's data rather
/// than trust `data`.
pub struct DecodedBlock {
    pub data: Vec<u8>,
    pub corrupt: bool,
}

/// Decodes one stored block: verify its checksum, decrypt if needed,
/// decompress. A checksum mismatch is not an error here — it is reported
/// back to the caller as `corrupt = true` with empty `data`, matching the
/// consumer's recover-and-continue policy.
pub fn decode_block(
    archive_bytes: &[u8],
    archive_checksum: u32,
    compress_algo: CompressAlgo,
    encrypt_algo: EncryptAlgo,
    decrypt: Option<&dyn EncryptionAlgo>,
) -> Result<DecodedBlock, Error> {
    if fletcher32(archive_bytes) != archive_checksum {
        log::warn!("data block fails its archive checksum; marking corrupt");
        return Ok(DecodedBlock {
            data: Vec::new(),
            corrupt: true,
        });
    }

    let mut bytes = archive_bytes.to_vec();
    if encrypt_algo != EncryptAlgo::None {
        let decryptor = decrypt.ok_or(Error::Password)?;
        bytes = decryptor.decrypt(&bytes)?;
    }

    let codec = codec_for(compress_algo)?;
    let data = codec.decompress(&bytes)?;
    Ok(DecodedBlock {
        data,
        corrupt: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::algo_for;

    #[test]
    fn incompressible_data_falls_back_to_none() {
        use rand::RngCore;
        let codec = codec_for(CompressAlgo::Gzip).unwrap();
        let mut raw = vec![0u8; 4096];
        rand::rngs::OsRng.fill_bytes(&mut raw);
        let encoded = encode_block(&raw, codec.as_ref(), 6, None).unwrap();
        assert_eq!(encoded.compress_algo, CompressAlgo::None);
        assert_eq!(encoded.archive_bytes, raw);
    }

    #[test]
    fn compressible_data_is_stored_compressed() {
        let codec = codec_for(CompressAlgo::Gzip).unwrap();
        let raw = vec![b'a'; 4096];
        let encoded = encode_block(&raw, codec.as_ref(), 6, None).unwrap();
        assert_eq!(encoded.compress_algo, CompressAlgo::Gzip);
        assert!(encoded.archive_bytes.len() < raw.len());
    }

    #[test]
    fn round_trips_through_encode_and_decode_with_encryption() {
        let codec = codec_for(CompressAlgo::Lz4).unwrap();
        let encryptor = algo_for(EncryptAlgo::Blowfish, b"hunter22").unwrap();
        let raw = b"some file contents to archive".repeat(10);

        let encoded = encode_block(&raw, codec.as_ref(), 1, Some(encryptor.as_ref())).unwrap();
        let decrypt = algo_for(EncryptAlgo::Blowfish, b"hunter22").unwrap();
        let decoded = decode_block(
            &encoded.archive_bytes,
            encoded.archive_checksum,
            encoded.compress_algo,
            encoded.encrypt_algo,
            Some(decrypt.as_ref()),
        )
        .unwrap();

        assert!(!decoded.corrupt);
        assert_eq!(decoded.data, raw);
    }

    #[test]
    fn checksum_mismatch_is_reported_as_corrupt_not_an_error() {
        let codec = codec_for(CompressAlgo::None).unwrap();
        let raw = b"hello".to_vec();
        let encoded = encode_block(&raw, codec.as_ref(), 1, None).unwrap();
        let decoded = decode_block(
            &encoded.archive_bytes,
            encoded.archive_checksum.wrapping_add(1),
            encoded.compress_algo,
            encoded.encrypt_algo,
            None,
        )
        .unwrap();
        assert!(decoded.corrupt);
        assert!(decoded.data.is_empty());
    }
}
