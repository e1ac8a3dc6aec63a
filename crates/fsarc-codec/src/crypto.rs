//! Pluggable encryption algorithms, overlaid on already-compressed bytes.

use blowfish::Blowfish;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use rand::rngs::OsRng;

use fsarc_dtyp::Error;

use crate::algo::EncryptAlgo;

type BlowfishCbcEnc = cbc::Encryptor<Blowfish>;
type BlowfishCbcDec = cbc::Decryptor<Blowfish>;

/// One encryption algorithm. A fresh instance is keyed once (from a
/// password-derived key) and reused for every block of one archive.
pub trait EncryptionAlgo: std::fmt::Debug + Send {
    fn id(&self) -> EncryptAlgo;
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, Error>;
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, Error>;
    fn clone_box(&self) -> Box<dyn EncryptionAlgo>;
}

impl Clone for Box<dyn EncryptionAlgo> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Builds the algorithm for `algo`, keyed from `password`'s raw bytes
/// (Blowfish accepts keys from 4 to 56 bytes; longer passwords are
/// truncated).
pub fn algo_for(algo: EncryptAlgo, password: &[u8]) -> Result<Box<dyn EncryptionAlgo>, Error> {
    Ok(match algo {
        EncryptAlgo::None => Box::new(NoneCrypt),
        EncryptAlgo::Blowfish => Box::new(BlowfishCrypt::new(password)),
    })
}

#[derive(Debug, Clone, Copy)]
struct NoneCrypt;

impl EncryptionAlgo for NoneCrypt {
    fn id(&self) -> EncryptAlgo {
        EncryptAlgo::None
    }
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(plaintext.to_vec())
    }
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(ciphertext.to_vec())
    }
    fn clone_box(&self) -> Box<dyn EncryptionAlgo> {
        Box::new(*self)
    }
}

/// Blowfish-CBC with a random per-message IV prepended to the ciphertext
/// and PKCS#7 padding, via the RustCrypto `blowfish`/`cbc` crates.
#[derive(Debug, Clone)]
struct BlowfishCrypt {
    key: Vec<u8>,
}

const BLOWFISH_BLOCK_SIZE: usize = 8;

impl BlowfishCrypt {
    fn new(password: &[u8]) -> Self {
        let key = password[..password.len().min(56)].to_vec();
        Self { key }
    }
}

impl EncryptionAlgo for BlowfishCrypt {
    fn id(&self) -> EncryptAlgo {
        EncryptAlgo::Blowfish
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        let mut iv = [0u8; BLOWFISH_BLOCK_SIZE];
        OsRng.fill_bytes(&mut iv);
        let enc = BlowfishCbcEnc::new_from_slices(&self.key, &iv)
            .map_err(|e| Error::Corrupt(format!("blowfish key/iv setup failed: {e}")))?;
        let ciphertext = enc.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mut out = Vec::with_capacity(iv.len() + ciphertext.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
        if ciphertext.len() < BLOWFISH_BLOCK_SIZE {
            return Err(Error::Corrupt("encrypted block shorter than one IV".into()));
        }
        let (iv, body) = ciphertext.split_at(BLOWFISH_BLOCK_SIZE);
        let dec = BlowfishCbcDec::new_from_slices(&self.key, iv)
            .map_err(|e| Error::Corrupt(format!("blowfish key/iv setup failed: {e}")))?;
        dec.decrypt_padded_vec_mut::<Pkcs7>(body)
            .map_err(|e| Error::Corrupt(format!("blowfish padding invalid (wrong password?): {e}")))
    }

    fn clone_box(&self) -> Box<dyn EncryptionAlgo> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blowfish_round_trips() {
        let algo = algo_for(EncryptAlgo::Blowfish, b"correct horse battery staple").unwrap();
        let plaintext = b"the archive header contents, here as a stand-in".to_vec();
        let ciphertext = algo.encrypt(&plaintext).unwrap();
        assert_ne!(ciphertext, plaintext);
        let roundtrip = algo.decrypt(&ciphertext).unwrap();
        assert_eq!(roundtrip, plaintext);
    }

    #[test]
    fn blowfish_rejects_the_wrong_password() {
        let saved = algo_for(EncryptAlgo::Blowfish, b"correcthorse").unwrap();
        let ciphertext = saved.encrypt(b"hello world").unwrap();

        let wrong = algo_for(EncryptAlgo::Blowfish, b"wrongpassword").unwrap();
        assert!(wrong.decrypt(&ciphertext).is_err());
    }

    #[test]
    fn none_is_identity() {
        let algo = algo_for(EncryptAlgo::None, b"").unwrap();
        let plaintext = b"unchanged".to_vec();
        assert_eq!(algo.encrypt(&plaintext).unwrap(), plaintext);
        assert_eq!(algo.decrypt(&plaintext).unwrap(), plaintext);
    }
}
