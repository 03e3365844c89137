//! Sealed-artifact codec.
//!
//! The on-disk artifact is raw AES-256-CBC ciphertext of a UTF-8 JSON
//! record. Key and IV are derived from the machine fingerprint with
//! PBKDF2-HMAC-SHA256. The derivation parameters and salt are fixed:
//! artifacts sealed on one version must open on any other, so none of the
//! constants below may change.

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use warden_core::{Error, Result};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const SALT: &[u8] = b"YourSuperSalt!@#";
const ITERATIONS: u32 = 100_000;

const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

/// AES key and IV derived from a fingerprint.
struct KeyMaterial {
    key: [u8; KEY_LEN],
    iv: [u8; IV_LEN],
}

fn derive(fingerprint: &str) -> KeyMaterial {
    let mut okm = [0u8; KEY_LEN + IV_LEN];
    pbkdf2_hmac::<Sha256>(fingerprint.as_bytes(), SALT, ITERATIONS, &mut okm);

    let mut material = KeyMaterial {
        key: [0u8; KEY_LEN],
        iv: [0u8; IV_LEN],
    };
    material.key.copy_from_slice(&okm[..KEY_LEN]);
    material.iv.copy_from_slice(&okm[KEY_LEN..]);
    material
}

/// Encrypt `plaintext` under a key derived from `fingerprint`.
pub fn seal(plaintext: &[u8], fingerprint: &str) -> Vec<u8> {
    let material = derive(fingerprint);
    Aes256CbcEnc::new_from_slices(&material.key, &material.iv)
        .expect("derived key and iv have fixed lengths")
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Decrypt `ciphertext` with a key derived from `fingerprint`.
///
/// Any padding or length error means the artifact is corrupt or was sealed
/// on a different machine; callers must treat that as a hard configuration
/// error, not retry.
pub fn open(ciphertext: &[u8], fingerprint: &str) -> Result<Vec<u8>> {
    let material = derive(fingerprint);
    Aes256CbcDec::new_from_slices(&material.key, &material.iv)
        .expect("derived key and iv have fixed lengths")
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| Error::CorruptOrTampered)
}
