//! Password-based encryption for backup files.
//!
//! Layout of an encrypted file:
//!
//! ```text
//! salt (16) || nonce (12) || AES-256-GCM ciphertext + tag
//! ```
//!
//! The key is derived with PBKDF2-HMAC-SHA256 from the password and the salt.
//! Salt and nonce are fresh for every file. There is no magic prefix; a file
//! is treated as plaintext exactly when it is valid UTF-8.

use aes_gcm::{
  Aes256Gcm, Key, Nonce,
  aead::{Aead, KeyInit},
};
use rand_core::{OsRng, RngCore};
use sha2::Sha256;

use crate::{Error, Result};

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
pub const KEY_LEN: usize = 32;
/// AES-GCM authentication tag length.
pub const TAG_LEN: usize = 16;
pub const PBKDF2_ROUNDS: u32 = 100_000;

/// Derive a 256-bit key from `password` and `salt`.
pub fn derive_key(password: &str, salt: &[u8]) -> [u8; KEY_LEN] {
  let mut key = [0u8; KEY_LEN];
  pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ROUNDS, &mut key);
  key
}

/// Encrypt `plaintext` under a key derived from `password` with a new salt.
pub fn seal(password: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
  let mut salt = [0u8; SALT_LEN];
  OsRng.fill_bytes(&mut salt);
  let mut nonce = [0u8; NONCE_LEN];
  OsRng.fill_bytes(&mut nonce);

  let key = derive_key(password, &salt);
  let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
  let ciphertext = cipher
    .encrypt(Nonce::from_slice(&nonce), plaintext)
    .map_err(|_| Error::Encryption)?;

  let mut out = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
  out.extend_from_slice(&salt);
  out.extend_from_slice(&nonce);
  out.extend_from_slice(&ciphertext);
  Ok(out)
}

/// Reverse [`seal`]. Any failure, including a short input, is
/// [`Error::Crypto`].
pub fn open(password: &str, sealed: &[u8]) -> Result<Vec<u8>> {
  if sealed.len() < SALT_LEN + NONCE_LEN + TAG_LEN {
    return Err(Error::Crypto);
  }
  let (salt, rest) = sealed.split_at(SALT_LEN);
  let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

  let key = derive_key(password, salt);
  let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
  cipher
    .decrypt(Nonce::from_slice(nonce), ciphertext)
    .map_err(|_| Error::Crypto)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn seal_then_open() {
    let sealed = seal("correct horse", b"{\"version\":\"1.0\"}").unwrap();
    assert_eq!(open("correct horse", &sealed).unwrap(), b"{\"version\":\"1.0\"}");
  }

  #[test]
  fn wrong_password_fails() {
    let sealed = seal("right", b"payload").unwrap();
    assert!(matches!(open("wrong", &sealed), Err(Error::Crypto)));
  }

  #[test]
  fn tampered_ciphertext_fails() {
    let mut sealed = seal("pw", b"payload").unwrap();
    let last = sealed.len() - 1;
    sealed[last] ^= 0x01;
    assert!(matches!(open("pw", &sealed), Err(Error::Crypto)));
  }

  #[test]
  fn short_input_fails() {
    assert!(matches!(open("pw", &[0u8; 20]), Err(Error::Crypto)));
  }

  #[test]
  fn salt_is_fresh_per_file() {
    let a = seal("pw", b"same").unwrap();
    let b = seal("pw", b"same").unwrap();
    assert_ne!(a[..SALT_LEN], b[..SALT_LEN]);
    assert_eq!(a.len(), SALT_LEN + NONCE_LEN + 4 + TAG_LEN);
  }
}
