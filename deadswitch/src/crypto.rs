//! Key material (4.A) and the AEAD codec (4.B) that encrypts a switch's
//! sensitive fields at rest.

use std::path::Path;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use rand::RngCore;

use crate::error::{Error, Result};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::write(path, bytes)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Loads the 32-byte symmetric AEAD key from `path`, generating and
/// persisting a fresh one (mode 0600) if the file is missing. Never
/// overwrites an existing file.
pub fn load_or_create_symmetric_key(path: &Path) -> Result<(bool, [u8; KEY_LEN])> {
    if path.exists() {
        let bytes = std::fs::read(path)?;
        if bytes.len() != KEY_LEN {
            return Err(Error::config(format!(
                "symmetric key at {} has length {}, expected {KEY_LEN}",
                path.display(),
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&bytes);
        return Ok((true, key));
    }

    let mut key = [0u8; KEY_LEN];
    rand::rng().fill_bytes(&mut key);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_private(path, &key)?;
    Ok((false, key))
}

/// VAPID keypair, base64url-encoded the way the Web Push capability expects
/// to hand the public half to clients.
pub struct VapidKeyPair {
    pub private_key_raw: [u8; 32],
    pub public_key_b64: String,
}

/// Loads the VAPID (P-256) signing keypair from `priv_path`/`pub_path`,
/// generating and persisting a fresh pair (mode 0600 each) if either is
/// missing.
pub fn load_or_create_vapid(priv_path: &Path, pub_path: &Path) -> Result<VapidKeyPair> {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64URL;
    use p256::ecdsa::SigningKey;
    use p256::elliptic_curve::sec1::ToEncodedPoint;

    if priv_path.exists() && pub_path.exists() {
        let priv_bytes = std::fs::read(priv_path)?;
        if priv_bytes.len() != 32 {
            return Err(Error::config(format!(
                "VAPID private key at {} has length {}, expected 32",
                priv_path.display(),
                priv_bytes.len()
            )));
        }
        let mut private_key_raw = [0u8; 32];
        private_key_raw.copy_from_slice(&priv_bytes);
        let public_key_b64 = String::from_utf8(std::fs::read(pub_path)?)
            .map_err(|e| Error::config(format!("VAPID public key is not valid UTF-8: {e}")))?;
        return Ok(VapidKeyPair {
            private_key_raw,
            public_key_b64,
        });
    }

    let signing_key = SigningKey::random(&mut rand::rngs::OsRng);
    let private_key_raw: [u8; 32] = signing_key.to_bytes().into();
    let public_point = signing_key.verifying_key().to_encoded_point(false);
    let public_key_b64 = B64URL.encode(public_point.as_bytes());

    if let Some(parent) = priv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_private(priv_path, &private_key_raw)?;
    write_private(pub_path, public_key_b64.as_bytes())?;

    Ok(VapidKeyPair {
        private_key_raw,
        public_key_b64,
    })
}

/// AES-256-GCM codec over a process-wide symmetric key. On-disk form is
/// `base64(nonce ‖ ciphertext ‖ tag)`.
#[derive(Clone)]
pub struct Codec {
    key: [u8; KEY_LEN],
}

impl Codec {
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Encrypts `plaintext` with a fresh random nonce, returning the base64
    /// blob.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| Error::crypto(format!("encryption failed: {e}")))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(B64.encode(blob))
    }

    /// Decrypts a base64 blob produced by [`Codec::encrypt`].
    pub fn decrypt(&self, blob: &str) -> Result<Vec<u8>> {
        let raw = B64
            .decode(blob)
            .map_err(|e| Error::crypto(format!("invalid base64 ciphertext: {e}")))?;
        if raw.len() < NONCE_LEN {
            return Err(Error::crypto("ciphertext shorter than nonce"));
        }
        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| Error::crypto("GCM authentication failed"))
    }
}

/// Replaces `sw.message`, the serialized `sw.notifiers` list, and the
/// serialized `sw.push_subscription` with their ciphertexts when
/// `sw.encrypted` is set. The notifiers list collapses to a single opaque
/// element on disk — this is the mixed-mode column convention documented
/// in the design notes; [`decrypt_switch`] restores the original list.
pub fn encrypt_switch(codec: &Codec, sw: &mut crate::domain::Switch) -> Result<()> {
    if !sw.encrypted {
        return Ok(());
    }
    sw.message = codec.encrypt(sw.message.as_bytes())?;

    let notifiers_json = serde_json::to_vec(&sw.notifiers)?;
    sw.notifiers = vec![codec.encrypt(&notifiers_json)?];

    if let Some(sub) = &sw.push_subscription {
        let sub_json = serde_json::to_vec(sub)?;
        sw.push_subscription = Some(crate::domain::PushSubscription {
            endpoint: Some(codec.encrypt(&sub_json)?),
            p256dh: None,
            auth: None,
        });
    }
    Ok(())
}

/// The symmetric inverse of [`encrypt_switch`]. No-op when
/// `sw.encrypted == false`.
pub fn decrypt_switch(codec: &Codec, sw: &mut crate::domain::Switch) -> Result<()> {
    if !sw.encrypted {
        return Ok(());
    }
    sw.message = String::from_utf8(codec.decrypt(&sw.message)?)
        .map_err(|e| Error::crypto(format!("decrypted message is not valid UTF-8: {e}")))?;

    if let Some(blob) = sw.notifiers.first() {
        let plaintext = codec.decrypt(blob)?;
        sw.notifiers = serde_json::from_slice(&plaintext)?;
    }

    if let Some(sub) = &sw.push_subscription {
        if let Some(blob) = &sub.endpoint {
            let plaintext = codec.decrypt(blob)?;
            sw.push_subscription = Some(serde_json::from_slice(&plaintext)?);
        }
    }
    Ok(())
}
