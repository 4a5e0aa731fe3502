//! `PushSender` capability: signs and delivers a Web Push message (RFC 8291
//! content encryption + RFC 8292 VAPID authorization) to a single
//! subscriber's endpoint.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64URL;
use hkdf::Hkdf;
use p256::ecdh::diffie_hellman;
use p256::ecdsa::SigningKey;
use p256::ecdsa::signature::Signer;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use rand::RngCore;
use serde::Serialize;
use sha2::Sha256;

use crate::domain::PushSubscription;
use crate::error::{Error, Result};

const RECORD_SIZE: u32 = 4096;

#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, sub: &PushSubscription, title: &str, body: &str) -> Result<()>;
}

/// Used in tests and whenever Web Push is not configured: a subscription
/// that is present but unusable is already a no-op at the dispatcher layer,
/// this sender backs that up by always succeeding trivially.
pub struct NoopPushSender;

#[async_trait]
impl PushSender for NoopPushSender {
    async fn send(&self, _sub: &PushSubscription, _title: &str, _body: &str) -> Result<()> {
        Ok(())
    }
}

pub struct VapidPushSender {
    signing_key: SigningKey,
    public_key_b64: String,
    subject: String,
    client: reqwest::Client,
}

impl VapidPushSender {
    pub fn new(private_key_raw: [u8; 32], public_key_b64: String, subject: String) -> Result<Self> {
        let signing_key = SigningKey::from_bytes((&private_key_raw).into())
            .map_err(|e| Error::config(format!("invalid VAPID private key: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Ok(Self {
            signing_key,
            public_key_b64,
            subject,
            client,
        })
    }

    fn audience(endpoint: &str) -> Result<String> {
        let url = url::Url::parse(endpoint).map_err(|e| Error::notify(format!("bad push endpoint: {e}")))?;
        let host = url.host_str().ok_or_else(|| Error::notify("push endpoint has no host"))?;
        Ok(format!("{}://{}", url.scheme(), host))
    }

    fn build_vapid_jwt(&self, endpoint: &str, now_unix: i64) -> Result<String> {
        #[derive(Serialize)]
        struct Header<'a> {
            typ: &'a str,
            alg: &'a str,
        }
        #[derive(Serialize)]
        struct Claims<'a> {
            aud: String,
            exp: i64,
            sub: &'a str,
        }

        let header = serde_json::to_vec(&Header { typ: "JWT", alg: "ES256" })?;
        let claims = serde_json::to_vec(&Claims {
            aud: Self::audience(endpoint)?,
            exp: now_unix + 12 * 3600,
            sub: &self.subject,
        })?;

        let signing_input = format!("{}.{}", B64URL.encode(header), B64URL.encode(claims));
        let signature: p256::ecdsa::Signature = self.signing_key.sign(signing_input.as_bytes());
        Ok(format!("{signing_input}.{}", B64URL.encode(signature.to_bytes())))
    }

    /// RFC 8291 `aes128gcm` content encoding: derives a content-encryption
    /// key and nonce from an ephemeral ECDH exchange with the subscriber's
    /// `p256dh` key and its `auth` secret, then prepends the record header
    /// salt/rs/ephemeral-key to the ciphertext.
    fn encrypt_payload(p256dh_b64: &str, auth_b64: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        use aes_gcm::aead::{Aead, KeyInit};
        use aes_gcm::{Aes128Gcm, Key, Nonce};

        let client_public_raw = B64URL
            .decode(p256dh_b64)
            .map_err(|e| Error::notify(format!("invalid p256dh: {e}")))?;
        let auth_secret = B64URL
            .decode(auth_b64)
            .map_err(|e| Error::notify(format!("invalid auth secret: {e}")))?;
        let client_public = PublicKey::from_sec1_bytes(&client_public_raw)
            .map_err(|e| Error::notify(format!("invalid subscriber public key: {e}")))?;

        let ephemeral_secret = SecretKey::random(&mut rand::rngs::OsRng);
        let ephemeral_public = ephemeral_secret.public_key();
        let ephemeral_public_raw = ephemeral_public.to_encoded_point(false).as_bytes().to_vec();

        let shared = diffie_hellman(ephemeral_secret.to_nonzero_scalar(), client_public.as_affine());

        let mut salt = [0u8; 16];
        rand::rng().fill_bytes(&mut salt);

        let mut key_info = Vec::with_capacity(144);
        key_info.extend_from_slice(b"WebPush: info\0");
        key_info.extend_from_slice(&client_public_raw);
        key_info.extend_from_slice(&ephemeral_public_raw);

        let prk = Hkdf::<Sha256>::new(Some(&auth_secret), shared.raw_secret_bytes());
        let mut ikm = [0u8; 32];
        prk.expand(&key_info, &mut ikm)
            .map_err(|_| Error::notify("HKDF expand (ikm) failed"))?;

        let keyed = Hkdf::<Sha256>::new(Some(&salt), &ikm);
        let mut cek = [0u8; 16];
        keyed
            .expand(b"Content-Encoding: aes128gcm\0", &mut cek)
            .map_err(|_| Error::notify("HKDF expand (cek) failed"))?;
        let mut nonce_bytes = [0u8; 12];
        keyed
            .expand(b"Content-Encoding: nonce\0", &mut nonce_bytes)
            .map_err(|_| Error::notify("HKDF expand (nonce) failed"))?;

        // Single-record padding delimiter: 0x02 then no further padding.
        let mut padded = Vec::with_capacity(plaintext.len() + 1);
        padded.extend_from_slice(plaintext);
        padded.push(0x02);

        let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(&cek));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), padded.as_slice())
            .map_err(|e| Error::notify(format!("push payload encryption failed: {e}")))?;

        let mut record = Vec::with_capacity(16 + 4 + 1 + ephemeral_public_raw.len() + ciphertext.len());
        record.extend_from_slice(&salt);
        record.extend_from_slice(&RECORD_SIZE.to_be_bytes());
        record.push(ephemeral_public_raw.len() as u8);
        record.extend_from_slice(&ephemeral_public_raw);
        record.extend_from_slice(&ciphertext);
        Ok(record)
    }
}

#[async_trait]
impl PushSender for VapidPushSender {
    async fn send(&self, sub: &PushSubscription, title: &str, body: &str) -> Result<()> {
        let (Some(endpoint), Some(p256dh), Some(auth)) =
            (sub.endpoint.as_deref(), sub.p256dh.as_deref(), sub.auth.as_deref())
        else {
            return Ok(());
        };
        if endpoint.is_empty() {
            return Ok(());
        }

        let payload = serde_json::json!({ "title": title, "body": body }).to_string();
        let record = Self::encrypt_payload(p256dh, auth, payload.as_bytes())?;

        let now = chrono::Utc::now().timestamp();
        let jwt = self.build_vapid_jwt(endpoint, now)?;
        let authorization = format!("vapid t={jwt}, k={}", self.public_key_b64);

        let response = self
            .client
            .post(endpoint)
            .header("TTL", "86400")
            .header("Content-Encoding", "aes128gcm")
            .header("Content-Type", "application/octet-stream")
            .header("Authorization", authorization)
            .body(record)
            .send()
            .await
            .map_err(|e| Error::notify(format!("push request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::notify(format!("push endpoint returned {status}")));
        }
        Ok(())
    }
}
