use crate::core::errors::TransportError;
use base64::engine::general_purpose;
use base64::Engine;
use ed25519_dalek::pkcs8::DecodePrivateKey as _;
use hmac::{Hmac, Mac};
use rsa::signature::{SignatureEncoding, Signer as _};
use rsa::RsaPrivateKey;
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;
use std::path::Path;

/// The signing scheme, dispatched as a tagged union.
///
/// Exactly one scheme is configured per client; algorithm selection is a
/// total match over this enum rather than an implicit "which field is
/// non-empty" chain.
pub enum SigningScheme {
    /// Shared-secret HMAC-SHA256; signatures are lowercase hex.
    Hmac(Secret<String>),
    /// RSA PKCS#1 v1.5 over SHA-256; signatures are base64.
    Rsa(Box<RsaPrivateKey>),
    /// Ed25519 (no pre-hash); signatures are base64.
    Ed25519(Box<ed25519_dalek::SigningKey>),
}

impl std::fmt::Debug for SigningScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hmac(_) => f.write_str("SigningScheme::Hmac([REDACTED])"),
            Self::Rsa(_) => f.write_str("SigningScheme::Rsa([REDACTED])"),
            Self::Ed25519(_) => f.write_str("SigningScheme::Ed25519([REDACTED])"),
        }
    }
}

/// API credentials: the key identifying the account plus the private key
/// material used to prove possession of it.
///
/// Key-load failures surface immediately as
/// [`TransportError::Configuration`]; a client is never constructed with a
/// half-loaded credential.
pub struct Credentials {
    api_key: Secret<String>,
    scheme: SigningScheme,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .field("scheme", &self.scheme)
            .finish()
    }
}

impl Credentials {
    /// Shared-secret HMAC credentials.
    pub fn hmac(api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            scheme: SigningScheme::Hmac(Secret::new(secret.into())),
        }
    }

    /// RSA credentials from a PKCS#8 PEM string.
    pub fn rsa_from_pem(api_key: impl Into<String>, pem: &str) -> Result<Self, TransportError> {
        let key = RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| {
            TransportError::Configuration(format!("invalid RSA private key: {e}"))
        })?;
        Ok(Self {
            api_key: Secret::new(api_key.into()),
            scheme: SigningScheme::Rsa(Box::new(key)),
        })
    }

    /// RSA credentials from a PKCS#8 PEM file.
    pub fn rsa_from_pem_file(
        api_key: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Result<Self, TransportError> {
        let pem = read_key_file(path.as_ref())?;
        Self::rsa_from_pem(api_key, &pem)
    }

    /// Ed25519 credentials from a PKCS#8 PEM string.
    pub fn ed25519_from_pem(api_key: impl Into<String>, pem: &str) -> Result<Self, TransportError> {
        let key = ed25519_dalek::SigningKey::from_pkcs8_pem(pem).map_err(|e| {
            TransportError::Configuration(format!("invalid Ed25519 private key: {e}"))
        })?;
        Ok(Self {
            api_key: Secret::new(api_key.into()),
            scheme: SigningScheme::Ed25519(Box::new(key)),
        })
    }

    /// Ed25519 credentials from a PKCS#8 PEM file.
    pub fn ed25519_from_pem_file(
        api_key: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Result<Self, TransportError> {
        let pem = read_key_file(path.as_ref())?;
        Self::ed25519_from_pem(api_key, &pem)
    }

    /// Ed25519 credentials from a raw 32-byte seed, for venues that hand out
    /// bare key material instead of PEM files.
    pub fn ed25519_from_seed(api_key: impl Into<String>, seed: &[u8; 32]) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            scheme: SigningScheme::Ed25519(Box::new(ed25519_dalek::SigningKey::from_bytes(seed))),
        }
    }

    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    pub fn scheme(&self) -> &SigningScheme {
        &self.scheme
    }

    /// Sign a canonical byte string.
    ///
    /// The payload must be exactly the bytes that will be transmitted; callers
    /// are responsible for signing after all parameters are in place. Failures
    /// propagate; an empty signature is never returned in place of an error.
    pub fn sign(&self, payload: &[u8]) -> Result<String, TransportError> {
        match &self.scheme {
            SigningScheme::Hmac(secret) => {
                let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes())
                    .map_err(|e| TransportError::Signature(format!("invalid HMAC secret: {e}")))?;
                mac.update(payload);
                Ok(hex::encode(mac.finalize().into_bytes()))
            }
            SigningScheme::Rsa(key) => {
                let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new((**key).clone());
                let signature = signing_key
                    .try_sign(payload)
                    .map_err(|e| TransportError::Signature(format!("RSA signing failed: {e}")))?;
                Ok(general_purpose::STANDARD.encode(signature.to_bytes()))
            }
            SigningScheme::Ed25519(key) => {
                let signature = key.sign(payload);
                Ok(general_purpose::STANDARD.encode(signature.to_bytes()))
            }
        }
    }
}

fn read_key_file(path: &Path) -> Result<String, TransportError> {
    std::fs::read_to_string(path).map_err(|e| {
        TransportError::Configuration(format!("failed to read key file {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::Verifier;

    #[test]
    fn hmac_signatures_match_known_vectors() {
        let cases = [
            (
                "api-secret",
                "interval=1m&symbol=ETHUSDT",
                "c14fcfde07daf095fe95f644c524183d4f0f588f9b6cdfc8e6e26918ae0b4b16",
            ),
            (
                "another-secret",
                "limit=500&symbol=BTCUSDT",
                "f0d9c6e78b1f6acd4ce45ffb9657a713a176a9c09bb2ca38a10d524551c66f05",
            ),
            (
                "s3cr3t",
                "",
                "3c81cc9496e1c25250f6ccb85f697c1bb623e3480d6538ad8cb6a6648142777d",
            ),
        ];
        for (secret, payload, expected) in cases {
            let creds = Credentials::hmac("key", secret);
            assert_eq!(creds.sign(payload.as_bytes()).unwrap(), expected);
        }
    }

    #[test]
    fn hmac_is_stable_across_calls() {
        let creds = Credentials::hmac("key", "s3cr3t");
        let first = creds.sign(b"symbol=BTCUSDT").unwrap();
        let second = creds.sign(b"symbol=BTCUSDT").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn ed25519_signature_verifies_against_public_key() {
        let seed = [7u8; 32];
        let creds = Credentials::ed25519_from_seed("key", &seed);
        let payload = b"symbol=BTCUSDT&timestamp=1499827319559";

        let encoded = creds.sign(payload).unwrap();
        let raw = general_purpose::STANDARD.decode(&encoded).unwrap();
        let signature = ed25519_dalek::Signature::from_slice(&raw).unwrap();

        let verifying_key = ed25519_dalek::SigningKey::from_bytes(&seed).verifying_key();
        verifying_key.verify(payload, &signature).unwrap();
    }

    #[test]
    fn rsa_signature_verifies_against_public_key() {
        let private_key = RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).unwrap();
        let verifying_key =
            rsa::pkcs1v15::VerifyingKey::<Sha256>::new(private_key.to_public_key());
        let creds = Credentials {
            api_key: Secret::new("key".to_string()),
            scheme: SigningScheme::Rsa(Box::new(private_key)),
        };
        let payload = b"symbol=BTCUSDT&timestamp=1499827319559";

        let encoded = creds.sign(payload).unwrap();
        let raw = general_purpose::STANDARD.decode(&encoded).unwrap();
        let signature = rsa::pkcs1v15::Signature::try_from(raw.as_slice()).unwrap();
        verifying_key.verify(payload, &signature).unwrap();
    }

    #[test]
    fn invalid_pem_is_a_configuration_error() {
        let err = Credentials::rsa_from_pem("key", "not a pem").unwrap_err();
        assert!(matches!(err, TransportError::Configuration(_)));

        let err = Credentials::ed25519_from_pem("key", "not a pem").unwrap_err();
        assert!(matches!(err, TransportError::Configuration(_)));
    }

    #[test]
    fn missing_key_file_is_a_configuration_error() {
        let err = Credentials::rsa_from_pem_file("key", "/nonexistent/key.pem").unwrap_err();
        assert!(matches!(err, TransportError::Configuration(_)));
    }

    #[test]
    fn debug_output_redacts_key_material() {
        let creds = Credentials::hmac("very-secret-key", "very-secret-secret");
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
