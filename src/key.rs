use std::fmt;

use const_oid::ObjectIdentifier;
use const_oid::db::{rfc5912, rfc8410};
use der::asn1::{Any, BitString};
use der::{Decode, Encode};
use ed25519_dalek::{SigningKey as Ed25519SigningKey, VerifyingKey as Ed25519VerifyingKey};
use p256::ecdsa::{SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey};
use p256::elliptic_curve;
use p384::ecdsa::{SigningKey as P384SigningKey, VerifyingKey as P384VerifyingKey};
use p521::ecdsa::{SigningKey as P521SigningKey, VerifyingKey as P521VerifyingKey};
use pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs1v15::{
    Signature as RsaSignature, SigningKey as RsaSigningKey, VerifyingKey as RsaVerifyingKey,
};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Sha256, Sha384, Sha512};
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::cert::SignatureAlgorithm;
use crate::error::{PkiError, Result};

/// Supported key types for certificate operations.
#[derive(Clone)]
pub enum KeyPair {
    Rsa {
        private: Box<RsaPrivateKey>,
        public: RsaPublicKey,
    },
    EcdsaP256 {
        signing_key: P256SigningKey,
        verifying_key: P256VerifyingKey,
    },
    EcdsaP384 {
        signing_key: P384SigningKey,
        verifying_key: P384VerifyingKey,
    },
    EcdsaP521 {
        signing_key: P521SigningKey,
        verifying_key: P521VerifyingKey,
    },
    Ed25519 {
        signing_key: Ed25519SigningKey,
    },
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("algorithm", &self.algorithm_name())
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)?;
        let public = RsaPublicKey::from(&private);
        Ok(KeyPair::Rsa {
            private: Box::new(private),
            public,
        })
    }

    /// Generate an ECDSA P-256 key pair.
    pub fn generate_ecdsa_p256() -> Self {
        let signing_key = P256SigningKey::random(&mut rand_core::OsRng);
        let verifying_key = signing_key.verifying_key().to_owned();
        KeyPair::EcdsaP256 {
            signing_key,
            verifying_key,
        }
    }

    /// Generate an ECDSA P-384 key pair.
    pub fn generate_ecdsa_p384() -> Self {
        let signing_key = P384SigningKey::random(&mut rand_core::OsRng);
        let verifying_key = signing_key.verifying_key().to_owned();
        KeyPair::EcdsaP384 {
            signing_key,
            verifying_key,
        }
    }

    /// Generate an ECDSA P-521 key pair.
    pub fn generate_ecdsa_p521() -> Self {
        let signing_key = P521SigningKey::random(&mut rand_core::OsRng);
        let verifying_key = P521VerifyingKey::from(&signing_key);
        KeyPair::EcdsaP521 {
            signing_key,
            verifying_key,
        }
    }

    /// Generate an Ed25519 key pair.
    pub fn generate_ed25519() -> Self {
        let signing_key = Ed25519SigningKey::generate(&mut rand_core::OsRng);
        KeyPair::Ed25519 { signing_key }
    }

    pub fn algorithm_name(&self) -> &'static str {
        match self {
            KeyPair::Rsa { .. } => "RSA",
            KeyPair::EcdsaP256 { .. } => "ECDSA P-256",
            KeyPair::EcdsaP384 { .. } => "ECDSA P-384",
            KeyPair::EcdsaP521 { .. } => "ECDSA P-521",
            KeyPair::Ed25519 { .. } => "Ed25519",
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_key_pair(self)
    }

    /// Returns the SubjectPublicKeyInfo of the public half.
    pub fn as_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        self.public_key().to_spki()
    }

    /// The algorithm this key signs with unless told otherwise.
    pub fn default_signature_algorithm(&self) -> SignatureAlgorithm {
        match self {
            KeyPair::Rsa { .. } => SignatureAlgorithm::Sha256WithRSA,
            KeyPair::EcdsaP256 { .. } => SignatureAlgorithm::Sha256WithECDSA,
            KeyPair::EcdsaP384 { .. } => SignatureAlgorithm::Sha384WithECDSA,
            KeyPair::EcdsaP521 { .. } => SignatureAlgorithm::Sha512WithECDSA,
            KeyPair::Ed25519 { .. } => SignatureAlgorithm::Ed25519,
        }
    }

    /// Signs `data` with the key's default algorithm.
    pub fn sign_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.sign_with(&self.default_signature_algorithm(), data)
    }

    /// Signs `data` with an explicit algorithm.
    ///
    /// ECDSA signatures are returned DER-encoded, as X.509 expects. A key and
    /// algorithm that do not belong together yield [`PkiError::Signing`].
    pub fn sign_with(&self, algorithm: &SignatureAlgorithm, data: &[u8]) -> Result<Vec<u8>> {
        let signing_error = |e: rsa::signature::Error| PkiError::Signing(e.to_string());
        match (self, algorithm) {
            (KeyPair::Rsa { private, .. }, SignatureAlgorithm::Sha256WithRSA) => {
                let signing_key = RsaSigningKey::<Sha256>::new(*private.clone());
                Ok(signing_key.try_sign(data).map_err(signing_error)?.to_vec())
            }
            (KeyPair::Rsa { private, .. }, SignatureAlgorithm::Sha384WithRSA) => {
                let signing_key = RsaSigningKey::<Sha384>::new(*private.clone());
                Ok(signing_key.try_sign(data).map_err(signing_error)?.to_vec())
            }
            (KeyPair::Rsa { private, .. }, SignatureAlgorithm::Sha512WithRSA) => {
                let signing_key = RsaSigningKey::<Sha512>::new(*private.clone());
                Ok(signing_key.try_sign(data).map_err(signing_error)?.to_vec())
            }
            (KeyPair::EcdsaP256 { signing_key, .. }, SignatureAlgorithm::Sha256WithECDSA) => {
                let signature: p256::ecdsa::Signature =
                    signing_key.try_sign(data).map_err(signing_error)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            (KeyPair::EcdsaP384 { signing_key, .. }, SignatureAlgorithm::Sha384WithECDSA) => {
                let signature: p384::ecdsa::Signature =
                    signing_key.try_sign(data).map_err(signing_error)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            (KeyPair::EcdsaP521 { signing_key, .. }, SignatureAlgorithm::Sha512WithECDSA) => {
                let signature: p521::ecdsa::Signature =
                    signing_key.try_sign(data).map_err(signing_error)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            (KeyPair::Ed25519 { signing_key }, SignatureAlgorithm::Ed25519) => {
                let signature = signing_key.try_sign(data).map_err(signing_error)?;
                Ok(signature.to_bytes().to_vec())
            }
            (key, algorithm) => Err(PkiError::Signing(format!(
                "{} key cannot produce {:?} signatures",
                key.algorithm_name(),
                algorithm
            ))),
        }
    }

    /// Imports a PKCS#8 DER private key.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let info = pkcs8::PrivateKeyInfo::try_from(der)?;
        match info.algorithm.oid {
            rfc5912::RSA_ENCRYPTION => {
                let private = RsaPrivateKey::from_pkcs8_der(der)?;
                let public = RsaPublicKey::from(&private);
                Ok(KeyPair::Rsa {
                    private: Box::new(private),
                    public,
                })
            }
            rfc5912::ID_EC_PUBLIC_KEY => {
                let curve: ObjectIdentifier = info
                    .algorithm
                    .parameters
                    .ok_or_else(|| PkiError::DecodingError("EC key without curve".to_string()))?
                    .decode_as()?;
                let key_error = |e: &dyn fmt::Display| PkiError::KeyGenerationError(e.to_string());
                match curve {
                    rfc5912::SECP_256_R_1 => {
                        let secret = p256::SecretKey::from_pkcs8_der(der)?;
                        let signing_key = P256SigningKey::from_bytes(&secret.to_bytes())
                            .map_err(|e| key_error(&e))?;
                        let verifying_key = signing_key.verifying_key().to_owned();
                        Ok(KeyPair::EcdsaP256 {
                            signing_key,
                            verifying_key,
                        })
                    }
                    rfc5912::SECP_384_R_1 => {
                        let secret = p384::SecretKey::from_pkcs8_der(der)?;
                        let signing_key = P384SigningKey::from_bytes(&secret.to_bytes())
                            .map_err(|e| key_error(&e))?;
                        let verifying_key = signing_key.verifying_key().to_owned();
                        Ok(KeyPair::EcdsaP384 {
                            signing_key,
                            verifying_key,
                        })
                    }
                    rfc5912::SECP_521_R_1 => {
                        let secret = p521::SecretKey::from_pkcs8_der(der)?;
                        let signing_key = P521SigningKey::from_bytes(&secret.to_bytes())
                            .map_err(|e| key_error(&e))?;
                        let verifying_key = P521VerifyingKey::from(&signing_key);
                        Ok(KeyPair::EcdsaP521 {
                            signing_key,
                            verifying_key,
                        })
                    }
                    other => Err(PkiError::DecodingError(format!(
                        "unsupported elliptic curve {other}"
                    ))),
                }
            }
            rfc8410::ID_ED_25519 => Ok(KeyPair::Ed25519 {
                signing_key: Ed25519SigningKey::from_pkcs8_der(der)?,
            }),
            other => Err(PkiError::DecodingError(format!(
                "unsupported private key algorithm {other}"
            ))),
        }
    }

    /// Imports a PKCS#1 DER RSA private key.
    pub fn import_from_pkcs1_der(der: &[u8]) -> Result<Self> {
        let private = RsaPrivateKey::from_pkcs1_der(der)?;
        let public = RsaPublicKey::from(&private);
        Ok(KeyPair::Rsa {
            private: Box::new(private),
            public,
        })
    }

    /// Exports the private key as PKCS#8 DER.
    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>> {
        let key_error = |e: elliptic_curve::Error| PkiError::EncodingError(e.to_string());
        let document = match self {
            KeyPair::Rsa { private, .. } => private.to_pkcs8_der()?,
            KeyPair::EcdsaP256 { signing_key, .. } => {
                p256::SecretKey::from_bytes(&signing_key.to_bytes())
                    .map_err(key_error)?
                    .to_pkcs8_der()?
            }
            KeyPair::EcdsaP384 { signing_key, .. } => {
                p384::SecretKey::from_bytes(&signing_key.to_bytes())
                    .map_err(key_error)?
                    .to_pkcs8_der()?
            }
            KeyPair::EcdsaP521 { signing_key, .. } => {
                p521::SecretKey::from_bytes(&signing_key.to_bytes())
                    .map_err(key_error)?
                    .to_pkcs8_der()?
            }
            KeyPair::Ed25519 { signing_key } => signing_key.to_pkcs8_der()?,
        };
        Ok(document.as_bytes().to_vec())
    }
}

/// The public half of a [`KeyPair`], or a key read from a certificate.
#[derive(Clone)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcdsaP256(P256VerifyingKey),
    EcdsaP384(P384VerifyingKey),
    EcdsaP521(P521VerifyingKey),
    Ed25519(Ed25519VerifyingKey),
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let algorithm = match self {
            PublicKey::Rsa(_) => "RSA",
            PublicKey::EcdsaP256(_) => "ECDSA P-256",
            PublicKey::EcdsaP384(_) => "ECDSA P-384",
            PublicKey::EcdsaP521(_) => "ECDSA P-521",
            PublicKey::Ed25519(_) => "Ed25519",
        };
        f.debug_tuple("PublicKey").field(&algorithm).finish()
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        match (self.to_der(), other.to_der()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl PublicKey {
    pub fn from_key_pair(key_pair: &KeyPair) -> Self {
        match key_pair {
            KeyPair::Rsa { public, .. } => PublicKey::Rsa(public.clone()),
            KeyPair::EcdsaP256 { verifying_key, .. } => PublicKey::EcdsaP256(*verifying_key),
            KeyPair::EcdsaP384 { verifying_key, .. } => PublicKey::EcdsaP384(*verifying_key),
            KeyPair::EcdsaP521 { verifying_key, .. } => {
                PublicKey::EcdsaP521(verifying_key.clone())
            }
            KeyPair::Ed25519 { signing_key } => PublicKey::Ed25519(signing_key.verifying_key()),
        }
    }

    /// Converts the key to a SubjectPublicKeyInfo structure.
    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let spki = match self {
            PublicKey::Rsa(public) => SubjectPublicKeyInfoOwned::from_key(public.clone())?,
            PublicKey::EcdsaP256(verifying_key) => {
                SubjectPublicKeyInfoOwned::from_key(*verifying_key)?
            }
            PublicKey::EcdsaP384(verifying_key) => {
                SubjectPublicKeyInfoOwned::from_key(*verifying_key)?
            }
            PublicKey::EcdsaP521(verifying_key) => SubjectPublicKeyInfoOwned {
                algorithm: AlgorithmIdentifierOwned {
                    oid: rfc5912::ID_EC_PUBLIC_KEY,
                    parameters: Some(Any::encode_from(&rfc5912::SECP_521_R_1)?),
                },
                subject_public_key: BitString::from_bytes(
                    verifying_key.to_encoded_point(false).as_bytes(),
                )?,
            },
            PublicKey::Ed25519(verifying_key) => SubjectPublicKeyInfoOwned {
                algorithm: AlgorithmIdentifierOwned {
                    oid: rfc8410::ID_ED_25519,
                    parameters: None,
                },
                subject_public_key: BitString::from_bytes(verifying_key.as_bytes())?,
            },
        };
        Ok(spki)
    }

    /// Reads a key out of a SubjectPublicKeyInfo structure.
    pub fn from_x509spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        let raw = spki.subject_public_key.raw_bytes();
        let invalid_key = |e: &dyn fmt::Display| PkiError::DecodingError(e.to_string());
        match spki.algorithm.oid {
            rfc5912::RSA_ENCRYPTION => Ok(PublicKey::Rsa(RsaPublicKey::from_pkcs1_der(raw)?)),
            rfc5912::ID_EC_PUBLIC_KEY => {
                let curve: ObjectIdentifier = spki
                    .algorithm
                    .parameters
                    .as_ref()
                    .ok_or_else(|| PkiError::DecodingError("EC key without curve".to_string()))?
                    .decode_as()?;
                match curve {
                    rfc5912::SECP_256_R_1 => P256VerifyingKey::from_sec1_bytes(raw)
                        .map(PublicKey::EcdsaP256)
                        .map_err(|e| invalid_key(&e)),
                    rfc5912::SECP_384_R_1 => P384VerifyingKey::from_sec1_bytes(raw)
                        .map(PublicKey::EcdsaP384)
                        .map_err(|e| invalid_key(&e)),
                    rfc5912::SECP_521_R_1 => P521VerifyingKey::from_sec1_bytes(raw)
                        .map(PublicKey::EcdsaP521)
                        .map_err(|e| invalid_key(&e)),
                    other => Err(PkiError::DecodingError(format!(
                        "unsupported elliptic curve {other}"
                    ))),
                }
            }
            rfc8410::ID_ED_25519 => {
                let bytes: [u8; 32] = raw.try_into().map_err(|_| {
                    PkiError::DecodingError("Ed25519 key must be 32 bytes".to_string())
                })?;
                Ed25519VerifyingKey::from_bytes(&bytes)
                    .map(PublicKey::Ed25519)
                    .map_err(|e| invalid_key(&e))
            }
            other => Err(PkiError::DecodingError(format!(
                "unsupported public key algorithm {other}"
            ))),
        }
    }

    /// SubjectPublicKeyInfo DER.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.to_spki()?.to_der()?)
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        Self::from_x509spki(&SubjectPublicKeyInfoOwned::from_der(der)?)
    }

    /// Checks `signature` over `data`.
    ///
    /// Returns false for a malformed signature or an algorithm that does not
    /// belong to this key type.
    pub fn verify(&self, algorithm: &SignatureAlgorithm, data: &[u8], signature: &[u8]) -> bool {
        match (self, algorithm) {
            (PublicKey::Rsa(public), SignatureAlgorithm::Sha256WithRSA) => {
                RsaSignature::try_from(signature).is_ok_and(|sig| {
                    RsaVerifyingKey::<Sha256>::new(public.clone())
                        .verify(data, &sig)
                        .is_ok()
                })
            }
            (PublicKey::Rsa(public), SignatureAlgorithm::Sha384WithRSA) => {
                RsaSignature::try_from(signature).is_ok_and(|sig| {
                    RsaVerifyingKey::<Sha384>::new(public.clone())
                        .verify(data, &sig)
                        .is_ok()
                })
            }
            (PublicKey::Rsa(public), SignatureAlgorithm::Sha512WithRSA) => {
                RsaSignature::try_from(signature).is_ok_and(|sig| {
                    RsaVerifyingKey::<Sha512>::new(public.clone())
                        .verify(data, &sig)
                        .is_ok()
                })
            }
            (PublicKey::EcdsaP256(verifying_key), SignatureAlgorithm::Sha256WithECDSA) => {
                p256::ecdsa::Signature::from_der(signature)
                    .is_ok_and(|sig| verifying_key.verify(data, &sig).is_ok())
            }
            (PublicKey::EcdsaP384(verifying_key), SignatureAlgorithm::Sha384WithECDSA) => {
                p384::ecdsa::Signature::from_der(signature)
                    .is_ok_and(|sig| verifying_key.verify(data, &sig).is_ok())
            }
            (PublicKey::EcdsaP521(verifying_key), SignatureAlgorithm::Sha512WithECDSA) => {
                p521::ecdsa::Signature::from_der(signature)
                    .is_ok_and(|sig| verifying_key.verify(data, &sig).is_ok())
            }
            (PublicKey::Ed25519(verifying_key), SignatureAlgorithm::Ed25519) => {
                ed25519_dalek::Signature::from_slice(signature)
                    .is_ok_and(|sig| verifying_key.verify(data, &sig).is_ok())
            }
            _ => false,
        }
    }
}
