//! Subject and authority key identifiers.
//!
//! Both methods hash the contents of the `subjectPublicKey` BIT STRING with
//! SHA-1. [`KeyIdMethod::Type2`] keeps only the low-order 64 bits.

use rsa::BigUint;
use sha1::{Digest, Sha1};
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::Certificate;
use crate::cert::extensions::{AuthorityKeyIdentifier, SubjectKeyIdentifier};
use crate::error::Result;
use crate::key::PublicKey;
use crate::name::DistinguishedName;

/// Length of a Type-1 identifier.
pub const TYPE1_LEN: usize = 20;
/// Length of a Type-2 identifier.
pub const TYPE2_LEN: usize = 8;

/// Key identifier derivation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyIdMethod {
    /// Full 160-bit SHA-1 digest.
    #[default]
    Type1,
    /// Low-order 64 bits of the Type-1 digest.
    Type2,
}

/// Derives a key identifier from a SubjectPublicKeyInfo.
pub fn spki_key_identifier(spki: &SubjectPublicKeyInfoOwned, method: KeyIdMethod) -> Vec<u8> {
    let digest = Sha1::digest(spki.subject_public_key.raw_bytes());
    match method {
        KeyIdMethod::Type1 => digest.to_vec(),
        KeyIdMethod::Type2 => digest[TYPE1_LEN - TYPE2_LEN..].to_vec(),
    }
}

/// Derives a key identifier from a public key.
pub fn key_identifier(public_key: &PublicKey, method: KeyIdMethod) -> Result<Vec<u8>> {
    Ok(spki_key_identifier(&public_key.to_spki()?, method))
}

impl SubjectKeyIdentifier {
    pub fn from_public_key(public_key: &PublicKey, method: KeyIdMethod) -> Result<Self> {
        Ok(Self(key_identifier(public_key, method)?))
    }
}

impl AuthorityKeyIdentifier {
    /// An AKI naming the issuer by key identifier only.
    pub fn from_public_key(public_key: &PublicKey, method: KeyIdMethod) -> Result<Self> {
        Ok(Self {
            key_identifier: Some(key_identifier(public_key, method)?),
            authority_cert_issuer: None,
            authority_cert_serial_number: None,
        })
    }

    /// An AKI naming the issuer by its own issuer name and serial number.
    pub fn from_issuer_serial(issuer: DistinguishedName, serial: BigUint) -> Self {
        Self {
            key_identifier: None,
            authority_cert_issuer: Some(vec![issuer]),
            authority_cert_serial_number: Some(serial),
        }
    }

    /// An AKI pointing at `issuer_cert`.
    ///
    /// Uses the certificate's SubjectKeyIdentifier when it has one, otherwise
    /// a Type-1 identifier of its public key.
    pub fn from_certificate(issuer_cert: &Certificate) -> Result<Self> {
        let key_identifier = match issuer_cert.find_extension::<SubjectKeyIdentifier>()? {
            Some(ski) => ski.0,
            None => spki_key_identifier(issuer_cert.spki(), KeyIdMethod::Type1),
        };
        Ok(Self {
            key_identifier: Some(key_identifier),
            authority_cert_issuer: None,
            authority_cert_serial_number: None,
        })
    }
}
