//! Typed reading and writing of PEM streams.

use crate::cert::Certificate;
use crate::crl::CertificateRevocationList;
use crate::error::{PkiError, Result};
use crate::key::{KeyPair, PublicKey};
use crate::request::CertificateRequest;

pub const CERTIFICATE: &str = "CERTIFICATE";
pub const CERTIFICATE_REQUEST: &str = "CERTIFICATE REQUEST";
pub const NEW_CERTIFICATE_REQUEST: &str = "NEW CERTIFICATE REQUEST";
pub const X509_CRL: &str = "X509 CRL";
pub const PRIVATE_KEY: &str = "PRIVATE KEY";
pub const RSA_PRIVATE_KEY: &str = "RSA PRIVATE KEY";
pub const PUBLIC_KEY: &str = "PUBLIC KEY";

/// One decoded PEM block.
#[derive(Debug, Clone)]
pub enum PemObject {
    PrivateKey(KeyPair),
    PublicKey(PublicKey),
    Certificate(Certificate),
    CertificateRequest(CertificateRequest),
    Crl(CertificateRevocationList),
}

impl PemObject {
    pub fn kind(&self) -> &'static str {
        match self {
            PemObject::PrivateKey(_) => KeyPair::KIND,
            PemObject::PublicKey(_) => PublicKey::KIND,
            PemObject::Certificate(_) => Certificate::KIND,
            PemObject::CertificateRequest(_) => CertificateRequest::KIND,
            PemObject::Crl(_) => CertificateRevocationList::KIND,
        }
    }

    /// Decodes a block by its label.
    pub fn from_pem(block: &::pem::Pem) -> Result<Self> {
        let der = block.contents();
        match block.tag() {
            CERTIFICATE => Ok(PemObject::Certificate(Certificate::from_der(der)?)),
            CERTIFICATE_REQUEST | NEW_CERTIFICATE_REQUEST => Ok(PemObject::CertificateRequest(
                CertificateRequest::from_der(der)?,
            )),
            X509_CRL => Ok(PemObject::Crl(CertificateRevocationList::from_der(der)?)),
            PRIVATE_KEY => Ok(PemObject::PrivateKey(KeyPair::from_pkcs8_der(der)?)),
            RSA_PRIVATE_KEY => Ok(PemObject::PrivateKey(KeyPair::import_from_pkcs1_der(der)?)),
            PUBLIC_KEY => Ok(PemObject::PublicKey(PublicKey::from_der(der)?)),
            other => Err(PkiError::WrongObjectType {
                expected: "PEM object",
                found: other.to_string(),
            }),
        }
    }

    /// Armors the object. Private keys are written as PKCS#8.
    pub fn to_pem(&self) -> Result<String> {
        let (label, der) = match self {
            PemObject::PrivateKey(key) => (PRIVATE_KEY, key.to_pkcs8_der()?),
            PemObject::PublicKey(key) => (PUBLIC_KEY, key.to_der()?),
            PemObject::Certificate(cert) => (CERTIFICATE, cert.to_der()?),
            PemObject::CertificateRequest(request) => (CERTIFICATE_REQUEST, request.to_der()?),
            PemObject::Crl(crl) => (X509_CRL, crl.to_der()?),
        };
        Ok(to_pem(label, &der))
    }
}

/// Types that can be pulled out of a [`PemObject`].
pub trait FromPemObject: Sized {
    /// Name used in error messages.
    const KIND: &'static str;

    /// Returns the object back when it holds another type.
    fn from_pem_object(object: PemObject) -> std::result::Result<Self, PemObject>;
}

impl FromPemObject for KeyPair {
    const KIND: &'static str = "private key";

    fn from_pem_object(object: PemObject) -> std::result::Result<Self, PemObject> {
        match object {
            PemObject::PrivateKey(key) => Ok(key),
            other => Err(other),
        }
    }
}

impl FromPemObject for PublicKey {
    const KIND: &'static str = "public key";

    fn from_pem_object(object: PemObject) -> std::result::Result<Self, PemObject> {
        match object {
            PemObject::PublicKey(key) => Ok(key),
            other => Err(other),
        }
    }
}

impl FromPemObject for PemObject {
    const KIND: &'static str = "PEM object";

    fn from_pem_object(object: PemObject) -> std::result::Result<Self, PemObject> {
        Ok(object)
    }
}

/// Decodes every block in `input`, in order.
pub fn parse_many(input: &str) -> Result<Vec<PemObject>> {
    ::pem::parse_many(input)?
        .iter()
        .map(PemObject::from_pem)
        .collect()
}

/// Decodes every block in `input` as a `T`.
///
/// Fails with `EmptyStream` when there are no blocks and `WrongObjectType`
/// at the first block of another type.
pub fn expect_all<T: FromPemObject>(input: &str) -> Result<Vec<T>> {
    let objects = parse_many(input)?;
    if objects.is_empty() {
        return Err(PkiError::EmptyStream { expected: T::KIND });
    }
    objects
        .into_iter()
        .map(|object| {
            T::from_pem_object(object).map_err(|other| PkiError::WrongObjectType {
                expected: T::KIND,
                found: other.kind().to_string(),
            })
        })
        .collect()
}

/// Decodes the single `T` in `input`.
pub fn expect_one<T: FromPemObject>(input: &str) -> Result<T> {
    let mut objects = expect_all::<T>(input)?;
    match objects.len() {
        1 => Ok(objects.remove(0)),
        count => Err(PkiError::MultipleObjects {
            expected: T::KIND,
            count,
        }),
    }
}

/// Convert DER‑encoded data into a PEM‑encoded string with the provided label.
pub fn to_pem(label: &str, der: &[u8]) -> String {
    let block = ::pem::Pem::new(label, der);
    ::pem::encode_config(
        &block,
        ::pem::EncodeConfig::new().set_line_ending(::pem::LineEnding::LF),
    )
}
