//! The error type shared by every pkikit operation.

use thiserror::Error;

/// Represents errors that can occur in the pkikit library.
///
/// Every variant carries enough context (oid, serial, issuer name) for the
/// caller to act on it. Nothing is retried internally.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PkiError {
    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error during key generation or key import.
    #[error("Key error: {0}")]
    KeyGenerationError(String),

    /// A distinguished name could not be parsed or converted.
    #[error("Malformed name {input:?}: {reason}")]
    MalformedName { input: String, reason: String },

    /// The extension OID is not present in the registry.
    #[error("Unknown extension OID {oid}")]
    UnknownOid { oid: String },

    /// The value handed to the registry does not have the shape its OID expects.
    #[error("Extension {oid} expects a {expected} value")]
    ValueShape { oid: String, expected: &'static str },

    /// The requested extension is absent from the extension set.
    #[error("Extension {oid} not found")]
    NotFound { oid: String },

    /// The crypto provider refused to produce a signature.
    #[error("Signing error: {0}")]
    Signing(String),

    /// No CRL in the supplied chain covers the issuer.
    #[error("No CRL found for issuer {issuer}")]
    MissingCrl { issuer: String },

    /// The matched CRL is past its nextUpdate.
    #[error("CRL for issuer {issuer} expired at {next_update}")]
    ExpiredCrl { issuer: String, next_update: String },

    /// The matched CRL is before its thisUpdate.
    #[error("CRL for issuer {issuer} is not valid before {this_update}")]
    NotYetValidCrl { issuer: String, this_update: String },

    /// The matched CRL is not signed by the issuer's key.
    #[error("CRL signature for issuer {issuer} does not verify")]
    InvalidCrlSignature { issuer: String },

    /// The certificate serial is listed in its issuer's CRL.
    #[error("Certificate {serial} issued by {issuer} has been revoked")]
    RevokedCertificate { serial: String, issuer: String },

    /// Strict-mode form of the missing/expired/not-yet-valid/invalid CRL conditions.
    #[error("Could not determine revocation status for issuer {issuer}: {reason}")]
    RevocationStatusUnknown { issuer: String, reason: String },

    /// The chain does not contain the issuer of one of its certificates.
    #[error("Issuer of {subject} is not present in the chain")]
    IssuerNotInChain { subject: String },

    /// A PEM stream held an object of another type than requested.
    #[error("Expected {expected} but found {found}")]
    WrongObjectType {
        expected: &'static str,
        found: String,
    },

    /// Exactly one PEM object was expected.
    #[error("Expected a single {expected} but found {count}")]
    MultipleObjects { expected: &'static str, count: usize },

    /// The PEM stream held no objects.
    #[error("No {expected} found in input")]
    EmptyStream { expected: &'static str },
}

impl From<der::Error> for PkiError {
    /// Converts a `der::Error` into a `PkiError`.
    fn from(err: der::Error) -> Self {
        PkiError::DecodingError(err.to_string())
    }
}

impl From<rsa::Error> for PkiError {
    fn from(err: rsa::Error) -> Self {
        PkiError::KeyGenerationError(err.to_string())
    }
}

impl From<rsa::pkcs1::Error> for PkiError {
    fn from(err: rsa::pkcs1::Error) -> Self {
        PkiError::DecodingError(err.to_string())
    }
}

impl From<pkcs8::Error> for PkiError {
    fn from(err: pkcs8::Error) -> Self {
        PkiError::DecodingError(err.to_string())
    }
}

impl From<pkcs8::spki::Error> for PkiError {
    fn from(err: pkcs8::spki::Error) -> Self {
        PkiError::DecodingError(err.to_string())
    }
}

impl From<pem::PemError> for PkiError {
    fn from(err: pem::PemError) -> Self {
        PkiError::DecodingError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PkiError>;
