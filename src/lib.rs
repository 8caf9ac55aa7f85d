//! # pkikit - X.509 PKI primitives in pure Rust
//!
//! pkikit builds, encodes and checks X.509 certificates, certificate signing
//! requests and certificate revocation lists, using only rustcrypto libraries
//! (openssl is used for interop testing only). On top of that it validates a
//! certificate chain against a set of CRLs.
//!
//! ## Supported Key Types
//!
//! - **RSA**: 2048, 3072, and 4096-bit keys
//! - **ECDSA**: P-256, P-384, and P-521 curves
//! - **Ed25519**: Edwards curve digital signature algorithm
//!
//! ## Key Features
//!
//! - **Typed extensions**: BasicConstraints, KeyUsage, ExtendedKeyUsage,
//!   Subject/IssuerAltName, Subject/AuthorityKeyIdentifier, CRLNumber,
//!   NetscapeComment and the node identity extensions, with a lossless raw
//!   form for anything else
//! - **Two key identifier methods**: the full SHA-1 identifier and the
//!   8 byte truncated one
//! - **CRLs**: creation and revocation as pure state transitions
//! - **Chain validation**: CRL lookup by issuer name and key identifier
//! - **PEM streams**: typed reading of mixed PEM input
//!
//! ## Quick Start
//!
//! ### Issuing and revoking a certificate
//!
//! ```rust,no_run
//! use pkikit::{
//!     cert::{Certificate, CertificateWithPrivateKey, params::{CertificationRequestInfo, Validity}},
//!     crl::{CertificateRevocationList, CrlOptions},
//!     issuer::Issuer,
//!     key::KeyPair,
//!     name::DistinguishedName,
//!     validator::ChainValidator,
//! };
//! use rsa::BigUint;
//! use time::{Duration, OffsetDateTime};
//!
//! # fn main() -> Result<(), pkikit::error::PkiError> {
//! let ca_key = KeyPair::generate_ecdsa_p256();
//! let ca_info = CertificationRequestInfo::builder()
//!     .subject("CN=Example CA,O=Example Corp".parse()?)
//!     .subject_public_key(ca_key.public_key())
//!     .is_ca(true)
//!     .build();
//! let ca = CertificateWithPrivateKey {
//!     cert: Certificate::new_self_signed(&ca_info, &ca_key)?,
//!     key: ca_key,
//! };
//!
//! let server_key = KeyPair::generate_ed25519();
//! let server_info = CertificationRequestInfo::builder()
//!     .subject(DistinguishedName::from_common_name("server.example.com")?)
//!     .subject_public_key(server_key.public_key())
//!     .build();
//! let server = ca.issue(&server_info, Validity::for_days(90), BigUint::from(2u32))?;
//!
//! let now = OffsetDateTime::now_utc();
//! let crl = CertificateRevocationList::new(
//!     &ca.cert.subject()?,
//!     &ca.key,
//!     &ca.key.public_key(),
//!     now,
//!     now + Duration::days(7),
//!     CrlOptions::default(),
//! )?;
//! let chain = [server.clone(), ca.cert.clone()];
//! ChainValidator::default().validate_chain(&chain, &[crl.clone()])?;
//!
//! let crl = crl.revoke(&ca.key, &ca.key.public_key(), &server.serial_number())?;
//! assert!(ChainValidator::default().validate_chain(&chain, &[crl]).is_err());
//! # Ok(())
//! # }
//! ```
//!
//! ### Reading extensions
//!
//! ```rust,no_run
//! use pkikit::{cert::Certificate, cert::extensions::BasicConstraints, oid};
//!
//! # fn main() -> Result<(), pkikit::error::PkiError> {
//! # let pem = "";
//! let cert = Certificate::from_pem(pem)?;
//! let value = cert.extension(&oid::BASIC_CONSTRAINTS)?;
//! let bc: Option<BasicConstraints> = cert.find_extension()?;
//! println!("{value:?} {bc:?}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`error::PkiError`], whose variants carry
//! the OID, serial or issuer name involved:
//!
//! ```rust
//! use pkikit::{error::PkiError, name::DistinguishedName};
//!
//! match "CN".parse::<DistinguishedName>() {
//!     Ok(name) => println!("parsed {name}"),
//!     Err(PkiError::MalformedName { input, reason }) => println!("{input}: {reason}"),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`name`]: Distinguished names and the subject/issuer capabilities
//! - [`oid`]: Well-known extension OIDs
//! - [`key`]: Key generation, import/export, and cryptographic operations
//! - [`key_id`]: Subject and authority key identifiers
//! - [`cert`]: Certificates, typed extensions and the extension registry
//! - [`tbs_certificate`]: Low-level certificate assembly and signing
//! - [`issuer`]: Certificate issuing for CAs
//! - [`request`]: PKCS#10 certificate signing requests
//! - [`crl`]: Certificate revocation lists
//! - [`validator`]: Chain revocation checking
//! - [`pem`]: Typed PEM streams
//! - [`error`]: Error types

pub mod cert;
pub mod crl;
pub mod error;
pub mod issuer;
pub mod key;
pub mod key_id;
pub mod name;
pub mod oid;
pub mod pem;
pub mod request;
pub mod tbs_certificate;
pub mod validator;
