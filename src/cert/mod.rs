pub mod extensions;
pub mod params;
pub mod registry;

use const_oid::ObjectIdentifier;
use der::asn1::{Any, AnyRef};
use der::{Decode, Encode};
use extensions::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, SubjectKeyIdentifier,
    ToAndFromX509Extension,
};
use params::{CertificationRequestInfo, ExtensionParam, Validity};
use rand_core::{OsRng, RngCore};
use registry::ExtensionValue;
use rsa::BigUint;
use time::OffsetDateTime;
use tracing::info;
use x509_cert::certificate::CertificateInner;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::error::{PkiError, Result};
use crate::issuer::Issuer;
use crate::key::{KeyPair, PublicKey};
use crate::key_id::{self, KeyIdMethod};
use crate::name::{DistinguishedName, HasIssuer, HasSubject};
use crate::pem::{self as pem_codec, FromPemObject, PemObject};
use crate::tbs_certificate::TbsCertificate;

/// Represents the supported signature algorithms for certificates.
///
/// This enum provides a mapping to the corresponding OIDs for each algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption.
    Sha256WithRSA,
    /// SHA-384 with RSA encryption.
    Sha384WithRSA,
    /// SHA-512 with RSA encryption.
    Sha512WithRSA,
    /// SHA-256 with ECDSA.
    Sha256WithECDSA,
    /// SHA-384 with ECDSA.
    Sha384WithECDSA,
    /// SHA-512 with ECDSA.
    Sha512WithECDSA,
    /// Pure Ed25519.
    Ed25519,
}

impl SignatureAlgorithm {
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            SignatureAlgorithm::Sha256WithRSA => const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha384WithRSA => const_oid::db::rfc5912::SHA_384_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha512WithRSA => const_oid::db::rfc5912::SHA_512_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha256WithECDSA => const_oid::db::rfc5912::ECDSA_WITH_SHA_256,
            SignatureAlgorithm::Sha384WithECDSA => const_oid::db::rfc5912::ECDSA_WITH_SHA_384,
            SignatureAlgorithm::Sha512WithECDSA => const_oid::db::rfc5912::ECDSA_WITH_SHA_512,
            SignatureAlgorithm::Ed25519 => const_oid::db::rfc8410::ID_ED_25519,
        }
    }

    /// True if `key` can produce signatures of this algorithm.
    pub fn fits(&self, key: &KeyPair) -> bool {
        matches!(
            (self, key),
            (
                SignatureAlgorithm::Sha256WithRSA
                    | SignatureAlgorithm::Sha384WithRSA
                    | SignatureAlgorithm::Sha512WithRSA,
                KeyPair::Rsa { .. }
            ) | (SignatureAlgorithm::Sha256WithECDSA, KeyPair::EcdsaP256 { .. })
                | (SignatureAlgorithm::Sha384WithECDSA, KeyPair::EcdsaP384 { .. })
                | (SignatureAlgorithm::Sha512WithECDSA, KeyPair::EcdsaP521 { .. })
                | (SignatureAlgorithm::Ed25519, KeyPair::Ed25519 { .. })
        )
    }
}

impl From<SignatureAlgorithm> for AlgorithmIdentifierOwned {
    /// Converts a `SignatureAlgorithm` into an `AlgorithmIdentifierOwned`.
    ///
    /// RSA algorithms carry an explicit NULL parameter; ECDSA and Ed25519
    /// carry none.
    fn from(value: SignatureAlgorithm) -> Self {
        let parameters = match value {
            SignatureAlgorithm::Sha256WithRSA
            | SignatureAlgorithm::Sha384WithRSA
            | SignatureAlgorithm::Sha512WithRSA => Some(Any::from(AnyRef::NULL)),
            _ => None,
        };
        AlgorithmIdentifierOwned {
            oid: value.oid(),
            parameters,
        }
    }
}

impl TryFrom<&AlgorithmIdentifierOwned> for SignatureAlgorithm {
    type Error = PkiError;

    fn try_from(value: &AlgorithmIdentifierOwned) -> Result<Self> {
        match value.oid {
            const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION => Ok(Self::Sha256WithRSA),
            const_oid::db::rfc5912::SHA_384_WITH_RSA_ENCRYPTION => Ok(Self::Sha384WithRSA),
            const_oid::db::rfc5912::SHA_512_WITH_RSA_ENCRYPTION => Ok(Self::Sha512WithRSA),
            const_oid::db::rfc5912::ECDSA_WITH_SHA_256 => Ok(Self::Sha256WithECDSA),
            const_oid::db::rfc5912::ECDSA_WITH_SHA_384 => Ok(Self::Sha384WithECDSA),
            const_oid::db::rfc5912::ECDSA_WITH_SHA_512 => Ok(Self::Sha512WithECDSA),
            const_oid::db::rfc8410::ID_ED_25519 => Ok(Self::Ed25519),
            other => Err(PkiError::DecodingError(format!(
                "Unsupported signature algorithm {other}"
            ))),
        }
    }
}

/// A random positive 128-bit serial number.
pub fn random_serial() -> BigUint {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    bytes[0] &= 0x7f;
    BigUint::from_bytes_be(&bytes)
}

/// Represents an X.509 certificate.
///
/// This struct provides accessors over the signed certificate and methods to
/// encode it into DER or PEM formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    pub fn issuer(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.issuer)
    }

    pub fn subject(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.subject)
    }

    pub fn serial_number(&self) -> BigUint {
        BigUint::from_bytes_be(self.inner.tbs_certificate.serial_number.as_bytes())
    }

    pub fn validity(&self) -> Validity {
        Validity::from_x509_validity(&self.inner.tbs_certificate.validity)
    }

    pub fn spki(&self) -> &SubjectPublicKeyInfoOwned {
        &self.inner.tbs_certificate.subject_public_key_info
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(self.spki())
    }

    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm> {
        SignatureAlgorithm::try_from(&self.inner.signature_algorithm)
    }

    /// All extensions in certificate order.
    pub fn extensions(&self) -> Vec<ExtensionParam> {
        self.inner
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .map(ExtensionParam::from)
            .collect()
    }

    /// Decodes the extension `oid` through the registry.
    pub fn extension(&self, oid: &ObjectIdentifier) -> Result<ExtensionValue> {
        registry::decode(&self.extensions(), oid)
    }

    pub fn find_extension<E: ToAndFromX509Extension>(&self) -> Result<Option<E>> {
        registry::find::<E>(&self.extensions())
    }

    pub fn authority_key_identifier(&self) -> Result<Option<AuthorityKeyIdentifier>> {
        self.find_extension::<AuthorityKeyIdentifier>()
    }

    /// The SubjectKeyIdentifier value, or a Type-1 identifier of the public
    /// key when the certificate has none.
    pub fn key_identifier(&self) -> Result<Vec<u8>> {
        Ok(match self.find_extension::<SubjectKeyIdentifier>()? {
            Some(ski) => ski.0,
            None => key_id::spki_key_identifier(self.spki(), KeyIdMethod::Type1),
        })
    }

    /// Every identifier an AKI may use to point at this certificate: the
    /// SubjectKeyIdentifier if present, plus the Type-1 and Type-2 digests.
    pub fn key_identifiers(&self) -> Result<Vec<Vec<u8>>> {
        let mut ids = Vec::with_capacity(3);
        if let Some(ski) = self.find_extension::<SubjectKeyIdentifier>()? {
            ids.push(ski.0);
        }
        for method in [KeyIdMethod::Type1, KeyIdMethod::Type2] {
            let id = key_id::spki_key_identifier(self.spki(), method);
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    pub fn is_ca(&self) -> Result<bool> {
        Ok(self
            .find_extension::<BasicConstraints>()?
            .is_some_and(|bc| bc.is_ca))
    }

    /// True when subject and issuer are the same name.
    pub fn is_self_issued(&self) -> bool {
        self.inner.tbs_certificate.subject == self.inner.tbs_certificate.issuer
    }

    /// Checks the certificate signature against `issuer_key`.
    pub fn verify_signature(&self, issuer_key: &PublicKey) -> Result<bool> {
        let algorithm = self.signature_algorithm()?;
        let tbs = self.inner.tbs_certificate.to_der()?;
        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            PkiError::DecodingError("signature has unused bits".to_string())
        })?;
        Ok(issuer_key.verify(&algorithm, &tbs, signature))
    }

    /// Encodes the certificate into DER format.
    ///
    /// # Returns
    /// A byte vector containing the DER-encoded certificate.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| PkiError::EncodingError(e.to_string()))
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertificateInner::from_der(der)?,
        })
    }

    /// Encodes the certificate into PEM format.
    ///
    /// # Returns
    /// A string containing the PEM-encoded certificate.
    pub fn to_pem(&self) -> Result<String> {
        Ok(pem_codec::to_pem(pem_codec::CERTIFICATE, &self.to_der()?))
    }

    /// Reads exactly one certificate from PEM text.
    pub fn from_pem(pem: &str) -> Result<Self> {
        pem_codec::expect_one(pem)
    }

    /// Extracts certificate information into a `CertificationRequestInfo` object.
    ///
    /// Extensions that issuance regenerates (basic constraints, key usages,
    /// key identifiers) are folded into the typed fields and left out of
    /// `extensions`.
    ///
    /// # Returns
    /// A `CertificationRequestInfo` object containing the certificate details.
    pub fn to_cert_info(&self) -> Result<CertificationRequestInfo> {
        let extensions = self.extensions();
        let basic_constraints = registry::find::<BasicConstraints>(&extensions)?.unwrap_or_default();
        let usages = registry::find::<ExtendedKeyUsage>(&extensions)?
            .map(|eku| eku.options())
            .unwrap_or_default();

        Ok(CertificationRequestInfo {
            subject: self.subject()?,
            subject_public_key: self.public_key()?,
            usages,
            is_ca: basic_constraints.is_ca,
            max_path_length: basic_constraints.max_path_length,
            extensions: crate::issuer::without_issuance_extensions(extensions),
        })
    }

    /// Creates a new self-signed certificate valid for one year.
    ///
    /// # Arguments
    /// * `cert_info` - The certification request information.
    /// * `key` - The key pair used to sign the certificate.
    ///
    /// # Returns
    /// A `Certificate` object representing the self-signed certificate.
    pub fn new_self_signed(cert_info: &CertificationRequestInfo, key: &KeyPair) -> Result<Self> {
        let validity = Validity {
            not_before: OffsetDateTime::now_utc(),
            not_after: OffsetDateTime::now_utc() + time::Duration::days(365),
        };
        Self::new_self_signed_with(cert_info, key, validity, random_serial())
    }

    /// Creates a self-signed certificate with an explicit validity and serial.
    pub fn new_self_signed_with(
        cert_info: &CertificationRequestInfo,
        key: &KeyPair,
        validity: Validity,
        serial: BigUint,
    ) -> Result<Self> {
        // For self-signed certificates, the issuer is the same as the subject
        let self_issuer = SelfIssuer {
            name: cert_info.subject.clone(),
            key,
        };
        self_issuer.issue(cert_info, validity, serial)
    }
}

/// Builds and signs a certificate from its raw parts.
///
/// `extensions` are written as given; nothing is added.
#[allow(clippy::too_many_arguments)]
pub fn build_certificate(
    issuer: &DistinguishedName,
    issuer_key: &KeyPair,
    serial: BigUint,
    not_before: OffsetDateTime,
    not_after: OffsetDateTime,
    subject: &DistinguishedName,
    subject_public_key: &PublicKey,
    extensions: Vec<ExtensionParam>,
) -> Result<Certificate> {
    let cert = TbsCertificate::builder()
        .serial_number(serial)
        .issuer(issuer.clone())
        .validity(Validity {
            not_before,
            not_after,
        })
        .subject(subject.clone())
        .subject_public_key(subject_public_key.clone())
        .extensions(extensions)
        .build()
        .sign(issuer_key)?;
    info!(
        serial = %cert.serial_number(),
        subject = %subject,
        issuer = %issuer,
        "issued certificate"
    );
    Ok(cert)
}

impl HasSubject for Certificate {
    fn subject_name(&self) -> Result<DistinguishedName> {
        self.subject()
    }
}

impl HasIssuer for Certificate {
    fn issuer_name(&self) -> Result<DistinguishedName> {
        self.issuer()
    }
}

impl FromPemObject for Certificate {
    const KIND: &'static str = "certificate";

    fn from_pem_object(object: PemObject) -> std::result::Result<Self, PemObject> {
        match object {
            PemObject::Certificate(cert) => Ok(cert),
            other => Err(other),
        }
    }
}

// Helper struct for self-signed certificates
struct SelfIssuer<'a> {
    name: DistinguishedName,
    key: &'a KeyPair,
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> Result<DistinguishedName> {
        Ok(self.name.clone())
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }
}

/// A CA certificate together with its private key.
#[derive(Debug, Clone)]
pub struct CertificateWithPrivateKey {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl Issuer for CertificateWithPrivateKey {
    fn issuer_name(&self) -> Result<DistinguishedName> {
        // The name of the issuer is the subject of the certificate
        self.cert.subject()
    }

    fn signing_key(&self) -> &KeyPair {
        &self.key
    }

    fn authority_key_identifier(&self, method: KeyIdMethod) -> Result<AuthorityKeyIdentifier> {
        match method {
            KeyIdMethod::Type1 => AuthorityKeyIdentifier::from_certificate(&self.cert),
            KeyIdMethod::Type2 => {
                AuthorityKeyIdentifier::from_public_key(&self.key.public_key(), method)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::{KeyUsage, KeyUsages, NodeUid};
    use crate::oid;

    fn leaf_info(key: &KeyPair) -> CertificationRequestInfo {
        CertificationRequestInfo::builder()
            .subject("CN=leaf.example.com,O=Example".parse().unwrap())
            .subject_public_key(key.public_key())
            .build()
    }

    #[test]
    fn test_basic_constraints_survive_build() {
        let ca_key = KeyPair::generate_ecdsa_p256();
        let leaf_key = KeyPair::generate_ecdsa_p256();
        let bc = BasicConstraints {
            is_ca: false,
            max_path_length: None,
        };
        let cert = build_certificate(
            &DistinguishedName::from_common_name("CA").unwrap(),
            &ca_key,
            BigUint::from(5u32),
            OffsetDateTime::now_utc(),
            OffsetDateTime::now_utc() + time::Duration::days(1),
            &DistinguishedName::from_common_name("leaf").unwrap(),
            &leaf_key.public_key(),
            vec![ExtensionParam::from_extension(&bc, true).unwrap()],
        )
        .unwrap();

        assert_eq!(
            cert.extension(&oid::BASIC_CONSTRAINTS).unwrap(),
            ExtensionValue::BasicConstraints(bc)
        );
        assert_eq!(cert.extensions().len(), 1);
        assert!(!cert.is_ca().unwrap());
        assert_eq!(cert.serial_number(), BigUint::from(5u32));
        assert!(cert.verify_signature(&ca_key.public_key()).unwrap());
        assert!(!cert.verify_signature(&leaf_key.public_key()).unwrap());
    }

    #[test]
    fn test_self_signed_ca() {
        let key = KeyPair::generate_ed25519();
        let info = CertificationRequestInfo::builder()
            .subject("CN=Root CA,O=Example".parse().unwrap())
            .subject_public_key(key.public_key())
            .is_ca(true)
            .build();
        let cert = Certificate::new_self_signed(&info, &key).unwrap();

        assert!(cert.is_self_issued());
        assert!(cert.is_ca().unwrap());
        assert!(cert.verify_signature(&key.public_key()).unwrap());
        assert_eq!(cert.subject().unwrap(), cert.issuer().unwrap());
        let ku = cert.find_extension::<KeyUsage>().unwrap().unwrap();
        assert!(ku.0.contains(KeyUsages::KeyCertSign));
        assert!(ku.0.contains(KeyUsages::CRLSign));

        let aki = cert.authority_key_identifier().unwrap().unwrap();
        assert_eq!(aki.key_identifier, Some(cert.key_identifier().unwrap()));
    }

    #[test]
    fn test_issue_from_ca_links_identifiers() {
        let ca_key = KeyPair::generate_ecdsa_p384();
        let ca_info = CertificationRequestInfo::builder()
            .subject(DistinguishedName::from_common_name("Intermediate").unwrap())
            .subject_public_key(ca_key.public_key())
            .is_ca(true)
            .build();
        let ca = CertificateWithPrivateKey {
            cert: Certificate::new_self_signed(&ca_info, &ca_key).unwrap(),
            key: ca_key,
        };

        let leaf_key = KeyPair::generate_ecdsa_p256();
        let leaf = ca
            .issue(&leaf_info(&leaf_key), Validity::for_days(30), BigUint::from(2u32))
            .unwrap();
        assert_eq!(leaf.issuer().unwrap(), ca.cert.subject().unwrap());
        assert!(leaf.verify_signature(&ca.key.public_key()).unwrap());
        assert_eq!(
            leaf.authority_key_identifier().unwrap().unwrap().key_identifier,
            Some(ca.cert.key_identifier().unwrap())
        );
        assert!(crate::name::issued_by(&leaf, &ca.cert));
        assert!(!crate::name::issued_by(&ca.cert, &leaf));
    }

    #[test]
    fn test_der_and_pem_round_trip() {
        let key = KeyPair::generate_ecdsa_p256();
        let mut info = leaf_info(&key);
        info.extensions = vec![
            ExtensionParam::from_extension(&NodeUid("node-1".to_string()), false).unwrap(),
        ];
        let cert = Certificate::new_self_signed(&info, &key).unwrap();

        let from_der = Certificate::from_der(&cert.to_der().unwrap()).unwrap();
        assert_eq!(from_der, cert);

        let pem = cert.to_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----"));
        let from_pem = Certificate::from_pem(&pem).unwrap();
        assert_eq!(from_pem, cert);
        assert_eq!(
            from_pem.find_extension::<NodeUid>().unwrap(),
            Some(NodeUid("node-1".to_string()))
        );
    }

    #[test]
    fn test_to_cert_info_round_trip() {
        let key = KeyPair::generate_ecdsa_p256();
        let info = CertificationRequestInfo::builder()
            .subject("CN=svc,O=Example".parse().unwrap())
            .subject_public_key(key.public_key())
            .usages(vec![params::ExtendedKeyUsageOption::ServerAuth])
            .extensions(vec![
                ExtensionParam::from_extension(&NodeUid("n".to_string()), false).unwrap(),
            ])
            .build();
        let cert = Certificate::new_self_signed(&info, &key).unwrap();
        let read_back = cert.to_cert_info().unwrap();

        assert_eq!(read_back.subject, info.subject);
        assert_eq!(read_back.subject_public_key, info.subject_public_key);
        assert_eq!(read_back.usages, info.usages);
        assert!(!read_back.is_ca);
        assert_eq!(read_back.extensions, info.extensions);
    }

    #[test]
    fn test_signature_algorithm_identifiers() {
        let rsa: AlgorithmIdentifierOwned = SignatureAlgorithm::Sha256WithRSA.into();
        assert_eq!(rsa.parameters, Some(Any::from(AnyRef::NULL)));
        let ed: AlgorithmIdentifierOwned = SignatureAlgorithm::Ed25519.into();
        assert_eq!(ed.parameters, None);
        for algorithm in [
            SignatureAlgorithm::Sha384WithRSA,
            SignatureAlgorithm::Sha512WithECDSA,
            SignatureAlgorithm::Ed25519,
        ] {
            let id: AlgorithmIdentifierOwned = algorithm.into();
            assert_eq!(SignatureAlgorithm::try_from(&id).unwrap(), algorithm);
        }
    }

    #[test]
    fn test_random_serials_are_positive_and_distinct() {
        let a = random_serial();
        let b = random_serial();
        assert_ne!(a, b);
        assert!(a.to_bytes_be().len() <= 16);
    }
}
