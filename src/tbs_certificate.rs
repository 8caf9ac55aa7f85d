use bon::Builder;
use der::Encode;
use der::asn1::BitString;
use rsa::BigUint;
use tracing::debug;
use x509_cert::Version;
use x509_cert::certificate::{CertificateInner, TbsCertificateInner};
use x509_cert::serial_number::SerialNumber;

use crate::cert::params::{ExtensionParam, Validity};
use crate::cert::{Certificate, SignatureAlgorithm};
use crate::error::{PkiError, Result};
use crate::key::{KeyPair, PublicKey};
use crate::name::DistinguishedName;

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
/// This struct contains all the fields required to generate a valid X.509 certificate.
///
/// # Fields
/// * `serial_number` - The unique identifier for the certificate.
/// * `signature_algorithm` - The algorithm used to sign the certificate. Picked
///   from the signing key when absent.
/// * `issuer` - The distinguished name of the certificate issuer.
/// * `validity` - The certificate's validity period.
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `extensions` - Additional X.509 extensions for the certificate.
#[derive(Clone, Debug, Builder)]
pub struct TbsCertificate {
    /// Certificate serial number
    pub serial_number: BigUint,
    /// Certificate signature algorithm
    pub signature_algorithm: Option<SignatureAlgorithm>,
    /// Certificate issuer distinguished name
    pub issuer: DistinguishedName,
    /// Not before / not after
    pub validity: Validity,
    /// Certificate subject distinguished name
    pub subject: DistinguishedName,
    /// Subject's public key
    pub subject_public_key: PublicKey,
    /// Certificate extensions
    #[builder(default)]
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    ///
    /// # Arguments
    /// * `algorithm` - The algorithm recorded in the `signature` field.
    pub fn to_tbs_certificate_inner(
        &self,
        algorithm: &SignatureAlgorithm,
    ) -> Result<TbsCertificateInner> {
        let extensions = self
            .extensions
            .iter()
            .map(ExtensionParam::to_x509_extension)
            .collect::<Result<Vec<_>>>()?;

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number: SerialNumber::new(&self.serial_number.to_bytes_be())?,
            signature: (*algorithm).into(),
            issuer: self.issuer.as_x509_name()?,
            validity: self.validity.to_x509_validity()?,
            subject: self.subject.as_x509_name()?,
            subject_public_key_info: self.subject_public_key.to_spki()?,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: (!extensions.is_empty()).then_some(extensions),
        })
    }

    /// Creates a `TbsCertificate` from a `TbsCertificateInner`.
    ///
    /// # Arguments
    /// * `inner` - The `TbsCertificateInner` object to convert from.
    ///
    /// # Returns
    /// A `TbsCertificate` object.
    pub fn from_tbs_certificate_inner(inner: &TbsCertificateInner) -> Result<Self> {
        Ok(Self {
            serial_number: BigUint::from_bytes_be(inner.serial_number.as_bytes()),
            signature_algorithm: Some(SignatureAlgorithm::try_from(&inner.signature)?),
            issuer: DistinguishedName::from_x509_name(&inner.issuer)?,
            validity: Validity::from_x509_validity(&inner.validity),
            subject: DistinguishedName::from_x509_name(&inner.subject)?,
            subject_public_key: PublicKey::from_x509spki(&inner.subject_public_key_info)?,
            extensions: inner
                .extensions
                .iter()
                .flatten()
                .map(ExtensionParam::from)
                .collect(),
        })
    }

    /// Signs the certificate with the issuer's key.
    ///
    /// Fails with `InvalidInput` unless `not_before < not_after`, and with
    /// `Signing` when an explicit algorithm does not fit `key`.
    pub fn sign(&self, key: &KeyPair) -> Result<Certificate> {
        self.validity.check()?;
        let algorithm = match &self.signature_algorithm {
            Some(algorithm) if !algorithm.fits(key) => {
                return Err(PkiError::Signing(format!(
                    "{:?} cannot be produced by a {} key",
                    algorithm,
                    key.algorithm_name()
                )));
            }
            Some(algorithm) => *algorithm,
            None => key.default_signature_algorithm(),
        };

        let tbs_certificate = self.to_tbs_certificate_inner(&algorithm)?;
        let signature = key.sign_with(&algorithm, &tbs_certificate.to_der()?)?;
        debug!(
            serial = %self.serial_number,
            subject = %self.subject,
            algorithm = ?algorithm,
            "signed certificate"
        );

        Ok(Certificate {
            inner: CertificateInner {
                tbs_certificate,
                signature_algorithm: algorithm.into(),
                signature: BitString::from_bytes(&signature)?,
            },
        })
    }

    /// Encodes the `TbsCertificate` into DER format.
    ///
    /// # Returns
    /// A byte vector containing the DER-encoded certificate.
    pub fn to_der(&self, algorithm: &SignatureAlgorithm) -> Result<Vec<u8>> {
        Ok(self.to_tbs_certificate_inner(algorithm)?.to_der()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::BasicConstraints;
    use time::{Duration, OffsetDateTime};

    fn tbs(key: &KeyPair) -> TbsCertificate {
        TbsCertificate::builder()
            .serial_number(BigUint::from(1000u32))
            .issuer(DistinguishedName::from_common_name("Test CA").unwrap())
            .subject(DistinguishedName::from_common_name("leaf").unwrap())
            .validity(Validity::for_days(10))
            .subject_public_key(key.public_key())
            .extensions(vec![
                ExtensionParam::from_extension(
                    &BasicConstraints {
                        is_ca: false,
                        max_path_length: None,
                    },
                    true,
                )
                .unwrap(),
            ])
            .build()
    }

    #[test]
    fn test_sign_and_read_back() {
        let key = KeyPair::generate_ecdsa_p256();
        let cert = tbs(&key).sign(&key).unwrap();
        let read_back =
            TbsCertificate::from_tbs_certificate_inner(&cert.inner.tbs_certificate).unwrap();
        assert_eq!(read_back.serial_number, BigUint::from(1000u32));
        assert_eq!(read_back.subject, "CN=leaf");
        assert_eq!(read_back.issuer, "CN=Test CA");
        assert_eq!(
            read_back.signature_algorithm,
            Some(SignatureAlgorithm::Sha256WithECDSA)
        );
        assert_eq!(read_back.extensions.len(), 1);
        assert!(cert.verify_signature(&key.public_key()).unwrap());
    }

    #[test]
    fn test_inverted_validity_is_rejected() {
        let key = KeyPair::generate_ed25519();
        let mut tbs = tbs(&key);
        let now = OffsetDateTime::now_utc();
        tbs.validity = Validity {
            not_before: now,
            not_after: now - Duration::hours(1),
        };
        assert!(matches!(tbs.sign(&key), Err(PkiError::InvalidInput(_))));
    }

    #[test]
    fn test_mismatched_algorithm_is_a_signing_error() {
        let key = KeyPair::generate_ed25519();
        let mut tbs = tbs(&key);
        tbs.signature_algorithm = Some(SignatureAlgorithm::Sha256WithRSA);
        assert!(matches!(tbs.sign(&key), Err(PkiError::Signing(_))));
    }

    #[test]
    fn test_large_serial_numbers() {
        let key = KeyPair::generate_ecdsa_p384();
        let mut tbs = tbs(&key);
        tbs.serial_number = BigUint::from_bytes_be(&[0x80; 19]);
        let cert = tbs.sign(&key).unwrap();
        assert_eq!(cert.serial_number(), BigUint::from_bytes_be(&[0x80; 19]));
    }
}
