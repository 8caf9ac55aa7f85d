//! PKCS#10 certificate signing requests.
//!
//! Requested extensions travel in a PKCS#9 `extensionRequest` attribute.

use const_oid::AssociatedOid;
use der::asn1::{Any, BitString, SetOfVec};
use der::{Decode, Encode};
use tracing::debug;
use x509_cert::attr::Attribute;
use x509_cert::request::{CertReq, CertReqInfo, ExtensionReq, Version};

use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::{BasicConstraints, ExtendedKeyUsage};
use crate::cert::params::{CertificationRequestInfo, ExtensionParam};
use crate::cert::registry;
use crate::error::{PkiError, Result};
use crate::issuer::without_issuance_extensions;
use crate::key::{KeyPair, PublicKey};
use crate::name::{DistinguishedName, HasSubject};
use crate::pem::{self as pem_codec, FromPemObject, PemObject};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub inner: CertReq,
}

impl CertificateRequest {
    /// Builds a request for `subject`, signed by `key_pair`.
    pub fn new(
        key_pair: &KeyPair,
        subject: &DistinguishedName,
        extensions: Vec<ExtensionParam>,
    ) -> Result<Self> {
        let attributes = if extensions.is_empty() {
            SetOfVec::new()
        } else {
            let request = ExtensionReq(
                extensions
                    .iter()
                    .map(ExtensionParam::to_x509_extension)
                    .collect::<Result<Vec<_>>>()?,
            );
            SetOfVec::try_from(vec![Attribute {
                oid: ExtensionReq::OID,
                values: SetOfVec::try_from(vec![Any::encode_from(&request)?])?,
            }])?
        };

        let info = CertReqInfo {
            version: Version::V1,
            subject: subject.as_x509_name()?,
            public_key: key_pair.as_spki()?,
            attributes,
        };
        let algorithm = key_pair.default_signature_algorithm();
        let signature = key_pair.sign_with(&algorithm, &info.to_der()?)?;
        debug!(subject = %subject, extensions = extensions.len(), "signed certificate request");

        Ok(Self {
            inner: CertReq {
                info,
                algorithm: algorithm.into(),
                signature: BitString::from_bytes(&signature)?,
            },
        })
    }

    pub fn subject(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(&self.inner.info.subject)
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.info.public_key)
    }

    /// True iff the embedded key validates the embedded signature.
    pub fn verify_signature(&self) -> Result<bool> {
        let algorithm = SignatureAlgorithm::try_from(&self.inner.algorithm)?;
        let Some(signature) = self.inner.signature.as_bytes() else {
            return Ok(false);
        };
        Ok(self
            .public_key()?
            .verify(&algorithm, &self.inner.info.to_der()?, signature))
    }

    /// Extensions from every `extensionRequest` attribute, in order.
    pub fn requested_extensions(&self) -> Result<Vec<ExtensionParam>> {
        let mut extensions = Vec::new();
        for attribute in self.inner.info.attributes.iter() {
            if attribute.oid != ExtensionReq::OID {
                continue;
            }
            for value in attribute.values.iter() {
                let request = ExtensionReq::from_der(&value.to_der()?)?;
                extensions.extend(request.0.iter().map(ExtensionParam::from));
            }
        }
        Ok(extensions)
    }

    /// The request as issuance parameters.
    ///
    /// Requested BasicConstraints and ExtendedKeyUsage become the typed
    /// fields; the remaining requested extensions are passed through.
    pub fn to_cert_info(&self) -> Result<CertificationRequestInfo> {
        let extensions = self.requested_extensions()?;
        let basic_constraints =
            registry::find::<BasicConstraints>(&extensions)?.unwrap_or_default();
        let usages = registry::find::<ExtendedKeyUsage>(&extensions)?
            .map(|eku| eku.options())
            .unwrap_or_default();

        Ok(CertificationRequestInfo {
            subject: self.subject()?,
            subject_public_key: self.public_key()?,
            usages,
            is_ca: basic_constraints.is_ca,
            max_path_length: basic_constraints.max_path_length,
            extensions: without_issuance_extensions(extensions),
        })
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| PkiError::EncodingError(e.to_string()))
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertReq::from_der(der)?,
        })
    }

    pub fn to_pem(&self) -> Result<String> {
        Ok(pem_codec::to_pem(pem_codec::CERTIFICATE_REQUEST, &self.to_der()?))
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        pem_codec::expect_one(pem)
    }
}

impl HasSubject for CertificateRequest {
    fn subject_name(&self) -> Result<DistinguishedName> {
        self.subject()
    }
}

impl FromPemObject for CertificateRequest {
    const KIND: &'static str = "certificate request";

    fn from_pem_object(object: PemObject) -> std::result::Result<Self, PemObject> {
        match object {
            PemObject::CertificateRequest(request) => Ok(request),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::{AltNames, ExtendedKeyUsageOption, NodeUid, SubjectAltName};
    use crate::name;

    fn extensions() -> Vec<ExtensionParam> {
        vec![
            ExtensionParam::from_extension(
                &SubjectAltName(AltNames {
                    dns_names: vec!["node7.example.com".to_string()],
                    ..Default::default()
                }),
                false,
            )
            .unwrap(),
            ExtensionParam::from_extension(
                &ExtendedKeyUsage::from_options(&[ExtendedKeyUsageOption::ServerAuth]),
                false,
            )
            .unwrap(),
            ExtensionParam::from_extension(&NodeUid("uid-7".to_string()), false).unwrap(),
        ]
    }

    #[test]
    fn test_request_verifies_for_every_key_type() {
        let keys = [
            KeyPair::generate_ecdsa_p256(),
            KeyPair::generate_ecdsa_p384(),
            KeyPair::generate_ecdsa_p521(),
            KeyPair::generate_ed25519(),
            KeyPair::generate_rsa(2048).unwrap(),
        ];
        let subject: DistinguishedName = "CN=node7,O=Example".parse().unwrap();
        for key in &keys {
            let request = CertificateRequest::new(key, &subject, extensions()).unwrap();
            assert!(request.verify_signature().unwrap(), "{}", key.algorithm_name());
            assert_eq!(request.public_key().unwrap(), key.public_key());
        }
    }

    #[test]
    fn test_requested_extensions_round_trip() {
        let key = KeyPair::generate_ecdsa_p256();
        let request = CertificateRequest::new(
            &key,
            &DistinguishedName::from_common_name("node7").unwrap(),
            extensions(),
        )
        .unwrap();
        assert_eq!(request.requested_extensions().unwrap(), extensions());

        let info = request.to_cert_info().unwrap();
        assert_eq!(info.usages, vec![ExtendedKeyUsageOption::ServerAuth]);
        assert_eq!(info.extensions.len(), 2);
        let subject = DistinguishedName::from_common_name("node7").unwrap();
        assert!(name::has_subject(&request, &subject));
    }

    #[test]
    fn test_request_without_extensions_has_no_attributes() {
        let key = KeyPair::generate_ed25519();
        let subject = DistinguishedName::from_common_name("bare").unwrap();
        let request = CertificateRequest::new(&key, &subject, vec![]).unwrap();
        assert!(request.inner.info.attributes.is_empty());
        assert!(request.requested_extensions().unwrap().is_empty());
    }

    #[test]
    fn test_tampered_request_fails_verification() {
        let key = KeyPair::generate_ecdsa_p256();
        let other = KeyPair::generate_ecdsa_p256();
        let mut request = CertificateRequest::new(
            &key,
            &DistinguishedName::from_common_name("node7").unwrap(),
            extensions(),
        )
        .unwrap();
        request.inner.info.public_key = other.as_spki().unwrap();
        assert!(!request.verify_signature().unwrap());
    }

    #[test]
    fn test_der_and_pem_round_trip() {
        let key = KeyPair::generate_ecdsa_p256();
        let request = CertificateRequest::new(
            &key,
            &DistinguishedName::from_common_name("node7").unwrap(),
            extensions(),
        )
        .unwrap();
        let from_der = CertificateRequest::from_der(&request.to_der().unwrap()).unwrap();
        assert_eq!(from_der, request);

        let pem = request.to_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE REQUEST-----"));
        assert_eq!(CertificateRequest::from_pem(&pem).unwrap(), request);
    }
}
