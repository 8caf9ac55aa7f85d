use der::flagset::FlagSet;
use rsa::BigUint;
use tracing::info;

use crate::cert::Certificate;
use crate::cert::extensions::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, ExtendedKeyUsageOption, KeyUsage,
    KeyUsages, SubjectKeyIdentifier, ToAndFromX509Extension,
};
use crate::cert::params::{CertificationRequestInfo, ExtensionParam, Validity};
use crate::cert::registry::swap_extension;
use crate::error::{PkiError, Result};
use crate::key::KeyPair;
use crate::key_id::KeyIdMethod;
use crate::name::DistinguishedName;
use crate::request::CertificateRequest;
use crate::tbs_certificate::TbsCertificate;

/// Extensions that [`Issuer::issue`] always writes itself.
const ISSUANCE_EXTENSIONS: [const_oid::ObjectIdentifier; 5] = [
    BasicConstraints::OID,
    KeyUsage::OID,
    ExtendedKeyUsage::OID,
    SubjectKeyIdentifier::OID,
    AuthorityKeyIdentifier::OID,
];

/// Drops the extensions issuance regenerates from the typed request fields.
pub(crate) fn without_issuance_extensions(extensions: Vec<ExtensionParam>) -> Vec<ExtensionParam> {
    extensions
        .into_iter()
        .filter(|ext| !ISSUANCE_EXTENSIONS.contains(&ext.oid))
        .collect()
}

/// Key usage bits implied by the request.
fn key_usage_for(cert_request: &CertificationRequestInfo) -> FlagSet<KeyUsages> {
    let mut key_usage_flags: FlagSet<KeyUsages> = FlagSet::empty();

    if cert_request.is_ca {
        key_usage_flags |= KeyUsages::KeyCertSign;
        key_usage_flags |= KeyUsages::CRLSign;
    }

    for usage in &cert_request.usages {
        match usage {
            ExtendedKeyUsageOption::ClientAuth
            | ExtendedKeyUsageOption::ServerAuth
            | ExtendedKeyUsageOption::EmailProtection => {
                key_usage_flags |= KeyUsages::DigitalSignature;
                key_usage_flags |= KeyUsages::KeyEncipherment;
            }
            ExtendedKeyUsageOption::CodeSigning
            | ExtendedKeyUsageOption::TimeStamping
            | ExtendedKeyUsageOption::OcspSigning => {
                key_usage_flags |= KeyUsages::DigitalSignature;
            }
        }
    }
    key_usage_flags
}

/// Represents an entity capable of issuing certificates.
///
/// This trait provides methods to retrieve issuer details and issue certificates.
pub trait Issuer {
    /// Returns the distinguished name of the issuer.
    fn issuer_name(&self) -> Result<DistinguishedName>;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// The AuthorityKeyIdentifier written into issued certificates.
    fn authority_key_identifier(&self, method: KeyIdMethod) -> Result<AuthorityKeyIdentifier> {
        AuthorityKeyIdentifier::from_public_key(&self.signing_key().public_key(), method)
    }

    /// Issues a certificate based on the provided certification request information.
    ///
    /// Key identifiers use [`KeyIdMethod::Type1`].
    ///
    /// # Arguments
    /// * `cert_request` - The certification request information containing details about the certificate to be issued.
    /// * `validity` - The validity window of the new certificate.
    /// * `serial` - The serial number, unique for this issuer.
    ///
    /// # Returns
    /// A `Certificate` object representing the issued certificate.
    fn issue(
        &self,
        cert_request: &CertificationRequestInfo,
        validity: Validity,
        serial: BigUint,
    ) -> Result<Certificate> {
        self.issue_with_key_id(cert_request, validity, serial, KeyIdMethod::Type1)
    }

    /// Like [`Issuer::issue`], deriving key identifiers with `method`.
    ///
    /// BasicConstraints, AuthorityKeyIdentifier, SubjectKeyIdentifier, KeyUsage
    /// and ExtendedKeyUsage are generated from the request; any other request
    /// extension is copied, replacing a generated one with the same OID.
    fn issue_with_key_id(
        &self,
        cert_request: &CertificationRequestInfo,
        validity: Validity,
        serial: BigUint,
        method: KeyIdMethod,
    ) -> Result<Certificate> {
        let issuer_dn = self.issuer_name()?;

        let basic_constraints = BasicConstraints {
            is_ca: cert_request.is_ca,
            max_path_length: cert_request.max_path_length.filter(|_| cert_request.is_ca),
        };
        let subject_key_id =
            SubjectKeyIdentifier::from_public_key(&cert_request.subject_public_key, method)?;

        let mut extensions: Vec<ExtensionParam> = vec![
            ExtensionParam::from_extension(&basic_constraints, true)?,
            ExtensionParam::from_extension(&self.authority_key_identifier(method)?, false)?,
            ExtensionParam::from_extension(&subject_key_id, false)?,
        ];

        let key_usage_flags = key_usage_for(cert_request);
        if !key_usage_flags.is_empty() {
            extensions.push(ExtensionParam::from_extension(&KeyUsage(key_usage_flags), true)?);
        }

        if !cert_request.usages.is_empty() {
            let extended_key_usage = ExtendedKeyUsage::from_options(&cert_request.usages);
            extensions.push(ExtensionParam::from_extension(&extended_key_usage, false)?);
        }

        for extension in &cert_request.extensions {
            swap_extension(&mut extensions, extension.clone());
        }

        let cert = TbsCertificate::builder()
            .serial_number(serial)
            .issuer(issuer_dn.clone())
            .validity(validity)
            .subject(cert_request.subject.clone())
            .subject_public_key(cert_request.subject_public_key.clone())
            .extensions(extensions)
            .build()
            .sign(self.signing_key())?;

        info!(
            serial = %cert.serial_number(),
            subject = %cert_request.subject,
            issuer = %issuer_dn,
            is_ca = cert_request.is_ca,
            "issued certificate"
        );
        Ok(cert)
    }

    /// Issues a certificate for a signing request.
    ///
    /// The request's own signature is checked first; a request that does not
    /// verify is refused with [`PkiError::Signing`].
    fn issue_from_request(
        &self,
        request: &CertificateRequest,
        validity: Validity,
        serial: BigUint,
    ) -> Result<Certificate> {
        if !request.verify_signature()? {
            return Err(PkiError::Signing(format!(
                "signature on request from {} does not verify",
                request.subject()?
            )));
        }
        self.issue(&request.to_cert_info()?, validity, serial)
    }
}
