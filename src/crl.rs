//! Certificate revocation lists.
//!
//! A [`CertificateRevocationList`] is immutable once signed. Revoking returns
//! a new, re-signed CRL whose number is one higher than its predecessor's and
//! whose freshness window starts at the time of revocation.

use std::collections::HashSet;

use bon::Builder;
use const_oid::ObjectIdentifier;
use der::asn1::BitString;
use der::{Decode, Encode};
use rsa::BigUint;
use time::OffsetDateTime;
use tracing::{debug, info};
use x509_cert::Version;
use x509_cert::crl::{CertificateList, RevokedCert, TbsCertList};
use x509_cert::serial_number::SerialNumber;

use crate::cert::extensions::{AuthorityKeyIdentifier, CrlNumber, ToAndFromX509Extension};
use crate::cert::params::{ExtensionParam, from_x509_time, to_x509_time};
use crate::cert::registry::{self, ExtensionValue, swap_extension};
use crate::cert::{Certificate, SignatureAlgorithm};
use crate::error::{PkiError, Result};
use crate::key::{KeyPair, PublicKey};
use crate::key_id::KeyIdMethod;
use crate::name::{DistinguishedName, HasIssuer};
use crate::pem::{self as pem_codec, FromPemObject, PemObject};

/// Optional inputs when creating a CRL.
///
/// # Fields
/// * `crl_number` - Number of the first issuance, zero by default.
/// * `key_id_method` - How the AuthorityKeyIdentifier is derived.
/// * `extra_extensions` - Appended after the AKI and CRLNumber extensions.
#[derive(Clone, Debug, Default, Builder)]
pub struct CrlOptions {
    #[builder(default)]
    pub crl_number: BigUint,
    #[builder(default)]
    pub key_id_method: KeyIdMethod,
    #[builder(default)]
    pub extra_extensions: Vec<ExtensionParam>,
}

/// A revoked serial and the time it was revoked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevokedEntry {
    pub serial: BigUint,
    pub revocation_date: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRevocationList {
    pub inner: CertificateList,
}

fn ensure_key_pair(issuer_key: &KeyPair, issuer_public_key: &PublicKey) -> Result<()> {
    if issuer_key.public_key() != *issuer_public_key {
        return Err(PkiError::InvalidInput(
            "issuer public key does not belong to the signing key".to_string(),
        ));
    }
    Ok(())
}

fn sign_tbs(mut tbs_cert_list: TbsCertList, issuer_key: &KeyPair) -> Result<CertificateList> {
    let algorithm = issuer_key.default_signature_algorithm();
    tbs_cert_list.signature = algorithm.into();
    let signature = issuer_key.sign_with(&algorithm, &tbs_cert_list.to_der()?)?;
    Ok(CertificateList {
        tbs_cert_list,
        signature_algorithm: algorithm.into(),
        signature: BitString::from_bytes(&signature)?,
    })
}

impl CertificateRevocationList {
    /// Creates and signs an empty CRL.
    ///
    /// The AuthorityKeyIdentifier and CRLNumber extensions are always
    /// written first; `options.extra_extensions` follow unchanged.
    pub fn new(
        issuer: &DistinguishedName,
        issuer_key: &KeyPair,
        issuer_public_key: &PublicKey,
        this_update: OffsetDateTime,
        next_update: OffsetDateTime,
        options: CrlOptions,
    ) -> Result<Self> {
        ensure_key_pair(issuer_key, issuer_public_key)?;
        if this_update >= next_update {
            return Err(PkiError::InvalidInput(format!(
                "this_update {this_update} must be earlier than next_update {next_update}"
            )));
        }

        let aki = AuthorityKeyIdentifier::from_public_key(issuer_public_key, options.key_id_method)?;
        let mut extensions = vec![
            ExtensionParam::from_extension(&aki, false)?,
            ExtensionParam::from_extension(&CrlNumber(options.crl_number.clone()), false)?,
        ];
        extensions.extend(options.extra_extensions);

        let tbs_cert_list = TbsCertList {
            version: Version::V2,
            signature: issuer_key.default_signature_algorithm().into(),
            issuer: issuer.as_x509_name()?,
            this_update: to_x509_time(this_update)?,
            next_update: Some(to_x509_time(next_update)?),
            revoked_certificates: None,
            crl_extensions: Some(
                extensions
                    .iter()
                    .map(ExtensionParam::to_x509_extension)
                    .collect::<Result<Vec<_>>>()?,
            ),
        };

        let crl = Self {
            inner: sign_tbs(tbs_cert_list, issuer_key)?,
        };
        info!(
            issuer = %issuer,
            crl_number = %options.crl_number,
            next_update = %next_update,
            "issued CRL"
        );
        Ok(crl)
    }

    /// Revokes `serial` as of now.
    pub fn revoke(
        &self,
        issuer_key: &KeyPair,
        issuer_public_key: &PublicKey,
        serial: &BigUint,
    ) -> Result<Self> {
        self.revoke_multiple(issuer_key, issuer_public_key, std::slice::from_ref(serial))
    }

    /// Revokes `serial` as of `now`.
    pub fn revoke_at(
        &self,
        issuer_key: &KeyPair,
        issuer_public_key: &PublicKey,
        serial: &BigUint,
        now: OffsetDateTime,
    ) -> Result<Self> {
        self.revoke_multiple_at(issuer_key, issuer_public_key, std::slice::from_ref(serial), now)
    }

    /// Revokes every serial in `serials` as of now, in one issuance.
    pub fn revoke_multiple(
        &self,
        issuer_key: &KeyPair,
        issuer_public_key: &PublicKey,
        serials: &[BigUint],
    ) -> Result<Self> {
        self.revoke_multiple_at(issuer_key, issuer_public_key, serials, OffsetDateTime::now_utc())
    }

    /// Revokes every serial in `serials` as of `now`, in one issuance.
    ///
    /// The CRL number advances by exactly one whatever the batch size, and
    /// serials that are already listed are not repeated. The new window
    /// starts at `now` and spans as long as the previous one. Every extension
    /// other than CRLNumber is carried over byte for byte, in order.
    pub fn revoke_multiple_at(
        &self,
        issuer_key: &KeyPair,
        issuer_public_key: &PublicKey,
        serials: &[BigUint],
        now: OffsetDateTime,
    ) -> Result<Self> {
        ensure_key_pair(issuer_key, issuer_public_key)?;
        let previous = &self.inner.tbs_cert_list;
        let next_update = self.next_update().ok_or_else(|| {
            PkiError::InvalidInput("CRL without nextUpdate cannot be reissued".to_string())
        })?;
        let span = next_update - self.this_update();
        let crl_number = self.crl_number()? + BigUint::from(1u32);

        let mut extensions = self.extensions();
        swap_extension(
            &mut extensions,
            ExtensionParam::from_extension(&CrlNumber(crl_number.clone()), false)?,
        );

        let revocation_date = to_x509_time(now)?;
        let mut revoked = previous.revoked_certificates.clone().unwrap_or_default();
        let mut listed: HashSet<BigUint> = self.revoked_serials().into_iter().collect();
        let mut added = 0usize;
        for serial in serials {
            if !listed.insert(serial.clone()) {
                debug!(serial = %serial, "serial already revoked");
                continue;
            }
            revoked.push(RevokedCert {
                serial_number: SerialNumber::new(&serial.to_bytes_be())?,
                revocation_date,
                crl_entry_extensions: None,
            });
            added += 1;
        }

        let tbs_cert_list = TbsCertList {
            version: Version::V2,
            signature: previous.signature.clone(),
            issuer: previous.issuer.clone(),
            this_update: revocation_date,
            next_update: Some(to_x509_time(now + span)?),
            revoked_certificates: (!revoked.is_empty()).then_some(revoked),
            crl_extensions: Some(
                extensions
                    .iter()
                    .map(ExtensionParam::to_x509_extension)
                    .collect::<Result<Vec<_>>>()?,
            ),
        };

        let crl = Self {
            inner: sign_tbs(tbs_cert_list, issuer_key)?,
        };
        info!(
            issuer = %previous.issuer,
            crl_number = %crl_number,
            added,
            revoked = listed.len(),
            "reissued CRL"
        );
        Ok(crl)
    }

    pub fn issuer(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(&self.inner.tbs_cert_list.issuer)
    }

    pub fn this_update(&self) -> OffsetDateTime {
        from_x509_time(&self.inner.tbs_cert_list.this_update)
    }

    pub fn next_update(&self) -> Option<OffsetDateTime> {
        self.inner
            .tbs_cert_list
            .next_update
            .as_ref()
            .map(from_x509_time)
    }

    pub fn revoked_entries(&self) -> Vec<RevokedEntry> {
        self.inner
            .tbs_cert_list
            .revoked_certificates
            .iter()
            .flatten()
            .map(|rc| RevokedEntry {
                serial: BigUint::from_bytes_be(rc.serial_number.as_bytes()),
                revocation_date: from_x509_time(&rc.revocation_date),
            })
            .collect()
    }

    pub fn revoked_serials(&self) -> Vec<BigUint> {
        self.revoked_entries()
            .into_iter()
            .map(|entry| entry.serial)
            .collect()
    }

    pub fn is_serial_revoked(&self, serial: &BigUint) -> bool {
        self.inner
            .tbs_cert_list
            .revoked_certificates
            .iter()
            .flatten()
            .any(|rc| BigUint::from_bytes_be(rc.serial_number.as_bytes()) == *serial)
    }

    /// True iff `certificate`'s serial is listed.
    pub fn is_revoked(&self, certificate: &Certificate) -> bool {
        self.is_serial_revoked(&certificate.serial_number())
    }

    pub fn extensions(&self) -> Vec<ExtensionParam> {
        self.inner
            .tbs_cert_list
            .crl_extensions
            .iter()
            .flatten()
            .map(ExtensionParam::from)
            .collect()
    }

    pub fn extension(&self, oid: &ObjectIdentifier) -> Result<ExtensionValue> {
        registry::decode(&self.extensions(), oid)
    }

    /// The CRLNumber extension value.
    pub fn crl_number(&self) -> Result<BigUint> {
        registry::find::<CrlNumber>(&self.extensions())?
            .map(|number| number.0)
            .ok_or_else(|| PkiError::NotFound {
                oid: CrlNumber::OID.to_string(),
            })
    }

    pub fn authority_key_identifier(&self) -> Result<Option<AuthorityKeyIdentifier>> {
        registry::find::<AuthorityKeyIdentifier>(&self.extensions())
    }

    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm> {
        SignatureAlgorithm::try_from(&self.inner.signature_algorithm)
    }

    /// Checks the CRL signature against `issuer_key`.
    pub fn verify_signature(&self, issuer_key: &PublicKey) -> Result<bool> {
        let algorithm = self.signature_algorithm()?;
        let Some(signature) = self.inner.signature.as_bytes() else {
            return Ok(false);
        };
        let tbs = self.inner.tbs_cert_list.to_der()?;
        Ok(issuer_key.verify(&algorithm, &tbs, signature))
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| PkiError::EncodingError(e.to_string()))
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertificateList::from_der(der)?,
        })
    }

    pub fn to_pem(&self) -> Result<String> {
        Ok(pem_codec::to_pem(pem_codec::X509_CRL, &self.to_der()?))
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        pem_codec::expect_one(pem)
    }
}

impl HasIssuer for CertificateRevocationList {
    fn issuer_name(&self) -> Result<DistinguishedName> {
        self.issuer()
    }
}

impl FromPemObject for CertificateRevocationList {
    const KIND: &'static str = "CRL";

    fn from_pem_object(object: PemObject) -> std::result::Result<Self, PemObject> {
        match object {
            PemObject::Crl(crl) => Ok(crl),
            other => Err(other),
        }
    }
}
