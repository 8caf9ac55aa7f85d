//! Revocation checking of a certificate chain against a set of CRLs.
//!
//! ```rust,ignore
//! ChainValidator::builder()
//!     .mode(ValidationMode::Strict)
//!     .build()
//!     .validate_chain(&[leaf, intermediate, root], &[root_crl, intermediate_crl])?;
//! ```

use std::collections::HashMap;

use bon::Builder;
use rsa::BigUint;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::cert::Certificate;
use crate::cert::extensions::CrlNumber;
use crate::cert::registry;
use crate::crl::CertificateRevocationList;
use crate::error::{PkiError, Result};
use crate::name::DistinguishedName;

/// How revocation failures are reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ValidationMode {
    /// Missing, expired, not-yet-valid and badly signed CRLs are distinct errors.
    #[default]
    Standard,
    /// Those four conditions are reported as [`PkiError::RevocationStatusUnknown`].
    Strict,
}

struct IndexedCrl<'a> {
    crl: &'a CertificateRevocationList,
    issuer: DistinguishedName,
    number: Option<BigUint>,
}

/// CRLs indexed by the key identifier in their AuthorityKeyIdentifier.
///
/// CRLs without a key identifier are kept in a bucket keyed by issuer name.
pub struct CrlIndex<'a> {
    entries: Vec<IndexedCrl<'a>>,
    by_key_id: HashMap<Vec<u8>, Vec<usize>>,
    by_name: HashMap<DistinguishedName, Vec<usize>>,
}

impl<'a> CrlIndex<'a> {
    pub fn new(crls: &'a [CertificateRevocationList]) -> Result<Self> {
        let mut index = Self {
            entries: Vec::with_capacity(crls.len()),
            by_key_id: HashMap::new(),
            by_name: HashMap::new(),
        };
        for crl in crls {
            let issuer = crl.issuer()?;
            let number = registry::find::<CrlNumber>(&crl.extensions())?.map(|number| number.0);
            let key_id = crl
                .authority_key_identifier()?
                .and_then(|aki| aki.key_identifier);

            let position = index.entries.len();
            match key_id {
                Some(key_id) => index.by_key_id.entry(key_id).or_default().push(position),
                None => index
                    .by_name
                    .entry(issuer.clone())
                    .or_default()
                    .push(position),
            }
            index.entries.push(IndexedCrl { crl, issuer, number });
        }
        Ok(index)
    }

    /// The CRL issued by `issuer` under one of `key_ids`.
    ///
    /// When several CRLs qualify, the one with the highest CRL number wins.
    pub fn find(
        &self,
        issuer: &DistinguishedName,
        key_ids: &[Vec<u8>],
    ) -> Option<&'a CertificateRevocationList> {
        let mut candidates: Vec<usize> = key_ids
            .iter()
            .filter_map(|key_id| self.by_key_id.get(key_id))
            .flatten()
            .chain(self.by_name.get(issuer).into_iter().flatten())
            .copied()
            .filter(|&position| self.entries[position].issuer == *issuer)
            .collect();
        candidates.sort_unstable();
        candidates.dedup();

        candidates
            .into_iter()
            .map(|position| &self.entries[position])
            .max_by(|a, b| a.number.cmp(&b.number))
            .map(|entry| entry.crl)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A chain member seen as a potential issuer.
struct ChainMember<'a> {
    cert: &'a Certificate,
    subject: DistinguishedName,
    key_ids: Vec<Vec<u8>>,
}

/// Checks that no certificate in a chain has been revoked.
///
/// # Fields
/// * `mode` - Whether CRL availability failures are distinguished.
/// * `now` - Evaluation time, the current time when absent.
#[derive(Clone, Debug, Default, Builder)]
pub struct ChainValidator {
    #[builder(default)]
    pub mode: ValidationMode,
    pub now: Option<OffsetDateTime>,
}

impl ChainValidator {
    /// Validates every certificate in `chain` against `crls`.
    ///
    /// The chain may be in any order but must contain the issuer of each of
    /// its certificates. For each certificate, in chain order, the issuer's
    /// CRL is located, its window and signature are checked, and the
    /// certificate's serial is looked up. The first failure is returned.
    /// CRLs that match no issuer are ignored.
    pub fn validate_chain(
        &self,
        chain: &[Certificate],
        crls: &[CertificateRevocationList],
    ) -> Result<()> {
        let now = self.now.unwrap_or_else(OffsetDateTime::now_utc);
        let index = CrlIndex::new(crls)?;
        let members = chain
            .iter()
            .map(|cert| {
                Ok(ChainMember {
                    cert,
                    subject: cert.subject()?,
                    key_ids: cert.key_identifiers()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        for cert in chain {
            self.check_certificate(cert, &members, &index, now)
                .inspect_err(|err| warn!(error = %err, "chain validation failed"))?;
        }
        debug!(certificates = chain.len(), crls = crls.len(), "chain validated");
        Ok(())
    }

    fn check_certificate(
        &self,
        cert: &Certificate,
        members: &[ChainMember<'_>],
        index: &CrlIndex<'_>,
        now: OffsetDateTime,
    ) -> Result<()> {
        let issuer_name = cert.issuer()?;
        let authority_key_id = cert
            .authority_key_identifier()?
            .and_then(|aki| aki.key_identifier);

        let issuer = members
            .iter()
            .find(|member| {
                member.subject == issuer_name
                    && authority_key_id
                        .as_ref()
                        .is_none_or(|key_id| member.key_ids.contains(key_id))
            })
            .ok_or_else(|| PkiError::IssuerNotInChain {
                subject: cert
                    .subject()
                    .map(|subject| subject.to_string())
                    .unwrap_or_default(),
            })?;

        let issuer_label = issuer_name.to_string();
        let Some(crl) = index.find(&issuer_name, &issuer.key_ids) else {
            return Err(self.coalesce(PkiError::MissingCrl {
                issuer: issuer_label,
            }));
        };
        debug!(
            serial = %cert.serial_number(),
            issuer = %issuer_name,
            crl_number = ?crl.crl_number().ok(),
            "matched CRL"
        );

        if let Some(next_update) = crl.next_update() {
            if now > next_update {
                return Err(self.coalesce(PkiError::ExpiredCrl {
                    issuer: issuer_label,
                    next_update: next_update.to_string(),
                }));
            }
        }
        let this_update = crl.this_update();
        if now < this_update {
            return Err(self.coalesce(PkiError::NotYetValidCrl {
                issuer: issuer_label,
                this_update: this_update.to_string(),
            }));
        }

        if !crl.verify_signature(&issuer.cert.public_key()?)? {
            return Err(self.coalesce(PkiError::InvalidCrlSignature {
                issuer: issuer_label,
            }));
        }

        if crl.is_revoked(cert) {
            return Err(PkiError::RevokedCertificate {
                serial: cert.serial_number().to_string(),
                issuer: issuer_label,
            });
        }
        Ok(())
    }

    fn coalesce(&self, err: PkiError) -> PkiError {
        if self.mode == ValidationMode::Standard {
            return err;
        }
        match err {
            PkiError::MissingCrl { ref issuer }
            | PkiError::ExpiredCrl { ref issuer, .. }
            | PkiError::NotYetValidCrl { ref issuer, .. }
            | PkiError::InvalidCrlSignature { ref issuer } => {
                PkiError::RevocationStatusUnknown {
                    issuer: issuer.clone(),
                    reason: err.to_string(),
                }
            }
            other => other,
        }
    }
}
