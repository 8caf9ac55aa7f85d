use bon::Builder;
use const_oid::ObjectIdentifier;
use der::asn1::OctetString;
use time::Duration;
use time::OffsetDateTime;
use time::UtcOffset;

use super::extensions::ToAndFromX509Extension;
pub use crate::cert::extensions::ExtendedKeyUsage;
pub use crate::cert::extensions::ExtendedKeyUsageOption;
use crate::error::{PkiError, Result};
use crate::key::PublicKey;
pub use crate::name::DistinguishedName;

/// Parameters for building an X.509 certificate.
///
/// This struct contains the subject, public key, and optional extensions for the certificate.
///
/// # Fields
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `usages` - A list of extended key usage options.
/// * `is_ca` - Indicates if the certificate is a CA.
/// * `max_path_length` - Path length constraint for CA certificates.
/// * `extensions` - Additional X.509 extensions.
#[derive(Clone, Debug, Builder)]
pub struct CertificationRequestInfo {
    pub subject: DistinguishedName,
    pub subject_public_key: PublicKey,
    #[builder(default)]
    pub usages: Vec<ExtendedKeyUsageOption>,
    #[builder(default)]
    pub is_ca: bool,
    pub max_path_length: Option<u32>,
    #[builder(default)]
    pub extensions: Vec<ExtensionParam>,
}

/// Certificate validity period.
///
/// This struct represents the `notBefore` and `notAfter` fields in a certificate.
///
/// # Fields
/// * `not_before` - The start of the validity period.
/// * `not_after` - The end of the validity period.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Creates a validity period starting now for the given number of days.
    ///
    /// # Arguments
    /// * `days` - The number of days for the validity period.
    ///
    /// # Returns
    /// A `Validity` object.
    pub fn for_days(days: i64) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            not_before: now,
            not_after: now + Duration::days(days),
        }
    }

    /// Fails unless `not_before` is strictly earlier than `not_after`.
    pub fn check(&self) -> Result<()> {
        if self.not_before >= self.not_after {
            return Err(PkiError::InvalidInput(format!(
                "not_before {} must be earlier than not_after {}",
                self.not_before, self.not_after
            )));
        }
        Ok(())
    }

    pub fn contains(&self, at: OffsetDateTime) -> bool {
        self.not_before <= at && at <= self.not_after
    }

    pub fn to_x509_validity(&self) -> Result<x509_cert::time::Validity> {
        Ok(x509_cert::time::Validity {
            not_before: to_x509_time(self.not_before)?,
            not_after: to_x509_time(self.not_after)?,
        })
    }

    pub fn from_x509_validity(validity: &x509_cert::time::Validity) -> Self {
        Self {
            not_before: from_x509_time(&validity.not_before),
            not_after: from_x509_time(&validity.not_after),
        }
    }
}

/// Converts to an X.509 time, truncated to whole seconds.
///
/// Dates before 2050 UTC become UTCTime, later ones GeneralizedTime.
pub(crate) fn to_x509_time(at: OffsetDateTime) -> Result<x509_cert::time::Time> {
    let at = at
        .to_offset(UtcOffset::UTC)
        .replace_nanosecond(0)
        .map_err(|e| PkiError::InvalidInput(e.to_string()))?;
    let system_time = std::time::SystemTime::from(at);
    if at.year() < 2050 {
        Ok(x509_cert::time::Time::UtcTime(
            der::asn1::UtcTime::from_system_time(system_time)?,
        ))
    } else {
        Ok(x509_cert::time::Time::GeneralTime(
            der::asn1::GeneralizedTime::from_system_time(system_time)?,
        ))
    }
}

pub(crate) fn from_x509_time(at: &x509_cert::time::Time) -> OffsetDateTime {
    match at {
        x509_cert::time::Time::UtcTime(ut) => OffsetDateTime::from(ut.to_system_time()),
        x509_cert::time::Time::GeneralTime(gt) => OffsetDateTime::from(gt.to_system_time()),
    }
}

/// Represents an X.509 extension.
///
/// This struct contains the OID, criticality, and value of an extension. It
/// is also the lossless form of extensions the registry does not know.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

/// Unregistered extensions travel as their raw wire form.
pub type RawExtension = ExtensionParam;

impl ExtensionParam {
    /// Wraps an already encoded extension value.
    pub fn raw(oid: ObjectIdentifier, critical: bool, value: Vec<u8>) -> Self {
        Self {
            oid,
            critical,
            value,
        }
    }

    /// Creates an `ExtensionParam` from a specific extension.
    ///
    /// # Arguments
    /// * `extension` - The extension to encode.
    /// * `critical` - Indicates if the extension is critical.
    ///
    /// # Returns
    /// An `ExtensionParam` object.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: &E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    ///
    /// # Returns
    /// A decoded extension object.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E> {
        if self.oid != E::OID {
            return Err(PkiError::ValueShape {
                oid: self.oid.to_string(),
                expected: std::any::type_name::<E>(),
            });
        }
        E::from_x509_extension_value(&self.value)
    }

    pub fn to_x509_extension(&self) -> Result<x509_cert::ext::Extension> {
        Ok(x509_cert::ext::Extension {
            extn_id: self.oid,
            critical: self.critical,
            extn_value: OctetString::new(self.value.clone())?,
        })
    }
}

impl From<&x509_cert::ext::Extension> for ExtensionParam {
    fn from(ext: &x509_cert::ext::Extension) -> Self {
        Self {
            oid: ext.extn_id,
            critical: ext.critical,
            value: ext.extn_value.as_bytes().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::{BasicConstraints, KeyUsage};

    #[test]
    fn test_validity_ordering() {
        let validity = Validity::for_days(30);
        assert!(validity.check().is_ok());
        assert!(validity.contains(validity.not_before + Duration::days(1)));

        let inverted = Validity {
            not_before: validity.not_after,
            not_after: validity.not_before,
        };
        assert!(matches!(inverted.check(), Err(PkiError::InvalidInput(_))));

        let empty = Validity {
            not_before: validity.not_before,
            not_after: validity.not_before,
        };
        assert!(empty.check().is_err());
    }

    #[test]
    fn test_x509_time_switches_to_generalized_in_2050() {
        let last_utc = OffsetDateTime::from_unix_timestamp(2_524_607_999).unwrap();
        assert!(matches!(
            to_x509_time(last_utc).unwrap(),
            x509_cert::time::Time::UtcTime(_)
        ));
        let first_generalized = OffsetDateTime::from_unix_timestamp(2_524_608_000).unwrap();
        assert!(matches!(
            to_x509_time(first_generalized).unwrap(),
            x509_cert::time::Time::GeneralTime(_)
        ));
    }

    #[test]
    fn test_x509_time_picks_encoding_by_utc_year() {
        // 2049-12-31T22:00-05:00 is 2050-01-01T03:00Z
        let west = UtcOffset::from_hms(-5, 0, 0).unwrap();
        let at = OffsetDateTime::from_unix_timestamp(2_524_618_800)
            .unwrap()
            .to_offset(west);
        assert_eq!(at.year(), 2049);
        let encoded = to_x509_time(at).unwrap();
        assert!(matches!(encoded, x509_cert::time::Time::GeneralTime(_)));
        assert_eq!(from_x509_time(&encoded), at);

        // 2050-01-01T01:00+05:00 is 2049-12-31T20:00Z
        let east = UtcOffset::from_hms(5, 0, 0).unwrap();
        let at = OffsetDateTime::from_unix_timestamp(2_524_593_600)
            .unwrap()
            .to_offset(east);
        assert_eq!(at.year(), 2050);
        let encoded = to_x509_time(at).unwrap();
        assert!(matches!(encoded, x509_cert::time::Time::UtcTime(_)));
        assert_eq!(from_x509_time(&encoded), at);

        let validity = Validity {
            not_before: OffsetDateTime::from_unix_timestamp(2_524_000_000).unwrap(),
            not_after: OffsetDateTime::from_unix_timestamp(2_524_618_800)
                .unwrap()
                .to_offset(west),
        };
        let x509 = validity.to_x509_validity().unwrap();
        assert!(matches!(x509.not_after, x509_cert::time::Time::GeneralTime(_)));
    }

    #[test]
    fn test_x509_time_truncates_to_seconds() {
        let at = OffsetDateTime::from_unix_timestamp_nanos(1_700_000_000_750_000_000).unwrap();
        let round_trip = from_x509_time(&to_x509_time(at).unwrap());
        assert_eq!(round_trip.unix_timestamp(), 1_700_000_000);
        assert_eq!(round_trip.nanosecond(), 0);
    }

    #[test]
    fn test_extension_param_typed_round_trip() {
        let bc = BasicConstraints {
            is_ca: true,
            max_path_length: Some(0),
        };
        let param = ExtensionParam::from_extension(&bc, true).unwrap();
        assert!(param.critical);
        assert_eq!(param.to_extension::<BasicConstraints>().unwrap(), bc);
        assert!(matches!(
            param.to_extension::<KeyUsage>(),
            Err(PkiError::ValueShape { .. })
        ));
    }

    #[test]
    fn test_extension_param_x509_round_trip() {
        let param = ExtensionParam::raw(
            ObjectIdentifier::new_unwrap("1.3.6.1.4.1.99999.1"),
            false,
            vec![0x05, 0x00],
        );
        let ext = param.to_x509_extension().unwrap();
        assert_eq!(ExtensionParam::from(&ext), param);
    }
}
