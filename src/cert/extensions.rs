use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use const_oid::AssociatedOid;
use der::{
    Decode, Encode, Tag, Tagged,
    asn1::{Any, Ia5String, OctetString, PrintableString, Uint},
    oid::ObjectIdentifier,
};
use rsa::BigUint;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::serial_number::SerialNumber;

use crate::error::{PkiError, Result};
use crate::name::DistinguishedName;
use crate::oid;

/// Trait for converting to and from X.509 extensions.
///
/// This trait provides methods to encode and decode X.509 extension values.
///
/// # Example
/// ```
/// use pkikit::cert::extensions::{AltNames, SubjectAltName, ToAndFromX509Extension};
/// let san = SubjectAltName(AltNames {
///     dns_names: vec!["example.com".to_string()],
///     ..Default::default()
/// });
/// let encoded = san.to_x509_extension_value().unwrap();
/// let decoded = SubjectAltName::from_x509_extension_value(&encoded).unwrap();
/// assert_eq!(san, decoded);
/// ```
pub trait ToAndFromX509Extension {
    /// The Object Identifier (OID) for the extension.
    const OID: ObjectIdentifier;

    /// Encodes the extension into a DER-encoded byte vector.
    fn to_x509_extension_value(&self) -> Result<Vec<u8>>;

    /// Decodes the extension from a DER-encoded byte slice.
    fn from_x509_extension_value(extension: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

/// The GeneralName forms carried by the SubjectAltName and IssuerAltName
/// extensions.
///
/// Names are written grouped by form, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AltNames {
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub emails: Vec<String>,
    pub uris: Vec<String>,
    pub directory_names: Vec<DistinguishedName>,
}

fn ia5(oid: ObjectIdentifier, value: &str) -> Result<Ia5String> {
    let shape = || PkiError::ValueShape {
        oid: oid.to_string(),
        expected: "ASCII string",
    };
    if !value.is_ascii() {
        return Err(shape());
    }
    Ia5String::try_from(value.to_string()).map_err(|_| shape())
}

impl AltNames {
    pub fn is_empty(&self) -> bool {
        self.dns_names.is_empty()
            && self.ip_addresses.is_empty()
            && self.emails.is_empty()
            && self.uris.is_empty()
            && self.directory_names.is_empty()
    }

    fn to_general_names(&self, oid: ObjectIdentifier) -> Result<Vec<GeneralName>> {
        let mut names = Vec::new();
        for dns in &self.dns_names {
            names.push(GeneralName::DnsName(ia5(oid, dns)?));
        }
        for ip in &self.ip_addresses {
            let octets = match ip {
                IpAddr::V4(v4) => v4.octets().to_vec(),
                IpAddr::V6(v6) => v6.octets().to_vec(),
            };
            names.push(GeneralName::IpAddress(OctetString::new(octets)?));
        }
        for email in &self.emails {
            names.push(GeneralName::Rfc822Name(ia5(oid, email)?));
        }
        for uri in &self.uris {
            names.push(GeneralName::UniformResourceIdentifier(ia5(oid, uri)?));
        }
        for dn in &self.directory_names {
            names.push(GeneralName::DirectoryName(dn.as_x509_name()?));
        }
        Ok(names)
    }

    fn from_general_names(names: &[GeneralName]) -> Result<Self> {
        let mut alt_names = AltNames::default();
        for name in names {
            match name {
                GeneralName::DnsName(dns) => alt_names.dns_names.push(dns.to_string()),
                GeneralName::IpAddress(ip) => {
                    let ip = match ip.as_bytes().len() {
                        4 => {
                            let mut octets = [0u8; 4];
                            octets.copy_from_slice(ip.as_bytes());
                            IpAddr::V4(Ipv4Addr::from(octets))
                        }
                        16 => {
                            let mut octets = [0u8; 16];
                            octets.copy_from_slice(ip.as_bytes());
                            IpAddr::V6(Ipv6Addr::from(octets))
                        }
                        len => {
                            return Err(PkiError::DecodingError(format!(
                                "IP address of {len} bytes"
                            )));
                        }
                    };
                    alt_names.ip_addresses.push(ip);
                }
                GeneralName::Rfc822Name(email) => alt_names.emails.push(email.to_string()),
                GeneralName::UniformResourceIdentifier(uri) => {
                    alt_names.uris.push(uri.to_string())
                }
                GeneralName::DirectoryName(dn) => alt_names
                    .directory_names
                    .push(DistinguishedName::from_x509_name(dn)?),
                _ => {
                    return Err(PkiError::DecodingError(
                        "Unsupported general name type".to_string(),
                    ));
                }
            }
        }
        Ok(alt_names)
    }
}

/// Represents the Subject Alternative Name (SAN) extension.
///
/// This extension specifies additional identities for the subject of the certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectAltName(pub AltNames);

impl ToAndFromX509Extension for SubjectAltName {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectAltName::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let san = x509_cert::ext::pkix::SubjectAltName(self.0.to_general_names(Self::OID)?);
        Ok(san.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let san = x509_cert::ext::pkix::SubjectAltName::from_der(extension)?;
        Ok(Self(AltNames::from_general_names(&san.0)?))
    }
}

/// Represents the Issuer Alternative Name extension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssuerAltName(pub AltNames);

impl ToAndFromX509Extension for IssuerAltName {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::IssuerAltName::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let ian = x509_cert::ext::pkix::IssuerAltName(self.0.to_general_names(Self::OID)?);
        Ok(ian.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let ian = x509_cert::ext::pkix::IssuerAltName::from_der(extension)?;
        Ok(Self(AltNames::from_general_names(&ian.0)?))
    }
}

/// Represents the Basic Constraints extension.
///
/// This extension indicates whether the certificate is a CA certificate and its path length.
///
/// # Fields
/// * `is_ca` - Indicates if the certificate is a CA.
/// * `max_path_length` - The maximum number of intermediate CAs allowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub max_path_length: Option<u32>,
}

impl ToAndFromX509Extension for BasicConstraints {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::BasicConstraints::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let path_len_constraint = self
            .max_path_length
            .map(u8::try_from)
            .transpose()
            .map_err(|_| PkiError::ValueShape {
                oid: Self::OID.to_string(),
                expected: "path length of at most 255",
            })?;
        let bc = x509_cert::ext::pkix::BasicConstraints {
            ca: self.is_ca,
            path_len_constraint,
        };

        Ok(bc.to_der()?)
    }

    fn from_x509_extension_value(der_bytes: &[u8]) -> Result<Self> {
        let bc = x509_cert::ext::pkix::BasicConstraints::from_der(der_bytes)?;
        Ok(Self {
            is_ca: bc.ca,
            max_path_length: bc.path_len_constraint.map(u32::from),
        })
    }
}

pub use der::flagset::FlagSet;
use x509_cert::ext::pkix::KeyUsage as X509KeyUsage;
pub use x509_cert::ext::pkix::KeyUsages;

const KEY_USAGE_NAMES: [(KeyUsages, &str); 9] = [
    (KeyUsages::DigitalSignature, "digitalSignature"),
    (KeyUsages::NonRepudiation, "nonRepudiation"),
    (KeyUsages::KeyEncipherment, "keyEncipherment"),
    (KeyUsages::DataEncipherment, "dataEncipherment"),
    (KeyUsages::KeyAgreement, "keyAgreement"),
    (KeyUsages::KeyCertSign, "keyCertSign"),
    (KeyUsages::CRLSign, "cRLSign"),
    (KeyUsages::EncipherOnly, "encipherOnly"),
    (KeyUsages::DecipherOnly, "decipherOnly"),
];

/// Represents the Key Usage extension.
///
/// This extension defines the purpose of the key contained in the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub FlagSet<KeyUsages>);

impl KeyUsage {
    /// Builds a key usage from RFC 5280 bit names such as `keyCertSign`.
    pub fn from_names(names: &[&str]) -> Result<Self> {
        let mut flags = FlagSet::empty();
        for name in names {
            let (flag, _) = KEY_USAGE_NAMES
                .iter()
                .find(|(_, known)| known.eq_ignore_ascii_case(name))
                .ok_or_else(|| PkiError::InvalidInput(format!("unknown key usage {name}")))?;
            flags |= *flag;
        }
        Ok(Self(flags))
    }

    /// The RFC 5280 names of the bits that are set, in bit order.
    pub fn names(&self) -> Vec<&'static str> {
        KEY_USAGE_NAMES
            .iter()
            .filter(|(flag, _)| self.0.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl ToAndFromX509Extension for KeyUsage {
    const OID: ObjectIdentifier = <X509KeyUsage as AssociatedOid>::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let ku = X509KeyUsage(self.0);
        Ok(ku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let ku = X509KeyUsage::from_der(extension)?;
        Ok(Self(ku.0))
    }
}

/// Represents the Extended Key Usage extension.
///
/// This extension indicates purposes for which the public key may be used.
/// Purposes are kept as OIDs so unfamiliar ones survive a round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedKeyUsage {
    pub usage: Vec<ObjectIdentifier>,
}

impl ExtendedKeyUsage {
    pub fn from_options(options: &[ExtendedKeyUsageOption]) -> Self {
        Self {
            usage: options.iter().map(|v| (*v).into()).collect(),
        }
    }

    /// The purposes that have a named [`ExtendedKeyUsageOption`].
    pub fn options(&self) -> Vec<ExtendedKeyUsageOption> {
        self.usage
            .iter()
            .filter_map(|oid| ExtendedKeyUsageOption::try_from(*oid).ok())
            .collect()
    }
}

impl ToAndFromX509Extension for ExtendedKeyUsage {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::ExtendedKeyUsage::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage(self.usage.clone());
        Ok(eku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage::from_der(extension)?;
        Ok(Self { usage: eku.0 })
    }
}

/// Represents an option for the Extended Key Usage extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExtendedKeyUsageOption {
    ServerAuth,
    ClientAuth,
    CodeSigning,
    EmailProtection,
    TimeStamping,
    OcspSigning,
}

impl From<ExtendedKeyUsageOption> for ObjectIdentifier {
    fn from(value: ExtendedKeyUsageOption) -> Self {
        match value {
            ExtendedKeyUsageOption::OcspSigning => const_oid::db::rfc5912::ID_KP_OCSP_SIGNING,
            ExtendedKeyUsageOption::ServerAuth => const_oid::db::rfc5912::ID_KP_SERVER_AUTH,
            ExtendedKeyUsageOption::ClientAuth => const_oid::db::rfc5912::ID_KP_CLIENT_AUTH,
            ExtendedKeyUsageOption::CodeSigning => const_oid::db::rfc5912::ID_KP_CODE_SIGNING,
            ExtendedKeyUsageOption::EmailProtection => {
                const_oid::db::rfc5912::ID_KP_EMAIL_PROTECTION
            }
            ExtendedKeyUsageOption::TimeStamping => const_oid::db::rfc5912::ID_KP_TIME_STAMPING,
        }
    }
}

impl TryFrom<ObjectIdentifier> for ExtendedKeyUsageOption {
    type Error = PkiError;

    fn try_from(value: ObjectIdentifier) -> Result<Self> {
        match value {
            const_oid::db::rfc5912::ID_KP_OCSP_SIGNING => Ok(ExtendedKeyUsageOption::OcspSigning),
            const_oid::db::rfc5912::ID_KP_SERVER_AUTH => Ok(ExtendedKeyUsageOption::ServerAuth),
            const_oid::db::rfc5912::ID_KP_CLIENT_AUTH => Ok(ExtendedKeyUsageOption::ClientAuth),
            const_oid::db::rfc5912::ID_KP_CODE_SIGNING => Ok(ExtendedKeyUsageOption::CodeSigning),
            const_oid::db::rfc5912::ID_KP_EMAIL_PROTECTION => {
                Ok(ExtendedKeyUsageOption::EmailProtection)
            }
            const_oid::db::rfc5912::ID_KP_TIME_STAMPING => {
                Ok(ExtendedKeyUsageOption::TimeStamping)
            }
            other => Err(PkiError::InvalidInput(format!(
                "Unsupported extended key usage option {other}"
            ))),
        }
    }
}

/// Represents the Subject Key Identifier extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectKeyIdentifier(pub Vec<u8>);

impl ToAndFromX509Extension for SubjectKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier(OctetString::new(self.0.clone())?);
        Ok(ski.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier::from_der(extension)?;
        Ok(Self(ski.0.as_bytes().to_vec()))
    }
}

/// Represents the Authority Key Identifier (AKI) extension.
///
/// This extension identifies the public key corresponding to the private key used to sign the certificate.
///
/// # Fields
/// * `key_identifier` - The key identifier.
/// * `authority_cert_issuer` - Directory names of the issuer's issuer.
/// * `authority_cert_serial_number` - The issuer's certificate serial number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorityKeyIdentifier {
    pub key_identifier: Option<Vec<u8>>,
    pub authority_cert_issuer: Option<Vec<DistinguishedName>>,
    pub authority_cert_serial_number: Option<BigUint>,
}

impl ToAndFromX509Extension for AuthorityKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::AuthorityKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let authority_cert_issuer = self
            .authority_cert_issuer
            .as_ref()
            .map(|names| {
                names
                    .iter()
                    .map(|dn| dn.as_x509_name().map(GeneralName::DirectoryName))
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;

        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier {
            key_identifier: self
                .key_identifier
                .as_ref()
                .map(|id| OctetString::new(id.as_slice()))
                .transpose()?,
            authority_cert_issuer,
            authority_cert_serial_number: self
                .authority_cert_serial_number
                .as_ref()
                .map(|serial| SerialNumber::new(&serial.to_bytes_be()))
                .transpose()?,
        };

        Ok(aki.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier::from_der(extension)?;

        let authority_cert_issuer = aki
            .authority_cert_issuer
            .as_ref()
            .map(|names| {
                names
                    .iter()
                    .map(|name| match name {
                        GeneralName::DirectoryName(dn) => DistinguishedName::from_x509_name(dn),
                        _ => Err(PkiError::DecodingError(
                            "authority cert issuer must be a directory name".to_string(),
                        )),
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;

        Ok(Self {
            key_identifier: aki.key_identifier.map(|id| id.as_bytes().to_vec()),
            authority_cert_issuer,
            authority_cert_serial_number: aki
                .authority_cert_serial_number
                .map(|sn| BigUint::from_bytes_be(sn.as_bytes())),
        })
    }
}

/// Represents the CRL Number extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrlNumber(pub BigUint);

impl ToAndFromX509Extension for CrlNumber {
    const OID: ObjectIdentifier = oid::CRL_NUMBER;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        Ok(Uint::new(&self.0.to_bytes_be())?.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let number = Uint::from_der(extension)?;
        Ok(Self(BigUint::from_bytes_be(number.as_bytes())))
    }
}

/// Reads UTF8String, IA5String or PrintableString contents.
fn decode_text(extension: &[u8]) -> Result<String> {
    let any = Any::from_der(extension)?;
    match any.tag() {
        Tag::Utf8String => Ok(any.decode_as::<String>()?),
        Tag::Ia5String => Ok(any.decode_as::<Ia5String>()?.to_string()),
        Tag::PrintableString => Ok(any.decode_as::<PrintableString>()?.to_string()),
        other => Err(PkiError::DecodingError(format!(
            "expected a string value, found {other}"
        ))),
    }
}

/// Represents the Netscape comment extension, an IA5String.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetscapeComment(pub String);

impl ToAndFromX509Extension for NetscapeComment {
    const OID: ObjectIdentifier = oid::NETSCAPE_COMMENT;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        Ok(ia5(Self::OID, &self.0)?.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        decode_text(extension).map(Self)
    }
}

// Node-identity extensions are plain UTF8Strings under the vendor arc.
macro_rules! utf8_string_extension {
    ($(#[$doc:meta])* $name:ident, $oid:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name(pub String);

        impl ToAndFromX509Extension for $name {
            const OID: ObjectIdentifier = $oid;

            fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
                Ok(self.0.to_der()?)
            }

            fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
                decode_text(extension).map(Self)
            }
        }
    };
}

utf8_string_extension!(
    /// Unique identifier of the node the certificate was issued to.
    NodeUid,
    oid::NODE_UID
);
utf8_string_extension!(
    /// Cloud instance identifier of the node.
    InstanceId,
    oid::NODE_INSTANCE_ID
);
utf8_string_extension!(
    /// Machine image the node was booted from.
    ImageName,
    oid::NODE_IMAGE_NAME
);
utf8_string_extension!(
    /// Pre-shared key presented by the node when it requested the certificate.
    PresharedKey,
    oid::NODE_PRESHARED_KEY
);
