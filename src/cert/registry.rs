//! The extension registry.
//!
//! One row per supported OID ties the OID to a typed value from
//! [`super::extensions`] and its DER codec. Values are carried as the closed
//! sum type [`ExtensionValue`]; OIDs outside the table round-trip through
//! [`ExtensionValue::Raw`].

use const_oid::ObjectIdentifier;
use tracing::debug;

use super::extensions::{
    AuthorityKeyIdentifier, BasicConstraints, CrlNumber, ExtendedKeyUsage, ImageName, InstanceId,
    IssuerAltName, KeyUsage, NetscapeComment, NodeUid, PresharedKey, SubjectAltName,
    SubjectKeyIdentifier, ToAndFromX509Extension,
};
use super::params::ExtensionParam;
pub use super::params::RawExtension;
use crate::error::{PkiError, Result};

/// A decoded extension value, one variant per registry row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionValue {
    BasicConstraints(BasicConstraints),
    KeyUsage(KeyUsage),
    ExtendedKeyUsage(ExtendedKeyUsage),
    SubjectAltName(SubjectAltName),
    IssuerAltName(IssuerAltName),
    SubjectKeyIdentifier(SubjectKeyIdentifier),
    AuthorityKeyIdentifier(AuthorityKeyIdentifier),
    CrlNumber(CrlNumber),
    NetscapeComment(NetscapeComment),
    NodeUid(NodeUid),
    InstanceId(InstanceId),
    ImageName(ImageName),
    PresharedKey(PresharedKey),
    /// DER value bytes of an extension the registry does not interpret.
    Raw(Vec<u8>),
}

/// Links a typed extension to its [`ExtensionValue`] variant.
pub trait Registered: ToAndFromX509Extension + Sized {
    fn into_value(self) -> ExtensionValue;
    fn from_value(value: &ExtensionValue) -> Option<&Self>;
}

macro_rules! registered {
    ($($ty:ident),* $(,)?) => {
        $(
            impl Registered for $ty {
                fn into_value(self) -> ExtensionValue {
                    ExtensionValue::$ty(self)
                }

                fn from_value(value: &ExtensionValue) -> Option<&Self> {
                    match value {
                        ExtensionValue::$ty(inner) => Some(inner),
                        _ => None,
                    }
                }
            }

            impl From<$ty> for ExtensionValue {
                fn from(value: $ty) -> Self {
                    value.into_value()
                }
            }
        )*
    };
}

registered!(
    BasicConstraints,
    KeyUsage,
    ExtendedKeyUsage,
    SubjectAltName,
    IssuerAltName,
    SubjectKeyIdentifier,
    AuthorityKeyIdentifier,
    CrlNumber,
    NetscapeComment,
    NodeUid,
    InstanceId,
    ImageName,
    PresharedKey,
);

/// A registry row.
pub struct RegistryEntry {
    pub oid: ObjectIdentifier,
    pub name: &'static str,
    /// Human readable value shape, used in [`PkiError::ValueShape`].
    pub shape: &'static str,
    encode: fn(&ExtensionValue) -> Option<Result<Vec<u8>>>,
    decode: fn(&[u8]) -> Result<ExtensionValue>,
}

impl RegistryEntry {
    /// Encodes `value`, or fails with `ValueShape` if it belongs to another
    /// row or cannot be expressed in this row's shape.
    pub fn encode(&self, value: &ExtensionValue) -> Result<Vec<u8>> {
        let encoded = match value {
            ExtensionValue::Raw(bytes) => (self.decode)(bytes).map(|_| bytes.clone()),
            typed => (self.encode)(typed).unwrap_or_else(|| Err(self.shape_error())),
        };
        encoded.map_err(|err| match err {
            PkiError::ValueShape { .. } => err,
            other => {
                debug!(oid = %self.oid, error = %other, "value does not fit extension shape");
                self.shape_error()
            }
        })
    }

    fn shape_error(&self) -> PkiError {
        PkiError::ValueShape {
            oid: self.oid.to_string(),
            expected: self.shape,
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<ExtensionValue> {
        (self.decode)(bytes)
    }
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("oid", &self.oid)
            .field("name", &self.name)
            .field("shape", &self.shape)
            .finish()
    }
}

fn encode_row<E: Registered>(value: &ExtensionValue) -> Option<Result<Vec<u8>>> {
    E::from_value(value).map(|ext| ext.to_x509_extension_value())
}

fn decode_row<E: Registered>(bytes: &[u8]) -> Result<ExtensionValue> {
    E::from_x509_extension_value(bytes).map(E::into_value)
}

const fn row<E: Registered>(name: &'static str, shape: &'static str) -> RegistryEntry {
    RegistryEntry {
        oid: E::OID,
        name,
        shape,
        encode: encode_row::<E>,
        decode: decode_row::<E>,
    }
}

static REGISTRY: [RegistryEntry; 13] = [
    row::<BasicConstraints>("basicConstraints", "{is_ca, max_path_length}"),
    row::<KeyUsage>("keyUsage", "key usage flags"),
    row::<ExtendedKeyUsage>("extendedKeyUsage", "sequence of OIDs"),
    row::<SubjectAltName>("subjectAltName", "general names"),
    row::<IssuerAltName>("issuerAltName", "general names"),
    row::<SubjectKeyIdentifier>("subjectKeyIdentifier", "key identifier bytes"),
    row::<AuthorityKeyIdentifier>(
        "authorityKeyIdentifier",
        "{key_identifier, authority_cert_issuer, authority_cert_serial_number}",
    ),
    row::<CrlNumber>("cRLNumber", "non-negative integer"),
    row::<NetscapeComment>("nsComment", "ASCII string"),
    row::<NodeUid>("nodeUid", "UTF-8 string"),
    row::<InstanceId>("nodeInstanceId", "UTF-8 string"),
    row::<ImageName>("nodeImageName", "UTF-8 string"),
    row::<PresharedKey>("nodePresharedKey", "UTF-8 string"),
];

/// Every registered row, in table order.
pub fn entries() -> &'static [RegistryEntry] {
    &REGISTRY
}

/// Looks up the registry row for `oid`.
pub fn lookup(oid: &ObjectIdentifier) -> Option<&'static RegistryEntry> {
    REGISTRY.iter().find(|entry| entry.oid == *oid)
}

/// Encodes `value` as the extension `oid`.
///
/// Fails with `UnknownOid` for OIDs outside the registry (use
/// [`ExtensionParam::raw`] for those) and with `ValueShape` when `value` is
/// not the shape `oid` expects.
pub fn encode(oid: &ObjectIdentifier, value: &ExtensionValue, critical: bool) -> Result<ExtensionParam> {
    let entry = lookup(oid).ok_or_else(|| PkiError::UnknownOid {
        oid: oid.to_string(),
    })?;
    debug!(oid = %oid, name = entry.name, critical, "encoding extension");
    Ok(ExtensionParam {
        oid: *oid,
        critical,
        value: entry.encode(value)?,
    })
}

/// Decodes the extension `oid` out of `extensions`.
///
/// Extensions the registry does not know come back as
/// [`ExtensionValue::Raw`].
pub fn decode(extensions: &[ExtensionParam], oid: &ObjectIdentifier) -> Result<ExtensionValue> {
    let ext = extensions
        .iter()
        .find(|ext| ext.oid == *oid)
        .ok_or_else(|| PkiError::NotFound {
            oid: oid.to_string(),
        })?;
    match lookup(oid) {
        Some(entry) => entry.decode(&ext.value),
        None => Ok(ExtensionValue::Raw(ext.value.clone())),
    }
}

/// Decodes the typed extension `E` if present.
pub fn find<E: ToAndFromX509Extension>(extensions: &[ExtensionParam]) -> Result<Option<E>> {
    extensions
        .iter()
        .find(|ext| ext.oid == E::OID)
        .map(|ext| ext.to_extension::<E>())
        .transpose()
}

/// Replaces the extension with the same OID as `extension`, or appends it.
///
/// The replaced extension keeps its position.
pub fn swap_extension(extensions: &mut Vec<ExtensionParam>, extension: ExtensionParam) {
    match extensions.iter_mut().find(|ext| ext.oid == extension.oid) {
        Some(slot) => *slot = extension,
        None => extensions.push(extension),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::{AltNames, KeyUsages};
    use crate::oid;
    use rsa::BigUint;

    fn samples() -> Vec<ExtensionValue> {
        vec![
            BasicConstraints {
                is_ca: false,
                max_path_length: None,
            }
            .into(),
            KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign).into(),
            ExtendedKeyUsage {
                usage: vec![const_oid::db::rfc5912::ID_KP_SERVER_AUTH],
            }
            .into(),
            SubjectAltName(AltNames {
                dns_names: vec!["node1.example.com".to_string()],
                ip_addresses: vec!["192.168.1.7".parse().unwrap()],
                ..Default::default()
            })
            .into(),
            IssuerAltName(AltNames {
                emails: vec!["ca@example.com".to_string()],
                ..Default::default()
            })
            .into(),
            SubjectKeyIdentifier(vec![0xab; 20]).into(),
            AuthorityKeyIdentifier {
                key_identifier: Some(vec![0xcd; 8]),
                authority_cert_issuer: Some(vec!["CN=Root".parse().unwrap()]),
                authority_cert_serial_number: Some(BigUint::from(42u32)),
            }
            .into(),
            CrlNumber(BigUint::from(7u32)).into(),
            NetscapeComment("Puppet Ruby/OpenSSL Internal Certificate".to_string()).into(),
            NodeUid("ed803750-e3d7-44f5-bb08-41a04433b2ed".to_string()).into(),
            InstanceId("i-0a1b2c3d".to_string()).into(),
            ImageName("debian-13".to_string()).into(),
            PresharedKey("s3cr3t".to_string()).into(),
        ]
    }

    #[test]
    fn test_every_row_round_trips() {
        let values = samples();
        assert_eq!(values.len(), entries().len());
        for (entry, value) in entries().iter().zip(values) {
            for critical in [false, true] {
                let ext = encode(&entry.oid, &value, critical).unwrap();
                assert_eq!(ext.critical, critical);
                let decoded = decode(&[ext], &entry.oid).unwrap();
                assert_eq!(decoded, value, "{}", entry.name);
            }
        }
    }

    #[test]
    fn test_unknown_oid_is_rejected() {
        let unknown = ObjectIdentifier::new_unwrap("1.2.3.4.5");
        let err = encode(&unknown, &ExtensionValue::Raw(vec![0x05, 0x00]), false).unwrap_err();
        assert_eq!(
            err,
            PkiError::UnknownOid {
                oid: "1.2.3.4.5".to_string()
            }
        );
    }

    #[test]
    fn test_value_shape_is_checked() {
        let err = encode(
            &oid::BASIC_CONSTRAINTS,
            &NodeUid("node".to_string()).into(),
            true,
        )
        .unwrap_err();
        assert!(matches!(err, PkiError::ValueShape { oid, .. } if oid == "2.5.29.19"));

        for bytes in [vec![0x0c, 0x00], vec![0x0c, 0x01, b'x'], vec![]] {
            let err = encode(&oid::CRL_NUMBER, &ExtensionValue::Raw(bytes), false).unwrap_err();
            assert!(
                matches!(&err, PkiError::ValueShape { oid, .. } if oid == "2.5.29.20"),
                "{err:?}"
            );
        }
    }

    #[test]
    fn test_unencodable_typed_values_are_shape_errors() {
        let err = encode(
            &oid::BASIC_CONSTRAINTS,
            &BasicConstraints {
                is_ca: true,
                max_path_length: Some(256),
            }
            .into(),
            true,
        )
        .unwrap_err();
        assert!(matches!(err, PkiError::ValueShape { oid, .. } if oid == "2.5.29.19"));

        let san = SubjectAltName(AltNames {
            dns_names: vec!["bücher.example".to_string()],
            ..Default::default()
        });
        let err = encode(&oid::SUBJECT_ALT_NAME, &san.into(), false).unwrap_err();
        assert!(matches!(err, PkiError::ValueShape { oid, .. } if oid == "2.5.29.17"));
    }

    #[test]
    fn test_raw_value_for_registered_oid() {
        let ext = encode(&oid::CRL_NUMBER, &ExtensionValue::Raw(vec![0x02, 0x01, 0x05]), false)
            .unwrap();
        assert_eq!(
            decode(&[ext], &oid::CRL_NUMBER).unwrap(),
            CrlNumber(BigUint::from(5u32)).into()
        );
    }

    #[test]
    fn test_decode_missing_and_unregistered() {
        let unknown = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.99999.7");
        let raw = ExtensionParam::raw(unknown, true, vec![0x04, 0x02, 0xde, 0xad]);
        let set = vec![raw.clone()];

        assert_eq!(
            decode(&set, &unknown).unwrap(),
            ExtensionValue::Raw(raw.value.clone())
        );
        assert_eq!(
            decode(&set, &oid::KEY_USAGE).unwrap_err(),
            PkiError::NotFound {
                oid: "2.5.29.15".to_string()
            }
        );
    }

    #[test]
    fn test_lookup_and_find() {
        assert_eq!(lookup(&oid::AUTHORITY_KEY_IDENTIFIER).unwrap().name, "authorityKeyIdentifier");
        assert!(lookup(&oid::NODE_IDENTITY_ARC).is_none());

        let set = vec![ExtensionParam::from_extension(&ImageName("alpine".to_string()), false).unwrap()];
        assert_eq!(find::<ImageName>(&set).unwrap(), Some(ImageName("alpine".to_string())));
        assert_eq!(find::<NodeUid>(&set).unwrap(), None);
    }

    #[test]
    fn test_swap_extension_replaces_in_place() {
        let mut set = vec![
            encode(&oid::NODE_UID, &NodeUid("a".to_string()).into(), false).unwrap(),
            encode(&oid::NODE_IMAGE_NAME, &ImageName("x".to_string()).into(), false).unwrap(),
        ];
        swap_extension(
            &mut set,
            encode(&oid::NODE_UID, &NodeUid("b".to_string()).into(), true).unwrap(),
        );
        assert_eq!(set.len(), 2);
        assert_eq!(set[0].oid, oid::NODE_UID);
        assert!(set[0].critical);
        assert_eq!(find::<NodeUid>(&set).unwrap(), Some(NodeUid("b".to_string())));

        swap_extension(
            &mut set,
            encode(&oid::NODE_INSTANCE_ID, &InstanceId("i-1".to_string()).into(), false).unwrap(),
        );
        assert_eq!(set.len(), 3);
    }
}
