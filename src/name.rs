//! X.500 distinguished names.
//!
//! A [`DistinguishedName`] is an ordered list of `(attribute, value)` pairs,
//! most specific first, the way it is written as text (`CN=node1,O=Example`).
//! The DER form stores the same pairs in reverse order.

use std::fmt;
use std::str::FromStr;

use const_oid::ObjectIdentifier;
use der::asn1::{Any, PrintableStringRef, SetOfVec};
use der::{Tag, Tagged};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};

use crate::error::{PkiError, Result};

// PKCS#9 emailAddress
const EMAIL_ADDRESS: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.1");

/// The attribute types a [`DistinguishedName`] may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttributeType {
    CommonName,
    Country,
    Locality,
    State,
    Street,
    Organization,
    OrganizationalUnit,
    DomainComponent,
    UserId,
    SerialNumber,
    EmailAddress,
}

impl AttributeType {
    const ALL: [AttributeType; 11] = [
        AttributeType::CommonName,
        AttributeType::Country,
        AttributeType::Locality,
        AttributeType::State,
        AttributeType::Street,
        AttributeType::Organization,
        AttributeType::OrganizationalUnit,
        AttributeType::DomainComponent,
        AttributeType::UserId,
        AttributeType::SerialNumber,
        AttributeType::EmailAddress,
    ];

    /// Canonical short name used when rendering.
    pub fn short_name(self) -> &'static str {
        match self {
            AttributeType::CommonName => "CN",
            AttributeType::Country => "C",
            AttributeType::Locality => "L",
            AttributeType::State => "ST",
            AttributeType::Street => "STREET",
            AttributeType::Organization => "O",
            AttributeType::OrganizationalUnit => "OU",
            AttributeType::DomainComponent => "DC",
            AttributeType::UserId => "UID",
            AttributeType::SerialNumber => "SERIALNUMBER",
            AttributeType::EmailAddress => "emailAddress",
        }
    }

    fn long_name(self) -> &'static str {
        match self {
            AttributeType::CommonName => "commonName",
            AttributeType::Country => "countryName",
            AttributeType::Locality => "localityName",
            AttributeType::State => "stateOrProvinceName",
            AttributeType::Street => "streetAddress",
            AttributeType::Organization => "organizationName",
            AttributeType::OrganizationalUnit => "organizationalUnitName",
            AttributeType::DomainComponent => "domainComponent",
            AttributeType::UserId => "userId",
            AttributeType::SerialNumber => "serialNumber",
            AttributeType::EmailAddress => "E",
        }
    }

    pub fn oid(self) -> ObjectIdentifier {
        use const_oid::db::rfc4519;
        match self {
            AttributeType::CommonName => rfc4519::CN,
            AttributeType::Country => rfc4519::C,
            AttributeType::Locality => rfc4519::L,
            AttributeType::State => rfc4519::ST,
            AttributeType::Street => rfc4519::STREET,
            AttributeType::Organization => rfc4519::O,
            AttributeType::OrganizationalUnit => rfc4519::OU,
            AttributeType::DomainComponent => rfc4519::DC,
            AttributeType::UserId => rfc4519::UID,
            AttributeType::SerialNumber => rfc4519::SERIAL_NUMBER,
            AttributeType::EmailAddress => EMAIL_ADDRESS,
        }
    }

    /// Looks up an attribute by its short or long name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|attr| {
            attr.short_name().eq_ignore_ascii_case(name) || attr.long_name().eq_ignore_ascii_case(name)
        })
    }

    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        Self::ALL.into_iter().find(|attr| attr.oid() == *oid)
    }

    fn encode_value(self, value: &str) -> Result<Any> {
        let tag = match self {
            AttributeType::Country if PrintableStringRef::new(value).is_ok() => Tag::PrintableString,
            AttributeType::DomainComponent | AttributeType::EmailAddress if value.is_ascii() => {
                Tag::Ia5String
            }
            _ => Tag::Utf8String,
        };
        Ok(Any::new(tag, value.as_bytes())?)
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// An X.500 distinguished name.
///
/// Equality is structural: two names are equal when they hold the same
/// attributes with the same values in the same order, regardless of how they
/// were spelled or encoded.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DistinguishedName {
    attributes: Vec<(AttributeType, String)>,
}

impl DistinguishedName {
    /// Creates a name from attribute pairs, most specific first.
    pub fn new(attributes: Vec<(AttributeType, String)>) -> Result<Self> {
        if attributes.is_empty() {
            return Err(malformed("", "a distinguished name needs at least one attribute"));
        }
        if let Some((attr, _)) = attributes.iter().find(|(_, value)| value.is_empty()) {
            return Err(malformed("", &format!("attribute {attr} has an empty value")));
        }
        Ok(Self { attributes })
    }

    /// Shorthand for a name holding only a common name.
    pub fn from_common_name(common_name: impl Into<String>) -> Result<Self> {
        Self::new(vec![(AttributeType::CommonName, common_name.into())])
    }

    /// Appends an attribute, returning the extended name.
    pub fn with(mut self, attr: AttributeType, value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(malformed("", &format!("attribute {attr} has an empty value")));
        }
        self.attributes.push((attr, value));
        Ok(self)
    }

    pub fn attributes(&self) -> &[(AttributeType, String)] {
        &self.attributes
    }

    /// The value of the first CN attribute, or an empty string.
    pub fn common_name(&self) -> &str {
        self.attributes
            .iter()
            .find(|(attr, _)| *attr == AttributeType::CommonName)
            .map(|(_, value)| value.as_str())
            .unwrap_or_default()
    }

    /// Converts the name to its X.509 form.
    pub fn as_x509_name(&self) -> Result<Name> {
        let rdns = self
            .attributes
            .iter()
            .rev()
            .map(|(attr, value)| {
                let atv = AttributeTypeAndValue {
                    oid: attr.oid(),
                    value: attr.encode_value(value)?,
                };
                Ok(RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from its X.509 form.
    ///
    /// Multi-valued RDNs are flattened in set order.
    pub fn from_x509_name(x509dn: &Name) -> Result<Self> {
        let mut attributes = Vec::new();
        for rdn in x509dn.0.iter().rev() {
            for atv in rdn.0.iter() {
                let attr = AttributeType::from_oid(&atv.oid).ok_or_else(|| {
                    malformed(&x509dn.to_string(), &format!("unsupported attribute {}", atv.oid))
                })?;
                let value = match atv.value.tag() {
                    Tag::Utf8String | Tag::PrintableString | Tag::Ia5String | Tag::TeletexString => {
                        String::from_utf8(atv.value.value().to_vec()).map_err(|e| {
                            malformed(&x509dn.to_string(), &e.to_string())
                        })?
                    }
                    other => {
                        return Err(malformed(
                            &x509dn.to_string(),
                            &format!("attribute {attr} has unsupported string type {other}"),
                        ));
                    }
                };
                attributes.push((attr, value));
            }
        }
        Self::new(attributes).map_err(|e| match e {
            PkiError::MalformedName { reason, .. } => malformed(&x509dn.to_string(), &reason),
            other => other,
        })
    }
}

fn malformed(input: &str, reason: &str) -> PkiError {
    PkiError::MalformedName {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

/// Parses `CN=a,O=b` or the slash form `/CN=a/O=b`.
pub fn parse(input: &str) -> Result<DistinguishedName> {
    if input.trim().is_empty() {
        return Err(malformed(input, "empty name"));
    }
    // Trailing whitespace is left to `unescape`, which keeps it when escaped.
    let trimmed = input.trim_start();
    let (separator, body) = match trimmed.strip_prefix('/') {
        Some(rest) => ('/', rest),
        None => (',', trimmed),
    };

    let mut attributes = Vec::new();
    for token in split_unescaped(body, separator, input)? {
        let Some(eq) = find_unescaped(&token, '=') else {
            return Err(malformed(
                input,
                &format!("attribute {} has no value", token.trim()),
            ));
        };
        let key = token[..eq].trim();
        let attr = AttributeType::from_name(key)
            .ok_or_else(|| malformed(input, &format!("unknown attribute type {key:?}")))?;
        let value = unescape(&token[eq + 1..], input)?;
        if value.is_empty() {
            return Err(malformed(input, &format!("attribute {key} has no value")));
        }
        attributes.push((attr, value));
    }
    DistinguishedName::new(attributes).map_err(|_| malformed(input, "empty name"))
}

/// Renders a name in the comma form accepted by [`parse`].
pub fn render(name: &DistinguishedName) -> String {
    name.attributes
        .iter()
        .map(|(attr, value)| format!("{}={}", attr.short_name(), escape(value)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Returns the first CN value of `name`, or an empty string.
pub fn common_name(name: &DistinguishedName) -> String {
    name.common_name().to_string()
}

fn split_unescaped(body: &str, separator: char, input: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            current.push(c);
            let next = chars
                .next()
                .ok_or_else(|| malformed(input, "dangling escape"))?;
            current.push(next);
        } else if c == separator {
            tokens.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    tokens.push(current);

    if tokens.iter().any(|token| token.trim().is_empty()) {
        return Err(malformed(input, "empty name component"));
    }
    Ok(tokens)
}

fn find_unescaped(token: &str, needle: char) -> Option<usize> {
    let mut escaped = false;
    for (idx, c) in token.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            c if c == needle => return Some(idx),
            _ => {}
        }
    }
    None
}

fn unescape(raw: &str, input: &str) -> Result<String> {
    let mut out = String::new();
    // Unescaped trailing whitespace is dropped; escaped characters always stay.
    let mut keep = 0;
    let mut chars = raw.trim_start().chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            let next = chars
                .next()
                .ok_or_else(|| malformed(input, "dangling escape"))?;
            out.push(next);
            keep = out.len();
        } else {
            out.push(c);
            if !c.is_whitespace() {
                keep = out.len();
            }
        }
    }
    out.truncate(keep);
    Ok(out)
}

fn escape(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut out = String::with_capacity(value.len());
    for (idx, c) in value.chars().enumerate() {
        let special = matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '/')
            || (idx == 0 && (c == '#' || c.is_whitespace()))
            || (idx == last && c.is_whitespace());
        if special {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(self))
    }
}

impl FromStr for DistinguishedName {
    type Err = PkiError;

    fn from_str(s: &str) -> Result<Self> {
        parse(s)
    }
}

impl PartialEq<str> for DistinguishedName {
    fn eq(&self, other: &str) -> bool {
        parse(other).is_ok_and(|other| *self == other)
    }
}

impl PartialEq<&str> for DistinguishedName {
    fn eq(&self, other: &&str) -> bool {
        *self == **other
    }
}

/// Anything that names a subject: certificates, requests, bare names.
pub trait HasSubject {
    fn subject_name(&self) -> Result<DistinguishedName>;
}

/// Anything signed by an issuer: certificates and CRLs.
pub trait HasIssuer {
    fn issuer_name(&self) -> Result<DistinguishedName>;
}

impl HasSubject for DistinguishedName {
    fn subject_name(&self) -> Result<DistinguishedName> {
        Ok(self.clone())
    }
}

/// True if `item`'s subject is `name`.
pub fn has_subject(item: &impl HasSubject, name: &DistinguishedName) -> bool {
    item.subject_name().is_ok_and(|subject| subject == *name)
}

/// True if `item` names `issuer`'s subject as its issuer.
pub fn issued_by(item: &impl HasIssuer, issuer: &impl HasSubject) -> bool {
    match (item.issuer_name(), issuer.subject_name()) {
        (Ok(issuer_name), Ok(subject)) => issuer_name == subject,
        _ => false,
    }
}
