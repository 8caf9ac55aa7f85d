//! Well-known object identifiers used by the extension registry.
//!
//! Standard X.509 OIDs come from the `const-oid` database; the vendor arc
//! `1.3.6.1.4.1.34380.1.1` carries node-identity extensions.

use std::sync::LazyLock;

use const_oid::ObjectIdentifier;
use regex::Regex;

pub const BASIC_CONSTRAINTS: ObjectIdentifier = const_oid::db::rfc5280::ID_CE_BASIC_CONSTRAINTS;
pub const KEY_USAGE: ObjectIdentifier = const_oid::db::rfc5280::ID_CE_KEY_USAGE;
pub const EXTENDED_KEY_USAGE: ObjectIdentifier = const_oid::db::rfc5280::ID_CE_EXT_KEY_USAGE;
pub const SUBJECT_ALT_NAME: ObjectIdentifier = const_oid::db::rfc5280::ID_CE_SUBJECT_ALT_NAME;
pub const ISSUER_ALT_NAME: ObjectIdentifier = const_oid::db::rfc5280::ID_CE_ISSUER_ALT_NAME;
pub const SUBJECT_KEY_IDENTIFIER: ObjectIdentifier =
    const_oid::db::rfc5280::ID_CE_SUBJECT_KEY_IDENTIFIER;
pub const AUTHORITY_KEY_IDENTIFIER: ObjectIdentifier =
    const_oid::db::rfc5280::ID_CE_AUTHORITY_KEY_IDENTIFIER;
pub const CRL_NUMBER: ObjectIdentifier = const_oid::db::rfc5280::ID_CE_CRL_NUMBER;
pub const NETSCAPE_COMMENT: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.16.840.1.113730.1.13");

/// Base arc for node-identity extensions.
pub const NODE_IDENTITY_ARC: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.34380.1.1");
pub const NODE_UID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.34380.1.1.1");
pub const NODE_INSTANCE_ID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.34380.1.1.2");
pub const NODE_IMAGE_NAME: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.34380.1.1.3");
pub const NODE_PRESHARED_KEY: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.34380.1.1.4");

static DOTTED_OID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+(\.[0-9]+)*$").expect("static OID pattern"));

fn arcs(oid: &str) -> Option<Vec<u64>> {
    if !DOTTED_OID.is_match(oid) {
        return None;
    }
    oid.split('.').map(|arc| arc.parse().ok()).collect()
}

/// Returns true if `child` lies strictly below `parent` in the OID tree.
///
/// Comparison is per arc, so `1.2.3` is not a parent of `1.2.34`, and an OID
/// is never a subtree of itself. Malformed input yields `false`.
pub fn is_subtree_of(parent: &str, child: &str) -> bool {
    match (arcs(parent), arcs(child)) {
        (Some(parent), Some(child)) => child.len() > parent.len() && child.starts_with(&parent),
        _ => false,
    }
}
