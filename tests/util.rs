#![allow(dead_code)]

use pkikit::cert::extensions::ExtendedKeyUsageOption;
use pkikit::cert::params::{CertificationRequestInfo, Validity};
use pkikit::cert::{Certificate, CertificateWithPrivateKey};
use pkikit::crl::{CertificateRevocationList, CrlOptions};
use pkikit::issuer::Issuer;
use pkikit::key::KeyPair;
use pkikit::name::DistinguishedName;
use rsa::BigUint;
use time::{Duration, OffsetDateTime};

pub fn generate_ca_cert() -> CertificateWithPrivateKey {
    let ca_key = KeyPair::generate_ecdsa_p256();

    let subject_dn: DistinguishedName = "CN=myca.local,O=Example".parse().unwrap();

    let ca_cert_info = CertificationRequestInfo::builder()
        .subject(subject_dn)
        .subject_public_key(ca_key.public_key())
        .is_ca(true)
        .build();

    CertificateWithPrivateKey {
        cert: Certificate::new_self_signed(&ca_cert_info, &ca_key).unwrap(),
        key: ca_key,
    }
}

pub fn generate_intermediate(ca: &CertificateWithPrivateKey) -> CertificateWithPrivateKey {
    let key = KeyPair::generate_ecdsa_p384();
    let info = CertificationRequestInfo::builder()
        .subject("CN=intermediate.myca.local,O=Example".parse().unwrap())
        .subject_public_key(key.public_key())
        .is_ca(true)
        .max_path_length(0)
        .build();
    CertificateWithPrivateKey {
        cert: ca
            .issue(&info, Validity::for_days(365), BigUint::from(2u32))
            .unwrap(),
        key,
    }
}

pub fn generate_server_cert(issuer: &CertificateWithPrivateKey, serial: u32) -> Certificate {
    let server_key = KeyPair::generate_ecdsa_p256();
    let info = CertificationRequestInfo::builder()
        .subject(DistinguishedName::from_common_name("server.myca.local").unwrap())
        .subject_public_key(server_key.public_key())
        .usages(vec![ExtendedKeyUsageOption::ServerAuth])
        .build();
    issuer
        .issue(&info, Validity::for_days(90), BigUint::from(serial))
        .unwrap()
}

pub fn generate_crl(issuer: &CertificateWithPrivateKey) -> CertificateRevocationList {
    let now = OffsetDateTime::now_utc();
    CertificateRevocationList::new(
        &issuer.cert.subject().unwrap(),
        &issuer.key,
        &issuer.key.public_key(),
        now - Duration::minutes(5),
        now + Duration::days(7),
        CrlOptions::default(),
    )
    .unwrap()
}
