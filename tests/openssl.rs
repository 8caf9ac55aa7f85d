mod util;

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::PKey;
use openssl::x509::extension::{
    BasicConstraints as OpensslBasicConstraints, SubjectAlternativeName,
    SubjectKeyIdentifier as OpensslSubjectKeyIdentifier,
};
use openssl::x509::{X509, X509Builder, X509Crl, X509NameBuilder, X509Req};
use pkikit::cert::Certificate;
use pkikit::cert::extensions::{BasicConstraints, SubjectAltName};
use pkikit::key::KeyPair;
use pkikit::key_id::{self, KeyIdMethod};
use pkikit::name::DistinguishedName;
use pkikit::request::CertificateRequest;
use regex::Regex;
use rsa::BigUint;
use std::fs;
use std::process::Command;

#[test]
fn test_openssl_validate_cert() {
    let ca_cert_with_key = util::generate_ca_cert();
    let server_cert = util::generate_server_cert(&ca_cert_with_key, 1);
    let server_cert_pem = server_cert.to_pem().unwrap();

    // Save the certificate to a temporary file
    let cert_path = std::env::temp_dir().join("pkikit_test_server_cert.pem");
    fs::write(&cert_path, server_cert_pem).expect("Failed to write server certificate");

    // Use OpenSSL CLI to print the generated certificate
    let output = Command::new("openssl")
        .arg("x509")
        .arg("-in")
        .arg(&cert_path)
        .arg("-noout")
        .arg("-text")
        .output()
        .expect("Failed to execute OpenSSL command");

    assert!(
        output.status.success(),
        "OpenSSL command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let output_text = String::from_utf8_lossy(&output.stdout);

    assert!(
        Regex::new(r"Issuer: .*CN\s?=\s?myca\.local")
            .unwrap()
            .is_match(&output_text),
        "Issuer field is incorrect"
    );
    assert!(
        output_text.contains("Version: 3 (0x2)"),
        "Version field is incorrect"
    );
    assert!(
        output_text.contains("Serial Number: 1 (0x1)"),
        "Serial Number field is incorrect"
    );
    assert!(
        Regex::new(r"Not Before: .+").unwrap().is_match(&output_text),
        "Missing or incorrect Not Before field"
    );
    assert!(
        output_text.contains("X509v3 Subject Key Identifier"),
        "Missing Subject Key Identifier"
    );
    assert!(
        output_text.contains("TLS Web Server Authentication"),
        "Missing Extended Key Usage"
    );

    fs::remove_file(cert_path).expect("Failed to remove test certificate");
}

#[test]
fn test_openssl_crate_validate_cert() {
    let ca_cert_with_key = util::generate_ca_cert();
    let server_cert = util::generate_server_cert(&ca_cert_with_key, 1);
    let x509 = X509::from_pem(server_cert.to_pem().unwrap().as_bytes()).expect("Failed to parse PEM");

    let subject = x509
        .subject_name()
        .entries_by_nid(Nid::COMMONNAME)
        .next()
        .unwrap()
        .data()
        .as_utf8()
        .unwrap();
    assert_eq!(subject.to_string(), "server.myca.local", "Subject CN mismatch");

    let issuer = x509
        .issuer_name()
        .entries_by_nid(Nid::COMMONNAME)
        .next()
        .unwrap()
        .data()
        .as_utf8()
        .unwrap();
    assert_eq!(issuer.to_string(), "myca.local", "Issuer CN mismatch");

    assert_eq!(x509.version(), 2, "X509 version should be 3 (0-based index)");

    let serial = x509.serial_number().to_bn().unwrap().to_dec_str().unwrap();
    assert_eq!(serial.to_string(), "1", "Serial number should be 1");

    assert_eq!(
        x509.signature_algorithm().object().nid(),
        Nid::ECDSA_WITH_SHA256,
        "Signature algorithm should be ecdsa-with-SHA256"
    );

    // Signature and key identifiers agree with OpenSSL's view
    let ca_x509 = X509::from_der(&ca_cert_with_key.cert.to_der().unwrap()).unwrap();
    assert!(x509.verify(&ca_x509.public_key().unwrap()).unwrap());
    assert_eq!(
        x509.authority_key_id().unwrap().as_slice(),
        ca_x509.subject_key_id().unwrap().as_slice()
    );
}

#[test]
fn test_openssl_verifies_every_key_type() {
    let keys = [
        KeyPair::generate_ecdsa_p256(),
        KeyPair::generate_ecdsa_p384(),
        KeyPair::generate_ecdsa_p521(),
        KeyPair::generate_ed25519(),
        KeyPair::generate_rsa(2048).unwrap(),
    ];
    for key in keys {
        let info = pkikit::cert::params::CertificationRequestInfo::builder()
            .subject(DistinguishedName::from_common_name(key.algorithm_name()).unwrap())
            .subject_public_key(key.public_key())
            .build();
        let cert = Certificate::new_self_signed(&info, &key).unwrap();
        let x509 = X509::from_der(&cert.to_der().unwrap()).unwrap();
        assert!(
            x509.verify(&x509.public_key().unwrap()).unwrap(),
            "{} signature rejected",
            key.algorithm_name()
        );
    }
}

#[test]
fn test_openssl_verifies_csr() {
    let key = KeyPair::generate_ecdsa_p256();
    let request = CertificateRequest::new(
        &key,
        &"CN=node1.myca.local,O=Example".parse().unwrap(),
        vec![],
    )
    .unwrap();
    let req = X509Req::from_pem(request.to_pem().unwrap().as_bytes()).unwrap();
    assert!(req.verify(&req.public_key().unwrap()).unwrap());
    let cn = req
        .subject_name()
        .entries_by_nid(Nid::COMMONNAME)
        .next()
        .unwrap()
        .data()
        .as_utf8()
        .unwrap();
    assert_eq!(cn.to_string(), "node1.myca.local");
}

#[test]
fn test_openssl_verifies_crl() {
    let ca = util::generate_ca_cert();
    let crl = util::generate_crl(&ca)
        .revoke_multiple(
            &ca.key,
            &ca.key.public_key(),
            &[BigUint::from(17u32), BigUint::from(0xdead_beefu32)],
        )
        .unwrap();

    let x509_crl = X509Crl::from_pem(crl.to_pem().unwrap().as_bytes()).unwrap();
    let ca_x509 = X509::from_der(&ca.cert.to_der().unwrap()).unwrap();
    assert!(x509_crl.verify(&ca_x509.public_key().unwrap()).unwrap());
    assert!(x509_crl.next_update().is_some());

    let mut serials: Vec<String> = x509_crl
        .get_revoked()
        .unwrap()
        .iter()
        .map(|revoked| {
            revoked
                .serial_number()
                .to_bn()
                .unwrap()
                .to_dec_str()
                .unwrap()
                .to_string()
        })
        .collect();
    serials.sort();
    assert_eq!(serials, vec!["17".to_string(), "3735928559".to_string()]);
}

/// Certificates built by OpenSSL decode through the extension registry.
#[test]
fn test_read_openssl_certificate() {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let pkey = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("O", "Example").unwrap();
    name.append_entry_by_text("CN", "openssl ca").unwrap();
    let name = name.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(42).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&pkey).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(30).unwrap())
        .unwrap();
    builder
        .append_extension(
            OpensslBasicConstraints::new()
                .critical()
                .ca()
                .pathlen(1)
                .build()
                .unwrap(),
        )
        .unwrap();
    let san = SubjectAlternativeName::new()
        .dns("ca.example.com")
        .ip("10.0.0.1")
        .build(&builder.x509v3_context(None, None))
        .unwrap();
    builder.append_extension(san).unwrap();
    let ski = OpensslSubjectKeyIdentifier::new()
        .build(&builder.x509v3_context(None, None))
        .unwrap();
    builder.append_extension(ski).unwrap();
    builder.sign(&pkey, MessageDigest::sha256()).unwrap();
    let x509 = builder.build();

    let cert = Certificate::from_der(&x509.to_der().unwrap()).unwrap();
    assert_eq!(cert.subject().unwrap(), "CN=openssl ca,O=Example");
    assert_eq!(cert.serial_number(), BigUint::from(42u32));
    assert_eq!(
        cert.find_extension::<BasicConstraints>().unwrap(),
        Some(BasicConstraints {
            is_ca: true,
            max_path_length: Some(1)
        })
    );
    let san = cert.find_extension::<SubjectAltName>().unwrap().unwrap();
    assert_eq!(san.0.dns_names, vec!["ca.example.com".to_string()]);
    assert_eq!(san.0.ip_addresses, vec!["10.0.0.1".parse::<std::net::IpAddr>().unwrap()]);

    // OpenSSL's hash method is the Type-1 identifier.
    let public_key = cert.public_key().unwrap();
    assert_eq!(
        cert.key_identifier().unwrap(),
        key_id::key_identifier(&public_key, KeyIdMethod::Type1).unwrap()
    );
    assert!(cert.verify_signature(&public_key).unwrap());
}
