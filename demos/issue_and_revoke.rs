use pkikit::cert::extensions::{AltNames, ExtendedKeyUsageOption, NodeUid, SubjectAltName};
use pkikit::cert::params::{CertificationRequestInfo, ExtensionParam, Validity};
use pkikit::cert::{Certificate, CertificateWithPrivateKey, random_serial};
use pkikit::crl::{CertificateRevocationList, CrlOptions};
use pkikit::error::PkiError;
use pkikit::issuer::Issuer;
use pkikit::key::KeyPair;
use pkikit::name::DistinguishedName;
use pkikit::request::CertificateRequest;
use pkikit::validator::ChainValidator;
use time::{Duration, OffsetDateTime};

fn main() -> Result<(), PkiError> {
    // Root CA (self-signed)
    let ca_key = KeyPair::generate_ecdsa_p256();
    let ca_info = CertificationRequestInfo::builder()
        .subject("CN=My Test CA,O=Example".parse()?)
        .subject_public_key(ca_key.public_key())
        .is_ca(true)
        .build();
    let ca = CertificateWithPrivateKey {
        cert: Certificate::new_self_signed(&ca_info, &ca_key)?,
        key: ca_key,
    };
    println!("CA Certificate PEM:\n{}", ca.cert.to_pem()?);

    // A node asks for a certificate
    let node_key = KeyPair::generate_ed25519();
    let node_name = DistinguishedName::from_common_name("myserver.local")?;
    let request = CertificateRequest::new(
        &node_key,
        &node_name,
        vec![
            ExtensionParam::from_extension(
                &SubjectAltName(AltNames {
                    dns_names: vec!["myserver.local".to_string()],
                    ..Default::default()
                }),
                false,
            )?,
            ExtensionParam::from_extension(&NodeUid("node-0001".to_string()), false)?,
        ],
    )?;
    println!("Server CSR PEM:\n{}", request.to_pem()?);

    let mut info = request.to_cert_info()?;
    info.usages = vec![ExtendedKeyUsageOption::ServerAuth];
    let server = ca.issue(&info, Validity::for_days(825), random_serial())?;
    println!("Server Certificate PEM:\n{}", server.to_pem()?);

    // Empty CRL, then revoke the server certificate
    let now = OffsetDateTime::now_utc();
    let crl = CertificateRevocationList::new(
        &ca.cert.subject()?,
        &ca.key,
        &ca.key.public_key(),
        now,
        now + Duration::days(7),
        CrlOptions::default(),
    )?;
    let chain = [server.clone(), ca.cert.clone()];
    ChainValidator::default().validate_chain(&chain, std::slice::from_ref(&crl))?;
    println!("Chain is valid against CRL #{}", crl.crl_number()?);

    let crl = crl.revoke(&ca.key, &ca.key.public_key(), &server.serial_number())?;
    println!("CRL PEM:\n{}", crl.to_pem()?);
    match ChainValidator::default().validate_chain(&chain, &[crl]) {
        Ok(()) => println!("Chain unexpectedly still valid"),
        Err(err) => println!("Chain rejected: {err}"),
    }
    Ok(())
}
