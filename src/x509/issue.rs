// qwac-rs: PSD2 qualified certificates and HTTP message signing
// Copyright 2026 Dark Bio AG. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use super::cert::{Certificate, encode_signature_algorithm};
use super::ext::Extension;
use super::name::DistinguishedName;
use super::{Error, Result};
use crate::der::Encoder;
use crate::keys::{SignatureAlgorithm, SigningKey, VerifyingKey};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Everything that goes into a TBSCertificate.
pub struct CertificateParams<'a> {
    /// Serial number magnitude, 1 to 20 bytes, positive.
    pub serial: &'a [u8],
    /// Signature algorithm the issuer will sign with.
    pub algorithm: SignatureAlgorithm,
    /// Issuer distinguished name.
    pub issuer: &'a DistinguishedName,
    /// Subject distinguished name.
    pub subject: &'a DistinguishedName,
    /// Validity start.
    pub not_before: DateTime<Utc>,
    /// Validity end.
    pub not_after: DateTime<Utc>,
    /// Subject public key.
    pub subject_key: &'a VerifyingKey,
    /// Extensions in their final order.
    pub extensions: &'a [Extension],
}

/// Validates the template invariants, assembles the TBSCertificate, signs
/// it with the issuer key and returns the parsed certificate.
pub fn sign_certificate(
    params: &CertificateParams<'_>,
    issuer_key: &SigningKey,
) -> Result<Certificate> {
    if params.subject.is_empty() {
        return Err(Error::EmptySubjectDn);
    }
    if params.issuer.is_empty() {
        return Err(Error::EmptyIssuerDn);
    }
    if params.not_before >= params.not_after {
        return Err(Error::InvalidValidityWindow);
    }
    let magnitude: &[u8] = {
        let skip = params.serial.iter().take_while(|&&b| b == 0).count();
        &params.serial[skip..]
    };
    if magnitude.is_empty() {
        return Err(Error::EmptySerial);
    }
    if magnitude.len() > 20 {
        return Err(Error::SerialTooLong);
    }

    let mut seen = HashSet::new();
    for extension in params.extensions {
        if !seen.insert(extension.oid) {
            return Err(Error::DuplicateExtension {
                oid: extension.oid.to_string(),
            });
        }
    }

    let issuer_der = {
        let mut enc = Encoder::new();
        params.issuer.encode(&mut enc)?;
        enc.finish()
    };
    let subject_der = {
        let mut enc = Encoder::new();
        params.subject.encode(&mut enc)?;
        enc.finish()
    };

    // Assemble the certificate content.
    let mut tbs = Encoder::new();
    tbs.sequence(|seq| {
        seq.explicit(0, |version| version.uint(2));
        seq.unsigned_integer(params.serial);
        encode_signature_algorithm(seq, params.algorithm);
        seq.raw(&issuer_der);
        seq.sequence(|validity| {
            validity.time(params.not_before);
            validity.time(params.not_after);
        });
        seq.raw(&subject_der);
        seq.raw(&params.subject_key.to_spki_der());
        if !params.extensions.is_empty() {
            seq.explicit(3, |wrapper| {
                wrapper.sequence(|list| {
                    for extension in params.extensions {
                        extension.encode(list);
                    }
                });
            });
        }
    });
    let tbs_der = tbs.finish();

    // Sign the canonical DER encoding of TBSCertificate and wrap it with
    // the algorithm identifier into the outer Certificate.
    let signature = issuer_key.sign(params.algorithm, &tbs_der)?;
    let mut outer = Encoder::new();
    outer.sequence(|seq| {
        seq.raw(&tbs_der);
        encode_signature_algorithm(seq, params.algorithm);
        seq.bit_string(0, &signature);
    });

    Certificate::from_der(&outer.finish())
}

/// Generates a 20-byte random serial with the top bit cleared so the DER
/// INTEGER stays positive without sign padding.
pub fn random_serial() -> Result<[u8; 20]> {
    let mut serial = [0u8; 20];
    getrandom::fill(&mut serial).map_err(|e| Error::SerialGenerationFailed {
        details: e.to_string(),
    })?;
    serial[0] &= 0x7f;
    Ok(serial)
}

#[cfg(test)]
mod tests {
    use super::super::ext;
    use super::*;
    use chrono::TimeZone;

    fn keypair() -> (SigningKey, VerifyingKey) {
        let key = SigningKey::generate(2048).unwrap();
        let public = key.public_key();
        (key, public)
    }

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    // Tests that an issued certificate round-trips through the strict
    // parser bit-for-bit and carries the template fields.
    #[test]
    fn test_issue_and_reparse() {
        let (issuer_key, _) = keypair();
        let (_, subject_public) = keypair();
        let (not_before, not_after) = window();

        let serial = random_serial().unwrap();
        let subject = DistinguishedName::new()
            .country("GR")
            .organization("Payments Hellas")
            .common_name("api.payments.example");
        let issuer = DistinguishedName::new().common_name("Issuing CA");
        let extensions = vec![
            ext::basic_constraints(false, None),
            ext::key_usage(ext::KeyUsage::DIGITAL_SIGNATURE | ext::KeyUsage::NON_REPUDIATION),
            ext::subject_key_identifier(&subject_public.key_identifier()),
        ];

        let cert = sign_certificate(
            &CertificateParams {
                serial: &serial,
                algorithm: SignatureAlgorithm::Rs256,
                issuer: &issuer,
                subject: &subject,
                not_before,
                not_after,
                subject_key: &subject_public,
                extensions: &extensions,
            },
            &issuer_key,
        )
        .unwrap();

        let reparsed = Certificate::from_der(cert.to_der()).unwrap();
        assert_eq!(reparsed.to_der(), cert.to_der());
        assert_eq!(reparsed.subject, subject);
        assert_eq!(reparsed.issuer, issuer);
        assert_eq!(reparsed.not_before, not_before);
        assert_eq!(reparsed.not_after, not_after);
        assert_eq!(reparsed.extensions.len(), 3);
        assert!(!reparsed.is_ca().unwrap());

        // The signature must check out against the issuer and fail against
        // the subject.
        cert.verify_signature(&issuer_key.public_key()).unwrap();
        assert!(cert.verify_signature(&subject_public).is_err());
    }

    // Tests that the subject public key and its identifier survive the
    // certificate encoding.
    #[test]
    fn test_issued_key_binding() {
        let (issuer_key, _) = keypair();
        let (_, subject_public) = keypair();
        let (not_before, not_after) = window();
        let serial = random_serial().unwrap();

        let cert = sign_certificate(
            &CertificateParams {
                serial: &serial,
                algorithm: SignatureAlgorithm::Rs256,
                issuer: &DistinguishedName::new().common_name("Issuing CA"),
                subject: &DistinguishedName::new().common_name("subject"),
                not_before,
                not_after,
                subject_key: &subject_public,
                extensions: &[ext::subject_key_identifier(
                    &subject_public.key_identifier(),
                )],
            },
            &issuer_key,
        )
        .unwrap();

        assert_eq!(cert.public_key().unwrap(), subject_public);
        assert_eq!(
            cert.computed_key_identifier(),
            subject_public.key_identifier()
        );
        assert_eq!(
            cert.subject_key_identifier().unwrap().unwrap(),
            subject_public.key_identifier()
        );
    }

    // Tests the template validation: empty DNs, inverted windows and
    // duplicate extensions are rejected.
    #[test]
    fn test_issue_validation() {
        let (issuer_key, _) = keypair();
        let (_, subject_public) = keypair();
        let (not_before, not_after) = window();
        let serial = random_serial().unwrap();
        let subject = DistinguishedName::new().common_name("subject");
        let issuer = DistinguishedName::new().common_name("issuer");

        let build = |subject: &DistinguishedName,
                     issuer: &DistinguishedName,
                     not_before: DateTime<Utc>,
                     not_after: DateTime<Utc>,
                     extensions: &[Extension]| {
            sign_certificate(
                &CertificateParams {
                    serial: &serial,
                    algorithm: SignatureAlgorithm::Rs256,
                    issuer,
                    subject,
                    not_before,
                    not_after,
                    subject_key: &subject_public,
                    extensions,
                },
                &issuer_key,
            )
        };

        assert!(matches!(
            build(&DistinguishedName::new(), &issuer, not_before, not_after, &[]),
            Err(Error::EmptySubjectDn)
        ));
        assert!(matches!(
            build(&subject, &DistinguishedName::new(), not_before, not_after, &[]),
            Err(Error::EmptyIssuerDn)
        ));
        assert!(matches!(
            build(&subject, &issuer, not_after, not_before, &[]),
            Err(Error::InvalidValidityWindow)
        ));
        assert!(matches!(
            build(&subject, &issuer, not_before, not_before, &[]),
            Err(Error::InvalidValidityWindow)
        ));

        let duplicated = vec![
            ext::basic_constraints(false, None),
            ext::basic_constraints(true, None),
        ];
        assert!(matches!(
            build(&subject, &issuer, not_before, not_after, &duplicated),
            Err(Error::DuplicateExtension { .. })
        ));
    }

    // Tests the serial generator invariants: length, positivity and (with
    // overwhelming probability) uniqueness.
    #[test]
    fn test_random_serial() {
        let one = random_serial().unwrap();
        let two = random_serial().unwrap();
        assert_eq!(one.len(), 20);
        assert_eq!(one[0] & 0x80, 0);
        assert_eq!(two[0] & 0x80, 0);
        assert_ne!(one, two);
    }

    // Tests issuing under RSASSA-PSS, exercising the parameterized
    // AlgorithmIdentifier paths.
    #[test]
    fn test_issue_with_pss() {
        let (issuer_key, issuer_public) = keypair();
        let (_, subject_public) = keypair();
        let (not_before, not_after) = window();
        let serial = random_serial().unwrap();

        let cert = sign_certificate(
            &CertificateParams {
                serial: &serial,
                algorithm: SignatureAlgorithm::Ps256,
                issuer: &DistinguishedName::new().common_name("issuer"),
                subject: &DistinguishedName::new().common_name("subject"),
                not_before,
                not_after,
                subject_key: &subject_public,
                extensions: &[],
            },
            &issuer_key,
        )
        .unwrap();

        assert_eq!(cert.signature_algorithm, SignatureAlgorithm::Ps256);
        cert.verify_signature(&issuer_public).unwrap();
    }
}
