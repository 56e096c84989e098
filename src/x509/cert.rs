// qwac-rs: PSD2 qualified certificates and HTTP message signing
// Copyright 2026 Dark Bio AG. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use super::ext::{self, Extension, KeyUsage, QcStatements};
use super::name::DistinguishedName;
use super::{Error, Result, oid};
use crate::der::{self, Decoder, Encoder};
use crate::keys::{SignatureAlgorithm, VerifyingKey};
use crate::pem;
use chrono::{DateTime, Utc};
use sha1::{Digest, Sha1};
use std::collections::HashSet;

/// A parsed X.509 v3 certificate.
///
/// Only the profile this crate issues is accepted: v3, one of the six RSA
/// signature algorithms, no issuer/subject unique ids and strict DER
/// throughout. The original encoding is retained so `to_der` always returns
/// the exact bytes that were parsed or signed.
#[derive(Clone, Debug)]
pub struct Certificate {
    der: Vec<u8>,
    tbs_der: Vec<u8>,
    /// Serial number magnitude, without sign padding.
    pub serial: Vec<u8>,
    /// Signature algorithm of the certificate.
    pub signature_algorithm: SignatureAlgorithm,
    /// Issuer distinguished name.
    pub issuer: DistinguishedName,
    /// Subject distinguished name.
    pub subject: DistinguishedName,
    /// Validity start.
    pub not_before: DateTime<Utc>,
    /// Validity end.
    pub not_after: DateTime<Utc>,
    spki_der: Vec<u8>,
    public_key_bits: Vec<u8>,
    /// Certificate extensions in encoded order.
    pub extensions: Vec<Extension>,
    signature: Vec<u8>,
}

impl Certificate {
    /// Parses a certificate from strict DER.
    pub fn from_der(der_bytes: &[u8]) -> Result<Self> {
        let mut alg_error: Option<Error> = None;
        let mut dec = Decoder::new(der_bytes);
        let parsed = dec.sequence(|outer| {
            let tbs_der = outer.tlv()?.to_vec();
            let algorithm = match decode_signature_algorithm(outer) {
                Ok(algorithm) => algorithm,
                Err(Error::Der(inner)) => return Err(inner),
                Err(other) => {
                    alg_error = Some(other);
                    return Err(outer.error(der::ErrorKind::UnexpectedTag));
                }
            };
            let (unused, bits) = outer.bit_string()?;
            if unused != 0 {
                return Err(outer.error(der::ErrorKind::NonCanonical));
            }
            Ok((tbs_der, algorithm, bits.to_vec()))
        });
        if let Some(e) = alg_error {
            return Err(e);
        }
        let (tbs_der, signature_algorithm, signature) = parsed?;
        dec.finish().map_err(Error::from)?;

        let mut cert = parse_tbs(&tbs_der)?;
        if cert.signature_algorithm != signature_algorithm {
            return Err(Error::SignatureAlgorithmMismatch);
        }
        cert.der = der_bytes.to_vec();
        cert.signature = signature;
        Ok(cert)
    }

    /// Parses a certificate from a `CERTIFICATE` PEM block.
    pub fn from_pem(pem_str: &str) -> Result<Self> {
        let der_bytes = pem::decode_labeled(pem_str.as_bytes(), pem::CERTIFICATE)?;
        Self::from_der(&der_bytes)
    }

    /// The exact DER encoding of the certificate.
    pub fn to_der(&self) -> &[u8] {
        &self.der
    }

    /// The PEM encoding of the certificate.
    pub fn to_pem(&self) -> String {
        pem::encode(pem::CERTIFICATE, &self.der)
    }

    /// The raw TBSCertificate bytes the signature covers.
    pub fn tbs_der(&self) -> &[u8] {
        &self.tbs_der
    }

    /// The SubjectPublicKeyInfo encoding.
    pub fn spki_der(&self) -> &[u8] {
        &self.spki_der
    }

    /// The subject public key as a verifying key.
    pub fn public_key(&self) -> Result<VerifyingKey> {
        Ok(VerifyingKey::from_spki_der(&self.spki_der)?)
    }

    /// SHA-1 over the subjectPublicKey bits: the canonical key identifier
    /// this PKI threads through SKI, AKI and the certificate store.
    pub fn computed_key_identifier(&self) -> [u8; 20] {
        Sha1::digest(&self.public_key_bits).into()
    }

    /// SHA-1 over the full certificate encoding.
    pub fn thumbprint(&self) -> [u8; 20] {
        Sha1::digest(&self.der).into()
    }

    /// Looks up an extension by OID.
    pub fn extension(&self, oid: &const_oid::ObjectIdentifier) -> Option<&Extension> {
        self.extensions.iter().find(|ext| ext.oid == *oid)
    }

    /// The subjectKeyIdentifier payload, when present.
    pub fn subject_key_identifier(&self) -> Result<Option<Vec<u8>>> {
        self.extension(&oid::SUBJECT_KEY_IDENTIFIER)
            .map(|ext| ext::parse_subject_key_identifier(&ext.value))
            .transpose()
    }

    /// The authorityKeyIdentifier payload, when present.
    pub fn authority_key_identifier(&self) -> Result<Option<Vec<u8>>> {
        self.extension(&oid::AUTHORITY_KEY_IDENTIFIER)
            .map(|ext| ext::parse_authority_key_identifier(&ext.value))
            .transpose()
    }

    /// The basicConstraints payload as (cA, pathLen), when present.
    pub fn basic_constraints(&self) -> Result<Option<(bool, Option<u64>)>> {
        self.extension(&oid::BASIC_CONSTRAINTS)
            .map(|ext| ext::parse_basic_constraints(&ext.value))
            .transpose()
    }

    /// The keyUsage payload, when present.
    pub fn key_usage(&self) -> Result<Option<KeyUsage>> {
        self.extension(&oid::KEY_USAGE)
            .map(|ext| ext::parse_key_usage(&ext.value))
            .transpose()
    }

    /// The decoded qcStatements extension, when present.
    pub fn qc_statements(&self) -> Result<Option<QcStatements>> {
        self.extension(&oid::QC_STATEMENTS)
            .map(QcStatements::from_extension)
            .transpose()
    }

    /// The CRL distribution point URIs, when present.
    pub fn crl_distribution_uris(&self) -> Result<Vec<String>> {
        match self.extension(&oid::CRL_DISTRIBUTION_POINTS) {
            Some(ext) => ext::parse_crl_distribution_points(&ext.value),
            None => Ok(Vec::new()),
        }
    }

    /// Whether basicConstraints marks the certificate as a CA.
    pub fn is_ca(&self) -> Result<bool> {
        Ok(self.basic_constraints()?.map(|(ca, _)| ca).unwrap_or(false))
    }

    /// Whether the certificate is within its validity window at `at`.
    pub fn valid_at(&self, at: DateTime<Utc>) -> bool {
        self.not_before <= at && at <= self.not_after
    }

    /// Verifies the certificate signature against the issuer's public key.
    pub fn verify_signature(&self, issuer_key: &VerifyingKey) -> Result<()> {
        Ok(issuer_key.verify(self.signature_algorithm, &self.tbs_der, &self.signature)?)
    }
}

fn parse_tbs(tbs_der: &[u8]) -> Result<Certificate> {
    let mut dec = Decoder::new(tbs_der);
    let mut version_ok = false;
    let mut unique_ids = false;
    let mut alg_error: Option<Error> = None;
    let result = dec.sequence(|tbs| {
        let version = tbs.explicit(0, |v| v.uint())?;
        version_ok = version == 2;

        let serial_raw = tbs.integer_bytes()?;
        let algorithm = match decode_signature_algorithm(tbs) {
            Ok(algorithm) => algorithm,
            Err(Error::Der(inner)) => return Err(inner),
            Err(other) => {
                alg_error = Some(other);
                return Err(tbs.error(der::ErrorKind::UnexpectedTag));
            }
        };
        let issuer = DistinguishedName::decode(tbs)?;
        let (not_before, not_after) =
            tbs.sequence(|validity| Ok((validity.time()?, validity.time()?)))?;
        let subject = DistinguishedName::decode(tbs)?;

        let spki_der = tbs.tlv()?.to_vec();
        let mut spki_dec = Decoder::new(&spki_der);
        let public_key_bits = spki_dec.sequence(|spki| {
            let _algorithm = spki.tlv()?;
            let (unused, bits) = spki.bit_string()?;
            if unused != 0 {
                return Err(spki.error(der::ErrorKind::NonCanonical));
            }
            Ok(bits.to_vec())
        })?;

        // [1] and [2] are the deprecated unique identifiers.
        if matches!(tbs.peek_tag_opt(),
            Some(t) if t & 0xc0 == 0x80 && matches!(t & 0x1f, 1 | 2))
        {
            unique_ids = true;
            return Err(tbs.error(der::ErrorKind::UnexpectedTag));
        }

        let extensions = tbs
            .optional_explicit(3, |wrapper| {
                wrapper.sequence(|list| {
                    let mut extensions = Vec::new();
                    while !list.is_empty() {
                        extensions.push(Extension::decode(list)?);
                    }
                    Ok(extensions)
                })
            })?
            .unwrap_or_default();

        Ok(Certificate {
            der: Vec::new(),
            tbs_der: tbs_der.to_vec(),
            serial: serial_raw.to_vec(),
            signature_algorithm: algorithm,
            issuer,
            subject,
            not_before,
            not_after,
            spki_der,
            public_key_bits,
            extensions,
            signature: Vec::new(),
        })
    });
    if unique_ids {
        return Err(Error::UniqueIdsNotAllowed);
    }
    if let Some(e) = alg_error {
        return Err(e);
    }
    let cert = result?;
    dec.finish().map_err(Error::from)?;

    if !version_ok {
        return Err(Error::UnsupportedCertificateVersion);
    }

    // Normalize the serial to its magnitude and re-check the invariants.
    let mut serial = cert.serial.clone();
    if serial[0] & 0x80 != 0 {
        return Err(Error::NegativeSerial);
    }
    if serial[0] == 0 && serial.len() > 1 {
        serial.remove(0);
    }
    if serial == [0] {
        return Err(Error::ZeroSerial);
    }
    if serial.len() > 20 {
        return Err(Error::SerialTooLong);
    }

    let mut seen = HashSet::new();
    for extension in &cert.extensions {
        if !seen.insert(extension.oid) {
            return Err(Error::DuplicateExtension {
                oid: extension.oid.to_string(),
            });
        }
    }

    Ok(Certificate { serial, ..cert })
}

/// Writes the AlgorithmIdentifier for a signature algorithm. The `RS`
/// family carries a NULL parameter, the `PS` family carries the RFC 4055
/// RSASSA-PSS parameter structure with matching MGF-1 digest and a salt
/// length equal to the digest length.
pub(crate) fn encode_signature_algorithm(enc: &mut Encoder, algorithm: SignatureAlgorithm) {
    enc.sequence(|seq| match algorithm {
        SignatureAlgorithm::Rs256 => {
            seq.oid(&oid::SHA256_WITH_RSA);
            seq.null();
        }
        SignatureAlgorithm::Rs384 => {
            seq.oid(&oid::SHA384_WITH_RSA);
            seq.null();
        }
        SignatureAlgorithm::Rs512 => {
            seq.oid(&oid::SHA512_WITH_RSA);
            seq.null();
        }
        SignatureAlgorithm::Ps256 => encode_pss_parameters(seq, oid::SHA256, 32),
        SignatureAlgorithm::Ps384 => encode_pss_parameters(seq, oid::SHA384, 48),
        SignatureAlgorithm::Ps512 => encode_pss_parameters(seq, oid::SHA512, 64),
    });
}

fn encode_pss_parameters(seq: &mut Encoder, digest: const_oid::ObjectIdentifier, salt_len: u64) {
    seq.oid(&oid::RSASSA_PSS);
    seq.sequence(|params| {
        params.explicit(0, |hash| {
            hash.sequence(|alg| {
                alg.oid(&digest);
                alg.null();
            });
        });
        params.explicit(1, |mgf| {
            mgf.sequence(|alg| {
                alg.oid(&oid::MGF1);
                alg.sequence(|inner| {
                    inner.oid(&digest);
                    inner.null();
                });
            });
        });
        params.explicit(2, |salt| salt.uint(salt_len));
    });
}

/// Reads a signature AlgorithmIdentifier, accepting exactly the encodings
/// `encode_signature_algorithm` produces.
pub(crate) fn decode_signature_algorithm(dec: &mut Decoder<'_>) -> Result<SignatureAlgorithm> {
    let mut unsupported: Option<String> = None;
    let mut bad_pss = false;
    let algorithm = dec.sequence(|seq| {
        let alg_oid = seq.oid()?;
        if alg_oid == oid::SHA256_WITH_RSA {
            seq.null()?;
            Ok(Some(SignatureAlgorithm::Rs256))
        } else if alg_oid == oid::SHA384_WITH_RSA {
            seq.null()?;
            Ok(Some(SignatureAlgorithm::Rs384))
        } else if alg_oid == oid::SHA512_WITH_RSA {
            seq.null()?;
            Ok(Some(SignatureAlgorithm::Rs512))
        } else if alg_oid == oid::RSASSA_PSS {
            let (digest, salt_len) = seq.sequence(|params| {
                let digest = params.explicit(0, |hash| {
                    hash.sequence(|alg| {
                        let digest = alg.oid()?;
                        alg.null()?;
                        Ok(digest)
                    })
                })?;
                let mgf_digest = params.explicit(1, |mgf| {
                    mgf.sequence(|alg| {
                        let mgf_oid = alg.oid()?;
                        if mgf_oid != oid::MGF1 {
                            return Err(alg.error(der::ErrorKind::UnexpectedTag));
                        }
                        alg.sequence(|inner| {
                            let digest = inner.oid()?;
                            inner.null()?;
                            Ok(digest)
                        })
                    })
                })?;
                let salt_len = params.explicit(2, |salt| salt.uint())?;
                if mgf_digest != digest {
                    bad_pss = true;
                }
                Ok((digest, salt_len))
            })?;
            let algorithm = if digest == oid::SHA256 && salt_len == 32 {
                Some(SignatureAlgorithm::Ps256)
            } else if digest == oid::SHA384 && salt_len == 48 {
                Some(SignatureAlgorithm::Ps384)
            } else if digest == oid::SHA512 && salt_len == 64 {
                Some(SignatureAlgorithm::Ps512)
            } else {
                bad_pss = true;
                None
            };
            Ok(algorithm)
        } else {
            unsupported = Some(alg_oid.to_string());
            Ok(None)
        }
    })?;

    if let Some(oid) = unsupported {
        return Err(Error::UnsupportedSignatureAlgorithm { oid });
    }
    if bad_pss {
        return Err(Error::UnsupportedPssParameters);
    }
    algorithm.ok_or(Error::UnsupportedPssParameters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::der::Encoder;

    // Tests the AlgorithmIdentifier round trip for every supported
    // algorithm, pinning the PKCS#1 v1.5 encodings to their well-known
    // bytes.
    #[test]
    fn test_signature_algorithm_roundtrip() {
        let algorithms = [
            SignatureAlgorithm::Rs256,
            SignatureAlgorithm::Rs384,
            SignatureAlgorithm::Rs512,
            SignatureAlgorithm::Ps256,
            SignatureAlgorithm::Ps384,
            SignatureAlgorithm::Ps512,
        ];
        for algorithm in algorithms {
            let mut enc = Encoder::new();
            encode_signature_algorithm(&mut enc, algorithm);
            let der_bytes = enc.finish();
            let mut dec = Decoder::new(&der_bytes);
            assert_eq!(decode_signature_algorithm(&mut dec).unwrap(), algorithm);
            dec.finish().unwrap();
        }

        let mut enc = Encoder::new();
        encode_signature_algorithm(&mut enc, SignatureAlgorithm::Rs256);
        assert_eq!(
            enc.finish(),
            hex::decode("300d06092a864886f70d01010b0500").unwrap()
        );
    }

    // Tests that an unknown signature algorithm OID is reported as such
    // rather than as a parse error.
    #[test]
    fn test_unknown_signature_algorithm() {
        // ecdsa-with-SHA256.
        let mut enc = Encoder::new();
        enc.sequence(|seq| {
            seq.oid(&const_oid::ObjectIdentifier::new_unwrap(
                "1.2.840.10045.4.3.2",
            ));
        });
        let der_bytes = enc.finish();
        let mut dec = Decoder::new(&der_bytes);
        assert!(matches!(
            decode_signature_algorithm(&mut dec),
            Err(Error::UnsupportedSignatureAlgorithm { .. })
        ));
    }
}
