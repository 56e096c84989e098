// qwac-rs: PSD2 qualified certificates and HTTP message signing
// Copyright 2026 Dark Bio AG. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use super::cert::{decode_signature_algorithm, encode_signature_algorithm};
use super::ext::{self, Extension};
use super::name::DistinguishedName;
use super::{Error, Result, oid};
use crate::der::{self, Decoder, Encoder};
use crate::keys::{SignatureAlgorithm, SigningKey, VerifyingKey};
use crate::pem;
use chrono::{DateTime, Utc};

/// One revoked certificate in a CRL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrlEntry {
    /// Serial number magnitude of the revoked certificate.
    pub serial: Vec<u8>,
    /// When the certificate was revoked.
    pub revocation_date: DateTime<Utc>,
}

/// Everything that goes into a TBSCertList.
pub struct CrlParams<'a> {
    /// Issuer distinguished name (the CA's subject).
    pub issuer: &'a DistinguishedName,
    /// Signature algorithm the CA signs with.
    pub algorithm: SignatureAlgorithm,
    /// Publication time of this CRL.
    pub this_update: DateTime<Utc>,
    /// When the next CRL is due.
    pub next_update: DateTime<Utc>,
    /// Monotonic CRL number.
    pub number: u64,
    /// The CA's key identifier for the AKI extension.
    pub authority_key_id: &'a [u8],
    /// Revoked certificates.
    pub entries: &'a [CrlEntry],
}

/// Assembles a v2 CRL, signs it with the CA key and returns the DER.
pub fn sign_crl(params: &CrlParams<'_>, issuer_key: &SigningKey) -> Result<Vec<u8>> {
    if params.issuer.is_empty() {
        return Err(Error::EmptyIssuerDn);
    }
    if params.this_update >= params.next_update {
        return Err(Error::InvalidValidityWindow);
    }

    let issuer_der = {
        let mut enc = Encoder::new();
        params.issuer.encode(&mut enc)?;
        enc.finish()
    };

    let mut number_value = Encoder::new();
    number_value.uint(params.number);
    let extensions = [
        ext::authority_key_identifier(params.authority_key_id),
        Extension {
            oid: oid::CRL_NUMBER,
            critical: false,
            value: number_value.finish(),
        },
    ];

    let mut tbs = Encoder::new();
    tbs.sequence(|seq| {
        seq.uint(1); // v2
        encode_signature_algorithm(seq, params.algorithm);
        seq.raw(&issuer_der);
        seq.time(params.this_update);
        seq.time(params.next_update);
        if !params.entries.is_empty() {
            seq.sequence(|revoked| {
                for entry in params.entries {
                    revoked.sequence(|row| {
                        row.unsigned_integer(&entry.serial);
                        row.time(entry.revocation_date);
                    });
                }
            });
        }
        seq.explicit(0, |wrapper| {
            wrapper.sequence(|list| {
                for extension in &extensions {
                    extension.encode(list);
                }
            });
        });
    });
    let tbs_der = tbs.finish();

    let signature = issuer_key.sign(params.algorithm, &tbs_der)?;
    let mut outer = Encoder::new();
    outer.sequence(|seq| {
        seq.raw(&tbs_der);
        encode_signature_algorithm(seq, params.algorithm);
        seq.bit_string(0, &signature);
    });
    Ok(outer.finish())
}

/// A parsed certificate revocation list.
#[derive(Clone, Debug)]
pub struct CertificateList {
    der: Vec<u8>,
    tbs_der: Vec<u8>,
    /// Signature algorithm of the list.
    pub signature_algorithm: SignatureAlgorithm,
    /// Issuer distinguished name.
    pub issuer: DistinguishedName,
    /// Publication time.
    pub this_update: DateTime<Utc>,
    /// Due time of the successor CRL.
    pub next_update: Option<DateTime<Utc>>,
    /// Monotonic CRL number, when present.
    pub number: Option<u64>,
    /// Authority key identifier, when present.
    pub authority_key_id: Option<Vec<u8>>,
    /// Revoked certificates in encoded order.
    pub entries: Vec<CrlEntry>,
    signature: Vec<u8>,
}

impl CertificateList {
    /// Parses a CRL from strict DER.
    pub fn from_der(der_bytes: &[u8]) -> Result<Self> {
        let mut alg_error: Option<Error> = None;
        let mut dec = Decoder::new(der_bytes);
        let result = dec.sequence(|outer| {
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
        let (tbs_der, signature_algorithm, signature) = result?;
        dec.finish().map_err(Error::from)?;

        let mut crl = parse_tbs_cert_list(&tbs_der)?;
        if crl.signature_algorithm != signature_algorithm {
            return Err(Error::SignatureAlgorithmMismatch);
        }
        crl.der = der_bytes.to_vec();
        crl.signature = signature;
        Ok(crl)
    }

    /// Parses a CRL from an `X509 CRL` PEM block.
    pub fn from_pem(pem_str: &str) -> Result<Self> {
        let der_bytes = pem::decode_labeled(pem_str.as_bytes(), pem::X509_CRL)?;
        Self::from_der(&der_bytes)
    }

    /// The exact DER encoding of the list.
    pub fn to_der(&self) -> &[u8] {
        &self.der
    }

    /// The PEM encoding of the list.
    pub fn to_pem(&self) -> String {
        pem::encode(pem::X509_CRL, &self.der)
    }

    /// Whether the given serial appears in the list, and how often.
    pub fn occurrences(&self, serial: &[u8]) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.serial == serial)
            .count()
    }

    /// Verifies the list signature against the CA's public key.
    pub fn verify_signature(&self, issuer_key: &VerifyingKey) -> Result<()> {
        Ok(issuer_key.verify(self.signature_algorithm, &self.tbs_der, &self.signature)?)
    }
}

fn parse_tbs_cert_list(tbs_der: &[u8]) -> Result<CertificateList> {
    let mut version_ok = false;
    let mut alg_error: Option<Error> = None;
    let mut dec = Decoder::new(tbs_der);
    let result = dec.sequence(|tbs| {
        let version = tbs.uint()?;
        version_ok = version == 1;

        let algorithm = match decode_signature_algorithm(tbs) {
            Ok(algorithm) => algorithm,
            Err(Error::Der(inner)) => return Err(inner),
            Err(other) => {
                alg_error = Some(other);
                return Err(tbs.error(der::ErrorKind::UnexpectedTag));
            }
        };
        let issuer = DistinguishedName::decode(tbs)?;
        let this_update = tbs.time()?;
        let next_update = if matches!(
            tbs.peek_tag_opt(),
            Some(der::tag::UTC_TIME) | Some(der::tag::GENERALIZED_TIME)
        ) {
            Some(tbs.time()?)
        } else {
            None
        };

        let mut entries = Vec::new();
        if tbs.peek_tag_opt() == Some(der::tag::SEQUENCE) {
            tbs.sequence(|revoked| {
                while !revoked.is_empty() {
                    entries.push(revoked.sequence(|row| {
                        let raw = row.integer_bytes()?;
                        let serial = if raw.first() == Some(&0) && raw.len() > 1 {
                            raw[1..].to_vec()
                        } else {
                            raw.to_vec()
                        };
                        let revocation_date = row.time()?;
                        Ok(CrlEntry {
                            serial,
                            revocation_date,
                        })
                    })?);
                }
                Ok(())
            })?;
        }

        let mut extensions = Vec::new();
        if let Some(list) = tbs.optional_explicit(0, |wrapper| {
            wrapper.sequence(|list| {
                let mut extensions = Vec::new();
                while !list.is_empty() {
                    extensions.push(Extension::decode(list)?);
                }
                Ok(extensions)
            })
        })? {
            extensions = list;
        }

        Ok((
            CertificateList {
                der: Vec::new(),
                tbs_der: tbs_der.to_vec(),
                signature_algorithm: algorithm,
                issuer,
                this_update,
                next_update,
                number: None,
                authority_key_id: None,
                entries,
                signature: Vec::new(),
            },
            extensions,
        ))
    });
    if let Some(e) = alg_error {
        return Err(e);
    }
    let (mut crl, extensions) = result?;
    dec.finish().map_err(Error::from)?;

    if !version_ok {
        return Err(Error::UnsupportedCrlVersion);
    }

    for extension in &extensions {
        if extension.oid == oid::CRL_NUMBER {
            let mut value = Decoder::new(&extension.value);
            crl.number = Some(value.uint()?);
            value.finish().map_err(Error::from)?;
        } else if extension.oid == oid::AUTHORITY_KEY_IDENTIFIER {
            crl.authority_key_id = Some(ext::parse_authority_key_identifier(&extension.value)?);
        }
    }
    Ok(crl)
}
