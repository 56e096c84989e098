// qwac-rs: PSD2 qualified certificates and HTTP message signing
// Copyright 2026 Dark Bio AG. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Certificate extension builders.
//!
//! Each builder produces an [`Extension`]: the extension OID, its critical
//! flag and the DER of the inner payload. Criticality follows RFC 5280 and
//! TS 119 495: only BasicConstraints, KeyUsage and a QcStatements extension
//! carrying the PSD2 statement are critical.

use super::name::is_printable_string;
use super::types::{MonetaryLimit, PdsLocation, PspRoles};
use super::{Error, Result, oid};
use crate::der::{self, Decoder, Encoder};
use const_oid::ObjectIdentifier;

/// A built certificate extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extension {
    /// Extension OID.
    pub oid: ObjectIdentifier,
    /// Whether the extension is marked critical.
    pub critical: bool,
    /// DER-encoded extension payload (the OCTET STRING content).
    pub value: Vec<u8>,
}

impl Extension {
    pub(crate) fn encode(&self, enc: &mut Encoder) {
        enc.sequence(|seq| {
            seq.oid(&self.oid);
            if self.critical {
                seq.boolean(true);
            }
            seq.octet_string(&self.value);
        });
    }

    pub(crate) fn decode(dec: &mut Decoder<'_>) -> der::Result<Self> {
        dec.sequence(|seq| {
            let oid = seq.oid()?;
            let critical = if seq.peek_tag_opt() == Some(der::tag::BOOLEAN) {
                let flag = seq.boolean()?;
                if !flag {
                    // Encoding DEFAULT FALSE explicitly is not DER.
                    return Err(seq.error(der::ErrorKind::NonCanonical));
                }
                flag
            } else {
                false
            };
            let value = seq.octet_string()?.to_vec();
            Ok(Self {
                oid,
                critical,
                value,
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Key usage
// ---------------------------------------------------------------------------

/// RFC 5280 keyUsage bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyUsage(pub u16);

impl KeyUsage {
    pub const DIGITAL_SIGNATURE: KeyUsage = KeyUsage(1 << 0);
    pub const NON_REPUDIATION: KeyUsage = KeyUsage(1 << 1);
    pub const KEY_ENCIPHERMENT: KeyUsage = KeyUsage(1 << 2);
    pub const DATA_ENCIPHERMENT: KeyUsage = KeyUsage(1 << 3);
    pub const KEY_AGREEMENT: KeyUsage = KeyUsage(1 << 4);
    pub const KEY_CERT_SIGN: KeyUsage = KeyUsage(1 << 5);
    pub const CRL_SIGN: KeyUsage = KeyUsage(1 << 6);
    pub const ENCIPHER_ONLY: KeyUsage = KeyUsage(1 << 7);
    pub const DECIPHER_ONLY: KeyUsage = KeyUsage(1 << 8);

    /// Whether all bits of `other` are set in `self`.
    pub fn contains(&self, other: KeyUsage) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no bit is set.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for KeyUsage {
    type Output = KeyUsage;

    fn bitor(self, rhs: KeyUsage) -> KeyUsage {
        KeyUsage(self.0 | rhs.0)
    }
}

fn key_usage_bits(usage: KeyUsage) -> (u8, Vec<u8>) {
    let highest = (0..9).rev().find(|bit| usage.0 & (1 << bit) != 0);
    let Some(highest) = highest else {
        return (0, Vec::new());
    };
    let mut bytes = vec![0u8; highest / 8 + 1];
    for bit in 0..9 {
        if usage.0 & (1 << bit) != 0 {
            bytes[bit / 8] |= 0x80 >> (bit % 8);
        }
    }
    // DER named bit strings drop trailing zero bits.
    ((7 - (highest % 8)) as u8, bytes)
}

/// Builds the keyUsage extension (critical).
pub fn key_usage(usage: KeyUsage) -> Extension {
    let (unused, bytes) = key_usage_bits(usage);
    let mut enc = Encoder::new();
    enc.bit_string(unused, &bytes);
    Extension {
        oid: oid::KEY_USAGE,
        critical: true,
        value: enc.finish(),
    }
}

/// Parses a keyUsage extension payload.
pub fn parse_key_usage(value: &[u8]) -> Result<KeyUsage> {
    let mut dec = Decoder::new(value);
    let (_, bits) = dec.bit_string()?;
    dec.finish().map_err(Error::from)?;
    let mut usage = 0u16;
    for bit in 0..9.min(bits.len() * 8) {
        if bits[bit / 8] & (0x80 >> (bit % 8)) != 0 {
            usage |= 1 << bit;
        }
    }
    Ok(KeyUsage(usage))
}

// ---------------------------------------------------------------------------
// Core RFC 5280 extensions
// ---------------------------------------------------------------------------

/// Builds the basicConstraints extension (critical).
pub fn basic_constraints(ca: bool, path_len: Option<u64>) -> Extension {
    let mut enc = Encoder::new();
    enc.sequence(|seq| {
        if ca {
            seq.boolean(true);
        }
        if let Some(limit) = path_len {
            seq.uint(limit);
        }
    });
    Extension {
        oid: oid::BASIC_CONSTRAINTS,
        critical: true,
        value: enc.finish(),
    }
}

/// Parses a basicConstraints extension payload into (cA, pathLen).
pub fn parse_basic_constraints(value: &[u8]) -> Result<(bool, Option<u64>)> {
    let mut dec = Decoder::new(value);
    let parsed = dec.sequence(|seq| {
        let ca = if seq.peek_tag_opt() == Some(der::tag::BOOLEAN) {
            seq.boolean()?
        } else {
            false
        };
        let path_len = if seq.peek_tag_opt() == Some(der::tag::INTEGER) {
            Some(seq.uint()?)
        } else {
            None
        };
        Ok((ca, path_len))
    })?;
    dec.finish().map_err(Error::from)?;
    Ok(parsed)
}

/// Builds the extendedKeyUsage extension.
pub fn extended_key_usage(purposes: &[ObjectIdentifier]) -> Extension {
    let mut enc = Encoder::new();
    enc.sequence(|seq| {
        for purpose in purposes {
            seq.oid(purpose);
        }
    });
    Extension {
        oid: oid::EXTENDED_KEY_USAGE,
        critical: false,
        value: enc.finish(),
    }
}

/// Builds the subjectKeyIdentifier extension from the 160-bit key id.
pub fn subject_key_identifier(key_id: &[u8]) -> Extension {
    let mut enc = Encoder::new();
    enc.octet_string(key_id);
    Extension {
        oid: oid::SUBJECT_KEY_IDENTIFIER,
        critical: false,
        value: enc.finish(),
    }
}

/// Parses a subjectKeyIdentifier extension payload.
pub fn parse_subject_key_identifier(value: &[u8]) -> Result<Vec<u8>> {
    let mut dec = Decoder::new(value);
    let key_id = dec.octet_string()?.to_vec();
    dec.finish().map_err(Error::from)?;
    Ok(key_id)
}

/// Builds the authorityKeyIdentifier extension from the issuer's key id.
pub fn authority_key_identifier(key_id: &[u8]) -> Extension {
    let mut enc = Encoder::new();
    enc.sequence(|seq| {
        seq.implicit_primitive(0, key_id);
    });
    Extension {
        oid: oid::AUTHORITY_KEY_IDENTIFIER,
        critical: false,
        value: enc.finish(),
    }
}

/// Parses an authorityKeyIdentifier extension payload (keyIdentifier form).
pub fn parse_authority_key_identifier(value: &[u8]) -> Result<Vec<u8>> {
    let mut dec = Decoder::new(value);
    let key_id = dec.sequence(|seq| Ok(seq.implicit_primitive(0)?.to_vec()))?;
    dec.finish().map_err(Error::from)?;
    Ok(key_id)
}

/// Builds the cRLDistributionPoints extension with fullName URI entries.
pub fn crl_distribution_points(uris: &[String]) -> Result<Extension> {
    for uri in uris {
        if !uri.is_ascii() {
            return Err(Error::InvalidIa5String);
        }
    }
    let mut enc = Encoder::new();
    enc.sequence(|points| {
        for uri in uris {
            points.sequence(|point| {
                point.explicit(0, |dp_name| {
                    dp_name.implicit_constructed(0, |general_names| {
                        general_names.implicit_primitive(6, uri.as_bytes());
                    });
                });
            });
        }
    });
    Ok(Extension {
        oid: oid::CRL_DISTRIBUTION_POINTS,
        critical: false,
        value: enc.finish(),
    })
}

/// Parses a cRLDistributionPoints payload into its fullName URIs.
pub fn parse_crl_distribution_points(value: &[u8]) -> Result<Vec<String>> {
    let mut dec = Decoder::new(value);
    let uris = dec.sequence(|points| {
        let mut uris = Vec::new();
        while !points.is_empty() {
            points.sequence(|point| {
                point.explicit(0, |dp_name| {
                    dp_name.implicit_constructed(0, |general_names| {
                        let uri = general_names.implicit_primitive(6)?;
                        if !uri.is_ascii() {
                            return Err(general_names.error(der::ErrorKind::NonCanonical));
                        }
                        uris.push(String::from_utf8(uri.to_vec()).unwrap());
                        Ok(())
                    })
                })
            })?;
        }
        Ok(uris)
    })?;
    dec.finish().map_err(Error::from)?;
    Ok(uris)
}

/// Access method of an authorityInfoAccess entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessMethod {
    /// Retrieval location for the issuing CA certificate.
    CaIssuers,
    /// OCSP responder location.
    Ocsp,
}

impl AccessMethod {
    fn oid(&self) -> ObjectIdentifier {
        match self {
            AccessMethod::CaIssuers => oid::ACCESS_CA_ISSUERS,
            AccessMethod::Ocsp => oid::ACCESS_OCSP,
        }
    }
}

/// Builds the authorityInfoAccess extension with URI locations.
pub fn authority_info_access(entries: &[(AccessMethod, String)]) -> Result<Extension> {
    for (_, location) in entries {
        if !location.is_ascii() {
            return Err(Error::InvalidIa5String);
        }
    }
    let mut enc = Encoder::new();
    enc.sequence(|descriptions| {
        for (method, location) in entries {
            descriptions.sequence(|description| {
                description.oid(&method.oid());
                description.implicit_primitive(6, location.as_bytes());
            });
        }
    });
    Ok(Extension {
        oid: oid::AUTHORITY_INFO_ACCESS,
        critical: false,
        value: enc.finish(),
    })
}

/// Builds the certificatePolicies extension from policy OIDs (without
/// qualifiers).
pub fn certificate_policies(policies: &[ObjectIdentifier]) -> Extension {
    let mut enc = Encoder::new();
    enc.sequence(|outer| {
        for policy in policies {
            outer.sequence(|info| info.oid(policy));
        }
    });
    Extension {
        oid: oid::CERTIFICATE_POLICIES,
        critical: false,
        value: enc.finish(),
    }
}

// ---------------------------------------------------------------------------
// Qualified certificate statements (ETSI EN 319 412-5 / TS 119 495)
// ---------------------------------------------------------------------------

/// The PSD2 statement content: granted roles plus the supervising NCA.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Psd2Statement {
    /// Granted PSP roles.
    pub roles: PspRoles,
    /// Human-readable authority name (`Bank of Greece`).
    pub nca_name: String,
    /// Authority identifier (`GR-BOG`).
    pub nca_id: String,
}

/// The full qcStatements extension content.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QcStatements {
    /// QcCompliance: the certificate is an EU qualified certificate.
    pub compliance: bool,
    /// QcSSCD: the private key resides on a qualified device.
    pub sscd: bool,
    /// QcType child OID (eSign, eSeal or Web).
    pub qc_type: Option<ObjectIdentifier>,
    /// QcLimitValue transaction limit.
    pub limit: Option<MonetaryLimit>,
    /// QcRetentionPeriod in years.
    pub retention_years: Option<u32>,
    /// QcPDS disclosure statement locations.
    pub pds_locations: Vec<PdsLocation>,
    /// The PSD2 statement.
    pub psd2: Option<Psd2Statement>,
}

impl QcStatements {
    /// Serializes the statements into the qcStatements extension. The
    /// extension is critical exactly when it carries the PSD2 statement.
    pub fn to_extension(&self) -> Result<Extension> {
        if let Some(limit) = &self.limit {
            if !is_printable_string(&limit.currency) {
                return Err(Error::InvalidPrintableString);
            }
        }
        for pds in &self.pds_locations {
            if !pds.url.is_ascii() {
                return Err(Error::InvalidIa5String);
            }
            if !is_printable_string(&pds.language) {
                return Err(Error::InvalidPrintableString);
            }
        }

        let mut enc = Encoder::new();
        enc.sequence(|statements| {
            if self.compliance {
                statements.sequence(|st| st.oid(&oid::QC_COMPLIANCE));
            }
            if let Some(limit) = &self.limit {
                statements.sequence(|st| {
                    st.oid(&oid::QC_LIMIT_VALUE);
                    st.sequence(|info| {
                        info.printable_string(&limit.currency);
                        info.uint(limit.value);
                        info.uint(0);
                    });
                });
            }
            if let Some(years) = self.retention_years {
                statements.sequence(|st| {
                    st.oid(&oid::QC_RETENTION_PERIOD);
                    st.uint(years as u64);
                });
            }
            if self.sscd {
                statements.sequence(|st| st.oid(&oid::QC_SSCD));
            }
            if !self.pds_locations.is_empty() {
                statements.sequence(|st| {
                    st.oid(&oid::QC_PDS);
                    st.sequence(|locations| {
                        for pds in &self.pds_locations {
                            locations.sequence(|location| {
                                location.ia5_string(&pds.url);
                                location.printable_string(&pds.language);
                            });
                        }
                    });
                });
            }
            if let Some(qc_type) = &self.qc_type {
                statements.sequence(|st| {
                    st.oid(&oid::QC_TYPE);
                    st.sequence(|types| types.oid(qc_type));
                });
            }
            if let Some(psd2) = &self.psd2 {
                statements.sequence(|st| {
                    st.oid(&oid::PSD2_QC_STATEMENT);
                    st.sequence(|info| {
                        info.sequence(|roles| {
                            for (role_oid, role_name) in psd2.roles.granted() {
                                roles.sequence(|role| {
                                    role.oid(&role_oid);
                                    role.utf8_string(role_name);
                                });
                            }
                        });
                        info.utf8_string(&psd2.nca_name);
                        info.utf8_string(&psd2.nca_id);
                    });
                });
            }
        });

        Ok(Extension {
            oid: oid::QC_STATEMENTS,
            critical: self.psd2.is_some(),
            value: enc.finish(),
        })
    }

    /// Parses a qcStatements extension payload.
    pub fn from_extension(ext: &Extension) -> Result<Self> {
        if ext.oid != oid::QC_STATEMENTS {
            return Err(Error::MalformedExtension {
                name: "qcStatements",
            });
        }
        let mut parsed = QcStatements::default();
        let mut dec = Decoder::new(&ext.value);
        let mut unknown: Option<String> = None;
        let mut bad_role: Option<String> = None;
        dec.sequence(|statements| {
            while !statements.is_empty() {
                statements.sequence(|st| {
                    let statement_oid = st.oid()?;
                    if statement_oid == oid::QC_COMPLIANCE {
                        parsed.compliance = true;
                    } else if statement_oid == oid::QC_SSCD {
                        parsed.sscd = true;
                    } else if statement_oid == oid::QC_LIMIT_VALUE {
                        parsed.limit = Some(st.sequence(|info| {
                            let currency = info.printable_string()?.to_string();
                            let value = info.uint()?;
                            let _exponent = info.uint()?;
                            Ok(MonetaryLimit { currency, value })
                        })?);
                    } else if statement_oid == oid::QC_RETENTION_PERIOD {
                        parsed.retention_years = Some(st.uint()? as u32);
                    } else if statement_oid == oid::QC_PDS {
                        parsed.pds_locations = st.sequence(|locations| {
                            let mut entries = Vec::new();
                            while !locations.is_empty() {
                                entries.push(locations.sequence(|location| {
                                    let url = location.ia5_string()?.to_string();
                                    let language = location.printable_string()?.to_string();
                                    Ok(PdsLocation { language, url })
                                })?);
                            }
                            Ok(entries)
                        })?;
                    } else if statement_oid == oid::QC_TYPE {
                        parsed.qc_type = st.sequence(|types| {
                            let qc_type = types.oid()?;
                            Ok(Some(qc_type))
                        })?;
                    } else if statement_oid == oid::PSD2_QC_STATEMENT {
                        let statement = st.sequence(|info| {
                            let mut roles = PspRoles::default();
                            info.sequence(|role_list| {
                                while !role_list.is_empty() {
                                    role_list.sequence(|role| {
                                        let role_oid = role.oid()?;
                                        let _ = role.utf8_string()?;
                                        if role_oid == oid::PSP_AS {
                                            roles.aspsp = true;
                                        } else if role_oid == oid::PSP_PI {
                                            roles.pisp = true;
                                        } else if role_oid == oid::PSP_AI {
                                            roles.aisp = true;
                                        } else if role_oid == oid::PSP_IC {
                                            roles.piisp = true;
                                        } else {
                                            bad_role = Some(role_oid.to_string());
                                        }
                                        Ok(())
                                    })?;
                                }
                                Ok(())
                            })?;
                            let nca_name = info.utf8_string()?.to_string();
                            let nca_id = info.utf8_string()?.to_string();
                            Ok(Psd2Statement {
                                roles,
                                nca_name,
                                nca_id,
                            })
                        })?;
                        parsed.psd2 = Some(statement);
                    } else {
                        unknown = Some(statement_oid.to_string());
                        // Consume the statement info, if any, so the
                        // structural walk can continue.
                        if !st.is_empty() {
                            st.tlv()?;
                        }
                    }
                    Ok(())
                })?;
            }
            Ok(())
        })?;
        dec.finish().map_err(Error::from)?;
        if let Some(oid) = unknown {
            return Err(Error::UnknownQcStatement { oid });
        }
        if let Some(name) = bad_role {
            return Err(Error::UnknownPspRole { name });
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tests the named-bit trimming of keyUsage encodings against fixed
    // vectors taken from openssl-issued certificates.
    #[test]
    fn test_key_usage_encoding() {
        // digitalSignature|keyCertSign|cRLSign = bits 0, 5, 6.
        let ext = key_usage(
            KeyUsage::DIGITAL_SIGNATURE | KeyUsage::KEY_CERT_SIGN | KeyUsage::CRL_SIGN,
        );
        assert_eq!(ext.value, [0x03, 0x02, 0x01, 0x86]);
        assert!(ext.critical);

        // digitalSignature|nonRepudiation = bits 0, 1.
        let ext = key_usage(KeyUsage::DIGITAL_SIGNATURE | KeyUsage::NON_REPUDIATION);
        assert_eq!(ext.value, [0x03, 0x02, 0x06, 0xc0]);

        // decipherOnly is bit 8 and forces a second byte.
        let ext = key_usage(KeyUsage::DECIPHER_ONLY);
        assert_eq!(ext.value, [0x03, 0x03, 0x07, 0x00, 0x80]);
    }

    // Tests the keyUsage parse round trip.
    #[test]
    fn test_key_usage_roundtrip() {
        let usage = KeyUsage::DIGITAL_SIGNATURE | KeyUsage::KEY_CERT_SIGN | KeyUsage::CRL_SIGN;
        let parsed = parse_key_usage(&key_usage(usage).value).unwrap();
        assert_eq!(parsed, usage);
        assert!(parsed.contains(KeyUsage::KEY_CERT_SIGN));
        assert!(!parsed.contains(KeyUsage::KEY_AGREEMENT));
    }

    // Tests basicConstraints for CA and end-entity shapes, including the
    // DEFAULT FALSE omission.
    #[test]
    fn test_basic_constraints() {
        let ca = basic_constraints(true, None);
        assert_eq!(ca.value, [0x30, 0x03, 0x01, 0x01, 0xff]);
        assert_eq!(parse_basic_constraints(&ca.value).unwrap(), (true, None));

        let leaf = basic_constraints(false, None);
        assert_eq!(leaf.value, [0x30, 0x00]);
        assert_eq!(parse_basic_constraints(&leaf.value).unwrap(), (false, None));

        let limited = basic_constraints(true, Some(0));
        assert_eq!(
            parse_basic_constraints(&limited.value).unwrap(),
            (true, Some(0))
        );
    }

    // Tests the SKI/AKI payload round trip.
    #[test]
    fn test_key_identifier_extensions() {
        let key_id = [0xab; 20];
        let ski = subject_key_identifier(&key_id);
        assert_eq!(parse_subject_key_identifier(&ski.value).unwrap(), key_id);
        assert!(!ski.critical);

        let aki = authority_key_identifier(&key_id);
        assert_eq!(parse_authority_key_identifier(&aki.value).unwrap(), key_id);
    }

    // Tests the distribution point URI round trip.
    #[test]
    fn test_crl_distribution_points() {
        let uris = vec!["https://ca.example.com/.certificates/revoked.crl".to_string()];
        let ext = crl_distribution_points(&uris).unwrap();
        assert_eq!(parse_crl_distribution_points(&ext.value).unwrap(), uris);
    }

    // Tests the full qcStatements round trip for a PSD2 web certificate
    // with every optional statement populated.
    #[test]
    fn test_qc_statements_roundtrip() {
        let statements = QcStatements {
            compliance: true,
            sscd: true,
            qc_type: Some(oid::QC_TYPE_WEB),
            limit: Some(MonetaryLimit {
                currency: "EUR".into(),
                value: 50_000,
            }),
            retention_years: Some(7),
            pds_locations: vec![PdsLocation {
                language: "en".into(),
                url: "https://ca.example.com/pds".into(),
            }],
            psd2: Some(Psd2Statement {
                roles: PspRoles {
                    aisp: true,
                    pisp: true,
                    ..Default::default()
                },
                nca_name: "Bank of Greece".into(),
                nca_id: "GR-BOG".into(),
            }),
        };

        let ext = statements.to_extension().unwrap();
        assert_eq!(ext.oid, oid::QC_STATEMENTS);
        assert!(ext.critical);

        let parsed = QcStatements::from_extension(&ext).unwrap();
        assert_eq!(parsed, statements);
    }

    // Tests that a qcStatements extension without the PSD2 statement is
    // not critical.
    #[test]
    fn test_qc_statements_criticality() {
        let statements = QcStatements {
            compliance: true,
            qc_type: Some(oid::QC_TYPE_ESEAL),
            ..Default::default()
        };
        let ext = statements.to_extension().unwrap();
        assert!(!ext.critical);
    }

    // Tests that unknown statement identifiers are surfaced instead of
    // silently dropped.
    #[test]
    fn test_qc_statements_unknown_statement() {
        let mut enc = Encoder::new();
        enc.sequence(|statements| {
            statements.sequence(|st| {
                st.oid(&ObjectIdentifier::new_unwrap("1.3.6.1.4.1.99999.1"));
            });
        });
        let ext = Extension {
            oid: oid::QC_STATEMENTS,
            critical: false,
            value: enc.finish(),
        };
        assert!(matches!(
            QcStatements::from_extension(&ext),
            Err(Error::UnknownQcStatement { .. })
        ));
    }
}
