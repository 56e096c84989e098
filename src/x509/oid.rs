// qwac-rs: PSD2 qualified certificates and HTTP message signing
// Copyright 2026 Dark Bio AG. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Object identifier registry for the certificate subsystem.
//!
//! Sources: RFC 5280 (core extensions), RFC 4519 (DN attributes), CA/Browser
//! Forum EV guidelines (organizationIdentifier), ETSI EN 319 412-5 and
//! TS 119 495 (qualified certificate statements and PSD2).

use const_oid::ObjectIdentifier;

const fn oid(text: &str) -> ObjectIdentifier {
    ObjectIdentifier::new_unwrap(text)
}

// Distinguished name attributes.
pub const COMMON_NAME: ObjectIdentifier = oid("2.5.4.3");
pub const COUNTRY: ObjectIdentifier = oid("2.5.4.6");
pub const LOCALITY: ObjectIdentifier = oid("2.5.4.7");
pub const STATE_OR_PROVINCE: ObjectIdentifier = oid("2.5.4.8");
pub const ORGANIZATION: ObjectIdentifier = oid("2.5.4.10");
pub const ORGANIZATIONAL_UNIT: ObjectIdentifier = oid("2.5.4.11");
pub const EMAIL_ADDRESS: ObjectIdentifier = oid("1.2.840.113549.1.9.1");
/// CA/Browser Forum subject attribute carrying the PSD2 registration number.
pub const CABF_ORGANIZATION_IDENTIFIER: ObjectIdentifier = oid("2.23.140.3.1");

// Certificate extensions.
pub const SUBJECT_KEY_IDENTIFIER: ObjectIdentifier = oid("2.5.29.14");
pub const KEY_USAGE: ObjectIdentifier = oid("2.5.29.15");
pub const BASIC_CONSTRAINTS: ObjectIdentifier = oid("2.5.29.19");
pub const CRL_NUMBER: ObjectIdentifier = oid("2.5.29.20");
pub const CRL_DISTRIBUTION_POINTS: ObjectIdentifier = oid("2.5.29.31");
pub const CERTIFICATE_POLICIES: ObjectIdentifier = oid("2.5.29.32");
pub const AUTHORITY_KEY_IDENTIFIER: ObjectIdentifier = oid("2.5.29.35");
pub const EXTENDED_KEY_USAGE: ObjectIdentifier = oid("2.5.29.37");
pub const AUTHORITY_INFO_ACCESS: ObjectIdentifier = oid("1.3.6.1.5.5.7.1.1");
pub const QC_STATEMENTS: ObjectIdentifier = oid("1.3.6.1.5.5.7.1.3");

// Authority information access methods.
pub const ACCESS_OCSP: ObjectIdentifier = oid("1.3.6.1.5.5.7.48.1");
pub const ACCESS_CA_ISSUERS: ObjectIdentifier = oid("1.3.6.1.5.5.7.48.2");

// Extended key usage purposes.
pub const EKU_SERVER_AUTH: ObjectIdentifier = oid("1.3.6.1.5.5.7.3.1");
pub const EKU_CLIENT_AUTH: ObjectIdentifier = oid("1.3.6.1.5.5.7.3.2");

// ETSI EN 319 412-5 qualified certificate statements.
pub const QC_COMPLIANCE: ObjectIdentifier = oid("0.4.0.1862.1.1");
pub const QC_LIMIT_VALUE: ObjectIdentifier = oid("0.4.0.1862.1.2");
pub const QC_RETENTION_PERIOD: ObjectIdentifier = oid("0.4.0.1862.1.3");
pub const QC_SSCD: ObjectIdentifier = oid("0.4.0.1862.1.4");
pub const QC_PDS: ObjectIdentifier = oid("0.4.0.1862.1.5");
pub const QC_TYPE: ObjectIdentifier = oid("0.4.0.1862.1.6");
pub const QC_TYPE_ESIGN: ObjectIdentifier = oid("0.4.0.1862.1.6.1");
pub const QC_TYPE_ESEAL: ObjectIdentifier = oid("0.4.0.1862.1.6.2");
pub const QC_TYPE_WEB: ObjectIdentifier = oid("0.4.0.1862.1.6.3");

// ETSI TS 119 495 PSD2 statement and role identifiers.
pub const PSD2_QC_STATEMENT: ObjectIdentifier = oid("0.4.0.19495.2");
pub const PSP_AS: ObjectIdentifier = oid("0.4.0.19495.1.1");
pub const PSP_PI: ObjectIdentifier = oid("0.4.0.19495.1.2");
pub const PSP_AI: ObjectIdentifier = oid("0.4.0.19495.1.3");
pub const PSP_IC: ObjectIdentifier = oid("0.4.0.19495.1.4");

// ETSI EN 319 411-2 certificate policy identifiers.
pub const QCP_NATURAL: ObjectIdentifier = oid("0.4.0.194112.1.0");
pub const QCP_LEGAL: ObjectIdentifier = oid("0.4.0.194112.1.1");
pub const QCP_WEB: ObjectIdentifier = oid("0.4.0.194112.1.4");

// Signature and digest algorithms.
pub const RSA_ENCRYPTION: ObjectIdentifier = oid("1.2.840.113549.1.1.1");
pub const RSASSA_PSS: ObjectIdentifier = oid("1.2.840.113549.1.1.10");
pub const SHA256_WITH_RSA: ObjectIdentifier = oid("1.2.840.113549.1.1.11");
pub const SHA384_WITH_RSA: ObjectIdentifier = oid("1.2.840.113549.1.1.12");
pub const SHA512_WITH_RSA: ObjectIdentifier = oid("1.2.840.113549.1.1.13");
pub const MGF1: ObjectIdentifier = oid("1.2.840.113549.1.1.8");
pub const SHA256: ObjectIdentifier = oid("2.16.840.1.101.3.4.2.1");
pub const SHA384: ObjectIdentifier = oid("2.16.840.1.101.3.4.2.2");
pub const SHA512: ObjectIdentifier = oid("2.16.840.1.101.3.4.2.3");
