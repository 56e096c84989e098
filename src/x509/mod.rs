// qwac-rs: PSD2 qualified certificates and HTTP message signing
// Copyright 2026 Dark Bio AG. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! X.509 qualified certificate issuance, parsing and revocation.
//!
//! The profile is the PSD2 one from ETSI EN 319 412-5 and TS 119 495:
//! RSA keys, qcStatements with the PSD2 statement, CA/Browser Forum
//! organizationIdentifier subjects, CRL and AIA distribution extensions.
//!
//! https://datatracker.ietf.org/doc/html/rfc5280

mod cert;
mod crl;
mod error;
mod ext;
mod issue;
mod name;
pub mod oid;
mod types;

pub use cert::Certificate;
pub use crl::{CertificateList, CrlEntry, CrlParams, sign_crl};
pub use error::{Error, Result};
pub use ext::{
    AccessMethod, Extension, KeyUsage, Psd2Statement, QcStatements, authority_info_access,
    authority_key_identifier, basic_constraints, certificate_policies, crl_distribution_points,
    extended_key_usage, key_usage, subject_key_identifier,
};
pub use issue::{CertificateParams, random_serial, sign_certificate};
pub use name::{DistinguishedName, NameAttribute, NameValue};
pub use types::{
    MonetaryLimit, NcaIdentifier, PdsLocation, PspRoles, QcCertificateType,
    QualifiedCertificateRequest,
};
