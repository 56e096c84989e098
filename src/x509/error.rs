// qwac-rs: PSD2 qualified certificates and HTTP message signing
// Copyright 2026 Dark Bio AG. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use thiserror::Error;

/// Result type used by x509 APIs.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type used by x509 APIs.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid PrintableString characters")]
    InvalidPrintableString,
    #[error("invalid IA5String characters")]
    InvalidIa5String,
    #[error("certificate subject DN must not be empty")]
    EmptySubjectDn,
    #[error("certificate issuer DN must not be empty")]
    EmptyIssuerDn,
    #[error("invalid certificate validity window: not_before must be < not_after")]
    InvalidValidityWindow,
    #[error("country must be an ISO 3166 alpha-2 code, got {value:?}")]
    InvalidCountryCode { value: String },
    #[error("at least one PSP role must be set")]
    MissingPspRole,
    #[error("certificate validity must be at least one day")]
    InvalidValidityDays,
    #[error("authorization number must not be empty")]
    EmptyAuthorizationNumber,
    #[error("common name exceeds 64 characters ({length})")]
    CommonNameTooLong { length: usize },
    #[error("failed to generate certificate serial: {details}")]
    SerialGenerationFailed { details: String },
    #[error("certificate version must be X.509 v3")]
    UnsupportedCertificateVersion,
    #[error("issuerUniqueID and subjectUniqueID are not allowed")]
    UniqueIdsNotAllowed,
    #[error("signature algorithms of TBSCertificate and Certificate differ")]
    SignatureAlgorithmMismatch,
    #[error("unsupported signature algorithm {oid}")]
    UnsupportedSignatureAlgorithm { oid: String },
    #[error("unsupported PSS parameters")]
    UnsupportedPssParameters,
    #[error("certificate contains duplicate extension {oid}")]
    DuplicateExtension { oid: String },
    #[error("certificate serial must not be empty")]
    EmptySerial,
    #[error("certificate serial must be positive")]
    NegativeSerial,
    #[error("certificate serial exceeds 20 bytes")]
    SerialTooLong,
    #[error("certificate serial must be non-zero")]
    ZeroSerial,
    #[error("CRL version must be v2")]
    UnsupportedCrlVersion,
    #[error("unknown PSP role {name:?}")]
    UnknownPspRole { name: String },
    #[error("unknown qualified certificate statement {oid}")]
    UnknownQcStatement { oid: String },
    #[error("certificate extension {name} is malformed")]
    MalformedExtension { name: &'static str },
    #[error("invalid base64 certificate: {details}")]
    InvalidBase64 { details: String },
    #[error(transparent)]
    Der(#[from] crate::der::Error),
    #[error(transparent)]
    Pem(#[from] crate::pem::Error),
    #[error(transparent)]
    Key(#[from] crate::keys::Error),
}
