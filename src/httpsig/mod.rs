// qwac-rs: PSD2 qualified certificates and HTTP message signing
// Copyright 2026 Dark Bio AG. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! HTTP message signatures.
//!
//! Implements the `Signature` and `Digest` headers and the canonical
//! signature input of draft-cavage-http-signatures-12, plus a bidirectional
//! request pipeline validating inbound requests and signing outbound
//! responses on path-scoped rules.
//!
//! https://datatracker.ietf.org/doc/html/draft-cavage-http-signatures-12

use crate::keys::SignatureAlgorithm;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use http::HeaderMap;
use thiserror::Error;

mod digest;
mod keys;
mod pipeline;

pub use digest::{BodyDigest, DigestAlgorithm};
pub use keys::{
    CredentialStore, InMemoryKeyStore, SecurityKey, SigningCredentials, ValidationKeyStore,
};
pub use pipeline::{PathRule, PipelineConfig, SignaturePipeline};

/// Result type used by HTTP signature APIs.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type used by HTTP signature APIs.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Missing signature header.")]
    MissingSignature,
    #[error("Malformed signature header: {details}.")]
    MalformedSignature { details: String },
    #[error("Duplicate signature parameter {name:?}.")]
    DuplicateParameter { name: String },
    #[error("Signature header is missing the {name} parameter.")]
    MissingParameter { name: &'static str },
    #[error("Unknown signature algorithm {name:?}.")]
    UnknownAlgorithm { name: String },
    #[error("Signature input references missing header {name:?}.")]
    MissingHeader { name: String },
    #[error("Signature input references (created) but the parameter is absent.")]
    MissingCreated,
    #[error("Signature input references (expires) but the parameter is absent.")]
    MissingExpires,
    #[error("Signature input references (request-target) outside a request.")]
    MissingRequestTarget,
    #[error("Missing digest header.")]
    MissingDigest,
    #[error("Malformed digest header: {details}.")]
    MalformedDigest { details: String },
    #[error("Digest validation failed.")]
    DigestMismatch,
    #[error("Signature certificate validation failed.")]
    BadCertificate,
    #[error("No signature validation keys available.")]
    NoValidationKeys,
    #[error("Signature validation failed.")]
    SignatureInvalid,
    #[error("Signature has expired.")]
    Expired,
    #[error("Message body exceeds the configured limit.")]
    BodyTooLarge,
    #[error("No signing credentials configured.")]
    NoSigningCredentials,
    #[error(transparent)]
    Key(#[from] crate::keys::Error),
}

/// The signature scheme named in the `algorithm` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    RsaSha256,
    RsaSha512,
    /// The algorithm-agnostic registry value: the real algorithm derives
    /// from key metadata. All keys here are RSA, verified as RSA-SHA-512.
    Hs2019,
}

impl SignatureScheme {
    /// The registry name of the scheme.
    pub fn name(&self) -> &'static str {
        match self {
            SignatureScheme::RsaSha256 => "rsa-sha256",
            SignatureScheme::RsaSha512 => "rsa-sha512",
            SignatureScheme::Hs2019 => "hs2019",
        }
    }

    /// Parses a registry name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "rsa-sha256" => Ok(SignatureScheme::RsaSha256),
            "rsa-sha512" => Ok(SignatureScheme::RsaSha512),
            "hs2019" => Ok(SignatureScheme::Hs2019),
            _ => Err(Error::UnknownAlgorithm { name: name.into() }),
        }
    }

    /// The concrete RSA algorithm to sign or verify with.
    pub fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            SignatureScheme::RsaSha256 => SignatureAlgorithm::Rs256,
            SignatureScheme::RsaSha512 | SignatureScheme::Hs2019 => SignatureAlgorithm::Rs512,
        }
    }
}

/// Parsed `Signature` header parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Identifier of the signing key.
    pub key_id: String,
    /// Declared scheme; `hs2019` is assumed when absent.
    pub algorithm: Option<SignatureScheme>,
    /// Ordered, lowercased signature input list.
    pub headers: Vec<String>,
    /// Unix seconds the signature was created, when declared.
    pub created: Option<i64>,
    /// Unix seconds the signature expires, when declared.
    pub expires: Option<i64>,
    /// The decoded signature bytes.
    pub signature: Vec<u8>,
}

impl SignatureHeader {
    /// Parses a `Signature` header value: a comma-separated list of
    /// `key="value"` (or bare-integer) parameters in any order. Duplicate
    /// keys are rejected, unknown keys are ignored.
    pub fn parse(value: &str) -> Result<Self> {
        let mut key_id = None;
        let mut algorithm = None;
        let mut headers: Option<Vec<String>> = None;
        let mut created = None;
        let mut expires = None;
        let mut signature = None;
        let mut seen: Vec<String> = Vec::new();

        for part in split_parameters(value) {
            let part = part.trim();
            if part.is_empty() {
                return Err(Error::MalformedSignature {
                    details: "empty parameter".into(),
                });
            }
            let (name, raw) = part.split_once('=').ok_or_else(|| Error::MalformedSignature {
                details: format!("parameter {part:?} has no value"),
            })?;
            let name = name.trim();
            if seen.iter().any(|s| s == name) {
                return Err(Error::DuplicateParameter { name: name.into() });
            }
            seen.push(name.into());
            let raw = raw.trim();
            let unquoted = raw
                .strip_prefix('"')
                .and_then(|rest| rest.strip_suffix('"'))
                .unwrap_or(raw);

            match name {
                "keyId" => key_id = Some(unquoted.to_string()),
                "algorithm" => algorithm = Some(SignatureScheme::from_name(unquoted)?),
                "headers" => {
                    headers = Some(
                        unquoted
                            .split_ascii_whitespace()
                            .map(str::to_ascii_lowercase)
                            .collect(),
                    );
                }
                "created" => created = Some(parse_seconds(unquoted)?),
                "expires" => expires = Some(parse_seconds(unquoted)?),
                "signature" => {
                    signature = Some(BASE64.decode(unquoted).map_err(|e| {
                        Error::MalformedSignature {
                            details: format!("signature is not valid base64: {e}"),
                        }
                    })?);
                }
                // Unknown parameters are ignored for forward compatibility.
                _ => {}
            }
        }

        let header = Self {
            key_id: key_id.ok_or(Error::MissingParameter { name: "keyId" })?,
            algorithm,
            headers: headers.ok_or(Error::MissingParameter { name: "headers" })?,
            created,
            expires,
            signature: signature.ok_or(Error::MissingParameter { name: "signature" })?,
        };
        if header.headers.is_empty() {
            return Err(Error::MissingParameter { name: "headers" });
        }
        if header.headers.iter().any(|h| h == "(created)") && header.created.is_none() {
            return Err(Error::MissingCreated);
        }
        Ok(header)
    }

    /// The effective scheme: the declared one, or `hs2019` when absent.
    pub fn scheme(&self) -> SignatureScheme {
        self.algorithm.unwrap_or(SignatureScheme::Hs2019)
    }

    /// Serializes the parameters back into a header value.
    pub fn to_header_value(&self) -> String {
        let mut out = format!("keyId=\"{}\"", self.key_id);
        if let Some(algorithm) = self.algorithm {
            out.push_str(&format!(",algorithm=\"{}\"", algorithm.name()));
        }
        out.push_str(&format!(",headers=\"{}\"", self.headers.join(" ")));
        if let Some(created) = self.created {
            out.push_str(&format!(",created={created}"));
        }
        if let Some(expires) = self.expires {
            out.push_str(&format!(",expires={expires}"));
        }
        out.push_str(&format!(",signature=\"{}\"", BASE64.encode(&self.signature)));
        out
    }
}

fn parse_seconds(raw: &str) -> Result<i64> {
    raw.parse().map_err(|_| Error::MalformedSignature {
        details: format!("timestamp {raw:?} is not an integer"),
    })
}

/// Splits a parameter list on top-level commas, honoring quoted strings.
fn split_parameters(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for (index, c) in value.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => {
                parts.push(&value[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

/// The request target a `(request-target)` pseudo-header resolves to.
#[derive(Debug, Clone)]
pub struct RequestTarget {
    /// HTTP method, any case.
    pub method: String,
    /// Path with query, as it appeared on the request line.
    pub path_and_query: String,
}

/// Assembles the canonical signature input: one `name: value` line per
/// entry of `header_list` in order, names lowercased, repeated headers
/// joined with `", "`, pseudo-headers resolved from the parameters, and no
/// trailing newline.
pub fn signing_string(
    header_list: &[String],
    headers: &HeaderMap,
    target: Option<&RequestTarget>,
    created: Option<i64>,
    expires: Option<i64>,
) -> Result<String> {
    let mut lines = Vec::with_capacity(header_list.len());
    for name in header_list {
        let name = name.to_ascii_lowercase();
        let line = match name.as_str() {
            "(request-target)" => {
                let target = target.ok_or(Error::MissingRequestTarget)?;
                format!(
                    "(request-target): {} {}",
                    target.method.to_ascii_lowercase(),
                    target.path_and_query
                )
            }
            "(created)" => {
                let created = created.ok_or(Error::MissingCreated)?;
                format!("(created): {created}")
            }
            "(expires)" => {
                let expires = expires.ok_or(Error::MissingExpires)?;
                format!("(expires): {expires}")
            }
            _ => {
                let values: Vec<&str> = headers
                    .get_all(&name)
                    .iter()
                    .map(|value| value.to_str().map(str::trim))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|_| Error::MalformedSignature {
                        details: format!("header {name:?} is not valid UTF-8"),
                    })?;
                if values.is_empty() {
                    return Err(Error::MissingHeader { name });
                }
                format!("{}: {}", name, values.join(", "))
            }
        };
        lines.push(line);
    }
    Ok(lines.join("\n"))
}
