// qwac-rs: PSD2 qualified certificates and HTTP message signing
// Copyright 2026 Dark Bio AG. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use super::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha2::{Digest, Sha256, Sha512};
use subtle::ConstantTimeEq;

/// Digest algorithm of a `Digest` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    /// The header token of the algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// The digest output length in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            DigestAlgorithm::Sha256 => 32,
            DigestAlgorithm::Sha512 => 64,
        }
    }

    fn hash(&self, body: &[u8]) -> Vec<u8> {
        match self {
            DigestAlgorithm::Sha256 => Sha256::digest(body).to_vec(),
            DigestAlgorithm::Sha512 => Sha512::digest(body).to_vec(),
        }
    }
}

/// A parsed or computed `Digest` header: `SHA-256=<base64>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyDigest {
    /// The digest algorithm.
    pub algorithm: DigestAlgorithm,
    /// The raw digest bytes.
    pub value: Vec<u8>,
}

impl BodyDigest {
    /// Computes the digest of a message body.
    pub fn compute(algorithm: DigestAlgorithm, body: &[u8]) -> Self {
        Self {
            value: algorithm.hash(body),
            algorithm,
        }
    }

    /// Parses a `Digest` header value, checking the digest length matches
    /// the algorithm.
    pub fn parse(value: &str) -> Result<Self> {
        let (name, encoded) = value
            .trim()
            .split_once('=')
            .ok_or_else(|| Error::MalformedDigest {
                details: "missing algorithm separator".into(),
            })?;
        let algorithm = match name.trim() {
            "SHA-256" => DigestAlgorithm::Sha256,
            "SHA-512" => DigestAlgorithm::Sha512,
            other => {
                return Err(Error::MalformedDigest {
                    details: format!("unsupported algorithm {other:?}"),
                });
            }
        };
        let digest = BASE64
            .decode(encoded.trim())
            .map_err(|e| Error::MalformedDigest {
                details: format!("invalid base64: {e}"),
            })?;
        if digest.len() != algorithm.output_len() {
            return Err(Error::MalformedDigest {
                details: format!(
                    "digest length {} does not match {}",
                    digest.len(),
                    algorithm.name()
                ),
            });
        }
        Ok(Self {
            algorithm,
            value: digest,
        })
    }

    /// The wire form of the digest.
    pub fn to_header_value(&self) -> String {
        format!("{}={}", self.algorithm.name(), BASE64.encode(&self.value))
    }

    /// Recomputes the digest over `body` and compares in constant time.
    pub fn matches(&self, body: &[u8]) -> bool {
        let recomputed = self.algorithm.hash(body);
        recomputed.ct_eq(&self.value).into()
    }
}
