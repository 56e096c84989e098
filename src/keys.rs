// qwac-rs: PSD2 qualified certificates and HTTP message signing
// Copyright 2026 Dark Bio AG. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! RSA signing and verification wrappers.
//!
//! The certificate manager and the HTTP signature engine share these types.
//! Keys are plain RSA; the algorithm (digest and padding scheme) is chosen
//! per signature, matching how one credential signs both certificates and
//! HTTP messages.
//!
//! https://datatracker.ietf.org/doc/html/rfc8017

use crate::pem;
use rsa::pkcs1::EncodeRsaPublicKey;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, Pss, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use thiserror::Error;

/// Result type used by key APIs.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type used by key APIs.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported RSA key size {bits}, expected 2048, 3072 or 4096")]
    UnsupportedKeySize { bits: usize },
    #[error("unknown signature algorithm {name}")]
    UnknownAlgorithm { name: String },
    #[error("key generation failed: {details}")]
    KeyGeneration { details: String },
    #[error("malformed key material: {details}")]
    KeyMalformed { details: String },
    #[error("PEM block is not a {expected}")]
    InvalidPemLabel { expected: &'static str },
    #[error(transparent)]
    Pem(#[from] pem::Error),
    #[error("signature verification failed")]
    SignatureInvalid,
    #[error("signing failed: {details}")]
    SigningFailed { details: String },
}

/// RSA signature algorithm: digest choice plus padding scheme. The `RS`
/// family is RSASSA-PKCS1-v1_5, the `PS` family is RSASSA-PSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Rs256,
    Rs384,
    Rs512,
    Ps256,
    Ps384,
    Ps512,
}

impl SignatureAlgorithm {
    /// JOSE-style name of the algorithm (`RS256`, `PS512`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Rs256 => "RS256",
            SignatureAlgorithm::Rs384 => "RS384",
            SignatureAlgorithm::Rs512 => "RS512",
            SignatureAlgorithm::Ps256 => "PS256",
            SignatureAlgorithm::Ps384 => "PS384",
            SignatureAlgorithm::Ps512 => "PS512",
        }
    }

    /// Parses a JOSE-style algorithm name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "RS256" => Ok(SignatureAlgorithm::Rs256),
            "RS384" => Ok(SignatureAlgorithm::Rs384),
            "RS512" => Ok(SignatureAlgorithm::Rs512),
            "PS256" => Ok(SignatureAlgorithm::Ps256),
            "PS384" => Ok(SignatureAlgorithm::Ps384),
            "PS512" => Ok(SignatureAlgorithm::Ps512),
            _ => Err(Error::UnknownAlgorithm { name: name.into() }),
        }
    }

    /// Whether the algorithm uses RSASSA-PSS padding.
    pub fn is_pss(&self) -> bool {
        matches!(
            self,
            SignatureAlgorithm::Ps256 | SignatureAlgorithm::Ps384 | SignatureAlgorithm::Ps512
        )
    }

    /// Hashes a message with the digest this algorithm mandates.
    pub fn digest(&self, message: &[u8]) -> Vec<u8> {
        match self {
            SignatureAlgorithm::Rs256 | SignatureAlgorithm::Ps256 => {
                Sha256::digest(message).to_vec()
            }
            SignatureAlgorithm::Rs384 | SignatureAlgorithm::Ps384 => {
                Sha384::digest(message).to_vec()
            }
            SignatureAlgorithm::Rs512 | SignatureAlgorithm::Ps512 => {
                Sha512::digest(message).to_vec()
            }
        }
    }

    fn pkcs1v15_padding(&self) -> Pkcs1v15Sign {
        match self {
            SignatureAlgorithm::Rs256 => Pkcs1v15Sign::new::<Sha256>(),
            SignatureAlgorithm::Rs384 => Pkcs1v15Sign::new::<Sha384>(),
            SignatureAlgorithm::Rs512 => Pkcs1v15Sign::new::<Sha512>(),
            _ => unreachable!("PSS algorithms never use PKCS#1 v1.5 padding"),
        }
    }

    fn pss_padding(&self) -> Pss {
        match self {
            SignatureAlgorithm::Ps256 => Pss::new::<Sha256>(),
            SignatureAlgorithm::Ps384 => Pss::new::<Sha384>(),
            SignatureAlgorithm::Ps512 => Pss::new::<Sha512>(),
            _ => unreachable!("RS algorithms never use PSS padding"),
        }
    }
}

impl std::fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for SignatureAlgorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for SignatureAlgorithm {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        SignatureAlgorithm::from_name(&name).map_err(de::Error::custom)
    }
}

/// SigningKey wraps an RSA private key usable for certificate and HTTP
/// message signatures with a per-call algorithm choice.
#[derive(Clone)]
pub struct SigningKey {
    inner: RsaPrivateKey,
}

impl SigningKey {
    /// Generates a new random key. Only 2048, 3072 and 4096 bit moduli are
    /// accepted.
    pub fn generate(bits: usize) -> Result<Self> {
        if !matches!(bits, 2048 | 3072 | 4096) {
            return Err(Error::UnsupportedKeySize { bits });
        }
        let inner = RsaPrivateKey::new(&mut OsRng, bits).map_err(|e| Error::KeyGeneration {
            details: e.to_string(),
        })?;
        Ok(Self { inner })
    }

    /// Parses a PKCS#8 DER buffer into a signing key.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let inner = RsaPrivateKey::from_pkcs8_der(der).map_err(|e| Error::KeyMalformed {
            details: e.to_string(),
        })?;
        Ok(Self { inner })
    }

    /// Parses a PKCS#8 PEM string into a signing key.
    pub fn from_pkcs8_pem(pem_str: &str) -> Result<Self> {
        let block = pem::decode(pem_str.as_bytes())?;
        if block.label != pem::PRIVATE_KEY {
            return Err(Error::InvalidPemLabel {
                expected: pem::PRIVATE_KEY,
            });
        }
        Self::from_pkcs8_der(&block.der)
    }

    /// Serializes the key into PKCS#8 DER.
    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>> {
        Ok(self
            .inner
            .to_pkcs8_der()
            .map_err(|e| Error::KeyMalformed {
                details: e.to_string(),
            })?
            .as_bytes()
            .to_vec())
    }

    /// Serializes the key into a PKCS#8 PEM string.
    pub fn to_pkcs8_pem(&self) -> Result<String> {
        Ok(pem::encode(pem::PRIVATE_KEY, &self.to_pkcs8_der()?))
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.inner.size() * 8
    }

    /// Signs a message: the message is hashed with the algorithm's digest
    /// and the digest is signed under the algorithm's padding scheme.
    pub fn sign(&self, algorithm: SignatureAlgorithm, message: &[u8]) -> Result<Vec<u8>> {
        let digest = algorithm.digest(message);
        let signed = if algorithm.is_pss() {
            self.inner
                .sign_with_rng(&mut OsRng, algorithm.pss_padding(), &digest)
        } else {
            self.inner.sign(algorithm.pkcs1v15_padding(), &digest)
        };
        signed.map_err(|e| Error::SigningFailed {
            details: e.to_string(),
        })
    }

    /// Returns the public counterpart of the signing key.
    pub fn public_key(&self) -> VerifyingKey {
        VerifyingKey {
            inner: self.inner.to_public_key(),
        }
    }
}

/// VerifyingKey wraps an RSA public key usable for certificate and HTTP
/// message signature verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyingKey {
    inner: RsaPublicKey,
}

impl VerifyingKey {
    /// Parses a SubjectPublicKeyInfo DER buffer into a verifying key.
    pub fn from_spki_der(der: &[u8]) -> Result<Self> {
        let inner = RsaPublicKey::from_public_key_der(der).map_err(|e| Error::KeyMalformed {
            details: e.to_string(),
        })?;
        Ok(Self { inner })
    }

    /// Parses a SPKI PEM string into a verifying key.
    pub fn from_spki_pem(pem_str: &str) -> Result<Self> {
        let block = pem::decode(pem_str.as_bytes())?;
        if block.label != pem::PUBLIC_KEY {
            return Err(Error::InvalidPemLabel {
                expected: pem::PUBLIC_KEY,
            });
        }
        Self::from_spki_der(&block.der)
    }

    /// Serializes the key into SubjectPublicKeyInfo DER.
    pub fn to_spki_der(&self) -> Vec<u8> {
        self.inner
            .to_public_key_der()
            .expect("SPKI encoding of a valid RSA key cannot fail")
            .as_bytes()
            .to_vec()
    }

    /// Serializes the key into the PKCS#1 RSAPublicKey DER that certificates
    /// embed as the subjectPublicKey BIT STRING content.
    pub fn to_pkcs1_der(&self) -> Vec<u8> {
        self.inner
            .to_pkcs1_der()
            .expect("PKCS#1 encoding of a valid RSA key cannot fail")
            .as_bytes()
            .to_vec()
    }

    /// Returns the 160-bit key identifier: SHA-1 over the subjectPublicKey
    /// bits. Certificates carry this as SKI and reference issuers by it as
    /// AKI; the store uses its hex form as the primary key.
    pub fn key_identifier(&self) -> [u8; 20] {
        Sha1::digest(self.to_pkcs1_der()).into()
    }

    /// Verifies a message signature made under the given algorithm.
    pub fn verify(
        &self,
        algorithm: SignatureAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<()> {
        let digest = algorithm.digest(message);
        let verified = if algorithm.is_pss() {
            self.inner.verify(algorithm.pss_padding(), &digest, signature)
        } else {
            self.inner
                .verify(algorithm.pkcs1v15_padding(), &digest, signature)
        };
        verified.map_err(|_| Error::SignatureInvalid)
    }
}
