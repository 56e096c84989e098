// qwac-rs: PSD2 qualified certificates and HTTP message signing
// Copyright 2026 Dark Bio AG. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use super::{Error, Result, SignatureScheme};
use crate::keys::{SigningKey, VerifyingKey};
use crate::pem;
use crate::pkcs12;
use crate::x509::Certificate;
use std::future::Future;

/// A public key a signature may validate against.
#[derive(Debug, Clone)]
pub struct SecurityKey {
    /// Hex key identifier (the certificate SKI for certificate-backed
    /// keys).
    pub key_id: String,
    /// The verification key.
    pub key: VerifyingKey,
}

impl SecurityKey {
    /// Extracts a security key from a certificate DER blob.
    pub fn from_certificate_der(der: &[u8]) -> Result<Self> {
        let certificate = Certificate::from_der(der).map_err(|_| Error::BadCertificate)?;
        let key = certificate.public_key().map_err(|_| Error::BadCertificate)?;
        Ok(Self {
            key_id: hex::encode(certificate.computed_key_identifier()),
            key,
        })
    }
}

/// The credential the pipeline signs outbound responses with.
#[derive(Clone)]
pub struct SigningCredentials {
    /// Identifier advertised in the `keyId` parameter.
    pub key_id: String,
    /// The signing key.
    pub key: SigningKey,
    /// Scheme advertised in the `algorithm` parameter.
    pub scheme: SignatureScheme,
    /// Certificate DER advertised in the response certificate header.
    pub certificate: Option<Vec<u8>>,
}

/// Source of the outbound signing credential.
pub trait CredentialStore: Send + Sync {
    fn signing_credentials(
        &self,
    ) -> impl Future<Output = Result<Option<SigningCredentials>>> + Send;
}

/// Source of the trusted inbound validation keys.
pub trait ValidationKeyStore: Send + Sync {
    fn validation_keys(&self) -> impl Future<Output = Result<Vec<SecurityKey>>> + Send;
}

/// In-memory credential and validation key store, typically wrapping a
/// loaded PKCS#12 or PEM key pair.
#[derive(Default)]
pub struct InMemoryKeyStore {
    credentials: Option<SigningCredentials>,
    validation: Vec<SecurityKey>,
}

impl InMemoryKeyStore {
    /// Creates an empty store: no signing credential, no trusted keys.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the signing credential from a PKCS#12 archive. The archive's
    /// first certificate identifies the key and is advertised with
    /// responses.
    pub fn from_pkcs12(data: &[u8], password: &str, scheme: SignatureScheme) -> Result<Self> {
        let contents = pkcs12::decode(data, password).map_err(|_| Error::BadCertificate)?;
        let key = SigningKey::from_pkcs8_der(&contents.private_key)?;
        let security = SecurityKey::from_certificate_der(&contents.certificates[0])?;
        Ok(Self {
            credentials: Some(SigningCredentials {
                key_id: security.key_id,
                key,
                scheme,
                certificate: Some(contents.certificates[0].clone()),
            }),
            validation: Vec::new(),
        })
    }

    /// Loads the signing credential from certificate and key PEM blocks.
    pub fn from_pem(cert_pem: &str, key_pem: &str, scheme: SignatureScheme) -> Result<Self> {
        let der = pem::decode_labeled(cert_pem.as_bytes(), pem::CERTIFICATE)
            .map_err(|_| Error::BadCertificate)?;
        let key = SigningKey::from_pkcs8_pem(key_pem)?;
        let security = SecurityKey::from_certificate_der(&der)?;
        Ok(Self {
            credentials: Some(SigningCredentials {
                key_id: security.key_id,
                key,
                scheme,
                certificate: Some(der),
            }),
            validation: Vec::new(),
        })
    }

    /// Adds a trusted validation key.
    pub fn trust(mut self, key: SecurityKey) -> Self {
        self.validation.push(key);
        self
    }

    /// Adds a trusted validation key from a certificate DER blob.
    pub fn trust_certificate(self, der: &[u8]) -> Result<Self> {
        let key = SecurityKey::from_certificate_der(der)?;
        Ok(self.trust(key))
    }
}

impl CredentialStore for InMemoryKeyStore {
    fn signing_credentials(
        &self,
    ) -> impl Future<Output = Result<Option<SigningCredentials>>> + Send {
        std::future::ready(Ok(self.credentials.clone()))
    }
}

impl ValidationKeyStore for InMemoryKeyStore {
    fn validation_keys(&self) -> impl Future<Output = Result<Vec<SecurityKey>>> + Send {
        std::future::ready(Ok(self.validation.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::SignatureAlgorithm;
    use crate::x509::{CertificateParams, DistinguishedName, random_serial, sign_certificate};
    use chrono::TimeZone;

    fn certificate_and_key() -> (Vec<u8>, SigningKey) {
        let key = SigningKey::generate(2048).unwrap();
        let cert = sign_certificate(
            &CertificateParams {
                serial: &random_serial().unwrap(),
                algorithm: SignatureAlgorithm::Rs256,
                issuer: &DistinguishedName::new().common_name("Signer"),
                subject: &DistinguishedName::new().common_name("Signer"),
                not_before: chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
                not_after: chrono::Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap(),
                subject_key: &key.public_key(),
                extensions: &[],
            },
            &key,
        )
        .unwrap();
        (cert.to_der().to_vec(), key)
    }

    // Tests the PKCS#12 credential loading path end to end.
    #[tokio::test]
    async fn test_from_pkcs12() {
        let (cert, key) = certificate_and_key();
        let archive = pkcs12::encode("pw", &[&cert], &key.to_pkcs8_der().unwrap()).unwrap();

        let store =
            InMemoryKeyStore::from_pkcs12(&archive, "pw", SignatureScheme::RsaSha256).unwrap();
        let credentials = store.signing_credentials().await.unwrap().unwrap();
        assert_eq!(credentials.certificate.as_deref(), Some(&cert[..]));
        assert_eq!(
            credentials.key_id,
            hex::encode(key.public_key().key_identifier())
        );
    }

    // Tests that certificate-derived validation keys carry the SKI as
    // their key id.
    #[tokio::test]
    async fn test_trust_certificate() {
        let (cert, key) = certificate_and_key();
        let store = InMemoryKeyStore::new().trust_certificate(&cert).unwrap();
        let keys = store.validation_keys().await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].key_id, hex::encode(key.public_key().key_identifier()));
        assert_eq!(keys[0].key, key.public_key());
    }

    // Tests that garbage certificates are reported as such.
    #[test]
    fn test_bad_certificate() {
        assert!(matches!(
            SecurityKey::from_certificate_der(b"not a certificate"),
            Err(Error::BadCertificate)
        ));
    }
}
