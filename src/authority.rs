// qwac-rs: PSD2 qualified certificates and HTTP message signing
// Copyright 2026 Dark Bio AG. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! The certificate authority service.
//!
//! Wires key generation, certificate assembly, the certificate store and
//! the CRL generator into the issuing workflow: a lazily-created root CA
//! signs PSD2 qualified certificates on demand, revocations flow back out
//! as CRLs, and issued material exports as DER, PEM or PKCS#12.

use crate::clock::{Clock, SystemClock};
use crate::keys::{SignatureAlgorithm, SigningKey};
use crate::pkcs12;
use crate::store::{self, CertificateRecord, CertificateStore, ListFilter};
use crate::x509::{
    self, AccessMethod, Certificate, CertificateParams, CrlEntry, CrlParams, DistinguishedName,
    Extension, KeyUsage, Psd2Statement, QcCertificateType, QcStatements,
    QualifiedCertificateRequest, authority_info_access, authority_key_identifier,
    basic_constraints, certificate_policies, crl_distribution_points, extended_key_usage,
    key_usage, oid, random_serial, sign_certificate, sign_crl, subject_key_identifier,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Duration;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Clock-skew tolerance subtracted from notBefore on every certificate.
const BACKDATE_MINUTES: i64 = 5;

/// Result type used by authority APIs.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type used by authority APIs.
#[derive(Debug, Error)]
pub enum Error {
    #[error("certificate {key_id} not found")]
    NotFound { key_id: String },
    #[error("no private key stored for certificate {key_id}")]
    MissingPrivateKey { key_id: String },
    #[error(transparent)]
    X509(#[from] x509::Error),
    #[error(transparent)]
    Keys(#[from] crate::keys::Error),
    #[error(transparent)]
    Store(#[from] store::Error),
    #[error(transparent)]
    Pkcs12(#[from] pkcs12::Error),
    #[error("bootstrap artifact error: {0}")]
    Artifact(#[from] std::io::Error),
}

/// Authority configuration.
#[derive(Debug, Clone)]
pub struct AuthorityConfig {
    /// Domain the authority serves; anchors the CRL and AIA URLs.
    pub issuer_domain: String,
    /// RSA modulus size for generated keys (2048, 3072 or 4096).
    pub key_bits: usize,
    /// Signature algorithm for everything the CA signs.
    pub algorithm: SignatureAlgorithm,
    /// Root CA validity in days.
    pub root_validity_days: i64,
    /// CRL nextUpdate distance in days.
    pub crl_next_update_days: i64,
    /// Passphrase for the root PKCS#12 bootstrap artifact.
    pub pfx_passphrase: Option<String>,
    /// Directory for `ca.cer` / `ca.pfx` bootstrap artifacts.
    pub artifact_path: Option<PathBuf>,
}

impl AuthorityConfig {
    /// Sensible defaults for the given issuer domain: RSA-2048, SHA-256,
    /// a ten-year root and weekly CRLs.
    pub fn new(issuer_domain: impl Into<String>) -> Self {
        Self {
            issuer_domain: issuer_domain.into(),
            key_bits: 2048,
            algorithm: SignatureAlgorithm::Rs256,
            root_validity_days: 3650,
            crl_next_update_days: 7,
            pfx_passphrase: None,
            artifact_path: None,
        }
    }

    fn crl_url(&self) -> String {
        format!("https://{}/.certificates/revoked.crl", self.issuer_domain)
    }

    fn ca_url(&self) -> String {
        format!("https://{}/.certificates/ca.cer", self.issuer_domain)
    }
}

/// A freshly issued certificate with its generated key.
pub struct IssuedCertificate {
    /// The stored record.
    pub record: CertificateRecord,
    /// The parsed certificate.
    pub certificate: Certificate,
    /// The generated private key.
    pub private_key: SigningKey,
}

/// What an export request produced.
#[derive(Debug, Clone)]
pub struct Export {
    /// The exported bytes.
    pub bytes: Vec<u8>,
    /// Media type for the HTTP layer.
    pub media_type: &'static str,
}

/// Export formats for issued certificates.
#[derive(Debug, Clone)]
pub enum ExportFormat {
    /// Raw certificate DER.
    Der,
    /// Certificate PEM.
    Pem,
    /// PKCS#12 archive with the subject key and the CA chain.
    Pkcs12 { password: String },
    /// PKCS#8 private key PEM.
    PrivateKey,
}

/// Media type for a certificate artifact file extension, per the REST
/// surface this authority backs.
pub fn media_type(extension: &str) -> Option<&'static str> {
    match extension {
        "crt" => Some("application/x-x509-user-cert"),
        "cer" => Some("application/pkix-cert"),
        "key" => Some("application/pkcs8"),
        "pfx" => Some("application/x-pkcs12"),
        "pem" => Some("application/x-pem-file"),
        "crl" => Some("application/pkix-crl"),
        _ => None,
    }
}

#[derive(Clone)]
struct Root {
    certificate: Certificate,
    key: SigningKey,
}

/// The certificate authority.
///
/// Generic over the store implementation so the issuing core has no
/// dependency on a database crate. The root CA is created lazily on first
/// use; concurrent callers bootstrap single-flight through a mutex and
/// losers observe the winner's root.
pub struct CertificateAuthority<S: CertificateStore> {
    store: S,
    config: AuthorityConfig,
    clock: Arc<dyn Clock>,
    root: Mutex<Option<Root>>,
}

impl<S: CertificateStore> CertificateAuthority<S> {
    /// Creates an authority on the wall clock.
    pub fn new(store: S, config: AuthorityConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Creates an authority with an injected clock.
    pub fn with_clock(store: S, config: AuthorityConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
            root: Mutex::new(None),
        }
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The root CA certificate in DER, creating the root on first use.
    pub async fn ca_certificate_der(&self) -> Result<Vec<u8>> {
        Ok(self.root().await?.certificate.to_der().to_vec())
    }

    /// The root CA certificate, creating the root on first use.
    pub async fn ca_certificate(&self) -> Result<Certificate> {
        Ok(self.root().await?.certificate)
    }

    /// Issues a qualified certificate for the PSD2 request, signs it with
    /// the root CA and writes it through the store.
    pub async fn issue(&self, request: &QualifiedCertificateRequest) -> Result<IssuedCertificate> {
        request.validate()?;
        let root = self.root().await?;

        let key = SigningKey::generate(self.config.key_bits)?;
        let public = key.public_key();
        let nca = request.nca_identifier();

        let mut subject = DistinguishedName::new()
            .country(request.country.clone())
            .state_or_province(request.state.clone())
            .locality(request.city.clone())
            .organization(request.organization.clone());
        if let Some(unit) = &request.organization_unit {
            subject = subject.organizational_unit(unit.clone());
        }
        subject = subject
            .common_name(request.common_name.clone())
            .organization_identifier(nca.organization_identifier());

        let statements = QcStatements {
            compliance: true,
            sscd: request.qscd,
            qc_type: Some(request.qc_type.qc_type_oid()),
            limit: request.monetary_limit.clone(),
            retention_years: request.retention_years,
            pds_locations: request.pds_locations.clone(),
            psd2: Some(Psd2Statement {
                roles: request.roles,
                nca_name: request.authority_name.clone(),
                nca_id: nca.nca_id(),
            }),
        };

        let mut extensions: Vec<Extension> = vec![
            basic_constraints(false, None),
            key_usage(KeyUsage::DIGITAL_SIGNATURE | KeyUsage::NON_REPUDIATION),
            subject_key_identifier(&public.key_identifier()),
            authority_key_identifier(&root.certificate.computed_key_identifier()),
            certificate_policies(&[request.qc_type.policy_oid()]),
            crl_distribution_points(&[self.config.crl_url()])?,
            authority_info_access(&[(AccessMethod::CaIssuers, self.config.ca_url())])?,
            statements.to_extension()?,
        ];
        if request.qc_type == QcCertificateType::Web {
            extensions.insert(
                2,
                extended_key_usage(&[oid::EKU_SERVER_AUTH, oid::EKU_CLIENT_AUTH]),
            );
        }

        let now = self.clock.now();
        let serial = random_serial()?;
        let certificate = sign_certificate(
            &CertificateParams {
                serial: &serial,
                algorithm: self.config.algorithm,
                issuer: &root.certificate.subject,
                subject: &subject,
                not_before: now - Duration::minutes(BACKDATE_MINUTES),
                not_after: now + Duration::days(request.validity_days as i64),
                subject_key: &public,
                extensions: &extensions,
            },
            &root.key,
        )?;

        let record = self
            .store
            .add(self.record_for(&certificate, Some(&key), false)?)
            .await?;
        tracing::info!(key_id = %record.key_id, subject = %record.subject, "issued qualified certificate");

        Ok(IssuedCertificate {
            record,
            certificate,
            private_key: key,
        })
    }

    /// Fetches a live record by key id.
    pub async fn certificate(&self, key_id: &str) -> Result<CertificateRecord> {
        self.store
            .get_by_id(key_id)
            .await?
            .ok_or_else(|| Error::NotFound {
                key_id: key_id.into(),
            })
    }

    /// Lists records matching the filter.
    pub async fn list(&self, filter: ListFilter) -> Result<Vec<CertificateRecord>> {
        Ok(self.store.list(filter).await?)
    }

    /// Revokes a certificate. A no-op when already revoked.
    pub async fn revoke(&self, key_id: &str) -> Result<()> {
        let at = self.clock.now();
        self.store.revoke(key_id, at).await.map_err(|e| match e {
            store::Error::NotFound { key_id } => Error::NotFound { key_id },
            other => Error::Store(other),
        })?;
        tracing::info!(key_id = %key_id, "revoked certificate");
        Ok(())
    }

    /// Emits a fresh CRL over the store's revocation set, signed by the
    /// root CA.
    pub async fn crl(&self) -> Result<Vec<u8>> {
        let root = self.root().await?;
        let revoked = self.store.revocation_list(None).await?;
        let number = self.store.next_crl_number().await?;

        let mut entries = Vec::with_capacity(revoked.len());
        for row in revoked {
            entries.push(CrlEntry {
                serial: hex::decode(&row.serial_number).map_err(|_| Error::NotFound {
                    key_id: row.serial_number.clone(),
                })?,
                revocation_date: row.revocation_date,
            });
        }

        let this_update = self.clock.now();
        let der = sign_crl(
            &CrlParams {
                issuer: &root.certificate.subject,
                algorithm: self.config.algorithm,
                this_update,
                next_update: this_update + Duration::days(self.config.crl_next_update_days),
                number,
                authority_key_id: &root.certificate.computed_key_identifier(),
                entries: &entries,
            },
            &root.key,
        )?;
        Ok(der)
    }

    /// Exports a stored certificate in the requested format.
    pub async fn export(&self, key_id: &str, format: &ExportFormat) -> Result<Export> {
        let record = self.certificate(key_id).await?;
        let certificate = record.certificate()?;

        let export = match format {
            ExportFormat::Der => Export {
                bytes: certificate.to_der().to_vec(),
                media_type: "application/pkix-cert",
            },
            ExportFormat::Pem => Export {
                bytes: certificate.to_pem().into_bytes(),
                media_type: "application/x-pem-file",
            },
            ExportFormat::PrivateKey => {
                let pem = record.private_key.as_ref().ok_or(Error::MissingPrivateKey {
                    key_id: key_id.into(),
                })?;
                Export {
                    bytes: pem.clone().into_bytes(),
                    media_type: "application/pkcs8",
                }
            }
            ExportFormat::Pkcs12 { password } => {
                let pem = record.private_key.as_ref().ok_or(Error::MissingPrivateKey {
                    key_id: key_id.into(),
                })?;
                let key = SigningKey::from_pkcs8_pem(pem)?;
                let root = self.root().await?;
                let chain: Vec<&[u8]> = if record.is_ca {
                    vec![certificate.to_der()]
                } else {
                    vec![certificate.to_der(), root.certificate.to_der()]
                };
                Export {
                    bytes: pkcs12::encode(password, &chain, &key.to_pkcs8_der()?)?,
                    media_type: "application/x-pkcs12",
                }
            }
        };
        Ok(export)
    }

    /// Returns the cached root, restoring it from the store or the
    /// artifact directory, or creating a fresh one.
    async fn root(&self) -> Result<Root> {
        let mut guard = self.root.lock().await;
        if let Some(root) = guard.as_ref() {
            return Ok(root.clone());
        }

        if let Some(root) = self.load_root_from_store().await? {
            *guard = Some(root.clone());
            return Ok(root);
        }
        if let Some(root) = self.load_root_from_artifacts().await? {
            *guard = Some(root.clone());
            return Ok(root);
        }

        let root = self.create_root().await?;
        *guard = Some(root.clone());
        Ok(root)
    }

    async fn load_root_from_store(&self) -> Result<Option<Root>> {
        let cas = self
            .store
            .list(ListFilter {
                revoked: Some(false),
                ..Default::default()
            })
            .await?;
        for record in cas {
            if !record.is_ca || record.authority_key_id != record.key_id {
                continue;
            }
            let Some(pem) = &record.private_key else {
                continue;
            };
            let certificate = record.certificate()?;
            let key = SigningKey::from_pkcs8_pem(pem)?;
            return Ok(Some(Root { certificate, key }));
        }
        Ok(None)
    }

    async fn load_root_from_artifacts(&self) -> Result<Option<Root>> {
        let (Some(dir), Some(passphrase)) =
            (&self.config.artifact_path, &self.config.pfx_passphrase)
        else {
            return Ok(None);
        };
        let path = dir.join("ca.pfx");
        if !path.exists() {
            return Ok(None);
        }

        let contents = pkcs12::decode(&std::fs::read(&path)?, passphrase)?;
        let certificate = Certificate::from_der(&contents.certificates[0])?;
        let key = SigningKey::from_pkcs8_der(&contents.private_key)?;
        let key_id = hex::encode(certificate.computed_key_identifier());
        tracing::info!(key_id = %key_id, path = %path.display(), "restored root CA from artifact");

        // Re-register the restored root so issuance and CRLs track it.
        let record = self.record_for(&certificate, Some(&key), true)?;
        match self.store.add(record).await {
            Ok(_) | Err(store::Error::DuplicateKeyId { .. }) => {}
            Err(e) => return Err(e.into()),
        }
        Ok(Some(Root { certificate, key }))
    }

    async fn create_root(&self) -> Result<Root> {
        let key = SigningKey::generate(self.config.key_bits)?;
        let public = key.public_key();
        let key_identifier = public.key_identifier();
        let subject = DistinguishedName::new().common_name(self.config.issuer_domain.clone());

        let now = self.clock.now();
        let serial = random_serial()?;
        let certificate = sign_certificate(
            &CertificateParams {
                serial: &serial,
                algorithm: self.config.algorithm,
                issuer: &subject,
                subject: &subject,
                not_before: now - Duration::minutes(BACKDATE_MINUTES),
                not_after: now + Duration::days(self.config.root_validity_days),
                subject_key: &public,
                extensions: &[
                    basic_constraints(true, None),
                    key_usage(
                        KeyUsage::DIGITAL_SIGNATURE
                            | KeyUsage::KEY_CERT_SIGN
                            | KeyUsage::CRL_SIGN,
                    ),
                    subject_key_identifier(&key_identifier),
                    authority_key_identifier(&key_identifier),
                ],
            },
            &key,
        )?;

        let record = self.record_for(&certificate, Some(&key), true)?;
        let key_id = record.key_id.clone();
        self.store.add(record).await?;
        self.write_root_artifacts(&certificate, &key)?;
        tracing::info!(key_id = %key_id, domain = %self.config.issuer_domain, "created root CA");

        Ok(Root { certificate, key })
    }

    fn write_root_artifacts(&self, certificate: &Certificate, key: &SigningKey) -> Result<()> {
        let Some(dir) = &self.config.artifact_path else {
            return Ok(());
        };
        std::fs::create_dir_all(dir)?;
        std::fs::write(dir.join("ca.cer"), certificate.to_der())?;
        if let Some(passphrase) = &self.config.pfx_passphrase {
            let archive =
                pkcs12::encode(passphrase, &[certificate.to_der()], &key.to_pkcs8_der()?)?;
            std::fs::write(dir.join("ca.pfx"), archive)?;
        }
        Ok(())
    }

    fn record_for(
        &self,
        certificate: &Certificate,
        key: Option<&SigningKey>,
        is_ca: bool,
    ) -> Result<CertificateRecord> {
        let key_id = hex::encode(certificate.computed_key_identifier());
        let authority_key_id = certificate
            .authority_key_identifier()?
            .map(hex::encode)
            .unwrap_or_else(|| key_id.clone());
        let private_key = match key {
            Some(key) => Some(key.to_pkcs8_pem()?),
            None => None,
        };
        Ok(CertificateRecord {
            key_id,
            authority_key_id,
            serial_number: hex::encode(&certificate.serial),
            subject: certificate.subject.to_string(),
            thumbprint: hex::encode(certificate.thumbprint()),
            algorithm: certificate.signature_algorithm,
            encoded_certificate: BASE64.encode(certificate.to_der()),
            private_key,
            is_ca,
            revoked: false,
            revocation_date: None,
            created_date: self.clock.now(),
            metadata: serde_json::Value::Null,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::InMemoryCertificateStore;
    use crate::x509::{CertificateList, PspRoles};

    fn request() -> QualifiedCertificateRequest {
        QualifiedCertificateRequest {
            city: "Athens".into(),
            state: "Attica".into(),
            country: "GR".into(),
            organization: "Payments Hellas".into(),
            organization_unit: Some("Open Banking".into()),
            common_name: "api.payments.example".into(),
            authority_id: "BOG".into(),
            authority_name: "Bank of Greece".into(),
            authorization_number: "123456".into(),
            validity_days: 365,
            qc_type: QcCertificateType::Web,
            roles: PspRoles {
                aisp: true,
                pisp: true,
                ..Default::default()
            },
            nca: None,
            monetary_limit: None,
            retention_years: None,
            qscd: false,
            pds_locations: Vec::new(),
        }
    }

    fn authority() -> CertificateAuthority<InMemoryCertificateStore> {
        CertificateAuthority::with_clock(
            InMemoryCertificateStore::new(),
            AuthorityConfig::new("ca.example.com"),
            Arc::new(FixedClock::at_unix(1_770_000_000)),
        )
    }

    // Tests root CA creation and its PEM re-import: CA flag, key usage and
    // the ten-year window must survive the round trip.
    #[tokio::test]
    async fn test_root_ca_profile() {
        let authority = authority();
        let der = authority.ca_certificate_der().await.unwrap();
        let root = Certificate::from_der(&der).unwrap();

        let reimported = Certificate::from_pem(&root.to_pem()).unwrap();
        assert!(reimported.is_ca().unwrap());
        let usage = reimported.key_usage().unwrap().unwrap();
        assert!(usage.contains(
            KeyUsage::DIGITAL_SIGNATURE | KeyUsage::KEY_CERT_SIGN | KeyUsage::CRL_SIGN
        ));
        assert!(reimported.not_after - reimported.not_before >= Duration::days(3650));

        // Self-signed: SKI equals AKI equals the computed key id.
        let ski = reimported.subject_key_identifier().unwrap().unwrap();
        let aki = reimported.authority_key_identifier().unwrap().unwrap();
        assert_eq!(ski, aki);
        assert_eq!(ski, reimported.computed_key_identifier());
        reimported
            .verify_signature(&reimported.public_key().unwrap())
            .unwrap();
    }

    // Tests that the root is created once: repeated and concurrent callers
    // observe the same CA.
    #[tokio::test]
    async fn test_root_single_flight() {
        let authority = Arc::new(authority());
        let first = {
            let authority = Arc::clone(&authority);
            tokio::spawn(async move { authority.ca_certificate_der().await.unwrap() })
        };
        let second = {
            let authority = Arc::clone(&authority);
            tokio::spawn(async move { authority.ca_certificate_der().await.unwrap() })
        };
        let (first, second) = (first.await.unwrap(), second.await.unwrap());
        assert_eq!(first, second);

        let cas = authority
            .list(ListFilter::default())
            .await
            .unwrap()
            .into_iter()
            .filter(|record| record.is_ca)
            .count();
        assert_eq!(cas, 1);
    }

    // Tests issuing a PSD2 certificate: chain binding, QcStatements
    // content, distribution URLs and the store record.
    #[tokio::test]
    async fn test_issue_qualified_certificate() {
        let authority = authority();
        let issued = authority.issue(&request()).await.unwrap();
        let root = authority.ca_certificate().await.unwrap();

        // Chain: AKI references the root SKI and the signature checks out.
        let aki = issued.certificate.authority_key_identifier().unwrap().unwrap();
        assert_eq!(aki, root.computed_key_identifier());
        issued
            .certificate
            .verify_signature(&root.public_key().unwrap())
            .unwrap();

        // Qualified statements: compliance, type and the PSD2 roles.
        let statements = issued.certificate.qc_statements().unwrap().unwrap();
        assert!(statements.compliance);
        assert_eq!(statements.qc_type, Some(oid::QC_TYPE_WEB));
        let psd2 = statements.psd2.unwrap();
        assert!(psd2.roles.aisp && psd2.roles.pisp);
        assert!(!psd2.roles.aspsp && !psd2.roles.piisp);
        assert_eq!(psd2.nca_name, "Bank of Greece");
        assert_eq!(psd2.nca_id, "GR-BOG");

        // The PSD2-carrying qcStatements extension must be critical.
        let ext = issued
            .certificate
            .extension(&oid::QC_STATEMENTS)
            .unwrap();
        assert!(ext.critical);

        // Distribution URLs anchor at the issuer domain.
        assert_eq!(
            issued.certificate.crl_distribution_uris().unwrap(),
            vec!["https://ca.example.com/.certificates/revoked.crl".to_string()]
        );
        assert!(issued.record.subject.contains("PSDGR-BOG-123456"));

        // Store record invariants.
        assert_eq!(
            issued.record.key_id,
            hex::encode(issued.certificate.computed_key_identifier())
        );
        assert!(!issued.record.is_ca);
        assert!(issued.record.private_key.is_some());
        assert!(
            authority
                .certificate(&issued.record.key_id)
                .await
                .is_ok()
        );
    }

    // Tests revocation and the emitted CRL: signed by the CA, windowed,
    // and carrying the revoked serial exactly once.
    #[tokio::test]
    async fn test_revoke_and_crl() {
        let authority = authority();
        let issued = authority.issue(&request()).await.unwrap();
        let root = authority.ca_certificate().await.unwrap();

        authority.revoke(&issued.record.key_id).await.unwrap();
        // Idempotent.
        authority.revoke(&issued.record.key_id).await.unwrap();
        assert!(matches!(
            authority.certificate(&issued.record.key_id).await,
            Err(Error::NotFound { .. })
        ));

        let crl = CertificateList::from_der(&authority.crl().await.unwrap()).unwrap();
        crl.verify_signature(&root.public_key().unwrap()).unwrap();
        assert_eq!(crl.occurrences(&issued.certificate.serial), 1);
        assert_eq!(crl.number, Some(1));

        let now = chrono::DateTime::from_timestamp(1_770_000_000, 0).unwrap();
        assert!(crl.this_update <= now);
        assert!(crl.next_update.unwrap() >= now);

        // The next CRL carries a larger number.
        let second = CertificateList::from_der(&authority.crl().await.unwrap()).unwrap();
        assert_eq!(second.number, Some(2));

        assert!(matches!(
            authority.revoke("ffffffff").await,
            Err(Error::NotFound { .. })
        ));
    }

    // Tests every export format round trip.
    #[tokio::test]
    async fn test_exports() {
        let authority = authority();
        let issued = authority.issue(&request()).await.unwrap();
        let key_id = &issued.record.key_id;

        let der = authority.export(key_id, &ExportFormat::Der).await.unwrap();
        assert_eq!(der.bytes, issued.certificate.to_der());
        assert_eq!(der.media_type, "application/pkix-cert");

        let pem = authority.export(key_id, &ExportFormat::Pem).await.unwrap();
        let reparsed = Certificate::from_pem(std::str::from_utf8(&pem.bytes).unwrap()).unwrap();
        assert_eq!(reparsed.to_der(), issued.certificate.to_der());

        let key = authority
            .export(key_id, &ExportFormat::PrivateKey)
            .await
            .unwrap();
        SigningKey::from_pkcs8_pem(std::str::from_utf8(&key.bytes).unwrap()).unwrap();

        let pfx = authority
            .export(
                key_id,
                &ExportFormat::Pkcs12 {
                    password: "hunter2".into(),
                },
            )
            .await
            .unwrap();
        let contents = pkcs12::decode(&pfx.bytes, "hunter2").unwrap();
        assert_eq!(contents.certificates.len(), 2);
        assert_eq!(contents.certificates[0], issued.certificate.to_der());
    }

    // Tests the on-disk bootstrap artifacts: a second authority pointed
    // at the same directory restores the same root instead of minting a
    // new one.
    #[tokio::test]
    async fn test_artifact_bootstrap() {
        let dir = std::env::temp_dir().join(format!("qwac-artifacts-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let mut config = AuthorityConfig::new("ca.example.com");
        config.pfx_passphrase = Some("hunter2".into());
        config.artifact_path = Some(dir.clone());

        let first = CertificateAuthority::with_clock(
            InMemoryCertificateStore::new(),
            config.clone(),
            Arc::new(FixedClock::at_unix(1_770_000_000)),
        );
        let created = first.ca_certificate_der().await.unwrap();
        assert!(dir.join("ca.cer").exists());
        assert!(dir.join("ca.pfx").exists());

        // Fresh store, same artifacts: the root is restored, not minted.
        let second = CertificateAuthority::with_clock(
            InMemoryCertificateStore::new(),
            config,
            Arc::new(FixedClock::at_unix(1_770_000_000)),
        );
        let restored = second.ca_certificate_der().await.unwrap();
        assert_eq!(restored, created);

        // The restored root is registered in the new store.
        let records = second.list(ListFilter::default()).await.unwrap();
        assert!(records.iter().any(|record| record.is_ca));

        let _ = std::fs::remove_dir_all(&dir);
    }

    // Tests the extension-to-media-type table.
    #[test]
    fn test_media_types() {
        assert_eq!(media_type("cer"), Some("application/pkix-cert"));
        assert_eq!(media_type("crt"), Some("application/x-x509-user-cert"));
        assert_eq!(media_type("key"), Some("application/pkcs8"));
        assert_eq!(media_type("pfx"), Some("application/x-pkcs12"));
        assert_eq!(media_type("pem"), Some("application/x-pem-file"));
        assert_eq!(media_type("crl"), Some("application/pkix-crl"));
        assert_eq!(media_type("exe"), None);
    }
}
