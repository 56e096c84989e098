// qwac-rs: PSD2 qualified certificates and HTTP message signing
// Copyright 2026 Dark Bio AG. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Certificate store abstraction.
//!
//! The authority persists issued certificates through this trait and the
//! CRL generator reads revocations back out of it. Implementations are
//! expected to provide linearizable reads and serialized writes; the
//! bundled in-memory store does and doubles as the test double.

use crate::x509::{self, Certificate};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use thiserror::Error;

/// Result type used by store APIs.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type used by store APIs.
#[derive(Debug, Error)]
pub enum Error {
    #[error("certificate {key_id} already exists")]
    DuplicateKeyId { key_id: String },
    #[error("certificate {key_id} not found")]
    NotFound { key_id: String },
    #[error("certificate store unavailable: {details}")]
    Unavailable { details: String },
}

/// One stored certificate.
///
/// `key_id` is the hex SHA-1 of the subjectPublicKey bits and is the
/// primary key; `authority_key_id` references the issuer the same way (a
/// self-signed root references itself). The private key is only present
/// when this process generated it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRecord {
    /// Hex key identifier, unique per store.
    pub key_id: String,
    /// Hex key identifier of the issuer.
    pub authority_key_id: String,
    /// Hex serial number magnitude.
    pub serial_number: String,
    /// RFC 2253 subject string.
    pub subject: String,
    /// Hex SHA-1 of the certificate DER.
    pub thumbprint: String,
    /// Signature algorithm of the certificate.
    pub algorithm: crate::keys::SignatureAlgorithm,
    /// Base64 certificate DER.
    pub encoded_certificate: String,
    /// PEM private key, when the store owns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    /// Whether the certificate is a CA.
    pub is_ca: bool,
    /// Whether the certificate has been revoked. One-way.
    pub revoked: bool,
    /// When the certificate was revoked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_date: Option<DateTime<Utc>>,
    /// When the record was created.
    pub created_date: DateTime<Utc>,
    /// Opaque caller metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl CertificateRecord {
    /// Decodes the stored certificate.
    pub fn certificate(&self) -> x509::Result<Certificate> {
        let der = BASE64
            .decode(&self.encoded_certificate)
            .map_err(|e| x509::Error::InvalidBase64 {
                details: e.to_string(),
            })?;
        Certificate::from_der(&der)
    }
}

/// Filters for [`CertificateStore::list`].
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Only records created at or after this time.
    pub not_before: Option<DateTime<Utc>>,
    /// Only revoked (`true`) or only live (`false`) records.
    pub revoked: Option<bool>,
    /// Only records issued by this authority key id.
    pub authority_key_id: Option<String>,
}

/// One row of the revocation set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokedSerial {
    /// Hex serial number magnitude.
    pub serial_number: String,
    /// When the certificate was revoked.
    pub revocation_date: DateTime<Utc>,
}

/// Persistent certificate storage.
///
/// Generic over the backing store so the authority has no dependency on a
/// database crate.
pub trait CertificateStore: Send + Sync {
    /// Stores a new record. Fails with [`Error::DuplicateKeyId`] when the
    /// key id is already present.
    fn add(
        &self,
        record: CertificateRecord,
    ) -> impl Future<Output = Result<CertificateRecord>> + Send;

    /// Fetches a record by key id. Revoked records are hidden; observe
    /// them through [`CertificateStore::list`] with `revoked = true`.
    fn get_by_id(
        &self,
        key_id: &str,
    ) -> impl Future<Output = Result<Option<CertificateRecord>>> + Send;

    /// Lists records matching the filter.
    fn list(
        &self,
        filter: ListFilter,
    ) -> impl Future<Output = Result<Vec<CertificateRecord>>> + Send;

    /// The serials of all revoked certificates, optionally restricted to
    /// revocations at or after `not_before`.
    fn revocation_list(
        &self,
        not_before: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<Vec<RevokedSerial>>> + Send;

    /// Marks a record revoked at `at`. A no-op when already revoked;
    /// fails with [`Error::NotFound`] for unknown key ids.
    fn revoke(&self, key_id: &str, at: DateTime<Utc>) -> impl Future<Output = Result<()>> + Send;

    /// Returns the next value of the monotonically increasing CRL number.
    fn next_crl_number(&self) -> impl Future<Output = Result<u64>> + Send;
}

/// In-memory [`CertificateStore`] backed by a mutex.
#[derive(Default)]
pub struct InMemoryCertificateStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    records: HashMap<String, CertificateRecord>,
    insertion: Vec<String>,
    crl_number: u64,
}

impl InMemoryCertificateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| Error::Unavailable {
            details: "store mutex poisoned".into(),
        })
    }
}

impl CertificateStore for InMemoryCertificateStore {
    fn add(
        &self,
        record: CertificateRecord,
    ) -> impl Future<Output = Result<CertificateRecord>> + Send {
        let result = (|| {
            let mut inner = self.lock()?;
            if inner.records.contains_key(&record.key_id) {
                return Err(Error::DuplicateKeyId {
                    key_id: record.key_id.clone(),
                });
            }
            inner.insertion.push(record.key_id.clone());
            inner.records.insert(record.key_id.clone(), record.clone());
            Ok(record)
        })();
        std::future::ready(result)
    }

    fn get_by_id(
        &self,
        key_id: &str,
    ) -> impl Future<Output = Result<Option<CertificateRecord>>> + Send {
        let result = (|| {
            let inner = self.lock()?;
            Ok(inner
                .records
                .get(key_id)
                .filter(|record| !record.revoked)
                .cloned())
        })();
        std::future::ready(result)
    }

    fn list(
        &self,
        filter: ListFilter,
    ) -> impl Future<Output = Result<Vec<CertificateRecord>>> + Send {
        let result = (|| {
            let inner = self.lock()?;
            let records = inner
                .insertion
                .iter()
                .filter_map(|key_id| inner.records.get(key_id))
                .filter(|record| match filter.not_before {
                    Some(not_before) => record.created_date >= not_before,
                    None => true,
                })
                .filter(|record| match filter.revoked {
                    Some(revoked) => record.revoked == revoked,
                    None => true,
                })
                .filter(|record| match &filter.authority_key_id {
                    Some(authority) => &record.authority_key_id == authority,
                    None => true,
                })
                .cloned()
                .collect();
            Ok(records)
        })();
        std::future::ready(result)
    }

    fn revocation_list(
        &self,
        not_before: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<Vec<RevokedSerial>>> + Send {
        let result = (|| {
            let inner = self.lock()?;
            let serials = inner
                .insertion
                .iter()
                .filter_map(|key_id| inner.records.get(key_id))
                .filter(|record| record.revoked)
                .filter_map(|record| {
                    let revocation_date = record.revocation_date?;
                    if let Some(not_before) = not_before {
                        if revocation_date < not_before {
                            return None;
                        }
                    }
                    Some(RevokedSerial {
                        serial_number: record.serial_number.clone(),
                        revocation_date,
                    })
                })
                .collect();
            Ok(serials)
        })();
        std::future::ready(result)
    }

    fn revoke(&self, key_id: &str, at: DateTime<Utc>) -> impl Future<Output = Result<()>> + Send {
        let result = (|| {
            let mut inner = self.lock()?;
            let record = inner.records.get_mut(key_id).ok_or_else(|| Error::NotFound {
                key_id: key_id.into(),
            })?;
            if !record.revoked {
                record.revoked = true;
                record.revocation_date = Some(at);
            }
            Ok(())
        })();
        std::future::ready(result)
    }

    fn next_crl_number(&self) -> impl Future<Output = Result<u64>> + Send {
        let result = (|| {
            let mut inner = self.lock()?;
            inner.crl_number += 1;
            Ok(inner.crl_number)
        })();
        std::future::ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(key_id: &str, authority: &str, created: DateTime<Utc>) -> CertificateRecord {
        CertificateRecord {
            key_id: key_id.into(),
            authority_key_id: authority.into(),
            serial_number: format!("serial-{key_id}"),
            subject: format!("CN={key_id}"),
            thumbprint: format!("thumb-{key_id}"),
            algorithm: crate::keys::SignatureAlgorithm::Rs256,
            encoded_certificate: String::new(),
            private_key: None,
            is_ca: false,
            revoked: false,
            revocation_date: None,
            created_date: created,
            metadata: serde_json::Value::Null,
        }
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 0, 0, 0).unwrap()
    }

    // Tests the uniqueness contract of add.
    #[tokio::test]
    async fn test_add_rejects_duplicates() {
        let store = InMemoryCertificateStore::new();
        store.add(record("a", "root", at(1))).await.unwrap();
        assert!(matches!(
            store.add(record("a", "root", at(2))).await,
            Err(Error::DuplicateKeyId { .. })
        ));
    }

    // Tests that get_by_id hides revoked records while list can still
    // observe them.
    #[tokio::test]
    async fn test_get_hides_revoked() {
        let store = InMemoryCertificateStore::new();
        store.add(record("a", "root", at(1))).await.unwrap();
        assert!(store.get_by_id("a").await.unwrap().is_some());

        store.revoke("a", at(2)).await.unwrap();
        assert!(store.get_by_id("a").await.unwrap().is_none());

        let revoked = store
            .list(ListFilter {
                revoked: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(revoked.len(), 1);
        assert_eq!(revoked[0].revocation_date, Some(at(2)));
    }

    // Tests revoke idempotence: the second call must not move the
    // revocation date.
    #[tokio::test]
    async fn test_revoke_idempotent() {
        let store = InMemoryCertificateStore::new();
        store.add(record("a", "root", at(1))).await.unwrap();
        store.revoke("a", at(2)).await.unwrap();
        store.revoke("a", at(9)).await.unwrap();

        let revoked = store.revocation_list(None).await.unwrap();
        assert_eq!(revoked.len(), 1);
        assert_eq!(revoked[0].revocation_date, at(2));

        assert!(matches!(
            store.revoke("missing", at(2)).await,
            Err(Error::NotFound { .. })
        ));
    }

    // Tests the list filters individually and stacked.
    #[tokio::test]
    async fn test_list_filters() {
        let store = InMemoryCertificateStore::new();
        store.add(record("a", "root", at(1))).await.unwrap();
        store.add(record("b", "root", at(5))).await.unwrap();
        store.add(record("c", "other", at(9))).await.unwrap();
        store.revoke("b", at(6)).await.unwrap();

        let all = store.list(ListFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let recent = store
            .list(ListFilter {
                not_before: Some(at(5)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(recent.len(), 2);

        let live_by_root = store
            .list(ListFilter {
                revoked: Some(false),
                authority_key_id: Some("root".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(live_by_root.len(), 1);
        assert_eq!(live_by_root[0].key_id, "a");
    }

    // Tests revocation_list time filtering.
    #[tokio::test]
    async fn test_revocation_list_window() {
        let store = InMemoryCertificateStore::new();
        store.add(record("a", "root", at(1))).await.unwrap();
        store.add(record("b", "root", at(1))).await.unwrap();
        store.revoke("a", at(2)).await.unwrap();
        store.revoke("b", at(8)).await.unwrap();

        let all = store.revocation_list(None).await.unwrap();
        assert_eq!(all.len(), 2);

        let late = store.revocation_list(Some(at(5))).await.unwrap();
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].serial_number, "serial-b");
    }

    // Tests the CRL counter monotonicity.
    #[tokio::test]
    async fn test_crl_number_monotonic() {
        let store = InMemoryCertificateStore::new();
        assert_eq!(store.next_crl_number().await.unwrap(), 1);
        assert_eq!(store.next_crl_number().await.unwrap(), 2);
        assert_eq!(store.next_crl_number().await.unwrap(), 3);
    }
}
