// qwac-rs: PSD2 qualified certificates and HTTP message signing
// Copyright 2026 Dark Bio AG. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Request model for qualified certificate issuance.

use super::{Error, Result, oid};
use const_oid::ObjectIdentifier;
use serde::{Deserialize, Serialize};

/// The ETSI qualified certificate type requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QcCertificateType {
    /// Qualified certificate for electronic signatures (natural persons).
    #[serde(rename = "eSign")]
    ESign,
    /// Qualified certificate for electronic seals (legal persons).
    #[serde(rename = "eSeal")]
    ESeal,
    /// Qualified website authentication certificate.
    Web,
}

impl QcCertificateType {
    /// The QcType statement child OID for this certificate type.
    pub fn qc_type_oid(&self) -> ObjectIdentifier {
        match self {
            QcCertificateType::ESign => oid::QC_TYPE_ESIGN,
            QcCertificateType::ESeal => oid::QC_TYPE_ESEAL,
            QcCertificateType::Web => oid::QC_TYPE_WEB,
        }
    }

    /// The ETSI EN 319 411-2 certificate policy for this certificate type.
    pub fn policy_oid(&self) -> ObjectIdentifier {
        match self {
            QcCertificateType::ESign => oid::QCP_NATURAL,
            QcCertificateType::ESeal => oid::QCP_LEGAL,
            QcCertificateType::Web => oid::QCP_WEB,
        }
    }
}

/// The PSD2 payment service provider roles granted by the NCA.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PspRoles {
    /// Account information service provider.
    pub aisp: bool,
    /// Payment initiation service provider.
    pub pisp: bool,
    /// Account servicing payment service provider.
    pub aspsp: bool,
    /// Payment instrument issuing service provider.
    pub piisp: bool,
}

impl PspRoles {
    /// Whether any role is granted.
    pub fn any(&self) -> bool {
        self.aisp || self.pisp || self.aspsp || self.piisp
    }

    /// The (OID, name) pairs of the granted roles, in the TS 119 495
    /// registry order.
    pub fn granted(&self) -> Vec<(ObjectIdentifier, &'static str)> {
        let mut roles = Vec::new();
        if self.aspsp {
            roles.push((oid::PSP_AS, "PSP_AS"));
        }
        if self.pisp {
            roles.push((oid::PSP_PI, "PSP_PI"));
        }
        if self.aisp {
            roles.push((oid::PSP_AI, "PSP_AI"));
        }
        if self.piisp {
            roles.push((oid::PSP_IC, "PSP_IC"));
        }
        roles
    }

    /// Builds the role set from TS 119 495 role names.
    pub fn from_names(names: &[String]) -> Result<Self> {
        let mut roles = PspRoles::default();
        for name in names {
            match name.as_str() {
                "PSP_AS" => roles.aspsp = true,
                "PSP_PI" => roles.pisp = true,
                "PSP_AI" => roles.aisp = true,
                "PSP_IC" => roles.piisp = true,
                other => {
                    return Err(Error::UnknownPspRole { name: other.into() });
                }
            }
        }
        Ok(roles)
    }
}

/// The national competent authority registration reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NcaIdentifier {
    /// Registration scheme, three letters (`PSD` for PSD2).
    pub prefix: String,
    /// ISO 3166 alpha-2 country of the authority.
    pub country: String,
    /// NCA short code (for example `BOG` for the Bank of Greece).
    pub nca: String,
    /// The provider's authorization number in the NCA register.
    pub authorization_number: String,
}

impl NcaIdentifier {
    /// The CA/Browser Forum subject organizationIdentifier value:
    /// `{scheme}{country}-{NCA}-{number}`.
    pub fn organization_identifier(&self) -> String {
        format!(
            "{}{}-{}-{}",
            self.prefix, self.country, self.nca, self.authorization_number
        )
    }

    /// The TS 119 495 NCAId statement value: `{country}-{NCA}`.
    pub fn nca_id(&self) -> String {
        format!("{}-{}", self.country, self.nca)
    }
}

/// A transaction value limit recorded in the QcLimitValue statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonetaryLimit {
    /// ISO 4217 currency code.
    pub currency: String,
    /// Limit amount in whole currency units.
    pub value: u64,
}

/// A PKI disclosure statement location for the QcPDS statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdsLocation {
    /// ISO 639-1 language of the statement.
    pub language: String,
    /// Location of the statement.
    pub url: String,
}

/// Everything needed to issue a PSD2 qualified certificate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualifiedCertificateRequest {
    /// Subject locality.
    pub city: String,
    /// Subject state or province.
    pub state: String,
    /// Subject country, ISO 3166 alpha-2.
    pub country: String,
    /// Subject organization.
    pub organization: String,
    /// Subject organizational unit.
    #[serde(default)]
    pub organization_unit: Option<String>,
    /// Subject common name, at most 64 characters.
    pub common_name: String,
    /// NCA short code used when no explicit NCA identifier is given.
    pub authority_id: String,
    /// Human-readable NCA name for the PSD2 statement.
    pub authority_name: String,
    /// The provider's authorization number in the NCA register.
    pub authorization_number: String,
    /// Requested validity in days, at least one.
    pub validity_days: u32,
    /// Qualified certificate type.
    pub qc_type: QcCertificateType,
    /// Granted PSP roles; at least one must be set.
    pub roles: PspRoles,
    /// Explicit NCA registration reference; derived from `authority_id`,
    /// `country` and `authorization_number` when absent.
    #[serde(default)]
    pub nca: Option<NcaIdentifier>,
    /// Optional transaction value limit.
    #[serde(default)]
    pub monetary_limit: Option<MonetaryLimit>,
    /// Optional material retention period in years.
    #[serde(default)]
    pub retention_years: Option<u32>,
    /// Whether the private key resides on a qualified device.
    #[serde(default)]
    pub qscd: bool,
    /// PKI disclosure statement locations.
    #[serde(default)]
    pub pds_locations: Vec<PdsLocation>,
}

impl QualifiedCertificateRequest {
    /// Checks the request invariants before any key material is touched.
    pub fn validate(&self) -> Result<()> {
        if self.country.len() != 2 || !self.country.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(Error::InvalidCountryCode {
                value: self.country.clone(),
            });
        }
        if !self.roles.any() {
            return Err(Error::MissingPspRole);
        }
        if self.validity_days < 1 {
            return Err(Error::InvalidValidityDays);
        }
        if self.authorization_number.is_empty() {
            return Err(Error::EmptyAuthorizationNumber);
        }
        let length = self.common_name.chars().count();
        if length > 64 {
            return Err(Error::CommonNameTooLong { length });
        }
        Ok(())
    }

    /// The effective NCA registration reference, explicit or derived.
    pub fn nca_identifier(&self) -> NcaIdentifier {
        self.nca.clone().unwrap_or_else(|| NcaIdentifier {
            prefix: "PSD".into(),
            country: self.country.clone(),
            nca: self.authority_id.clone(),
            authorization_number: self.authorization_number.clone(),
        })
    }
}
