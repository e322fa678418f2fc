//! Certificate Revocation List checks.
//!
//! Absence from the list means the certificate is not revoked. The list's
//! signature is not verified here; its freshness (nextUpdate) is.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use openssl::asn1::Asn1TimeRef;
use openssl::x509::{ReasonCode, X509Crl, X509CrlRef, X509RevokedRef};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::certificate::{pem_block, Certificate, SerialNumber};
use crate::error::{CertStatusError, Result};
use crate::fetcher::Fetcher;
use crate::status::{
    format_time, parse_openssl_time, CertStatus, Protocol, RevocationReason, RevocationStatus,
};

/// What to do when a CRL is past its nextUpdate.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CrlFreshness {
    /// Log a warning and use the list anyway
    #[default]
    Warn,
    /// Fail the check
    Strict,
}

/// One revoked-certificate entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokedEntry {
    pub serial: SerialNumber,
    pub revoked_at: DateTime<Utc>,
    pub reason: Option<RevocationReason>,
}

/// A decoded revocation list, kept only for the duration of one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationList {
    pub this_update: DateTime<Utc>,
    pub next_update: Option<DateTime<Utc>>,
    pub entries: Vec<RevokedEntry>,
}

impl RevocationList {
    /// Decodes a DER CertificateList, or a PEM `X509 CRL` block.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let crl = match pem_block(bytes) {
            Some(block) => X509Crl::from_pem(block),
            None => X509Crl::from_der(bytes),
        }
        .map_err(|e| CertStatusError::crl_parse(e.to_string()))?;
        Self::from_crl(&crl)
    }

    pub fn from_crl(crl: &X509CrlRef) -> Result<Self> {
        let this_update = crl_time(crl.last_update())?;
        let next_update = crl.next_update().map(crl_time).transpose()?;
        let entries = match crl.get_revoked() {
            Some(revoked) => revoked.iter().map(revoked_entry).collect::<Result<_>>()?,
            None => Vec::new(),
        };

        Ok(RevocationList {
            this_update,
            next_update,
            entries,
        })
    }

    /// Linear search by numeric serial number.
    pub fn find(&self, serial: &SerialNumber) -> Option<&RevokedEntry> {
        self.entries.iter().find(|entry| &entry.serial == serial)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.next_update.map_or(false, |next| next < now)
    }
}

fn crl_time(time: &Asn1TimeRef) -> Result<DateTime<Utc>> {
    parse_openssl_time(&time.to_string()).map_err(|e| CertStatusError::crl_parse(e.to_string()))
}

fn revoked_entry(revoked: &X509RevokedRef) -> Result<RevokedEntry> {
    let reason = revoked
        .extension::<ReasonCode>()
        .map_err(|e| CertStatusError::crl_parse(format!("bad reason code: {}", e)))?
        .and_then(|(_, code)| code.get_i64().ok())
        .and_then(RevocationReason::from_code);

    Ok(RevokedEntry {
        serial: SerialNumber::from_asn1(revoked.serial_number())
            .map_err(|e| CertStatusError::crl_parse(e.to_string()))?,
        revoked_at: crl_time(revoked.revocation_date())?,
        reason,
    })
}

/// First CRL distribution point URL of `cert`.
pub fn distribution_point(cert: &Certificate) -> Result<String> {
    cert.crl_distribution_points()
        .into_iter()
        .next()
        .ok_or(CertStatusError::NoCrlDistributionPointsFound)
}

/// Applies the freshness policy to `list` as of `now`.
pub fn check_freshness(
    list: &RevocationList,
    freshness: CrlFreshness,
    now: DateTime<Utc>,
) -> Result<()> {
    let Some(next_update) = list.next_update.filter(|_| list.is_expired_at(now)) else {
        return Ok(());
    };
    match freshness {
        CrlFreshness::Warn => {
            warn!(next_update = %format_time(&next_update), "CRL is past its next update");
            Ok(())
        }
        CrlFreshness::Strict => Err(CertStatusError::CrlExpired {
            next_update: format_time(&next_update),
        }),
    }
}

/// Downloads the certificate's CRL and looks up its serial number.
pub fn check_crl<F: Fetcher>(
    fetcher: &F,
    cert: &Certificate,
    freshness: CrlFreshness,
) -> Result<RevocationStatus> {
    let url = distribution_point(cert)?;
    debug!(url = url.as_str(), subject = %cert.subject(), "downloading CRL");

    let bytes = fetcher.get(&url)?;
    let list = RevocationList::from_bytes(&bytes)?;
    check_freshness(&list, freshness, Utc::now())?;

    let serial = cert.serial_number()?;
    debug!(entries = list.entries.len(), serial = %serial, "searching CRL");
    let status = match list.find(&serial) {
        Some(entry) => CertStatus::Revoked {
            revoked_at: entry.revoked_at,
            reason: entry.reason,
        },
        None => CertStatus::Good,
    };

    info!(serial = %serial, status = %status, "CRL status");
    Ok(RevocationStatus::new(serial, Protocol::Crl, status))
}
