//! The revocation status shared by the OCSP and CRL checkers.
//!
//! A [`RevocationStatus`] is built once per check and never changed afterwards.
//! The revocation time and reason live inside [`CertStatus::Revoked`], so they
//! cannot be present on any other status.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use strum_macros::EnumIter;

use crate::certificate::SerialNumber;
use crate::error::{CertStatusError, Result};

/// Layout used for every timestamp in the text report.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z UTC";

/// Which protocol produced a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[strum(serialize = "OCSP")]
    Ocsp,
    #[strum(serialize = "CRL")]
    Crl,
}

/// CRLReason codes from RFC 5280 section 5.3.1. Code 7 is unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, EnumIter)]
#[serde(rename_all = "camelCase")]
pub enum RevocationReason {
    Unspecified,
    KeyCompromise,
    CaCompromise,
    AffiliationChanged,
    Superseded,
    CessationOfOperation,
    CertificateHold,
    RemoveFromCrl,
    PrivilegeWithdrawn,
    AaCompromise,
}

impl RevocationReason {
    /// Maps a wire reason code, returning `None` for codes RFC 5280 does not assign.
    pub fn from_code(code: i64) -> Option<Self> {
        let reason = match code {
            0 => Self::Unspecified,
            1 => Self::KeyCompromise,
            2 => Self::CaCompromise,
            3 => Self::AffiliationChanged,
            4 => Self::Superseded,
            5 => Self::CessationOfOperation,
            6 => Self::CertificateHold,
            8 => Self::RemoveFromCrl,
            9 => Self::PrivilegeWithdrawn,
            10 => Self::AaCompromise,
            _ => return None,
        };
        Some(reason)
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Unspecified => 0,
            Self::KeyCompromise => 1,
            Self::CaCompromise => 2,
            Self::AffiliationChanged => 3,
            Self::Superseded => 4,
            Self::CessationOfOperation => 5,
            Self::CertificateHold => 6,
            Self::RemoveFromCrl => 8,
            Self::PrivilegeWithdrawn => 9,
            Self::AaCompromise => 10,
        }
    }

    /// Human-readable name used on the `Reason:` line.
    pub fn message(self) -> &'static str {
        match self {
            Self::Unspecified => "Unspecified",
            Self::KeyCompromise => "Key compromise",
            Self::CaCompromise => "CA compromise",
            Self::AffiliationChanged => "Affiliation changed",
            Self::Superseded => "Superseded",
            Self::CessationOfOperation => "Cessation of operation",
            Self::CertificateHold => "Certificate hold",
            Self::RemoveFromCrl => "Remove from CRL",
            Self::PrivilegeWithdrawn => "Privilege withdrawn",
            Self::AaCompromise => "AA compromise",
        }
    }
}

impl fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Normalized certificate status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CertStatus {
    Good,
    Revoked {
        revoked_at: DateTime<Utc>,
        reason: Option<RevocationReason>,
    },
    Unknown,
    /// The responder answered but could not produce a status (internalError / tryLater).
    ServerFailed,
}

impl CertStatus {
    /// Name used on the `Status:` line.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Revoked { .. } => "Revoked",
            Self::Unknown => "Unknown",
            Self::ServerFailed => "Server failed",
        }
    }

    pub fn is_revoked(&self) -> bool {
        matches!(self, Self::Revoked { .. })
    }
}

impl fmt::Display for CertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Validity window reported by an OCSP responder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseValidity {
    pub produced_at: DateTime<Utc>,
    pub this_update: DateTime<Utc>,
    pub next_update: Option<DateTime<Utc>>,
}

/// Result of one revocation check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevocationStatus {
    pub serial_number: SerialNumber,
    pub protocol: Protocol,
    #[serde(flatten)]
    pub status: CertStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validity: Option<ResponseValidity>,
}

impl RevocationStatus {
    pub fn new(serial_number: SerialNumber, protocol: Protocol, status: CertStatus) -> Self {
        RevocationStatus {
            serial_number,
            protocol,
            status,
            validity: None,
        }
    }

    pub fn with_validity(mut self, validity: ResponseValidity) -> Self {
        self.validity = Some(validity);
        self
    }

    /// Renders the canonical text report.
    ///
    /// ```text
    /// Serial number: <decimal serial>
    ///
    /// Status: <Good|Revoked|Unknown|Server failed>
    /// Reason: <reason>                -- revoked, reason known
    /// Revoked at: <time>              -- revoked
    ///
    /// Produced at: <time>             -- OCSP only
    /// This update: <time>
    /// Next update: <time>             -- when the responder supplied one
    /// ```
    pub fn to_report_text(&self) -> String {
        let mut text = format!(
            "Serial number: {}\n\nStatus: {}\n",
            self.serial_number,
            self.status.name()
        );

        if let CertStatus::Revoked { revoked_at, reason } = &self.status {
            if let Some(reason) = reason {
                text.push_str(&format!("Reason: {}\n", reason));
            }
            text.push_str(&format!("Revoked at: {}\n", format_time(revoked_at)));
        }

        if let Some(validity) = &self.validity {
            text.push_str(&format!(
                "\nProduced at: {}\n",
                format_time(&validity.produced_at)
            ));
            text.push_str(&format!(
                "This update: {}\n",
                format_time(&validity.this_update)
            ));
            if let Some(next_update) = &validity.next_update {
                text.push_str(&format!("Next update: {}\n", format_time(next_update)));
            }
        }

        text
    }
}

impl fmt::Display for RevocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_report_text())
    }
}

pub fn format_time(time: &DateTime<Utc>) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Parses the text OpenSSL prints for ASN.1 times, e.g. `Jun 18 17:57:00 2017 GMT`.
pub(crate) fn parse_openssl_time(text: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(text.trim(), "%b %e %H:%M:%S%.f %Y GMT").map_err(
        |e| CertStatusError::OpenSsl {
            details: format!("unrecognised time {:?}: {}", text, e),
        },
    )?;
    Ok(Utc.from_utc_datetime(&naive))
}
