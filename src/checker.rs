//! Drives a single revocation check and writes its report.

use std::io::Write;

use clap::ValueEnum;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::certificate::Certificate;
use crate::crl::{check_crl, CrlFreshness};
use crate::error::Result;
use crate::fetcher::Fetcher;
use crate::issuer::resolve_issuer;
use crate::ocsp::{check_ocsp, responder_url};
use crate::status::{format_time, CertStatus, Protocol, RevocationStatus};

/// How a [`RevocationStatus`] is written out.
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
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Summary,
}

/// Runs checks through a [`Fetcher`] and reports to `W`.
pub struct Checker<F: Fetcher, W: Write> {
    fetcher: F,
    out: W,
    crl_freshness: CrlFreshness,
}

impl<F: Fetcher, W: Write> Checker<F, W> {
    pub fn new(fetcher: F, out: W) -> Self {
        Checker {
            fetcher,
            out,
            crl_freshness: CrlFreshness::default(),
        }
    }

    pub fn with_crl_freshness(mut self, crl_freshness: CrlFreshness) -> Self {
        self.crl_freshness = crl_freshness;
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Checks `cert` with `protocol`.
    ///
    /// For OCSP a missing `issuer` is downloaded through the certificate's
    /// caIssuers URLs, but only once the certificate is known to name a
    /// responder. CRL checks never need the issuer.
    pub fn check(
        &self,
        cert: &Certificate,
        protocol: Protocol,
        issuer: Option<&Certificate>,
    ) -> Result<RevocationStatus> {
        match protocol {
            Protocol::Ocsp => self.check_ocsp(cert, issuer),
            Protocol::Crl => self.check_crl(cert),
        }
    }

    pub fn check_ocsp(
        &self,
        cert: &Certificate,
        issuer: Option<&Certificate>,
    ) -> Result<RevocationStatus> {
        responder_url(cert)?;
        match issuer {
            Some(issuer) => check_ocsp(&self.fetcher, cert, issuer),
            None => {
                debug!(subject = %cert.subject(), "no issuer supplied, resolving");
                let issuer = resolve_issuer(&self.fetcher, cert)?;
                check_ocsp(&self.fetcher, cert, &issuer)
            }
        }
    }

    pub fn check_crl(&self, cert: &Certificate) -> Result<RevocationStatus> {
        check_crl(&self.fetcher, cert, self.crl_freshness)
    }

    pub fn report(&mut self, status: &RevocationStatus, format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Text => write!(self.out, "{}", status.to_report_text())?,
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(status).map_err(std::io::Error::from)?;
                writeln!(self.out, "{}", json)?
            }
            OutputFormat::Summary => writeln!(self.out, "{}", summary_table(status))?,
        }
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn summary_table(status: &RevocationStatus) -> Table {
    let (reason, revoked_at) = match &status.status {
        CertStatus::Revoked { revoked_at, reason } => (
            reason.map_or("-".to_string(), |r| r.to_string()),
            format_time(revoked_at),
        ),
        _ => ("-".to_string(), "-".to_string()),
    };
    let next_update = status
        .validity
        .as_ref()
        .and_then(|v| v.next_update.as_ref())
        .map_or("-".to_string(), format_time);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec![
            "Serial number",
            "Protocol",
            "Status",
            "Reason",
            "Revoked at",
            "Next update",
        ])
        .add_row(vec![
            status.serial_number.to_string(),
            status.protocol.to_string(),
            status.status.name().to_string(),
            reason,
            revoked_at,
            next_update,
        ]);
    table
}
