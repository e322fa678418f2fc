//! Certificate revocation checking over OCSP and CRL.
//!
//! Given a parsed [`Certificate`], [`Checker`] asks the certificate's OCSP
//! responder (downloading the issuer through its caIssuers URLs when one is
//! not supplied) or downloads its CRL, and reduces the answer to a single
//! [`RevocationStatus`].
//!
//! ```no_run
//! use std::time::Duration;
//! use certstatus::{Certificate, Checker, HttpFetcher, OutputFormat, Protocol};
//!
//! let cert = Certificate::from_file("server.pem")?;
//! let fetcher = HttpFetcher::new(Duration::from_secs(10), "certstatus")?;
//! let mut checker = Checker::new(fetcher, std::io::stdout());
//! let status = checker.check(&cert, Protocol::Ocsp, None)?;
//! checker.report(&status, OutputFormat::Text)?;
//! # Ok::<(), certstatus::CertStatusError>(())
//! ```

pub mod certificate;
pub mod checker;
pub mod config;
pub mod crl;
pub mod error;
pub mod fetcher;
pub mod issuer;
pub mod metrics;
pub mod ocsp;
pub mod status;

#[cfg(test)]
mod testutil;

pub use certificate::{Certificate, SerialNumber};
pub use checker::{Checker, OutputFormat};
pub use crl::{CrlFreshness, RevocationList};
pub use error::{CertStatusError, Result};
pub use fetcher::{Fetcher, HttpFetcher};
pub use issuer::resolve_issuer;
pub use status::{CertStatus, Protocol, ResponseValidity, RevocationReason, RevocationStatus};
