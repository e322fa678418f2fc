//! Error types for certificate revocation checking.
//!
//! Every fetch and parse failure is returned to its caller as one of these
//! variants. Nothing in the library retries on its own; the one deliberate
//! exception is issuer resolution, which moves on to the next candidate URL.

use std::io;

use thiserror::Error;

/// Shorthand for results produced by this crate.
pub type Result<T> = std::result::Result<T, CertStatusError>;

/// Error type for revocation check failures.
#[derive(Debug, Error)]
pub enum CertStatusError {
    /// The certificate file is missing or does not decode as a certificate
    #[error("failed to read certificate: {reason}")]
    CertificateUnreadable {
        /// What was wrong with the input
        reason: String,
    },

    /// No issuer certificate could be downloaded and decoded
    #[error("no issuer certificate (tried {attempted} location(s))")]
    NoIssuerCertificate {
        /// Number of candidate URLs that were tried
        attempted: usize,
    },

    /// A download failed at the transport layer
    #[error("failed to get resource {url}: {reason}")]
    ResourceUnavailable {
        /// The URL that was requested
        url: String,
        /// Connection error or unexpected HTTP status
        reason: String,
    },

    /// The certificate carries no OCSP responder URL
    #[error("no OCSP servers found")]
    NoOcspServersFound,

    /// The certificate carries no CRL distribution point URL
    #[error("no CRL distribution points found")]
    NoCrlDistributionPointsFound,

    /// The OCSP responder could not be reached
    #[error("failed to fetch OCSP response from {url}: {reason}")]
    FailedToFetchOcspResponse {
        /// Responder URL
        url: String,
        /// Underlying transport failure
        reason: String,
    },

    /// The OCSP response did not parse or did not validate against the certificate and issuer
    #[error("invalid OCSP response: {reason}")]
    OcspResponseInvalid {
        /// Why the response was rejected
        reason: String,
    },

    /// The downloaded payload is not a revocation list
    #[error("failed to parse CRL: {reason}")]
    CrlParseFailure {
        /// Parser diagnostic
        reason: String,
    },

    /// The revocation list is past its nextUpdate time
    #[error("CRL expired: next update was due at {next_update}")]
    CrlExpired {
        /// The lapsed nextUpdate, already formatted for display
        next_update: String,
    },

    /// The HTTP client could not be built (bad User-Agent, TLS backend failure)
    #[error("failed to prepare HTTP client: {reason}")]
    HttpClient {
        /// Builder diagnostic
        reason: String,
    },

    /// A URL taken from the certificate could not be parsed
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The offending URL
        url: String,
        /// Parser diagnostic
        reason: String,
    },

    /// OpenSSL error occurred
    #[error("OpenSSL error: {details}")]
    OpenSsl {
        /// The underlying OpenSSL error
        details: String,
    },

    /// Generic I/O error
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error
        #[from]
        source: io::Error,
    },
}

impl CertStatusError {
    pub(crate) fn unreadable(reason: impl Into<String>) -> Self {
        Self::CertificateUnreadable {
            reason: reason.into(),
        }
    }

    pub(crate) fn ocsp_invalid(reason: impl Into<String>) -> Self {
        Self::OcspResponseInvalid {
            reason: reason.into(),
        }
    }

    pub(crate) fn crl_parse(reason: impl Into<String>) -> Self {
        Self::CrlParseFailure {
            reason: reason.into(),
        }
    }
}

impl From<openssl::error::ErrorStack> for CertStatusError {
    fn from(e: openssl::error::ErrorStack) -> Self {
        Self::OpenSsl {
            details: e.to_string(),
        }
    }
}
