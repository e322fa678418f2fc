//! Issuer certificate resolution through Authority Information Access URLs.

use tracing::{debug, info};

use crate::certificate::Certificate;
use crate::error::{CertStatusError, Result};
use crate::fetcher::Fetcher;

/// Tries each candidate in order and returns the first success.
///
/// Later candidates are never attempted once one succeeds. If every attempt
/// fails, the per-attempt errors come back in candidate order.
pub fn first_success<I, T, E, F>(candidates: I, mut attempt: F) -> std::result::Result<T, Vec<E>>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> std::result::Result<T, E>,
{
    let mut errors = Vec::new();
    for candidate in candidates {
        match attempt(candidate) {
            Ok(value) => return Ok(value),
            Err(e) => errors.push(e),
        }
    }
    Err(errors)
}

/// Downloads the issuer of `cert` from its caIssuers URLs.
///
/// A broken or unreachable mirror is skipped in favour of the next one; only
/// when every URL fails (or none is listed) does this return
/// [`CertStatusError::NoIssuerCertificate`].
pub fn resolve_issuer<F: Fetcher>(fetcher: &F, cert: &Certificate) -> Result<Certificate> {
    let urls = cert.issuer_urls();
    let attempted = urls.len();

    let resolved = first_success(urls, |url| {
        let issuer = fetcher
            .get(&url)
            .and_then(|bytes| Certificate::from_bytes(&bytes));
        match &issuer {
            Ok(found) => info!(url = url.as_str(), issuer = %found.subject(), "resolved issuer certificate"),
            Err(e) => debug!(url = url.as_str(), error = %e, "issuer candidate failed"),
        }
        issuer
    });

    resolved.map_err(|_| CertStatusError::NoIssuerCertificate { attempted })
}
