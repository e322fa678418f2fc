//! Online Certificate Status Protocol checks.
//!
//! Only the first responder URL listed in the certificate is queried. The
//! response is accepted only if its signature chains to the issuer and it
//! carries a SingleResponse for the submitted certificate.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use der::asn1::{AnyRef, ObjectIdentifier, OctetStringRef};
use der::{Decode, Reader, SliceReader, Tag, TagNumber, Tagged};
use openssl::hash::MessageDigest;
use openssl::ocsp::{
    OcspBasicResponseRef, OcspCertId, OcspCertStatus, OcspFlag, OcspRequest, OcspResponse,
    OcspResponseStatus,
};
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::verify::X509VerifyFlags;
use openssl::x509::X509;
use tracing::{debug, info, warn};

use crate::certificate::Certificate;
use crate::error::{CertStatusError, Result};
use crate::fetcher::Fetcher;
use crate::status::{
    parse_openssl_time, CertStatus, Protocol, ResponseValidity, RevocationReason,
    RevocationStatus,
};

/// Clock skew tolerated when checking thisUpdate / nextUpdate.
const MAX_CLOCK_SKEW_SECS: u32 = 300;

/// First OCSP responder URL of `cert`.
pub fn responder_url(cert: &Certificate) -> Result<String> {
    cert.ocsp_responders()
        .into_iter()
        .next()
        .ok_or(CertStatusError::NoOcspServersFound)
}

/// DER-encoded OCSPRequest for `(cert, issuer)` with a SHA-1 CertID.
pub fn build_request(cert: &Certificate, issuer: &Certificate) -> Result<Vec<u8>> {
    let id = OcspCertId::from_cert(MessageDigest::sha1(), cert.x509(), issuer.x509())?;
    let mut request = OcspRequest::new()?;
    request.add_id(id)?;
    Ok(request.to_der()?)
}

/// Queries the certificate's OCSP responder and validates the answer.
pub fn check_ocsp<F: Fetcher>(
    fetcher: &F,
    cert: &Certificate,
    issuer: &Certificate,
) -> Result<RevocationStatus> {
    let responder = responder_url(cert)?;
    let request = build_request(cert, issuer)?;
    debug!(responder = responder.as_str(), subject = %cert.subject(), "querying OCSP responder");

    let body = fetcher
        .post_ocsp(&responder, &request)
        .map_err(|e| CertStatusError::FailedToFetchOcspResponse {
            url: responder.clone(),
            reason: match e {
                CertStatusError::ResourceUnavailable { reason, .. } => reason,
                other => other.to_string(),
            },
        })?;

    let status = parse_response(&body, cert, issuer)?;
    info!(serial = %status.serial_number, status = %status.status, "OCSP status");
    Ok(status)
}

/// Parses a DER OCSPResponse and validates it against `(cert, issuer)`.
pub fn parse_response(
    body: &[u8],
    cert: &Certificate,
    issuer: &Certificate,
) -> Result<RevocationStatus> {
    let serial = cert.serial_number()?;
    let response = OcspResponse::from_der(body)
        .map_err(|e| CertStatusError::ocsp_invalid(format!("malformed response: {}", e)))?;

    let response_status = response.status();
    if response_status == OcspResponseStatus::INTERNAL_ERROR
        || response_status == OcspResponseStatus::TRY_LATER
    {
        warn!(
            response_status = %response_status_name(response_status),
            "OCSP responder could not answer"
        );
        return Ok(RevocationStatus::new(
            serial,
            Protocol::Ocsp,
            CertStatus::ServerFailed,
        ));
    }
    if response_status != OcspResponseStatus::SUCCESSFUL {
        return Err(CertStatusError::ocsp_invalid(format!(
            "responder rejected the request ({})",
            response_status_name(response_status)
        )));
    }

    let basic = response
        .basic()
        .map_err(|e| CertStatusError::ocsp_invalid(format!("no basic response: {}", e)))?;
    verify_signature(&basic, issuer)?;

    let mut single = None;
    for digest in [MessageDigest::sha1(), MessageDigest::sha256()] {
        let id = OcspCertId::from_cert(digest, cert.x509(), issuer.x509())?;
        if let Some(found) = basic.find_status(&id) {
            single = Some(found);
            break;
        }
    }
    let single = single.ok_or_else(|| {
        CertStatusError::ocsp_invalid(format!(
            "response does not cover serial number {}",
            serial
        ))
    })?;

    if let Err(e) = single.check_validity(MAX_CLOCK_SKEW_SECS, None) {
        warn!(serial = %serial, error = %e, "OCSP response is outside its validity window");
    }

    let status = if single.status == OcspCertStatus::GOOD {
        CertStatus::Good
    } else if single.status == OcspCertStatus::REVOKED {
        let revoked_at = single.revocation_time.ok_or_else(|| {
            CertStatusError::ocsp_invalid("revoked status without a revocation time")
        })?;
        CertStatus::Revoked {
            revoked_at: parse_openssl_time(&revoked_at.to_string())?,
            reason: RevocationReason::from_code(i64::from(single.reason.as_raw())),
        }
    } else {
        CertStatus::Unknown
    };

    let validity = ResponseValidity {
        produced_at: produced_at(body)?,
        this_update: parse_openssl_time(&single.this_update.to_string())?,
        next_update: single
            .next_update()
            .map(|next| parse_openssl_time(&next.to_string()))
            .transpose()?,
    };

    Ok(RevocationStatus::new(serial, Protocol::Ocsp, status).with_validity(validity))
}

/// The signer must be the issuer itself or a responder certificate the issuer signed.
fn verify_signature(basic: &OcspBasicResponseRef, issuer: &Certificate) -> Result<()> {
    let mut certs: Stack<X509> = Stack::new()?;
    certs.push(issuer.x509().clone())?;

    let mut store = X509StoreBuilder::new()?;
    store.add_cert(issuer.x509().clone())?;
    // the issuer is usually an intermediate, so it is the trust anchor here
    store.set_flags(X509VerifyFlags::PARTIAL_CHAIN)?;
    let store = store.build();

    basic
        .verify(&certs, &store, OcspFlag::empty())
        .map_err(|e| {
            CertStatusError::ocsp_invalid(format!(
                "signature does not verify against issuer {}: {}",
                issuer.subject(),
                e
            ))
        })
}

fn response_status_name(status: OcspResponseStatus) -> String {
    let name = if status == OcspResponseStatus::SUCCESSFUL {
        "successful"
    } else if status == OcspResponseStatus::MALFORMED_REQUEST {
        "malformedRequest"
    } else if status == OcspResponseStatus::INTERNAL_ERROR {
        "internalError"
    } else if status == OcspResponseStatus::TRY_LATER {
        "tryLater"
    } else if status == OcspResponseStatus::SIG_REQUIRED {
        "sigRequired"
    } else if status == OcspResponseStatus::UNAUTHORIZED {
        "unauthorized"
    } else {
        return format!("status {}", status.as_raw());
    };
    name.to_string()
}

/// producedAt of a successful OCSPResponse, read straight from the DER since
/// OpenSSL does not expose it. Fractional seconds are accepted.
pub(crate) fn produced_at(body: &[u8]) -> Result<DateTime<Utc>> {
    let unreadable =
        |reason: String| CertStatusError::ocsp_invalid(format!("unreadable producedAt: {}", reason));
    let field = produced_at_field(body).map_err(|e| unreadable(e.to_string()))?;
    let text = std::str::from_utf8(field.value()).map_err(|e| unreadable(e.to_string()))?;
    let naive = NaiveDateTime::parse_from_str(text, "%Y%m%d%H%M%S%.fZ")
        .map_err(|e| unreadable(format!("{:?}: {}", text, e)))?;
    Ok(Utc.from_utc_datetime(&naive))
}

fn produced_at_field(body: &[u8]) -> der::Result<AnyRef<'_>> {
    // OCSPResponse ::= SEQUENCE { responseStatus, responseBytes [0] EXPLICIT }
    let response = AnyRef::from_der(body)?;
    let mut reader = SliceReader::new(response.value())?;
    let _response_status: AnyRef<'_> = reader.decode()?;
    let explicit: AnyRef<'_> = reader.decode()?;

    // ResponseBytes ::= SEQUENCE { responseType, response OCTET STRING }
    let response_bytes = AnyRef::from_der(explicit.value())?;
    let mut reader = SliceReader::new(response_bytes.value())?;
    let _response_type: ObjectIdentifier = reader.decode()?;
    let basic: OctetStringRef<'_> = reader.decode()?;

    // BasicOCSPResponse ::= SEQUENCE { tbsResponseData, ... }
    let basic = AnyRef::from_der(basic.as_bytes())?;
    let mut reader = SliceReader::new(basic.value())?;
    let tbs: AnyRef<'_> = reader.decode()?;

    // ResponseData ::= SEQUENCE { version [0] DEFAULT v1, responderID, producedAt, ... }
    let mut reader = SliceReader::new(tbs.value())?;
    let mut field: AnyRef<'_> = reader.decode()?;
    let version_tag = Tag::ContextSpecific {
        constructed: true,
        number: TagNumber::N0,
    };
    if field.tag() == version_tag {
        field = reader.decode()?;
    }
    let _responder_id = field;
    let produced_at: AnyRef<'_> = reader.decode()?;
    produced_at.tag().assert_eq(Tag::GeneralizedTime)?;
    Ok(produced_at)
}
