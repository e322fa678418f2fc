//! Certificate input and the attributes the revocation checks read from it.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use openssl::asn1::Asn1IntegerRef;
use openssl::bn::{BigNum, BigNumRef};
use openssl::nid::Nid;
use openssl::x509::{X509NameRef, X509};
use serde::{Serialize, Serializer};

use crate::error::{CertStatusError, Result};

const PEM_BEGIN: &[u8] = b"-----BEGIN ";
const PEM_END: &[u8] = b"-----END ";
const PEM_BOUNDARY_TAIL: &[u8] = b"-----";
const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// A parsed X.509 certificate.
#[derive(Clone)]
pub struct Certificate {
    x509: X509,
}

impl Certificate {
    /// Decodes a certificate from raw DER or from the first PEM block in `bytes`.
    ///
    /// A PEM block must be labelled `CERTIFICATE`; keys and other objects are rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let x509 = match pem_block(bytes) {
            Some(block) => {
                let label = pem_rfc7468::decode_label(block)
                    .map_err(|e| CertStatusError::unreadable(format!("malformed PEM: {}", e)))?;
                if label != CERTIFICATE_LABEL {
                    return Err(CertStatusError::unreadable(format!(
                        "expected a CERTIFICATE PEM block, found {}",
                        label
                    )));
                }
                X509::from_pem(block)
                    .map_err(|e| CertStatusError::unreadable(format!("malformed PEM: {}", e)))?
            }
            None => X509::from_der(bytes)
                .map_err(|e| CertStatusError::unreadable(format!("malformed DER: {}", e)))?,
        };

        Ok(Certificate { x509 })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| {
            CertStatusError::unreadable(format!("{}: {}", path.display(), e))
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn x509(&self) -> &X509 {
        &self.x509
    }

    pub fn serial_number(&self) -> Result<SerialNumber> {
        SerialNumber::from_asn1(self.x509.serial_number())
    }

    /// OCSP responder URLs from the Authority Information Access extension, in order.
    pub fn ocsp_responders(&self) -> Vec<String> {
        // X509_get1_ocsp reports "no extension" as an error
        self.x509
            .ocsp_responders()
            .map(|responders| responders.iter().map(|url| url.to_string()).collect())
            .unwrap_or_default()
    }

    /// Issuer certificate download URLs (AIA caIssuers), in order.
    pub fn issuer_urls(&self) -> Vec<String> {
        let Some(access) = self.x509.authority_info() else {
            return Vec::new();
        };
        access
            .iter()
            .filter(|desc| desc.method().nid() == Nid::AD_CA_ISSUERS)
            .filter_map(|desc| desc.location().uri())
            .map(str::to_owned)
            .collect()
    }

    /// CRL distribution point URLs, taken from each point's full name, in order.
    pub fn crl_distribution_points(&self) -> Vec<String> {
        let Some(points) = self.x509.crl_distribution_points() else {
            return Vec::new();
        };
        points
            .iter()
            .filter_map(|point| point.distpoint())
            .filter_map(|name| name.fullname())
            .flat_map(|names| names.iter().filter_map(|name| name.uri()))
            .map(str::to_owned)
            .collect()
    }

    pub fn subject(&self) -> String {
        common_name(self.x509.subject_name())
    }

    pub fn issuer(&self) -> String {
        common_name(self.x509.issuer_name())
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject())
            .field("issuer", &self.issuer())
            .finish()
    }
}

fn common_name(name: &X509NameRef) -> String {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().to_string().ok())
        .unwrap_or_else(|| String::from("None"))
}

/// Returns the first PEM block in `bytes`, from its BEGIN line through the end of its END line.
pub(crate) fn pem_block(bytes: &[u8]) -> Option<&[u8]> {
    let start = find(bytes, PEM_BEGIN)?;
    let rest = &bytes[start..];
    let end_line = find(rest, PEM_END)?;
    let after_end = &rest[end_line + PEM_END.len()..];
    let tail = find(after_end, PEM_BOUNDARY_TAIL)?;
    let len = end_line + PEM_END.len() + tail + PEM_BOUNDARY_TAIL.len();
    Some(&rest[..len])
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Certificate serial number.
///
/// Serials are arbitrary-precision integers. The magnitude is stored without
/// leading zero bytes, so two encodings of the same value compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SerialNumber {
    negative: bool,
    magnitude: Vec<u8>,
    decimal: String,
}

impl SerialNumber {
    pub fn from_bignum(bn: &BigNumRef) -> Result<Self> {
        Ok(SerialNumber {
            negative: bn.is_negative(),
            magnitude: bn.to_vec(),
            decimal: bn.to_dec_str()?.to_string(),
        })
    }

    pub fn from_asn1(integer: &Asn1IntegerRef) -> Result<Self> {
        let bn = integer.to_bn()?;
        Self::from_bignum(&bn)
    }

    /// Interprets `bytes` as an unsigned big-endian integer.
    pub fn from_be_bytes(bytes: &[u8]) -> Result<Self> {
        let bn = BigNum::from_slice(bytes)?;
        Self::from_bignum(&bn)
    }

    pub fn to_bignum(&self) -> Result<BigNum> {
        let mut bn = BigNum::from_slice(&self.magnitude)?;
        bn.set_negative(self.negative);
        Ok(bn)
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.decimal)
    }
}

impl FromStr for SerialNumber {
    type Err = CertStatusError;

    fn from_str(s: &str) -> Result<Self> {
        let bn = BigNum::from_dec_str(s)?;
        Self::from_bignum(&bn)
    }
}

impl Serialize for SerialNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.decimal)
    }
}
