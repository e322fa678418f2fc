//! Fixtures shared by the unit tests: throwaway certificates built with
//! OpenSSL, hand-assembled CRLs, and an in-memory [`Fetcher`].

use std::cell::RefCell;
use std::collections::HashMap;

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::sign::Signer;
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509Builder, X509Extension, X509Name, X509NameBuilder, X509NameRef, X509};

use crate::error::{CertStatusError, Result};
use crate::fetcher::Fetcher;

pub struct TestCa {
    pub cert: X509,
    pub key: PKey<Private>,
}

pub fn ec_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

fn name(common_name: &str) -> X509Name {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, common_name)
        .unwrap();
    name.build()
}

fn builder(serial: &BigNum, common_name: &str, key: &PKey<Private>) -> X509Builder {
    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    builder
        .set_serial_number(&serial.to_asn1_integer().unwrap())
        .unwrap();
    builder.set_subject_name(&name(common_name)).unwrap();
    builder.set_pubkey(key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(365).unwrap())
        .unwrap();
    builder
}

pub fn ca(common_name: &str) -> TestCa {
    let key = ec_key();
    let mut builder = builder(&BigNum::from_u32(1).unwrap(), common_name, &key);
    builder.set_issuer_name(&name(common_name)).unwrap();
    builder
        .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
        .unwrap();
    builder
        .append_extension(
            KeyUsage::new()
                .critical()
                .key_cert_sign()
                .crl_sign()
                .digital_signature()
                .build()
                .unwrap(),
        )
        .unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();
    TestCa {
        cert: builder.build(),
        key,
    }
}

/// An end-entity certificate issued by `ca` carrying the given v3 extensions.
pub fn leaf(ca: &TestCa, serial: u32, extensions: &[(Nid, String)]) -> X509 {
    leaf_with_serial(ca, &BigNum::from_u32(serial).unwrap(), extensions)
}

pub fn leaf_with_serial(ca: &TestCa, serial: &BigNum, extensions: &[(Nid, String)]) -> X509 {
    let key = ec_key();
    let mut builder = builder(serial, "leaf.example.test", &key);
    builder.set_issuer_name(ca.cert.subject_name()).unwrap();
    for (nid, value) in extensions {
        #[allow(deprecated)]
        let extension = X509Extension::new_nid(
            None,
            Some(&builder.x509v3_context(Some(&*ca.cert), None)),
            *nid,
            value,
        )
        .unwrap();
        builder.append_extension(extension).unwrap();
    }
    builder.sign(&ca.key, MessageDigest::sha256()).unwrap();
    builder.build()
}

pub fn aia(ocsp: &[&str], ca_issuers: &[&str]) -> (Nid, String) {
    let entries: Vec<String> = ocsp
        .iter()
        .map(|url| format!("OCSP;URI:{}", url))
        .chain(ca_issuers.iter().map(|url| format!("caIssuers;URI:{}", url)))
        .collect();
    (Nid::INFO_ACCESS, entries.join(","))
}

pub fn crl_dp(url: &str) -> (Nid, String) {
    (Nid::CRL_DISTRIBUTION_POINTS, format!("URI:{}", url))
}

pub struct CrlEntry {
    pub serial: u64,
    /// UTCTime text, `YYMMDDHHMMSSZ`
    pub revoked_at: &'static str,
    pub reason: Option<u8>,
}

fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else if len <= 0xff {
        out.extend_from_slice(&[0x81, len as u8]);
    } else {
        out.extend_from_slice(&[0x82, (len >> 8) as u8, len as u8]);
    }
    out.extend_from_slice(content);
    out
}

fn seq(parts: &[Vec<u8>]) -> Vec<u8> {
    tlv(0x30, &parts.concat())
}

fn integer(value: u64) -> Vec<u8> {
    let mut bytes = value.to_be_bytes().to_vec();
    while bytes.len() > 1 && bytes[0] == 0 {
        bytes.remove(0);
    }
    if bytes[0] & 0x80 != 0 {
        bytes.insert(0, 0);
    }
    tlv(0x02, &bytes)
}

fn utc_time(text: &str) -> Vec<u8> {
    tlv(0x17, text.as_bytes())
}

/// DER for an (unsigned) v2 CertificateList. The signature bytes are filler;
/// parsing a CRL does not verify them.
pub fn crl_der(entries: &[CrlEntry], this_update: &str, next_update: Option<&str>) -> Vec<u8> {
    // sha256WithRSAEncryption
    let algorithm = seq(&[
        tlv(
            0x06,
            &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0B],
        ),
        vec![0x05, 0x00],
    ]);
    let issuer = seq(&[tlv(
        0x31,
        &seq(&[tlv(0x06, &[0x55, 0x04, 0x03]), tlv(0x0C, b"Test CA")]),
    )]);

    let mut tbs = vec![
        tlv(0x02, &[0x01]),
        algorithm.clone(),
        issuer,
        utc_time(this_update),
    ];
    if let Some(next_update) = next_update {
        tbs.push(utc_time(next_update));
    }
    if !entries.is_empty() {
        let revoked: Vec<Vec<u8>> = entries
            .iter()
            .map(|entry| {
                let mut fields = vec![integer(entry.serial), utc_time(entry.revoked_at)];
                if let Some(code) = entry.reason {
                    // id-ce-cRLReasons
                    let extension = seq(&[
                        tlv(0x06, &[0x55, 0x1D, 0x15]),
                        tlv(0x04, &tlv(0x0A, &[code])),
                    ]);
                    fields.push(seq(&[extension]));
                }
                seq(&fields)
            })
            .collect();
        tbs.push(seq(&revoked));
    }

    seq(&[seq(&tbs), algorithm, tlv(0x03, &[0x00, 0x01, 0x02, 0x03])])
}

/// Serves canned bodies by URL and records every request it sees.
#[derive(Default)]
pub struct FakeFetcher {
    responses: HashMap<String, Vec<u8>>,
    requests: RefCell<Vec<(String, Option<Vec<u8>>)>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, body: Vec<u8>) -> Self {
        self.responses.insert(url.to_string(), body);
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requests
            .borrow()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    pub fn last_body(&self) -> Option<Vec<u8>> {
        self.requests
            .borrow()
            .last()
            .and_then(|(_, body)| body.clone())
    }

    fn respond(&self, url: &str) -> Result<Vec<u8>> {
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| CertStatusError::ResourceUnavailable {
                url: url.to_string(),
                reason: "HTTP status 404 Not Found".to_string(),
            })
    }
}

impl Fetcher for FakeFetcher {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        self.requests.borrow_mut().push((url.to_string(), None));
        self.respond(url)
    }

    fn post_ocsp(&self, url: &str, body: &[u8]) -> Result<Vec<u8>> {
        self.requests
            .borrow_mut()
            .push((url.to_string(), Some(body.to_vec())));
        self.respond(url)
    }
}

fn generalized_time(text: &str) -> Vec<u8> {
    tlv(0x18, text.as_bytes())
}

/// ecdsa-with-SHA256
fn ecdsa_sha256() -> Vec<u8> {
    seq(&[tlv(
        0x06,
        &[0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x04, 0x03, 0x02],
    )])
}

/// Wraps a BasicOCSPResponse in a successful OCSPResponse.
fn successful_ocsp_response(basic: Vec<u8>) -> Vec<u8> {
    // id-pkix-ocsp-basic
    let response_bytes = seq(&[
        tlv(
            0x06,
            &[0x2B, 0x06, 0x01, 0x05, 0x05, 0x07, 0x30, 0x01, 0x01],
        ),
        tlv(0x04, &basic),
    ]);
    seq(&[tlv(0x0A, &[0x00]), tlv(0xA0, &response_bytes)])
}

/// A successful OCSPResponse whose BasicOCSPResponse carries no SingleResponses
/// and a filler signature. `produced_at` is GeneralizedTime text.
pub fn unsigned_ocsp_response(produced_at: &str) -> Vec<u8> {
    // responderID byKey [2]
    let responder_id = tlv(0xA2, &tlv(0x04, &[0x11; 20]));
    let tbs = seq(&[responder_id, generalized_time(produced_at), seq(&[])]);
    let basic = seq(&[tbs, ecdsa_sha256(), tlv(0x03, &[0x00, 0x01, 0x02, 0x03])]);
    successful_ocsp_response(basic)
}

fn der_header(der: &[u8]) -> (usize, usize) {
    let first = der[1] as usize;
    if first < 0x80 {
        return (2, first);
    }
    let count = first & 0x7f;
    let len = der[2..2 + count]
        .iter()
        .fold(0, |len, byte| (len << 8) | *byte as usize);
    (2 + count, len)
}

fn first_child(der: &[u8]) -> &[u8] {
    let (header, _) = der_header(der);
    let inner = &der[header..];
    let (child_header, child_len) = der_header(inner);
    &inner[..child_header + child_len]
}

/// The CertID of the single Request inside a DER OCSPRequest.
pub fn request_cert_id(request: &[u8]) -> Vec<u8> {
    // OCSPRequest > tbsRequest > requestList > Request > reqCert
    let tbs = first_child(request);
    let list = first_child(tbs);
    let single = first_child(list);
    first_child(single).to_vec()
}

pub enum OcspCertState {
    Good,
    Revoked {
        /// GeneralizedTime text
        at: &'static str,
        reason: Option<u8>,
    },
    Unknown,
}

/// One SingleResponse of a signed OCSP response. Times are GeneralizedTime text.
pub struct OcspSingle {
    pub cert_id: Vec<u8>,
    pub state: OcspCertState,
    pub this_update: &'static str,
    pub next_update: Option<&'static str>,
}

/// A successful OCSPResponse naming `responder` as signer (byName) and signed
/// with `key` over its tbsResponseData.
pub fn signed_ocsp_response(
    single: &OcspSingle,
    produced_at: &str,
    responder: &X509NameRef,
    key: &PKey<Private>,
) -> Vec<u8> {
    let cert_status = match &single.state {
        OcspCertState::Good => vec![0x80, 0x00],
        OcspCertState::Revoked { at, reason } => {
            let mut info = generalized_time(at);
            if let Some(code) = reason {
                info.extend(tlv(0xA0, &tlv(0x0A, &[*code])));
            }
            tlv(0xA1, &info)
        }
        OcspCertState::Unknown => vec![0x82, 0x00],
    };
    let mut fields = vec![
        single.cert_id.clone(),
        cert_status,
        generalized_time(single.this_update),
    ];
    if let Some(next_update) = single.next_update {
        fields.push(tlv(0xA0, &generalized_time(next_update)));
    }

    // responderID byName [1]
    let responder_id = tlv(0xA1, &responder.to_der().unwrap());
    let tbs = seq(&[
        responder_id,
        generalized_time(produced_at),
        seq(&[seq(&fields)]),
    ]);

    let mut signer = Signer::new(MessageDigest::sha256(), key).unwrap();
    signer.update(&tbs).unwrap();
    let mut signature = vec![0x00];
    signature.extend(signer.sign_to_vec().unwrap());

    successful_ocsp_response(seq(&[tbs, ecdsa_sha256(), tlv(0x03, &signature)]))
}
