//! AWS Signature Version 4 for admin API requests
//!
//! Admin calls carry small JSON bodies, so the payload is always hashed.
//! The derived signing key only changes daily and is cached per signer.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use url::Url;

type HmacSha256 = Hmac<Sha256>;

static HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

/// Credentials bound for request signing
pub struct RequestSigner {
    access_key: String,
    session_token: Option<String>,
    region: String,
    /// "AWS4" + secret key
    aws4_key: Vec<u8>,
    /// (date stamp, signing key)
    cached_key: Mutex<Option<(String, [u8; 32])>>,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("access_key", &self.access_key)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl RequestSigner {
    pub fn new(access_key: &str, secret_key: &str, session_token: Option<&str>) -> Self {
        Self {
            access_key: access_key.to_string(),
            session_token: session_token.map(str::to_string),
            region: "us-east-1".to_string(),
            aws4_key: format!("AWS4{}", secret_key).into_bytes(),
            cached_key: Mutex::new(None),
        }
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// Produce the headers that authenticate `method url` with `payload`.
    ///
    /// The returned map holds lowercase header names, `authorization` included.
    pub fn sign(&self, method: &str, url: &Url, payload: &[u8]) -> BTreeMap<String, String> {
        let now = Utc::now();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();
        self.sign_at(method, url, payload, &amz_date, &date_stamp)
    }

    fn sign_at(
        &self,
        method: &str,
        url: &Url,
        payload: &[u8],
        amz_date: &str,
        date_stamp: &str,
    ) -> BTreeMap<String, String> {
        let payload_hash = hex::encode(Sha256::digest(payload));

        let mut headers = BTreeMap::new();
        headers.insert("host".to_string(), host_header(url));
        headers.insert("x-amz-content-sha256".to_string(), payload_hash.clone());
        headers.insert("x-amz-date".to_string(), amz_date.to_string());
        if let Some(token) = &self.session_token {
            headers.insert("x-amz-security-token".to_string(), token.clone());
        }

        let signed_headers = headers.keys().cloned().collect::<Vec<_>>().join(";");
        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v.trim()))
            .collect();

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method,
            url.path(),
            canonical_query(url),
            canonical_headers,
            signed_headers,
            payload_hash
        );

        let scope = format!("{}/{}/{}/aws4_request", date_stamp, self.region, SERVICE);
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signature = hex::encode(hmac_sha256(
            &self.signing_key(date_stamp),
            string_to_sign.as_bytes(),
        ));

        headers.insert(
            "authorization".to_string(),
            format!(
                "{} Credential={}/{}, SignedHeaders={}, Signature={}",
                ALGORITHM, self.access_key, scope, signed_headers, signature
            ),
        );
        headers
    }

    fn signing_key(&self, date_stamp: &str) -> [u8; 32] {
        let mut cache = self.cached_key.lock().unwrap_or_else(PoisonError::into_inner);
        match cache.as_ref() {
            Some((date, key)) if date == date_stamp => *key,
            _ => {
                let k_date = hmac_sha256(&self.aws4_key, date_stamp.as_bytes());
                let k_region = hmac_sha256(&k_date, self.region.as_bytes());
                let k_service = hmac_sha256(&k_region, SERVICE.as_bytes());
                let key = hmac_sha256(&k_service, b"aws4_request");
                *cache = Some((date_stamp.to_string(), key));
                key
            }
        }
    }
}

/// Host header value: the url crate already drops default ports.
fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// Query parameters decoded, re-encoded per RFC 3986 and sorted
fn canonical_query(url: &Url) -> String {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (uri_encode(&k), uri_encode(&v)))
        .collect();
    params.sort();
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

fn uri_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => {
                out.push('%');
                out.push(HEX_UPPER[(byte >> 4) as usize] as char);
                out.push(HEX_UPPER[(byte & 0xf) as usize] as char);
            }
        }
    }
    out
}

fn hmac_sha256(key: &[u8], msg: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(msg);
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_uri_encode() {
        assert_eq!(uri_encode("10s"), "10s");
        assert_eq!(uri_encode("a b/c"), "a%20b%2Fc");
        assert_eq!(uri_encode("user@host"), "user%40host");
    }

    #[test]
    fn test_canonical_query_sorted() {
        assert_eq!(canonical_query(&url("https://h/p")), "");
        assert_eq!(
            canonical_query(&url("https://h/p?zebra=1&alpha=2")),
            "alpha=2&zebra=1"
        );
        assert_eq!(
            canonical_query(&url("https://h/p?duration=10s&x=a+b")),
            "duration=10s&x=a%20b"
        );
    }

    #[test]
    fn test_host_header_drops_default_port() {
        assert_eq!(host_header(&url("https://minio.local:443/x")), "minio.local");
        assert_eq!(host_header(&url("http://minio.local:9000/x")), "minio.local:9000");
    }

    #[test]
    fn test_signature_known_answer() {
        let signer = RequestSigner::new("AKIAEXAMPLE", "secret", None);
        let u = url("http://localhost:9000/minio/admin/v3/info");

        let a = signer.sign_at("GET", &u, b"", "20260101T000000Z", "20260101");
        let b = signer.sign_at("GET", &u, b"", "20260101T000000Z", "20260101");
        assert_eq!(a, b);

        assert_eq!(
            a["authorization"],
            "AWS4-HMAC-SHA256 Credential=AKIAEXAMPLE/20260101/us-east-1/s3/aws4_request, \
             SignedHeaders=host;x-amz-content-sha256;x-amz-date, \
             Signature=09d2a8ac3da35b54c4ca186d42cde7214d39804c82eb7c08da7d200abaf95d12"
        );
        assert_eq!(
            a["x-amz-content-sha256"],
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(a["host"], "localhost:9000");
    }

    #[test]
    fn test_session_token_is_signed() {
        let signer = RequestSigner::new("ak", "sk", Some("token"));
        let headers = signer.sign_at(
            "GET",
            &url("https://h/p"),
            b"",
            "20260101T000000Z",
            "20260101",
        );
        assert_eq!(headers["x-amz-security-token"], "token");
        assert!(headers["authorization"].contains("x-amz-security-token"));
    }

    #[test]
    fn test_signing_key_cached_per_day() {
        let signer = RequestSigner::new("ak", "sk", None);
        let k1 = signer.signing_key("20260101");
        let k2 = signer.signing_key("20260101");
        let k3 = signer.signing_key("20260102");
        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
    }
}
