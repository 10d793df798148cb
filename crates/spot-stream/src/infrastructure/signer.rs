//! Request signing (HMAC-SHA256, hex) and REST request preparation

use hmac::{Hmac, Mac};
use reqwest::Method;
use sha2::Sha256;

use crate::domain::Credentials;

type HmacSha256 = Hmac<Sha256>;

pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Uppercase hex of `HMAC-SHA256(secret, canonical_query)`
pub fn sign(secret: &str, canonical_query: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(canonical_query.as_bytes());
    hex::encode_upper(mac.finalize().into_bytes())
}

/// `k1=v1&k2=v2...` in insertion order
pub fn canonical_query<K: AsRef<str>, V: AsRef<str>>(params: &[(K, V)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k.as_ref(), v.as_ref()))
        .collect::<Vec<_>>()
        .join("&")
}

/// A REST request ready to send: encoded parameters plus headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub method: Method,
    /// Canonical query, with `&signature=...` appended when signed
    pub payload: String,
    pub headers: Vec<(&'static str, String)>,
}

impl SignedRequest {
    /// Prepare parameters and headers for a REST call.
    ///
    /// POST/PUT carry the payload as a form body; GET/DELETE carry it in the
    /// query string.
    pub fn prepare<K: AsRef<str>, V: AsRef<str>>(
        method: Method,
        params: &[(K, V)],
        credentials: &Credentials,
        signed: bool,
    ) -> Self {
        let query = canonical_query(params);
        let payload = if signed {
            let signature = sign(credentials.secret_key(), &query);
            if query.is_empty() {
                format!("signature={}", signature)
            } else {
                format!("{}&signature={}", query, signature)
            }
        } else {
            query
        };

        let mut headers = vec![(API_KEY_HEADER, credentials.api_key.clone())];
        if method == Method::POST || method == Method::PUT {
            headers.push(("Content-Type", FORM_CONTENT_TYPE.to_string()));
        }

        SignedRequest {
            method,
            payload,
            headers,
        }
    }

    /// Whether the payload travels in the body rather than the query string
    pub fn has_body(&self) -> bool {
        self.method == Method::POST || self.method == Method::PUT
    }
}
