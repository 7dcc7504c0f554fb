//! AWS Signature Version 4 for Amazon OpenSearch / Elasticsearch Service

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use url::Url;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SIGNED_HEADERS: &str = "host;x-amz-content-sha256;x-amz-date";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub service: String,
}

impl AwsCredentials {
    pub fn new(
        region: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            service: "es".to_string(),
        }
    }
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| Error::Signing(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Derive the per-day signing key
pub fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>> {
    let k_date = hmac(format!("AWS4{}", secret).as_bytes(), date.as_bytes())?;
    let k_region = hmac(&k_date, region.as_bytes())?;
    let k_service = hmac(&k_region, service.as_bytes())?;
    hmac(&k_service, b"aws4_request")
}

/// Canonical URI: every segment of the decoded path URI-encoded, twice for
/// every service except S3
fn canonical_uri(url: &Url, service: &str) -> Result<String> {
    let segments = url
        .path()
        .split('/')
        .map(|segment| -> Result<String> {
            let decoded =
                urlencoding::decode(segment).map_err(|e| Error::Signing(e.to_string()))?;
            let once = urlencoding::encode(&decoded).into_owned();
            Ok(if service == "s3" {
                once
            } else {
                urlencoding::encode(&once).into_owned()
            })
        })
        .collect::<Result<Vec<String>>>()?;

    let path = segments.join("/");
    Ok(if path.is_empty() { "/".to_string() } else { path })
}

fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            (
                urlencoding::encode(&k).into_owned(),
                urlencoding::encode(&v).into_owned(),
            )
        })
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

fn host_header(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| Error::Signing(format!("URL has no host: {}", url)))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Headers to add to a request so AWS accepts it.
///
/// Returns `host`, `x-amz-date`, `x-amz-content-sha256` and `authorization`.
pub fn sign(
    credentials: &AwsCredentials,
    method: &str,
    url: &Url,
    body: &[u8],
    now: DateTime<Utc>,
) -> Result<Vec<(String, String)>> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let host = host_header(url)?;
    let payload_hash = sha256_hex(body);
    let canonical_uri = canonical_uri(url, &credentials.service)?;

    let canonical_request = format!(
        "{}\n{}\n{}\nhost:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n\n{}\n{}",
        method,
        canonical_uri,
        canonical_query(url),
        host,
        payload_hash,
        amz_date,
        SIGNED_HEADERS,
        payload_hash
    );

    let scope = format!(
        "{}/{}/{}/aws4_request",
        date, credentials.region, credentials.service
    );
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        sha256_hex(canonical_request.as_bytes())
    );

    let key = signing_key(
        &credentials.secret_key,
        &date,
        &credentials.region,
        &credentials.service,
    )?;
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);

    let authorization = format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, credentials.access_key, scope, SIGNED_HEADERS, signature
    );

    Ok(vec![
        ("host".to_string(), host),
        ("x-amz-date".to_string(), amz_date),
        ("x-amz-content-sha256".to_string(), payload_hash),
        ("authorization".to_string(), authorization),
    ])
}
