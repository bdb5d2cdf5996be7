//! S3 object upload over plain HTTPS, signed with AWS Signature Version 4.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, Url};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::{S3Config, S3Credentials};
use crate::error::ExportError;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("S3 error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Invalid object URL: {0}")]
    InvalidUrl(String),
}

#[derive(Clone)]
pub struct S3Uploader {
    client: Client,
    credentials: S3Credentials,
    endpoint: Option<String>,
    key_prefix: String,
}

impl std::fmt::Debug for S3Uploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Uploader")
            .field("bucket", &self.credentials.bucket)
            .field("region", &self.credentials.region)
            .field("endpoint", &self.endpoint)
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl S3Uploader {
    /// Fails with the name of the first missing bucket or AWS setting.
    pub fn new(config: &S3Config) -> Result<Self, ExportError> {
        let credentials = config.credentials()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(UploadError::from)?;

        Ok(Self {
            client,
            credentials,
            endpoint: config
                .endpoint
                .as_ref()
                .map(|e| e.trim_end_matches('/').to_string()),
            key_prefix: config.key_prefix.clone().unwrap_or_default(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.credentials.bucket
    }

    pub fn object_key(&self, file_name: &str) -> String {
        format!("{}{}", self.key_prefix, file_name)
    }

    /// Virtual-hosted style against AWS, path style against a custom endpoint.
    fn object_url(&self, key: &str) -> Result<Url, UploadError> {
        let encoded_key = uri_encode(key, false);
        let raw = match &self.endpoint {
            Some(endpoint) => format!(
                "{}/{}/{}",
                endpoint,
                uri_encode(&self.credentials.bucket, true),
                encoded_key
            ),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.credentials.bucket, self.credentials.region, encoded_key
            ),
        };
        Url::parse(&raw).map_err(|e| UploadError::InvalidUrl(format!("{}: {}", raw, e)))
    }

    /// PUT `body` under `file_name` and return its `s3://` URI.
    pub async fn put_object(&self, file_name: &str, body: &[u8]) -> Result<String, UploadError> {
        let key = self.object_key(file_name);
        let url = self.object_url(&key)?;
        let signed = sign_put(&url, body, &self.credentials, Utc::now())?;

        let mut request = self
            .client
            .put(url.clone())
            .header("x-amz-date", &signed.amz_date)
            .header("x-amz-content-sha256", &signed.payload_hash)
            .header("authorization", &signed.authorization)
            .header("content-type", "text/plain; charset=utf-8")
            .body(body.to_vec());

        if let Some(token) = &self.credentials.session_token {
            request = request.header("x-amz-security-token", token);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(400)
                .collect();
            tracing::error!(code = status.as_u16(), key = %key, "S3 upload rejected");
            return Err(UploadError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let uri = format!("s3://{}/{}", self.credentials.bucket, key);
        tracing::info!(uri = %uri, bytes = body.len(), "Uploaded to S3");
        Ok(uri)
    }
}

// ============================================================================
// Signature V4
// ============================================================================

#[derive(Debug, Clone)]
struct SignedHeaders {
    amz_date: String,
    payload_hash: String,
    authorization: String,
}

fn sign_put(
    url: &Url,
    body: &[u8],
    credentials: &S3Credentials,
    now: DateTime<Utc>,
) -> Result<SignedHeaders, UploadError> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let payload_hash = hex::encode(Sha256::digest(body));

    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => return Err(UploadError::InvalidUrl(url.to_string())),
    };

    let mut headers: Vec<(&str, &str)> = vec![
        ("host", host.as_str()),
        ("x-amz-content-sha256", payload_hash.as_str()),
        ("x-amz-date", amz_date.as_str()),
    ];
    if let Some(token) = &credentials.session_token {
        headers.push(("x-amz-security-token", token.as_str()));
    }
    headers.sort_by(|a, b| a.0.cmp(b.0));

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "PUT\n{}\n{}\n{}\n{}\n{}",
        url.path(),
        url.query().unwrap_or(""),
        canonical_headers,
        signed_headers,
        payload_hash
    );

    let scope = format!("{}/{}/{}/aws4_request", date, credentials.region, SERVICE);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let signing_key = derive_signing_key(
        &credentials.secret_access_key,
        &date,
        &credentials.region,
        SERVICE,
    );
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

    let authorization = format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, credentials.access_key_id, scope, signed_headers, signature
    );

    Ok(SignedHeaders {
        amz_date,
        payload_hash,
        authorization,
    })
}

fn derive_signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Percent-encode everything except unreserved characters (and `/` unless
/// `encode_slash`), as SigV4 canonical URIs require.
fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
