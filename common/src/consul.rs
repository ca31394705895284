use serde::Deserialize;

use crate::error::Error;

/// KV prefix consul-template stores dedup data under.
pub const DEDUP_PREFIX: &str = "consul-template/dedup";

/// One record of Consul's `/v1/kv` JSON response. Only `Value` is consumed
/// by the pipeline; the index fields ride along for callers that want them.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KvEntry {
    #[serde(default)]
    pub lock_index: u64,
    pub key: String,
    #[serde(default)]
    pub flags: u64,
    /// Base64-encoded raw bytes, `null` for keys without a value.
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub create_index: u64,
    #[serde(default)]
    pub modify_index: u64,
}

impl KvEntry {
    /// Decodes the base64 `Value` field into raw bytes. A missing value
    /// decodes to an empty buffer, matching what Consul stores for it.
    pub fn decoded_value(&self) -> Result<Vec<u8>, Error> {
        Ok(base64::decode(self.value.as_deref().unwrap_or(""))?)
    }
}

/// Builds the dedup data URL for a store address and a template fingerprint.
pub fn dedup_data_url(addr: &str, fingerprint: &str) -> String {
    format!("https://{}/v1/kv/{}/{}/data", addr, DEDUP_PREFIX, fingerprint)
}

/// Thin synchronous client for the one read this tool performs.
pub struct KvClient {
    http: reqwest::blocking::Client,
}

impl KvClient {
    /// `insecure` turns off TLS certificate verification. That matches the
    /// trust-everything behavior of older tooling around this endpoint, but
    /// it means anyone on the path can impersonate the store, so it is
    /// opt-in here.
    pub fn new(insecure: bool) -> Result<Self, Error> {
        let http = reqwest::blocking::Client::builder()
            .danger_accept_invalid_certs(insecure)
            // One request per run; let it take as long as the store needs.
            .timeout(None)
            .build()
            .map_err(Error::HttpClient)?;
        Ok(KvClient { http })
    }

    /// Fetches the dedup entry for `fingerprint` and returns its raw value
    /// bytes. Consul answers a key read with a JSON array; exactly one
    /// element is expected here since the key embeds a content hash.
    pub fn fetch_dedup_data(&self, addr: &str, fingerprint: &str) -> Result<Vec<u8>, Error> {
        let url = dedup_data_url(addr, fingerprint);
        let resp = self
            .http
            .get(&url)
            .send()
            .map_err(|source| Error::Network {
                url: url.clone(),
                source,
            })?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = resp.text().map_err(|source| Error::Network {
            url: url.clone(),
            source,
        })?;

        let entries: Vec<KvEntry> = serde_json::from_str(&body)?;
        first_entry(entries, fingerprint)?.decoded_value()
    }
}

/// An empty result is an explicit error, not an index panic. More than one
/// entry should not happen for a hashed key, but if it does we warn and
/// keep the first.
fn first_entry(entries: Vec<KvEntry>, fingerprint: &str) -> Result<KvEntry, Error> {
    if entries.len() > 1 {
        tracing::warn!(
            count = entries.len(),
            fingerprint,
            "expected exactly one dedup entry, using the first"
        );
    }
    entries.into_iter().next().ok_or_else(|| Error::NoEntry {
        fingerprint: fingerprint.to_owned(),
    })
}
