use async_trait::async_trait;
use log::{debug, error};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{DnsProvider, DnsRecord, ProviderFactory, RecordType, Zone};
use crate::error::{Error, Result};

const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

// Clients handed out by one factory share its connection pool.
#[derive(Debug, Clone)]
pub struct CloudflareFactory {
    client: Client,
    api_base: String,
}

impl CloudflareFactory {
    pub fn new() -> Self {
        Self::with_api_base(CLOUDFLARE_API_BASE)
    }

    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Default for CloudflareFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderFactory for CloudflareFactory {
    fn connect(&self, token: &str) -> Box<dyn DnsProvider> {
        Box::new(Cloudflare {
            client: self.client.clone(),
            api_base: self.api_base.clone(),
            api_token: token.to_string(),
        })
    }
}

pub struct Cloudflare {
    client: Client,
    api_base: String,
    api_token: String,
}

impl std::fmt::Debug for Cloudflare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cloudflare")
            .field("api_base", &self.api_base)
            .field("api_token", &"<REDACTED>")
            .finish()
    }
}

impl Cloudflare {
    // Sends an authenticated request and unwraps the v4 response envelope.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to send request to Cloudflare: {}", e);
                Error::upstream(format!("Failed to send request to Cloudflare: {e}"), None)
            })?;

        let status = response.status();
        debug!("Cloudflare response status: {}", status);

        let text = response.text().await.map_err(|e| {
            Error::upstream(format!("Failed to read Cloudflare response: {e}"), error_status(status))
        })?;

        let envelope: CloudflareResponse<T> = serde_json::from_str(&text).map_err(|e| {
            error!("Failed to parse Cloudflare response: {}", e);
            Error::upstream(parse_failure_reason(status), error_status(status))
        })?;

        if !status.is_success() || !envelope.success {
            let reason = envelope
                .errors
                .first()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| status_reason(status));
            let codes: Vec<String> = envelope.errors.iter().map(|e| e.code.to_string()).collect();
            error!("Cloudflare API error ({}): {} [{}]", status, reason, codes.join(", "));
            return Err(Error::upstream(reason, error_status(status)));
        }

        envelope
            .result
            .ok_or_else(|| Error::upstream("No result in Cloudflare response", None))
    }
}

#[async_trait]
impl DnsProvider for Cloudflare {
    async fn find_zone(&self, name: &str) -> Result<Zone> {
        let url = format!("{}/zones", self.api_base);
        debug!("GET {}?name={}", url, name);

        let zones: Vec<Zone> = self
            .send(self.client.get(&url).query(&[("name", name)]))
            .await?;

        zones
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("Failed to find zone '{name}'")))
    }

    async fn find_record(&self, zone: &Zone, name: &str, is_ipv4: bool) -> Result<DnsRecord> {
        let record_type = RecordType::for_ipv4(is_ipv4);
        let url = format!("{}/zones/{}/dns_records", self.api_base, zone.id);
        debug!("GET {}?name={}&type={}", url, name, record_type.as_str());

        let records: Vec<DnsRecord> = self
            .send(
                self.client
                    .get(&url)
                    .query(&[("name", name), ("type", record_type.as_str())]),
            )
            .await?;

        // Record listings no longer carry zone_id; the zone we asked is the owner.
        let mut record = records
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("Failed to find dns record '{name}'")))?;
        record.zone_id = zone.id.clone();
        Ok(record)
    }

    async fn update_record(&self, record: &DnsRecord, content: &str) -> Result<DnsRecord> {
        let url = format!(
            "{}/zones/{}/dns_records/{}",
            self.api_base, record.zone_id, record.id
        );
        debug!("PUT {}", url);

        let mut updated: DnsRecord = self
            .send(self.client.put(&url).json(&UpdateRecordRequest::new(record, content)))
            .await?;
        updated.zone_id = record.zone_id.clone();
        Ok(updated)
    }

    async fn update_access_group(&self, account_id: &str, group_id: &str, ip: &str) -> Result<()> {
        let url = format!(
            "{}/accounts/{}/access/groups/{}",
            self.api_base, account_id, group_id
        );
        debug!("PUT {}", url);

        let _: serde_json::Value = self
            .send(self.client.put(&url).json(&access_group_body(ip)))
            .await?;
        Ok(())
    }
}

// A 2xx status carries no useful error code; let the error fall back to 500.
fn error_status(status: StatusCode) -> Option<u16> {
    (!status.is_success()).then(|| status.as_u16())
}

// A body that is not JSON on a 2xx says nothing useful in its status text.
fn parse_failure_reason(status: StatusCode) -> String {
    if status.is_success() {
        "Failed to parse Cloudflare response".to_string()
    } else {
        status_reason(status)
    }
}

fn status_reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("Unknown Cloudflare error")
        .to_string()
}

fn access_group_body(ip: &str) -> serde_json::Value {
    json!({ "include": [{ "ip": { "ip": ip } }] })
}

// Cloudflare API types

#[derive(Debug, Serialize)]
struct UpdateRecordRequest<'a> {
    #[serde(rename = "type")]
    record_type: RecordType,
    name: &'a str,
    content: &'a str,
    ttl: u32,
    proxied: bool,
}

impl<'a> UpdateRecordRequest<'a> {
    fn new(record: &'a DnsRecord, content: &'a str) -> Self {
        Self {
            record_type: record.record_type,
            name: &record.name,
            content,
            ttl: record.ttl,
            proxied: record.proxied,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CloudflareResponse<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<CloudflareError>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct CloudflareError {
    code: i64,
    message: String,
}
