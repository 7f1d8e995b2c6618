pub mod cloudflare;
#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordType {
    A,
    #[allow(clippy::upper_case_acronyms)]
    AAAA,
}

impl RecordType {
    pub fn for_ipv4(is_ipv4: bool) -> Self {
        if is_ipv4 {
            Self::A
        } else {
            Self::AAAA
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::AAAA => "AAAA",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DnsRecord {
    pub id: String,
    // Filled from the zone lookup; record listings may omit it.
    #[serde(default)]
    pub zone_id: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub proxied: bool,
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

// 1 means "automatic"
fn default_ttl() -> u32 {
    1
}

// Missing zone or record is `UpstreamNotFound`; every other failure is `Upstream`.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    async fn find_zone(&self, name: &str) -> Result<Zone>;

    async fn find_record(&self, zone: &Zone, name: &str, is_ipv4: bool) -> Result<DnsRecord>;

    async fn update_record(&self, record: &DnsRecord, content: &str) -> Result<DnsRecord>;

    async fn update_access_group(&self, account_id: &str, group_id: &str, ip: &str) -> Result<()>;
}

pub trait ProviderFactory: Send + Sync {
    fn connect(&self, token: &str) -> Box<dyn DnsProvider>;
}
