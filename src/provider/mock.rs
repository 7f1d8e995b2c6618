use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{DnsProvider, DnsRecord, ProviderFactory, RecordType, Zone};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FindZone(String),
    FindRecord { zone_id: String, name: String, record_type: RecordType },
    UpdateRecord { record_id: String, content: String },
    UpdateAccessGroup { account_id: String, group_id: String, ip: String },
}

#[derive(Debug, Default)]
struct State {
    zones: HashMap<String, Zone>,
    records: Vec<DnsRecord>,
    calls: Vec<Call>,
    tokens: Vec<String>,
    fail_access_group: bool,
}

// Clones share the zone table and the call log
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    state: Arc<Mutex<State>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_zone(self, id: &str, name: &str) -> Self {
        self.state.lock().unwrap().zones.insert(
            name.to_string(),
            Zone {
                id: id.to_string(),
                name: name.to_string(),
            },
        );
        self
    }

    pub fn with_record(self, zone_id: &str, name: &str, record_type: RecordType, content: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let id = format!("rec-{}", state.records.len() + 1);
            state.records.push(DnsRecord {
                id,
                zone_id: zone_id.to_string(),
                record_type,
                name: name.to_string(),
                content: content.to_string(),
                proxied: true,
                ttl: 120,
            });
        }
        self
    }

    pub fn failing_access_group(self) -> Self {
        self.state.lock().unwrap().fail_access_group = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.state.lock().unwrap().tokens.clone()
    }

    pub fn record(&self, name: &str, record_type: RecordType) -> Option<DnsRecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .find(|r| r.name == name && r.record_type == record_type)
            .cloned()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }
}

#[async_trait]
impl DnsProvider for MockProvider {
    async fn find_zone(&self, name: &str) -> Result<Zone> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::FindZone(name.to_string()));
        state
            .zones
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("Failed to find zone '{name}'")))
    }

    async fn find_record(&self, zone: &Zone, name: &str, is_ipv4: bool) -> Result<DnsRecord> {
        let record_type = RecordType::for_ipv4(is_ipv4);
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::FindRecord {
            zone_id: zone.id.clone(),
            name: name.to_string(),
            record_type,
        });
        state
            .records
            .iter()
            .find(|r| r.zone_id == zone.id && r.name == name && r.record_type == record_type)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("Failed to find dns record '{name}'")))
    }

    async fn update_record(&self, record: &DnsRecord, content: &str) -> Result<DnsRecord> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::UpdateRecord {
            record_id: record.id.clone(),
            content: content.to_string(),
        });
        let stored = state
            .records
            .iter_mut()
            .find(|r| r.id == record.id)
            .ok_or_else(|| Error::not_found(format!("Failed to find dns record '{}'", record.name)))?;
        stored.content = content.to_string();
        Ok(stored.clone())
    }

    async fn update_access_group(&self, account_id: &str, group_id: &str, ip: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::UpdateAccessGroup {
            account_id: account_id.to_string(),
            group_id: group_id.to_string(),
            ip: ip.to_string(),
        });
        if state.fail_access_group {
            return Err(Error::upstream("access group update rejected", Some(502)));
        }
        Ok(())
    }
}

impl ProviderFactory for MockProvider {
    fn connect(&self, token: &str) -> Box<dyn DnsProvider> {
        self.state.lock().unwrap().tokens.push(token.to_string());
        Box::new(self.clone())
    }
}
