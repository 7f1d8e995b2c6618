use std::collections::HashMap;

use log::{debug, info};

use crate::error::Result;
use crate::provider::{DnsProvider, Zone};
use crate::request::UpdateRequest;

// Strictly sequential: the first failure aborts the remaining IPs and hostnames.
pub async fn apply(provider: &dyn DnsProvider, request: &UpdateRequest) -> Result<()> {
    for ip in &request.ips {
        update_ip(provider, request, ip).await?;
    }
    Ok(())
}

pub async fn update_ip(provider: &dyn DnsProvider, request: &UpdateRequest, ip: &str) -> Result<()> {
    update(provider, &request.hostnames, ip, request.username.as_deref()).await?;

    if let Some((account_id, group_id)) = request.access_group() {
        let entry = allow_list_entry(ip);
        provider
            .update_access_group(account_id, group_id, &entry)
            .await?;
        info!("Access group {} now allows {}", group_id, entry);
    }
    Ok(())
}

pub async fn update(
    provider: &dyn DnsProvider,
    hostnames: &[String],
    ip: &str,
    username: Option<&str>,
) -> Result<()> {
    let is_ipv4 = is_ipv4(ip);
    // Zone cache lives for this call only
    let mut zones: HashMap<&str, Zone> = HashMap::new();

    for hostname in hostnames {
        let domain = owning_domain(hostname, username);
        let zone = match zones.get(domain) {
            Some(zone) => {
                debug!("Zone cache hit for {}", domain);
                zone.clone()
            }
            None => {
                let zone = provider.find_zone(domain).await?;
                debug!("Resolved zone {} ({}) for {}", zone.name, zone.id, hostname);
                zones.insert(domain, zone.clone());
                zone
            }
        };

        let record = provider.find_record(&zone, hostname, is_ipv4).await?;
        // Sent even when the content already matches
        provider.update_record(&record, ip).await?;
        info!(
            "Updated {} record {} from {} to {}",
            record.record_type.as_str(),
            hostname,
            record.content,
            ip
        );
    }
    Ok(())
}

// A dot anywhere means IPv4; the provider rejects malformed addresses.
pub fn is_ipv4(ip: &str) -> bool {
    ip.contains('.')
}

// An authenticated username that suffixes the hostname is the domain verbatim.
// Otherwise the last two labels, which is wrong for suffixes such as `co.uk`.
pub fn owning_domain<'a>(hostname: &'a str, username: Option<&'a str>) -> &'a str {
    match username {
        Some(username) if !username.is_empty() && hostname.ends_with(username) => username,
        _ => last_two_labels(hostname),
    }
}

fn last_two_labels(hostname: &str) -> &str {
    match hostname.rmatch_indices('.').nth(1) {
        Some((idx, _)) => &hostname[idx + 1..],
        None => hostname,
    }
}

// Replaces the whole allow-list, whatever the address family.
fn allow_list_entry(ip: &str) -> String {
    format!("{ip}/32")
}
