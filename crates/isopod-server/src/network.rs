//! Local address discovery for the startup banner

use std::net::Ipv4Addr;
use std::process::Command;

use anyhow::Result;
use tracing::debug;

/// List the host's non-loopback IPv4 addresses, in the order the OS reports
/// them. Queried once at startup so the operator sees every address the
/// server can be reached on.
pub fn local_ipv4_addresses() -> Result<Vec<String>> {
    // `ip -j -4 addr show` returns JSON like:
    // [{"ifname":"lo","addr_info":[{"local":"127.0.0.1","prefixlen":8,...}]},
    //  {"ifname":"eth0","addr_info":[{"local":"10.7.1.37","prefixlen":24,...}]}]
    let output = Command::new("ip").args(["-j", "-4", "addr", "show"]).output()?;

    if !output.status.success() {
        anyhow::bail!("Failed to run 'ip -j -4 addr show'");
    }

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let addresses = parse_addresses(&json);
    debug!("Local IPv4 addresses: [{}]", addresses.join(", "));
    Ok(addresses)
}

fn parse_addresses(json: &serde_json::Value) -> Vec<String> {
    let mut addresses = Vec::new();
    let Some(interfaces) = json.as_array() else {
        return addresses;
    };

    for iface in interfaces {
        let Some(addr_info) = iface["addr_info"].as_array() else {
            continue;
        };
        for info in addr_info {
            let Some(local) = info["local"].as_str() else {
                continue;
            };
            let Ok(ip) = local.parse::<Ipv4Addr>() else {
                continue;
            };
            if ip.is_loopback() {
                continue;
            }
            addresses.push(local.to_string());
        }
    }

    addresses
}
