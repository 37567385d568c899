//! Relay records as served by the Mullvad relay directory.

use serde::{Deserialize, Serialize};

pub const RELAYS_URL: &str = "https://api.mullvad.net/www/relays/all/";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RelayType {
    Wireguard,
    Openvpn,
    Bridge,
    #[serde(other)]
    Unknown,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Relay {
    pub hostname: String,
    #[serde(rename = "type", default)]
    pub relay_type: Option<RelayType>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub country_name: Option<String>,
    #[serde(default)]
    pub city_code: Option<String>,
    #[serde(default)]
    pub city_name: Option<String>,
    #[serde(default)]
    pub ipv4_addr_in: Option<String>,
    #[serde(default)]
    pub ipv6_addr_in: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    /// Port speed in Gbps.
    #[serde(default)]
    pub network_port_speed: Option<f64>,
    #[serde(default)]
    pub owned: Option<bool>,
    #[serde(default)]
    pub stboot: Option<bool>,
}

impl Relay {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ..Self::default()
        }
    }
}

/// Deserialize a raw relay list, skipping records that are not usable relays.
///
/// A single malformed entry (e.g. one without a hostname) should not make the
/// whole directory unusable, so those are dropped with a warning.
pub fn relays_from_values(values: Vec<serde_json::Value>) -> Vec<Relay> {
    values
        .into_iter()
        .filter_map(|value| {
            serde_json::from_value::<Relay>(value)
                .inspect_err(|e| tracing::warn!("Skipping malformed relay entry: {e}"))
                .ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_directory_entry() {
        let value = json!({
            "hostname": "se-got-wg-001",
            "country_code": "se",
            "country_name": "Sweden",
            "city_code": "got",
            "city_name": "Gothenburg",
            "fqdn": "se-got-wg-001.relays.mullvad.net",
            "active": true,
            "owned": true,
            "provider": "31173",
            "ipv4_addr_in": "185.213.154.66",
            "ipv6_addr_in": "2a03:1b20:5:f011::a01f",
            "network_port_speed": 10,
            "stboot": true,
            "type": "wireguard",
            "status_messages": []
        });

        let relays = relays_from_values(vec![value]);
        assert_eq!(relays.len(), 1);

        let relay = &relays[0];
        assert_eq!(relay.hostname, "se-got-wg-001");
        assert_eq!(relay.relay_type, Some(RelayType::Wireguard));
        assert_eq!(relay.network_port_speed, Some(10.0));
        assert_eq!(relay.ipv6_addr_in.as_deref(), Some("2a03:1b20:5:f011::a01f"));
    }

    #[test]
    fn unknown_type_and_missing_fields_are_tolerated() {
        let relays = relays_from_values(vec![json!({ "hostname": "x", "type": "shadowsocks" })]);

        assert_eq!(relays[0].relay_type, Some(RelayType::Unknown));
        assert_eq!(relays[0].active, None);
        assert_eq!(relays[0].ipv4_addr_in, None);
    }

    #[test]
    fn entries_without_hostname_are_skipped() {
        let relays = relays_from_values(vec![
            json!({ "type": "wireguard" }),
            json!({ "hostname": "kept", "type": "openvpn" }),
            json!(42),
        ]);

        assert_eq!(relays.len(), 1);
        assert_eq!(relays[0].hostname, "kept");
    }
}
