//! Table output for relay results.

use std::{fmt, str::FromStr};

use crate::{api::RelayType, error::Error, ranking::ProbedRelay};

/// Width reserved for the latency column, results arrive after the table is laid out.
const LATENCY_WIDTH: usize = 10;

const MISSING: &str = "error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Hostname,
    Ipv4,
    Ipv6,
    CountryCode,
    CityCode,
    Provider,
    Latency,
    Owned,
    Bandwidth,
    CountryName,
    CityName,
    Stboot,
    Type,
}

impl Attribute {
    pub const ALL: [Attribute; 13] = [
        Attribute::Hostname,
        Attribute::Ipv4,
        Attribute::Ipv6,
        Attribute::CountryCode,
        Attribute::CityCode,
        Attribute::Provider,
        Attribute::Latency,
        Attribute::Owned,
        Attribute::Bandwidth,
        Attribute::CountryName,
        Attribute::CityName,
        Attribute::Stboot,
        Attribute::Type,
    ];

    pub const SHORT: &[Attribute] = &[Attribute::Hostname, Attribute::Latency];

    pub const LONG: &[Attribute] = &[
        Attribute::Hostname,
        Attribute::Latency,
        Attribute::CountryName,
        Attribute::CityName,
        Attribute::Provider,
        Attribute::Owned,
        Attribute::Stboot,
    ];

    /// Identifier accepted by `--format`.
    pub fn id(self) -> &'static str {
        match self {
            Attribute::Hostname => "h",
            Attribute::Ipv4 => "4",
            Attribute::Ipv6 => "6",
            Attribute::CountryCode => "c",
            Attribute::CityCode => "C",
            Attribute::Provider => "p",
            Attribute::Latency => "l",
            Attribute::Owned => "O",
            Attribute::Bandwidth => "b",
            Attribute::CountryName => "cf",
            Attribute::CityName => "Cf",
            Attribute::Stboot => "s",
            Attribute::Type => "t",
        }
    }

    /// The cell text for `relay`, `None` if the value is missing.
    pub fn render(self, probed: &ProbedRelay) -> Option<String> {
        let relay = &probed.relay;
        match self {
            Attribute::Hostname => Some(relay.hostname.clone()),
            Attribute::Ipv4 => relay.ipv4_addr_in.clone(),
            Attribute::Ipv6 => relay.ipv6_addr_in.clone(),
            Attribute::CountryCode => relay.country_code.clone(),
            Attribute::CityCode => relay.city_code.clone(),
            Attribute::Provider => relay.provider.clone(),
            Attribute::Latency => probed.round_trip_time.map(format_latency),
            Attribute::Owned => relay
                .owned
                .map(|owned| if owned { "Owned" } else { "Rented" }.to_owned()),
            Attribute::Bandwidth => relay.network_port_speed.map(|b| format!("{b} Gbps")),
            Attribute::CountryName => relay.country_name.clone(),
            Attribute::CityName => relay.city_name.clone(),
            Attribute::Stboot => relay
                .stboot
                .map(|stboot| if stboot { "RAM" } else { "Disk" }.to_owned()),
            Attribute::Type => Some(
                match relay.relay_type {
                    Some(RelayType::Wireguard) => "WireGuard",
                    Some(RelayType::Openvpn) => "OpenVPN",
                    Some(RelayType::Bridge) => "Bridge",
                    Some(RelayType::Unknown) | None => "Unknown",
                }
                .to_owned(),
            ),
        }
    }
}

impl FromStr for Attribute {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Attribute::ALL
            .into_iter()
            .find(|a| a.id() == s)
            .ok_or_else(|| Error::UnknownAttribute(s.to_owned()))
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

pub fn format_latency(rtt: f64) -> String {
    format!("{rtt:.3}ms")
}

/// Unrounded latency for the summary lines, e.g. `42.0ms`.
pub fn format_raw_latency(rtt: f64) -> String {
    format!("{rtt:?}ms")
}

/// Column layout for a set of relays.
#[derive(Debug, Clone)]
pub struct Table {
    columns: Vec<(Attribute, usize)>,
}

impl Table {
    pub fn new(attributes: &[Attribute], relays: &[ProbedRelay]) -> Self {
        let columns = attributes
            .iter()
            .map(|&attribute| {
                let width = match attribute {
                    Attribute::Latency => LATENCY_WIDTH,
                    _ => relays
                        .iter()
                        .map(|r| attribute.render(r).map_or(MISSING.len(), |s| s.chars().count()))
                        .max()
                        .unwrap_or_default(),
                };
                (attribute, width)
            })
            .collect();
        Self { columns }
    }

    pub fn top(&self) -> String {
        self.border('┌', '┬', '┐')
    }

    pub fn bottom(&self) -> String {
        self.border('└', '┴', '┘')
    }

    fn border(&self, start: char, middle: char, end: char) -> String {
        if self.columns.is_empty() {
            return String::new();
        }

        let inner = self
            .columns
            .iter()
            .map(|(_, width)| "─".repeat(width + 2))
            .collect::<Vec<_>>()
            .join(&middle.to_string());
        format!("{start}{inner}{end}")
    }

    pub fn row(&self, relay: &ProbedRelay) -> String {
        let mut line = String::from("│");
        for &(attribute, width) in &self.columns {
            let cell = attribute.render(relay).unwrap_or_else(|| MISSING.to_owned());
            line.push_str(&format!(" {cell:width$} │"));
        }
        line
    }

    /// A complete box around `relays`.
    pub fn render<'a>(&self, relays: impl IntoIterator<Item = &'a ProbedRelay>) -> String {
        let mut lines = vec![self.top()];
        lines.extend(relays.into_iter().map(|r| self.row(r)));
        lines.push(self.bottom());
        lines.join("\n")
    }
}
