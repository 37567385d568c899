//! Command line arguments and the checks that happen before any network
//! activity.

use std::{num::NonZeroUsize, path::PathBuf, time::Duration};

use clap::Parser;

use crate::{
    api::{RELAYS_URL, RelayType},
    cache,
    display::Attribute,
    error::{Error, Result},
    filter::{Aggregate, Conditions, Field, Predicate},
    mullvad,
    ping::{AddressFamily, DEFAULT_TIMEOUT},
    ranking::Selection,
};

/// Batch pings utility for Mullvad VPN (not affiliated)
#[derive(Parser, Debug)]
#[command(name = "mulping", version, about, long_about = None)]
pub struct Cli {
    /// Only select servers located in the countries specified
    #[arg(short, long, num_args = 1.., value_name = "COUNTRY_CODE")]
    pub country: Option<Vec<String>>,

    /// Exclude servers located in the countries specified
    #[arg(long, num_args = 1.., value_name = "COUNTRY_CODE")]
    pub country_not: Option<Vec<String>>,

    /// Only select servers located in the cities specified, as country and city code pairs
    #[arg(short = 'C', long, num_args = 1.., value_name = "CODE")]
    pub city: Option<Vec<String>>,

    /// Exclude servers located in the cities specified, as country and city code pairs
    #[arg(long, num_args = 1.., value_name = "CODE")]
    pub city_not: Option<Vec<String>>,

    /// Only select the specified servers
    #[arg(short = 'H', long, num_args = 1..)]
    pub hostname: Option<Vec<String>>,

    /// Exclude the specified servers
    #[arg(long, num_args = 1.., value_name = "HOSTNAME")]
    pub hostname_not: Option<Vec<String>>,

    /// Only select servers using the specified providers
    #[arg(short, long, num_args = 1..)]
    pub provider: Option<Vec<String>>,

    /// Exclude servers using the specified providers
    #[arg(long, num_args = 1.., value_name = "PROVIDER")]
    pub provider_not: Option<Vec<String>>,

    /// Only select WireGuard servers
    #[arg(short, long)]
    pub wireguard: bool,

    /// Only select OpenVPN servers
    #[arg(short, long)]
    pub openvpn: bool,

    /// Only select stboot servers
    #[arg(short, long)]
    pub stboot: bool,

    /// Only select servers owned by Mullvad
    #[arg(short = 'O', long)]
    pub owned: bool,

    /// Only select servers that have at least this bandwidth speed (Gbps)
    #[arg(short, long)]
    pub bandwidth: Option<f64>,

    /// Also select servers that are currently marked as inactive
    #[arg(long)]
    pub include_inactive: bool,

    /// Show more relay attributes in the results
    #[arg(short, long)]
    pub verbose: bool,

    /// Specify the relay attributes to print in the results
    /// (h, 4, 6, c, C, p, l, O, b, cf, Cf, s, t)
    #[arg(short, long, num_args = 1.., value_name = "IDENTIFIER")]
    pub format: Option<Vec<Attribute>>,

    /// Don't show relay results box
    #[arg(short, long)]
    pub quiet: bool,

    /// Show results in order of descending latency
    #[arg(short, long)]
    pub descending: bool,

    /// Don't ping, just show the relays matching the other arguments
    #[arg(short, long)]
    pub no_ping: bool,

    /// Maximum time to wait for each ping response, in milliseconds
    #[arg(short, long, value_name = "MILLISECONDS")]
    pub timeout: Option<u64>,

    /// Use IPv6 to ping servers (requires IPv6 connectivity on both ends)
    #[arg(short = '6', long)]
    pub ipv6: bool,

    /// Number of servers to ping at the same time
    #[arg(short, long, env = "MULPING_JOBS", default_value = "1")]
    pub jobs: NonZeroUsize,

    /// Change Mullvad relay options to use the lowest latency server tested
    #[arg(short, long = "use", conflicts_with = "random")]
    pub use_lowest: bool,

    /// Change Mullvad relay options to use a random server matching the other arguments
    #[arg(short, long)]
    pub random: bool,

    /// Download the relay list even if the cached copy is still fresh
    #[arg(long)]
    pub refresh: bool,

    /// Where to fetch the relay list from
    #[arg(long, env = "MULPING_RELAYS_URL", default_value = RELAYS_URL, hide_default_value = true)]
    pub relays_url: String,

    /// Relay list cache location
    #[arg(long, env = "MULPING_CACHE_FILE")]
    pub cache_file: Option<PathBuf>,

    /// The ping program to call
    #[arg(long, env = "MULPING_PING", default_value = "ping")]
    pub ping_program: String,

    /// The Mullvad CLI program to call
    #[arg(long, env = "MULPING_MULLVAD", default_value = mullvad::DEFAULT_PROGRAM)]
    pub mullvad_program: String,
}

/// Everything needed to run, checked for consistency.
#[derive(Debug, Clone)]
pub struct Plan {
    pub conditions: Conditions,
    pub attributes: Vec<Attribute>,
    pub ping: bool,
    pub family: AddressFamily,
    pub timeout: Duration,
    pub jobs: NonZeroUsize,
    pub quiet: bool,
    pub descending: bool,
    pub selection: Option<Selection>,
    pub cache: cache::RelayCache,
    pub refresh: bool,
    pub ping_program: String,
    pub mullvad_program: String,
}

impl Cli {
    pub fn plan(self) -> Result<Plan> {
        let mut attributes = match &self.format {
            Some(format) => format.clone(),
            None if self.verbose => Attribute::LONG.to_vec(),
            None => Attribute::SHORT.to_vec(),
        };

        if !attributes.contains(&Attribute::Latency) {
            if self.use_lowest {
                return Err(Error::LatencyNotShown("'-u'/'--use'"));
            }
            if self.descending {
                return Err(Error::LatencyNotShown("'-d'/'--descending'"));
            }
        }

        if self.no_ping {
            if self.use_lowest {
                return Err(Error::NoPingConflict("'-u'/'--use'"));
            }
            if self.descending {
                return Err(Error::NoPingConflict("'-d'/'--descending'"));
            }
            attributes.retain(|a| *a != Attribute::Latency);
        }
        let ping = attributes.contains(&Attribute::Latency);

        let conditions = self.conditions()?;

        let selection = if self.use_lowest {
            Some(Selection::Lowest)
        } else if self.random {
            Some(Selection::Random)
        } else {
            None
        };

        let cache = cache::RelayCache::new(
            self.relays_url,
            self.cache_file.unwrap_or_else(cache::default_path),
        );

        Ok(Plan {
            conditions,
            attributes,
            ping,
            family: if self.ipv6 { AddressFamily::V6 } else { AddressFamily::V4 },
            timeout: self.timeout.map_or(DEFAULT_TIMEOUT, Duration::from_millis),
            jobs: self.jobs,
            quiet: self.quiet,
            descending: self.descending,
            selection,
            cache,
            refresh: self.refresh,
            ping_program: self.ping_program,
            mullvad_program: self.mullvad_program,
        })
    }

    /// Translate the filter flags into relay conditions.
    pub fn conditions(&self) -> Result<Conditions> {
        let mut conditions = Conditions::new(self.include_inactive);

        if let Some(countries) = &self.country {
            conditions.push_each(
                countries,
                |c| Predicate::equals(Field::CountryCode, c.as_str()),
                Aggregate::Any,
            );
        }
        if let Some(countries) = &self.country_not {
            conditions.push_each(
                countries,
                |c| Predicate::not_equals(Field::CountryCode, c.as_str()),
                Aggregate::All,
            );
        }

        if let Some(cities) = &self.city {
            conditions.push_each(
                city_pairs(cities)?,
                |(country, city)| Predicate::in_city(country, city),
                Aggregate::Any,
            );
        }
        if let Some(cities) = &self.city_not {
            conditions.push_each(
                city_pairs(cities)?,
                |(country, city)| Predicate::in_city(country, city).negate(),
                Aggregate::All,
            );
        }

        if let Some(hostnames) = &self.hostname {
            conditions.push_each(
                hostnames,
                |h| Predicate::equals(Field::Hostname, h.as_str()),
                Aggregate::Any,
            );
        }
        if let Some(hostnames) = &self.hostname_not {
            conditions.push_each(
                hostnames,
                |h| Predicate::not_equals(Field::Hostname, h.as_str()),
                Aggregate::All,
            );
        }

        if let Some(providers) = &self.provider {
            conditions.push_each(
                providers,
                |p| Predicate::equals(Field::Provider, p.as_str()),
                Aggregate::Any,
            );
        }
        if let Some(providers) = &self.provider_not {
            conditions.push_each(
                providers,
                |p| Predicate::not_equals(Field::Provider, p.as_str()),
                Aggregate::All,
            );
        }

        if let Some(bandwidth) = self.bandwidth {
            conditions.push(Predicate::at_least(Field::Bandwidth, bandwidth));
        }
        if self.wireguard {
            conditions.push(Predicate::equals(Field::Type, RelayType::Wireguard));
        }
        if self.openvpn {
            conditions.push(Predicate::equals(Field::Type, RelayType::Openvpn));
        }
        if self.stboot {
            conditions.push(Predicate::equals(Field::Stboot, true));
        }
        if self.owned {
            conditions.push(Predicate::equals(Field::Owned, true));
        }
        if self.ipv6 {
            conditions.push(Predicate::Has(Field::Ipv6));
        }

        Ok(conditions)
    }
}

/// Group `[country, city, country, city, ...]` into pairs.
pub fn city_pairs(values: &[String]) -> Result<Vec<(&str, &str)>> {
    if values.len() % 2 != 0 {
        return Err(Error::UnpairedCity(values.len()));
    }
    Ok(values
        .chunks_exact(2)
        .map(|pair| (pair[0].as_str(), pair[1].as_str()))
        .collect())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("mulping").chain(args.iter().copied())).unwrap()
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn city_values_pair_up_in_order() {
        let values = strings(&["US", "NYC", "US", "LAX"]);
        assert_eq!(city_pairs(&values).unwrap(), [("US", "NYC"), ("US", "LAX")]);
    }

    #[test]
    fn odd_city_values_are_rejected_before_filtering() {
        let cli = parse(&["-C", "US", "NYC", "US"]);
        assert!(matches!(cli.conditions(), Err(Error::UnpairedCity(3))));

        let cli = parse(&["--city-not", "se"]);
        assert!(matches!(cli.plan(), Err(Error::UnpairedCity(1))));
    }

    #[test]
    fn city_filter_is_one_or_of_pairs() {
        let conditions = parse(&["-C", "US", "NYC", "US", "LAX"]).conditions().unwrap();

        assert_eq!(
            conditions.predicates().last(),
            Some(&Predicate::AnyOf(vec![
                Predicate::in_city("US", "NYC"),
                Predicate::in_city("US", "LAX"),
            ]))
        );
    }

    #[test]
    fn base_conditions_come_first() {
        let conditions = parse(&["-w", "-c", "se"]).conditions().unwrap();
        let predicates = conditions.predicates();

        assert_eq!(predicates[0], Predicate::not_equals(Field::Type, RelayType::Bridge));
        assert_eq!(predicates[1], Predicate::equals(Field::Active, true));
        assert_eq!(predicates.len(), 4);
    }

    #[test]
    fn bandwidth_must_be_numeric() {
        let args = ["mulping", "-b", "fast"];
        assert!(Cli::try_parse_from(args).is_err());

        let cli = parse(&["-b", "9.5"]);
        assert_eq!(cli.bandwidth, Some(9.5));
    }

    #[test]
    fn unknown_format_identifier_is_rejected() {
        assert!(Cli::try_parse_from(["mulping", "-f", "h", "zz"]).is_err());

        let cli = parse(&["-f", "h", "Cf", "l"]);
        assert_eq!(
            cli.format,
            Some(vec![Attribute::Hostname, Attribute::CityName, Attribute::Latency])
        );
    }

    #[test]
    fn use_and_random_are_exclusive() {
        assert!(Cli::try_parse_from(["mulping", "-u", "-r"]).is_err());
    }

    #[test]
    fn default_plan() {
        let plan = parse(&[]).plan().unwrap();

        assert!(plan.ping);
        assert_eq!(plan.attributes, Attribute::SHORT);
        assert_eq!(plan.timeout, DEFAULT_TIMEOUT);
        assert_eq!(plan.family, AddressFamily::V4);
        assert_eq!(plan.selection, None);
    }

    #[test]
    fn no_ping_drops_latency() {
        let plan = parse(&["-n", "-v"]).plan().unwrap();

        assert!(!plan.ping);
        assert!(!plan.attributes.contains(&Attribute::Latency));
        assert_eq!(plan.attributes.len(), Attribute::LONG.len() - 1);
    }

    #[test]
    fn latency_actions_need_latency() {
        assert!(matches!(parse(&["-f", "h", "-u"]).plan(), Err(Error::LatencyNotShown(_))));
        assert!(matches!(parse(&["-f", "h", "-d"]).plan(), Err(Error::LatencyNotShown(_))));
        assert!(matches!(parse(&["-n", "-u"]).plan(), Err(Error::NoPingConflict(_))));
        assert!(matches!(parse(&["-n", "-d"]).plan(), Err(Error::NoPingConflict(_))));

        // Random selection works without latency, from the whole filtered list.
        let plan = parse(&["-n", "-r"]).plan().unwrap();
        assert_eq!(plan.selection, Some(Selection::Random));
    }

    #[test]
    fn ipv6_and_timeout() {
        let plan = parse(&["-6", "-t", "750"]).plan().unwrap();

        assert_eq!(plan.family, AddressFamily::V6);
        assert_eq!(plan.timeout, Duration::from_millis(750));
        assert_eq!(plan.conditions.predicates().last(), Some(&Predicate::Has(Field::Ipv6)));
    }
}
