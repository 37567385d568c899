//! Relay predicates and the condition set used to narrow down the relay list.
//!
//! Predicates are plain data: a [Predicate] can be built from command line
//! input, inspected, and evaluated against any [Relay]. A predicate that
//! refers to a field the relay doesn't have is false.

use crate::api::{Relay, RelayType};

/// A relay attribute that predicates can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Hostname,
    Type,
    Active,
    CountryCode,
    CountryName,
    CityCode,
    CityName,
    Ipv4,
    Ipv6,
    Provider,
    Bandwidth,
    Owned,
    Stboot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Flag(bool),
    Number(f64),
    Kind(RelayType),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Flag(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<RelayType> for Value {
    fn from(t: RelayType) -> Self {
        Value::Kind(t)
    }
}

impl Relay {
    /// Look up a field, `None` if the relay doesn't carry it.
    pub fn get(&self, field: Field) -> Option<Value> {
        let text = |s: &Option<String>| s.clone().map(Value::Text);
        match field {
            Field::Hostname => Some(Value::Text(self.hostname.clone())),
            Field::Type => self.relay_type.map(Value::Kind),
            Field::Active => self.active.map(Value::Flag),
            Field::CountryCode => text(&self.country_code),
            Field::CountryName => text(&self.country_name),
            Field::CityCode => text(&self.city_code),
            Field::CityName => text(&self.city_name),
            Field::Ipv4 => text(&self.ipv4_addr_in),
            Field::Ipv6 => text(&self.ipv6_addr_in),
            Field::Provider => text(&self.provider),
            Field::Bandwidth => self.network_port_speed.map(Value::Number),
            Field::Owned => self.owned.map(Value::Flag),
            Field::Stboot => self.stboot.map(Value::Flag),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equals(Field, Value),
    NotEquals(Field, Value),
    /// Numeric fields only.
    AtLeast(Field, f64),
    InCity { country: String, city: String },
    Has(Field),
    Not(Box<Predicate>),
    AnyOf(Vec<Predicate>),
    AllOf(Vec<Predicate>),
}

impl Predicate {
    pub fn equals(field: Field, value: impl Into<Value>) -> Self {
        Predicate::Equals(field, value.into())
    }

    pub fn not_equals(field: Field, value: impl Into<Value>) -> Self {
        Predicate::NotEquals(field, value.into())
    }

    pub fn at_least(field: Field, value: f64) -> Self {
        Predicate::AtLeast(field, value)
    }

    pub fn in_city(country: impl Into<String>, city: impl Into<String>) -> Self {
        Predicate::InCity {
            country: country.into(),
            city: city.into(),
        }
    }

    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    pub fn evaluate(&self, relay: &Relay) -> bool {
        match self {
            Predicate::Equals(field, value) => relay.get(*field).is_some_and(|v| &v == value),
            Predicate::NotEquals(field, value) => relay.get(*field).is_some_and(|v| &v != value),
            Predicate::AtLeast(field, floor) => {
                matches!(relay.get(*field), Some(Value::Number(n)) if n >= *floor)
            }
            Predicate::InCity { country, city } => {
                Predicate::equals(Field::CountryCode, country.as_str()).evaluate(relay)
                    && Predicate::equals(Field::CityCode, city.as_str()).evaluate(relay)
            }
            Predicate::Has(field) => relay.get(*field).is_some(),
            Predicate::Not(inner) => !inner.evaluate(relay),
            Predicate::AnyOf(predicates) => predicates.iter().any(|p| p.evaluate(relay)),
            Predicate::AllOf(predicates) => predicates.iter().all(|p| p.evaluate(relay)),
        }
    }
}

/// How the sub-predicates built from a list of values are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    /// Inclusive filters, e.g. "country is FR or DE".
    Any,
    /// Exclusion filters, e.g. "hostname is not X and not Y".
    All,
}

impl Aggregate {
    pub fn combine(self, predicates: Vec<Predicate>) -> Predicate {
        match self {
            Aggregate::Any => Predicate::AnyOf(predicates),
            Aggregate::All => Predicate::AllOf(predicates),
        }
    }
}

/// An ordered set of predicates that all have to hold for a relay to be kept.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditions {
    predicates: Vec<Predicate>,
}

impl Conditions {
    /// Start from the base conditions: no bridges, and only active relays
    /// unless `include_inactive` is set.
    pub fn new(include_inactive: bool) -> Self {
        let mut predicates = vec![Predicate::not_equals(Field::Type, RelayType::Bridge)];
        if !include_inactive {
            predicates.push(Predicate::equals(Field::Active, true));
        }
        Self { predicates }
    }

    pub fn push(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    /// Build one predicate per value, combine them with `aggregate` and append
    /// the result as a single condition.
    pub fn push_each<I, T>(&mut self, values: I, build: impl Fn(T) -> Predicate, aggregate: Aggregate)
    where
        I: IntoIterator<Item = T>,
    {
        let predicates = values.into_iter().map(build).collect();
        self.push(aggregate.combine(predicates));
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn matches(&self, relay: &Relay) -> bool {
        self.predicates.iter().all(|p| p.evaluate(relay))
    }

    /// Every relay satisfying all conditions, in input order.
    pub fn apply(&self, relays: &[Relay]) -> Vec<Relay> {
        relays.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relay(hostname: &str, relay_type: RelayType) -> Relay {
        Relay {
            relay_type: Some(relay_type),
            active: Some(true),
            ..Relay::new(hostname)
        }
    }

    fn located(hostname: &str, country: &str, city: &str) -> Relay {
        Relay {
            country_code: Some(country.into()),
            city_code: Some(city.into()),
            ..relay(hostname, RelayType::Wireguard)
        }
    }

    fn hostnames(relays: &[Relay]) -> Vec<&str> {
        relays.iter().map(|r| r.hostname.as_str()).collect()
    }

    #[test]
    fn empty_aggregates() {
        let r = relay("a", RelayType::Wireguard);
        assert!(Predicate::AllOf(vec![]).evaluate(&r));
        assert!(!Predicate::AnyOf(vec![]).evaluate(&r));
    }

    #[test]
    fn absent_field_is_false_for_every_primitive() {
        let r = Relay::new("bare");

        assert!(!Predicate::equals(Field::Provider, "M247").evaluate(&r));
        assert!(!Predicate::not_equals(Field::Provider, "M247").evaluate(&r));
        assert!(!Predicate::at_least(Field::Bandwidth, 1.0).evaluate(&r));
        assert!(!Predicate::in_city("us", "nyc").evaluate(&r));
        assert!(!Predicate::Has(Field::Ipv6).evaluate(&r));
    }

    #[test]
    fn at_least_only_applies_to_numbers() {
        let r = Relay {
            network_port_speed: Some(10.0),
            ..relay("a", RelayType::Wireguard)
        };

        assert!(Predicate::at_least(Field::Bandwidth, 10.0).evaluate(&r));
        assert!(!Predicate::at_least(Field::Bandwidth, 10.5).evaluate(&r));
        assert!(!Predicate::at_least(Field::Hostname, 0.0).evaluate(&r));
    }

    #[test]
    fn base_conditions_drop_bridges_in_order() {
        let relays = vec![
            relay("a", RelayType::Wireguard),
            relay("b", RelayType::Bridge),
            relay("c", RelayType::Openvpn),
            relay("d", RelayType::Bridge),
            relay("e", RelayType::Wireguard),
        ];

        let filtered = Conditions::new(false).apply(&relays);
        assert_eq!(hostnames(&filtered), ["a", "c", "e"]);
    }

    #[test]
    fn inactive_relays_need_override() {
        let relays = vec![
            Relay {
                active: Some(false),
                ..relay("off", RelayType::Wireguard)
            },
            relay("on", RelayType::Wireguard),
        ];

        assert_eq!(hostnames(&Conditions::new(false).apply(&relays)), ["on"]);
        assert_eq!(hostnames(&Conditions::new(true).apply(&relays)), ["off", "on"]);
    }

    #[test]
    fn inclusive_values_are_or_combined() {
        let relays = vec![
            located("fr-1", "fr", "par"),
            located("de-1", "de", "fra"),
            located("se-1", "se", "got"),
        ];

        let mut conditions = Conditions::new(false);
        conditions.push_each(["fr", "de"], |c| Predicate::equals(Field::CountryCode, c), Aggregate::Any);

        assert_eq!(hostnames(&conditions.apply(&relays)), ["fr-1", "de-1"]);
    }

    #[test]
    fn exclusions_are_and_combined() {
        let relays = vec![
            relay("x", RelayType::Wireguard),
            relay("y", RelayType::Wireguard),
            relay("z", RelayType::Wireguard),
        ];

        let mut conditions = Conditions::new(false);
        conditions.push_each(["x", "y"], |h| Predicate::not_equals(Field::Hostname, h), Aggregate::All);

        assert_eq!(hostnames(&conditions.apply(&relays)), ["z"]);
    }

    #[test]
    fn city_pairs_build_one_compound_predicate_each() {
        let relays = vec![
            located("nyc", "us", "nyc"),
            located("lax", "us", "lax"),
            located("chi", "us", "chi"),
            located("wrong-country", "ca", "nyc"),
        ];

        let pairs = [("us", "nyc"), ("us", "lax")];
        let mut conditions = Conditions::new(false);
        conditions.push_each(pairs, |(country, city)| Predicate::in_city(country, city), Aggregate::Any);

        let Some(Predicate::AnyOf(cities)) = conditions.predicates().last() else {
            panic!("expected an OR-combined city condition");
        };
        assert_eq!(cities.len(), 2);
        assert_eq!(hostnames(&conditions.apply(&relays)), ["nyc", "lax"]);
    }

    #[test]
    fn city_exclusion_keeps_relays_without_location() {
        let relays = vec![located("nyc", "us", "nyc"), relay("nowhere", RelayType::Wireguard)];

        let mut conditions = Conditions::new(false);
        conditions.push_each(
            [("us", "nyc")],
            |(country, city)| Predicate::in_city(country, city).negate(),
            Aggregate::All,
        );

        assert_eq!(hostnames(&conditions.apply(&relays)), ["nowhere"]);
    }
}
