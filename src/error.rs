//! Errors that abort a run.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("The conditions specified resulted in no relays")]
    NoRelays,

    #[error("No relay could be reached")]
    NoneReachable,

    /// Lowest-latency selection was asked for without testing latency.
    #[error("Latency was not tested, so no lowest latency relay is known")]
    LatencyRequired,

    #[error("The `{program}` program could not be called")]
    PingUnavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "An error occurred while trying to change the Mullvad relay options to hostname {hostname}: {reason}"
    )]
    Activation { hostname: String, reason: String },

    /// City filters take `<country_code> <city_code>` pairs.
    #[error("City filters take country and city code pairs, got {0} values")]
    UnpairedCity(usize),

    #[error("Unknown attribute identifier: {0}")]
    UnknownAttribute(String),

    #[error("Use a format that contains latency to use the {0} option")]
    LatencyNotShown(&'static str),

    #[error("The '-n'/'--no-ping' option can't be used with the {0} option")]
    NoPingConflict(&'static str),

    #[error("Could not get relays")]
    Fetch(#[from] reqwest::Error),

    #[error("Relay cache error: {0}")]
    Cache(#[from] std::io::Error),

    #[error("Relay list is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
