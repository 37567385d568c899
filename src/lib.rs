//! Latency testing and relay selection for Mullvad VPN.
//!
//! The relay list is narrowed down with [filter::Conditions], each remaining
//! relay is pinged through a [ping::Pinger], and the results are ranked by
//! [ranking::Ranking] so the fastest (or a random reachable) relay can be
//! handed to the `mullvad` CLI.

pub mod api;
pub mod cache;
pub mod cli;
pub mod display;
pub mod error;
pub mod filter;
pub mod mullvad;
pub mod ping;
pub mod ranking;

pub use error::{Error, Result};
