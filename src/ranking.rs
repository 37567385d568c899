//! Probing filtered relays and ranking them by latency.

use std::{num::NonZeroUsize, time::Duration};

use futures::{StreamExt as _, stream};
use rand::{Rng, seq::SliceRandom as _};

use crate::{
    api::Relay,
    error::{Error, Result},
    ping::{AddressFamily, PingRequest, Pinger},
};

/// A relay together with the latency measured to it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbedRelay {
    pub relay: Relay,
    /// Average round trip time in milliseconds, `None` if unreachable or untested.
    pub round_trip_time: Option<f64>,
}

impl ProbedRelay {
    pub fn hostname(&self) -> &str {
        &self.relay.hostname
    }
}

impl Relay {
    pub fn address(&self, family: AddressFamily) -> Option<&str> {
        match family {
            AddressFamily::V4 => self.ipv4_addr_in.as_deref(),
            AddressFamily::V6 => self.ipv6_addr_in.as_deref(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProbeOptions {
    pub family: AddressFamily,
    pub timeout: Duration,
    /// Number of pings in flight at once.
    pub concurrency: NonZeroUsize,
}

/// Ping every relay once and annotate it with the average round trip time.
///
/// `on_result` sees the relays in input order no matter in which order the
/// probes complete.
pub async fn probe<P: Pinger>(
    relays: Vec<Relay>,
    pinger: &P,
    options: &ProbeOptions,
    mut on_result: impl FnMut(&ProbedRelay),
) -> Result<Ranking> {
    let request = PingRequest {
        count: 1,
        timeout: options.timeout,
        family: options.family,
    };
    let request = &request;

    let mut results = stream::iter(relays)
        .map(move |relay| async move {
            let rtt = match relay.address(request.family) {
                Some(address) => pinger.ping(address, request).await?,
                None => {
                    tracing::debug!(hostname = %relay.hostname, "No address for the selected IP version");
                    None
                }
            };
            Ok::<_, Error>(ProbedRelay {
                round_trip_time: rtt.map(|rtt| rtt.avg),
                relay,
            })
        })
        .buffered(options.concurrency.get());

    let mut probed = Vec::new();
    while let Some(result) = results.next().await {
        let relay = result?;
        on_result(&relay);
        probed.push(relay);
    }

    Ok(Ranking {
        relays: probed,
        tested: true,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Lowest,
    Random,
}

/// Relays in their original order, possibly annotated with latency.
#[derive(Debug, Clone)]
pub struct Ranking {
    relays: Vec<ProbedRelay>,
    tested: bool,
}

impl Ranking {
    /// Wrap relays that were never pinged.
    pub fn untested(relays: Vec<Relay>) -> Self {
        Self {
            relays: relays
                .into_iter()
                .map(|relay| ProbedRelay {
                    relay,
                    round_trip_time: None,
                })
                .collect(),
            tested: false,
        }
    }

    pub fn relays(&self) -> &[ProbedRelay] {
        &self.relays
    }

    pub fn is_tested(&self) -> bool {
        self.tested
    }

    /// Split into `(reachable, unreachable)`, both in original order.
    pub fn partition(&self) -> (Vec<&ProbedRelay>, Vec<&ProbedRelay>) {
        self.relays.iter().partition(|r| r.round_trip_time.is_some())
    }

    fn reachable(&self) -> impl Iterator<Item = (&ProbedRelay, f64)> {
        self.relays
            .iter()
            .filter_map(|r| r.round_trip_time.map(|rtt| (r, rtt)))
    }

    /// The first relay with the lowest latency.
    pub fn lowest(&self) -> Option<&ProbedRelay> {
        self.reachable()
            .reduce(|best, next| if next.1 < best.1 { next } else { best })
            .map(|(r, _)| r)
    }

    /// The first relay with the highest latency.
    pub fn highest(&self) -> Option<&ProbedRelay> {
        self.reachable()
            .reduce(|best, next| if next.1 > best.1 { next } else { best })
            .map(|(r, _)| r)
    }

    /// Unreachable relays first, then reachable ones from slowest to fastest.
    /// Relays with equal latency keep their relative order.
    pub fn descending(&self) -> Vec<&ProbedRelay> {
        let (mut reachable, mut ordered) = self.partition();
        reachable.sort_by(|a, b| {
            let (a, b) = (a.round_trip_time.unwrap_or_default(), b.round_trip_time.unwrap_or_default());
            b.total_cmp(&a)
        });
        ordered.extend(reachable);
        ordered
    }

    /// Fail if latency was tested but no relay answered.
    pub fn ensure_reachable(&self) -> Result<()> {
        if self.tested && self.reachable().next().is_none() {
            return Err(Error::NoneReachable);
        }
        Ok(())
    }

    /// Pick the relay to switch to.
    ///
    /// Random selection only draws from reachable relays when latency was
    /// tested, and from every relay otherwise.
    pub fn select<R: Rng + ?Sized>(&self, selection: Selection, rng: &mut R) -> Result<&ProbedRelay> {
        match selection {
            Selection::Lowest => {
                if !self.tested {
                    return Err(Error::LatencyRequired);
                }
                self.lowest().ok_or(Error::NoneReachable)
            }
            Selection::Random => {
                let pool: Vec<&ProbedRelay> = if self.tested {
                    self.partition().0
                } else {
                    self.relays.iter().collect()
                };
                pool.choose(rng).copied().ok_or(if self.tested {
                    Error::NoneReachable
                } else {
                    Error::NoRelays
                })
            }
        }
    }
}
