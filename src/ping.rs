//! Calling the system `ping` tool and making sense of what it prints.

use std::{future::Future, process::Stdio, time::Duration};

use tokio::process::Command;

use crate::error::{Error, Result};

/// Extra wall-clock time a ping process gets on top of its own timeout
/// before it is killed.
const KILL_GRACE: Duration = Duration::from_secs(5);

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Which family of `ping` output and flags to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Unix,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressFamily {
    #[default]
    V4,
    V6,
}

/// Round trip times in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rtt {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

/// Parse the summary printed by `ping`.
///
/// Returns `None` for anything that doesn't look like a summary, which is
/// what happens when the host didn't answer or the output is localized in a
/// way we don't understand.
pub fn parse(output: &str, platform: Platform) -> Option<Rtt> {
    let last = output.lines().rev().find(|l| !l.trim().is_empty())?;
    match platform {
        Platform::Unix => parse_unix(last),
        Platform::Windows => parse_windows(last),
    }
}

// rtt min/avg/max/mdev = 100.131/111.721/163.633/20.372 ms
fn parse_unix(line: &str) -> Option<Rtt> {
    let (_, values) = line.rsplit_once('=')?;
    let values = values
        .split_whitespace()
        .next()?
        .split('/')
        .map(latency)
        .collect::<Option<Vec<_>>>()?;

    match values[..] {
        [min, avg, max, ..] => Some(Rtt { min, avg, max }),
        _ => None,
    }
}

/// Summary labels in the order Windows prints them.
const WINDOWS_LABELS: [&str; 3] = ["minimum", "maximum", "average"];

// Minimum = 98ms, Maximum = 98ms, Average = 98ms
fn parse_windows(line: &str) -> Option<Rtt> {
    let mut labeled = Vec::with_capacity(3);
    for segment in line.split(',') {
        let (label, rest) = segment.split_once('=')?;
        let (value, _) = rest.split_once("ms")?;
        labeled.push((label.trim().to_ascii_lowercase(), latency(value)?));
    }

    let [(_, first), (_, second), (_, third)] = labeled[..] else {
        return None;
    };

    let by_label = |name: &str| labeled.iter().find(|(label, _)| label == name).map(|(_, v)| *v);
    // Positional fallback only if every recognized label is in its native slot.
    let native_order = labeled
        .iter()
        .zip(WINDOWS_LABELS)
        .all(|((label, _), native)| label == native || !WINDOWS_LABELS.contains(&label.as_str()));

    match (by_label("minimum"), by_label("average"), by_label("maximum")) {
        (Some(min), Some(avg), Some(max)) => Some(Rtt { min, avg, max }),
        // Localized labels, fall back to the order Windows prints them in.
        _ if native_order => Some(Rtt {
            min: first,
            avg: third,
            max: second,
        }),
        _ => None,
    }
}

/// A single round trip time, which has to be a finite, non-negative number.
fn latency(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

#[derive(Debug, Clone)]
pub struct PingRequest {
    pub count: u32,
    pub timeout: Duration,
    pub family: AddressFamily,
}

/// Something that can measure the round trip time to an address.
///
/// `Ok(None)` means the address could not be reached. `Err` is reserved for
/// failures that make probing impossible altogether.
pub trait Pinger {
    fn ping(&self, address: &str, request: &PingRequest) -> impl Future<Output = Result<Option<Rtt>>>;
}

/// Shells out to the operating system's `ping`.
#[derive(Debug, Clone)]
pub struct SystemPing {
    pub program: String,
    pub platform: Platform,
}

impl SystemPing {
    pub fn new(program: impl Into<String>, platform: Platform) -> Self {
        Self {
            program: program.into(),
            platform,
        }
    }

    pub fn args(&self, address: &str, request: &PingRequest) -> Vec<String> {
        let mut args = match self.platform {
            // e.g.: ping 0.0.0.0 -nqc 1 -W 10
            Platform::Unix => vec![
                address.to_owned(),
                "-nqc".to_owned(),
                request.count.to_string(),
                "-W".to_owned(),
                unix_wait(request.timeout),
            ],
            // e.g.: ping 0.0.0.0 -n 1 -w 10000
            Platform::Windows => vec![
                address.to_owned(),
                "-n".to_owned(),
                request.count.to_string(),
                "-w".to_owned(),
                request.timeout.as_millis().to_string(),
            ],
        };

        if request.family == AddressFamily::V6 {
            args.push("-6".to_owned());
        }
        args
    }
}

// BSD-derived `ping` on macOS takes `-W` in milliseconds, iputils takes seconds.
fn unix_wait(timeout: Duration) -> String {
    if cfg!(target_os = "macos") {
        timeout.as_millis().to_string()
    } else {
        timeout.as_secs_f64().to_string()
    }
}

impl Pinger for SystemPing {
    async fn ping(&self, address: &str, request: &PingRequest) -> Result<Option<Rtt>> {
        let child = Command::new(&self.program)
            .args(self.args(address, request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::PingUnavailable {
                program: self.program.clone(),
                source,
            })?;

        let output = match tokio::time::timeout(request.timeout + KILL_GRACE, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::warn!(address, "Failed to wait for ping: {e}");
                return Ok(None);
            }
            Err(_) => {
                tracing::debug!(address, "ping did not exit in time");
                return Ok(None);
            }
        };

        if !output.status.success() {
            tracing::debug!(address, status = %output.status, "ping failed");
            return Ok(None);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let rtt = parse(&stdout, self.platform);
        if rtt.is_none() {
            tracing::debug!(address, "Could not parse ping output");
        }
        Ok(rtt)
    }
}
