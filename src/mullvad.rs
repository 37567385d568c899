use std::process::Stdio;

use tokio::process::Command;

use crate::error::{Error, Result};

pub const DEFAULT_PROGRAM: &str = "mullvad";

/// The `mullvad` command line client.
#[derive(Debug, Clone)]
pub struct MullvadCli {
    program: String,
}

impl MullvadCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Constrain the relay location to a single relay.
    pub async fn set_relay(&self, hostname: &str) -> Result<()> {
        let activation_error = |reason: String| Error::Activation {
            hostname: hostname.to_owned(),
            reason,
        };

        let status = Command::new(&self.program)
            .args(["relay", "set", "location", hostname])
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| activation_error(format!("failed to run `{}`: {e}", self.program)))?;

        if !status.success() {
            return Err(activation_error(format!("`{}` exited with {status}", self.program)));
        }

        tracing::info!(hostname, "Relay location updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_client_is_reported() {
        let cli = MullvadCli::new("/nonexistent/mullvad");
        let err = cli.set_relay("se-got-wg-001").await.unwrap_err();

        assert!(matches!(err, Error::Activation { ref hostname, .. } if hostname == "se-got-wg-001"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_client_is_reported() {
        let cli = MullvadCli::new("false");
        assert!(matches!(cli.set_relay("x").await, Err(Error::Activation { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_client() {
        let cli = MullvadCli::new("true");
        assert!(cli.set_relay("x").await.is_ok());
    }
}
