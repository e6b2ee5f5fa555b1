//! Startup connectivity check with exponential backoff

use super::GraphGateway;
use crate::error::{IngestError, IngestResult};
use std::time::Duration;
use tracing::{info, warn};

/// How hard to try before the first write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
}

impl Default for ConnectivityPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_delay: Duration::from_millis(500),
        }
    }
}

impl ConnectivityPolicy {
    /// Wait after failed attempt `attempt` (0-based): `initial * 2^attempt`
    pub fn delay(&self, attempt: u32) -> Duration {
        self.initial_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Ping the gateway until it answers. Exhausting the policy is fatal.
pub async fn verify_connectivity(
    gateway: &dyn GraphGateway,
    policy: &ConnectivityPolicy,
) -> IngestResult<()> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    loop {
        match gateway.ping().await {
            Ok(()) => {
                info!("Database '{}' is reachable", gateway.database());
                return Ok(());
            }
            Err(e) => {
                warn!(
                    "Attempt {}/{} for database '{}': could not connect: {}",
                    attempt + 1,
                    attempts,
                    gateway.database(),
                    e
                );
                if attempt + 1 >= attempts {
                    return Err(IngestError::Connectivity {
                        attempts,
                        source: e,
                    });
                }
                tokio::time::sleep(policy.delay(attempt)).await;
                attempt += 1;
            }
        }
    }
}
