//! Session lifecycle: pair a new device or resume a stored session.
//!
//! Two states. The session starts `Unpaired` from the core's point of view; with a stored
//! identity it connects directly, without one it runs the pairing flow first. Either way it
//! ends `Active` or the process aborts. A session the network drops later is resumed with the
//! stored identity.

use crate::channels::{ClientError, PairingEvent, ProtocolClient};
use crate::qr;
use anyhow::{Context, Result};
use std::io::Write;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unpaired,
    Active,
}

/// How hard to try restoring a dropped session before giving up.
#[derive(Debug, Clone)]
pub struct Reconnect {
    pub attempts: u32,
    /// Delay after the first failed attempt; doubles after each further failure.
    pub backoff: Duration,
}

impl Default for Reconnect {
    fn default() -> Self {
        Self {
            attempts: 5,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Bring the session to `Active`. Operator output (pairing codes, status lines) goes to `out`.
/// Every failure here is fatal to startup.
pub async fn start<W: Write + Send>(
    client: &dyn ProtocolClient,
    out: &mut W,
) -> Result<SessionState> {
    let paired = client
        .has_identity()
        .await
        .context("checking the session store for a device identity")?;
    if paired {
        log::info!("stored session found, reconnecting");
        writeln!(out, "Session found, reconnecting...")?;
        client
            .connect()
            .await
            .context("connecting with the stored session")?;
    } else {
        pair(client, out).await?;
    }
    Ok(SessionState::Active)
}

async fn pair<W: Write + Send>(client: &dyn ProtocolClient, out: &mut W) -> Result<()> {
    log::info!("no stored session, starting pairing");
    let mut events = client
        .pairing_events()
        .await
        .context("opening the pairing stream")?;
    client.connect().await.context("connecting for pairing")?;

    while let Some(event) = events.recv().await {
        match event {
            PairingEvent::Code(code) => {
                log::debug!("pairing code issued");
                writeln!(out, "Pairing code received, scan it with your phone:")?;
                for line in qr::render_lines(&code) {
                    writeln!(out, "{}", line)?;
                }
                writeln!(out, "Scan the code above to log in.")?;
                out.flush()?;
            }
            PairingEvent::Other(name) => log::info!("pairing event: {}", name),
        }
    }

    let paired = client
        .has_identity()
        .await
        .context("checking the session store after pairing")?;
    if !paired {
        anyhow::bail!("pairing ended without a device identity");
    }
    log::info!("pairing complete");
    Ok(())
}

/// Keep an `Active` session up: whenever the connection drops, reconnect with the stored
/// identity. Returns only with the error that ended the session for good.
pub async fn stay_connected(client: &dyn ProtocolClient, policy: &Reconnect) -> Result<()> {
    loop {
        client.closed().await;
        log::warn!("connection to the network lost, reconnecting");
        reconnect(client, policy).await?;
    }
}

async fn reconnect(client: &dyn ProtocolClient, policy: &Reconnect) -> Result<()> {
    let mut delay = policy.backoff;
    for attempt in 1..=policy.attempts {
        match client.connect().await {
            Ok(()) => {
                log::info!("reconnected (attempt {})", attempt);
                return Ok(());
            }
            Err(e @ ClientError::Rejected(_)) => {
                return Err(e).context("stored session no longer accepted, pair again");
            }
            Err(e) => {
                log::warn!(
                    "reconnect attempt {}/{} failed: {}",
                    attempt,
                    policy.attempts,
                    e
                );
                if attempt < policy.attempts {
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }
    anyhow::bail!(
        "connection lost and {} reconnect attempts failed",
        policy.attempts
    )
}
