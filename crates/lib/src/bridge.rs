//! Bridge runner: wires config, session store, protocol client, relay, lifecycle and shutdown.

use crate::channels::{ProtocolClient, WsClient};
use crate::config::{self, Config};
use crate::lifecycle::{self, Reconnect};
use crate::relay::{Relay, ReplyDispatcher};
use crate::shutdown;
use crate::store::SessionStore;
use crate::webhook::WebhookClient;
use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;

/// Run the bridge against the configured network until SIGINT/SIGTERM.
pub async fn run_bridge(config: Config) -> Result<()> {
    let url = match config.webhook.url.clone() {
        Some(url) => url,
        None => {
            log::warn!(
                "webhook url not set, using default {}",
                config::DEFAULT_WEBHOOK_URL
            );
            config::DEFAULT_WEBHOOK_URL.to_string()
        }
    };
    let webhook = WebhookClient::new(url, config.webhook.timeout())
        .context("building webhook client")?;
    let store = SessionStore::open(&config.session.store_path)
        .await
        .context("opening session store")?;
    log::info!("session store at {}", store.path().display());
    let client = Arc::new(WsClient::new(
        config.session.network_url.clone(),
        Arc::new(store),
    ));
    serve(
        client,
        webhook,
        config.webhook.fallback_reply.clone(),
        shutdown::shutdown_signal(),
    )
    .await
}

/// Subscribe the relay, bring the session up, and relay messages until `shutdown` completes.
/// Fails when the session drops and cannot be restored.
pub async fn serve<F>(
    client: Arc<dyn ProtocolClient>,
    webhook: WebhookClient,
    fallback_reply: String,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send,
{
    log::info!("relaying inbound messages to {}", webhook.url());
    let relay = Arc::new(Relay::new(
        webhook,
        ReplyDispatcher::new(client.clone()),
        fallback_reply,
    ));
    client.subscribe(relay).await;

    let mut stdout = std::io::stdout();
    lifecycle::start(client.as_ref(), &mut stdout).await?;
    println!("Logged in. Waiting for inbound messages...");

    shutdown::disconnect_on(shutdown, client.as_ref(), &Reconnect::default()).await
}
