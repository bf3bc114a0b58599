use super::*;

#[derive(Debug, Parser)]
pub(crate) struct Node {}

impl Node {
    pub(crate) async fn run(self, settings: Settings, cancel_token: CancellationToken) -> Result {
        info!(
            "Starting {} node on {} (chain length {})",
            USER_AGENT, settings.network.name, settings.network.chain_length,
        );

        let store = Store::new(&settings.data_dir)?;
        let (need_tx, need_rx) = mpsc::channel(NEED_CHANNEL_CAPACITY);
        let chain = Arc::new(ShareChain::new(&settings, store, need_tx));

        chain
            .load()
            .context("refusing to start on a corrupt share chain snapshot")?;

        let (shares_tx, mut shares_rx) = mpsc::channel::<Vec<Share>>(SHARES_CHANNEL_CAPACITY);

        let consumer = {
            let chain = chain.clone();
            let cancel = cancel_token.clone();
            tokio::spawn(async move {
                loop {
                    let batch = tokio::select! {
                        _ = cancel.cancelled() => break,
                        batch = shares_rx.recv() => match batch {
                            Some(batch) => batch,
                            None => break,
                        },
                    };

                    debug!("Chain engine received {} shares", batch.len());

                    if let Err(err) = chain.add_shares(batch) {
                        error!("Failed to absorb share batch: {err:#}");
                    }
                }
            })
        };

        let manager = PeerManager::new(&settings, chain.clone(), shares_tx);
        let supervisor = tokio::spawn(manager.clone().run(need_rx, cancel_token.clone()));

        let mut status = interval(STATUS_INTERVAL);
        status.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                _ = status.tick() => {
                    info!(
                        "{} peers, {} connected shares, tip {}",
                        manager.peer_count(),
                        chain.len(),
                        chain
                            .tip_hash()
                            .map(|tip| tip.to_string())
                            .unwrap_or_else(|| "none".into()),
                    );
                }
            }
        }

        info!("Shutting down");

        supervisor.await.ok();
        consumer.abort();

        chain.commit().context("final share chain commit failed")?;

        Ok(())
    }
}
