use super::*;

/// An outbound peer that has completed the version handshake. Incoming
/// traffic is routed from a background task: share batches go to the chain
/// channel, address gossip to the manager, and `sharereq`/`getaddrs` are
/// answered in place. Transaction gossip is decoded and dropped.
pub(crate) struct Peer {
    pub(crate) address: SocketAddr,
    pub(crate) best_share_hash: BlockHash,
    outgoing: mpsc::Sender<Message>,
    cancel: CancellationToken,
}

impl Peer {
    pub(crate) async fn connect(
        address: SocketAddr,
        network: Network,
        chain: Arc<ShareChain>,
        shares_tx: mpsc::Sender<Vec<Share>>,
        addrs_tx: mpsc::Sender<Vec<Addr>>,
        address_book: Arc<Mutex<Vec<Addr>>>,
    ) -> Result<Self> {
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(address))
            .await
            .with_context(|| format!("timed out connecting to {address}"))?
            .with_context(|| format!("failed to connect to {address}"))?;

        let mut connection = Connection::new(stream, network.clone(), address);
        let cancel = connection.cancel_token();

        let version = Self::handshake(&mut connection, &network, &chain, address).await;
        let version = match version {
            Ok(version) => version,
            Err(err) => {
                connection.close();
                return Err(err);
            }
        };

        info!(
            "Peer {address} is {} (best share {})",
            version.sub_version, version.best_share_hash,
        );

        let peer = Self {
            address,
            best_share_hash: version.best_share_hash,
            outgoing: connection.outgoing.clone(),
            cancel: cancel.clone(),
        };

        tokio::spawn(Self::ping_loop(connection.outgoing.clone(), cancel.clone()));
        tokio::spawn(Self::incoming_loop(
            connection,
            chain,
            shares_tx,
            addrs_tx,
            address_book,
            address,
        ));

        Ok(peer)
    }

    async fn handshake(
        connection: &mut Connection,
        network: &Network,
        chain: &ShareChain,
        address: SocketAddr,
    ) -> Result<Version> {
        let local = PoolAddress::new(0, IpAddr::V6(Ipv6Addr::UNSPECIFIED), network.p2p_port);
        let nonce = rand::rng().random();

        connection
            .outgoing
            .send(Message::Version(Version {
                version: PROTOCOL_VERSION,
                services: 0,
                addr_to: PoolAddress::new(0, address.ip(), address.port()),
                addr_from: local,
                nonce,
                sub_version: USER_AGENT.into(),
                mode: 1,
                best_share_hash: chain.tip_hash().unwrap_or_else(BlockHash::all_zeros),
            }))
            .await
            .context("connection closed before handshake")?;

        let first = timeout(HANDSHAKE_TIMEOUT, connection.incoming.recv())
            .await
            .with_context(|| format!("timed out waiting for version from {address}"))?
            .with_context(|| format!("{address} disconnected during handshake"))?;

        match first {
            Message::Version(version) => Ok(version),
            message => bail!(
                "first message from {address} was {}, not version",
                message.command()
            ),
        }
    }

    async fn ping_loop(outgoing: mpsc::Sender<Message>, cancel: CancellationToken) {
        let mut ticker = interval(PING_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if outgoing.send(Message::Ping).await.is_err() {
                break;
            }
        }
    }

    async fn incoming_loop(
        mut connection: Connection,
        chain: Arc<ShareChain>,
        shares_tx: mpsc::Sender<Vec<Share>>,
        addrs_tx: mpsc::Sender<Vec<Addr>>,
        address_book: Arc<Mutex<Vec<Addr>>>,
        address: SocketAddr,
    ) {
        while let Some(message) = connection.incoming.recv().await {
            match message {
                Message::Shares(shares) => {
                    if shares_tx.send(shares).await.is_err() {
                        break;
                    }
                }
                Message::ShareReply(reply) => {
                    debug!(
                        "Share reply {} from {address}: {} ({} shares)",
                        reply.id,
                        reply.result,
                        reply.shares.len(),
                    );
                    if shares_tx.send(reply.shares).await.is_err() {
                        break;
                    }
                }
                Message::Addrs(addrs) => {
                    if addrs_tx.send(addrs).await.is_err() {
                        break;
                    }
                }
                Message::GetAddrs { count } => {
                    let addrs = {
                        let book = address_book.lock();
                        book.iter().take(count as usize).copied().collect()
                    };
                    if connection.outgoing.send(Message::Addrs(addrs)).await.is_err() {
                        break;
                    }
                }
                Message::ShareReq(request) => {
                    let reply = chain.answer(&request);
                    if connection
                        .outgoing
                        .send(Message::ShareReply(reply))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Message::Ping => {}
                Message::Version(_) => {
                    warn!("Duplicate version from {address}");
                }
                Message::AddrMe { .. }
                | Message::BestBlock(_)
                | Message::HaveTx(_)
                | Message::RememberTx { .. }
                | Message::ForgetTx(_)
                | Message::LosingTx(_) => {
                    debug!("Ignoring {} from {address}", message.command());
                }
            }
        }

        connection.close();
        debug!("Peer {address} disconnected");
    }

    pub(crate) async fn send(&self, message: Message) -> Result {
        self.outgoing
            .send(message)
            .await
            .map_err(|_| anyhow!("peer {} is gone", self.address))
    }

    pub(crate) async fn ask_addresses(&self, count: u32) -> Result {
        self.send(Message::GetAddrs { count }).await
    }

    pub(crate) fn is_alive(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    pub(crate) fn close(&self) {
        self.cancel.cancel();
    }
}
