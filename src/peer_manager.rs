use super::*;

/// Keeps the node connected. Seeds the candidate address book from DNS,
/// dials until the configured peer count is reached, replaces peers that
/// drop, folds in `addrs` gossip, and turns the chain's need-ancestor
/// signals into `sharereq`s.
pub(crate) struct PeerManager {
    network: Network,
    p2p_port: u16,
    target_peers: usize,
    extra_peers: Vec<String>,
    chain: Arc<ShareChain>,
    shares_tx: mpsc::Sender<Vec<Share>>,
    peers: Mutex<Vec<Arc<Peer>>>,
    address_book: Arc<Mutex<Vec<Addr>>>,
}

impl PeerManager {
    pub(crate) fn new(
        settings: &Settings,
        chain: Arc<ShareChain>,
        shares_tx: mpsc::Sender<Vec<Share>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            network: settings.network.clone(),
            p2p_port: settings.p2p_port,
            target_peers: settings.target_peers,
            extra_peers: settings.extra_peers.clone(),
            chain,
            shares_tx,
            peers: Mutex::new(Vec::new()),
            address_book: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub(crate) async fn run(
        self: Arc<Self>,
        mut need_rx: mpsc::Receiver<BlockHash>,
        cancel: CancellationToken,
    ) {
        let (addrs_tx, mut addrs_rx) = mpsc::channel::<Vec<Addr>>(ADDRS_CHANNEL_CAPACITY);

        self.seed_address_book().await;

        let gossip = {
            let manager = self.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    let addrs = tokio::select! {
                        _ = cancel.cancelled() => break,
                        addrs = addrs_rx.recv() => match addrs {
                            Some(addrs) => addrs,
                            None => break,
                        },
                    };
                    manager.learn_addresses(addrs);
                }
            })
        };

        let requests = {
            let manager = self.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    let hash = tokio::select! {
                        _ = cancel.cancelled() => break,
                        hash = need_rx.recv() => match hash {
                            Some(hash) => hash,
                            None => break,
                        },
                    };
                    manager.request_ancestor(hash).await;
                }
            })
        };

        let mut ticker = interval(SUPERVISOR_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            self.prune_dead_peers();
            self.fill_peer_slots(&addrs_tx).await;
        }

        gossip.abort();
        requests.abort();

        for peer in self.peers.lock().drain(..) {
            peer.close();
        }
    }

    async fn seed_address_book(&self) {
        let mut seeds = self.extra_peers.clone();
        seeds.extend(self.network.seed_hosts.iter().cloned());

        for host in seeds {
            let endpoint = if host.contains(':') {
                host.clone()
            } else {
                format!("{host}:{}", self.p2p_port)
            };

            match tokio::net::lookup_host(endpoint.as_str()).await {
                Ok(resolved) => {
                    let addrs: Vec<Addr> = resolved
                        .map(|addr| Addr {
                            timestamp: 0,
                            address: PoolAddress::new(0, addr.ip(), addr.port()),
                        })
                        .collect();
                    self.learn_addresses(addrs);
                }
                Err(err) => warn!("Failed to resolve seed host {host}: {err}"),
            }
        }
    }

    fn learn_addresses(&self, addrs: Vec<Addr>) {
        let mut book = self.address_book.lock();

        for addr in addrs {
            if book.len() >= ADDRESS_BOOK_CAPACITY {
                break;
            }
            if book
                .iter()
                .all(|known| known.address.socket_addr() != addr.address.socket_addr())
            {
                book.push(addr);
            }
        }
    }

    fn prune_dead_peers(&self) {
        let mut peers = self.peers.lock();
        let before = peers.len();
        peers.retain(|peer| peer.is_alive());

        let dropped = before - peers.len();
        if dropped > 0 {
            info!("Dropped {dropped} dead peers, {} remain", peers.len());
        }
    }

    async fn fill_peer_slots(&self, addrs_tx: &mpsc::Sender<Vec<Addr>>) {
        while self.peer_count() < self.target_peers {
            let Some(candidate) = self.next_candidate() else {
                // out of addresses to try; ask the peers we still have
                let peers: Vec<Arc<Peer>> = self.peers.lock().iter().cloned().collect();
                for peer in peers {
                    if let Err(err) = peer.ask_addresses(10).await {
                        debug!("Failed to ask {} for addresses: {err}", peer.address);
                    }
                }
                break;
            };

            info!("Trying peer {candidate}");

            match Peer::connect(
                candidate,
                self.network.clone(),
                self.chain.clone(),
                self.shares_tx.clone(),
                addrs_tx.clone(),
                self.address_book.clone(),
            )
            .await
            {
                Ok(peer) => {
                    let peer = Arc::new(peer);

                    // start syncing towards whatever the peer claims as its best
                    if peer.best_share_hash != BlockHash::all_zeros()
                        && self.chain.tip_hash() != Some(peer.best_share_hash)
                    {
                        self.request_share(&peer, peer.best_share_hash).await;
                    }

                    self.peers.lock().push(peer);
                }
                Err(err) => {
                    warn!("Peer {candidate} failed: {err:#}");
                    self.forget_address(candidate);
                }
            }
        }
    }

    /// The first known address we are not already connected to.
    fn next_candidate(&self) -> Option<SocketAddr> {
        let peers = self.peers.lock();
        let book = self.address_book.lock();

        book.iter()
            .map(|addr| addr.address.socket_addr())
            .find(|candidate| peers.iter().all(|peer| peer.address != *candidate))
    }

    fn forget_address(&self, address: SocketAddr) {
        self.address_book
            .lock()
            .retain(|addr| addr.address.socket_addr() != address);
    }

    async fn request_ancestor(&self, hash: BlockHash) {
        let Some(peer) = self.peers.lock().first().cloned() else {
            debug!("Need share {hash} but no peers are connected");
            return;
        };

        self.request_share(&peer, hash).await;
    }

    async fn request_share(&self, peer: &Peer, hash: BlockHash) {
        let request = Message::ShareReq(ShareReq {
            id: random_request_id(),
            hashes: vec![hash],
            parents: PARENTS_PER_REQUEST - 1,
            stops: Vec::new(),
        });

        debug!("Asking {} for share {hash}", peer.address);

        if let Err(err) = peer.send(request).await {
            debug!("Failed to request {hash}: {err}");
        }
    }

    pub(crate) fn peer_count(&self) -> usize {
        self.peers.lock().len()
    }
}
