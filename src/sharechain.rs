use {super::*, std::collections::VecDeque};

/// A connected share. Links are arena keys, not references: the chain owns
/// every node through `nodes`, and an edge exists only when both ends are
/// present.
#[derive(Debug, Clone)]
struct ChainNode {
    share: Share,
    previous: Option<BlockHash>,
    next: Option<BlockHash>,
}

#[derive(Debug, Default)]
struct ChainState {
    nodes: HashMap<BlockHash, ChainNode>,
    by_previous: HashMap<BlockHash, BlockHash>,
    tip: Option<BlockHash>,
    tail: Option<BlockHash>,
    orphans: VecDeque<Share>,
    last_commit: Option<Instant>,
}

impl ChainState {
    fn insert(&mut self, node: ChainNode) {
        let hash = node.share.hash();
        self.by_previous
            .insert(node.share.previous_share_hash(), hash);
        self.nodes.insert(hash, node);
    }

    fn known(&self, hash: BlockHash) -> bool {
        self.nodes.contains_key(&hash) || self.orphans.iter().any(|orphan| orphan.hash() == hash)
    }

    /// Shares from the tip back to the tail, newest first.
    fn snapshot(&self) -> Vec<Share> {
        let mut shares = Vec::with_capacity(self.nodes.len());
        let mut cursor = self.tip;

        while let Some(hash) = cursor {
            let Some(node) = self.nodes.get(&hash) else {
                break;
            };
            shares.push(node.share.clone());
            cursor = node.previous;
        }

        shares
    }
}

/// The share chain engine: assembles validated shares delivered in any
/// order into one connected chain, parks the rest, and asks the transport
/// for missing ancestors.
pub(crate) struct ShareChain {
    network: Network,
    store: Store,
    orphan_limit: usize,
    commit_interval: Duration,
    need_tx: mpsc::Sender<BlockHash>,
    state: Mutex<ChainState>,
}

impl ShareChain {
    pub(crate) fn new(settings: &Settings, store: Store, need_tx: mpsc::Sender<BlockHash>) -> Self {
        Self {
            network: settings.network.clone(),
            store,
            orphan_limit: settings.orphan_limit,
            commit_interval: settings.commit_interval,
            need_tx,
            state: Mutex::new(ChainState::default()),
        }
    }

    /// Takes one delivered batch: proof-of-work gate, duplicate drop, park,
    /// then a resolve pass. Invalid shares never reach the orphan pool.
    pub(crate) fn add_shares(&self, shares: Vec<Share>) -> Result {
        {
            let mut state = self.state.lock();

            for share in shares {
                if !share.is_valid() {
                    warn!("Ignoring invalid share {}", share.hash());
                    continue;
                }

                if state.known(share.hash()) {
                    continue;
                }

                state.orphans.push_back(share);

                while state.orphans.len() > self.orphan_limit {
                    if let Some(evicted) = state.orphans.pop_front() {
                        warn!("Orphan pool full, evicting {}", evicted.hash());
                    }
                }
            }
        }

        self.resolve(true)
    }

    /// Links every orphan it can, repeating until a full pass makes no
    /// progress, then reports what the chain still needs.
    pub(crate) fn resolve(&self, commit: bool) -> Result {
        let needed;

        {
            let mut state = self.state.lock();

            if state.tip.is_none() {
                let Some(seed) = state.orphans.pop_front() else {
                    return Ok(());
                };

                let hash = seed.hash();
                state.insert(ChainNode {
                    share: seed,
                    previous: None,
                    next: None,
                });
                state.tip = Some(hash);
                state.tail = Some(hash);
            }

            loop {
                let mut extended = false;
                let pending = std::mem::take(&mut state.orphans);

                for share in pending {
                    let hash = share.hash();
                    let previous = share.previous_share_hash();

                    if state.nodes.contains_key(&hash) {
                        continue;
                    }

                    if state.nodes.contains_key(&previous) {
                        // extends a known share tipward
                        state.insert(ChainNode {
                            share,
                            previous: Some(previous),
                            next: None,
                        });
                        if let Some(parent) = state.nodes.get_mut(&previous) {
                            parent.next = Some(hash);
                        }
                        if state.tip == Some(previous) {
                            state.tip = Some(hash);
                        }
                        extended = true;
                    } else if let Some(&child) = state.by_previous.get(&hash) {
                        // the missing parent of a known share
                        state.insert(ChainNode {
                            share,
                            previous: None,
                            next: Some(child),
                        });
                        if let Some(child_node) = state.nodes.get_mut(&child) {
                            child_node.previous = Some(hash);
                        }
                        if state.tail == Some(child) {
                            state.tail = Some(hash);
                        }
                        extended = true;
                    } else {
                        state.orphans.push_back(share);
                    }
                }

                if !extended || state.orphans.is_empty() {
                    break;
                }
            }

            debug!(
                "Resolved share chain: tip {:?}, length {}, orphans {}",
                state.tip,
                state.nodes.len(),
                state.orphans.len(),
            );

            needed = if state.nodes.len() < self.network.chain_length {
                state
                    .tail
                    .and_then(|tail| state.nodes.get(&tail))
                    .map(|node| node.share.previous_share_hash())
                    .filter(|previous| *previous != BlockHash::all_zeros())
            } else {
                None
            };
        }

        if let Some(hash) = needed {
            // dropped when the supervisor is behind; the next resolve re-asks
            let _ = self.need_tx.try_send(hash);
        }

        if commit {
            self.maybe_commit()?;
        }

        Ok(())
    }

    fn maybe_commit(&self) -> Result {
        let due = {
            let mut state = self.state.lock();
            match state.last_commit {
                Some(last) if last.elapsed() < self.commit_interval => false,
                _ => {
                    state.last_commit = Some(Instant::now());
                    true
                }
            }
        };

        if due { self.commit() } else { Ok(()) }
    }

    /// Snapshots the connected chain, tip first. Serialization and the disk
    /// write happen outside the chain lock.
    pub(crate) fn commit(&self) -> Result {
        let shares = self.state.lock().snapshot();
        self.store.save(&shares)
    }

    /// Hydrates from the committed snapshot. Every stored share must still
    /// pass proof of work; anything less means the snapshot is corrupt and
    /// startup should fail loudly rather than resume on bad history.
    pub(crate) fn load(&self) -> Result {
        let Some(shares) = self.store.load(&self.network)? else {
            return Ok(());
        };

        for share in &shares {
            ensure!(
                share.is_valid(),
                "corrupt share chain snapshot: share {} fails proof of work",
                share.hash(),
            );
        }

        let count = shares.len();
        self.state.lock().orphans.extend(shares);
        self.resolve(false)?;

        info!("Loaded {count} shares from disk");

        Ok(())
    }

    /// Answers a `sharereq`: walk tailward from the first known start hash,
    /// at most `parents` past it, stopping early at any stop hash.
    pub(crate) fn answer(&self, request: &ShareReq) -> ShareReply {
        if request.parents >= PARENTS_PER_REQUEST {
            return ShareReply {
                id: request.id,
                result: ShareReplyResult::TooLong,
                shares: Vec::new(),
            };
        }

        let state = self.state.lock();

        let mut shares = Vec::new();
        if let Some(start) = request
            .hashes
            .iter()
            .copied()
            .find(|hash| state.nodes.contains_key(hash))
        {
            let mut cursor = Some(start);
            while let Some(hash) = cursor {
                if shares.len() > request.parents as usize || request.stops.contains(&hash) {
                    break;
                }
                let Some(node) = state.nodes.get(&hash) else {
                    break;
                };
                shares.push(node.share.clone());
                cursor = node.previous;
            }
        }

        ShareReply {
            id: request.id,
            result: ShareReplyResult::Good,
            shares,
        }
    }

    pub(crate) fn tip_hash(&self) -> Option<BlockHash> {
        self.state.lock().tip
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().nodes.len()
    }

    #[cfg(test)]
    fn tail_hash(&self) -> Option<BlockHash> {
        self.state.lock().tail
    }

    #[cfg(test)]
    fn orphan_count(&self) -> usize {
        self.state.lock().orphans.len()
    }

    #[cfg(test)]
    fn connected_hashes(&self) -> Vec<BlockHash> {
        let mut hashes: Vec<BlockHash> = self.state.lock().nodes.keys().copied().collect();
        hashes.sort();
        hashes
    }
}
