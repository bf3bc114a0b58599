use {super::*, options::Options};

/// Resolved configuration: command line options merged with network
/// defaults. Everything downstream takes these values explicitly.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) network: Network,
    pub(crate) data_dir: PathBuf,
    pub(crate) p2p_port: u16,
    pub(crate) target_peers: usize,
    pub(crate) extra_peers: Vec<String>,
    pub(crate) orphan_limit: usize,
    pub(crate) commit_interval: Duration,
}

impl Settings {
    pub(crate) fn load(options: Options) -> Result<Self> {
        let network = options.network.unwrap_or_else(Network::vertcoin);

        let data_dir = match options.data_dir {
            Some(data_dir) => data_dir,
            None => dirs::data_dir()
                .context("failed to determine a data directory; pass --data-dir")?
                .join("pyrite")
                .join(network.name),
        };

        let p2p_port = options.p2p_port.unwrap_or(network.p2p_port);

        Ok(Self {
            p2p_port,
            data_dir,
            target_peers: options.peers.unwrap_or(4).max(1),
            extra_peers: options.peer,
            orphan_limit: options.orphan_limit.unwrap_or(1024).max(1),
            commit_interval: Duration::from_secs(options.commit_interval.unwrap_or(30)),
            network,
        })
    }

    #[cfg(test)]
    pub(crate) fn for_tests(network: Network, data_dir: PathBuf) -> Self {
        Self {
            p2p_port: network.p2p_port,
            data_dir,
            target_peers: 1,
            extra_peers: Vec::new(),
            orphan_limit: 1024,
            commit_interval: Duration::ZERO,
            network,
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, pretty_assertions::assert_eq};

    #[test]
    fn defaults_come_from_the_network() {
        let settings = Settings::load(Options {
            network: Some(Network::regtest()),
            data_dir: Some("/tmp/pyrite-test".into()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(settings.p2p_port, Network::regtest().p2p_port);
        assert_eq!(settings.orphan_limit, 1024);
        assert_eq!(settings.commit_interval, Duration::from_secs(30));
    }

    #[test]
    fn overrides_win() {
        let settings = Settings::load(Options {
            network: Some(Network::regtest()),
            data_dir: Some("/tmp/pyrite-test".into()),
            p2p_port: Some(4444),
            peers: Some(0),
            orphan_limit: Some(8),
            commit_interval: Some(0),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(settings.p2p_port, 4444);
        assert_eq!(settings.target_peers, 1);
        assert_eq!(settings.orphan_limit, 8);
        assert_eq!(settings.commit_interval, Duration::ZERO);
    }
}
