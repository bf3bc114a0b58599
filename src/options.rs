use super::*;

#[derive(Clone, Debug, Default, Args)]
pub(crate) struct Options {
    #[arg(long, help = "Join <NETWORK>. [default: vertcoin]")]
    pub(crate) network: Option<Network>,

    #[arg(long, help = "Store the share chain snapshot under <DATA_DIR>.")]
    pub(crate) data_dir: Option<PathBuf>,

    #[arg(long, help = "Dial peers on <P2P_PORT> instead of the network default.")]
    pub(crate) p2p_port: Option<u16>,

    #[arg(long, help = "Maintain <PEERS> outbound peer connections.")]
    pub(crate) peers: Option<usize>,

    #[arg(
        long,
        value_name = "PEER",
        help = "Also try <PEER> (host or host:port) before the seed hosts."
    )]
    pub(crate) peer: Vec<String>,

    #[arg(
        long,
        help = "Hold at most <ORPHAN_LIMIT> shares that cannot be linked yet."
    )]
    pub(crate) orphan_limit: Option<usize>,

    #[arg(
        long,
        value_name = "SECONDS",
        help = "Snapshot the share chain at most every <SECONDS> seconds."
    )]
    pub(crate) commit_interval: Option<u64>,
}
