use super::*;

use crate::error::UnknownNetworkSnafu;

/// Everything that distinguishes one share chain deployment from another.
/// Passed explicitly to every component that frames messages or derives
/// hashes; nothing reads ambient network state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub name: &'static str,
    /// Leads every framed message on the wire.
    pub message_prefix: [u8; 8],
    /// Committed into every share's reference hash.
    pub identifier: [u8; 8],
    pub p2p_port: u16,
    /// Shares to keep connected before the chain stops asking for ancestors.
    pub chain_length: usize,
    pub seed_hosts: Vec<String>,
    pub pow: PowFunction,
}

impl Network {
    pub fn vertcoin() -> Self {
        Self {
            name: "vertcoin",
            message_prefix: [0x7c, 0x36, 0x14, 0xa6, 0xbc, 0xdc, 0xf7, 0x84],
            identifier: [0xa0, 0x6a, 0x81, 0xc8, 0x27, 0xca, 0xb9, 0x83],
            p2p_port: 9346,
            chain_length: 8640,
            seed_hosts: [
                "p2proxy.vertcoin.org",
                "vtc.alwayshashing.com",
                "crypto.office-on-the.net",
                "pool.vtconline.org",
            ]
            .map(String::from)
            .to_vec(),
            pow: PowFunction::Sha256d,
        }
    }

    /// A loopback-only network with its own prefix, handy for local testing:
    /// no seeds, a short chain, and plain double-SHA proof of work.
    pub fn regtest() -> Self {
        Self {
            name: "regtest",
            message_prefix: [0x52, 0x45, 0x47, 0x54, 0x45, 0x53, 0x54, 0x00],
            identifier: [0x52, 0x45, 0x47, 0x49, 0x44, 0x00, 0x00, 0x01],
            p2p_port: 19346,
            chain_length: 64,
            seed_hosts: Vec::new(),
            pow: PowFunction::Sha256d,
        }
    }
}

impl FromStr for Network {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "vertcoin" => Ok(Self::vertcoin()),
            "regtest" => Ok(Self::regtest()),
            name => UnknownNetworkSnafu { name }.fail(),
        }
    }
}

/// The hash whose numeric value is compared against the share target.
/// Selected per network; operates on the serialized 80 byte block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PowFunction {
    #[display("sha256d")]
    Sha256d,
    #[display("blake3")]
    Blake3,
}

impl PowFunction {
    pub fn hash(&self, header: &[u8]) -> BlockHash {
        match self {
            Self::Sha256d => BlockHash::from_raw_hash(sha256d::Hash::hash(header)),
            Self::Blake3 => BlockHash::from_byte_array(*blake3::hash(header).as_bytes()),
        }
    }
}
