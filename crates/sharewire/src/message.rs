use super::*;

use crate::error::{
    ChecksumMismatchSnafu, IoSnafu, MalformedCommandSnafu, TrailingBytesSnafu, UnknownCommandSnafu,
    UnknownReplyResultSnafu,
};

pub const COMMAND_SIZE: usize = 12;

/// First four bytes of the double-SHA of the payload, carried in every frame.
pub fn checksum(payload: &[u8]) -> [u8; 4] {
    let digest = sha256d::Hash::hash(payload);
    let mut checksum = [0u8; 4];
    checksum.copy_from_slice(&digest.as_byte_array()[..4]);
    checksum
}

/// Checks a frame's claimed checksum against the payload it arrived with.
pub fn verify_checksum(payload: &[u8], claimed: [u8; 4]) -> Result {
    let computed = checksum(payload);
    ensure!(
        claimed == computed,
        ChecksumMismatchSnafu {
            expected: hex::encode(computed),
            actual: hex::encode(claimed),
        }
    );
    Ok(())
}

pub fn encode_command(command: &str) -> [u8; COMMAND_SIZE] {
    let mut bytes = [0u8; COMMAND_SIZE];
    bytes[..command.len()].copy_from_slice(command.as_bytes());
    bytes
}

pub fn decode_command(bytes: [u8; COMMAND_SIZE]) -> Result<String> {
    let end = bytes
        .iter()
        .position(|byte| *byte == 0)
        .unwrap_or(COMMAND_SIZE);

    String::from_utf8(bytes[..end].to_vec())
        .ok()
        .context(MalformedCommandSnafu)
}

/// The opening handshake message. Exchanged once in each direction before
/// anything else flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub version: u32,
    pub services: u64,
    pub addr_to: PoolAddress,
    pub addr_from: PoolAddress,
    pub nonce: u64,
    pub sub_version: String,
    pub mode: u32,
    pub best_share_hash: BlockHash,
}

impl Version {
    fn read(r: &mut impl Read) -> Result<Self> {
        Ok(Self {
            version: r.read_u32::<LittleEndian>().context(IoSnafu)?,
            services: r.read_u64::<LittleEndian>().context(IoSnafu)?,
            addr_to: PoolAddress::read(r)?,
            addr_from: PoolAddress::read(r)?,
            nonce: r.read_u64::<LittleEndian>().context(IoSnafu)?,
            sub_version: codec::read_var_string(r)?,
            mode: r.read_u32::<LittleEndian>().context(IoSnafu)?,
            best_share_hash: codec::read_hash(r)?,
        })
    }

    fn write(&self, w: &mut impl Write) -> Result {
        w.write_u32::<LittleEndian>(self.version).context(IoSnafu)?;
        w.write_u64::<LittleEndian>(self.services).context(IoSnafu)?;
        self.addr_to.write(w)?;
        self.addr_from.write(w)?;
        w.write_u64::<LittleEndian>(self.nonce).context(IoSnafu)?;
        codec::write_var_string(w, &self.sub_version)?;
        w.write_u32::<LittleEndian>(self.mode).context(IoSnafu)?;
        codec::write_hash(w, &self.best_share_hash)
    }
}

/// Asks a peer to walk backwards from `hashes`, at most `parents` deep,
/// stopping early at any hash in `stops`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareReq {
    pub id: sha256d::Hash,
    pub hashes: Vec<BlockHash>,
    pub parents: u64,
    pub stops: Vec<BlockHash>,
}

impl ShareReq {
    fn read(r: &mut impl Read) -> Result<Self> {
        Ok(Self {
            id: codec::read_hash(r)?,
            hashes: codec::read_hash_list(r)?,
            parents: codec::read_varint(r)?,
            stops: codec::read_hash_list(r)?,
        })
    }

    fn write(&self, w: &mut impl Write) -> Result {
        codec::write_hash(w, &self.id)?;
        codec::write_hash_list(w, &self.hashes)?;
        codec::write_varint(w, self.parents)?;
        codec::write_hash_list(w, &self.stops)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ShareReplyResult {
    #[display("good")]
    Good,
    #[display("too long")]
    TooLong,
}

impl ShareReplyResult {
    fn from_wire(value: u64) -> Result<Self> {
        match value {
            0 => Ok(Self::Good),
            1 => Ok(Self::TooLong),
            value => UnknownReplyResultSnafu { value }.fail(),
        }
    }

    fn to_wire(self) -> u64 {
        match self {
            Self::Good => 0,
            Self::TooLong => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShareReply {
    pub id: sha256d::Hash,
    pub result: ShareReplyResult,
    pub shares: Vec<Share>,
}

impl ShareReply {
    fn read(r: &mut impl Read, network: &Network) -> Result<Self> {
        Ok(Self {
            id: codec::read_hash(r)?,
            result: ShareReplyResult::from_wire(codec::read_varint(r)?)?,
            shares: read_shares(r, network)?,
        })
    }

    fn write(&self, w: &mut impl Write) -> Result {
        codec::write_hash(w, &self.id)?;
        codec::write_varint(w, self.result.to_wire())?;
        write_shares(w, &self.shares)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Version(Version),
    Ping,
    AddrMe { port: u16 },
    GetAddrs { count: u32 },
    Addrs(Vec<Addr>),
    HaveTx(Vec<Txid>),
    BestBlock(block::Header),
    RememberTx { hashes: Vec<Txid>, transactions: Vec<Transaction> },
    ForgetTx(Vec<Txid>),
    LosingTx(Vec<Txid>),
    Shares(Vec<Share>),
    ShareReq(ShareReq),
    ShareReply(ShareReply),
}

impl Message {
    pub fn command(&self) -> &'static str {
        match self {
            Self::Version(_) => "version",
            Self::Ping => "ping",
            Self::AddrMe { .. } => "addrme",
            Self::GetAddrs { .. } => "getaddrs",
            Self::Addrs(_) => "addrs",
            Self::HaveTx(_) => "have_tx",
            Self::BestBlock(_) => "bestblock",
            Self::RememberTx { .. } => "remember_tx",
            Self::ForgetTx(_) => "forget_tx",
            Self::LosingTx(_) => "losing_tx",
            Self::Shares(_) => "shares",
            Self::ShareReq(_) => "sharereq",
            Self::ShareReply(_) => "sharereply",
        }
    }

    pub fn encode_payload(&self) -> Result<Vec<u8>> {
        let mut payload = Vec::new();
        let w = &mut payload;

        match self {
            Self::Version(version) => version.write(w)?,
            Self::Ping => {}
            Self::AddrMe { port } => w.write_u16::<LittleEndian>(*port).context(IoSnafu)?,
            Self::GetAddrs { count } => w.write_u32::<LittleEndian>(*count).context(IoSnafu)?,
            Self::Addrs(addrs) => {
                codec::write_varint(w, addrs.len() as u64)?;
                for addr in addrs {
                    addr.write(w)?;
                }
            }
            Self::HaveTx(hashes) | Self::ForgetTx(hashes) | Self::LosingTx(hashes) => {
                codec::write_hash_list(w, hashes)?;
            }
            Self::BestBlock(header) => {
                w.write_all(&encode::serialize(header)).context(IoSnafu)?;
            }
            Self::RememberTx { hashes, transactions } => {
                codec::write_hash_list(w, hashes)?;
                codec::write_varint(w, transactions.len() as u64)?;
                for transaction in transactions {
                    w.write_all(&encode::serialize(transaction)).context(IoSnafu)?;
                }
            }
            Self::Shares(shares) => write_shares(w, shares)?,
            Self::ShareReq(request) => request.write(w)?,
            Self::ShareReply(reply) => reply.write(w)?,
        }

        Ok(payload)
    }

    pub fn decode_payload(command: &str, payload: &[u8], network: &Network) -> Result<Self> {
        let mut slice = payload;
        let r = &mut slice;

        let message = match command {
            "version" => Self::Version(Version::read(r)?),
            "ping" => Self::Ping,
            "addrme" => Self::AddrMe {
                port: r.read_u16::<LittleEndian>().context(IoSnafu)?,
            },
            "getaddrs" => Self::GetAddrs {
                count: r.read_u32::<LittleEndian>().context(IoSnafu)?,
            },
            "addrs" => {
                let count = codec::read_varint(r)?;
                let mut addrs = Vec::with_capacity(count.min(1024) as usize);
                for _ in 0..count {
                    addrs.push(Addr::read(r)?);
                }
                Self::Addrs(addrs)
            }
            "have_tx" => Self::HaveTx(codec::read_hash_list(r)?),
            "bestblock" => Self::BestBlock(codec::read_consensus(r)?),
            "remember_tx" => {
                let hashes = codec::read_hash_list(r)?;
                let count = codec::read_varint(r)?;
                let mut transactions = Vec::with_capacity(count.min(1024) as usize);
                for _ in 0..count {
                    transactions.push(codec::read_consensus(r)?);
                }
                Self::RememberTx { hashes, transactions }
            }
            "forget_tx" => Self::ForgetTx(codec::read_hash_list(r)?),
            "losing_tx" => Self::LosingTx(codec::read_hash_list(r)?),
            "shares" => Self::Shares(read_shares(r, network)?),
            "sharereq" => Self::ShareReq(ShareReq::read(r)?),
            "sharereply" => Self::ShareReply(ShareReply::read(r, network)?),
            command => return UnknownCommandSnafu { command }.fail(),
        };

        ensure!(
            slice.is_empty(),
            TrailingBytesSnafu {
                trailing: slice.len()
            }
        );

        Ok(message)
    }

    /// Serializes the complete frame: prefix, padded command, length,
    /// checksum, payload.
    pub fn encode_frame(&self, network: &Network) -> Result<Vec<u8>> {
        let payload = self.encode_payload()?;

        let mut frame =
            Vec::with_capacity(network.message_prefix.len() + COMMAND_SIZE + 8 + payload.len());
        frame.extend_from_slice(&network.message_prefix);
        frame.extend_from_slice(&encode_command(self.command()));
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&checksum(&payload));
        frame.extend_from_slice(&payload);

        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::share::testing, pretty_assertions::assert_eq};

    fn network() -> Network {
        Network::regtest()
    }

    fn round_trip(message: Message) {
        let payload = message.encode_payload().unwrap();
        let decoded = Message::decode_payload(message.command(), &payload, &network()).unwrap();
        assert_eq!(decoded, message);
    }

    fn address() -> PoolAddress {
        PoolAddress::new(0, IpAddr::V6(Ipv6Addr::LOCALHOST), 9346)
    }

    #[test]
    fn commands_pad_and_trim() {
        let bytes = encode_command("ping");
        assert_eq!(&bytes[..4], b"ping");
        assert_eq!(&bytes[4..], &[0u8; 8]);
        assert_eq!(decode_command(bytes).unwrap(), "ping");
    }

    #[test]
    fn version_round_trips() {
        round_trip(Message::Version(Version {
            version: PROTOCOL_VERSION,
            services: 0,
            addr_to: address(),
            addr_from: address(),
            nonce: 0xdead_beef,
            sub_version: "pyrite/0.1.0".into(),
            mode: 1,
            best_share_hash: BlockHash::all_zeros(),
        }));
    }

    #[test]
    fn simple_messages_round_trip() {
        round_trip(Message::Ping);
        round_trip(Message::AddrMe { port: 9346 });
        round_trip(Message::GetAddrs { count: 10 });
        round_trip(Message::Addrs(vec![Addr {
            timestamp: 1_700_000_000,
            address: address(),
        }]));
        round_trip(Message::HaveTx(vec![Txid::from_byte_array([1; 32])]));
        round_trip(Message::ForgetTx(vec![Txid::from_byte_array([2; 32])]));
        round_trip(Message::LosingTx(vec![Txid::from_byte_array([3; 32])]));
    }

    #[test]
    fn share_messages_round_trip() {
        let network = network();
        let a = testing::share(BlockHash::all_zeros(), 0, &network);
        let b = testing::share(a.hash(), 1, &network);

        round_trip(Message::Shares(vec![a.clone(), b.clone()]));

        round_trip(Message::ShareReq(ShareReq {
            id: sha256d::Hash::from_byte_array([9; 32]),
            hashes: vec![b.hash()],
            parents: 500,
            stops: vec![a.hash()],
        }));

        round_trip(Message::ShareReply(ShareReply {
            id: sha256d::Hash::from_byte_array([9; 32]),
            result: ShareReplyResult::Good,
            shares: vec![a, b],
        }));
    }

    #[test]
    fn frame_layout() {
        let network = network();
        let frame = Message::Ping.encode_frame(&network).unwrap();

        assert_eq!(&frame[..8], &network.message_prefix);
        assert_eq!(frame[8..20], encode_command("ping"));
        assert_eq!(&frame[20..24], &0u32.to_le_bytes());
        assert_eq!(&frame[24..28], &checksum(b""));
        assert_eq!(frame.len(), 28);
    }

    #[test]
    fn checksums_verify() {
        let payload = b"abc";
        verify_checksum(payload, checksum(payload)).unwrap();

        assert!(matches!(
            verify_checksum(payload, [0; 4]),
            Err(WireError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn unknown_commands_are_rejected() {
        assert!(matches!(
            Message::decode_payload("frobnicate", &[], &network()),
            Err(WireError::UnknownCommand { .. })
        ));
    }

    #[test]
    fn trailing_payload_bytes_are_rejected() {
        assert!(matches!(
            Message::decode_payload("ping", &[0], &network()),
            Err(WireError::TrailingBytes { trailing: 1 })
        ));
    }

    #[test]
    fn reply_results_are_bounded() {
        assert!(ShareReplyResult::from_wire(2).is_err());
    }
}
