use {
    bitcoin::{
        BlockHash, CompactTarget, Target, Transaction, TxMerkleNode, Txid,
        block,
        consensus::encode,
        hashes::{Hash, HashEngine, sha256, sha256d},
    },
    byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt},
    derive_more::Display,
    snafu::{OptionExt, ResultExt, Snafu, ensure},
    std::{
        io::{Read, Write},
        net::{IpAddr, Ipv6Addr, SocketAddr},
        str::FromStr,
        sync::LazyLock,
    },
};

pub use {
    address::{Addr, PoolAddress},
    error::{Result, WireError},
    hash_link::HashLink,
    merkle::link_root,
    message::{
        COMMAND_SIZE, Message, ShareReply, ShareReplyResult, ShareReq, Version, checksum,
        decode_command, encode_command, verify_checksum,
    },
    network::{Network, PowFunction},
    share::{
        SegwitData, Share, ShareData, ShareHashes, ShareInfo, SmallBlockHeader, StaleInfo,
        TransactionHashRef, read_shares, write_shares,
    },
};

mod address;
pub mod codec;
mod error;
mod hash_link;
mod merkle;
mod message;
mod network;
mod share;

pub const PROTOCOL_VERSION: u32 = 1800;

/// Share formats at or above this carry segwit data.
pub const SEGWIT_SHARE_VERSION: u64 = 17;

/// Upper bound on a single framed payload. Peers are untrusted; a length
/// field past this tears the connection down instead of allocating.
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

static DONATION_SCRIPT: LazyLock<Vec<u8>> = LazyLock::new(|| {
    hex::decode(
        "410418a74130b2f4fad899d8ed2bff272bc43a03c8ca72897ae3da584d7a770b5a9ea8dd1b37a620d27c6cf6d5a7a9bbd6872f5981e95816d701d94f201c5d093be6ac",
    )
    .expect("donation script constant is valid hex")
});

/// The generation transaction bytes that precede the reference hash: the
/// donation output script, a zero value, and the opening of the OP_RETURN
/// commitment push. The hash-link trailer is always a suffix of this.
pub static GEN_TX_BEFORE_REF_HASH: LazyLock<Vec<u8>> = LazyLock::new(|| {
    let mut bytes = DONATION_SCRIPT.clone();
    bytes.extend_from_slice(&[0u8; 8]);
    bytes.extend_from_slice(&[42, 0x6a, 0x28]);
    bytes
});
