use {
    super::*,
    bitcoin::CompactTarget,
    sharewire::{
        GEN_TX_BEFORE_REF_HASH, HashLink, ShareData, ShareInfo, SmallBlockHeader, StaleInfo,
    },
};

/// Builds a share at `abs_height` on top of `previous`, grinding the header
/// nonce until it clears its own (very easy) target.
pub(crate) fn share(previous: BlockHash, abs_height: u32, network: &Network) -> Share {
    mine(previous, abs_height, CompactTarget::from_consensus(0x207f_ffff), network)
        .expect("some nonce satisfies the test target")
}

/// A structurally sound share whose bits demand a target no hash can meet.
pub(crate) fn invalid_share(previous: BlockHash, abs_height: u32, network: &Network) -> Share {
    let share = assemble(
        previous,
        abs_height,
        CompactTarget::from_consensus(0x0300_0001),
        0,
        network,
    );
    assert!(!share.is_valid());
    share
}

fn mine(
    previous: BlockHash,
    abs_height: u32,
    bits: CompactTarget,
    network: &Network,
) -> Option<Share> {
    (0..100_000)
        .map(|nonce| assemble(previous, abs_height, bits, nonce, network))
        .find(Share::is_valid)
}

fn assemble(
    previous: BlockHash,
    abs_height: u32,
    bits: CompactTarget,
    nonce: u32,
    network: &Network,
) -> Share {
    let timestamp = 1_700_000_000 + abs_height;

    let share_info = ShareInfo {
        share_data: ShareData {
            previous_share_hash: previous,
            coinbase: abs_height.to_le_bytes().to_vec(),
            nonce: 0,
            pubkey_hash: [7; 20],
            pubkey_hash_version: 0,
            subsidy: 25 * 100_000_000,
            donation: 200,
            stale_info: StaleInfo::None,
            desired_version: 16,
        },
        segwit_data: None,
        new_transaction_hashes: Vec::new(),
        transaction_hash_refs: Vec::new(),
        far_share_hash: BlockHash::all_zeros(),
        max_bits: bits,
        bits,
        timestamp,
        abs_height,
        abs_work: u128::from(abs_height) + 1,
    };

    let min_header = SmallBlockHeader {
        version: 0x2000_0000,
        previous_block: BlockHash::all_zeros(),
        timestamp,
        bits,
        nonce,
    };

    Share::new(
        16,
        min_header,
        share_info,
        Vec::new(),
        nonce.into(),
        HashLink::from_prefix(&GEN_TX_BEFORE_REF_HASH, &GEN_TX_BEFORE_REF_HASH),
        Vec::new(),
        network,
    )
    .expect("test share assembles")
}
