use super::*;

use crate::error::{
    IoSnafu, MissingSegwitDataSnafu, TrailingBytesSnafu, UnknownStaleTagSnafu,
};

/// The compact block header fields a share carries. Everything else needed
/// to rebuild the full header is derived from the share itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmallBlockHeader {
    pub version: u64,
    pub previous_block: BlockHash,
    pub timestamp: u32,
    pub bits: CompactTarget,
    pub nonce: u32,
}

impl SmallBlockHeader {
    fn read(r: &mut impl Read) -> Result<Self> {
        Ok(Self {
            version: codec::read_varint(r)?,
            previous_block: codec::read_hash(r)?,
            timestamp: r.read_u32::<LittleEndian>().context(IoSnafu)?,
            bits: CompactTarget::from_consensus(r.read_u32::<LittleEndian>().context(IoSnafu)?),
            nonce: r.read_u32::<LittleEndian>().context(IoSnafu)?,
        })
    }

    fn write(&self, w: &mut impl Write) -> Result {
        codec::write_varint(w, self.version)?;
        codec::write_hash(w, &self.previous_block)?;
        w.write_u32::<LittleEndian>(self.timestamp).context(IoSnafu)?;
        w.write_u32::<LittleEndian>(self.bits.to_consensus())
            .context(IoSnafu)?;
        w.write_u32::<LittleEndian>(self.nonce).context(IoSnafu)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StaleInfo {
    #[display("none")]
    None,
    #[display("orphan")]
    Orphan,
    #[display("dead on arrival")]
    Doa,
}

impl StaleInfo {
    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::None),
            253 => Ok(Self::Orphan),
            254 => Ok(Self::Doa),
            tag => UnknownStaleTagSnafu { tag }.fail(),
        }
    }

    fn tag(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Orphan => 253,
            Self::Doa => 254,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareData {
    pub previous_share_hash: BlockHash,
    pub coinbase: Vec<u8>,
    pub nonce: u32,
    pub pubkey_hash: [u8; 20],
    pub pubkey_hash_version: u8,
    pub subsidy: u64,
    pub donation: u16,
    pub stale_info: StaleInfo,
    pub desired_version: u64,
}

impl ShareData {
    fn read(r: &mut impl Read) -> Result<Self> {
        Ok(Self {
            previous_share_hash: codec::read_hash(r)?,
            coinbase: codec::read_var_bytes(r)?,
            nonce: r.read_u32::<LittleEndian>().context(IoSnafu)?,
            pubkey_hash: codec::read_fixed::<20>(r)?,
            pubkey_hash_version: r.read_u8().context(IoSnafu)?,
            subsidy: r.read_u64::<LittleEndian>().context(IoSnafu)?,
            donation: r.read_u16::<LittleEndian>().context(IoSnafu)?,
            stale_info: StaleInfo::from_tag(r.read_u8().context(IoSnafu)?)?,
            desired_version: codec::read_varint(r)?,
        })
    }

    fn write(&self, w: &mut impl Write) -> Result {
        codec::write_hash(w, &self.previous_share_hash)?;
        codec::write_var_bytes(w, &self.coinbase)?;
        w.write_u32::<LittleEndian>(self.nonce).context(IoSnafu)?;
        w.write_all(&self.pubkey_hash).context(IoSnafu)?;
        w.write_u8(self.pubkey_hash_version).context(IoSnafu)?;
        w.write_u64::<LittleEndian>(self.subsidy).context(IoSnafu)?;
        w.write_u16::<LittleEndian>(self.donation).context(IoSnafu)?;
        w.write_u8(self.stale_info.tag()).context(IoSnafu)?;
        codec::write_varint(w, self.desired_version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegwitData {
    pub txid_merkle_link: Vec<sha256d::Hash>,
    pub wtxid_merkle_root: sha256d::Hash,
}

impl SegwitData {
    fn read(r: &mut impl Read) -> Result<Self> {
        Ok(Self {
            txid_merkle_link: codec::read_hash_list(r)?,
            wtxid_merkle_root: codec::read_hash(r)?,
        })
    }

    fn write(&self, w: &mut impl Write) -> Result {
        codec::write_hash_list(w, &self.txid_merkle_link)?;
        codec::write_hash(w, &self.wtxid_merkle_root)
    }
}

/// How many transactions a share takes from how far back in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionHashRef {
    pub share_count: u64,
    pub tx_count: u64,
}

impl TransactionHashRef {
    fn read(r: &mut impl Read) -> Result<Self> {
        Ok(Self {
            share_count: codec::read_varint(r)?,
            tx_count: codec::read_varint(r)?,
        })
    }

    fn write(&self, w: &mut impl Write) -> Result {
        codec::write_varint(w, self.share_count)?;
        codec::write_varint(w, self.tx_count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareInfo {
    pub share_data: ShareData,
    /// Present exactly when the share type is segwit-capable.
    pub segwit_data: Option<SegwitData>,
    pub new_transaction_hashes: Vec<Txid>,
    pub transaction_hash_refs: Vec<TransactionHashRef>,
    pub far_share_hash: BlockHash,
    pub max_bits: CompactTarget,
    pub bits: CompactTarget,
    pub timestamp: u32,
    pub abs_height: u32,
    pub abs_work: u128,
}

impl ShareInfo {
    fn read(r: &mut impl Read, segwit: bool) -> Result<Self> {
        let share_data = ShareData::read(r)?;

        let segwit_data = if segwit {
            Some(SegwitData::read(r)?)
        } else {
            None
        };

        let new_transaction_hashes = codec::read_hash_list(r)?;

        let count = codec::read_varint(r)?;
        let mut transaction_hash_refs = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            transaction_hash_refs.push(TransactionHashRef::read(r)?);
        }

        Ok(Self {
            share_data,
            segwit_data,
            new_transaction_hashes,
            transaction_hash_refs,
            far_share_hash: codec::read_hash(r)?,
            max_bits: CompactTarget::from_consensus(
                r.read_u32::<LittleEndian>().context(IoSnafu)?,
            ),
            bits: CompactTarget::from_consensus(r.read_u32::<LittleEndian>().context(IoSnafu)?),
            timestamp: r.read_u32::<LittleEndian>().context(IoSnafu)?,
            abs_height: r.read_u32::<LittleEndian>().context(IoSnafu)?,
            abs_work: codec::read_u128_be(r)?,
        })
    }

    fn write(&self, w: &mut impl Write, segwit: bool) -> Result {
        self.share_data.write(w)?;

        if segwit {
            self.segwit_data
                .as_ref()
                .context(MissingSegwitDataSnafu)?
                .write(w)?;
        }

        codec::write_hash_list(w, &self.new_transaction_hashes)?;

        codec::write_varint(w, self.transaction_hash_refs.len() as u64)?;
        for transaction_hash_ref in &self.transaction_hash_refs {
            transaction_hash_ref.write(w)?;
        }

        codec::write_hash(w, &self.far_share_hash)?;
        w.write_u32::<LittleEndian>(self.max_bits.to_consensus())
            .context(IoSnafu)?;
        w.write_u32::<LittleEndian>(self.bits.to_consensus())
            .context(IoSnafu)?;
        w.write_u32::<LittleEndian>(self.timestamp).context(IoSnafu)?;
        w.write_u32::<LittleEndian>(self.abs_height).context(IoSnafu)?;
        codec::write_u128_be(w, self.abs_work)
    }
}

/// Every digest derived from a share's wire fields. Computed once when the
/// share is decoded or assembled; never transmitted, never trusted from a
/// peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShareHashes {
    pub ref_hash: sha256d::Hash,
    pub gen_tx_hash: sha256d::Hash,
    pub merkle_root: TxMerkleNode,
    pub block_hash: BlockHash,
    pub pow_hash: BlockHash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Share {
    pub share_type: u64,
    pub min_header: SmallBlockHeader,
    pub share_info: ShareInfo,
    pub ref_merkle_link: Vec<sha256d::Hash>,
    pub last_txout_nonce: u64,
    pub hash_link: HashLink,
    pub merkle_link: Vec<sha256d::Hash>,
    pub hashes: ShareHashes,
}

impl Share {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        share_type: u64,
        min_header: SmallBlockHeader,
        share_info: ShareInfo,
        ref_merkle_link: Vec<sha256d::Hash>,
        last_txout_nonce: u64,
        hash_link: HashLink,
        merkle_link: Vec<sha256d::Hash>,
        network: &Network,
    ) -> Result<Self> {
        let hashes = Self::derive(
            network,
            share_type,
            &min_header,
            &share_info,
            &ref_merkle_link,
            last_txout_nonce,
            &hash_link,
            &merkle_link,
        )?;

        Ok(Self {
            share_type,
            min_header,
            share_info,
            ref_merkle_link,
            last_txout_nonce,
            hash_link,
            merkle_link,
            hashes,
        })
    }

    /// Reads one length-framed share record and derives its hashes.
    pub fn read(r: &mut impl Read, network: &Network) -> Result<Self> {
        let share_type = codec::read_varint(r)?;
        let body = codec::read_var_bytes(r)?;

        let mut slice = &body[..];
        let share = Self::read_body(&mut slice, share_type, network)?;
        ensure!(
            slice.is_empty(),
            TrailingBytesSnafu {
                trailing: slice.len()
            }
        );

        Ok(share)
    }

    fn read_body(r: &mut impl Read, share_type: u64, network: &Network) -> Result<Self> {
        let min_header = SmallBlockHeader::read(r)?;
        let share_info = ShareInfo::read(r, share_type >= SEGWIT_SHARE_VERSION)?;
        let ref_merkle_link = codec::read_hash_list(r)?;
        let last_txout_nonce = r.read_u64::<LittleEndian>().context(IoSnafu)?;
        let hash_link = HashLink::read(r)?;
        let merkle_link = codec::read_hash_list(r)?;

        Self::new(
            share_type,
            min_header,
            share_info,
            ref_merkle_link,
            last_txout_nonce,
            hash_link,
            merkle_link,
            network,
        )
    }

    pub fn write(&self, w: &mut impl Write) -> Result {
        let mut body = Vec::new();
        self.min_header.write(&mut body)?;
        self.share_info
            .write(&mut body, self.share_type >= SEGWIT_SHARE_VERSION)?;
        codec::write_hash_list(&mut body, &self.ref_merkle_link)?;
        body.write_u64::<LittleEndian>(self.last_txout_nonce)
            .context(IoSnafu)?;
        self.hash_link.write(&mut body)?;
        codec::write_hash_list(&mut body, &self.merkle_link)?;

        codec::write_varint(w, self.share_type)?;
        codec::write_var_bytes(w, &body)
    }

    #[allow(clippy::too_many_arguments)]
    fn derive(
        network: &Network,
        share_type: u64,
        min_header: &SmallBlockHeader,
        share_info: &ShareInfo,
        ref_merkle_link: &[sha256d::Hash],
        last_txout_nonce: u64,
        hash_link: &HashLink,
        merkle_link: &[sha256d::Hash],
    ) -> Result<ShareHashes> {
        let segwit = share_type >= SEGWIT_SHARE_VERSION;

        let mut ref_bytes = Vec::new();
        ref_bytes
            .write_all(&network.identifier)
            .context(IoSnafu)?;
        share_info.write(&mut ref_bytes, segwit)?;

        let ref_hash = link_root(sha256d::Hash::hash(&ref_bytes), ref_merkle_link, 0);

        let mut gen_tx_suffix = Vec::with_capacity(44);
        gen_tx_suffix.extend_from_slice(ref_hash.as_byte_array());
        gen_tx_suffix.extend_from_slice(&last_txout_nonce.to_le_bytes());
        gen_tx_suffix.extend_from_slice(&[0u8; 4]);

        let gen_tx_hash = hash_link.finalize(&gen_tx_suffix, &GEN_TX_BEFORE_REF_HASH)?;

        let txid_link = match &share_info.segwit_data {
            Some(segwit_data) if segwit => &segwit_data.txid_merkle_link,
            _ => merkle_link,
        };
        let merkle_root = TxMerkleNode::from_raw_hash(link_root(gen_tx_hash, txid_link, 0));

        let header = block::Header {
            version: block::Version::from_consensus(min_header.version as i32),
            prev_blockhash: min_header.previous_block,
            merkle_root,
            time: min_header.timestamp,
            bits: min_header.bits,
            nonce: min_header.nonce,
        };

        let header_bytes = encode::serialize(&header);

        Ok(ShareHashes {
            ref_hash,
            gen_tx_hash,
            merkle_root,
            block_hash: header.block_hash(),
            pow_hash: network.pow.hash(&header_bytes),
        })
    }

    /// The share's identity: the hash of its reconstructed block header.
    pub fn hash(&self) -> BlockHash {
        self.hashes.block_hash
    }

    pub fn previous_share_hash(&self) -> BlockHash {
        self.share_info.share_data.previous_share_hash
    }

    /// Proof-of-work check: the pow digest, as a 256-bit integer, must fall
    /// strictly below the target packed into the compact header bits.
    pub fn is_valid(&self) -> bool {
        let pow = Target::from_le_bytes(self.hashes.pow_hash.to_byte_array());
        pow < Target::from_compact(self.min_header.bits)
    }
}

pub fn write_shares(w: &mut impl Write, shares: &[Share]) -> Result {
    codec::write_varint(w, shares.len() as u64)?;
    for share in shares {
        share.write(w)?;
    }
    Ok(())
}

pub fn read_shares(r: &mut impl Read, network: &Network) -> Result<Vec<Share>> {
    let count = codec::read_varint(r)?;
    let mut shares = Vec::with_capacity(count.min(1024) as usize);
    for _ in 0..count {
        shares.push(Share::read(r, network)?);
    }
    Ok(shares)
}


#[cfg(test)]
mod tests {
    use {super::*, pretty_assertions::assert_eq};

    fn network() -> Network {
        Network::regtest()
    }

    #[test]
    fn derivation_is_deterministic() {
        let network = network();
        let share = testing::share(BlockHash::all_zeros(), 0, &network);

        let again = Share::new(
            share.share_type,
            share.min_header,
            share.share_info.clone(),
            share.ref_merkle_link.clone(),
            share.last_txout_nonce,
            share.hash_link,
            share.merkle_link.clone(),
            &network,
        )
        .unwrap();

        assert_eq!(again.hashes, share.hashes);
    }

    #[test]
    fn round_trips() {
        let network = network();
        let share = testing::share(BlockHash::all_zeros(), 3, &network);

        let mut bytes = Vec::new();
        share.write(&mut bytes).unwrap();

        let decoded = Share::read(&mut &bytes[..], &network).unwrap();
        assert_eq!(decoded, share);
    }

    #[test]
    fn segwit_share_round_trips_and_links_through_txids() {
        let network = network();
        let sibling = sha256d::Hash::from_byte_array([0x44; 32]);
        let share = testing::segwit_share(BlockHash::all_zeros(), 1, vec![sibling], &network);

        assert_eq!(
            share.hashes.merkle_root,
            TxMerkleNode::from_raw_hash(link_root(share.hashes.gen_tx_hash, &[sibling], 0)),
        );

        let mut bytes = Vec::new();
        share.write(&mut bytes).unwrap();
        assert_eq!(Share::read(&mut &bytes[..], &network).unwrap(), share);
    }

    #[test]
    fn segwit_type_requires_segwit_data() {
        let network = network();
        let base = testing::share(BlockHash::all_zeros(), 0, &network);

        assert!(matches!(
            Share::new(
                17,
                base.min_header,
                base.share_info.clone(),
                Vec::new(),
                0,
                base.hash_link,
                Vec::new(),
                &network,
            ),
            Err(WireError::MissingSegwitData)
        ));
    }

    #[test]
    fn identity_binds_the_chain_parent() {
        let network = network();
        let a = testing::share(BlockHash::all_zeros(), 0, &network);
        let b = testing::share(a.hash(), 1, &network);

        assert_ne!(a.hash(), b.hash());
        assert_eq!(b.previous_share_hash(), a.hash());
    }

    #[test]
    fn hashes_are_a_function_of_the_network_identifier() {
        let mut other = network();
        other.identifier = [0xff; 8];

        let share = testing::share(BlockHash::all_zeros(), 0, &network());
        let relabeled = Share::new(
            share.share_type,
            share.min_header,
            share.share_info.clone(),
            share.ref_merkle_link.clone(),
            share.last_txout_nonce,
            share.hash_link,
            share.merkle_link.clone(),
            &other,
        )
        .unwrap();

        assert_ne!(relabeled.hashes.ref_hash, share.hashes.ref_hash);
    }

    #[test]
    fn impossible_bits_fail_validation() {
        let network = network();
        let mut share = testing::share(BlockHash::all_zeros(), 0, &network);

        share.min_header.bits = CompactTarget::from_consensus(0x0300_0001);
        let reground = Share::new(
            share.share_type,
            share.min_header,
            share.share_info.clone(),
            share.ref_merkle_link.clone(),
            share.last_txout_nonce,
            share.hash_link,
            share.merkle_link.clone(),
            &network,
        )
        .unwrap();

        assert!(!reground.is_valid());
    }

    #[test]
    fn unknown_stale_tag_is_rejected() {
        let data = ShareData {
            previous_share_hash: BlockHash::all_zeros(),
            coinbase: vec![1, 2, 3],
            nonce: 0,
            pubkey_hash: [0; 20],
            pubkey_hash_version: 0,
            subsidy: 0,
            donation: 0,
            stale_info: StaleInfo::None,
            desired_version: 0,
        };

        let mut bytes = Vec::new();
        data.write(&mut bytes).unwrap();

        // previous hash, coinbase var-bytes, nonce, pubkey hash + version,
        // subsidy, donation, then the stale tag
        let stale_at = 32 + (1 + 3) + 4 + 20 + 1 + 8 + 2;
        bytes[stale_at] = 9;

        assert!(matches!(
            ShareData::read(&mut &bytes[..]),
            Err(WireError::UnknownStaleTag { tag: 9 })
        ));
    }

    #[test]
    fn trailing_bytes_inside_a_record_are_rejected() {
        let network = network();
        let share = testing::share(BlockHash::all_zeros(), 0, &network);

        let mut body = Vec::new();
        share.min_header.write(&mut body).unwrap();
        share.share_info.write(&mut body, false).unwrap();
        codec::write_hash_list(&mut body, &share.ref_merkle_link).unwrap();
        body.extend_from_slice(&share.last_txout_nonce.to_le_bytes());
        share.hash_link.write(&mut body).unwrap();
        codec::write_hash_list(&mut body, &share.merkle_link).unwrap();
        body.push(0);

        let mut bytes = Vec::new();
        codec::write_varint(&mut bytes, share.share_type).unwrap();
        codec::write_var_bytes(&mut bytes, &body).unwrap();

        assert!(matches!(
            Share::read(&mut &bytes[..], &network),
            Err(WireError::TrailingBytes { trailing: 1 })
        ));
    }

    #[test]
    fn share_lists_round_trip() {
        let network = network();
        let a = testing::share(BlockHash::all_zeros(), 0, &network);
        let b = testing::share(a.hash(), 1, &network);
        let shares = vec![a, b];

        let mut bytes = Vec::new();
        write_shares(&mut bytes, &shares).unwrap();
        assert_eq!(read_shares(&mut &bytes[..], &network).unwrap(), shares);
    }
}
