//! Primitive wire encodings shared by every message and share field.
//!
//! All decoders fail on truncated input and non-canonical varints; none of
//! them leave a partial result behind. Byte layout here is protocol: share
//! hashes are computed over these exact serializations.

use super::*;

use crate::error::{
    ConsensusSnafu, IoSnafu, NonCanonicalVarintSnafu, OversizedPayloadSnafu, Utf8Snafu,
};

pub fn write_varint(w: &mut impl Write, value: u64) -> Result {
    if value < 0xfd {
        w.write_u8(value as u8).context(IoSnafu)
    } else if value <= u64::from(u16::MAX) {
        w.write_u8(0xfd).context(IoSnafu)?;
        w.write_u16::<LittleEndian>(value as u16).context(IoSnafu)
    } else if value <= u64::from(u32::MAX) {
        w.write_u8(0xfe).context(IoSnafu)?;
        w.write_u32::<LittleEndian>(value as u32).context(IoSnafu)
    } else {
        w.write_u8(0xff).context(IoSnafu)?;
        w.write_u64::<LittleEndian>(value).context(IoSnafu)
    }
}

pub fn read_varint(r: &mut impl Read) -> Result<u64> {
    let discriminant = r.read_u8().context(IoSnafu)?;

    let (value, minimum, width): (u64, u64, usize) = match discriminant {
        0xff => (r.read_u64::<LittleEndian>().context(IoSnafu)?, 0x1_0000_0000, 8),
        0xfe => (
            u64::from(r.read_u32::<LittleEndian>().context(IoSnafu)?),
            0x1_0000,
            4,
        ),
        0xfd => (
            u64::from(r.read_u16::<LittleEndian>().context(IoSnafu)?),
            0xfd,
            2,
        ),
        value => return Ok(u64::from(value)),
    };

    ensure!(value >= minimum, NonCanonicalVarintSnafu { value, width });

    Ok(value)
}

pub fn write_var_bytes(w: &mut impl Write, bytes: &[u8]) -> Result {
    write_varint(w, bytes.len() as u64)?;
    w.write_all(bytes).context(IoSnafu)
}

pub fn read_var_bytes(r: &mut impl Read) -> Result<Vec<u8>> {
    let length = read_varint(r)?;
    ensure!(
        length <= MAX_PAYLOAD_SIZE as u64,
        OversizedPayloadSnafu { length }
    );

    let mut bytes = vec![0u8; length as usize];
    r.read_exact(&mut bytes).context(IoSnafu)?;

    Ok(bytes)
}

pub fn write_var_string(w: &mut impl Write, value: &str) -> Result {
    write_var_bytes(w, value.as_bytes())
}

pub fn read_var_string(r: &mut impl Read) -> Result<String> {
    String::from_utf8(read_var_bytes(r)?).context(Utf8Snafu)
}

pub fn read_fixed<const N: usize>(r: &mut impl Read) -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    r.read_exact(&mut bytes).context(IoSnafu)?;
    Ok(bytes)
}

pub fn write_hash<H>(w: &mut impl Write, hash: &H) -> Result
where
    H: Hash<Bytes = [u8; 32]>,
{
    w.write_all(hash.as_byte_array()).context(IoSnafu)
}

pub fn read_hash<H>(r: &mut impl Read) -> Result<H>
where
    H: Hash<Bytes = [u8; 32]>,
{
    Ok(H::from_byte_array(read_fixed::<32>(r)?))
}

pub fn write_hash_list<H>(w: &mut impl Write, hashes: &[H]) -> Result
where
    H: Hash<Bytes = [u8; 32]>,
{
    write_varint(w, hashes.len() as u64)?;
    for hash in hashes {
        write_hash(w, hash)?;
    }
    Ok(())
}

pub fn read_hash_list<H>(r: &mut impl Read) -> Result<Vec<H>>
where
    H: Hash<Bytes = [u8; 32]>,
{
    let count = read_varint(r)?;
    let mut hashes = Vec::with_capacity(count.min(1024) as usize);
    for _ in 0..count {
        hashes.push(read_hash(r)?);
    }
    Ok(hashes)
}

pub fn write_ip(w: &mut impl Write, ip: Ipv6Addr) -> Result {
    w.write_all(&ip.octets()).context(IoSnafu)
}

pub fn read_ip(r: &mut impl Read) -> Result<Ipv6Addr> {
    Ok(Ipv6Addr::from(read_fixed::<16>(r)?))
}

/// 128-bit cumulative work, stored big-endian in a fixed 16 byte field.
pub fn write_u128_be(w: &mut impl Write, value: u128) -> Result {
    w.write_all(&value.to_be_bytes()).context(IoSnafu)
}

pub fn read_u128_be(r: &mut impl Read) -> Result<u128> {
    Ok(u128::from_be_bytes(read_fixed::<16>(r)?))
}

/// Consensus-decodes a bitcoin type from the front of `slice`, advancing it.
pub fn read_consensus<T: bitcoin::consensus::Decodable>(slice: &mut &[u8]) -> Result<T> {
    let bytes = *slice;
    let (value, consumed) = encode::deserialize_partial(bytes).context(ConsensusSnafu)?;
    *slice = &bytes[consumed..];
    Ok(value)
}
