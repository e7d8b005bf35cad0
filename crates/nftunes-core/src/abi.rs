//! Minimal Solidity ABI encoding for the three contract calls we make.
//!
//! Only the shapes the contract actually uses are supported: `uint256`,
//! `address`, `bool`, and `tuple(string,string,uint256,address)[]`.

use crate::chain::{Address, ChainTrack};
use crate::track::{TrackId, Wei};

const WORD: usize = 32;

/// `getAllTracks()`
pub const SEL_GET_ALL_TRACKS: [u8; 4] = [0xc0, 0x67, 0x8a, 0x66];
/// `canAccess(uint256,address)`
pub const SEL_CAN_ACCESS: [u8; 4] = [0xd5, 0xb2, 0xd1, 0xed];
/// `buyTrack(uint256)`
pub const SEL_BUY_TRACK: [u8; 4] = [0x9a, 0x97, 0x3f, 0xe5];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AbiError {
    #[error("response is not 0x-prefixed hex")]
    NotHex,
    #[error("response truncated: need {need} bytes at offset {offset}, have {have}")]
    Truncated { offset: usize, need: usize, have: usize },
    #[error("value does not fit: {0}")]
    Overflow(&'static str),
    #[error("string is not utf-8")]
    Utf8,
}

// ── encoding ──────────────────────────────────────────────────────────────────

fn word_u128(v: u128) -> [u8; WORD] {
    let mut w = [0u8; WORD];
    w[16..].copy_from_slice(&v.to_be_bytes());
    w
}

fn word_address(a: &Address) -> [u8; WORD] {
    let mut w = [0u8; WORD];
    w[12..].copy_from_slice(&a.0);
    w
}

pub fn encode_get_all_tracks() -> Vec<u8> {
    SEL_GET_ALL_TRACKS.to_vec()
}

pub fn encode_can_access(track_id: TrackId, account: &Address) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + 2 * WORD);
    out.extend_from_slice(&SEL_CAN_ACCESS);
    out.extend_from_slice(&word_u128(track_id as u128));
    out.extend_from_slice(&word_address(account));
    out
}

pub fn encode_buy_track(track_id: TrackId) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + WORD);
    out.extend_from_slice(&SEL_BUY_TRACK);
    out.extend_from_slice(&word_u128(track_id as u128));
    out
}

/// `0x`-prefixed lowercase hex, the form JSON-RPC expects for `data`.
pub fn to_hex_data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub fn from_hex_data(s: &str) -> Result<Vec<u8>, AbiError> {
    let body = s.strip_prefix("0x").ok_or(AbiError::NotHex)?;
    hex::decode(body).map_err(|_| AbiError::NotHex)
}

fn encode_string(out: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    out.extend_from_slice(&word_u128(bytes.len() as u128));
    out.extend_from_slice(bytes);
    let pad = (WORD - bytes.len() % WORD) % WORD;
    out.extend(std::iter::repeat(0u8).take(pad));
}

fn encode_track_tuple(t: &ChainTrack) -> Vec<u8> {
    let head_len = 4 * WORD;
    let mut name = Vec::new();
    encode_string(&mut name, &t.name);
    let mut cid = Vec::new();
    encode_string(&mut cid, &t.audio_cid);

    let mut out = Vec::with_capacity(head_len + name.len() + cid.len());
    out.extend_from_slice(&word_u128(head_len as u128));
    out.extend_from_slice(&word_u128((head_len + name.len()) as u128));
    out.extend_from_slice(&word_u128(t.price.0));
    out.extend_from_slice(&word_address(&t.artist));
    out.extend_from_slice(&name);
    out.extend_from_slice(&cid);
    out
}

/// Encode a `getAllTracks()` return value.  Used by fake nodes in tests and
/// kept next to the decoder so the two stay in step.
pub fn encode_track_array(tracks: &[ChainTrack]) -> Vec<u8> {
    let tuples: Vec<Vec<u8>> = tracks.iter().map(encode_track_tuple).collect();
    let mut out = Vec::new();
    out.extend_from_slice(&word_u128(WORD as u128));
    out.extend_from_slice(&word_u128(tracks.len() as u128));
    let mut offset = tracks.len() * WORD;
    for t in &tuples {
        out.extend_from_slice(&word_u128(offset as u128));
        offset += t.len();
    }
    for t in &tuples {
        out.extend_from_slice(t);
    }
    out
}

pub fn encode_bool(v: bool) -> Vec<u8> {
    word_u128(v as u128).to_vec()
}

// ── decoding ──────────────────────────────────────────────────────────────────

fn slice(data: &[u8], offset: usize, need: usize) -> Result<&[u8], AbiError> {
    let end = offset.checked_add(need).ok_or(AbiError::Overflow("offset"))?;
    data.get(offset..end).ok_or(AbiError::Truncated {
        offset,
        need,
        have: data.len(),
    })
}

fn read_word(data: &[u8], offset: usize) -> Result<&[u8], AbiError> {
    slice(data, offset, WORD)
}

fn read_u128(data: &[u8], offset: usize) -> Result<u128, AbiError> {
    let w = read_word(data, offset)?;
    if w[..16].iter().any(|b| *b != 0) {
        return Err(AbiError::Overflow("uint256 above u128"));
    }
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&w[16..]);
    Ok(u128::from_be_bytes(buf))
}

fn read_usize(data: &[u8], offset: usize) -> Result<usize, AbiError> {
    usize::try_from(read_u128(data, offset)?).map_err(|_| AbiError::Overflow("offset"))
}

fn read_address(data: &[u8], offset: usize) -> Result<Address, AbiError> {
    let w = read_word(data, offset)?;
    let mut a = [0u8; 20];
    a.copy_from_slice(&w[12..]);
    Ok(Address(a))
}

fn read_string(data: &[u8], offset: usize) -> Result<String, AbiError> {
    let len = read_usize(data, offset)?;
    let bytes = slice(data, offset + WORD, len)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| AbiError::Utf8)
}

pub fn decode_bool(data: &[u8]) -> Result<bool, AbiError> {
    let w = read_word(data, 0)?;
    Ok(w.iter().any(|b| *b != 0))
}

pub fn decode_track_array(data: &[u8]) -> Result<Vec<ChainTrack>, AbiError> {
    let array_at = read_usize(data, 0)?;
    let len = read_usize(data, array_at)?;
    let items_at = array_at + WORD;

    let mut tracks = Vec::with_capacity(len.min(1024));
    for i in 0..len {
        let tuple_at = items_at + read_usize(data, items_at + i * WORD)?;
        let name_at = tuple_at + read_usize(data, tuple_at)?;
        let cid_at = tuple_at + read_usize(data, tuple_at + WORD)?;
        tracks.push(ChainTrack {
            name: read_string(data, name_at)?,
            audio_cid: read_string(data, cid_at)?,
            price: Wei(read_u128(data, tuple_at + 2 * WORD)?),
            artist: read_address(data, tuple_at + 3 * WORD)?,
        });
    }
    Ok(tracks)
}
