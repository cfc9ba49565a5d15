//! Minimal RLP encoding
//!
//! Just enough for typed transaction payloads: byte strings, big-endian
//! integers with leading zeros stripped, and lists of already-encoded
//! items.

const SHORT_STRING: u8 = 0x80;
const LONG_STRING: u8 = 0xb7;
const SHORT_LIST: u8 = 0xc0;
const LONG_LIST: u8 = 0xf7;

/// Encode a byte string
pub fn encode_bytes(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < SHORT_STRING {
        return data.to_vec();
    }

    let mut encoded = length_prefix(data.len(), SHORT_STRING, LONG_STRING);
    encoded.extend_from_slice(data);
    encoded
}

/// Encode a big-endian integer given as bytes, dropping leading zeros.
/// Zero encodes as the empty string.
pub fn encode_trimmed(data: &[u8]) -> Vec<u8> {
    let start = data.iter().position(|&b| b != 0).unwrap_or(data.len());
    encode_bytes(&data[start..])
}

pub fn encode_u64(value: u64) -> Vec<u8> {
    encode_trimmed(&value.to_be_bytes())
}

pub fn encode_u128(value: u128) -> Vec<u8> {
    encode_trimmed(&value.to_be_bytes())
}

/// Wrap already-encoded items in a list header
pub fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let content_len: usize = items.iter().map(Vec::len).sum();

    let mut encoded = length_prefix(content_len, SHORT_LIST, LONG_LIST);
    encoded.reserve(content_len);
    for item in items {
        encoded.extend_from_slice(item);
    }
    encoded
}

fn length_prefix(len: usize, short_base: u8, long_base: u8) -> Vec<u8> {
    if len < 56 {
        return vec![short_base + len as u8];
    }

    let len_bytes = len.to_be_bytes();
    let start = len_bytes.iter().position(|&b| b != 0).unwrap_or(len_bytes.len() - 1);
    let significant = &len_bytes[start..];

    let mut prefix = Vec::with_capacity(1 + significant.len());
    prefix.push(long_base + significant.len() as u8);
    prefix.extend_from_slice(significant);
    prefix
}
