//! RFC 4648 base-32 encoding (upper case, unpadded) for slugs.

use data_encoding::BASE32_NOPAD;

/// Encode `bytes` as unpadded base-32.
pub fn encode(bytes: &[u8]) -> String {
    BASE32_NOPAD.encode(bytes)
}

/// Number of characters produced for `byte_len` input bytes.
pub fn encoded_len(byte_len: usize) -> usize {
    BASE32_NOPAD.encode_len(byte_len)
}

/// Whether `value` could have been produced by [`encode`].
pub fn is_slug_shaped(value: &str) -> bool {
    !value.is_empty() && BASE32_NOPAD.decode(value.as_bytes()).is_ok()
}
