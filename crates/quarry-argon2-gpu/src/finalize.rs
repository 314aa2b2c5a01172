//! CPU-side finalization: reduce the lane tails into the Argon2 tag.

use crate::long_hash::blake2b_long;
use crate::{BLOCK_BYTES, MAX_TAG};
use zeroize::Zeroize;

/// XOR the final block of every lane and long-hash the result down to
/// `hash_size` bytes, written to the front of the fixed-size tag cell.
///
/// `lane_tails` holds the last block of each lane back to back, exactly as
/// the driver reads them off the device. The XOR runs over native-endian
/// 64-bit words; byte order is irrelevant to XOR, and the accumulator is
/// hashed as bytes.
pub fn extract_tag(lane_tails: &[u8], hash_size: usize, out: &mut [u8; MAX_TAG]) {
    assert!(
        !lane_tails.is_empty() && lane_tails.len().checked_rem(BLOCK_BYTES) == Some(0),
        "lane tails must be whole blocks"
    );
    assert!(hash_size <= MAX_TAG, "tag length");

    let mut acc = [0u8; BLOCK_BYTES];
    acc.copy_from_slice(&lane_tails[..BLOCK_BYTES]);
    for tail in lane_tails[BLOCK_BYTES..].chunks_exact(BLOCK_BYTES) {
        for (word, other) in acc.chunks_exact_mut(8).zip(tail.chunks_exact(8)) {
            let x = u64::from_ne_bytes(word.try_into().expect("8-byte chunk"))
                ^ u64::from_ne_bytes(other.try_into().expect("8-byte chunk"));
            word.copy_from_slice(&x.to_ne_bytes());
        }
    }

    out.fill(0);
    blake2b_long(&[&acc], &mut out[..hash_size]);
    acc.zeroize();
}
